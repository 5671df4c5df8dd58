//! Storage collaborator boundary
//!
//! The query engine does not own a storage engine. It consumes three
//! seams: a `Transaction` handle (the sole arbiter of data visibility), a
//! `TableDesc` describing columns / keys / indexes, and a bidirectional,
//! range-bounded `IndexIter`. A deterministic in-memory implementation
//! lives in `memory` for tests and embedders without a disk engine.

mod memory;

pub use memory::MemStore;

use std::rc::Rc;

use crate::data::{Dir, Keyrange, Record, Row};

/// Storage boundary errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    /// Table does not exist
    #[error("table '{0}' does not exist")]
    UnknownTable(String),
    /// Table already exists
    #[error("table '{0}' already exists")]
    TableExists(String),
    /// Requested index is not defined on the table
    #[error("table '{table}' has no index on ({index})")]
    UnknownIndex {
        /// Table name
        table: String,
        /// Requested index columns, comma-joined
        index: String,
    },
    /// Record field count does not match the table's columns
    #[error("table '{table}' expects {expected} fields, got {got}")]
    Arity {
        /// Table name
        table: String,
        /// Declared column count
        expected: usize,
        /// Supplied field count
        got: usize,
    },
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Describes a table to the planner: columns, candidate keys, indexes,
/// and the size estimates the cost model runs on.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TableDesc {
    /// Table name
    pub name: String,
    /// Column names in field order
    pub columns: Vec<String>,
    /// Candidate keys (the first is the primary key)
    pub keys: Vec<Vec<String>>,
    /// Non-key indexes
    pub indexes: Vec<Vec<String>>,
    /// Estimated row count
    pub nrecords: u64,
    /// Estimated total data size in bytes
    pub totalsize: u64,
}

impl TableDesc {
    /// Creates a descriptor with a primary key and no extra indexes.
    pub fn new(name: impl Into<String>, columns: Vec<String>, key: Vec<String>) -> Self {
        TableDesc {
            name: name.into(),
            columns,
            keys: vec![key],
            indexes: Vec::new(),
            nrecords: 0,
            totalsize: 0,
        }
    }

    /// Adds another candidate key.
    pub fn with_key(mut self, key: Vec<String>) -> Self {
        self.keys.push(key);
        self
    }

    /// Adds a non-key index.
    pub fn with_index(mut self, index: Vec<String>) -> Self {
        self.indexes.push(index);
        self
    }

    /// Keys and indexes together: every ordering the table can deliver.
    pub fn keys_and_indexes(&self) -> Vec<Vec<String>> {
        let mut all = self.keys.clone();
        all.extend(self.indexes.iter().cloned());
        all
    }

    /// Returns true if the index is a candidate key.
    pub fn is_key(&self, index: &[String]) -> bool {
        self.keys.iter().any(|k| k == index)
    }
}

/// A read/write transaction handle supplied by the surrounding system.
///
/// The engine neither starts nor commits transactions; it reads through
/// the one it is given.
pub trait Transaction {
    /// Looks up a table descriptor with live size estimates.
    fn table(&self, name: &str) -> Option<TableDesc>;

    /// Opens a bidirectional iterator over the given index of a table.
    fn open(&self, table: &str, index: &[String]) -> StorageResult<Box<dyn IndexIter>>;

    /// Appends a record to a table (the write path of `output`).
    fn output(&self, table: &str, record: Record) -> StorageResult<()>;
}

/// Shared transaction handle; execution is single-threaded.
pub type Tran = Rc<dyn Transaction>;

/// A bidirectional cursor over one index of one table.
///
/// `get` walks one row at a time in either direction within the active
/// range. After the cursor reports exhaustion it returns to its boundary
/// state: a subsequent `get` in the opposite direction yields the extreme
/// row of the range on that side.
pub trait IndexIter {
    /// Restricts the cursor to a key range and resets it.
    fn set_range(&mut self, range: Keyrange);

    /// Resets the cursor without changing the active range.
    fn rewind(&mut self);

    /// Advances one row in the given direction; `None` at the boundary.
    fn get(&mut self, dir: Dir) -> Option<Row>;
}
