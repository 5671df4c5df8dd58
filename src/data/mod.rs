//! Data model for the query engine
//!
//! Leaves of the system: values, records, keys, rows, headers, key ranges
//! and fixed-value sets. Nothing here depends on the planner or executor.

pub mod cols;
mod fixed;
mod header;
mod keyrange;
mod record;
mod row;
mod value;

pub use fixed::{combine, find as find_fixed, Fixed};
pub use header::Header;
pub use keyrange::Keyrange;
pub use record::{Key, Record};
pub use row::Row;
pub use value::Value;

/// Cursor direction for the bidirectional execution protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dir {
    /// Forward
    Next,
    /// Backward
    Prev,
}

impl Dir {
    /// The opposite direction.
    pub fn reverse(self) -> Dir {
        match self {
            Dir::Next => Dir::Prev,
            Dir::Prev => Dir::Next,
        }
    }
}
