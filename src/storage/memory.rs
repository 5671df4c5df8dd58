//! In-memory storage
//!
//! A deterministic `Transaction` implementation backed by `BTreeMap`-style
//! sorted snapshots. Iterators materialize a sorted `(key, row)` snapshot
//! at open time; visibility is whatever the store held at that moment.
//! Used by the test suites and by embedders that have no disk engine.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::data::{Dir, Keyrange, Record, Row, Value};

use super::{IndexIter, StorageError, StorageResult, TableDesc, Transaction};

struct MemTable {
    desc: TableDesc,
    rows: Vec<Record>,
}

/// A deterministic in-memory store; also serves as its own transaction.
#[derive(Default)]
pub struct MemStore {
    tables: RefCell<HashMap<String, MemTable>>,
}

impl MemStore {
    /// Creates an empty store behind the shared transaction handle.
    pub fn new() -> Rc<MemStore> {
        Rc::new(MemStore::default())
    }

    /// Registers a table.
    pub fn create_table(&self, desc: TableDesc) -> StorageResult<()> {
        let mut tables = self.tables.borrow_mut();
        if tables.contains_key(&desc.name) {
            return Err(StorageError::TableExists(desc.name));
        }
        tables.insert(
            desc.name.clone(),
            MemTable {
                desc,
                rows: Vec::new(),
            },
        );
        Ok(())
    }

    /// Inserts a record, checking arity against the declared columns.
    pub fn insert(&self, table: &str, record: Record) -> StorageResult<()> {
        let mut tables = self.tables.borrow_mut();
        let t = tables
            .get_mut(table)
            .ok_or_else(|| StorageError::UnknownTable(table.to_string()))?;
        if record.len() != t.desc.columns.len() {
            return Err(StorageError::Arity {
                table: table.to_string(),
                expected: t.desc.columns.len(),
                got: record.len(),
            });
        }
        t.rows.push(record);
        Ok(())
    }
}

impl Transaction for MemStore {
    fn table(&self, name: &str) -> Option<TableDesc> {
        let tables = self.tables.borrow();
        tables.get(name).map(|t| {
            let mut desc = t.desc.clone();
            desc.nrecords = t.rows.len() as u64;
            desc.totalsize = t.rows.iter().map(Record::size).sum();
            desc
        })
    }

    fn open(&self, table: &str, index: &[String]) -> StorageResult<Box<dyn IndexIter>> {
        let tables = self.tables.borrow();
        let t = tables
            .get(table)
            .ok_or_else(|| StorageError::UnknownTable(table.to_string()))?;
        if !t.desc.keys_and_indexes().iter().any(|ix| ix == index) {
            return Err(StorageError::UnknownIndex {
                table: table.to_string(),
                index: index.join(","),
            });
        }
        let positions: Vec<usize> = index
            .iter()
            .map(|c| t.desc.columns.iter().position(|d| d == c).unwrap_or(0))
            .collect();
        let unique = t.desc.is_key(index);
        let mut entries: Vec<(Record, Record)> = t
            .rows
            .iter()
            .enumerate()
            .map(|(offset, row)| {
                let mut key = Record::new(
                    positions
                        .iter()
                        .map(|&i| row.field(i).cloned().unwrap_or_else(Value::empty))
                        .collect(),
                );
                if !unique {
                    // uniqueifier keeps equal index values distinct
                    key.push(Value::Int(offset as i64));
                }
                (key, row.clone())
            })
            .collect();
        entries.sort();
        let hi = entries.len();
        Ok(Box::new(MemIter {
            entries,
            lo: 0,
            hi,
            pos: Pos::Fresh,
        }))
    }

    fn output(&self, table: &str, record: Record) -> StorageResult<()> {
        self.insert(table, record)
    }
}

/// Cursor position within the active `[lo, hi)` window.
///
/// Running off either end parks the cursor there (`Before`/`After`), so a
/// repeated `get` in the same direction keeps returning `None`; reversing
/// direction walks back in from that end.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Pos {
    Fresh,
    At(usize),
    Before,
    After,
}

/// Snapshot cursor: sorted entries, an active window, and a position.
struct MemIter {
    entries: Vec<(Record, Record)>,
    lo: usize,
    hi: usize,
    pos: Pos,
}

impl IndexIter for MemIter {
    fn set_range(&mut self, range: Keyrange) {
        self.lo = self.entries.partition_point(|e| range.before_start(&e.0));
        let hi = self.entries.partition_point(|e| !range.past_end(&e.0));
        self.hi = hi.max(self.lo);
        self.pos = Pos::Fresh;
    }

    fn rewind(&mut self) {
        self.pos = Pos::Fresh;
    }

    fn get(&mut self, dir: Dir) -> Option<Row> {
        let found = match (dir, self.pos) {
            (Dir::Next, Pos::Fresh) | (Dir::Next, Pos::Before) => {
                (self.lo < self.hi).then_some(self.lo)
            }
            (Dir::Next, Pos::At(i)) => (i + 1 < self.hi).then_some(i + 1),
            (Dir::Next, Pos::After) => None,
            (Dir::Prev, Pos::Fresh) | (Dir::Prev, Pos::After) => {
                (self.lo < self.hi).then(|| self.hi - 1)
            }
            (Dir::Prev, Pos::At(i)) => (i > self.lo).then(|| i - 1),
            (Dir::Prev, Pos::Before) => None,
        };
        self.pos = match found {
            Some(i) => Pos::At(i),
            None => match dir {
                Dir::Next => Pos::After,
                Dir::Prev => Pos::Before,
            },
        };
        found.map(|i| Row::single(self.entries[i].1.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::cols::cols;
    use crate::data::Key;

    fn store() -> Rc<MemStore> {
        let s = MemStore::new();
        s.create_table(
            TableDesc::new("t", cols(&["id", "name"]), cols(&["id"]))
                .with_index(cols(&["name"])),
        )
        .unwrap();
        for (id, name) in [(2, "b"), (1, "c"), (3, "a")] {
            s.insert("t", Record::new(vec![Value::Int(id), Value::str(name)]))
                .unwrap();
        }
        s
    }

    fn first_field(row: &Row) -> Value {
        row.record(0).unwrap().field(0).cloned().unwrap()
    }

    #[test]
    fn test_iteration_in_key_order() {
        let s = store();
        let mut it = s.open("t", &cols(&["id"])).unwrap();
        let mut ids = Vec::new();
        while let Some(row) = it.get(Dir::Next) {
            ids.push(first_field(&row));
        }
        assert_eq!(ids, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn test_iteration_in_index_order() {
        let s = store();
        let mut it = s.open("t", &cols(&["name"])).unwrap();
        let mut ids = Vec::new();
        while let Some(row) = it.get(Dir::Next) {
            ids.push(first_field(&row));
        }
        // sorted by name: a, b, c
        assert_eq!(ids, vec![Value::Int(3), Value::Int(2), Value::Int(1)]);
    }

    #[test]
    fn test_prev_is_reverse_of_next() {
        let s = store();
        let mut it = s.open("t", &cols(&["id"])).unwrap();
        let mut fwd = Vec::new();
        while let Some(row) = it.get(Dir::Next) {
            fwd.push(first_field(&row));
        }
        // after exhaustion the cursor is back at the boundary
        let mut back = Vec::new();
        while let Some(row) = it.get(Dir::Prev) {
            back.push(first_field(&row));
        }
        back.reverse();
        assert_eq!(fwd, back);
    }

    #[test]
    fn test_range_restriction() {
        let s = store();
        let mut it = s.open("t", &cols(&["id"])).unwrap();
        it.set_range(Keyrange::new(
            Key::Rec(Record::new(vec![Value::Int(2)])),
            Key::Max,
        ));
        let mut ids = Vec::new();
        while let Some(row) = it.get(Dir::Next) {
            ids.push(first_field(&row));
        }
        assert_eq!(ids, vec![Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn test_direction_reversal_mid_scan() {
        let s = store();
        let mut it = s.open("t", &cols(&["id"])).unwrap();
        assert_eq!(first_field(&it.get(Dir::Next).unwrap()), Value::Int(1));
        assert_eq!(first_field(&it.get(Dir::Next).unwrap()), Value::Int(2));
        assert_eq!(first_field(&it.get(Dir::Prev).unwrap()), Value::Int(1));
        assert_eq!(first_field(&it.get(Dir::Next).unwrap()), Value::Int(2));
    }

    #[test]
    fn test_exhausted_cursor_stays_exhausted() {
        let s = store();
        let mut it = s.open("t", &cols(&["id"])).unwrap();
        while it.get(Dir::Next).is_some() {}
        // parked at the end: more Next calls do not restart the scan
        assert!(it.get(Dir::Next).is_none());
        assert!(it.get(Dir::Next).is_none());
        // reversing walks back in from the end
        assert_eq!(first_field(&it.get(Dir::Prev).unwrap()), Value::Int(3));
    }

    #[test]
    fn test_rewind_resets_a_parked_cursor() {
        let s = store();
        let mut it = s.open("t", &cols(&["id"])).unwrap();
        while it.get(Dir::Prev).is_some() {}
        assert!(it.get(Dir::Prev).is_none());
        it.rewind();
        assert_eq!(first_field(&it.get(Dir::Next).unwrap()), Value::Int(1));
    }

    #[test]
    fn test_unknown_index_rejected() {
        let s = store();
        assert!(matches!(
            s.open("t", &cols(&["nope"])),
            Err(StorageError::UnknownIndex { .. })
        ));
    }

    #[test]
    fn test_arity_checked() {
        let s = store();
        assert!(matches!(
            s.insert("t", Record::new(vec![Value::Int(9)])),
            Err(StorageError::Arity { .. })
        ));
    }
}
