//! Rows
//!
//! A row is an ordered stack of records: one per scanned table, plus at
//! most one synthesized record carrying computed (extend) fields. Rows are
//! immutable once produced; operators build new rows by stacking.

use super::record::Record;

/// An immutable stack of records, addressed through a `Header`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    recs: Vec<Record>,
}

impl Row {
    /// A row over a single record.
    pub fn single(rec: Record) -> Self {
        Row { recs: vec![rec] }
    }

    /// A row over a stack of records.
    pub fn stacked(recs: Vec<Record>) -> Self {
        Row { recs }
    }

    /// Returns the record in the given slot, if the row carries it.
    ///
    /// An unmatched left-join side is represented by simply not carrying
    /// the slot; the header reads its columns as empty.
    pub fn record(&self, slot: usize) -> Option<&Record> {
        self.recs.get(slot)
    }

    /// Number of record slots this row carries.
    pub fn len(&self) -> usize {
        self.recs.len()
    }

    /// Returns true if the row carries no records.
    pub fn is_empty(&self) -> bool {
        self.recs.is_empty()
    }

    /// Stacks this row on top of another, as Product/Join do.
    pub fn stack(&self, other: &Row) -> Row {
        let mut recs = self.recs.clone();
        recs.extend(other.recs.iter().cloned());
        Row { recs }
    }

    /// This row with one more record appended (an extend overlay).
    pub fn with_record(&self, rec: Record) -> Row {
        let mut recs = self.recs.clone();
        recs.push(rec);
        Row { recs }
    }

    /// Estimated size in bytes.
    pub fn size(&self) -> u64 {
        self.recs.iter().map(Record::size).sum()
    }
}
