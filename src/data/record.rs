//! Records and keys
//!
//! A record is an ordered tuple of values; tuples compare field by field,
//! so a `Record` is directly usable as a key in ordered structures. `Key`
//! adds the unbounded sentinels used by key ranges.

use super::value::Value;

/// An ordered, comparable tuple of values.
///
/// This is the unit the storage collaborator stores and iterates; rows are
/// stacks of records. Derived ordering is lexicographic over the fields,
/// which matches the packed byte-comparable ordering at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Record(Vec<Value>);

impl Record {
    /// Creates a record from its fields.
    pub fn new(fields: Vec<Value>) -> Self {
        Record(fields)
    }

    /// Creates an empty record.
    pub fn empty() -> Self {
        Record(Vec::new())
    }

    /// Returns the field at the given index, if present.
    pub fn field(&self, i: usize) -> Option<&Value> {
        self.0.get(i)
    }

    /// Returns the number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Appends a field.
    pub fn push(&mut self, v: Value) {
        self.0.push(v);
    }

    /// Iterates over the fields.
    pub fn fields(&self) -> impl Iterator<Item = &Value> {
        self.0.iter()
    }

    /// Estimated size in bytes.
    pub fn size(&self) -> u64 {
        self.0.iter().map(Value::size).sum()
    }

    /// Returns this record extended with the `Max` sentinel, so that as an
    /// inclusive upper bound it covers every record sharing this prefix.
    pub fn until(mut self) -> Self {
        self.0.push(Value::Max);
        self
    }
}

impl From<Vec<Value>> for Record {
    fn from(fields: Vec<Value>) -> Self {
        Record(fields)
    }
}

/// A key position: a record, or one of the unbounded sentinels.
///
/// Derived ordering places `Min` below and `Max` above every record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Key {
    /// Below every record
    Min,
    /// An actual key value
    Rec(Record),
    /// Above every record
    Max,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(vals: &[i64]) -> Record {
        Record::new(vals.iter().map(|v| Value::Int(*v)).collect())
    }

    #[test]
    fn test_lexicographic_ordering() {
        assert!(rec(&[1, 2]) < rec(&[1, 3]));
        assert!(rec(&[1]) < rec(&[1, 0]));
        assert!(rec(&[2]) > rec(&[1, 9]));
    }

    #[test]
    fn test_key_sentinels() {
        assert!(Key::Min < Key::Rec(rec(&[i64::MIN])));
        assert!(Key::Rec(rec(&[i64::MAX])) < Key::Max);
    }

    #[test]
    fn test_until_covers_prefix() {
        let prefix = rec(&[1]);
        let longer = rec(&[1, 99]);
        assert!(longer > prefix);
        assert!(longer < prefix.until());
    }
}
