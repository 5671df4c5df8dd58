//! Row headers
//!
//! A header maps logical column names to `(slot, field-index)` positions
//! across a row's stacked records. Projection masks fields out without
//! changing the slot structure (masked positions keep a `-` placeholder so
//! field indexes stay stable); rename substitutes names in place. Columns
//! visible in `cols` but present in no slot are rule columns, computed on
//! demand outside the engine.

use super::cols;
use super::record::Record;
use super::row::Row;
use super::value::Value;

/// Placeholder for a masked-out field position.
const MASKED: &str = "-";

/// Maps logical columns onto the stacked records of a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Per-slot physical field names; `-` marks a masked position.
    flds: Vec<Vec<String>>,
    /// Visible logical columns.
    cols: Vec<String>,
}

impl Header {
    /// Creates a header from per-slot field lists and visible columns.
    pub fn new(flds: Vec<Vec<String>>, cols: Vec<String>) -> Self {
        Header { flds, cols }
    }

    /// A single-slot header where every field is visible.
    pub fn single(fields: Vec<String>) -> Self {
        Header {
            cols: fields.clone(),
            flds: vec![fields],
        }
    }

    /// Visible logical columns.
    pub fn columns(&self) -> &[String] {
        &self.cols
    }

    /// Number of record slots.
    pub fn slots(&self) -> usize {
        self.flds.len()
    }

    /// Locates a column as `(slot, field-index)`, first occurrence wins.
    pub fn find(&self, col: &str) -> Option<(usize, usize)> {
        if col == MASKED {
            return None;
        }
        for (slot, fields) in self.flds.iter().enumerate() {
            if let Some(i) = fields.iter().position(|f| f == col) {
                return Some((slot, i));
            }
        }
        None
    }

    /// Returns true if the column is visible.
    pub fn has(&self, col: &str) -> bool {
        cols::contains(&self.cols, col)
    }

    /// Rule columns: visible columns backed by no physical field.
    pub fn rules(&self) -> Vec<String> {
        self.cols
            .iter()
            .filter(|c| self.find(c).is_none())
            .cloned()
            .collect()
    }

    /// Physical fields in slot order, masked positions skipped.
    ///
    /// This is the field list used to reconstruct rows on output.
    pub fn phys_fields(&self) -> Vec<String> {
        self.flds
            .iter()
            .flatten()
            .filter(|f| *f != MASKED)
            .cloned()
            .collect()
    }

    /// Masks out fields not kept. The slot structure is preserved.
    pub fn project(&self, keep: &[String]) -> Header {
        let flds = self
            .flds
            .iter()
            .map(|fields| {
                fields
                    .iter()
                    .map(|f| {
                        if cols::contains(keep, f) {
                            f.clone()
                        } else {
                            MASKED.to_string()
                        }
                    })
                    .collect()
            })
            .collect();
        let cols = self
            .cols
            .iter()
            .filter(|c| cols::contains(keep, c))
            .cloned()
            .collect();
        Header { flds, cols }
    }

    /// Substitutes column names. The slot structure is preserved.
    pub fn rename(&self, from: &[String], to: &[String]) -> Header {
        let sub = |name: &String| -> String {
            match from.iter().position(|f| f == name) {
                Some(i) => to[i].clone(),
                None => name.clone(),
            }
        };
        Header {
            flds: self
                .flds
                .iter()
                .map(|fields| fields.iter().map(&sub).collect())
                .collect(),
            cols: self.cols.iter().map(&sub).collect(),
        }
    }

    /// Stacks two headers, as Product/Join stack their operands' rows.
    pub fn append(&self, other: &Header) -> Header {
        let mut flds = self.flds.clone();
        flds.extend(other.flds.iter().cloned());
        Header {
            flds,
            cols: cols::union(&self.cols, &other.cols),
        }
    }

    /// Reads a column from a row.
    ///
    /// A column with no backing field, or whose slot the row does not
    /// carry (an unmatched left-join side), reads as the empty string.
    pub fn get(&self, row: &Row, col: &str) -> Value {
        match self.find(col) {
            Some((slot, i)) => row
                .record(slot)
                .and_then(|r| r.field(i).cloned())
                .unwrap_or_else(Value::empty),
            None => Value::empty(),
        }
    }

    /// Projects a row onto a column list, producing a key record.
    pub fn key_of(&self, row: &Row, key_cols: &[String]) -> Record {
        Record::new(key_cols.iter().map(|c| self.get(row, c)).collect())
    }

    /// Field-by-field row equality over a column set.
    pub fn rows_equal(&self, a: &Row, b: &Row, over: &[String]) -> bool {
        over.iter().all(|c| self.get(a, c) == self.get(b, c))
    }
}
