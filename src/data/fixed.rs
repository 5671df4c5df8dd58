//! Fixed-value reasoning
//!
//! A `Fixed` records the finite set of values a column is known to be
//! constrained to at a point in the tree (constant propagation from
//! equality filters and constant extends). The planner uses fixed sets to
//! prove two branches of a set operation disjoint without reading data.

use super::value::Value;

/// A column together with the finite set of values it can take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixed {
    /// Column name
    pub col: String,
    /// The values the column is constrained to
    pub values: Vec<Value>,
}

impl Fixed {
    /// Creates a fixed set for a column.
    pub fn new(col: impl Into<String>, values: Vec<Value>) -> Self {
        Fixed {
            col: col.into(),
            values,
        }
    }

    /// A column fixed to a single value.
    pub fn single(col: impl Into<String>, value: Value) -> Self {
        Fixed::new(col, vec![value])
    }

    /// Returns true if the two value sets share no value.
    pub fn disjoint_values(&self, other: &Fixed) -> bool {
        !self.values.iter().any(|v| other.values.contains(v))
    }
}

/// Merges two fixed lists, left-hand side taking precedence per column.
pub fn combine(mut left: Vec<Fixed>, right: Vec<Fixed>) -> Vec<Fixed> {
    for f in right {
        if !left.iter().any(|l| l.col == f.col) {
            left.push(f);
        }
    }
    left
}

/// Looks up the fixed set for a column.
pub fn find<'a>(fixed: &'a [Fixed], col: &str) -> Option<&'a Fixed> {
    fixed.iter().find(|f| f.col == col)
}
