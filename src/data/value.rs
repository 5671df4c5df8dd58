//! Ordered scalar values
//!
//! Values are the fields of records. Ordering is deterministic and total:
//! Bool < Int < Float < String < Max. Floats are stored as total-ordering
//! bits so that derived comparison matches numeric comparison.

use std::fmt;

/// A single field value with a deterministic total order.
///
/// `Max` is a range-end sentinel: it sorts above every real value and is
/// used to pad prefix keys so that inclusive upper bounds cover every
/// record sharing the prefix. It never appears inside stored records.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    /// Boolean value (false < true)
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Float value (stored as bits for total ordering)
    Float(u64),
    /// String value
    Str(String),
    /// Range-end sentinel, above all real values
    Max,
}

impl Value {
    /// The empty string, the value of a column a row does not carry.
    pub fn empty() -> Self {
        Value::Str(String::new())
    }

    /// Create a value from a float.
    ///
    /// Uses bit representation for total ordering: negative floats flip
    /// all bits, positive floats flip the sign bit.
    pub fn from_float(v: f64) -> Self {
        let bits = v.to_bits();
        let ordered = if (bits >> 63) == 1 {
            !bits
        } else {
            bits ^ (1 << 63)
        };
        Value::Float(ordered)
    }

    /// Recover the float from its ordered-bits form.
    pub fn to_float(&self) -> Option<f64> {
        match self {
            Value::Float(ordered) => {
                let bits = if (ordered >> 63) == 0 {
                    !ordered
                } else {
                    ordered ^ (1 << 63)
                };
                Some(f64::from_bits(bits))
            }
            _ => None,
        }
    }

    /// Create a value from a string.
    pub fn str(v: impl Into<String>) -> Self {
        Value::Str(v.into())
    }

    /// Create a value from a JSON value.
    ///
    /// Arrays and objects are not representable and yield `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Value::Int(i))
                } else {
                    n.as_f64().map(Value::from_float)
                }
            }
            serde_json::Value::String(s) => Some(Value::Str(s.clone())),
            _ => None,
        }
    }

    /// Returns true for the empty string.
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Str(s) if s.is_empty())
    }

    /// Numeric view for arithmetic; `None` for non-numbers.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(_) => self.to_float(),
            _ => None,
        }
    }

    /// Estimated size in bytes, used by the planner's key-size model.
    pub fn size(&self) -> u64 {
        match self {
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 8,
            Value::Str(s) => s.len() as u64,
            Value::Max => 0,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(_) => write!(f, "{}", self.to_float().unwrap_or(f64::NAN)),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Max => write!(f, "<max>"),
        }
    }
}
