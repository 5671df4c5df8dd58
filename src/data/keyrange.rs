//! Inclusive key ranges
//!
//! A `Keyrange` restricts a physical or temporary index scan to an
//! inclusive `[from, to]` window. `Min`/`Max` sentinels represent the
//! unbounded ends; the range is empty iff `from > to`.

use super::record::{Key, Record};

/// An inclusive `[from, to]` bound over keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyrange {
    /// Lower bound (inclusive)
    pub from: Key,
    /// Upper bound (inclusive)
    pub to: Key,
}

impl Keyrange {
    /// The unbounded range.
    pub fn all() -> Self {
        Keyrange {
            from: Key::Min,
            to: Key::Max,
        }
    }

    /// Creates a range from explicit bounds.
    pub fn new(from: Key, to: Key) -> Self {
        Keyrange { from, to }
    }

    /// A range covering every key starting with the given prefix values.
    ///
    /// The upper bound is the prefix padded with the `Max` sentinel, so an
    /// equality probe on an index prefix is `prefix(k, k)`.
    pub fn prefix(from: Record, to: Record) -> Self {
        Keyrange {
            from: Key::Rec(from),
            to: Key::Rec(to.until()),
        }
    }

    /// Returns true if the range contains no keys.
    pub fn is_empty(&self) -> bool {
        self.from > self.to
    }

    /// Pointwise intersection: max of the lower bounds, min of the upper.
    pub fn intersect(&self, other: &Keyrange) -> Keyrange {
        Keyrange {
            from: self.from.clone().max(other.from.clone()),
            to: self.to.clone().min(other.to.clone()),
        }
    }

    /// Returns true if the key lies below the lower bound.
    pub fn before_start(&self, rec: &Record) -> bool {
        match &self.from {
            Key::Min => false,
            Key::Max => true,
            Key::Rec(f) => rec < f,
        }
    }

    /// Returns true if the key lies above the upper bound.
    pub fn past_end(&self, rec: &Record) -> bool {
        match &self.to {
            Key::Max => false,
            Key::Min => true,
            Key::Rec(t) => rec > t,
        }
    }

    /// Returns true if the key lies within the range.
    pub fn contains(&self, rec: &Record) -> bool {
        !self.before_start(rec) && !self.past_end(rec)
    }
}

impl Default for Keyrange {
    fn default() -> Self {
        Keyrange::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::value::Value;

    fn rec(v: i64) -> Record {
        Record::new(vec![Value::Int(v)])
    }

    #[test]
    fn test_all_contains_everything() {
        assert!(Keyrange::all().contains(&rec(i64::MIN)));
        assert!(Keyrange::all().contains(&rec(i64::MAX)));
        assert!(!Keyrange::all().is_empty());
    }

    #[test]
    fn test_empty_when_inverted() {
        let r = Keyrange::new(Key::Rec(rec(5)), Key::Rec(rec(3)));
        assert!(r.is_empty());
    }

    #[test]
    fn test_intersect() {
        let a = Keyrange::new(Key::Rec(rec(1)), Key::Rec(rec(10)));
        let b = Keyrange::new(Key::Rec(rec(5)), Key::Max);
        let c = a.intersect(&b);
        assert_eq!(c.from, Key::Rec(rec(5)));
        assert_eq!(c.to, Key::Rec(rec(10)));
        assert!(c.contains(&rec(5)));
        assert!(c.contains(&rec(10)));
        assert!(!c.contains(&rec(11)));
    }

    #[test]
    fn test_disjoint_intersection_is_empty() {
        let a = Keyrange::new(Key::Rec(rec(1)), Key::Rec(rec(3)));
        let b = Keyrange::new(Key::Rec(rec(5)), Key::Rec(rec(9)));
        assert!(a.intersect(&b).is_empty());
    }

    #[test]
    fn test_prefix_probe() {
        let r = Keyrange::prefix(rec(2), rec(2));
        let longer = Record::new(vec![Value::Int(2), Value::str("x")]);
        assert!(r.contains(&rec(2)));
        assert!(r.contains(&longer));
        assert!(!r.contains(&rec(3)));
    }
}
