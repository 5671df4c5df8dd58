//! Ordered column sets
//!
//! Column lists are small and order matters for index prefixes, so sets
//! are plain `Vec<String>` with deterministic, order-preserving set ops.

/// Returns true if `a` contains the column.
pub fn contains(a: &[String], col: &str) -> bool {
    a.iter().any(|c| c == col)
}

/// Returns true if every column of `a` is in `b`.
pub fn subset(a: &[String], b: &[String]) -> bool {
    a.iter().all(|c| contains(b, c))
}

/// Returns true if the two lists contain the same columns (any order).
pub fn set_eq(a: &[String], b: &[String]) -> bool {
    subset(a, b) && subset(b, a)
}

/// Union preserving the order of `a`, then new columns of `b`.
pub fn union(a: &[String], b: &[String]) -> Vec<String> {
    let mut out = a.to_vec();
    for c in b {
        if !contains(&out, c) {
            out.push(c.clone());
        }
    }
    out
}

/// Intersection preserving the order of `a`.
pub fn intersect(a: &[String], b: &[String]) -> Vec<String> {
    a.iter().filter(|c| contains(b, c)).cloned().collect()
}

/// Columns of `a` not in `b`, preserving the order of `a`.
pub fn difference(a: &[String], b: &[String]) -> Vec<String> {
    a.iter().filter(|c| !contains(b, c)).cloned().collect()
}

/// Returns true if the two lists share no columns.
pub fn disjoint(a: &[String], b: &[String]) -> bool {
    !a.iter().any(|c| contains(b, c))
}

/// Returns true if `prefix` is an exact leading prefix of `cols`.
pub fn is_prefix(prefix: &[String], cols: &[String]) -> bool {
    prefix.len() <= cols.len() && prefix.iter().zip(cols).all(|(a, b)| a == b)
}

/// Convenience for building column lists in tests and fixtures.
pub fn cols(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_preserves_order() {
        let u = union(&cols(&["a", "b"]), &cols(&["b", "c"]));
        assert_eq!(u, cols(&["a", "b", "c"]));
    }

    #[test]
    fn test_intersect_and_difference() {
        assert_eq!(
            intersect(&cols(&["a", "b", "c"]), &cols(&["c", "a"])),
            cols(&["a", "c"])
        );
        assert_eq!(
            difference(&cols(&["a", "b", "c"]), &cols(&["b"])),
            cols(&["a", "c"])
        );
    }

    #[test]
    fn test_subset_and_prefix() {
        assert!(subset(&cols(&["b"]), &cols(&["a", "b"])));
        assert!(!subset(&cols(&["z"]), &cols(&["a", "b"])));
        assert!(is_prefix(&cols(&["a"]), &cols(&["a", "b"])));
        assert!(!is_prefix(&cols(&["b"]), &cols(&["a", "b"])));
        assert!(is_prefix(&[], &cols(&["a"])));
    }

    #[test]
    fn test_disjoint() {
        assert!(disjoint(&cols(&["a"]), &cols(&["b"])));
        assert!(!disjoint(&cols(&["a", "b"]), &cols(&["b"])));
    }
}
