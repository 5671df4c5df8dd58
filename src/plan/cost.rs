//! Cost model constants
//!
//! Costs are abstract units roughly proportional to bytes touched. They
//! only ever compare against each other, so the absolute scale is
//! irrelevant as long as it is consistent.

/// Sentinel for "no finite-cost strategy exists".
///
/// Large enough that any real cost is below it, small enough that sums
/// of a few impossible costs do not overflow to infinity.
pub const IMPOSSIBLE: f64 = f64::MAX / 10.0;

/// Writing is this much more expensive than reading the same bytes.
pub const WRITE_FACTOR: f64 = 4.0;

/// Penalty multiplier for strategies that read a source out of its
/// natural order (random access instead of a sequential scan).
pub const OUT_OF_ORDER: f64 = 10.0;

/// Flat overhead for materializing a temporary index, so tiny sources
/// never look cheaper to sort than to read directly.
pub const TEMPINDEX_OVERHEAD: f64 = 4000.0;

/// Returns true if the cost means "cannot be done".
pub fn is_impossible(cost: f64) -> bool {
    cost >= IMPOSSIBLE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_impossible_dominates_sums() {
        assert!(is_impossible(IMPOSSIBLE));
        assert!(is_impossible(IMPOSSIBLE + 1e9));
        assert!(!is_impossible(1e18));
        // a handful of impossible costs can be added without hitting infinity
        assert!((IMPOSSIBLE * 3.0).is_finite());
    }
}
