//! Per-node plan memo
//!
//! `optimize` revisits nodes with the same arguments many times while
//! exploring strategies; each node memoizes its answers. The cache never
//! evicts (plan search terminates quickly), but it warns once if a node
//! accumulates a suspicious number of distinct entries.

use crate::observability::{metrics, Logger};

/// Distinct-entry count past which a node's memo is logged as suspect.
const WARN_THRESHOLD: usize = 20;

#[derive(Debug, Clone)]
struct Entry {
    index: Vec<String>,
    needs: Vec<String>,
    firstneeds: Vec<String>,
    is_cursor: bool,
    cost: f64,
}

/// Memo of optimize answers for one node.
#[derive(Debug, Clone, Default)]
pub struct Cache {
    entries: Vec<Entry>,
    hits: u64,
    misses: u64,
    warned: bool,
}

impl Cache {
    /// Looks up a previously computed cost.
    pub fn get(
        &mut self,
        index: &[String],
        needs: &[String],
        firstneeds: &[String],
        is_cursor: bool,
    ) -> Option<f64> {
        let found = self
            .entries
            .iter()
            .find(|e| {
                e.is_cursor == is_cursor
                    && e.index == index
                    && e.needs == needs
                    && e.firstneeds == firstneeds
            })
            .map(|e| e.cost);
        if found.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        found
    }

    /// Records a computed cost.
    pub fn add(
        &mut self,
        index: &[String],
        needs: &[String],
        firstneeds: &[String],
        is_cursor: bool,
        cost: f64,
    ) {
        self.entries.push(Entry {
            index: index.to_vec(),
            needs: needs.to_vec(),
            firstneeds: firstneeds.to_vec(),
            is_cursor,
            cost,
        });
        if self.entries.len() > WARN_THRESHOLD && !self.warned {
            self.warned = true;
            metrics().increment_plan_cache_overflows();
            Logger::warn(
                "PLAN_CACHE_OVERFLOW",
                &[("entries", &self.entries.len().to_string())],
            );
        }
    }

    /// Cache hits so far.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Cache misses so far.
    pub fn misses(&self) -> u64 {
        self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::cols::cols;

    #[test]
    fn test_hit_returns_stored_cost() {
        let mut c = Cache::default();
        let ix = cols(&["a"]);
        let needs = cols(&["a", "b"]);
        assert_eq!(c.get(&ix, &needs, &[], false), None);
        c.add(&ix, &needs, &[], false, 123.0);
        assert_eq!(c.get(&ix, &needs, &[], false), Some(123.0));
        assert_eq!(c.hits(), 1);
        assert_eq!(c.misses(), 1);
    }

    #[test]
    fn test_distinct_arguments_do_not_collide() {
        let mut c = Cache::default();
        c.add(&cols(&["a"]), &[], &[], false, 1.0);
        c.add(&cols(&["a"]), &[], &[], true, 2.0);
        c.add(&cols(&["b"]), &[], &[], false, 3.0);
        assert_eq!(c.get(&cols(&["a"]), &[], &[], false), Some(1.0));
        assert_eq!(c.get(&cols(&["a"]), &[], &[], true), Some(2.0));
        assert_eq!(c.get(&cols(&["b"]), &[], &[], false), Some(3.0));
    }

    #[test]
    fn test_overflow_warns_once() {
        let mut c = Cache::default();
        let before = metrics().plan_cache_overflows();
        for i in 0..(WARN_THRESHOLD + 5) {
            let ix = vec![format!("c{}", i)];
            c.add(&ix, &[], &[], false, i as f64);
        }
        assert_eq!(metrics().plan_cache_overflows(), before + 1);
    }
}
