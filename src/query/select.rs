//! Row filter
//!
//! Filtering never changes columns or ordering, so optimization is pure
//! delegation with the predicate's columns added to what the source must
//! produce. The predicate's equality terms contribute fixed values, which
//! is how constant filters upstream let set operations prove disjointness
//! downstream. At execution, single-value equalities covering a prefix of
//! the source's frozen index become a key range on the source, so the
//! cursor skips rows instead of reading and rejecting them.

use crate::data::{combine, Dir, Fixed, Header, Record, Row, Value};

use super::errors::{QueryError, QueryResult};
use super::expr::Expr;
use super::node::{PlanState, Query};

pub struct Select {
    pub(crate) plan: PlanState,
    pub(crate) src: Box<Query>,
    pub(crate) pred: Expr,
    /// Equality prefix already pushed into the source.
    pushed: bool,
    /// An external `select` restriction is active; it owns the range.
    extsel: bool,
    hdr: Option<Header>,
}

/// The longest prefix of `ix` the predicate pins to single values, with
/// those values packed in index order.
fn equality_prefix(fixed: &[Fixed], ix: &[String]) -> (Vec<String>, Record) {
    let mut cols = Vec::new();
    let mut vals = Record::empty();
    for c in ix {
        match fixed.iter().find(|f| f.col == *c && f.values.len() == 1) {
            Some(f) => {
                cols.push(c.clone());
                vals.push(f.values[0].clone());
            }
            None => break,
        }
    }
    (cols, vals)
}

impl Select {
    pub(crate) fn new(src: Query, pred: Expr) -> QueryResult<Select> {
        let columns = src.columns();
        for c in pred.columns() {
            if !columns.contains(&c) {
                return Err(QueryError::unknown_column(c));
            }
        }
        Ok(Select {
            plan: PlanState::default(),
            src: Box::new(src),
            pred,
            pushed: false,
            extsel: false,
            hdr: None,
        })
    }

    pub(crate) fn columns(&self) -> Vec<String> {
        self.src.columns()
    }

    pub(crate) fn keys(&self) -> Vec<Vec<String>> {
        self.src.keys()
    }

    pub(crate) fn fixed(&self) -> Vec<Fixed> {
        combine(self.pred.fixed(), self.src.fixed())
    }

    pub(crate) fn header(&self) -> Header {
        self.src.header()
    }

    pub(crate) fn nrecords(&self) -> u64 {
        if self.pred.is_false() {
            0
        } else if self.pred.is_true() {
            self.src.nrecords()
        } else {
            // selectivity unknown; assume half survive
            self.src.nrecords() / 2
        }
    }

    pub(crate) fn totalsize(&self) -> u64 {
        if self.pred.is_false() {
            0
        } else if self.pred.is_true() {
            self.src.totalsize()
        } else {
            self.src.totalsize() / 2
        }
    }

    pub(crate) fn optimize2(
        &mut self,
        index: &[String],
        needs: &[String],
        firstneeds: &[String],
        is_cursor: bool,
        freeze: bool,
    ) -> f64 {
        let pcols = self.pred.columns();
        let needs2 = crate::data::cols::union(needs, &pcols);
        let firstneeds2 = crate::data::cols::union(firstneeds, &pcols);
        self.src
            .optimize(index, &needs2, &firstneeds2, is_cursor, freeze)
    }

    pub(crate) fn select(&mut self, cols: &[String], vals: &Record) -> QueryResult<()> {
        self.extsel = !cols.is_empty();
        if !self.extsel {
            // the cleared range may be re-narrowed from the predicate
            self.pushed = false;
        }
        self.src.select(cols, vals)
    }

    pub(crate) fn rewind(&mut self) {
        self.src.rewind();
    }

    fn push_equalities(&mut self) -> QueryResult<()> {
        if self.pushed || self.extsel {
            return Ok(());
        }
        self.pushed = true;
        let (cols, vals) = equality_prefix(&self.pred.fixed(), &self.src.frozen_index());
        if !cols.is_empty() {
            self.src.select(&cols, &vals)?;
        }
        Ok(())
    }

    pub(crate) fn get(&mut self, dir: Dir) -> QueryResult<Option<Row>> {
        self.push_equalities()?;
        let hdr = match &self.hdr {
            Some(h) => h.clone(),
            None => {
                let h = self.src.header();
                self.hdr = Some(h.clone());
                h
            }
        };
        loop {
            let row = match self.src.get(dir)? {
                Some(row) => row,
                None => return Ok(None),
            };
            if self.pred.eval(&hdr, &row) == Value::Bool(true) {
                return Ok(Some(row));
            }
        }
    }

    pub(crate) fn explain(&self) -> String {
        format!("{} WHERE", self.src.explain())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::cols::cols;

    #[test]
    fn test_equality_prefix_follows_index_order() {
        let fixed = vec![
            Fixed::new("b".to_string(), vec![Value::Int(2)]),
            Fixed::new("a".to_string(), vec![Value::Int(1)]),
        ];
        let (pinned, vals) = equality_prefix(&fixed, &cols(&["a", "b", "c"]));
        assert_eq!(pinned, cols(&["a", "b"]));
        assert_eq!(vals, Record::new(vec![Value::Int(1), Value::Int(2)]));
    }

    #[test]
    fn test_equality_prefix_stops_at_a_gap() {
        let fixed = vec![
            Fixed::new("a".to_string(), vec![Value::Int(1)]),
            Fixed::new("c".to_string(), vec![Value::Int(3)]),
        ];
        let (pinned, _) = equality_prefix(&fixed, &cols(&["a", "b", "c"]));
        assert_eq!(pinned, cols(&["a"]));
    }

    #[test]
    fn test_multi_value_columns_are_not_pinned() {
        let fixed = vec![Fixed::new(
            "a".to_string(),
            vec![Value::Int(1), Value::Int(3)],
        )];
        let (pinned, _) = equality_prefix(&fixed, &cols(&["a", "b"]));
        assert!(pinned.is_empty());
    }
}
