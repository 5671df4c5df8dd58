//! The provably empty query
//!
//! Produced by rewrites that prove a subtree returns no rows (a constant
//! false filter, an intersection of disjoint sources). Also the cheapest
//! node to construct, which makes it the placeholder when the planner
//! splices temp indexes into the tree.

use crate::data::{Dir, Fixed, Header, Record, Row};

use super::errors::QueryResult;
use super::node::PlanState;

pub struct Nothing {
    pub(crate) plan: PlanState,
    cols: Vec<String>,
}

impl Nothing {
    pub(crate) fn new(cols: Vec<String>) -> Nothing {
        Nothing {
            plan: PlanState::default(),
            cols,
        }
    }

    pub(crate) fn columns(&self) -> Vec<String> {
        self.cols.clone()
    }

    pub(crate) fn keys(&self) -> Vec<Vec<String>> {
        // the empty column set is a key of an empty relation
        vec![Vec::new()]
    }

    pub(crate) fn fixed(&self) -> Vec<Fixed> {
        Vec::new()
    }

    pub(crate) fn header(&self) -> Header {
        Header::single(self.cols.clone())
    }

    pub(crate) fn nrecords(&self) -> u64 {
        0
    }

    pub(crate) fn totalsize(&self) -> u64 {
        0
    }

    pub(crate) fn optimize2(
        &mut self,
        _index: &[String],
        _needs: &[String],
        _firstneeds: &[String],
        _is_cursor: bool,
        _freeze: bool,
    ) -> f64 {
        // empty delivers any order for free
        0.0
    }

    pub(crate) fn select(&mut self, _cols: &[String], _vals: &Record) -> QueryResult<()> {
        Ok(())
    }

    pub(crate) fn rewind(&mut self) {}

    pub(crate) fn get(&mut self, _dir: Dir) -> QueryResult<Option<Row>> {
        Ok(None)
    }

    pub(crate) fn explain(&self) -> String {
        "NOTHING".to_string()
    }
}
