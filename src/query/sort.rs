//! Explicit result ordering
//!
//! Sort does no work of its own: it asks its source for the order and
//! lets the cost model decide whether an index delivers it or a temp
//! index materializes it. A reversed sort reads the same order backwards
//! by flipping the direction of every `get`.

use crate::data::cols::{contains, is_prefix};
use crate::data::{Dir, Fixed, Header, Record, Row};

use super::errors::{QueryError, QueryResult};
use super::node::{PlanState, Query};

pub struct Sort {
    pub(crate) plan: PlanState,
    pub(crate) src: Box<Query>,
    pub(crate) cols: Vec<String>,
    pub(crate) reverse: bool,
}

impl Sort {
    pub(crate) fn new(src: Query, cols: Vec<String>, reverse: bool) -> QueryResult<Sort> {
        let columns = src.columns();
        for c in &cols {
            if !contains(&columns, c) {
                return Err(QueryError::unknown_column(c.clone()));
            }
        }
        Ok(Sort {
            plan: PlanState::default(),
            src: Box::new(src),
            cols,
            reverse,
        })
    }

    pub(crate) fn columns(&self) -> Vec<String> {
        self.src.columns()
    }

    pub(crate) fn keys(&self) -> Vec<Vec<String>> {
        self.src.keys()
    }

    pub(crate) fn fixed(&self) -> Vec<Fixed> {
        self.src.fixed()
    }

    pub(crate) fn header(&self) -> Header {
        self.src.header()
    }

    pub(crate) fn nrecords(&self) -> u64 {
        self.src.nrecords()
    }

    pub(crate) fn totalsize(&self) -> u64 {
        self.src.totalsize()
    }

    pub(crate) fn optimize2(
        &mut self,
        index: &[String],
        needs: &[String],
        firstneeds: &[String],
        is_cursor: bool,
        freeze: bool,
    ) -> f64 {
        // sort defines the output order itself; a caller may only ask for
        // a prefix of it
        if !index.is_empty() && !is_prefix(index, &self.cols) {
            return crate::plan::cost::IMPOSSIBLE;
        }
        let order = self.cols.clone();
        self.src.optimize(&order, needs, firstneeds, is_cursor, freeze)
    }

    pub(crate) fn select(&mut self, cols: &[String], vals: &Record) -> QueryResult<()> {
        self.src.select(cols, vals)
    }

    pub(crate) fn rewind(&mut self) {
        self.src.rewind();
    }

    pub(crate) fn get(&mut self, dir: Dir) -> QueryResult<Option<Row>> {
        let dir = if self.reverse { dir.reverse() } else { dir };
        self.src.get(dir)
    }

    pub(crate) fn explain(&self) -> String {
        format!(
            "{} SORT{} {}",
            self.src.explain(),
            if self.reverse { " REVERSE" } else { "" },
            self.cols.join(",")
        )
    }
}
