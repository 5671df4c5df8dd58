//! Column projection
//!
//! Projection is a set operation: dropping columns can make rows equal,
//! and equal rows must come out once. Two strategies:
//!
//! - COPY: some source key survives the projection, so rows are already
//!   distinct and pass straight through.
//! - SEQUENTIAL: the source is read in an order that puts rows with equal
//!   projections next to each other; all but the first of each run are
//!   skipped. Works identically in both directions because equal
//!   projections stay adjacent when the scan is reversed.

use crate::data::cols::{contains, difference, subset, union};
use crate::data::{Dir, Fixed, Header, Record, Row};

use super::errors::{QueryError, QueryResult};
use super::node::{PlanState, Query};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    Copy,
    Sequential,
}

pub struct Project {
    pub(crate) plan: PlanState,
    pub(crate) src: Box<Query>,
    pub(crate) cols: Vec<String>,
    strategy: Strategy,
    /// Key of the last emitted row's projection (sequential dedup).
    cur: Option<Record>,
    hdr: Option<Header>,
}

impl Project {
    pub(crate) fn keep(src: Query, mut cols: Vec<String>) -> QueryResult<Project> {
        let columns = src.columns();
        for (i, c) in cols.iter().enumerate() {
            if !contains(&columns, c) {
                return Err(QueryError::unknown_column(c.clone()));
            }
            if cols[..i].contains(c) {
                return Err(QueryError::duplicate_column(c.clone()));
            }
        }
        // dependency columns follow their base column
        for c in cols.clone() {
            let deps = format!("{}_deps", c);
            if contains(&columns, &deps) && !contains(&cols, &deps) {
                cols.push(deps);
            }
        }
        Ok(Project::build(src, cols))
    }

    pub(crate) fn remove(src: Query, cols: Vec<String>) -> QueryResult<Project> {
        let columns = src.columns();
        for c in &cols {
            if !contains(&columns, c) {
                return Err(QueryError::unknown_column(c.clone()));
            }
        }
        let keep = difference(&columns, &cols);
        Ok(Project::build(src, keep))
    }

    fn build(src: Query, cols: Vec<String>) -> Project {
        Project {
            plan: PlanState::default(),
            src: Box::new(src),
            cols,
            strategy: Strategy::Sequential,
            cur: None,
            hdr: None,
        }
    }

    /// True if some source key survives the projection (no dedup needed).
    fn key_survives(&self) -> bool {
        self.src.keys().iter().any(|k| subset(k, &self.cols))
    }

    /// True once freeze committed the pass-through strategy.
    pub(crate) fn is_copy(&self) -> bool {
        self.strategy == Strategy::Copy
    }

    pub(crate) fn columns(&self) -> Vec<String> {
        self.cols.clone()
    }

    pub(crate) fn keys(&self) -> Vec<Vec<String>> {
        let keys: Vec<Vec<String>> = self
            .src
            .keys()
            .into_iter()
            .filter(|k| subset(k, &self.cols))
            .collect();
        if keys.is_empty() {
            // projection deduplicates, so the whole column set is a key
            vec![self.cols.clone()]
        } else {
            keys
        }
    }

    pub(crate) fn fixed(&self) -> Vec<Fixed> {
        self.src
            .fixed()
            .into_iter()
            .filter(|f| contains(&self.cols, &f.col))
            .collect()
    }

    pub(crate) fn header(&self) -> Header {
        self.src.header().project(&self.cols)
    }

    pub(crate) fn nrecords(&self) -> u64 {
        if self.key_survives() {
            self.src.nrecords()
        } else {
            self.src.nrecords() / 2
        }
    }

    pub(crate) fn totalsize(&self) -> u64 {
        let srccols = self.src.columns().len().max(1) as u64;
        self.src.totalsize() * self.cols.len() as u64 / srccols
    }

    pub(crate) fn optimize2(
        &mut self,
        index: &[String],
        needs: &[String],
        firstneeds: &[String],
        is_cursor: bool,
        freeze: bool,
    ) -> f64 {
        if self.key_survives() {
            if freeze {
                self.strategy = Strategy::Copy;
            }
            self.src.optimize(index, needs, firstneeds, is_cursor, freeze)
        } else {
            // need the source ordered so equal projections are adjacent:
            // the requested ordering extended to cover every kept column
            let order = union(index, &self.cols);
            if freeze {
                self.strategy = Strategy::Sequential;
            }
            self.src
                .optimize(&order, &self.cols, &self.cols, is_cursor, freeze)
        }
    }

    pub(crate) fn select(&mut self, cols: &[String], vals: &Record) -> QueryResult<()> {
        self.cur = None;
        self.src.select(cols, vals)
    }

    pub(crate) fn rewind(&mut self) {
        self.cur = None;
        self.src.rewind();
    }

    pub(crate) fn get(&mut self, dir: Dir) -> QueryResult<Option<Row>> {
        if self.strategy == Strategy::Copy {
            return self.src.get(dir);
        }
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
                None => {
                    self.cur = None;
                    return Ok(None);
                }
            };
            let key = hdr.key_of(&row, &self.cols);
            if self.cur.as_ref() == Some(&key) {
                continue;
            }
            self.cur = Some(key);
            return Ok(Some(row));
        }
    }

    pub(crate) fn explain(&self) -> String {
        let tag = match self.strategy {
            Strategy::Copy => "PROJECT-COPY",
            Strategy::Sequential => "PROJECT-SEQ",
        };
        format!("{} {} {}", self.src.explain(), tag, self.cols.join(","))
    }
}
