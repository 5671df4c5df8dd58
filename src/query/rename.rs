//! Column renaming
//!
//! Pure relabeling: rows pass through untouched and the header carries
//! the substitution. Optimization maps the requested ordering and column
//! sets back to source names and delegates.

use crate::data::cols::contains;
use crate::data::{Dir, Fixed, Header, Record, Row};

use super::errors::{QueryError, QueryResult};
use super::node::{PlanState, Query};

pub struct Rename {
    pub(crate) plan: PlanState,
    pub(crate) src: Box<Query>,
    pub(crate) from: Vec<String>,
    pub(crate) to: Vec<String>,
}

impl Rename {
    pub(crate) fn new(src: Query, mut from: Vec<String>, mut to: Vec<String>) -> QueryResult<Rename> {
        let columns = src.columns();
        if from.len() != to.len() {
            return Err(QueryError::unknown_column("<unbalanced rename>"));
        }
        for (f, t) in from.iter().zip(&to) {
            if !contains(&columns, f) {
                return Err(QueryError::unknown_column(f.clone()));
            }
            // a target may reuse a name being renamed away (a swap), but
            // not collide with a surviving column or another target
            if (contains(&columns, t) && !contains(&from, t))
                || to.iter().filter(|x| *x == t).count() > 1
            {
                return Err(QueryError::duplicate_column(t.clone()));
            }
        }
        // dependency columns follow their base column
        for i in 0..from.len() {
            let fdeps = format!("{}_deps", from[i]);
            if contains(&columns, &fdeps) && !contains(&from, &fdeps) {
                let tdeps = format!("{}_deps", to[i]);
                from.push(fdeps);
                to.push(tdeps);
            }
        }
        Ok(Rename {
            plan: PlanState::default(),
            src: Box::new(src),
            from,
            to,
        })
    }

    fn to_src(&self, cols: &[String]) -> Vec<String> {
        cols.iter()
            .map(|c| match self.to.iter().position(|t| t == c) {
                Some(i) => self.from[i].clone(),
                None => c.clone(),
            })
            .collect()
    }

    fn from_src(&self, cols: &[String]) -> Vec<String> {
        cols.iter()
            .map(|c| match self.from.iter().position(|f| f == c) {
                Some(i) => self.to[i].clone(),
                None => c.clone(),
            })
            .collect()
    }

    pub(crate) fn columns(&self) -> Vec<String> {
        self.from_src(&self.src.columns())
    }

    pub(crate) fn keys(&self) -> Vec<Vec<String>> {
        self.src.keys().iter().map(|k| self.from_src(k)).collect()
    }

    pub(crate) fn fixed(&self) -> Vec<Fixed> {
        self.src
            .fixed()
            .into_iter()
            .map(|f| Fixed {
                col: self.from_src(std::slice::from_ref(&f.col)).remove(0),
                values: f.values,
            })
            .collect()
    }

    pub(crate) fn header(&self) -> Header {
        self.src.header().rename(&self.from, &self.to)
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
        let index2 = self.to_src(index);
        let needs2 = self.to_src(needs);
        let firstneeds2 = self.to_src(firstneeds);
        self.src
            .optimize(&index2, &needs2, &firstneeds2, is_cursor, freeze)
    }

    pub(crate) fn select(&mut self, cols: &[String], vals: &Record) -> QueryResult<()> {
        let cols2 = self.to_src(cols);
        self.src.select(&cols2, vals)
    }

    pub(crate) fn rewind(&mut self) {
        self.src.rewind();
    }

    pub(crate) fn get(&mut self, dir: Dir) -> QueryResult<Option<Row>> {
        self.src.get(dir)
    }

    pub(crate) fn explain(&self) -> String {
        let pairs: Vec<String> = self
            .from
            .iter()
            .zip(&self.to)
            .map(|(f, t)| format!("{} to {}", f, t))
            .collect();
        format!("{} RENAME {}", self.src.explain(), pairs.join(", "))
    }
}
