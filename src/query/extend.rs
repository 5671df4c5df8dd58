//! Computed columns
//!
//! Extend appends a synthesized record to each source row carrying the
//! evaluated expressions. A `None` expression declares a rule column:
//! visible in the header but backed by no field, computed outside the
//! engine on demand. Expressions may reference columns introduced earlier
//! in the same extend.
//!
//! Extended columns can never drive an ordering, so any requested index
//! touching them is impossible here and falls back to a temp index above.

use crate::data::cols::{contains, difference, disjoint, union};
use crate::data::{combine, Dir, Fixed, Header, Record, Row};

use super::errors::{QueryError, QueryResult};
use super::expr::Expr;
use super::node::{PlanState, Query};

pub struct Extend {
    pub(crate) plan: PlanState,
    pub(crate) src: Box<Query>,
    pub(crate) cols: Vec<String>,
    pub(crate) exprs: Vec<Option<Expr>>,
    hdr: Option<Header>,
}

impl Extend {
    pub(crate) fn new(src: Query, cols: Vec<String>, exprs: Vec<Option<Expr>>) -> QueryResult<Extend> {
        let columns = src.columns();
        if cols.len() != exprs.len() {
            return Err(QueryError::unknown_column("<unbalanced extend>"));
        }
        for (i, c) in cols.iter().enumerate() {
            if contains(&columns, c) || cols[..i].contains(c) {
                return Err(QueryError::duplicate_column(c.clone()));
            }
            if let Some(e) = &exprs[i] {
                for ec in e.columns() {
                    // expressions may use source columns and earlier extends
                    if !contains(&columns, &ec) && !cols[..i].contains(&ec) {
                        return Err(QueryError::unknown_column(ec));
                    }
                }
            }
        }
        Ok(Extend {
            plan: PlanState::default(),
            src: Box::new(src),
            cols,
            exprs,
            hdr: None,
        })
    }

    /// Extended columns backed by a stored field (non-rule).
    fn phys_cols(&self) -> Vec<String> {
        self.cols
            .iter()
            .zip(&self.exprs)
            .filter(|(_, e)| e.is_some())
            .map(|(c, _)| c.clone())
            .collect()
    }

    /// Source columns any expression reads.
    fn expr_cols(&self) -> Vec<String> {
        let mut out = Vec::new();
        for e in self.exprs.iter().flatten() {
            out = union(&out, &e.columns());
        }
        difference(&out, &self.cols)
    }

    pub(crate) fn columns(&self) -> Vec<String> {
        union(&self.src.columns(), &self.cols)
    }

    pub(crate) fn keys(&self) -> Vec<Vec<String>> {
        self.src.keys()
    }

    pub(crate) fn fixed(&self) -> Vec<Fixed> {
        let mut own = Vec::new();
        for (c, e) in self.cols.iter().zip(&self.exprs) {
            if let Some(Expr::Constant(v)) = e {
                own.push(Fixed::single(c.clone(), v.clone()));
            }
        }
        combine(own, self.src.fixed())
    }

    pub(crate) fn header(&self) -> Header {
        self.src
            .header()
            .append(&Header::new(vec![self.phys_cols()], self.cols.clone()))
    }

    pub(crate) fn nrecords(&self) -> u64 {
        self.src.nrecords()
    }

    pub(crate) fn totalsize(&self) -> u64 {
        self.src.totalsize() + self.src.nrecords() * 8 * self.phys_cols().len() as u64
    }

    pub(crate) fn optimize2(
        &mut self,
        index: &[String],
        needs: &[String],
        firstneeds: &[String],
        is_cursor: bool,
        freeze: bool,
    ) -> f64 {
        if !disjoint(index, &self.cols) {
            return crate::plan::cost::IMPOSSIBLE;
        }
        let needs2 = union(&difference(needs, &self.cols), &self.expr_cols());
        let firstneeds2 = union(&difference(firstneeds, &self.cols), &self.expr_cols());
        self.src
            .optimize(index, &needs2, &firstneeds2, is_cursor, freeze)
    }

    pub(crate) fn select(&mut self, cols: &[String], vals: &Record) -> QueryResult<()> {
        self.src.select(cols, vals)
    }

    pub(crate) fn rewind(&mut self) {
        self.src.rewind();
    }

    pub(crate) fn get(&mut self, dir: Dir) -> QueryResult<Option<Row>> {
        let hdr = match &self.hdr {
            Some(h) => h.clone(),
            None => {
                let h = self.header();
                self.hdr = Some(h.clone());
                h
            }
        };
        let base = match self.src.get(dir)? {
            Some(row) => row,
            None => return Ok(None),
        };
        let mut rec = Record::empty();
        for e in self.exprs.iter().flatten() {
            // evaluate against the row so far, so later expressions see
            // earlier extended values
            let sofar = base.with_record(rec.clone());
            let v = e.eval(&hdr, &sofar);
            rec.push(v);
        }
        Ok(Some(base.with_record(rec)))
    }

    pub(crate) fn explain(&self) -> String {
        format!("{} EXTEND {}", self.src.explain(), self.cols.join(","))
    }
}
