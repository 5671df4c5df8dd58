//! Cartesian product
//!
//! Nested-loop pairing of two sources that share no columns. The inner
//! source is re-scanned once per outer row; the boundary semantics of
//! `get` make the rescan implicit, which is also what keeps backward
//! iteration the exact mirror of forward iteration.
//!
//! Either operand may be the outer loop; the cost model picks.

use crate::data::cols::{intersect, subset};
use crate::data::{combine, Dir, Fixed, Header, Record, Row};
use crate::plan::cost::{is_impossible, IMPOSSIBLE};

use super::errors::{QueryError, QueryResult};
use super::node::{PlanState, Query};

pub struct Product {
    pub(crate) plan: PlanState,
    pub(crate) src1: Box<Query>,
    pub(crate) src2: Box<Query>,
    /// src2 drives the outer loop.
    swapped: bool,
    rowo: Option<Row>,
}

impl Product {
    pub(crate) fn new(src1: Query, src2: Query) -> QueryResult<Product> {
        let common = intersect(&src1.columns(), &src2.columns());
        if !common.is_empty() {
            return Err(QueryError::common_columns(&common));
        }
        Ok(Product {
            plan: PlanState::default(),
            src1: Box::new(src1),
            src2: Box::new(src2),
            swapped: false,
            rowo: None,
        })
    }

    pub(crate) fn columns(&self) -> Vec<String> {
        crate::data::cols::union(&self.src1.columns(), &self.src2.columns())
    }

    pub(crate) fn keys(&self) -> Vec<Vec<String>> {
        let mut keys = Vec::new();
        for k1 in self.src1.keys() {
            for k2 in self.src2.keys() {
                keys.push(crate::data::cols::union(&k1, &k2));
            }
        }
        keys
    }

    pub(crate) fn fixed(&self) -> Vec<Fixed> {
        combine(self.src1.fixed(), self.src2.fixed())
    }

    pub(crate) fn header(&self) -> Header {
        self.src1.header().append(&self.src2.header())
    }

    pub(crate) fn nrecords(&self) -> u64 {
        self.src1.nrecords().saturating_mul(self.src2.nrecords())
    }

    pub(crate) fn totalsize(&self) -> u64 {
        let per1 = self.src1.totalsize() / self.src1.nrecords().max(1);
        let per2 = self.src2.totalsize() / self.src2.nrecords().max(1);
        self.nrecords().saturating_mul(per1 + per2)
    }

    fn orient_cost(
        outer: &mut Query,
        inner: &mut Query,
        index: &[String],
        needs: &[String],
        firstneeds: &[String],
        is_cursor: bool,
        freeze: bool,
    ) -> f64 {
        if !subset(index, &outer.columns()) {
            return IMPOSSIBLE;
        }
        let ocols = outer.columns();
        let icols = inner.columns();
        let c1 = outer.optimize(
            index,
            &intersect(needs, &ocols),
            &intersect(firstneeds, &ocols),
            is_cursor,
            freeze,
        );
        let c2 = inner.optimize(
            &[],
            &intersect(needs, &icols),
            &intersect(needs, &icols),
            is_cursor,
            freeze,
        );
        if is_impossible(c1) || is_impossible(c2) {
            return IMPOSSIBLE;
        }
        c1 + outer.nrecords().max(1) as f64 * c2
    }

    pub(crate) fn optimize2(
        &mut self,
        index: &[String],
        needs: &[String],
        firstneeds: &[String],
        is_cursor: bool,
        freeze: bool,
    ) -> f64 {
        let cost1 = Self::orient_cost(
            &mut self.src1,
            &mut self.src2,
            index,
            needs,
            firstneeds,
            is_cursor,
            false,
        );
        let cost2 = Self::orient_cost(
            &mut self.src2,
            &mut self.src1,
            index,
            needs,
            firstneeds,
            is_cursor,
            false,
        );
        let cost = cost1.min(cost2);
        if is_impossible(cost) {
            return IMPOSSIBLE;
        }
        if freeze {
            self.swapped = cost2 < cost1;
            if self.swapped {
                Self::orient_cost(
                    &mut self.src2,
                    &mut self.src1,
                    index,
                    needs,
                    firstneeds,
                    is_cursor,
                    true,
                );
            } else {
                Self::orient_cost(
                    &mut self.src1,
                    &mut self.src2,
                    index,
                    needs,
                    firstneeds,
                    is_cursor,
                    true,
                );
            }
        }
        cost
    }

    pub(crate) fn select(&mut self, cols: &[String], vals: &Record) -> QueryResult<()> {
        self.rowo = None;
        let outer = if self.swapped {
            &mut self.src2
        } else {
            &mut self.src1
        };
        outer.select(cols, vals)
    }

    pub(crate) fn rewind(&mut self) {
        self.rowo = None;
        self.src1.rewind();
        self.src2.rewind();
    }

    pub(crate) fn get(&mut self, dir: Dir) -> QueryResult<Option<Row>> {
        loop {
            if self.rowo.is_none() {
                let ro = if self.swapped {
                    self.src2.get(dir)?
                } else {
                    self.src1.get(dir)?
                };
                if ro.is_none() {
                    return Ok(None);
                }
                self.rowo = ro;
            }
            let ri = if self.swapped {
                self.src1.get(dir)?
            } else {
                self.src2.get(dir)?
            };
            match ri {
                Some(ri) => {
                    let ro = match &self.rowo {
                        Some(r) => r.clone(),
                        None => return Ok(None),
                    };
                    // slot order always follows src1 then src2
                    let row = if self.swapped {
                        ri.stack(&ro)
                    } else {
                        ro.stack(&ri)
                    };
                    return Ok(Some(row));
                }
                None => {
                    // inner exhausted: back to its boundary, advance outer
                    self.rowo = None;
                }
            }
        }
    }

    pub(crate) fn explain(&self) -> String {
        format!("({}) TIMES ({})", self.src1.explain(), self.src2.explain())
    }
}
