//! Natural join
//!
//! Joins on the intersection of the operands' columns, which must be
//! non-empty. Execution scans the left source and probes the right
//! through an equality selection on the join columns, so the planner
//! freezes the right side ordered by them (materializing a temp index if
//! nothing delivers that order). An inner join may swap its operands when
//! scanning the other side first is cheaper; a left join cannot, since
//! its unmatched-row semantics are tied to the left operand.
//!
//! For a left join, a left row with no matches comes out exactly once,
//! carrying no right-side record; the header reads its right columns as
//! empty.

use crate::data::cols::{intersect, subset, union};
use crate::data::{combine, Dir, Fixed, Header, Record, Row};
use crate::plan::cost::{is_impossible, IMPOSSIBLE, OUT_OF_ORDER};

use super::errors::{QueryError, QueryResult};
use super::node::{PlanState, Query};

/// Join cardinality, derived from which sides are keyed on the join
/// columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JoinType {
    OneOne,
    NOne,
    OneN,
    NN,
}

impl JoinType {
    fn as_str(self) -> &'static str {
        match self {
            JoinType::OneOne => "1:1",
            JoinType::NOne => "n:1",
            JoinType::OneN => "1:n",
            JoinType::NN => "n:n",
        }
    }
}

pub struct Join {
    pub(crate) plan: PlanState,
    pub(crate) src1: Box<Query>,
    pub(crate) src2: Box<Query>,
    pub(crate) joincols: Vec<String>,
    pub(crate) outer: bool,
    row1: Option<Row>,
    row2active: bool,
    matched: bool,
    hdr1: Option<Header>,
}

impl Join {
    pub(crate) fn new(src1: Query, src2: Query, outer: bool) -> QueryResult<Join> {
        let joincols = intersect(&src1.columns(), &src2.columns());
        if joincols.is_empty() {
            return Err(QueryError::no_common_columns());
        }
        Ok(Join {
            plan: PlanState::default(),
            src1: Box::new(src1),
            src2: Box::new(src2),
            joincols,
            outer,
            row1: None,
            row2active: false,
            matched: false,
            hdr1: None,
        })
    }

    fn keyed_on(q: &Query, cols: &[String]) -> bool {
        q.keys().iter().any(|k| subset(k, cols))
    }

    fn jtype(&self) -> JoinType {
        let k1 = Self::keyed_on(&self.src1, &self.joincols);
        let k2 = Self::keyed_on(&self.src2, &self.joincols);
        match (k1, k2) {
            (true, true) => JoinType::OneOne,
            (false, true) => JoinType::NOne,
            (true, false) => JoinType::OneN,
            (false, false) => JoinType::NN,
        }
    }

    pub(crate) fn columns(&self) -> Vec<String> {
        union(&self.src1.columns(), &self.src2.columns())
    }

    pub(crate) fn keys(&self) -> Vec<Vec<String>> {
        match self.jtype() {
            JoinType::OneOne => {
                let mut keys = self.src1.keys();
                for k in self.src2.keys() {
                    if !keys.contains(&k) {
                        keys.push(k);
                    }
                }
                keys
            }
            JoinType::NOne => self.src1.keys(),
            JoinType::OneN if !self.outer => self.src2.keys(),
            _ => {
                let mut keys = Vec::new();
                for k1 in self.src1.keys() {
                    for k2 in self.src2.keys() {
                        keys.push(union(&k1, &k2));
                    }
                }
                keys
            }
        }
    }

    pub(crate) fn fixed(&self) -> Vec<Fixed> {
        if self.outer {
            self.src1.fixed()
        } else {
            combine(self.src1.fixed(), self.src2.fixed())
        }
    }

    pub(crate) fn header(&self) -> Header {
        self.src1.header().append(&self.src2.header())
    }

    pub(crate) fn nrecords(&self) -> u64 {
        let n1 = self.src1.nrecords();
        let n2 = self.src2.nrecords();
        match self.jtype() {
            JoinType::OneOne => {
                if self.outer {
                    n1
                } else {
                    n1.min(n2)
                }
            }
            JoinType::NOne => n1,
            JoinType::OneN => {
                if self.outer {
                    n1.max(n2)
                } else {
                    n2
                }
            }
            JoinType::NN => (n1.saturating_mul(n2) / 2).max(n1),
        }
    }

    pub(crate) fn totalsize(&self) -> u64 {
        self.src1.totalsize() + self.src2.totalsize()
    }

    fn orient_cost(
        outer_src: &mut Query,
        probed: &mut Query,
        joincols: &[String],
        index: &[String],
        needs: &[String],
        firstneeds: &[String],
        is_cursor: bool,
        freeze: bool,
    ) -> f64 {
        if !subset(index, &outer_src.columns()) {
            return IMPOSSIBLE;
        }
        let ocols = outer_src.columns();
        let pcols = probed.columns();
        let c1 = outer_src.optimize(
            index,
            &union(&intersect(needs, &ocols), joincols),
            &union(&intersect(firstneeds, &ocols), joincols),
            is_cursor,
            freeze,
        );
        let c2 = probed.optimize(
            joincols,
            &union(&intersect(needs, &pcols), joincols),
            joincols,
            is_cursor,
            freeze,
        );
        if is_impossible(c1) || is_impossible(c2) {
            return IMPOSSIBLE;
        }
        c1 + c2 + outer_src.nrecords() as f64 * OUT_OF_ORDER
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
            &self.joincols,
            index,
            needs,
            firstneeds,
            is_cursor,
            false,
        );
        // an inner join may scan the other side first
        let cost2 = if self.outer {
            IMPOSSIBLE
        } else {
            Self::orient_cost(
                &mut self.src2,
                &mut self.src1,
                &self.joincols,
                index,
                needs,
                firstneeds,
                is_cursor,
                false,
            )
        };
        let cost = cost1.min(cost2);
        if is_impossible(cost) {
            return IMPOSSIBLE;
        }
        if freeze {
            if cost2 < cost1 {
                std::mem::swap(&mut self.src1, &mut self.src2);
            }
            Self::orient_cost(
                &mut self.src1,
                &mut self.src2,
                &self.joincols,
                index,
                needs,
                firstneeds,
                is_cursor,
                true,
            );
        }
        cost
    }

    fn reset(&mut self) {
        self.row1 = None;
        self.row2active = false;
        self.matched = false;
    }

    pub(crate) fn select(&mut self, cols: &[String], vals: &Record) -> QueryResult<()> {
        self.reset();
        self.src1.select(cols, vals)
    }

    pub(crate) fn rewind(&mut self) {
        self.reset();
        self.src1.rewind();
        self.src2.rewind();
    }

    pub(crate) fn get(&mut self, dir: Dir) -> QueryResult<Option<Row>> {
        let hdr1 = match &self.hdr1 {
            Some(h) => h.clone(),
            None => {
                let h = self.src1.header();
                self.hdr1 = Some(h.clone());
                h
            }
        };
        loop {
            if !self.row2active {
                let r1 = match self.src1.get(dir)? {
                    Some(r) => r,
                    None => return Ok(None),
                };
                let key = hdr1.key_of(&r1, &self.joincols);
                self.src2.select(&self.joincols, &key)?;
                self.row1 = Some(r1);
                self.matched = false;
                self.row2active = true;
            }
            let r1 = match &self.row1 {
                Some(r) => r.clone(),
                None => return Ok(None),
            };
            match self.src2.get(dir)? {
                Some(r2) => {
                    self.matched = true;
                    return Ok(Some(r1.stack(&r2)));
                }
                None => {
                    self.row2active = false;
                    if self.outer && !self.matched {
                        // unmatched left row, no right-side record
                        return Ok(Some(r1));
                    }
                }
            }
        }
    }

    pub(crate) fn explain(&self) -> String {
        format!(
            "({}) {}-{} ({})",
            self.src1.explain(),
            if self.outer { "LEFTJOIN" } else { "JOIN" },
            self.jtype().as_str(),
            self.src2.explain()
        )
    }
}
