//! Grouped aggregation
//!
//! Groups rows by the `by` columns and emits one synthesized row per
//! group carrying the group values and the aggregate results. Two
//! strategies:
//!
//! - COPY: the `by` columns contain a source key, so every group is a
//!   single row and rows stream through one at a time.
//! - SEQUENTIAL: the source is read grouped (ordered by `by`), and each
//!   group is folded as its rows arrive. Groups stay adjacent when the
//!   scan reverses, so backward iteration emits the same groups in
//!   reverse order.
//!
//! An empty `by` aggregates the whole input into one row.

use crate::data::cols::{contains, subset, union};
use crate::data::{Dir, Fixed, Header, Record, Row, Value};

use super::errors::{QueryError, QueryResult};
use super::node::{PlanState, Query};

/// Aggregate operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggOp {
    /// Number of rows in the group
    Count,
    /// Numeric sum
    Total,
    /// Numeric mean
    Average,
    /// Smallest value by the standard value ordering
    Min,
    /// Largest value by the standard value ordering
    Max,
}

/// One aggregate column of a summarize.
#[derive(Debug, Clone)]
pub struct Agg {
    /// Result column name
    pub name: String,
    /// Operation
    pub op: AggOp,
    /// Source column; `None` only for `Count`
    pub col: Option<String>,
}

impl Agg {
    /// A row count.
    pub fn count(name: impl Into<String>) -> Agg {
        Agg {
            name: name.into(),
            op: AggOp::Count,
            col: None,
        }
    }

    /// An aggregate over a source column.
    pub fn of(name: impl Into<String>, op: AggOp, col: impl Into<String>) -> Agg {
        Agg {
            name: name.into(),
            op,
            col: Some(col.into()),
        }
    }
}

enum Accum {
    Count(u64),
    Total(f64),
    Average { sum: f64, n: u64 },
    Min(Option<Value>),
    Max(Option<Value>),
}

impl Accum {
    fn new(op: AggOp) -> Accum {
        match op {
            AggOp::Count => Accum::Count(0),
            AggOp::Total => Accum::Total(0.0),
            AggOp::Average => Accum::Average { sum: 0.0, n: 0 },
            AggOp::Min => Accum::Min(None),
            AggOp::Max => Accum::Max(None),
        }
    }

    fn add(&mut self, v: Value) {
        match self {
            Accum::Count(n) => *n += 1,
            Accum::Total(sum) => {
                if let Some(x) = v.as_number() {
                    *sum += x;
                }
            }
            Accum::Average { sum, n } => {
                if let Some(x) = v.as_number() {
                    *sum += x;
                    *n += 1;
                }
            }
            Accum::Min(cur) => {
                if cur.as_ref().map_or(true, |c| v < *c) {
                    *cur = Some(v);
                }
            }
            Accum::Max(cur) => {
                if cur.as_ref().map_or(true, |c| v > *c) {
                    *cur = Some(v);
                }
            }
        }
    }

    fn result(self) -> Value {
        match self {
            Accum::Count(n) => Value::Int(n as i64),
            Accum::Total(sum) => number(sum),
            Accum::Average { sum, n } => {
                if n == 0 {
                    Value::empty()
                } else {
                    number(sum / n as f64)
                }
            }
            Accum::Min(cur) | Accum::Max(cur) => cur.unwrap_or_else(Value::empty),
        }
    }
}

/// Integral results stay integers.
fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::Int(n as i64)
    } else {
        Value::from_float(n)
    }
}

pub struct Summarize {
    pub(crate) plan: PlanState,
    pub(crate) src: Box<Query>,
    pub(crate) by: Vec<String>,
    pub(crate) aggs: Vec<Agg>,
    copy: bool,
    /// Key of the last emitted group (sequential).
    cur: Option<Record>,
    /// First row of the next group, already pulled from the source.
    look: Option<Row>,
    look_dir: Option<Dir>,
    hdr: Option<Header>,
}

impl Summarize {
    pub(crate) fn new(src: Query, by: Vec<String>, aggs: Vec<Agg>) -> QueryResult<Summarize> {
        let columns = src.columns();
        for c in &by {
            if !contains(&columns, c) {
                return Err(QueryError::unknown_column(c.clone()));
            }
        }
        for (i, a) in aggs.iter().enumerate() {
            if contains(&by, &a.name) || aggs[..i].iter().any(|b| b.name == a.name) {
                return Err(QueryError::duplicate_column(a.name.clone()));
            }
            match (&a.col, a.op) {
                (None, AggOp::Count) => {}
                (None, _) => return Err(QueryError::unknown_column(a.name.clone())),
                (Some(c), _) => {
                    if !contains(&columns, c) {
                        return Err(QueryError::unknown_column(c.clone()));
                    }
                }
            }
        }
        Ok(Summarize {
            plan: PlanState::default(),
            src: Box::new(src),
            by,
            aggs,
            copy: false,
            cur: None,
            look: None,
            look_dir: None,
            hdr: None,
        })
    }

    fn agg_cols(&self) -> Vec<String> {
        let mut out = Vec::new();
        for a in &self.aggs {
            if let Some(c) = &a.col {
                if !contains(&out, c) {
                    out.push(c.clone());
                }
            }
        }
        out
    }

    /// True if every group is a single source row.
    fn key_within_by(&self) -> bool {
        self.src.keys().iter().any(|k| subset(k, &self.by))
    }

    pub(crate) fn columns(&self) -> Vec<String> {
        let names: Vec<String> = self.aggs.iter().map(|a| a.name.clone()).collect();
        union(&self.by, &names)
    }

    pub(crate) fn keys(&self) -> Vec<Vec<String>> {
        vec![self.by.clone()]
    }

    pub(crate) fn fixed(&self) -> Vec<Fixed> {
        self.src
            .fixed()
            .into_iter()
            .filter(|f| contains(&self.by, &f.col))
            .collect()
    }

    pub(crate) fn header(&self) -> Header {
        Header::single(self.columns())
    }

    pub(crate) fn nrecords(&self) -> u64 {
        if self.key_within_by() {
            self.src.nrecords()
        } else {
            (self.src.nrecords() / 2).max(1)
        }
    }

    pub(crate) fn totalsize(&self) -> u64 {
        self.nrecords() * self.columns().len() as u64 * 8
    }

    pub(crate) fn optimize2(
        &mut self,
        index: &[String],
        _needs: &[String],
        _firstneeds: &[String],
        is_cursor: bool,
        freeze: bool,
    ) -> f64 {
        // result ordering can only come from the group columns
        if !subset(index, &self.by) {
            return crate::plan::cost::IMPOSSIBLE;
        }
        let srcneeds = union(&self.by, &self.agg_cols());
        if self.key_within_by() {
            if freeze {
                self.copy = true;
            }
            self.src
                .optimize(index, &srcneeds, &srcneeds, is_cursor, freeze)
        } else {
            let order = union(index, &self.by);
            if freeze {
                self.copy = false;
            }
            self.src
                .optimize(&order, &srcneeds, &srcneeds, is_cursor, freeze)
        }
    }

    fn reset(&mut self) {
        self.cur = None;
        self.look = None;
        self.look_dir = None;
    }

    pub(crate) fn select(&mut self, cols: &[String], vals: &Record) -> QueryResult<()> {
        self.reset();
        self.src.select(cols, vals)
    }

    pub(crate) fn rewind(&mut self) {
        self.reset();
        self.src.rewind();
    }

    fn src_header(&mut self) -> Header {
        match &self.hdr {
            Some(h) => h.clone(),
            None => {
                let h = self.src.header();
                self.hdr = Some(h.clone());
                h
            }
        }
    }

    /// Builds the output row for one group.
    fn emit(&self, key: &Record, accums: Vec<Accum>) -> Row {
        let mut rec = Record::new(key.fields().cloned().collect());
        for a in accums {
            rec.push(a.result());
        }
        Row::single(rec)
    }

    fn accumulate(&self, hdr: &Header, accums: &mut [Accum], row: &Row) {
        for (a, acc) in self.aggs.iter().zip(accums.iter_mut()) {
            let v = match &a.col {
                Some(c) => hdr.get(row, c),
                None => Value::empty(),
            };
            acc.add(v);
        }
    }

    pub(crate) fn get(&mut self, dir: Dir) -> QueryResult<Option<Row>> {
        let hdr = self.src_header();
        if self.copy {
            let row = match self.src.get(dir)? {
                Some(r) => r,
                None => return Ok(None),
            };
            let key = hdr.key_of(&row, &self.by);
            let mut accums: Vec<Accum> = self.aggs.iter().map(|a| Accum::new(a.op)).collect();
            self.accumulate(&hdr, &mut accums, &row);
            return Ok(Some(self.emit(&key, accums)));
        }
        // direction change: drop the lookahead and skip what remains of
        // the group already emitted
        if self.look_dir != Some(dir) {
            self.look = None;
            if let Some(cur) = self.cur.clone() {
                loop {
                    match self.src.get(dir)? {
                        None => break,
                        Some(r) => {
                            if hdr.key_of(&r, &self.by) != cur {
                                self.look = Some(r);
                                break;
                            }
                        }
                    }
                }
            }
            self.look_dir = Some(dir);
        }
        let first = match self.look.take() {
            Some(r) => r,
            None => match self.src.get(dir)? {
                Some(r) => r,
                None => {
                    self.cur = None;
                    self.look_dir = None;
                    return Ok(None);
                }
            },
        };
        let key = hdr.key_of(&first, &self.by);
        let mut accums: Vec<Accum> = self.aggs.iter().map(|a| Accum::new(a.op)).collect();
        self.accumulate(&hdr, &mut accums, &first);
        loop {
            match self.src.get(dir)? {
                None => break,
                Some(r) => {
                    if hdr.key_of(&r, &self.by) == key {
                        self.accumulate(&hdr, &mut accums, &r);
                    } else {
                        self.look = Some(r);
                        break;
                    }
                }
            }
        }
        self.cur = Some(key.clone());
        Ok(Some(self.emit(&key, accums)))
    }

    pub(crate) fn explain(&self) -> String {
        format!(
            "{} SUMMARIZE-{} {}",
            self.src.explain(),
            if self.copy { "COPY" } else { "SEQ" },
            self.columns().join(",")
        )
    }
}
