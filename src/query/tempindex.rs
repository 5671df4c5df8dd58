//! Temporary index
//!
//! Inserted by the planner above any node whose cheapest route to a
//! requested ordering is "read unordered, then sort". The source is
//! drained once on first access into a sorted (key, row) snapshot; after
//! that the node behaves like a physical index cursor: range-restricted,
//! bidirectional, rewindable.
//!
//! When the ordering does not contain a key of the source, equal keys are
//! kept distinct by appending an insertion sequence number.

use crate::data::{Dir, Fixed, Header, Keyrange, Record, Row, Value};
use crate::observability::{metrics, Logger};

use super::errors::{QueryError, QueryResult};
use super::node::{PlanState, Query};

/// Ceiling on one sort key's size in bytes.
const KEY_LIMIT: usize = 4096;

/// Cursor position within the selected window. Exhaustion parks the
/// cursor at the boundary it ran off, so a repeated `get` in the same
/// direction stays at the end instead of restarting.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Pos {
    Fresh,
    At(usize),
    Before,
    After,
}

pub struct TempIndex {
    pub(crate) plan: PlanState,
    pub(crate) src: Box<Query>,
    pub(crate) order: Vec<String>,
    unique: bool,
    entries: Option<Vec<(Record, Row)>>,
    range: Keyrange,
    lo: usize,
    hi: usize,
    pos: Pos,
}

/// Half-open `[lo, hi)` window of sorted entries inside the range.
fn window(entries: &[(Record, Row)], range: &Keyrange) -> (usize, usize) {
    let lo = entries.partition_point(|e| range.before_start(&e.0));
    let hi = entries.partition_point(|e| !range.past_end(&e.0));
    (lo, hi.max(lo))
}

impl TempIndex {
    pub(crate) fn new(src: Query, order: Vec<String>, unique: bool) -> TempIndex {
        TempIndex {
            plan: PlanState::default(),
            src: Box::new(src),
            order,
            unique,
            entries: None,
            range: Keyrange::all(),
            lo: 0,
            hi: 0,
            pos: Pos::Fresh,
        }
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
        _index: &[String],
        _needs: &[String],
        _firstneeds: &[String],
        _is_cursor: bool,
        _freeze: bool,
    ) -> f64 {
        // created after planning; never optimized
        crate::plan::cost::IMPOSSIBLE
    }

    fn build(&mut self) -> QueryResult<()> {
        if self.entries.is_some() {
            return Ok(());
        }
        let hdr = self.src.header();
        self.src.rewind();
        let mut entries: Vec<(Record, Row)> = Vec::new();
        let mut seq: i64 = 0;
        while let Some(row) = self.src.get(Dir::Next)? {
            let mut key = hdr.key_of(&row, &self.order);
            if key.size() as usize > KEY_LIMIT {
                return Err(QueryError::key_too_large(key.size() as usize, KEY_LIMIT));
            }
            if !self.unique {
                key.push(Value::Int(seq));
                seq += 1;
            }
            entries.push((key, row));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        metrics().increment_tempindexes_built();
        metrics().add_tempindex_rows(entries.len() as u64);
        Logger::info(
            "TEMPINDEX_BUILT",
            &[
                ("order", &self.order.join(",")),
                ("rows", &entries.len().to_string()),
            ],
        );
        let (lo, hi) = window(&entries, &self.range);
        self.lo = lo;
        self.hi = hi;
        self.entries = Some(entries);
        Ok(())
    }

    pub(crate) fn select(&mut self, cols: &[String], vals: &Record) -> QueryResult<()> {
        if cols.is_empty() {
            self.range = Keyrange::all();
        } else {
            if !crate::data::cols::is_prefix(cols, &self.order) {
                return Err(QueryError::infeasible(format!(
                    "select columns ({}) are not a prefix of the temp index ({})",
                    cols.join(","),
                    self.order.join(",")
                )));
            }
            self.range = Keyrange::prefix(vals.clone(), vals.clone());
        }
        if let Some(entries) = &self.entries {
            let (lo, hi) = window(entries, &self.range);
            self.lo = lo;
            self.hi = hi;
        }
        self.pos = Pos::Fresh;
        Ok(())
    }

    pub(crate) fn rewind(&mut self) {
        self.pos = Pos::Fresh;
    }

    pub(crate) fn get(&mut self, dir: Dir) -> QueryResult<Option<Row>> {
        self.build()?;
        let entries = match &self.entries {
            Some(e) => e,
            None => return Ok(None),
        };
        let found = match (dir, self.pos) {
            (Dir::Next, Pos::Fresh) | (Dir::Next, Pos::Before) => {
                (self.lo < self.hi).then_some(self.lo)
            }
            (Dir::Next, Pos::At(p)) => (p + 1 < self.hi).then_some(p + 1),
            (Dir::Next, Pos::After) => None,
            (Dir::Prev, Pos::Fresh) | (Dir::Prev, Pos::After) => {
                (self.lo < self.hi).then(|| self.hi - 1)
            }
            (Dir::Prev, Pos::At(p)) => (p > self.lo).then(|| p - 1),
            (Dir::Prev, Pos::Before) => None,
        };
        self.pos = match found {
            Some(i) => Pos::At(i),
            None => match dir {
                Dir::Next => Pos::After,
                Dir::Prev => Pos::Before,
            },
        };
        Ok(found.map(|i| entries[i].1.clone()))
    }

    pub(crate) fn explain(&self) -> String {
        format!(
            "{} TEMPINDEX{} {}",
            self.src.explain(),
            if self.unique { "" } else { "*" },
            self.order.join(",")
        )
    }
}
