//! Set operations
//!
//! Union, Intersect and Difference over two sources with the same column
//! set. Rows are compared field by field over all columns; emitted rows
//! are re-packed into a single record in column order so the result has a
//! uniform header regardless of which side a row came from.
//!
//! Strategy selection:
//!
//! - DISJOINT: some column is fixed to non-overlapping value sets on the
//!   two sides, proving them disjoint without reading data. Union becomes
//!   concatenation, Intersect is empty, Difference passes the left side
//!   through.
//! - MERGE: both sides read in full-row order and merged; the only
//!   strategy that can deliver a requested ordering.
//! - LOOKUP: one side streams through unordered while the other is probed
//!   through a key index. Both orientations are costed; Union emits probe
//!   misses from the streamed side after the probed side passes through,
//!   Intersect emits probe hits, Difference emits left rows the right
//!   side cannot match.

use crate::data::cols::{set_eq, union};
use crate::data::{Dir, Fixed, Header, Record, Row};
use crate::plan::cost::{is_impossible, IMPOSSIBLE, OUT_OF_ORDER};

use super::errors::{QueryError, QueryResult};
use super::node::{PlanState, Query};

/// The two operands plus what is shared between the set operations.
pub(crate) struct Sides {
    pub(crate) src1: Box<Query>,
    pub(crate) src2: Box<Query>,
}

impl Sides {
    fn new(src1: Query, src2: Query) -> QueryResult<Sides> {
        let c1 = src1.columns();
        let c2 = src2.columns();
        if !set_eq(&c1, &c2) {
            let missing = c1
                .iter()
                .find(|c| !c2.contains(c))
                .or_else(|| c2.iter().find(|c| !c1.contains(c)));
            return Err(QueryError::unknown_column(
                missing.cloned().unwrap_or_default(),
            ));
        }
        Ok(Sides {
            src1: Box::new(src1),
            src2: Box::new(src2),
        })
    }

    fn allcols(&self) -> Vec<String> {
        self.src1.columns()
    }

    /// A column whose fixed value sets on the two sides share nothing.
    pub(crate) fn disjoint(&self) -> Option<String> {
        let f1 = self.src1.fixed();
        let f2 = self.src2.fixed();
        for a in &f1 {
            for b in &f2 {
                if a.col == b.col && a.disjoint_values(b) {
                    return Some(a.col.clone());
                }
            }
        }
        None
    }
}

/// One side's lookahead during a merge: the next unemitted row, keyed by
/// the merge ordering, or a sticky end-of-data mark.
#[derive(Default)]
struct Fetch {
    look: Option<(Record, Row)>,
    eof: bool,
}

impl Fetch {
    fn reset(&mut self) {
        self.look = None;
        self.eof = false;
    }
}

/// True if `a` comes before `b` when iterating in `dir`.
fn before(dir: Dir, a: &Record, b: &Record) -> bool {
    match dir {
        Dir::Next => a < b,
        Dir::Prev => a > b,
    }
}

/// Pulls the next row strictly past `cur` in `dir`, packing it for
/// emission. Rows at or before `cur` were already emitted (or are
/// duplicates of emitted rows) and are skipped.
fn fetch_past(
    src: &mut Query,
    hdr: &Header,
    allcols: &[String],
    mergecols: &[String],
    f: &mut Fetch,
    cur: &Option<Record>,
    dir: Dir,
) -> QueryResult<()> {
    if f.eof || f.look.is_some() {
        return Ok(());
    }
    loop {
        match src.get(dir)? {
            None => {
                f.eof = true;
                return Ok(());
            }
            Some(r) => {
                let key = hdr.key_of(&r, mergecols);
                let past = match cur {
                    None => true,
                    Some(c) => before(dir, c, &key),
                };
                if past {
                    let packed = Row::single(hdr.key_of(&r, allcols));
                    f.look = Some((key, packed));
                    return Ok(());
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    Disjoint,
    Merge,
    Lookup,
}

/// Shortest candidate key of the probed side, used for equality probes.
fn probe_key(q: &Query) -> Option<Vec<String>> {
    q.keys()
        .into_iter()
        .filter(|k| !k.is_empty())
        .min_by_key(|k| k.len())
}

/// Cost of streaming `stream` unordered while probing `target` through
/// `ki`: the stream is read twice and every probe is an out-of-order read.
fn lookup_cost(
    target: &mut Query,
    stream: &mut Query,
    ki: &[String],
    allcols: &[String],
    is_cursor: bool,
) -> f64 {
    let ct = target.optimize(ki, allcols, allcols, is_cursor, false);
    let cs = stream.optimize(&[], allcols, allcols, is_cursor, false);
    if is_impossible(ct) || is_impossible(cs) {
        IMPOSSIBLE
    } else {
        ct + 2.0 * cs + stream.nrecords() as f64 * OUT_OF_ORDER
    }
}

// ---------------------------------------------------------------- Union

pub struct Union {
    pub(crate) plan: PlanState,
    pub(crate) sides: Sides,
    strategy: Strategy,
    mergecols: Vec<String>,
    /// Probed-side key used for duplicate probes (lookup).
    ki: Vec<String>,
    /// Lookup orientation: false probes the left side, true the right.
    rev: bool,
    disjoint_on: Option<String>,
    cur: Option<Record>,
    f1: Fetch,
    f2: Fetch,
    fetch_dir: Option<Dir>,
    /// Current side of the concatenation (disjoint).
    side: Option<u8>,
    /// Current phase of the lookup (1 = probed side, 2 = streamed side).
    phase: Option<u8>,
    hdr1: Option<Header>,
    hdr2: Option<Header>,
}

impl Union {
    pub(crate) fn new(src1: Query, src2: Query) -> QueryResult<Union> {
        Ok(Union {
            plan: PlanState::default(),
            sides: Sides::new(src1, src2)?,
            strategy: Strategy::Merge,
            mergecols: Vec::new(),
            ki: Vec::new(),
            rev: false,
            disjoint_on: None,
            cur: None,
            f1: Fetch::default(),
            f2: Fetch::default(),
            fetch_dir: None,
            side: None,
            phase: None,
            hdr1: None,
            hdr2: None,
        })
    }

    pub(crate) fn columns(&self) -> Vec<String> {
        self.sides.allcols()
    }

    pub(crate) fn keys(&self) -> Vec<Vec<String>> {
        // only the full column set is guaranteed unique across both sides
        vec![self.sides.allcols()]
    }

    pub(crate) fn fixed(&self) -> Vec<Fixed> {
        // a column is fixed for the union only if both sides fix it;
        // the union of the two value sets is what it can take
        let f1 = self.sides.src1.fixed();
        let f2 = self.sides.src2.fixed();
        let mut out = Vec::new();
        for a in &f1 {
            if let Some(b) = f2.iter().find(|b| b.col == a.col) {
                let mut values = a.values.clone();
                for v in &b.values {
                    if !values.contains(v) {
                        values.push(v.clone());
                    }
                }
                out.push(Fixed::new(a.col.clone(), values));
            }
        }
        out
    }

    pub(crate) fn header(&self) -> Header {
        Header::single(self.sides.allcols())
    }

    pub(crate) fn nrecords(&self) -> u64 {
        self.sides.src1.nrecords() + self.sides.src2.nrecords()
    }

    pub(crate) fn totalsize(&self) -> u64 {
        self.sides.src1.totalsize() + self.sides.src2.totalsize()
    }

    pub(crate) fn optimize2(
        &mut self,
        index: &[String],
        _needs: &[String],
        _firstneeds: &[String],
        is_cursor: bool,
        freeze: bool,
    ) -> f64 {
        let allcols = self.sides.allcols();
        let disjoint = self.sides.disjoint();
        if index.is_empty() {
            if disjoint.is_some() {
                let c1 = self
                    .sides
                    .src1
                    .optimize(&[], &allcols, &allcols, is_cursor, freeze);
                let c2 = self
                    .sides
                    .src2
                    .optimize(&[], &allcols, &allcols, is_cursor, freeze);
                if freeze {
                    self.strategy = Strategy::Disjoint;
                    self.disjoint_on = disjoint;
                }
                return c1 + c2;
            }
            // lookup (either side probed) vs merge over the full column set
            let ki1 = probe_key(&self.sides.src1);
            let ki2 = probe_key(&self.sides.src2);
            let cost_lookup1 = match &ki1 {
                Some(ki) => lookup_cost(
                    &mut self.sides.src1,
                    &mut self.sides.src2,
                    ki,
                    &allcols,
                    is_cursor,
                ),
                None => IMPOSSIBLE,
            };
            let cost_lookup2 = match &ki2 {
                Some(ki) => lookup_cost(
                    &mut self.sides.src2,
                    &mut self.sides.src1,
                    ki,
                    &allcols,
                    is_cursor,
                ),
                None => IMPOSSIBLE,
            };
            let cost_lookup = cost_lookup1.min(cost_lookup2);
            let c1m = self
                .sides
                .src1
                .optimize(&allcols, &allcols, &allcols, is_cursor, false);
            let c2m = self
                .sides
                .src2
                .optimize(&allcols, &allcols, &allcols, is_cursor, false);
            let cost_merge = if is_impossible(c1m) || is_impossible(c2m) {
                IMPOSSIBLE
            } else {
                c1m + c2m
            };
            let cost = cost_lookup.min(cost_merge);
            if is_impossible(cost) {
                return IMPOSSIBLE;
            }
            if freeze {
                if cost_lookup <= cost_merge {
                    self.strategy = Strategy::Lookup;
                    self.rev = cost_lookup2 < cost_lookup1;
                    self.ki = if self.rev { ki2 } else { ki1 }.unwrap_or_default();
                    let ki = self.ki.clone();
                    let (target, stream) = if self.rev {
                        (&mut self.sides.src2, &mut self.sides.src1)
                    } else {
                        (&mut self.sides.src1, &mut self.sides.src2)
                    };
                    target.optimize(&ki, &allcols, &allcols, is_cursor, true);
                    stream.optimize(&[], &allcols, &allcols, is_cursor, true);
                } else {
                    self.strategy = Strategy::Merge;
                    self.mergecols = allcols.clone();
                    self.sides
                        .src1
                        .optimize(&allcols, &allcols, &allcols, is_cursor, true);
                    self.sides
                        .src2
                        .optimize(&allcols, &allcols, &allcols, is_cursor, true);
                }
            }
            return cost;
        }
        // ordered output: merge on the requested ordering extended to
        // cover every column
        let mergecols = union(index, &allcols);
        let c1 = self
            .sides
            .src1
            .optimize(&mergecols, &allcols, &allcols, is_cursor, freeze);
        let c2 = self
            .sides
            .src2
            .optimize(&mergecols, &allcols, &allcols, is_cursor, freeze);
        if is_impossible(c1) || is_impossible(c2) {
            return IMPOSSIBLE;
        }
        if freeze {
            self.strategy = Strategy::Merge;
            self.mergecols = mergecols;
        }
        c1 + c2
    }

    fn reset(&mut self) {
        self.cur = None;
        self.f1.reset();
        self.f2.reset();
        self.fetch_dir = None;
        self.side = None;
        self.phase = None;
    }

    pub(crate) fn select(&mut self, cols: &[String], vals: &Record) -> QueryResult<()> {
        self.reset();
        self.sides.src1.select(cols, vals)?;
        self.sides.src2.select(cols, vals)
    }

    pub(crate) fn rewind(&mut self) {
        self.reset();
        self.sides.src1.rewind();
        self.sides.src2.rewind();
    }

    fn headers(&mut self) -> (Header, Header) {
        if self.hdr1.is_none() {
            self.hdr1 = Some(self.sides.src1.header());
        }
        if self.hdr2.is_none() {
            self.hdr2 = Some(self.sides.src2.header());
        }
        (
            self.hdr1.clone().unwrap_or_else(|| Header::single(vec![])),
            self.hdr2.clone().unwrap_or_else(|| Header::single(vec![])),
        )
    }

    pub(crate) fn get(&mut self, dir: Dir) -> QueryResult<Option<Row>> {
        match self.strategy {
            Strategy::Disjoint => self.get_disjoint(dir),
            Strategy::Merge => self.get_merge(dir),
            Strategy::Lookup => self.get_lookup(dir),
        }
    }

    fn get_disjoint(&mut self, dir: Dir) -> QueryResult<Option<Row>> {
        let (hdr1, hdr2) = self.headers();
        let allcols = self.sides.allcols();
        let start = match dir {
            Dir::Next => 1,
            Dir::Prev => 2,
        };
        if self.side.is_none() {
            self.side = Some(start);
        }
        loop {
            let s = match self.side {
                Some(s) => s,
                None => return Ok(None),
            };
            let (row, hdr) = if s == 1 {
                (self.sides.src1.get(dir)?, &hdr1)
            } else {
                (self.sides.src2.get(dir)?, &hdr2)
            };
            if let Some(r) = row {
                return Ok(Some(Row::single(hdr.key_of(&r, &allcols))));
            }
            // this side exhausted in this direction
            if s == start {
                self.side = Some(if s == 1 { 2 } else { 1 });
            } else {
                self.side = None;
                return Ok(None);
            }
        }
    }

    fn get_merge(&mut self, dir: Dir) -> QueryResult<Option<Row>> {
        let (hdr1, hdr2) = self.headers();
        let allcols = self.sides.allcols();
        if self.fetch_dir != Some(dir) {
            // the sources may be parked mid-stream from the other
            // direction; restart them and skip past `cur`
            self.sides.src1.rewind();
            self.sides.src2.rewind();
            self.f1.reset();
            self.f2.reset();
            self.fetch_dir = Some(dir);
        }
        fetch_past(
            &mut self.sides.src1,
            &hdr1,
            &allcols,
            &self.mergecols,
            &mut self.f1,
            &self.cur,
            dir,
        )?;
        fetch_past(
            &mut self.sides.src2,
            &hdr2,
            &allcols,
            &self.mergecols,
            &mut self.f2,
            &self.cur,
            dir,
        )?;
        let take1 = match (&self.f1.look, &self.f2.look) {
            (None, None) => {
                // keep fetch_dir so a same-direction get stays exhausted
                self.cur = None;
                return Ok(None);
            }
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (Some((k1, _)), Some((k2, _))) => {
                if k1 == k2 {
                    // duplicate row on both sides, consume the right copy
                    self.f2.look = None;
                    true
                } else {
                    before(dir, k1, k2)
                }
            }
        };
        let (key, row) = match if take1 {
            self.f1.look.take()
        } else {
            self.f2.look.take()
        } {
            Some(x) => x,
            None => return Ok(None),
        };
        self.cur = Some(key);
        Ok(Some(row))
    }

    fn get_lookup(&mut self, dir: Dir) -> QueryResult<Option<Row>> {
        let (hdr1, hdr2) = self.headers();
        let allcols = self.sides.allcols();
        let start = match dir {
            Dir::Next => 1,
            Dir::Prev => 2,
        };
        if self.phase.is_none() {
            if self.fetch_dir == Some(dir) {
                // already exhausted in this direction
                return Ok(None);
            }
            self.fetch_dir = Some(dir);
            self.phase = Some(start);
            if start == 1 {
                // clear any leftover probe restriction
                self.probed_side().select(&[], &Record::empty())?;
            }
        }
        let (thdr, shdr) = if self.rev {
            (hdr2, hdr1)
        } else {
            (hdr1, hdr2)
        };
        loop {
            let p = match self.phase {
                Some(p) => p,
                None => return Ok(None),
            };
            if p == 1 {
                match self.probed_side().get(dir)? {
                    Some(r) => return Ok(Some(Row::single(thdr.key_of(&r, &allcols)))),
                    None => {
                        if start == 1 {
                            self.phase = Some(2);
                        } else {
                            self.phase = None;
                            self.fetch_dir = Some(dir);
                            return Ok(None);
                        }
                    }
                }
            } else {
                match self.streamed_side().get(dir)? {
                    Some(r) => {
                        let probe = shdr.key_of(&r, &self.ki);
                        let packed = shdr.key_of(&r, &allcols);
                        let ki = self.ki.clone();
                        let target = self.probed_side();
                        target.select(&ki, &probe)?;
                        let mut dup = false;
                        while let Some(rt) = target.get(Dir::Next)? {
                            if thdr.key_of(&rt, &allcols) == packed {
                                dup = true;
                                break;
                            }
                        }
                        if !dup {
                            return Ok(Some(Row::single(packed)));
                        }
                    }
                    None => {
                        if start == 2 {
                            // fall back to the probed side, clearing probes
                            self.probed_side().select(&[], &Record::empty())?;
                            self.phase = Some(1);
                        } else {
                            self.phase = None;
                            self.fetch_dir = Some(dir);
                            return Ok(None);
                        }
                    }
                }
            }
        }
    }

    fn probed_side(&mut self) -> &mut Query {
        if self.rev {
            &mut self.sides.src2
        } else {
            &mut self.sides.src1
        }
    }

    fn streamed_side(&mut self) -> &mut Query {
        if self.rev {
            &mut self.sides.src1
        } else {
            &mut self.sides.src2
        }
    }

    pub(crate) fn explain(&self) -> String {
        let tag = match (&self.strategy, &self.disjoint_on) {
            (Strategy::Disjoint, Some(col)) => format!("UNION-DISJOINT({})", col),
            (Strategy::Disjoint, None) => "UNION-DISJOINT".to_string(),
            (Strategy::Merge, _) => "UNION-MERGE".to_string(),
            (Strategy::Lookup, _) => "UNION-LOOKUP".to_string(),
        };
        format!(
            "({}) {} ({})",
            self.sides.src1.explain(),
            tag,
            self.sides.src2.explain()
        )
    }
}

// ------------------------------------------------------------ Intersect

pub struct Intersect {
    pub(crate) plan: PlanState,
    pub(crate) sides: Sides,
    strategy: Strategy,
    mergecols: Vec<String>,
    /// Probed-side key used for membership probes (lookup).
    ki: Vec<String>,
    /// Lookup orientation: false streams the left side, true the right.
    rev: bool,
    disjoint_on: Option<String>,
    cur: Option<Record>,
    f1: Fetch,
    f2: Fetch,
    fetch_dir: Option<Dir>,
    hdr1: Option<Header>,
    hdr2: Option<Header>,
}

impl Intersect {
    pub(crate) fn new(src1: Query, src2: Query) -> QueryResult<Intersect> {
        Ok(Intersect {
            plan: PlanState::default(),
            sides: Sides::new(src1, src2)?,
            strategy: Strategy::Merge,
            mergecols: Vec::new(),
            ki: Vec::new(),
            rev: false,
            disjoint_on: None,
            cur: None,
            f1: Fetch::default(),
            f2: Fetch::default(),
            fetch_dir: None,
            hdr1: None,
            hdr2: None,
        })
    }

    pub(crate) fn columns(&self) -> Vec<String> {
        self.sides.allcols()
    }

    pub(crate) fn keys(&self) -> Vec<Vec<String>> {
        // a subset of both sides keeps both sides' keys
        let mut keys = self.sides.src1.keys();
        for k in self.sides.src2.keys() {
            if !keys.contains(&k) {
                keys.push(k);
            }
        }
        keys
    }

    pub(crate) fn fixed(&self) -> Vec<Fixed> {
        crate::data::combine(self.sides.src1.fixed(), self.sides.src2.fixed())
    }

    pub(crate) fn header(&self) -> Header {
        Header::single(self.sides.allcols())
    }

    pub(crate) fn nrecords(&self) -> u64 {
        if self.sides.disjoint().is_some() {
            0
        } else {
            self.sides.src1.nrecords().min(self.sides.src2.nrecords()) / 2
        }
    }

    pub(crate) fn totalsize(&self) -> u64 {
        self.sides.src1.totalsize().min(self.sides.src2.totalsize())
    }

    pub(crate) fn optimize2(
        &mut self,
        index: &[String],
        _needs: &[String],
        _firstneeds: &[String],
        is_cursor: bool,
        freeze: bool,
    ) -> f64 {
        let allcols = self.sides.allcols();
        let disjoint = self.sides.disjoint();
        if disjoint.is_some() {
            // provably empty: nothing to read
            if freeze {
                self.strategy = Strategy::Disjoint;
                self.disjoint_on = disjoint;
            }
            return 1.0;
        }
        if index.is_empty() {
            // lookup (either side probed) vs merge over the full column set
            let ki1 = probe_key(&self.sides.src1);
            let ki2 = probe_key(&self.sides.src2);
            let cost_lookup1 = match &ki2 {
                Some(ki) => lookup_cost(
                    &mut self.sides.src2,
                    &mut self.sides.src1,
                    ki,
                    &allcols,
                    is_cursor,
                ),
                None => IMPOSSIBLE,
            };
            let cost_lookup2 = match &ki1 {
                Some(ki) => lookup_cost(
                    &mut self.sides.src1,
                    &mut self.sides.src2,
                    ki,
                    &allcols,
                    is_cursor,
                ),
                None => IMPOSSIBLE,
            };
            let cost_lookup = cost_lookup1.min(cost_lookup2);
            let c1m = self
                .sides
                .src1
                .optimize(&allcols, &allcols, &allcols, is_cursor, false);
            let c2m = self
                .sides
                .src2
                .optimize(&allcols, &allcols, &allcols, is_cursor, false);
            let cost_merge = if is_impossible(c1m) || is_impossible(c2m) {
                IMPOSSIBLE
            } else {
                c1m + c2m
            };
            let cost = cost_lookup.min(cost_merge);
            if is_impossible(cost) {
                return IMPOSSIBLE;
            }
            if freeze {
                if cost_lookup <= cost_merge {
                    self.strategy = Strategy::Lookup;
                    self.rev = cost_lookup2 < cost_lookup1;
                    self.ki = if self.rev { ki1 } else { ki2 }.unwrap_or_default();
                    let ki = self.ki.clone();
                    let (target, stream) = if self.rev {
                        (&mut self.sides.src1, &mut self.sides.src2)
                    } else {
                        (&mut self.sides.src2, &mut self.sides.src1)
                    };
                    target.optimize(&ki, &allcols, &allcols, is_cursor, true);
                    stream.optimize(&[], &allcols, &allcols, is_cursor, true);
                } else {
                    self.strategy = Strategy::Merge;
                    self.mergecols = allcols.clone();
                    self.sides
                        .src1
                        .optimize(&allcols, &allcols, &allcols, is_cursor, true);
                    self.sides
                        .src2
                        .optimize(&allcols, &allcols, &allcols, is_cursor, true);
                }
            }
            return cost;
        }
        let mergecols = union(index, &allcols);
        let c1 = self
            .sides
            .src1
            .optimize(&mergecols, &allcols, &allcols, is_cursor, freeze);
        let c2 = self
            .sides
            .src2
            .optimize(&mergecols, &allcols, &allcols, is_cursor, freeze);
        if is_impossible(c1) || is_impossible(c2) {
            return IMPOSSIBLE;
        }
        if freeze {
            self.strategy = Strategy::Merge;
            self.mergecols = mergecols;
        }
        c1 + c2
    }

    fn reset(&mut self) {
        self.cur = None;
        self.f1.reset();
        self.f2.reset();
        self.fetch_dir = None;
    }

    pub(crate) fn select(&mut self, cols: &[String], vals: &Record) -> QueryResult<()> {
        self.reset();
        if self.strategy == Strategy::Lookup {
            // the probed side is range-restricted per probe instead
            return if self.rev {
                self.sides.src2.select(cols, vals)
            } else {
                self.sides.src1.select(cols, vals)
            };
        }
        self.sides.src1.select(cols, vals)?;
        self.sides.src2.select(cols, vals)
    }

    pub(crate) fn rewind(&mut self) {
        self.reset();
        self.sides.src1.rewind();
        self.sides.src2.rewind();
    }

    pub(crate) fn get(&mut self, dir: Dir) -> QueryResult<Option<Row>> {
        if self.strategy == Strategy::Disjoint {
            return Ok(None);
        }
        if self.hdr1.is_none() {
            self.hdr1 = Some(self.sides.src1.header());
            self.hdr2 = Some(self.sides.src2.header());
        }
        let hdr1 = self.hdr1.clone().unwrap_or_else(|| Header::single(vec![]));
        let hdr2 = self.hdr2.clone().unwrap_or_else(|| Header::single(vec![]));
        let allcols = self.sides.allcols();
        if self.strategy == Strategy::Lookup {
            return self.get_lookup(dir, &hdr1, &hdr2, &allcols);
        }
        if self.fetch_dir != Some(dir) {
            // the sources may be parked mid-stream from the other
            // direction; restart them and skip past `cur`
            self.sides.src1.rewind();
            self.sides.src2.rewind();
            self.f1.reset();
            self.f2.reset();
            self.fetch_dir = Some(dir);
        }
        loop {
            fetch_past(
                &mut self.sides.src1,
                &hdr1,
                &allcols,
                &self.mergecols,
                &mut self.f1,
                &self.cur,
                dir,
            )?;
            fetch_past(
                &mut self.sides.src2,
                &hdr2,
                &allcols,
                &self.mergecols,
                &mut self.f2,
                &self.cur,
                dir,
            )?;
            let (k1, k2) = match (&self.f1.look, &self.f2.look) {
                (Some((k1, _)), Some((k2, _))) => (k1.clone(), k2.clone()),
                _ => {
                    // either side exhausted: no more common rows; keep
                    // fetch_dir so a same-direction get stays exhausted
                    self.cur = None;
                    return Ok(None);
                }
            };
            if k1 == k2 {
                let row = match self.f1.look.take() {
                    Some((_, r)) => r,
                    None => return Ok(None),
                };
                self.f2.look = None;
                self.cur = Some(k1);
                return Ok(Some(row));
            } else if before(dir, &k1, &k2) {
                self.f1.look = None;
            } else {
                self.f2.look = None;
            }
        }
    }

    /// Streams one side, probing the other's key index for membership.
    fn get_lookup(
        &mut self,
        dir: Dir,
        hdr1: &Header,
        hdr2: &Header,
        allcols: &[String],
    ) -> QueryResult<Option<Row>> {
        let ki = self.ki.clone();
        let (stream, target, shdr, thdr) = if self.rev {
            (&mut self.sides.src2, &mut self.sides.src1, hdr2, hdr1)
        } else {
            (&mut self.sides.src1, &mut self.sides.src2, hdr1, hdr2)
        };
        loop {
            let r = match stream.get(dir)? {
                Some(r) => r,
                None => return Ok(None),
            };
            let probe = shdr.key_of(&r, &ki);
            let packed = shdr.key_of(&r, allcols);
            target.select(&ki, &probe)?;
            let mut found = false;
            while let Some(rt) = target.get(Dir::Next)? {
                if thdr.key_of(&rt, allcols) == packed {
                    found = true;
                    break;
                }
            }
            if found {
                return Ok(Some(Row::single(packed)));
            }
        }
    }

    pub(crate) fn explain(&self) -> String {
        let tag = match (&self.strategy, &self.disjoint_on) {
            (Strategy::Disjoint, Some(col)) => format!("INTERSECT-DISJOINT({})", col),
            (Strategy::Lookup, _) => "INTERSECT-LOOKUP".to_string(),
            _ => "INTERSECT-MERGE".to_string(),
        };
        format!(
            "({}) {} ({})",
            self.sides.src1.explain(),
            tag,
            self.sides.src2.explain()
        )
    }
}

// ----------------------------------------------------------- Difference

pub struct Difference {
    pub(crate) plan: PlanState,
    pub(crate) sides: Sides,
    strategy: Strategy,
    mergecols: Vec<String>,
    /// Right-side key used for removal probes (lookup).
    ki: Vec<String>,
    disjoint_on: Option<String>,
    cur: Option<Record>,
    f1: Fetch,
    f2: Fetch,
    fetch_dir: Option<Dir>,
    hdr1: Option<Header>,
    hdr2: Option<Header>,
}

impl Difference {
    pub(crate) fn new(src1: Query, src2: Query) -> QueryResult<Difference> {
        Ok(Difference {
            plan: PlanState::default(),
            sides: Sides::new(src1, src2)?,
            strategy: Strategy::Merge,
            mergecols: Vec::new(),
            ki: Vec::new(),
            disjoint_on: None,
            cur: None,
            f1: Fetch::default(),
            f2: Fetch::default(),
            fetch_dir: None,
            hdr1: None,
            hdr2: None,
        })
    }

    pub(crate) fn columns(&self) -> Vec<String> {
        self.sides.allcols()
    }

    pub(crate) fn keys(&self) -> Vec<Vec<String>> {
        self.sides.src1.keys()
    }

    pub(crate) fn fixed(&self) -> Vec<Fixed> {
        self.sides.src1.fixed()
    }

    pub(crate) fn header(&self) -> Header {
        Header::single(self.sides.allcols())
    }

    pub(crate) fn nrecords(&self) -> u64 {
        if self.sides.disjoint().is_some() {
            self.sides.src1.nrecords()
        } else {
            self.sides.src1.nrecords() / 2
        }
    }

    pub(crate) fn totalsize(&self) -> u64 {
        self.sides.src1.totalsize()
    }

    pub(crate) fn optimize2(
        &mut self,
        index: &[String],
        needs: &[String],
        firstneeds: &[String],
        is_cursor: bool,
        freeze: bool,
    ) -> f64 {
        let allcols = self.sides.allcols();
        let disjoint = self.sides.disjoint();
        if disjoint.is_some() {
            // the right side cannot remove anything: left passthrough,
            // any ordering the left can deliver
            let c1 = self
                .sides
                .src1
                .optimize(index, &allcols, &union(firstneeds, needs), is_cursor, freeze);
            if is_impossible(c1) {
                return IMPOSSIBLE;
            }
            if freeze {
                self.strategy = Strategy::Disjoint;
                self.disjoint_on = disjoint;
            }
            return c1;
        }
        if index.is_empty() {
            // lookup (right side probed per left row) vs merge
            let ki2 = probe_key(&self.sides.src2);
            let cost_lookup = match &ki2 {
                Some(ki) => lookup_cost(
                    &mut self.sides.src2,
                    &mut self.sides.src1,
                    ki,
                    &allcols,
                    is_cursor,
                ),
                None => IMPOSSIBLE,
            };
            let c1m = self
                .sides
                .src1
                .optimize(&allcols, &allcols, &allcols, is_cursor, false);
            let c2m = self
                .sides
                .src2
                .optimize(&allcols, &allcols, &allcols, is_cursor, false);
            let cost_merge = if is_impossible(c1m) || is_impossible(c2m) {
                IMPOSSIBLE
            } else {
                c1m + c2m
            };
            let cost = cost_lookup.min(cost_merge);
            if is_impossible(cost) {
                return IMPOSSIBLE;
            }
            if freeze {
                if cost_lookup <= cost_merge {
                    self.strategy = Strategy::Lookup;
                    self.ki = ki2.unwrap_or_default();
                    let ki = self.ki.clone();
                    self.sides
                        .src2
                        .optimize(&ki, &allcols, &allcols, is_cursor, true);
                    self.sides
                        .src1
                        .optimize(&[], &allcols, &allcols, is_cursor, true);
                } else {
                    self.strategy = Strategy::Merge;
                    self.mergecols = allcols.clone();
                    self.sides
                        .src1
                        .optimize(&allcols, &allcols, &allcols, is_cursor, true);
                    self.sides
                        .src2
                        .optimize(&allcols, &allcols, &allcols, is_cursor, true);
                }
            }
            return cost;
        }
        let mergecols = union(index, &allcols);
        let c1 = self
            .sides
            .src1
            .optimize(&mergecols, &allcols, &allcols, is_cursor, freeze);
        let c2 = self
            .sides
            .src2
            .optimize(&mergecols, &allcols, &allcols, is_cursor, freeze);
        if is_impossible(c1) || is_impossible(c2) {
            return IMPOSSIBLE;
        }
        if freeze {
            self.strategy = Strategy::Merge;
            self.mergecols = mergecols;
        }
        c1 + c2
    }

    fn reset(&mut self) {
        self.cur = None;
        self.f1.reset();
        self.f2.reset();
        self.fetch_dir = None;
    }

    pub(crate) fn select(&mut self, cols: &[String], vals: &Record) -> QueryResult<()> {
        self.reset();
        self.sides.src1.select(cols, vals)?;
        if self.strategy == Strategy::Merge {
            self.sides.src2.select(cols, vals)?;
        }
        Ok(())
    }

    pub(crate) fn rewind(&mut self) {
        self.reset();
        self.sides.src1.rewind();
        self.sides.src2.rewind();
    }

    pub(crate) fn get(&mut self, dir: Dir) -> QueryResult<Option<Row>> {
        if self.hdr1.is_none() {
            self.hdr1 = Some(self.sides.src1.header());
            self.hdr2 = Some(self.sides.src2.header());
        }
        let hdr1 = self.hdr1.clone().unwrap_or_else(|| Header::single(vec![]));
        let hdr2 = self.hdr2.clone().unwrap_or_else(|| Header::single(vec![]));
        let allcols = self.sides.allcols();
        if self.strategy == Strategy::Disjoint {
            return Ok(match self.sides.src1.get(dir)? {
                Some(r) => Some(Row::single(hdr1.key_of(&r, &allcols))),
                None => None,
            });
        }
        if self.strategy == Strategy::Lookup {
            return self.get_lookup(dir, &hdr1, &hdr2, &allcols);
        }
        if self.fetch_dir != Some(dir) {
            // the sources may be parked mid-stream from the other
            // direction; restart them and skip past `cur`
            self.sides.src1.rewind();
            self.sides.src2.rewind();
            self.f1.reset();
            self.f2.reset();
            self.fetch_dir = Some(dir);
        }
        loop {
            fetch_past(
                &mut self.sides.src1,
                &hdr1,
                &allcols,
                &self.mergecols,
                &mut self.f1,
                &self.cur,
                dir,
            )?;
            let (k1, row1) = match &self.f1.look {
                Some((k, r)) => (k.clone(), r.clone()),
                None => {
                    // keep fetch_dir so a same-direction get stays exhausted
                    self.cur = None;
                    return Ok(None);
                }
            };
            // advance the right side to the first row not before k1
            loop {
                fetch_past(
                    &mut self.sides.src2,
                    &hdr2,
                    &allcols,
                    &self.mergecols,
                    &mut self.f2,
                    &self.cur,
                    dir,
                )?;
                match &self.f2.look {
                    Some((k2, _)) if before(dir, k2, &k1) => self.f2.look = None,
                    _ => break,
                }
            }
            let removed = matches!(&self.f2.look, Some((k2, _)) if *k2 == k1);
            self.f1.look = None;
            if removed {
                self.f2.look = None;
                self.cur = Some(k1);
                continue;
            }
            self.cur = Some(k1);
            return Ok(Some(row1));
        }
    }

    /// Streams the left side, probing the right's key index; a left row
    /// comes through only when the probe finds no match.
    fn get_lookup(
        &mut self,
        dir: Dir,
        hdr1: &Header,
        hdr2: &Header,
        allcols: &[String],
    ) -> QueryResult<Option<Row>> {
        let ki = self.ki.clone();
        loop {
            let r = match self.sides.src1.get(dir)? {
                Some(r) => r,
                None => return Ok(None),
            };
            let probe = hdr1.key_of(&r, &ki);
            let packed = hdr1.key_of(&r, allcols);
            self.sides.src2.select(&ki, &probe)?;
            let mut found = false;
            while let Some(r2) = self.sides.src2.get(Dir::Next)? {
                if hdr2.key_of(&r2, allcols) == packed {
                    found = true;
                    break;
                }
            }
            if !found {
                return Ok(Some(Row::single(packed)));
            }
        }
    }

    pub(crate) fn explain(&self) -> String {
        let tag = match (&self.strategy, &self.disjoint_on) {
            (Strategy::Disjoint, Some(col)) => format!("DIFFERENCE-DISJOINT({})", col),
            (Strategy::Lookup, _) => "DIFFERENCE-LOOKUP".to_string(),
            _ => "DIFFERENCE-MERGE".to_string(),
        };
        format!(
            "({}) {} ({})",
            self.sides.src1.explain(),
            tag,
            self.sides.src2.explain()
        )
    }
}
