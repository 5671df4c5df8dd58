//! The query tree
//!
//! `Query` is the single node type of the algebra; every operator is a
//! variant. Construction validates column references, `transform`
//! normalizes the tree, `optimize` (driven by `crate::plan`) picks
//! strategies and indexes, and execution pulls rows bidirectionally.
//!
//! Cost selection at every node considers two routes for a requested
//! ordering: deliver it natively, or read in any order and materialize a
//! temporary index over the requested columns. The cheaper route wins;
//! `freeze` commits the winner and records a pending temp index on the
//! node when that route won.

use crate::data::cols::{subset, union};
use crate::data::{Dir, Fixed, Header, Record, Row};
use crate::plan::cache::Cache;
use crate::plan::cost::{is_impossible, IMPOSSIBLE, TEMPINDEX_OVERHEAD, WRITE_FACTOR};
use crate::storage::Tran;

use super::compatible::{Difference, Intersect, Union};
use super::errors::{QueryError, QueryResult};
use super::expr::Expr;
use super::extend::Extend;
use super::join::Join;
use super::nothing::Nothing;
use super::product::Product;
use super::project::Project;
use super::rename::Rename;
use super::scan::Scan;
use super::select::Select;
use super::sort::Sort;
use super::summarize::{Agg, Summarize};
use super::tempindex::TempIndex;

/// Planning state every node carries.
#[derive(Debug, Default)]
pub(crate) struct PlanState {
    /// Memo of optimize results for this node.
    pub cache: Cache,
    /// Ordering to materialize over this node's output, set by freeze
    /// when the temp-index route won. Empty means none.
    pub tempindex: Vec<String>,
}

/// A node of the query tree.
pub enum Query {
    /// Base table scan
    Scan(Scan),
    /// Row filter
    Select(Select),
    /// Column subset with deduplication
    Project(Project),
    /// Column renaming
    Rename(Rename),
    /// Computed columns
    Extend(Extend),
    /// Set union
    Union(Union),
    /// Set intersection
    Intersect(Intersect),
    /// Set difference
    Difference(Difference),
    /// Cartesian product
    Product(Product),
    /// Natural join on the common columns (inner or left outer)
    Join(Join),
    /// Grouped aggregation
    Summarize(Summarize),
    /// Explicit result ordering
    Sort(Sort),
    /// Materialized ordering over a subquery
    TempIndex(TempIndex),
    /// The provably empty query
    Nothing(Nothing),
}

macro_rules! dispatch {
    ($self:expr, $q:ident => $body:expr) => {
        match $self {
            Query::Scan($q) => $body,
            Query::Select($q) => $body,
            Query::Project($q) => $body,
            Query::Rename($q) => $body,
            Query::Extend($q) => $body,
            Query::Union($q) => $body,
            Query::Intersect($q) => $body,
            Query::Difference($q) => $body,
            Query::Product($q) => $body,
            Query::Join($q) => $body,
            Query::Summarize($q) => $body,
            Query::Sort($q) => $body,
            Query::TempIndex($q) => $body,
            Query::Nothing($q) => $body,
        }
    };
}

impl Query {
    // ---- construction ----

    /// A base table scan.
    pub fn scan(tran: Tran, table: &str) -> QueryResult<Query> {
        Scan::new(tran, table).map(Query::Scan)
    }

    /// Keeps only rows satisfying the predicate.
    pub fn filter(self, pred: Expr) -> QueryResult<Query> {
        Select::new(self, pred).map(Query::Select)
    }

    /// Keeps only the named columns, deduplicating the result.
    pub fn project(self, cols: Vec<String>) -> QueryResult<Query> {
        Project::keep(self, cols).map(Query::Project)
    }

    /// Drops the named columns, deduplicating the result.
    pub fn remove(self, cols: Vec<String>) -> QueryResult<Query> {
        Project::remove(self, cols).map(Query::Project)
    }

    /// Renames columns pairwise.
    pub fn rename(self, from: Vec<String>, to: Vec<String>) -> QueryResult<Query> {
        Rename::new(self, from, to).map(Query::Rename)
    }

    /// Adds computed columns; a `None` expression declares a rule column
    /// with no stored value.
    pub fn extend(self, cols: Vec<String>, exprs: Vec<Option<Expr>>) -> QueryResult<Query> {
        Extend::new(self, cols, exprs).map(Query::Extend)
    }

    /// Set union of two sources.
    pub fn union(self, other: Query) -> QueryResult<Query> {
        Union::new(self, other).map(Query::Union)
    }

    /// Set intersection of two sources.
    pub fn intersect(self, other: Query) -> QueryResult<Query> {
        Intersect::new(self, other).map(Query::Intersect)
    }

    /// Rows of the left source not present in the right.
    pub fn difference(self, other: Query) -> QueryResult<Query> {
        Difference::new(self, other).map(Query::Difference)
    }

    /// Cartesian product; the sources must share no columns.
    pub fn product(self, other: Query) -> QueryResult<Query> {
        Product::new(self, other).map(Query::Product)
    }

    /// Natural inner join on the common columns.
    pub fn join(self, other: Query) -> QueryResult<Query> {
        Join::new(self, other, false).map(Query::Join)
    }

    /// Natural left outer join on the common columns.
    pub fn leftjoin(self, other: Query) -> QueryResult<Query> {
        Join::new(self, other, true).map(Query::Join)
    }

    /// Grouped aggregation over the `by` columns.
    pub fn summarize(self, by: Vec<String>, aggs: Vec<Agg>) -> QueryResult<Query> {
        Summarize::new(self, by, aggs).map(Query::Summarize)
    }

    /// Orders the result by the given columns.
    pub fn sort(self, cols: Vec<String>, reverse: bool) -> QueryResult<Query> {
        Sort::new(self, cols, reverse).map(Query::Sort)
    }

    /// The empty query with the given columns.
    pub fn nothing(cols: Vec<String>) -> Query {
        Query::Nothing(Nothing::new(cols))
    }

    // ---- schema ----

    /// Operator name, for errors and plan display.
    pub fn name(&self) -> &'static str {
        match self {
            Query::Scan(_) => "scan",
            Query::Select(_) => "where",
            Query::Project(_) => "project",
            Query::Rename(_) => "rename",
            Query::Extend(_) => "extend",
            Query::Union(_) => "union",
            Query::Intersect(_) => "intersect",
            Query::Difference(_) => "difference",
            Query::Product(_) => "times",
            Query::Join(q) => {
                if q.outer {
                    "leftjoin"
                } else {
                    "join"
                }
            }
            Query::Summarize(_) => "summarize",
            Query::Sort(_) => "sort",
            Query::TempIndex(_) => "tempindex",
            Query::Nothing(_) => "nothing",
        }
    }

    /// Visible columns.
    pub fn columns(&self) -> Vec<String> {
        dispatch!(self, q => q.columns())
    }

    /// Candidate keys of the result.
    pub fn keys(&self) -> Vec<Vec<String>> {
        dispatch!(self, q => q.keys())
    }

    /// Columns constrained to finite value sets at this node.
    pub fn fixed(&self) -> Vec<Fixed> {
        dispatch!(self, q => q.fixed())
    }

    /// Header for reading this node's rows.
    pub fn header(&self) -> Header {
        dispatch!(self, q => q.header())
    }

    /// Estimated result row count.
    pub fn nrecords(&self) -> u64 {
        dispatch!(self, q => q.nrecords())
    }

    /// Estimated result data size in bytes.
    pub fn totalsize(&self) -> u64 {
        dispatch!(self, q => q.totalsize())
    }

    /// Estimated average size of one column value.
    pub fn columnsize(&self) -> u64 {
        let cells = self.nrecords().max(1) * self.columns().len().max(1) as u64;
        (self.totalsize() / cells).max(1)
    }

    /// Strategy-revealing plan display.
    pub fn explain(&self) -> String {
        dispatch!(self, q => q.explain())
    }

    // ---- planning ----

    pub(crate) fn plan_mut(&mut self) -> &mut PlanState {
        dispatch!(self, q => &mut q.plan)
    }

    pub(crate) fn children_mut(&mut self) -> Vec<&mut Box<Query>> {
        match self {
            Query::Scan(_) | Query::Nothing(_) => Vec::new(),
            Query::Select(q) => vec![&mut q.src],
            Query::Project(q) => vec![&mut q.src],
            Query::Rename(q) => vec![&mut q.src],
            Query::Extend(q) => vec![&mut q.src],
            Query::Union(q) => vec![&mut q.sides.src1, &mut q.sides.src2],
            Query::Intersect(q) => vec![&mut q.sides.src1, &mut q.sides.src2],
            Query::Difference(q) => vec![&mut q.sides.src1, &mut q.sides.src2],
            Query::Product(q) => vec![&mut q.src1, &mut q.src2],
            Query::Join(q) => vec![&mut q.src1, &mut q.src2],
            Query::Summarize(q) => vec![&mut q.src],
            Query::Sort(q) => vec![&mut q.src],
            Query::TempIndex(q) => vec![&mut q.src],
        }
    }

    /// Cost of delivering this node's rows in `index` order.
    ///
    /// `needs` is every column the consumer will read over the whole
    /// iteration; `firstneeds` the columns it reads before advancing past
    /// the first row. Returns `IMPOSSIBLE` when no strategy exists. With
    /// `freeze` the winning strategy is committed into the tree.
    pub(crate) fn optimize(
        &mut self,
        index: &[String],
        needs: &[String],
        firstneeds: &[String],
        is_cursor: bool,
        freeze: bool,
    ) -> f64 {
        if !subset(index, &self.columns()) {
            return IMPOSSIBLE;
        }
        let cost1 = self.optimize1(index, needs, firstneeds, is_cursor, false);
        // alternative: read unordered, then materialize the ordering
        let cost2 = if !index.is_empty() && !is_cursor {
            let firstneeds2 = union(firstneeds, index);
            let unordered = self.optimize1(&[], needs, &firstneeds2, is_cursor, false);
            if is_impossible(unordered) {
                IMPOSSIBLE
            } else {
                let nr = self.nrecords() as f64;
                let keysize = index.len() as f64 * self.columnsize() as f64 * 2.0;
                unordered + nr * keysize * WRITE_FACTOR + nr * keysize + TEMPINDEX_OVERHEAD
            }
        } else {
            IMPOSSIBLE
        };
        let cost = cost1.min(cost2);
        if is_impossible(cost) {
            return IMPOSSIBLE;
        }
        if freeze {
            if cost1 <= cost2 {
                self.optimize1(index, needs, firstneeds, is_cursor, true);
            } else {
                let firstneeds2 = union(firstneeds, index);
                self.optimize1(&[], needs, &firstneeds2, is_cursor, true);
                self.plan_mut().tempindex = index.to_vec();
            }
        }
        cost
    }

    /// Memo wrapper around `optimize2`. Freezing bypasses the memo so the
    /// commit reaches every node.
    fn optimize1(
        &mut self,
        index: &[String],
        needs: &[String],
        firstneeds: &[String],
        is_cursor: bool,
        freeze: bool,
    ) -> f64 {
        if freeze {
            return self.optimize2(index, needs, firstneeds, is_cursor, true);
        }
        if let Some(cost) = self.plan_mut().cache.get(index, needs, firstneeds, is_cursor) {
            return cost;
        }
        let cost = self.optimize2(index, needs, firstneeds, is_cursor, false);
        self.plan_mut()
            .cache
            .add(index, needs, firstneeds, is_cursor, cost);
        cost
    }

    /// Wraps every node whose frozen plan chose the materialize route in
    /// a `TempIndex` over the recorded ordering. Runs after freeze.
    pub(crate) fn insert_tempindexes(mut self) -> Query {
        for child in self.children_mut() {
            let owned = std::mem::replace(&mut **child, Query::nothing(Vec::new()));
            **child = owned.insert_tempindexes();
        }
        let order = std::mem::take(&mut self.plan_mut().tempindex);
        if order.is_empty() {
            self
        } else {
            // a key inside the ordering means no uniqueifier is needed
            let unique = self.keys().iter().any(|k| subset(k, &order));
            Query::TempIndex(TempIndex::new(self, order, unique))
        }
    }

    /// Per-operator strategy search.
    fn optimize2(
        &mut self,
        index: &[String],
        needs: &[String],
        firstneeds: &[String],
        is_cursor: bool,
        freeze: bool,
    ) -> f64 {
        dispatch!(self, q => q.optimize2(index, needs, firstneeds, is_cursor, freeze))
    }

    // ---- execution ----

    /// Restricts iteration to rows whose `cols` equal `vals`. `cols` must
    /// be a prefix of the frozen index. Empty `cols` clears the
    /// restriction. Resets the cursor.
    pub fn select(&mut self, cols: &[String], vals: &Record) -> QueryResult<()> {
        dispatch!(self, q => q.select(cols, vals))
    }

    /// Resets the cursor to the boundary without changing any restriction.
    pub fn rewind(&mut self) {
        dispatch!(self, q => q.rewind())
    }

    /// Pulls the next row in the given direction; `None` at the boundary.
    pub fn get(&mut self, dir: Dir) -> QueryResult<Option<Row>> {
        dispatch!(self, q => q.get(dir))
    }

    // ---- updates ----

    /// The base table rows can be appended to through this query, if any.
    /// Only 1:1 strategies qualify; a COPY projection passes every source
    /// row through, so it stays writable.
    pub fn updateable(&self) -> Option<String> {
        match self {
            Query::Scan(q) => Some(q.table_name().to_string()),
            Query::Select(q) => q.src.updateable(),
            Query::Project(q) if q.is_copy() => q.src.updateable(),
            Query::Rename(q) => q.src.updateable(),
            Query::Extend(q) => q.src.updateable(),
            Query::Sort(q) => q.src.updateable(),
            _ => None,
        }
    }

    /// Appends a record through this query to its base table.
    pub fn output(&mut self, rec: Record) -> QueryResult<()> {
        match self {
            Query::Scan(q) => q.output(rec),
            Query::Select(q) => q.src.output(rec),
            Query::Project(q) if q.is_copy() => q.src.output(rec),
            Query::Rename(q) => q.src.output(rec),
            Query::Extend(q) => q.src.output(rec),
            Query::Sort(q) => q.src.output(rec),
            other => Err(QueryError::not_updateable(other.name())),
        }
    }

    /// The physical ordering this node's frozen plan iterates in, if it
    /// exposes one that `select` can range-restrict.
    pub(crate) fn frozen_index(&self) -> Vec<String> {
        match self {
            Query::Scan(q) => q.chosen_index().to_vec(),
            Query::TempIndex(q) => q.order.clone(),
            _ => Vec::new(),
        }
    }
}

impl std::fmt::Debug for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.explain())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::cols::cols;
    use crate::data::Value;
    use crate::storage::{MemStore, TableDesc};

    fn tran() -> Tran {
        let s = MemStore::new();
        s.create_table(TableDesc::new("t", cols(&["a", "b"]), cols(&["a"])))
            .unwrap();
        for a in 1..=3 {
            s.insert("t", Record::new(vec![Value::Int(a), Value::Int(a * 10)]))
                .unwrap();
        }
        s
    }

    #[test]
    fn test_repeated_optimize_is_served_from_the_memo() {
        let mut q = Query::scan(tran(), "t").unwrap();
        let needs = q.columns();
        let first = q.optimize(&cols(&["a"]), &needs, &needs, false, false);
        let misses = q.plan_mut().cache.misses();
        let hits = q.plan_mut().cache.hits();
        // same arguments again: the memo answers, and the answer matches
        let second = q.optimize(&cols(&["a"]), &needs, &needs, false, false);
        assert_eq!(first, second);
        assert_eq!(q.plan_mut().cache.misses(), misses);
        assert!(q.plan_mut().cache.hits() > hits);
    }

    #[test]
    fn test_distinct_optimize_arguments_miss_the_memo() {
        let mut q = Query::scan(tran(), "t").unwrap();
        let needs = q.columns();
        q.optimize(&cols(&["a"]), &needs, &needs, false, false);
        let misses = q.plan_mut().cache.misses();
        // a different firstneeds is a different memo key
        q.optimize(&[], &needs, &cols(&["b"]), false, false);
        assert!(q.plan_mut().cache.misses() > misses);
    }
}
