//! Cost-based planning
//!
//! The driver takes a built query tree through the remaining lifecycle
//! steps: normalize (`query::transform`), cost the whole tree, freeze the
//! winning strategies, and splice in the temporary indexes the frozen
//! plan asked for. The result is ready for `select`/`rewind`/`get`.
//!
//! Costs are abstract units, comparable only to each other. A plan whose
//! cost reaches the `IMPOSSIBLE` sentinel is rejected rather than run.

pub(crate) mod cache;
pub mod cost;

use crate::observability::{metrics, Logger};
use crate::query::{transform, Query, QueryError, QueryResult};

use cost::is_impossible;

/// Plans a query for execution.
///
/// `is_cursor` plans for incremental cursor access: strategies that
/// materialize the whole result up front are excluded, trading optimality
/// for a cheap first row.
pub fn plan(q: Query, is_cursor: bool) -> QueryResult<Query> {
    let mut q = transform(q)?;
    if let Query::Nothing(_) = q {
        return Ok(q);
    }
    let needs = q.columns();
    let cost = q.optimize(&[], &needs, &[], is_cursor, false);
    if is_impossible(cost) {
        metrics().increment_plans_rejected();
        Logger::warn("PLAN_REJECTED", &[("query", &q.explain())]);
        return Err(QueryError::infeasible(
            "no feasible strategy for the query",
        ));
    }
    q.optimize(&[], &needs, &[], is_cursor, true);
    let q = q.insert_tempindexes();
    metrics().increment_plans_built();
    Logger::info(
        "PLAN_FROZEN",
        &[("cost", &format!("{:.0}", cost)), ("plan", &q.explain())],
    );
    Ok(q)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::cols::cols;
    use crate::data::{Record, Value};
    use crate::query::Expr;
    use crate::storage::{MemStore, TableDesc, Tran};

    fn tran() -> Tran {
        let s = MemStore::new();
        s.create_table(
            TableDesc::new("t", cols(&["id", "name"]), cols(&["id"]))
                .with_index(cols(&["name"])),
        )
        .unwrap();
        for (id, name) in [(1, "b"), (2, "a"), (3, "c")] {
            s.insert("t", Record::new(vec![Value::Int(id), Value::str(name)]))
                .unwrap();
        }
        s
    }

    #[test]
    fn test_plan_scan_picks_an_index() {
        let t = tran();
        let q = Query::scan(t, "t").unwrap();
        let q = plan(q, false).unwrap();
        assert!(q.explain().contains("t^(id)"));
    }

    #[test]
    fn test_sort_on_index_needs_no_tempindex() {
        let t = tran();
        let q = Query::scan(t, "t").unwrap().sort(cols(&["name"]), false).unwrap();
        let q = plan(q, false).unwrap();
        assert!(q.explain().contains("t^(name)"));
        assert!(!q.explain().contains("TEMPINDEX"));
    }

    #[test]
    fn test_infeasible_plan_rejected() {
        let t = tran();
        // a cursor cannot materialize, and nothing delivers this order
        let q = Query::scan(t, "t")
            .unwrap()
            .extend(cols(&["x"]), vec![Some(Expr::val(Value::Int(1)))])
            .unwrap()
            .sort(cols(&["x"]), false)
            .unwrap();
        let err = plan(q, true).unwrap_err();
        assert_eq!(err.code().code(), "RELQ_PLAN_INFEASIBLE");
    }

    #[test]
    fn test_false_filter_plans_to_nothing() {
        let t = tran();
        let q = Query::scan(t, "t")
            .unwrap()
            .filter(Expr::val(Value::Bool(false)))
            .unwrap();
        let q = plan(q, false).unwrap();
        assert!(matches!(q, Query::Nothing(_)));
    }
}
