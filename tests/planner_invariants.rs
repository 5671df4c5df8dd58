//! Planner invariants
//!
//! Planning is deterministic, costs stay finite for feasible queries, the
//! frozen plan names a concrete index for every scan and a concrete
//! strategy for every operator, and infeasible requests are rejected with
//! the planner error rather than executed.

use relq::data::cols::cols;
use relq::data::{Record, Value};
use relq::observability::metrics;
use relq::plan::cost::{is_impossible, IMPOSSIBLE};
use relq::plan::plan;
use relq::query::{Agg, AggOp, Expr, Query, QueryErrorCode};
use relq::storage::{MemStore, TableDesc, Tran};

fn store() -> Tran {
    let s = MemStore::new();
    s.create_table(
        TableDesc::new("items", cols(&["id", "cat", "qty"]), cols(&["id"]))
            .with_index(cols(&["cat"])),
    )
    .unwrap();
    for (id, cat, qty) in [(1, "b", 10), (2, "a", 20), (3, "a", 30)] {
        s.insert(
            "items",
            Record::new(vec![Value::Int(id), Value::str(cat), Value::Int(qty)]),
        )
        .unwrap();
    }
    s.create_table(TableDesc::new("cats", cols(&["cat", "label"]), cols(&["cat"])))
        .unwrap();
    for (cat, label) in [("a", "alpha"), ("b", "beta")] {
        s.insert(
            "cats",
            Record::new(vec![Value::str(cat), Value::str(label)]),
        )
        .unwrap();
    }
    s
}

#[test]
fn test_impossible_sentinel() {
    assert!(is_impossible(IMPOSSIBLE));
    assert!(is_impossible(IMPOSSIBLE * 2.0));
    assert!(!is_impossible(0.0));
    assert!(!is_impossible(1e12));
}

#[test]
fn test_planning_is_deterministic() {
    let t = store();
    let build = |t: &Tran| {
        Query::scan(t.clone(), "items")
            .unwrap()
            .join(Query::scan(t.clone(), "cats").unwrap())
            .unwrap()
            .sort(cols(&["cat"]), false)
            .unwrap()
    };
    let a = plan(build(&t), false).unwrap().explain();
    let b = plan(build(&t), false).unwrap().explain();
    assert_eq!(a, b);
}

#[test]
fn test_every_scan_gets_a_concrete_index() {
    let t = store();
    let q = Query::scan(t.clone(), "items")
        .unwrap()
        .join(Query::scan(t, "cats").unwrap())
        .unwrap();
    let q = plan(q, false).unwrap();
    let shape = q.explain();
    assert!(shape.contains("items^("));
    assert!(shape.contains("cats^(cat)"));
    assert!(!shape.contains("^()"));
}

#[test]
fn test_ordering_prefers_existing_index() {
    let t = store();
    let q = Query::scan(t, "items")
        .unwrap()
        .sort(cols(&["cat"]), false)
        .unwrap();
    let q = plan(q, false).unwrap();
    assert!(q.explain().contains("items^(cat)"));
    assert!(!q.explain().contains("TEMPINDEX"));
}

#[test]
fn test_ordering_without_index_materializes() {
    let t = store();
    let q = Query::scan(t, "items")
        .unwrap()
        .sort(cols(&["qty"]), false)
        .unwrap();
    let q = plan(q, false).unwrap();
    assert!(q.explain().contains("TEMPINDEX"));
}

#[test]
fn test_project_strategy_tracks_keys() {
    let t = store();
    let keyed = plan(
        Query::scan(t.clone(), "items")
            .unwrap()
            .project(cols(&["id", "qty"]))
            .unwrap(),
        false,
    )
    .unwrap();
    assert!(keyed.explain().contains("PROJECT-COPY"));
    let dedup = plan(
        Query::scan(t, "items")
            .unwrap()
            .project(cols(&["cat"]))
            .unwrap(),
        false,
    )
    .unwrap();
    assert!(dedup.explain().contains("PROJECT-SEQ"));
}

#[test]
fn test_summarize_strategy_tracks_keys() {
    let t = store();
    let by_key = plan(
        Query::scan(t.clone(), "items")
            .unwrap()
            .summarize(cols(&["id"]), vec![Agg::count("n")])
            .unwrap(),
        false,
    )
    .unwrap();
    assert!(by_key.explain().contains("SUMMARIZE-COPY"));
    let grouped = plan(
        Query::scan(t, "items")
            .unwrap()
            .summarize(cols(&["cat"]), vec![Agg::of("m", AggOp::Max, "qty")])
            .unwrap(),
        false,
    )
    .unwrap();
    assert!(grouped.explain().contains("SUMMARIZE-SEQ"));
}

#[test]
fn test_join_plan_shows_cardinality() {
    let t = store();
    let q = Query::scan(t.clone(), "items")
        .unwrap()
        .join(Query::scan(t, "cats").unwrap())
        .unwrap();
    let q = plan(q, false).unwrap();
    // the frozen plan puts cats on the outside: one cat row fans out to
    // its items through the cat index
    assert!(q.explain().contains("JOIN-1:n"));
}

#[test]
fn test_keyed_projection_is_updateable() {
    let t = store();
    let q = Query::scan(t, "items")
        .unwrap()
        .project(cols(&["id", "qty"]))
        .unwrap();
    let mut q = plan(q, false).unwrap();
    // the key survives, so the projection is a 1:1 passthrough
    assert!(q.explain().contains("PROJECT-COPY"));
    assert_eq!(q.updateable(), Some("items".to_string()));
    q.output(Record::new(vec![
        Value::Int(9),
        Value::str("c"),
        Value::Int(90),
    ]))
    .unwrap();
}

#[test]
fn test_projection_keeps_union_disjointness() {
    let t = store();
    let q = Query::scan(t.clone(), "items")
        .unwrap()
        .filter(Expr::eq_val("cat", Value::str("a")))
        .unwrap()
        .union(
            Query::scan(t, "items")
                .unwrap()
                .filter(Expr::eq_val("cat", Value::str("b")))
                .unwrap(),
        )
        .unwrap()
        .project(cols(&["id", "qty"]))
        .unwrap();
    let q = plan(q, false).unwrap();
    // cat is projected away above the union, not inside it
    assert!(q.explain().contains("UNION-DISJOINT(cat)"));
}

#[test]
fn test_unordered_set_operations_use_lookup() {
    let t = store();
    let u = plan(
        Query::scan(t.clone(), "items")
            .unwrap()
            .union(Query::scan(t.clone(), "items").unwrap())
            .unwrap(),
        false,
    )
    .unwrap();
    assert!(u.explain().contains("UNION-LOOKUP"));
    let i = plan(
        Query::scan(t.clone(), "items")
            .unwrap()
            .intersect(Query::scan(t.clone(), "items").unwrap())
            .unwrap(),
        false,
    )
    .unwrap();
    assert!(i.explain().contains("INTERSECT-LOOKUP"));
    let d = plan(
        Query::scan(t.clone(), "items")
            .unwrap()
            .difference(Query::scan(t, "items").unwrap())
            .unwrap(),
        false,
    )
    .unwrap();
    assert!(d.explain().contains("DIFFERENCE-LOOKUP"));
}

#[test]
fn test_cursor_planning_rejects_materialization() {
    let t = store();
    let q = Query::scan(t, "items")
        .unwrap()
        .sort(cols(&["qty"]), false)
        .unwrap();
    let rejected_before = metrics().plans_rejected();
    let err = plan(q, true).unwrap_err();
    assert_eq!(err.code(), QueryErrorCode::RelqPlanInfeasible);
    assert!(metrics().plans_rejected() > rejected_before);
}

#[test]
fn test_successful_plans_are_counted() {
    let t = store();
    let before = metrics().plans_built();
    plan(Query::scan(t, "items").unwrap(), false).unwrap();
    assert!(metrics().plans_built() > before);
}

#[test]
fn test_tempindex_build_is_counted() {
    use relq::data::Dir;
    let t = store();
    let q = Query::scan(t, "items")
        .unwrap()
        .sort(cols(&["qty"]), false)
        .unwrap();
    let mut q = plan(q, false).unwrap();
    let before = metrics().tempindexes_built();
    q.get(Dir::Next).unwrap();
    assert!(metrics().tempindexes_built() > before);
}

#[test]
fn test_updateable_survives_planning() {
    let t = store();
    let q = Query::scan(t, "items")
        .unwrap()
        .filter(Expr::eq_val("cat", Value::str("a")))
        .unwrap();
    let q = plan(q, false).unwrap();
    assert_eq!(q.updateable(), Some("items".to_string()));
}
