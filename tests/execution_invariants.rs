//! End-to-end execution invariants
//!
//! Every test plans a query against the in-memory store and pulls rows
//! through the public cursor protocol. The central invariant: a full
//! backward iteration is exactly the reverse of a full forward iteration,
//! for every operator and strategy.

use relq::data::cols::cols;
use relq::data::{Dir, Record, Value};
use relq::plan::plan;
use relq::query::{Agg, AggOp, BinaryOp, Expr, Query, QueryErrorCode};
use relq::storage::{MemStore, TableDesc, Tran};

fn store() -> Tran {
    let s = MemStore::new();
    s.create_table(
        TableDesc::new("items", cols(&["id", "cat", "qty"]), cols(&["id"]))
            .with_index(cols(&["cat"])),
    )
    .unwrap();
    for (id, cat, qty) in [(1, "b", 10), (2, "a", 20), (3, "a", 30), (4, "c", 40)] {
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
    s.create_table(TableDesc::new("nums", cols(&["n"]), cols(&["n"])))
        .unwrap();
    for n in [1, 2] {
        s.insert("nums", Record::new(vec![Value::Int(n)])).unwrap();
    }
    s.create_table(TableDesc::new("letters", cols(&["l"]), cols(&["l"])))
        .unwrap();
    for l in ["x", "y"] {
        s.insert("letters", Record::new(vec![Value::str(l)])).unwrap();
    }
    s.create_table(TableDesc::new("u1", cols(&["id", "name"]), cols(&["id"])))
        .unwrap();
    for (id, name) in [(1, "x"), (3, "y")] {
        s.insert("u1", Record::new(vec![Value::Int(id), Value::str(name)]))
            .unwrap();
    }
    s.create_table(TableDesc::new("u2", cols(&["id", "name"]), cols(&["id"])))
        .unwrap();
    for (id, name) in [(2, "z"), (3, "y")] {
        s.insert("u2", Record::new(vec![Value::Int(id), Value::str(name)]))
            .unwrap();
    }
    s
}

/// Reads every row in `dir` as (column -> value) tuples in column order.
fn collect(q: &mut Query, dir: Dir) -> Vec<Vec<Value>> {
    let hdr = q.header();
    let columns = q.columns();
    let mut out = Vec::new();
    while let Some(row) = q.get(dir).unwrap() {
        out.push(columns.iter().map(|c| hdr.get(&row, c)).collect());
    }
    out
}

/// Asserts backward iteration mirrors forward iteration, returning the
/// forward rows.
fn duality(q: &mut Query) -> Vec<Vec<Value>> {
    let fwd = collect(q, Dir::Next);
    let mut back = collect(q, Dir::Prev);
    back.reverse();
    assert_eq!(fwd, back, "prev order must mirror next order");
    fwd
}

#[test]
fn test_filtered_scan_both_directions() {
    let t = store();
    let q = Query::scan(t, "items")
        .unwrap()
        .filter(Expr::binary(
            BinaryOp::Gt,
            Expr::col("qty"),
            Expr::val(Value::Int(15)),
        ))
        .unwrap();
    let mut q = plan(q, false).unwrap();
    let rows = duality(&mut q);
    let ids: Vec<&Value> = rows.iter().map(|r| &r[0]).collect();
    assert_eq!(ids, vec![&Value::Int(2), &Value::Int(3), &Value::Int(4)]);
}

#[test]
fn test_sort_without_index_uses_tempindex() {
    let t = store();
    let q = Query::scan(t, "items")
        .unwrap()
        .sort(cols(&["qty"]), false)
        .unwrap();
    let q = plan(q, false).unwrap();
    assert!(q.explain().contains("TEMPINDEX"));
    let mut q = q;
    let rows = duality(&mut q);
    let qtys: Vec<&Value> = rows.iter().map(|r| &r[2]).collect();
    assert_eq!(
        qtys,
        vec![
            &Value::Int(10),
            &Value::Int(20),
            &Value::Int(30),
            &Value::Int(40)
        ]
    );
}

#[test]
fn test_tempindex_keeps_equal_keys_in_insertion_order() {
    let t = store();
    // cat values: a,a,b,c; equal cats stay distinct via the uniqueifier
    let q = Query::scan(t, "items")
        .unwrap()
        .sort(cols(&["qty"]), true)
        .unwrap();
    let mut q = plan(q, false).unwrap();
    let rows = duality(&mut q);
    let qtys: Vec<&Value> = rows.iter().map(|r| &r[2]).collect();
    assert_eq!(
        qtys,
        vec![
            &Value::Int(40),
            &Value::Int(30),
            &Value::Int(20),
            &Value::Int(10)
        ]
    );
}

#[test]
fn test_inner_join_matches() {
    let t = store();
    let q = Query::scan(t.clone(), "items")
        .unwrap()
        .join(Query::scan(t, "cats").unwrap())
        .unwrap();
    let mut q = plan(q, false).unwrap();
    let rows = duality(&mut q);
    // id 4 has cat "c" with no match
    assert_eq!(rows.len(), 3);
    for r in &rows {
        assert_ne!(r[3], Value::empty(), "joined rows carry a label");
    }
}

#[test]
fn test_leftjoin_emits_unmatched_row_once() {
    let t = store();
    let q = Query::scan(t.clone(), "items")
        .unwrap()
        .leftjoin(Query::scan(t, "cats").unwrap())
        .unwrap();
    let mut q = plan(q, false).unwrap();
    let rows = duality(&mut q);
    assert_eq!(rows.len(), 4);
    let unmatched: Vec<&Vec<Value>> = rows
        .iter()
        .filter(|r| r[3] == Value::empty())
        .collect();
    assert_eq!(unmatched.len(), 1);
    assert_eq!(unmatched[0][0], Value::Int(4));
}

#[test]
fn test_product_pairs_every_row() {
    let t = store();
    let q = Query::scan(t.clone(), "nums")
        .unwrap()
        .product(Query::scan(t, "letters").unwrap())
        .unwrap();
    let mut q = plan(q, false).unwrap();
    let rows = duality(&mut q);
    assert_eq!(rows.len(), 4);
}

#[test]
fn test_product_with_common_columns_rejected() {
    let t = store();
    let err = Query::scan(t.clone(), "items")
        .unwrap()
        .product(Query::scan(t, "cats").unwrap())
        .unwrap_err();
    assert_eq!(err.code(), QueryErrorCode::RelqQueryCommonColumns);
}

#[test]
fn test_join_without_common_columns_rejected() {
    let t = store();
    let err = Query::scan(t.clone(), "nums")
        .unwrap()
        .join(Query::scan(t, "letters").unwrap())
        .unwrap_err();
    assert_eq!(err.code(), QueryErrorCode::RelqQueryNoCommonColumns);
}

#[test]
fn test_summarize_groups_both_directions() {
    let t = store();
    let q = Query::scan(t, "items")
        .unwrap()
        .summarize(
            cols(&["cat"]),
            vec![Agg::count("n"), Agg::of("total", AggOp::Total, "qty")],
        )
        .unwrap();
    let mut q = plan(q, false).unwrap();
    let rows = duality(&mut q);
    assert_eq!(
        rows,
        vec![
            vec![Value::str("a"), Value::Int(2), Value::Int(50)],
            vec![Value::str("b"), Value::Int(1), Value::Int(10)],
            vec![Value::str("c"), Value::Int(1), Value::Int(40)],
        ]
    );
}

#[test]
fn test_union_dedups_common_rows() {
    let t = store();
    let q = Query::scan(t.clone(), "u1")
        .unwrap()
        .union(Query::scan(t, "u2").unwrap())
        .unwrap()
        .sort(cols(&["id"]), false)
        .unwrap();
    let mut q = plan(q, false).unwrap();
    let rows = duality(&mut q);
    // (3,"y") appears on both sides and comes out once
    assert_eq!(
        rows,
        vec![
            vec![Value::Int(1), Value::str("x")],
            vec![Value::Int(2), Value::str("z")],
            vec![Value::Int(3), Value::str("y")],
        ]
    );
}

#[test]
fn test_disjoint_union_concatenates() {
    let t = store();
    let left = Query::scan(t.clone(), "u1")
        .unwrap()
        .extend(cols(&["side"]), vec![Some(Expr::val(Value::str("l")))])
        .unwrap();
    let right = Query::scan(t, "u2")
        .unwrap()
        .extend(cols(&["side"]), vec![Some(Expr::val(Value::str("r")))])
        .unwrap();
    let q = left.union(right).unwrap();
    let q = plan(q, false).unwrap();
    assert!(q.explain().contains("UNION-DISJOINT(side)"));
    let mut q = q;
    let rows = duality(&mut q);
    assert_eq!(rows.len(), 4);
    // forward order is all of the left side, then all of the right
    assert_eq!(rows[0][2], Value::str("l"));
    assert_eq!(rows[3][2], Value::str("r"));
}

#[test]
fn test_union_direction_reversal_mid_stream() {
    let t = store();
    let q = Query::scan(t.clone(), "u1")
        .unwrap()
        .union(Query::scan(t, "u2").unwrap())
        .unwrap()
        .sort(cols(&["id"]), false)
        .unwrap();
    let mut q = plan(q, false).unwrap();
    let hdr = q.header();
    let id = |row: &relq::data::Row| hdr.get(row, "id");
    assert_eq!(id(&q.get(Dir::Next).unwrap().unwrap()), Value::Int(1));
    assert_eq!(id(&q.get(Dir::Next).unwrap().unwrap()), Value::Int(2));
    // turning around mid-stream steps back to the previous row
    assert_eq!(id(&q.get(Dir::Prev).unwrap().unwrap()), Value::Int(1));
    assert_eq!(id(&q.get(Dir::Next).unwrap().unwrap()), Value::Int(2));
}

#[test]
fn test_exhausted_query_stays_exhausted() {
    let t = store();
    let q = Query::scan(t, "items")
        .unwrap()
        .summarize(cols(&["cat"]), vec![Agg::count("n")])
        .unwrap();
    let mut q = plan(q, false).unwrap();
    while q.get(Dir::Next).unwrap().is_some() {}
    // repeated pulls at the boundary return None instead of restarting
    assert!(q.get(Dir::Next).unwrap().is_none());
    assert!(q.get(Dir::Next).unwrap().is_none());
}

#[test]
fn test_unordered_union_emits_each_row_once() {
    let t = store();
    let q = Query::scan(t.clone(), "u1")
        .unwrap()
        .union(Query::scan(t, "u2").unwrap())
        .unwrap();
    let mut q = plan(q, false).unwrap();
    let mut rows = duality(&mut q);
    rows.sort();
    assert_eq!(
        rows,
        vec![
            vec![Value::Int(1), Value::str("x")],
            vec![Value::Int(2), Value::str("z")],
            vec![Value::Int(3), Value::str("y")],
        ]
    );
}

#[test]
fn test_intersect_keeps_common_rows() {
    let t = store();
    let q = Query::scan(t.clone(), "u1")
        .unwrap()
        .intersect(Query::scan(t, "u2").unwrap())
        .unwrap();
    let mut q = plan(q, false).unwrap();
    let rows = duality(&mut q);
    assert_eq!(rows, vec![vec![Value::Int(3), Value::str("y")]]);
}

#[test]
fn test_difference_removes_common_rows() {
    let t = store();
    let q = Query::scan(t.clone(), "u1")
        .unwrap()
        .difference(Query::scan(t, "u2").unwrap())
        .unwrap();
    let mut q = plan(q, false).unwrap();
    let rows = duality(&mut q);
    assert_eq!(rows, vec![vec![Value::Int(1), Value::str("x")]]);
}

#[test]
fn test_sorted_intersect_merges_both_directions() {
    let t = store();
    let q = Query::scan(t.clone(), "u1")
        .unwrap()
        .intersect(Query::scan(t, "u2").unwrap())
        .unwrap()
        .sort(cols(&["id"]), false)
        .unwrap();
    let q = plan(q, false).unwrap();
    assert!(q.explain().contains("INTERSECT-MERGE"));
    let mut q = q;
    let rows = duality(&mut q);
    assert_eq!(rows, vec![vec![Value::Int(3), Value::str("y")]]);
}

#[test]
fn test_sorted_difference_merges_both_directions() {
    let t = store();
    let q = Query::scan(t.clone(), "u1")
        .unwrap()
        .difference(Query::scan(t, "u2").unwrap())
        .unwrap()
        .sort(cols(&["id"]), false)
        .unwrap();
    let q = plan(q, false).unwrap();
    assert!(q.explain().contains("DIFFERENCE-MERGE"));
    let mut q = q;
    let rows = duality(&mut q);
    assert_eq!(rows, vec![vec![Value::Int(1), Value::str("x")]]);
}

#[test]
fn test_extend_computes_per_row() {
    let t = store();
    let q = Query::scan(t, "items")
        .unwrap()
        .extend(
            cols(&["dbl"]),
            vec![Some(Expr::binary(
                BinaryOp::Mul,
                Expr::col("qty"),
                Expr::val(Value::Int(2)),
            ))],
        )
        .unwrap();
    let mut q = plan(q, false).unwrap();
    let rows = duality(&mut q);
    for r in &rows {
        let qty = match r[2] {
            Value::Int(n) => n,
            _ => panic!("qty must be an int"),
        };
        assert_eq!(r[3], Value::Int(qty * 2));
    }
}

#[test]
fn test_project_deduplicates() {
    let t = store();
    let q = Query::scan(t, "items")
        .unwrap()
        .project(cols(&["cat"]))
        .unwrap();
    let mut q = plan(q, false).unwrap();
    let rows = duality(&mut q);
    assert_eq!(
        rows,
        vec![
            vec![Value::str("a")],
            vec![Value::str("b")],
            vec![Value::str("c")],
        ]
    );
}

#[test]
fn test_select_restricts_iteration() {
    let t = store();
    let q = Query::scan(t, "items")
        .unwrap()
        .sort(cols(&["id"]), false)
        .unwrap();
    let mut q = plan(q, false).unwrap();
    q.select(&cols(&["id"]), &Record::new(vec![Value::Int(2)]))
        .unwrap();
    let rows = collect(&mut q, Dir::Next);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], Value::Int(2));
    // clearing the restriction brings everything back
    q.select(&[], &Record::empty()).unwrap();
    assert_eq!(collect(&mut q, Dir::Next).len(), 4);
}

#[test]
fn test_equality_filter_narrows_the_indexed_scan() {
    let t = store();
    let q = Query::scan(t, "items")
        .unwrap()
        .filter(Expr::eq_val("cat", Value::str("a")))
        .unwrap()
        .sort(cols(&["cat"]), false)
        .unwrap();
    let mut q = plan(q, false).unwrap();
    let rows = duality(&mut q);
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r[1] == Value::str("a")));
}

#[test]
fn test_multi_value_filter_is_not_narrowed() {
    let t = store();
    // In pins no single value, so the filter falls back to scan-and-test
    let q = Query::scan(t, "items")
        .unwrap()
        .filter(Expr::In {
            col: "cat".to_string(),
            values: vec![Value::str("a"), Value::str("c")],
        })
        .unwrap()
        .sort(cols(&["cat"]), false)
        .unwrap();
    let mut q = plan(q, false).unwrap();
    let rows = duality(&mut q);
    assert_eq!(rows.len(), 3);
}

#[test]
fn test_output_through_derived_query() {
    let t = store();
    let mut q = Query::scan(t.clone(), "nums").unwrap();
    assert_eq!(q.updateable(), Some("nums".to_string()));
    q.output(Record::new(vec![Value::Int(3)])).unwrap();
    let mut q = plan(Query::scan(t, "nums").unwrap(), false).unwrap();
    assert_eq!(collect(&mut q, Dir::Next).len(), 3);
}

#[test]
fn test_output_through_project_rejected() {
    let t = store();
    let mut q = Query::scan(t, "items")
        .unwrap()
        .project(cols(&["cat"]))
        .unwrap();
    assert_eq!(q.updateable(), None);
    let err = q.output(Record::new(vec![Value::str("d")])).unwrap_err();
    assert_eq!(err.code(), QueryErrorCode::RelqQueryNotUpdateable);
}

#[test]
fn test_oversized_tempindex_key_aborts() {
    let t = MemStore::new();
    t.create_table(TableDesc::new("big", cols(&["id", "blob"]), cols(&["id"])))
        .unwrap();
    t.insert(
        "big",
        Record::new(vec![Value::Int(1), Value::str("x".repeat(5000))]),
    )
    .unwrap();
    let tran: Tran = t;
    let q = Query::scan(tran, "big")
        .unwrap()
        .sort(cols(&["blob"]), false)
        .unwrap();
    let mut q = plan(q, false).unwrap();
    let err = q.get(Dir::Next).unwrap_err();
    assert_eq!(err.code(), QueryErrorCode::RelqExecKeyTooLarge);
}
