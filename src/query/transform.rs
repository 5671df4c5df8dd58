//! Tree normalization
//!
//! Rewrites the query tree bottom-up to a fixpoint before any costing
//! happens. Every rule is semantics-preserving on sets of rows: filters
//! merge and sink toward the tables they constrain, projections collapse
//! and distribute, renames compose, and provably empty subtrees become
//! `Nothing`. Running the pass on its own output changes nothing.

use crate::data::cols::{contains, disjoint, intersect, set_eq, subset, union};

use super::compatible::{Difference, Intersect, Sides, Union};
use super::errors::QueryResult;
use super::expr::Expr;
use super::extend::Extend;
use super::join::Join;
use super::node::Query;
use super::product::Product;
use super::project::Project;
use super::rename::Rename;
use super::select::Select;
use super::sort::Sort;

/// Normalizes a tree, returning the rewritten tree.
pub fn transform(q: Query) -> QueryResult<Query> {
    let mut q = q;
    loop {
        let (next, changed) = pass(q)?;
        q = next;
        if !changed {
            return Ok(q);
        }
    }
}

/// One bottom-up sweep: children first, then this node.
fn pass(q: Query) -> QueryResult<(Query, bool)> {
    let mut q = q;
    let mut changed = false;
    for child in q.children_mut() {
        let owned = std::mem::replace(&mut **child, Query::nothing(Vec::new()));
        let (next, c) = pass(owned)?;
        **child = next;
        changed |= c;
    }
    let (q, c) = rewrite(q)?;
    Ok((q, changed || c))
}

fn is_nothing(q: &Query) -> bool {
    matches!(q, Query::Nothing(_))
}

/// Conjunction of terms, unwrapped when there is only one.
fn and_of(mut terms: Vec<Expr>) -> Expr {
    if terms.len() == 1 {
        terms.remove(0)
    } else {
        Expr::And(terms)
    }
}

/// One rewrite step at this node; the caller loops to a fixpoint.
fn rewrite(q: Query) -> QueryResult<(Query, bool)> {
    match q {
        Query::Select(sel) => rewrite_select(sel),
        Query::Project(pj) => rewrite_project(pj),
        Query::Rename(rn) => rewrite_rename(rn),
        Query::Extend(ex) => rewrite_extend(ex),
        Query::Sort(s) => rewrite_sort(s),
        Query::Union(u) => rewrite_union(u),
        Query::Intersect(i) => rewrite_intersect(i),
        Query::Difference(d) => rewrite_difference(d),
        Query::Product(p) => rewrite_product(p),
        Query::Join(j) => rewrite_join(j),
        Query::Summarize(s) => {
            if is_nothing(&s.src) {
                // aggregating nothing yields nothing
                let cols = Query::Summarize(s).columns();
                Ok((Query::nothing(cols), true))
            } else {
                Ok((Query::Summarize(s), false))
            }
        }
        other => Ok((other, false)),
    }
}

/// Splits conjunction terms by which operand's columns cover them. Terms
/// covered by neither side stay above the operator.
fn split_terms(
    terms: Vec<Expr>,
    c1: &[String],
    c2: &[String],
    allow2: bool,
) -> (Vec<Expr>, Vec<Expr>, Vec<Expr>) {
    let mut t1 = Vec::new();
    let mut t2 = Vec::new();
    let mut rest = Vec::new();
    for t in terms {
        let tc = t.columns();
        if subset(&tc, c1) {
            t1.push(t);
        } else if allow2 && subset(&tc, c2) {
            t2.push(t);
        } else {
            rest.push(t);
        }
    }
    (t1, t2, rest)
}

fn rewrite_select(sel: Select) -> QueryResult<(Query, bool)> {
    if is_nothing(&sel.src) {
        return Ok((Query::nothing(sel.src.columns()), true));
    }
    if sel.pred.is_false() {
        return Ok((Query::nothing(sel.src.columns()), true));
    }
    if sel.pred.is_true() {
        let Select { src, .. } = sel;
        return Ok((*src, true));
    }
    let Select { src, pred, .. } = sel;
    match *src {
        // adjacent filters become one conjunction
        Query::Select(inner) => {
            let Select {
                src: isrc,
                pred: ipred,
                ..
            } = inner;
            let mut terms = ipred.into_terms();
            terms.extend(pred.into_terms());
            Ok(((*isrc).filter(Expr::And(terms))?, true))
        }
        // the filter reads source names below a rename
        Query::Rename(rn) => {
            let Rename {
                src: rsrc,
                from,
                to,
                ..
            } = rn;
            let below = pred.rename_columns(&to, &from);
            Ok(((*rsrc).filter(below)?.rename(from, to)?, true))
        }
        // a filter only reads projected columns, so it can sink
        Query::Project(pj) => {
            let Project { src: ps, cols, .. } = pj;
            Ok(((*ps).filter(pred)?.project(cols)?, true))
        }
        // terms not touching the computed columns sink below the extend
        Query::Extend(ex) => {
            let ecols = ex.cols.clone();
            let (below, above): (Vec<Expr>, Vec<Expr>) = pred
                .into_terms()
                .into_iter()
                .partition(|t| disjoint(&t.columns(), &ecols));
            if below.is_empty() {
                return Ok((Query::Extend(ex).filter(and_of(above))?, false));
            }
            let Extend {
                src: es,
                cols,
                exprs,
                ..
            } = ex;
            let mut q = (*es).filter(and_of(below))?.extend(cols, exprs)?;
            if !above.is_empty() {
                q = q.filter(and_of(above))?;
            }
            Ok((q, true))
        }
        // filters distribute over both branches of a union or intersect
        Query::Union(u) => {
            let Union { sides, .. } = u;
            let Sides { src1, src2 } = sides;
            let s1 = (*src1).filter(pred.clone())?;
            let s2 = (*src2).filter(pred)?;
            Ok((s1.union(s2)?, true))
        }
        Query::Intersect(i) => {
            let Intersect { sides, .. } = i;
            let Sides { src1, src2 } = sides;
            let s1 = (*src1).filter(pred.clone())?;
            let s2 = (*src2).filter(pred)?;
            Ok((s1.intersect(s2)?, true))
        }
        // only the left branch of a difference produces rows
        Query::Difference(d) => {
            let Difference { sides, .. } = d;
            let Sides { src1, src2 } = sides;
            Ok(((*src1).filter(pred)?.difference(*src2)?, true))
        }
        Query::Product(p) => {
            let c1 = p.src1.columns();
            let c2 = p.src2.columns();
            let (t1, t2, rest) = split_terms(pred.into_terms(), &c1, &c2, true);
            if t1.is_empty() && t2.is_empty() {
                return Ok((Query::Product(p).filter(and_of(rest))?, false));
            }
            let Product { src1, src2, .. } = p;
            let s1 = if t1.is_empty() {
                *src1
            } else {
                (*src1).filter(and_of(t1))?
            };
            let s2 = if t2.is_empty() {
                *src2
            } else {
                (*src2).filter(and_of(t2))?
            };
            let mut q = s1.product(s2)?;
            if !rest.is_empty() {
                q = q.filter(and_of(rest))?;
            }
            Ok((q, true))
        }
        // a left join keeps unmatched left rows whose right columns read
        // empty, so only left-side terms may sink
        Query::Join(j) => {
            let c1 = j.src1.columns();
            let c2 = j.src2.columns();
            let (t1, t2, rest) = split_terms(pred.into_terms(), &c1, &c2, !j.outer);
            if t1.is_empty() && t2.is_empty() {
                return Ok((Query::Join(j).filter(and_of(rest))?, false));
            }
            let Join {
                src1, src2, outer, ..
            } = j;
            let s1 = if t1.is_empty() {
                *src1
            } else {
                (*src1).filter(and_of(t1))?
            };
            let s2 = if t2.is_empty() {
                *src2
            } else {
                (*src2).filter(and_of(t2))?
            };
            let mut q = if outer { s1.leftjoin(s2)? } else { s1.join(s2)? };
            if !rest.is_empty() {
                q = q.filter(and_of(rest))?;
            }
            Ok((q, true))
        }
        other => Ok((other.filter(pred)?, false)),
    }
}

fn rewrite_project(pj: Project) -> QueryResult<(Query, bool)> {
    if is_nothing(&pj.src) {
        return Ok((Query::nothing(pj.cols), true));
    }
    if set_eq(&pj.cols, &pj.src.columns()) {
        // projecting every column is the identity
        let Project { src, .. } = pj;
        return Ok((*src, true));
    }
    let Project { src, cols, .. } = pj;
    match *src {
        // the outer column set is a subset of the inner, which wins
        Query::Project(inner) => {
            let Project { src: is, .. } = inner;
            Ok(((*is).project(cols)?, true))
        }
        // sink below a rename, translating names and dropping pairs whose
        // target does not survive
        Query::Rename(rn) => {
            let mapped: Vec<String> = cols
                .iter()
                .map(|c| match rn.to.iter().position(|t| t == c) {
                    Some(i) => rn.from[i].clone(),
                    None => c.clone(),
                })
                .collect();
            let mut kf = Vec::new();
            let mut kt = Vec::new();
            for (f, t) in rn.from.iter().zip(&rn.to) {
                if contains(&cols, t) {
                    kf.push(f.clone());
                    kt.push(t.clone());
                }
            }
            let Rename { src: rs, .. } = rn;
            let mut q = (*rs).project(mapped)?;
            if !kf.is_empty() {
                q = q.rename(kf, kt)?;
            }
            Ok((q, true))
        }
        // computed columns nothing above ever reads are dead
        Query::Extend(ex) => {
            let ecols = ex.cols.clone();
            let mut keep: Vec<bool> = ecols.iter().map(|c| contains(&cols, c)).collect();
            loop {
                let mut grew = false;
                for i in 0..ecols.len() {
                    if !keep[i] {
                        continue;
                    }
                    if let Some(e) = &ex.exprs[i] {
                        for c in e.columns() {
                            if let Some(j) = ecols.iter().position(|x| *x == c) {
                                if !keep[j] {
                                    keep[j] = true;
                                    grew = true;
                                }
                            }
                        }
                    }
                }
                if !grew {
                    break;
                }
            }
            if keep.iter().all(|k| *k) {
                return Ok((Query::Extend(ex).project(cols)?, false));
            }
            let Extend {
                src: es,
                cols: ecols,
                exprs,
                ..
            } = ex;
            let mut kc = Vec::new();
            let mut ke = Vec::new();
            for ((c, e), k) in ecols.into_iter().zip(exprs).zip(keep) {
                if k {
                    kc.push(c);
                    ke.push(e);
                }
            }
            let q = if kc.is_empty() {
                (*es).project(cols)?
            } else {
                (*es).extend(kc, ke)?.project(cols)?
            };
            Ok((q, true))
        }
        // projection distributes over a union or intersect
        Query::Union(u) => {
            let disc = u.sides.disjoint();
            let Union { sides, .. } = u;
            distribute_project(sides, cols, disc, Query::union)
        }
        Query::Intersect(i) => {
            let disc = i.sides.disjoint();
            let Intersect { sides, .. } = i;
            distribute_project(sides, cols, disc, Query::intersect)
        }
        // each side of a product projects independently
        Query::Product(p) => {
            let i1 = intersect(&cols, &p.src1.columns());
            let i2 = intersect(&cols, &p.src2.columns());
            if i1.is_empty() || i2.is_empty() {
                return Ok((Query::Product(p).project(cols)?, false));
            }
            let Product { src1, src2, .. } = p;
            let s1 = (*src1).project(i1)?;
            let s2 = (*src2).project(i2)?;
            Ok((s1.product(s2)?, true))
        }
        // an inner join splits when the join columns survive
        Query::Join(j) if !j.outer && subset(&j.joincols, &cols) => {
            let i1 = intersect(&cols, &j.src1.columns());
            let i2 = intersect(&cols, &j.src2.columns());
            let Join { src1, src2, .. } = j;
            let s1 = (*src1).project(i1)?;
            let s2 = (*src2).project(i2)?;
            Ok((s1.join(s2)?, true))
        }
        other => Ok((other.project(cols)?, false)),
    }
}

/// Pushes a projection into both branches of a union or intersect. A
/// column proving the branches disjoint must survive the pushdown, so it
/// is added back to both branches and removed again above the operator.
fn distribute_project(
    sides: Sides,
    cols: Vec<String>,
    disc: Option<String>,
    combine: fn(Query, Query) -> QueryResult<Query>,
) -> QueryResult<(Query, bool)> {
    let keep = match &disc {
        Some(d) if !contains(&cols, d) => union(&cols, std::slice::from_ref(d)),
        _ => cols.clone(),
    };
    let Sides { src1, src2 } = sides;
    if set_eq(&keep, &src1.columns()) {
        // the discriminator is all the projection would drop
        let q = combine(*src1, *src2)?;
        let q = if set_eq(&cols, &keep) {
            q
        } else {
            q.project(cols)?
        };
        return Ok((q, false));
    }
    let s1 = (*src1).project(keep.clone())?;
    let s2 = (*src2).project(keep.clone())?;
    let mut q = combine(s1, s2)?;
    if !set_eq(&cols, &keep) {
        q = q.project(cols)?;
    }
    Ok((q, true))
}

fn rewrite_rename(rn: Rename) -> QueryResult<(Query, bool)> {
    if is_nothing(&rn.src) {
        let cols = Query::Rename(rn).columns();
        return Ok((Query::nothing(cols), true));
    }
    if rn.from.iter().zip(&rn.to).any(|(f, t)| f == t) {
        let Rename { src, from, to, .. } = rn;
        let mut nf = Vec::new();
        let mut nt = Vec::new();
        for (f, t) in from.into_iter().zip(to) {
            if f != t {
                nf.push(f);
                nt.push(t);
            }
        }
        let q = if nf.is_empty() {
            *src
        } else {
            (*src).rename(nf, nt)?
        };
        return Ok((q, true));
    }
    let Rename { src, from, to, .. } = rn;
    match *src {
        // adjacent renames compose into one substitution
        Query::Rename(inner) => {
            let Rename {
                src: is,
                from: mut f1,
                to: mut t1,
                ..
            } = inner;
            for (f, t) in from.into_iter().zip(to) {
                match t1.iter().position(|x| *x == f) {
                    Some(i) => t1[i] = t,
                    None => {
                        f1.push(f);
                        t1.push(t);
                    }
                }
            }
            let mut nf = Vec::new();
            let mut nt = Vec::new();
            for (f, t) in f1.into_iter().zip(t1) {
                if f != t {
                    nf.push(f);
                    nt.push(t);
                }
            }
            let q = if nf.is_empty() {
                *is
            } else {
                (*is).rename(nf, nt)?
            };
            Ok((q, true))
        }
        other => Ok((other.rename(from, to)?, false)),
    }
}

fn rewrite_extend(ex: Extend) -> QueryResult<(Query, bool)> {
    if is_nothing(&ex.src) {
        let cols = Query::Extend(ex).columns();
        return Ok((Query::nothing(cols), true));
    }
    if ex.cols.is_empty() {
        let Extend { src, .. } = ex;
        return Ok((*src, true));
    }
    Ok((Query::Extend(ex), false))
}

fn rewrite_sort(s: Sort) -> QueryResult<(Query, bool)> {
    if is_nothing(&s.src) {
        return Ok((Query::nothing(s.src.columns()), true));
    }
    let Sort {
        src, cols, reverse, ..
    } = s;
    match *src {
        // the outer ordering is the one the caller sees
        Query::Sort(inner) => {
            let Sort { src: is, .. } = inner;
            Ok(((*is).sort(cols, reverse)?, true))
        }
        other => Ok((other.sort(cols, reverse)?, false)),
    }
}

fn rewrite_union(u: Union) -> QueryResult<(Query, bool)> {
    if is_nothing(&u.sides.src1) {
        let Union { sides, .. } = u;
        return Ok((*sides.src2, true));
    }
    if is_nothing(&u.sides.src2) {
        let Union { sides, .. } = u;
        return Ok((*sides.src1, true));
    }
    Ok((Query::Union(u), false))
}

fn rewrite_intersect(i: Intersect) -> QueryResult<(Query, bool)> {
    if is_nothing(&i.sides.src1) || is_nothing(&i.sides.src2) {
        let cols = Query::Intersect(i).columns();
        return Ok((Query::nothing(cols), true));
    }
    Ok((Query::Intersect(i), false))
}

fn rewrite_difference(d: Difference) -> QueryResult<(Query, bool)> {
    if is_nothing(&d.sides.src1) {
        let cols = Query::Difference(d).columns();
        return Ok((Query::nothing(cols), true));
    }
    if is_nothing(&d.sides.src2) {
        let Difference { sides, .. } = d;
        return Ok((*sides.src1, true));
    }
    Ok((Query::Difference(d), false))
}

fn rewrite_product(p: Product) -> QueryResult<(Query, bool)> {
    if is_nothing(&p.src1) || is_nothing(&p.src2) {
        let cols = Query::Product(p).columns();
        return Ok((Query::nothing(cols), true));
    }
    Ok((Query::Product(p), false))
}

fn rewrite_join(j: Join) -> QueryResult<(Query, bool)> {
    let right_kills = !j.outer && is_nothing(&j.src2);
    if is_nothing(&j.src1) || right_kills {
        let cols = Query::Join(j).columns();
        return Ok((Query::nothing(cols), true));
    }
    Ok((Query::Join(j), false))
}
