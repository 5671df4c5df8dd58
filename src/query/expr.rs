//! Filter and extend expressions
//!
//! Expressions are evaluated against a header/row pair. Evaluation is
//! lenient: a column the row does not carry reads as the empty string and
//! a type mismatch yields the empty string rather than an error, so a
//! malformed predicate filters rows out instead of failing mid-iteration.

use crate::data::{combine, Fixed, Header, Row, Value};

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Logical negation
    Not,
    /// Numeric negation
    Neg,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// Equality
    Eq,
    /// Inequality
    Ne,
    /// Less than
    Lt,
    /// Less than or equal
    Lte,
    /// Greater than
    Gt,
    /// Greater than or equal
    Gte,
    /// Addition
    Add,
    /// Subtraction
    Sub,
    /// Multiplication
    Mul,
    /// Division
    Div,
    /// String concatenation
    Cat,
}

/// An expression over the columns of a query.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value
    Constant(Value),
    /// Column reference
    Column(String),
    /// Unary operation
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        expr: Box<Expr>,
    },
    /// Binary operation
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        lhs: Box<Expr>,
        /// Right operand
        rhs: Box<Expr>,
    },
    /// Conjunction; empty means true
    And(Vec<Expr>),
    /// Disjunction; empty means false
    Or(Vec<Expr>),
    /// Column membership in a literal list
    In {
        /// Column tested
        col: String,
        /// Candidate values
        values: Vec<Value>,
    },
}

impl Expr {
    /// A column reference.
    pub fn col(name: impl Into<String>) -> Expr {
        Expr::Column(name.into())
    }

    /// A literal.
    pub fn val(v: Value) -> Expr {
        Expr::Constant(v)
    }

    /// `column == value`, the shape the fixed-value analysis recognizes.
    pub fn eq_val(col: impl Into<String>, v: Value) -> Expr {
        Expr::Binary {
            op: BinaryOp::Eq,
            lhs: Box::new(Expr::col(col)),
            rhs: Box::new(Expr::Constant(v)),
        }
    }

    /// A general binary operation.
    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// The literal `true`.
    pub fn truth() -> Expr {
        Expr::Constant(Value::Bool(true))
    }

    /// Returns true for the literal `true`.
    pub fn is_true(&self) -> bool {
        matches!(self, Expr::Constant(Value::Bool(true))) || matches!(self, Expr::And(t) if t.is_empty())
    }

    /// Returns true for the literal `false`.
    pub fn is_false(&self) -> bool {
        matches!(self, Expr::Constant(Value::Bool(false))) || matches!(self, Expr::Or(t) if t.is_empty())
    }

    /// The sorted set of columns the expression reads.
    pub fn columns(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out.sort();
        out.dedup();
        out
    }

    fn collect_columns(&self, out: &mut Vec<String>) {
        match self {
            Expr::Constant(_) => {}
            Expr::Column(c) => out.push(c.clone()),
            Expr::Unary { expr, .. } => expr.collect_columns(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_columns(out);
                rhs.collect_columns(out);
            }
            Expr::And(terms) | Expr::Or(terms) => {
                for t in terms {
                    t.collect_columns(out);
                }
            }
            Expr::In { col, .. } => out.push(col.clone()),
        }
    }

    /// Rewrites column references: a column at position i of `from`
    /// becomes `to[i]`. Columns not listed pass through.
    pub fn rename_columns(&self, from: &[String], to: &[String]) -> Expr {
        let map = |c: &String| -> String {
            match from.iter().position(|f| f == c) {
                Some(i) => to[i].clone(),
                None => c.clone(),
            }
        };
        match self {
            Expr::Constant(v) => Expr::Constant(v.clone()),
            Expr::Column(c) => Expr::Column(map(c)),
            Expr::Unary { op, expr } => Expr::Unary {
                op: *op,
                expr: Box::new(expr.rename_columns(from, to)),
            },
            Expr::Binary { op, lhs, rhs } => Expr::Binary {
                op: *op,
                lhs: Box::new(lhs.rename_columns(from, to)),
                rhs: Box::new(rhs.rename_columns(from, to)),
            },
            Expr::And(terms) => {
                Expr::And(terms.iter().map(|t| t.rename_columns(from, to)).collect())
            }
            Expr::Or(terms) => Expr::Or(terms.iter().map(|t| t.rename_columns(from, to)).collect()),
            Expr::In { col, values } => Expr::In {
                col: map(col),
                values: values.clone(),
            },
        }
    }

    /// Evaluates against a header/row pair.
    pub fn eval(&self, hdr: &Header, row: &Row) -> Value {
        match self {
            Expr::Constant(v) => v.clone(),
            Expr::Column(c) => hdr.get(row, c),
            Expr::Unary { op, expr } => {
                let v = expr.eval(hdr, row);
                match op {
                    UnaryOp::Not => Value::Bool(!is_truthy(&v)),
                    UnaryOp::Neg => match v.as_number() {
                        Some(n) => numeric(-n),
                        None => Value::empty(),
                    },
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                let a = lhs.eval(hdr, row);
                let b = rhs.eval(hdr, row);
                eval_binary(*op, a, b)
            }
            Expr::And(terms) => {
                for t in terms {
                    if !is_truthy(&t.eval(hdr, row)) {
                        return Value::Bool(false);
                    }
                }
                Value::Bool(true)
            }
            Expr::Or(terms) => {
                for t in terms {
                    if is_truthy(&t.eval(hdr, row)) {
                        return Value::Bool(true);
                    }
                }
                Value::Bool(false)
            }
            Expr::In { col, values } => {
                let v = hdr.get(row, col);
                Value::Bool(values.contains(&v))
            }
        }
    }

    /// Fixed values implied by the expression, for the planner's
    /// disjointness analysis. Only conjunctions of `col == constant` and
    /// `col in (...)` terms contribute.
    pub fn fixed(&self) -> Vec<Fixed> {
        match self {
            Expr::And(terms) => {
                let mut out: Vec<Fixed> = Vec::new();
                for t in terms {
                    out = combine(out, t.fixed());
                }
                out
            }
            Expr::Binary {
                op: BinaryOp::Eq,
                lhs,
                rhs,
            } => match (lhs.as_ref(), rhs.as_ref()) {
                (Expr::Column(c), Expr::Constant(v)) | (Expr::Constant(v), Expr::Column(c)) => {
                    vec![Fixed::single(c.clone(), v.clone())]
                }
                _ => Vec::new(),
            },
            Expr::In { col, values } => vec![Fixed::new(col.clone(), values.clone())],
            _ => Vec::new(),
        }
    }

    /// Flattens into conjunction terms. A non-And expression is a single
    /// term; nested Ands are flattened one level per call site's loop.
    pub fn into_terms(self) -> Vec<Expr> {
        match self {
            Expr::And(terms) => terms,
            other => vec![other],
        }
    }
}

fn is_truthy(v: &Value) -> bool {
    matches!(v, Value::Bool(true))
}

/// Integer results stay integers; everything else becomes a float.
fn numeric(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::Int(n as i64)
    } else {
        Value::from_float(n)
    }
}

fn eval_binary(op: BinaryOp, a: Value, b: Value) -> Value {
    match op {
        BinaryOp::Eq => Value::Bool(a == b),
        BinaryOp::Ne => Value::Bool(a != b),
        BinaryOp::Lt => Value::Bool(a < b),
        BinaryOp::Lte => Value::Bool(a <= b),
        BinaryOp::Gt => Value::Bool(a > b),
        BinaryOp::Gte => Value::Bool(a >= b),
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
            match (a.as_number(), b.as_number()) {
                (Some(x), Some(y)) => match op {
                    BinaryOp::Add => numeric(x + y),
                    BinaryOp::Sub => numeric(x - y),
                    BinaryOp::Mul => numeric(x * y),
                    _ => {
                        if y == 0.0 {
                            Value::empty()
                        } else {
                            numeric(x / y)
                        }
                    }
                },
                _ => Value::empty(),
            }
        }
        BinaryOp::Cat => match (a, b) {
            (Value::Str(x), Value::Str(y)) => Value::Str(x + &y),
            (x, y) => Value::Str(format!("{}{}", text(&x), text(&y))),
        },
    }
}

fn text(v: &Value) -> String {
    match v {
        Value::Str(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::cols::cols;
    use crate::data::Record;

    fn row(vals: Vec<Value>) -> Row {
        Row::single(Record::new(vals))
    }

    fn hdr() -> Header {
        Header::single(cols(&["a", "b"]))
    }

    #[test]
    fn test_eval_comparison() {
        let h = hdr();
        let r = row(vec![Value::Int(3), Value::str("x")]);
        assert_eq!(
            Expr::eq_val("a", Value::Int(3)).eval(&h, &r),
            Value::Bool(true)
        );
        assert_eq!(
            Expr::binary(BinaryOp::Lt, Expr::col("a"), Expr::val(Value::Int(5))).eval(&h, &r),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_eval_arithmetic() {
        let h = hdr();
        let r = row(vec![Value::Int(3), Value::str("x")]);
        let e = Expr::binary(BinaryOp::Add, Expr::col("a"), Expr::val(Value::Int(4)));
        assert_eq!(e.eval(&h, &r), Value::Int(7));
        let d = Expr::binary(BinaryOp::Div, Expr::col("a"), Expr::val(Value::Int(0)));
        assert_eq!(d.eval(&h, &r), Value::empty());
    }

    #[test]
    fn test_missing_column_reads_empty() {
        let h = hdr();
        let r = row(vec![Value::Int(3), Value::str("x")]);
        assert_eq!(Expr::col("zzz").eval(&h, &r), Value::empty());
        // arithmetic on the empty string is lenient, not an error
        let e = Expr::binary(BinaryOp::Add, Expr::col("zzz"), Expr::val(Value::Int(1)));
        assert_eq!(e.eval(&h, &r), Value::empty());
    }

    #[test]
    fn test_columns_sorted_set() {
        let e = Expr::And(vec![
            Expr::eq_val("b", Value::Int(1)),
            Expr::binary(BinaryOp::Gt, Expr::col("a"), Expr::col("b")),
        ]);
        assert_eq!(e.columns(), cols(&["a", "b"]));
    }

    #[test]
    fn test_rename_columns() {
        let e = Expr::eq_val("a", Value::Int(1));
        let r = e.rename_columns(&cols(&["a"]), &cols(&["x"]));
        assert_eq!(r.columns(), cols(&["x"]));
    }

    #[test]
    fn test_fixed_extraction() {
        let e = Expr::And(vec![
            Expr::eq_val("a", Value::Int(1)),
            Expr::In {
                col: "b".into(),
                values: vec![Value::str("x"), Value::str("y")],
            },
        ]);
        let fixed = e.fixed();
        assert_eq!(fixed.len(), 2);
        assert_eq!(fixed[0].col, "a");
        assert_eq!(fixed[1].values.len(), 2);
        // a non-equijoin term contributes nothing
        assert!(Expr::binary(BinaryOp::Gt, Expr::col("a"), Expr::val(Value::Int(0)))
            .fixed()
            .is_empty());
    }
}
