//! Query algebra
//!
//! A query is a tree of relational operators over base table scans. The
//! lifecycle is fixed:
//!
//! 1. Build: constructors validate column references against the schema
//! 2. Transform: semantics-preserving rewrites (see `transform`)
//! 3. Optimize: cost-based strategy and index selection (see `crate::plan`)
//! 4. Execute: bidirectional pull iteration via `select`/`rewind`/`get`
//!
//! Invariants:
//! - I1: transform and optimize preserve query semantics
//! - I2: after optimize, every scan has a concrete index and every
//!   operator a concrete strategy
//! - I3: a full backward iteration yields exactly the reverse of a full
//!   forward iteration
//! - I4: execution never reorders rows relative to the frozen plan's
//!   declared order

mod compatible;
mod errors;
mod expr;
mod extend;
mod join;
mod node;
mod nothing;
mod product;
mod project;
mod rename;
mod scan;
mod select;
mod sort;
mod summarize;
mod tempindex;
mod transform;

pub use errors::{QueryError, QueryErrorCode, QueryResult, Severity};
pub use expr::{BinaryOp, Expr, UnaryOp};
pub use node::Query;
pub use summarize::{Agg, AggOp};
pub use transform::transform;
