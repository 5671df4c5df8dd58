//! relq: an embeddable relational query engine.
//!
//! The engine turns a tree of relational operators into a frozen,
//! cost-chosen execution plan and runs it as a bidirectional cursor.
//! It owns no storage: tables, indexes and transactions come from the
//! surrounding system through the `storage` traits.
//!
//! The lifecycle of a query:
//!
//! ```text
//! build (query::Query) -> plan::plan -> select / rewind / get
//! ```
//!
//! `query::transform` normalizes the tree, `plan` costs and freezes it
//! (inserting temporary indexes where sorting is the cheapest route), and
//! execution pulls rows one at a time in either direction.

pub mod data;
pub mod observability;
pub mod plan;
pub mod query;
pub mod storage;
