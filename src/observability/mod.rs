//! Observability for the query engine
//!
//! # Principles
//!
//! 1. Observability is read-only: no side effects on planning or execution
//! 2. No async or background threads
//! 3. Deterministic output
//!
//! The planner logs `PLAN_FROZEN` / `PLAN_REJECTED`, the per-node plan
//! cache logs `PLAN_CACHE_OVERFLOW` when its memo grows past the warning
//! threshold (a diagnostic for pathological plan search, never a bound),
//! and the temp-index materializer logs `TEMPINDEX_BUILT`.

mod logger;
mod metrics;

pub use logger::{Logger, Severity};
pub use metrics::{metrics, MetricsRegistry};
