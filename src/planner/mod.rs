//! Query plan builder
//!
//! Turns a `QueryIntent` into a validated `QueryPlan`.
//!
//! # Design Principles
//!
//! - Never throws: violations become `Safety::Rejected` on the plan
//! - Deterministic: same intent and registry, same plan
//! - First violation wins, checks run in a fixed order
//! - No ambient history: `QueryLog` is passed explicitly

mod builder;
mod errors;
mod explain;
mod log;
mod plan;

pub use builder::{build, PlanBuilder, DEFAULT_MAX_LIMIT};
pub use errors::{PlannerError, PlannerErrorCode, PlannerResult, Severity};
pub use explain::ExplainPlan;
pub use log::{QueryLog, QueryLogEntry};
pub use plan::{QueryPlan, Safety};
