//! Analytics pipeline
//!
//! Ties the core together for one caller:
//! question → intent → plan → checked query → rows or estimate.
//!
//! Guarantees:
//! - Every plan a session builds is recorded in its query log
//! - Every query reaches the executor only through the execution gate
//! - Error codes from the failing stage pass through unchanged

mod errors;
mod session;

pub use errors::{PipelineError, PipelineResult};
pub use session::{AnalyticsSession, EstimateOutcome, PlannedQuestion, QueryOutcome};
