//! Query executor subsystem
//!
//! Reference executor for rendered queries. Interprets the statement
//! over an in-memory response store, so the CLI and tests run without a
//! database.
//!
//! # Invariants
//!
//! - Deterministic: same query and responses give the same rows
//! - Reads only; responses are never modified
//! - A parameter the statement needs but the query lacks is fatal

mod aggregate;
mod errors;
mod executor;
mod filters;
mod result;
mod scalar;
mod sorter;

pub use errors::{ExecutorError, ExecutorErrorCode, ExecutorResult, Severity};
pub use executor::ResponseExecutor;
pub use filters::PredicateFilter;
pub use result::ExecutionResult;
pub use scalar::{Bindings, Scalar};
pub use sorter::ResultSorter;
