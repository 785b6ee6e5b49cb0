//! Safe query emission
//!
//! Turns an accepted plan into a parameterized SELECT and guards the path
//! to an executor.
//!
//! # Guarantees
//!
//! - Rejected plans never render
//! - Values and field keys are always placeholders, never inline text
//! - Every query is re-validated before it reaches an executor
//! - Every accept and refuse decision is written to the audit log
//!
//! The rendered text is a function of the plan alone (and the reference
//! time for time windows).

mod boundary;
mod errors;
mod render;
mod statement;
mod validator;

pub use boundary::{execute_checked, CheckedQuery, ExecutionGate, QueryExecutor, ResultRow};
pub use errors::{ExecutionError, UnsafeQueryError};
pub use render::{ParamKind, QueryEmitter, QueryParam, RenderedQuery};
pub use statement::{
    AggregateFunction, Alias, Cast, Comparison, Operand, OrderKey, OrderTerm, Predicate,
    Projection, Relation, Statement, SystemColumn, Verb,
};
pub use validator::{QueryValidator, FORBIDDEN_KEYWORDS};
