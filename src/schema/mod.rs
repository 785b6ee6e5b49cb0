//! Schema registry for published surveys
//!
//! Surveys are published once per version and never mutated afterwards.
//! The registry is the only source of field definitions for the intent
//! parser, the planner, the emitter's validator and the adaptive selector.
//!
//! # Design Principles
//!
//! - Structure validated on registration
//! - (surveyId, version) is immutable
//! - Field declaration order is significant
//! - Deterministic fingerprints for cache invalidation

mod errors;
mod loader;
mod registry;
mod types;
mod validator;

pub use errors::{SchemaError, SchemaErrorCode, SchemaResult, Severity, ValidationDetails};
pub use loader::SchemaLoader;
pub use registry::{FieldProvider, SchemaRegistry};
pub use types::{Field, FieldOption, FieldRef, FieldType, Survey, ValidationRules};
pub use validator::{parse_date, ResponseValidator, ValidationReport};
