use thiserror::Error;

use crate::executor::ExecutorError;
use crate::planner::PlannerErrorCode;

/// Emission-boundary rejection. Always fatal to the request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnsafeQueryError {
    #[error("plan was rejected ({code}): {reason}")]
    RejectedPlan {
        code: PlannerErrorCode,
        reason: String,
    },

    #[error("survey '{survey_id}' is not registered")]
    UnknownSurvey { survey_id: String },

    #[error("field '{field_id}' does not resolve in survey '{survey_id}'")]
    UnresolvedField { survey_id: String, field_id: String },

    #[error("statement must start with SELECT")]
    NotSelect,

    #[error("forbidden keyword '{keyword}'")]
    ForbiddenKeyword { keyword: String },

    #[error("forbidden sequence '{sequence}'")]
    ForbiddenSequence { sequence: String },

    #[error("identifier '{identifier}' is not whitelisted")]
    DisallowedIdentifier { identifier: String },

    #[error("placeholder mismatch: {reason}")]
    PlaceholderMismatch { reason: String },

    #[error("parameter ${index} has the wrong kind for its use")]
    ParamKindMismatch { index: usize },

    #[error("SQL text does not match its statement")]
    StructureMismatch,

    #[error("time window '{window}' is out of range")]
    TimeWindowOutOfRange { window: String },
}

impl UnsafeQueryError {
    pub fn code(&self) -> &'static str {
        match self {
            UnsafeQueryError::RejectedPlan { .. } => "QUERY_PLAN_REJECTED",
            UnsafeQueryError::UnknownSurvey { .. } => "QUERY_UNKNOWN_SURVEY",
            UnsafeQueryError::UnresolvedField { .. } => "QUERY_UNRESOLVED_FIELD",
            UnsafeQueryError::NotSelect => "QUERY_NOT_SELECT",
            UnsafeQueryError::ForbiddenKeyword { .. } => "QUERY_FORBIDDEN_KEYWORD",
            UnsafeQueryError::ForbiddenSequence { .. } => "QUERY_FORBIDDEN_SEQUENCE",
            UnsafeQueryError::DisallowedIdentifier { .. } => "QUERY_DISALLOWED_IDENTIFIER",
            UnsafeQueryError::PlaceholderMismatch { .. } => "QUERY_PLACEHOLDER_MISMATCH",
            UnsafeQueryError::ParamKindMismatch { .. } => "QUERY_PARAM_KIND_MISMATCH",
            UnsafeQueryError::StructureMismatch => "QUERY_STRUCTURE_MISMATCH",
            UnsafeQueryError::TimeWindowOutOfRange { .. } => "QUERY_TIME_WINDOW_RANGE",
        }
    }
}

/// Failure of a checked execution
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Unsafe(#[from] UnsafeQueryError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error("audit log write failed: {0}")]
    Audit(#[source] std::io::Error),
}

impl ExecutionError {
    pub fn code(&self) -> &'static str {
        match self {
            ExecutionError::Unsafe(err) => err.code(),
            ExecutionError::Executor(err) => err.code().code(),
            ExecutionError::Audit(_) => "QUERY_AUDIT_FAILED",
        }
    }
}
