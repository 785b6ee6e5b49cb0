//! Adaptive selector errors

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdaptiveError {
    #[error("field '{field_id}' is not declared by survey '{survey_id}'")]
    UnknownField { survey_id: String, field_id: String },
}

impl AdaptiveError {
    pub fn code(&self) -> &'static str {
        match self {
            AdaptiveError::UnknownField { .. } => "ADAPTIVE_UNKNOWN_FIELD",
        }
    }
}

pub type AdaptiveResult<T> = Result<T, AdaptiveError>;
