//! Pipeline errors
//!
//! Pass-through: codes from the failing subsystem are preserved.

use thiserror::Error;

use crate::adaptive::AdaptiveError;
use crate::emitter::ExecutionError;
use crate::estimator::EstimatorError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("survey '{survey_id}' is not registered")]
    UnknownSurvey { survey_id: String },

    #[error("question has no target field to estimate")]
    NoEstimateTarget,

    #[error("'{aggregation}' questions cannot be estimated, only averages")]
    NotEstimable { aggregation: String },

    #[error("executor returned a malformed row: {reason}")]
    MalformedRow { reason: String },

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Estimator(#[from] EstimatorError),

    #[error(transparent)]
    Adaptive(#[from] AdaptiveError),
}

impl PipelineError {
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::UnknownSurvey { .. } => "PIPELINE_UNKNOWN_SURVEY",
            PipelineError::NoEstimateTarget => "PIPELINE_NO_ESTIMATE_TARGET",
            PipelineError::NotEstimable { .. } => "PIPELINE_NOT_ESTIMABLE",
            PipelineError::MalformedRow { .. } => "PIPELINE_MALFORMED_ROW",
            PipelineError::Execution(err) => err.code(),
            PipelineError::Estimator(err) => err.code(),
            PipelineError::Adaptive(err) => err.code(),
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
