//! Estimator errors

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EstimatorError {
    #[error("invalid sampling design: {reason}")]
    InvalidDesign { reason: String },

    #[error("{}", insufficient_message(.field, .stratum))]
    InsufficientData {
        field: String,
        stratum: Option<String>,
    },

    #[error("field '{field}' is not declared by survey '{survey_id}'")]
    UnknownField { survey_id: String, field: String },

    #[error("weight invariant violated: {reason}")]
    InvalidWeights { reason: String },

    #[error("confidence level {level} is not in (0, 1)")]
    InvalidConfidenceLevel { level: f64 },

    #[error("significance test not applicable: {reason}")]
    InvalidTest { reason: String },
}

fn insufficient_message(field: &str, stratum: &Option<String>) -> String {
    match stratum {
        Some(stratum) => format!(
            "no usable values for '{}' in stratum '{}', which carries population mass",
            field, stratum
        ),
        None => format!("no usable values for '{}'", field),
    }
}

impl EstimatorError {
    pub fn invalid_design(reason: impl Into<String>) -> Self {
        EstimatorError::InvalidDesign {
            reason: reason.into(),
        }
    }

    pub fn invalid_test(reason: impl Into<String>) -> Self {
        EstimatorError::InvalidTest {
            reason: reason.into(),
        }
    }

    pub fn insufficient(field: impl Into<String>, stratum: Option<&str>) -> Self {
        EstimatorError::InsufficientData {
            field: field.into(),
            stratum: stratum.map(str::to_string),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            EstimatorError::InvalidDesign { .. } => "ESTIMATE_INVALID_DESIGN",
            EstimatorError::InsufficientData { .. } => "ESTIMATE_INSUFFICIENT_DATA",
            EstimatorError::UnknownField { .. } => "ESTIMATE_UNKNOWN_FIELD",
            EstimatorError::InvalidWeights { .. } => "ESTIMATE_INVALID_WEIGHTS",
            EstimatorError::InvalidConfidenceLevel { .. } => "ESTIMATE_INVALID_CONFIDENCE_LEVEL",
            EstimatorError::InvalidTest { .. } => "ESTIMATE_INVALID_TEST",
        }
    }
}

pub type EstimatorResult<T> = Result<T, EstimatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_names_stratum() {
        let err = EstimatorError::insufficient("satisfaction", Some("north"));
        assert_eq!(err.code(), "ESTIMATE_INSUFFICIENT_DATA");
        assert!(err.to_string().contains("'north'"));

        let err = EstimatorError::insufficient("satisfaction", None);
        assert!(!err.to_string().contains("stratum"));
    }
}
