//! Plan rejection codes
//!
//! A rejection is data, not a failure: the builder still returns a plan,
//! marked `Safety::Rejected` with the first violation found.
//!
//! Codes, in check order:
//! - UNKNOWN_SURVEY
//! - CROSS_SURVEY_REFERENCE
//! - UNRESOLVED_REFERENCE
//! - EMPTY_INTENT
//! - MISSING_TARGET
//! - AGGREGATION_TYPE_MISMATCH
//! - OPERATOR_TYPE_MISMATCH
//! - INVALID_FILTER_VALUE
//! - LIMIT_EXCEEDED

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::{FieldRef, FieldType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Request rejected, caller may rephrase
    Reject,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlannerErrorCode {
    /// Survey id not registered
    UnknownSurvey,
    /// Field reference names another survey
    CrossSurveyReference,
    /// Field id not found in the survey
    UnresolvedReference,
    /// Nothing to aggregate, select or group
    EmptyIntent,
    /// Aggregation other than count without a target field
    MissingTarget,
    /// Aggregation not defined for the target's type
    AggregationTypeMismatch,
    /// Comparison not defined for the filter field's type
    OperatorTypeMismatch,
    /// Filter value has the wrong shape for its operator
    InvalidFilterValue,
    /// Row limit above the configured maximum
    LimitExceeded,
}

impl PlannerErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            PlannerErrorCode::UnknownSurvey => "UNKNOWN_SURVEY",
            PlannerErrorCode::CrossSurveyReference => "CROSS_SURVEY_REFERENCE",
            PlannerErrorCode::UnresolvedReference => "UNRESOLVED_REFERENCE",
            PlannerErrorCode::EmptyIntent => "EMPTY_INTENT",
            PlannerErrorCode::MissingTarget => "MISSING_TARGET",
            PlannerErrorCode::AggregationTypeMismatch => "AGGREGATION_TYPE_MISMATCH",
            PlannerErrorCode::OperatorTypeMismatch => "OPERATOR_TYPE_MISMATCH",
            PlannerErrorCode::InvalidFilterValue => "INVALID_FILTER_VALUE",
            PlannerErrorCode::LimitExceeded => "LIMIT_EXCEEDED",
        }
    }

    pub fn severity(&self) -> Severity {
        Severity::Reject
    }
}

impl fmt::Display for PlannerErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Plan rejection with field context
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerError {
    code: PlannerErrorCode,
    message: String,
    field: Option<FieldRef>,
}

impl PlannerError {
    pub fn unknown_survey(survey_id: &str) -> Self {
        Self {
            code: PlannerErrorCode::UnknownSurvey,
            message: format!("Survey '{}' not found", survey_id),
            field: None,
        }
    }

    pub fn cross_survey(field: &FieldRef, survey_id: &str) -> Self {
        Self {
            code: PlannerErrorCode::CrossSurveyReference,
            message: format!(
                "Field '{}' belongs to survey '{}', not '{}'",
                field.field_id, field.survey_id, survey_id
            ),
            field: Some(field.clone()),
        }
    }

    pub fn unresolved(field: &FieldRef) -> Self {
        Self {
            code: PlannerErrorCode::UnresolvedReference,
            message: format!(
                "Field '{}' not found in survey '{}'",
                field.field_id, field.survey_id
            ),
            field: Some(field.clone()),
        }
    }

    pub fn empty_intent() -> Self {
        Self {
            code: PlannerErrorCode::EmptyIntent,
            message: "No aggregation, target field or grouping recognized".into(),
            field: None,
        }
    }

    pub fn missing_target(aggregation: &str) -> Self {
        Self {
            code: PlannerErrorCode::MissingTarget,
            message: format!("Aggregation '{}' needs a target field", aggregation),
            field: None,
        }
    }

    pub fn aggregation_mismatch(field: &FieldRef, aggregation: &str, field_type: FieldType) -> Self {
        Self {
            code: PlannerErrorCode::AggregationTypeMismatch,
            message: format!(
                "Cannot apply '{}' to field '{}' of type {}",
                aggregation, field.field_id, field_type
            ),
            field: Some(field.clone()),
        }
    }

    pub fn operator_mismatch(field: &FieldRef, operator: &str, field_type: FieldType) -> Self {
        Self {
            code: PlannerErrorCode::OperatorTypeMismatch,
            message: format!(
                "Operator '{}' is not defined for field '{}' of type {}",
                operator, field.field_id, field_type
            ),
            field: Some(field.clone()),
        }
    }

    pub fn invalid_value(field: &FieldRef, reason: impl Into<String>) -> Self {
        Self {
            code: PlannerErrorCode::InvalidFilterValue,
            message: format!("Filter on '{}': {}", field.field_id, reason.into()),
            field: Some(field.clone()),
        }
    }

    pub fn limit_exceeded(limit: u64, max: u64) -> Self {
        Self {
            code: PlannerErrorCode::LimitExceeded,
            message: format!("Limit {} exceeds maximum {}", limit, max),
            field: None,
        }
    }

    pub fn code(&self) -> PlannerErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn field(&self) -> Option<&FieldRef> {
        self.field.as_ref()
    }
}

impl fmt::Display for PlannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )
    }
}

impl std::error::Error for PlannerError {}

pub type PlannerResult<T> = Result<T, PlannerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(PlannerErrorCode::UnknownSurvey.code(), "UNKNOWN_SURVEY");
        assert_eq!(
            PlannerErrorCode::AggregationTypeMismatch.code(),
            "AGGREGATION_TYPE_MISMATCH"
        );
        assert_eq!(
            serde_json::to_value(PlannerErrorCode::LimitExceeded).unwrap(),
            "LIMIT_EXCEEDED"
        );
    }

    #[test]
    fn test_error_display_and_field() {
        let field = FieldRef::new("pulse", "nope");
        let err = PlannerError::unresolved(&field);
        let display = err.to_string();
        assert!(display.starts_with("[REJECT] UNRESOLVED_REFERENCE"));
        assert!(display.contains("nope"));
        assert_eq!(err.field(), Some(&field));
    }
}
