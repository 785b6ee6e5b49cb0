//! Schema registry error types
//!
//! Error codes:
//! - SURVEY_UNKNOWN (REJECT)
//! - SURVEY_INVALID_STRUCTURE (REJECT)
//! - SURVEY_IMMUTABLE (REJECT)
//! - SURVEY_VERSION_REGRESSION (REJECT)
//! - SURVEY_MALFORMED_FILE (FATAL)
//! - SURVEY_IO_FAILED (FATAL)

use std::fmt;

/// Severity levels for schema errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Request rejected, registry unchanged
    Reject,
    /// Schema source unusable, caller cannot proceed
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Schema-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorCode {
    /// Survey id not registered
    SurveyUnknown,
    /// Survey definition is internally inconsistent
    SurveyInvalidStructure,
    /// Same (surveyId, version) registered with different content
    SurveyImmutable,
    /// Registered version is older than the current view
    SurveyVersionRegression,
    /// Survey file could not be parsed
    SurveyMalformedFile,
    /// Survey file or directory could not be read
    SurveyIoFailed,
}

impl SchemaErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            SchemaErrorCode::SurveyUnknown => "SURVEY_UNKNOWN",
            SchemaErrorCode::SurveyInvalidStructure => "SURVEY_INVALID_STRUCTURE",
            SchemaErrorCode::SurveyImmutable => "SURVEY_IMMUTABLE",
            SchemaErrorCode::SurveyVersionRegression => "SURVEY_VERSION_REGRESSION",
            SchemaErrorCode::SurveyMalformedFile => "SURVEY_MALFORMED_FILE",
            SchemaErrorCode::SurveyIoFailed => "SURVEY_IO_FAILED",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            SchemaErrorCode::SurveyMalformedFile | SchemaErrorCode::SurveyIoFailed => {
                Severity::Fatal
            }
            _ => Severity::Reject,
        }
    }
}

impl fmt::Display for SchemaErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Structure problem details
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationDetails {
    /// Field id, or `survey` for survey-level problems
    pub field: String,
    /// Expected condition
    pub expected: String,
    /// What was found
    pub actual: String,
}

impl ValidationDetails {
    pub fn new(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn duplicate_field(field: impl Into<String>) -> Self {
        Self::new(field, "unique field id", "duplicate")
    }

    pub fn missing_options(field: impl Into<String>, field_type: &str) -> Self {
        Self::new(
            field,
            format!("options for {} field", field_type),
            "no options",
        )
    }

    pub fn inverted_bounds(field: impl Into<String>, rule: &str) -> Self {
        Self::new(field, format!("{} lower bound <= upper bound", rule), "lower > upper")
    }

    pub fn dangling_target(field: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(
            field,
            "reference to a declared field",
            format!("unknown field '{}'", target.into()),
        )
    }
}

impl fmt::Display for ValidationDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "field '{}': expected {}, got {}",
            self.field, self.expected, self.actual
        )
    }
}

/// Schema error type with full context
#[derive(Debug)]
pub struct SchemaError {
    code: SchemaErrorCode,
    message: String,
    survey_id: Option<String>,
    version: Option<u32>,
    details: Option<ValidationDetails>,
}

impl SchemaError {
    /// Create an unknown survey error
    pub fn unknown_survey(survey_id: impl Into<String>) -> Self {
        let id = survey_id.into();
        Self {
            code: SchemaErrorCode::SurveyUnknown,
            message: format!("Survey '{}' not found", id),
            survey_id: Some(id),
            version: None,
            details: None,
        }
    }

    /// Create an invalid structure error
    pub fn invalid_structure(survey_id: impl Into<String>, details: ValidationDetails) -> Self {
        Self {
            code: SchemaErrorCode::SurveyInvalidStructure,
            message: format!("Survey structure invalid: {}", details),
            survey_id: Some(survey_id.into()),
            version: None,
            details: Some(details),
        }
    }

    /// Create an immutability violation error
    pub fn immutable(survey_id: impl Into<String>, version: u32) -> Self {
        let id = survey_id.into();
        Self {
            code: SchemaErrorCode::SurveyImmutable,
            message: format!(
                "Survey '{}' version {} is already published with different content",
                id, version
            ),
            survey_id: Some(id),
            version: Some(version),
            details: None,
        }
    }

    /// Create a version regression error
    pub fn version_regression(survey_id: impl Into<String>, current: u32, offered: u32) -> Self {
        let id = survey_id.into();
        Self {
            code: SchemaErrorCode::SurveyVersionRegression,
            message: format!(
                "Survey '{}' is at version {}, refusing version {}",
                id, current, offered
            ),
            survey_id: Some(id),
            version: Some(offered),
            details: None,
        }
    }

    /// Create an error for a malformed survey file
    pub fn malformed_file(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            code: SchemaErrorCode::SurveyMalformedFile,
            message: format!(
                "Malformed survey file '{}': {}",
                path.into(),
                reason.into()
            ),
            survey_id: None,
            version: None,
            details: None,
        }
    }

    /// Create an error for an unreadable survey source
    pub fn io_failed(path: impl Into<String>, err: std::io::Error) -> Self {
        Self {
            code: SchemaErrorCode::SurveyIoFailed,
            message: format!("Failed to read '{}': {}", path.into(), err),
            survey_id: None,
            version: None,
            details: None,
        }
    }

    pub fn code(&self) -> SchemaErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn survey_id(&self) -> Option<&str> {
        self.survey_id.as_deref()
    }

    pub fn version(&self) -> Option<u32> {
        self.version
    }

    pub fn details(&self) -> Option<&ValidationDetails> {
        self.details.as_ref()
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for SchemaError {
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

impl std::error::Error for SchemaError {}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(SchemaErrorCode::SurveyUnknown.code(), "SURVEY_UNKNOWN");
        assert_eq!(
            SchemaErrorCode::SurveyInvalidStructure.code(),
            "SURVEY_INVALID_STRUCTURE"
        );
        assert_eq!(SchemaErrorCode::SurveyImmutable.code(), "SURVEY_IMMUTABLE");
        assert_eq!(
            SchemaErrorCode::SurveyMalformedFile.code(),
            "SURVEY_MALFORMED_FILE"
        );
    }

    #[test]
    fn test_severity_levels() {
        assert_eq!(SchemaErrorCode::SurveyUnknown.severity(), Severity::Reject);
        assert_eq!(SchemaErrorCode::SurveyImmutable.severity(), Severity::Reject);
        assert_eq!(SchemaErrorCode::SurveyIoFailed.severity(), Severity::Fatal);
    }

    #[test]
    fn test_validation_details_display() {
        let details = ValidationDetails::dangling_target("satisfaction", "ghost");
        let display = format!("{}", details);
        assert!(display.contains("satisfaction"));
        assert!(display.contains("ghost"));
    }

    #[test]
    fn test_display_format() {
        let err = SchemaError::immutable("pulse", 2);
        let display = format!("{}", err);
        assert!(display.starts_with("[REJECT] SURVEY_IMMUTABLE:"));
        assert_eq!(err.version(), Some(2));
    }
}
