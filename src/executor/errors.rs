//! Executor error types
//!
//! Error codes:
//! - EXECUTION_FAILED (ERROR)
//! - EXECUTION_MISSING_PARAM (FATAL)
//! - EXECUTION_BAD_PARAM (FATAL)
//! - EXECUTION_UNSUPPORTED (ERROR)
//!
//! A missing or malformed parameter means the query and its statement
//! disagree. The boundary validator should have caught it, so it is fatal.

use std::fmt;

/// Severity levels for executor errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Query failed, executor is healthy
    Error,
    /// Query and statement are inconsistent
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorErrorCode {
    ExecutionFailed,
    MissingParam,
    BadParam,
    Unsupported,
}

impl ExecutorErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            ExecutorErrorCode::ExecutionFailed => "EXECUTION_FAILED",
            ExecutorErrorCode::MissingParam => "EXECUTION_MISSING_PARAM",
            ExecutorErrorCode::BadParam => "EXECUTION_BAD_PARAM",
            ExecutorErrorCode::Unsupported => "EXECUTION_UNSUPPORTED",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            ExecutorErrorCode::MissingParam | ExecutorErrorCode::BadParam => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for ExecutorErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Executor error with context
#[derive(Debug)]
pub struct ExecutorError {
    code: ExecutorErrorCode,
    message: String,
    /// Placeholder number if applicable
    param: Option<usize>,
}

impl ExecutorError {
    pub fn execution_failed(reason: impl Into<String>) -> Self {
        Self {
            code: ExecutorErrorCode::ExecutionFailed,
            message: reason.into(),
            param: None,
        }
    }

    pub fn missing_param(index: usize) -> Self {
        Self {
            code: ExecutorErrorCode::MissingParam,
            message: format!("placeholder ${} has no bound parameter", index),
            param: Some(index),
        }
    }

    pub fn bad_param(index: usize, reason: impl Into<String>) -> Self {
        Self {
            code: ExecutorErrorCode::BadParam,
            message: format!("parameter ${}: {}", index, reason.into()),
            param: Some(index),
        }
    }

    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self {
            code: ExecutorErrorCode::Unsupported,
            message: reason.into(),
            param: None,
        }
    }

    pub fn code(&self) -> ExecutorErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn param(&self) -> Option<usize> {
        self.param
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for ExecutorError {
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

impl std::error::Error for ExecutorError {}

pub type ExecutorResult<T> = Result<T, ExecutorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ExecutorErrorCode::ExecutionFailed.code(), "EXECUTION_FAILED");
        assert_eq!(ExecutorErrorCode::MissingParam.code(), "EXECUTION_MISSING_PARAM");
        assert_eq!(ExecutorErrorCode::BadParam.code(), "EXECUTION_BAD_PARAM");
        assert_eq!(ExecutorErrorCode::Unsupported.code(), "EXECUTION_UNSUPPORTED");
    }

    #[test]
    fn test_param_errors_are_fatal() {
        let err = ExecutorError::missing_param(3);
        assert!(err.is_fatal());
        assert_eq!(err.param(), Some(3));
        assert!(!ExecutorError::execution_failed("down").is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = ExecutorError::bad_param(2, "expected a string field key");
        let display = format!("{}", err);
        assert!(display.contains("EXECUTION_BAD_PARAM"));
        assert!(display.contains("FATAL"));
        assert!(display.contains("$2"));
    }
}
