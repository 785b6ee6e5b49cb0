//! CLI-specific error types
//!
//! Setup failures end the process. Failures of the request itself are
//! reported on stdout as an error response instead.

use std::fmt;
use std::io;

use crate::config::ConfigError;
use crate::response::ResponseLoadError;
use crate::schema::SchemaError;

/// CLI error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// Survey definitions failed to load
    SchemaError,
    /// Responses file failed to load
    ResponsesError,
    /// I/O error (stdin/stdout, audit file)
    IoError,
    /// Request on stdin is not what the command expects
    BadRequest,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "CLI_CONFIG_ERROR",
            Self::SchemaError => "CLI_SCHEMA_ERROR",
            Self::ResponsesError => "CLI_RESPONSES_ERROR",
            Self::IoError => "CLI_IO_ERROR",
            Self::BadRequest => "CLI_BAD_REQUEST",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::BadRequest, msg)
    }

    pub fn code(&self) -> CliErrorCode {
        self.code
    }

    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::config_error(e.to_string())
    }
}

impl From<SchemaError> for CliError {
    fn from(e: SchemaError) -> Self {
        Self::new(
            CliErrorCode::SchemaError,
            format!("{}: {}", e.code().code(), e.message()),
        )
    }
}

impl From<ResponseLoadError> for CliError {
    fn from(e: ResponseLoadError) -> Self {
        Self::new(CliErrorCode::ResponsesError, e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
