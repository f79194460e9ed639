//! Error types for executions
//!
//! Provides structured error handling with:
//! - Numeric error codes for machine parsing
//! - A fixed taxonomy of execution failures (programming error,
//!   rejection, timeout)
//! - Log-friendly formatting

use std::fmt;

use thiserror::Error;

/// Result type alias for execution operations
pub type Result<T> = std::result::Result<T, Error>;

/// Display text of a timeout failure
pub const TIMEOUT_MESSAGE: &str = "Execution timed out.";

/// Numeric error codes for machine parsing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration errors (1xx)
    ConfigInvalid = 100,
    ConfigParseError = 101,

    // IO errors (2xx)
    IoError = 200,

    // Execution errors (5xx)
    ExecutionRejected = 500,
    ExecutionTimeout = 501,
    ExecutionReused = 502,
    TypeNotFound = 503,
    TypeConflict = 504,

    // Internal errors (9xx)
    InternalError = 900,
    NotImplemented = 901,
}

impl ErrorCode {
    /// Get the string code (e.g., "E501")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for executions
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Execution Errors
    // ─────────────────────────────────────────────────────────────

    /// The execution type never supplied its `execute` work
    #[error("{type_name} must override execute")]
    MustOverrideExecute { type_name: String },

    /// Work signalled failure through its completion handle
    #[error("{message}")]
    Rejected {
        message: String,
        value: Option<serde_json::Value>,
    },

    /// No completion arrived before the armed timeout elapsed
    #[error("Execution timed out.")]
    Timeout { timeout_ms: u64 },

    /// `run` called on an instance that already left PENDING
    #[error("Execution already ran; instances are single-use")]
    AlreadyRun,

    /// No execution type registered under the name
    #[error("Execution type not found: {0}")]
    TypeNotFound(String),

    /// An execution type with the name is already registered
    #[error("Execution type already registered: {0}")]
    TypeConflict(String),

    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration parse error
    #[error("Failed to parse configuration: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<toml::de::Error>,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::MustOverrideExecute { .. } => ErrorCode::NotImplemented,
            Error::Rejected { .. } => ErrorCode::ExecutionRejected,
            Error::Timeout { .. } => ErrorCode::ExecutionTimeout,
            Error::AlreadyRun => ErrorCode::ExecutionReused,
            Error::TypeNotFound(_) => ErrorCode::TypeNotFound,
            Error::TypeConflict(_) => ErrorCode::TypeConflict,

            Error::Config(_) => ErrorCode::ConfigInvalid,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::Io(_) => ErrorCode::IoError,

            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Check if the error is a defect in the execution type itself
    pub fn is_programming_error(&self) -> bool {
        matches!(self, Error::MustOverrideExecute { .. } | Error::AlreadyRun)
    }

    /// Check if the error is a timeout failure
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Format the error for logging
    pub fn format_for_log(&self) -> String {
        format!("[{}] {}", self.code().as_str(), self)
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Constructors (for ergonomic error creation)
// ─────────────────────────────────────────────────────────────────

impl Error {
    /// Create a rejection carrying only a message
    pub fn rejected(message: impl Into<String>) -> Self {
        Error::Rejected {
            message: message.into(),
            value: None,
        }
    }

    /// Create a rejection carrying a structured payload
    pub fn rejected_with(message: impl Into<String>, value: serde_json::Value) -> Self {
        Error::Rejected {
            message: message.into(),
            value: Some(value),
        }
    }

    /// Create a timeout failure
    pub fn timeout(timeout_ms: u64) -> Self {
        Error::Timeout { timeout_ms }
    }

    /// Create a missing-execute programming error
    pub fn must_override_execute(type_name: impl Into<String>) -> Self {
        Error::MustOverrideExecute {
            type_name: type_name.into(),
        }
    }

    /// Create a config parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Error::ConfigParse {
            message: message.into(),
            source: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_format() {
        assert_eq!(ErrorCode::ConfigInvalid.as_str(), "E100");
        assert_eq!(ErrorCode::ExecutionTimeout.as_str(), "E501");
        assert_eq!(ErrorCode::InternalError.as_str(), "E900");
    }

    #[test]
    fn test_timeout_message_is_fixed() {
        let err = Error::timeout(100);
        assert_eq!(err.to_string(), TIMEOUT_MESSAGE);
        assert_eq!(Error::timeout(5_000).to_string(), TIMEOUT_MESSAGE);
        assert!(err.is_timeout());
    }

    #[test]
    fn test_must_override_execute_message() {
        let err = Error::must_override_execute("Concat");
        assert!(err.to_string().contains("must override execute"));
        assert!(err.is_programming_error());
        assert_eq!(err.code(), ErrorCode::NotImplemented);
    }

    #[test]
    fn test_rejection_keeps_payload() {
        let err = Error::rejected_with("bad input", serde_json::json!({"line": 3}));
        assert_eq!(err.to_string(), "bad input");
        match err {
            Error::Rejected { value, .. } => assert_eq!(value.unwrap()["line"], 3),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_format_for_log() {
        let formatted = Error::rejected("nope").format_for_log();
        assert!(formatted.contains("[E500]"));
        assert!(formatted.ends_with("nope"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert_eq!(err.code(), ErrorCode::IoError);
    }
}
