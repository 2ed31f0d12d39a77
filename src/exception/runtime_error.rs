use crate::exception::Severity;
use std::panic::Location;
use thiserror::Error;

/// A runtime error occurrence that is not (yet) an error value.
///
/// Runtime errors are reported through [`trigger_error`](crate::trigger_error)
/// or recorded as the last fatal error with [`fatal_error`](crate::fatal_error).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeError {
    pub severity: Severity,
    pub message: String,
    pub file: String,
    pub line: u32,
}

impl RuntimeError {
    pub fn new(
        severity: Severity,
        message: impl Into<String>,
        file: impl Into<String>,
        line: u32,
    ) -> Self {
        Self {
            severity,
            message: message.into(),
            file: file.into(),
            line,
        }
    }

    /// Create a runtime error located at the caller.
    #[track_caller]
    pub fn here(severity: Severity, message: impl Into<String>) -> Self {
        let location = Location::caller();
        Self::new(severity, message, location.file(), location.line())
    }
}

/// A runtime error promoted into an error value.
///
/// Returned by the error hook when the error's severity is enabled in the
/// active reporting mask.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ErrorException {
    message: String,
    severity: Severity,
    file: String,
    line: u32,
}

impl ErrorException {
    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }
}

impl From<RuntimeError> for ErrorException {
    fn from(error: RuntimeError) -> Self {
        Self {
            message: error.message,
            severity: error.severity,
            file: error.file,
            line: error.line,
        }
    }
}
