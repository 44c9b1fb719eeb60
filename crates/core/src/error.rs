//! Core Error Types
//!
//! Defines the foundational error types used across the QA Cascade workspace.
//! These error types are dependency-free (only thiserror + std) to keep the core
//! crate lightweight.
//!
//! Most failure kinds during a run are *not* errors in the Rust sense: tool
//! unavailability, timeouts and crashes are captured into the result model and
//! classified with [`ErrorKind`]. Only configuration loading, environment
//! verification and plumbing failures travel as `CoreError`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core error type for the QA Cascade workspace.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Command execution errors
    #[error("Command error: {0}")]
    Command(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Parse errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// No usable interpreter or project root; aborts the run before execution
    #[error("Environment verification failed: {0}")]
    EnvironmentVerification(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a command error
    pub fn command(msg: impl Into<String>) -> Self {
        Self::Command(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create an environment verification error
    pub fn environment(msg: impl Into<String>) -> Self {
        Self::EnvironmentVerification(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Classify this error into one of the run-level error kinds.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Config(_) | CoreError::Serialization(_) | CoreError::Parse(_) => {
                ErrorKind::Configuration
            }
            CoreError::EnvironmentVerification(_) => ErrorKind::EnvironmentVerification,
            CoreError::NotFound(_) => ErrorKind::ToolUnavailable,
            CoreError::Io(_)
            | CoreError::Command(_)
            | CoreError::Validation(_)
            | CoreError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Convert CoreError to a string
impl From<CoreError> for String {
    fn from(err: CoreError) -> String {
        err.to_string()
    }
}

/// Run-level classification of everything that can go wrong.
///
/// Only `EnvironmentVerification` and `UnknownCliArgument` are fatal; every
/// other kind is attributed to a tool or dimension in the final report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Configuration,
    ToolUnavailable,
    PrerequisiteMissing,
    ExecutionTimeout,
    ToolCrash,
    EnvironmentVerification,
    UnknownCliArgument,
    Internal,
}

impl ErrorKind {
    /// Whether this kind aborts the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ErrorKind::EnvironmentVerification | ErrorKind::UnknownCliArgument
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::ToolUnavailable => "tool-unavailable",
            ErrorKind::PrerequisiteMissing => "prerequisite-missing",
            ErrorKind::ExecutionTimeout => "execution-timeout",
            ErrorKind::ToolCrash => "tool-crash",
            ErrorKind::EnvironmentVerification => "environment-verification",
            ErrorKind::UnknownCliArgument => "unknown-cli-argument",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
