//! Error Handling
//!
//! Application-level error type for the CLI, reporting and issue history.
//! Wraps [`CoreError`] and adds the failures that only exist at this layer.

use thiserror::Error;

use qa_cascade_core::{CoreError, ErrorKind};

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Errors raised by the workspace crates
    #[error(transparent)]
    Core(#[from] CoreError),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Report rendering errors
    #[error("Render error: {0}")]
    Render(String),

    /// Invalid command-line usage detected after parsing
    #[error("Invalid arguments: {0}")]
    Cli(String),

    /// Issue history errors
    #[error("Feedback error: {0}")]
    Feedback(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn cli(msg: impl Into<String>) -> Self {
        Self::Cli(msg.into())
    }

    pub fn feedback(msg: impl Into<String>) -> Self {
        Self::Feedback(msg.into())
    }

    /// Run-level classification, used when the error ends up in an issue report.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Core(e) => e.kind(),
            AppError::Cli(_) => ErrorKind::UnknownCliArgument,
            AppError::Io(_) | AppError::Serialization(_) | AppError::Render(_) | AppError::Feedback(_) => {
                ErrorKind::Internal
            }
        }
    }
}

impl From<AppError> for String {
    fn from(err: AppError) -> String {
        err.to_string()
    }
}
