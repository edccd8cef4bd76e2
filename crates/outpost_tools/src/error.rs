//! Error type for the tools.

use thiserror::Error;

use outpost_core::error::EngineError;

/// Result type alias using [`ToolError`].
pub type Result<T> = std::result::Result<T, ToolError>;

/// Everything a tool invocation can fail with.
#[derive(Error, Debug)]
pub enum ToolError {
    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(String),
    /// Failed to read a file.
    #[error("Failed to read file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse scenario RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// Engine rejected content or configuration.
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// Report could not be written as JSON.
    #[error("Failed to write report: {0}")]
    Report(#[from] serde_json::Error),
    /// One or more files in a directory failed validation.
    #[error("{failed} of {checked} catalog files failed validation")]
    DirectoryInvalid {
        /// Files checked.
        checked: usize,
        /// Files that failed.
        failed: usize,
    },
}
