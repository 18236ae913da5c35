//! Error types for Refinery.
//!
//! Library crates use [`RefineryError`] via `thiserror`.
//! The server app wraps this with `color-eyre` for rich diagnostics at startup.

use std::path::PathBuf;

/// Top-level error type for all Refinery operations.
#[derive(Debug, thiserror::Error)]
pub enum RefineryError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP transport error against the enrichment backend.
    #[error("network error: {0}")]
    Network(String),

    /// Enrichment backend error (API failure or schema-invalid output).
    #[error("enrichment error: {0}")]
    Enrichment(String),

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Data validation error (malformed request, invalid format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, RefineryError>;

impl RefineryError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an enrichment error from any displayable message.
    pub fn enrichment(msg: impl Into<String>) -> Self {
        Self::Enrichment(msg.into())
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
