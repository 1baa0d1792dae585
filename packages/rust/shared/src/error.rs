//! Error types for MasterTable.
//!
//! Library crates use [`MasterTableError`] via `thiserror`.
//! App crates (cli/tui) wrap this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all MasterTable operations.
#[derive(Debug, thiserror::Error)]
pub enum MasterTableError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to the catalog API.
    #[error("network error: {0}")]
    Network(String),

    /// A listing page could not be fetched; the whole traversal is aborted.
    #[error("failed to fetch versions page {page}: {message}")]
    Pagination { page: u32, message: String },

    /// JSON or HTML parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad id, out-of-range option, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The run was superseded and abandoned its work.
    #[error("operation cancelled")]
    Cancelled,
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, MasterTableError>;

impl MasterTableError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap the failure of a single listing page.
    pub fn pagination(page: u32, cause: impl std::fmt::Display) -> Self {
        Self::Pagination {
            page,
            message: cause.to_string(),
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
