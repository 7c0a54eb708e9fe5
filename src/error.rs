//! Error handling module
//!
//! Fatal errors for an audit run. Everything that is local to a single row,
//! declaration or default expression is not an error here: it is counted in
//! [`crate::model::Diagnostics`] and surfaced in the report instead.

use std::path::PathBuf;
use thiserror::Error;

/// Run-level error type
#[derive(Error, Debug)]
pub enum AuditError {
    /// The catalog channel is unreachable or rejected a query.
    /// No partial model is trusted after this.
    #[error("Catalog channel failure: {0}")]
    Channel(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<tokio_postgres::Error> for AuditError {
    fn from(e: tokio_postgres::Error) -> Self {
        AuditError::Channel(e.to_string())
    }
}

/// Result type alias for audit operations
pub type AuditResult<T> = Result<T, AuditError>;

/// Helper function to create a channel error
pub fn channel_error(msg: impl Into<String>) -> AuditError {
    AuditError::Channel(msg.into())
}

/// Helper function to wrap an I/O error with the path it happened on
pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> AuditError {
    AuditError::Io {
        path: path.into(),
        source,
    }
}
