//! Backend error types
//!
//! Every backend operation returns an explicit outcome. Errors fall in two tiers:
//! - **Fatal**: the backend is gone and the whole session must stop
//! - **Per-record**: recorded against one pair; the session keeps going

use std::io;
use thiserror::Error;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors a [`crate::Backend`] may report
#[derive(Debug, Error)]
pub enum BackendError {
    /// Store is not reachable
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Identity does not exist (anymore)
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Collection was never declared or ensured on this backend
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    /// I/O failure on a single record or collection
    #[error("I/O failure while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// No unique name could be found for a new record
    #[error("Could not find a free name for '{proposed}' in collection {collection}")]
    NameCollisionExhausted { collection: String, proposed: String },

    /// Anything else a backend wants to report
    #[error("{0}")]
    Other(String),
}

impl BackendError {
    /// Wraps an I/O error with a short description of what was being done
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        BackendError::Io {
            context: context.into(),
            source,
        }
    }

    /// Fatal errors abort the session; everything else is per-record
    pub fn is_fatal(&self) -> bool {
        matches!(self, BackendError::Unavailable(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound(_))
    }
}
