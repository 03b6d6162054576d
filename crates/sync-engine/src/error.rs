// crates/sync-engine/src/error.rs
//! Error types for sync operations

use crate::state::StateError;
use pilotsync_core::BackendError;
use thiserror::Error;

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during synchronization
#[derive(Debug, Error)]
pub enum SyncError {
    /// Another session is running
    #[error("Sync already in progress")]
    Busy,

    /// `run_sync` was called without a state directory
    #[error("No sync state directory configured")]
    NoStateDirectory,

    /// A backend failed its readiness check or dropped mid-session
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Backend error that escaped per-pair handling
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Sync state could not be read or made durable
    #[error("Sync state error: {0}")]
    State(#[from] StateError),

    /// Escalated conflict with no choice supplied
    #[error("Conflict unresolved for pair {0}")]
    ConflictUnresolved(String),

    /// Configuration could not be turned into an engine setup
    #[error("Configuration error: {0}")]
    Config(String),

    /// A lock was poisoned by a panicking callback
    #[error("Lock poisoned")]
    LockPoisoned,
}

impl SyncError {
    /// Fatal errors end the session in `Failed`
    pub fn is_fatal(&self) -> bool {
        match self {
            SyncError::Backend(e) => e.is_fatal(),
            SyncError::ConflictUnresolved(_) => false,
            _ => true,
        }
    }
}
