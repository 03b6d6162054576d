// crates/sync-engine/src/lib.rs
//! Two-replica record synchronization engine
//!
//! This crate reconciles two [`Backend`](pilotsync_core::Backend)s so that after a
//! session both hold the same logical record set:
//! - Change detection by content hash against persisted per-pair state
//! - Policy-driven conflict resolution, with escalation to the caller
//! - Crash-safe state writes (an interrupted run converges on the next one)
//! - Cooperative cancellation and progress reporting
//!
//! # Example
//!
//! ```rust,no_run
//! use pilotsync_config::LocalStoreConfig;
//! use pilotsync_core::{CollectionDescriptor, ConflictPolicy};
//! use pilotsync_local_store::LocalFileBackend;
//! use pilotsync_sync_engine::SyncEngine;
//!
//! let local = LocalFileBackend::new(LocalStoreConfig::with_root("/tmp/pc"));
//! let remote = LocalFileBackend::with_name(
//!     "device",
//!     LocalStoreConfig::with_root("/tmp/device"),
//! );
//!
//! let mut engine = SyncEngine::new(Box::new(local), Box::new(remote));
//! engine.register_collection(CollectionDescriptor::memos());
//! engine.set_conflict_policy(ConflictPolicy::PreferNewer);
//! engine.set_state_directory("/tmp/pilotsync-state");
//!
//! let result = engine.run_sync().unwrap();
//! println!("{} pairs, {:?}", result.pairs_total, result.counts());
//! ```

mod conduit;
mod conflict;
mod engine;
mod error;
mod state;
mod types;

pub use conflict::{ConflictResolver, PairView};
pub use engine::{CancelCheck, ConflictHandler, ProgressCallback, SyncConfig, SyncEngine};
pub use error::{SyncError, SyncResult};
pub use state::{StateError, StateResult, SyncStateEntry, SyncStateStore, STATE_FORMAT_VERSION};
pub use types::{
    CollectionFailure, ConflictChoice, ConflictReport, OutcomeStatus, PairKey, PairOutcome,
    Progress, RecordStatus, SessionCounts, SessionResult, SessionState, Side, SyncAction,
};
