// crates/sync-engine/src/types.rs
//! Core sync types and data structures

use chrono::{DateTime, Utc};
use pilotsync_core::{ContentHash, Record};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Which replica a record lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Local,
    Remote,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Local => Side::Remote,
            Side::Remote => Side::Local,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Local => write!(f, "local"),
            Side::Remote => write!(f, "remote"),
        }
    }
}

/// Stable cross-side linkage between a local and a remote record
///
/// Derived from the identity the record had on the side where it was first
/// seen, so the same data always produces the same key and the same
/// processing order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PairKey(String);

impl PairKey {
    /// Derives the key for a record first seen on `side` as `identity`
    pub fn derive(side: Side, identity: &str) -> Self {
        let seed = format!("{}\0{}", side, identity);
        Self(ContentHash::of(seed.as_bytes()).short().to_string())
    }

    /// Wraps an existing key string
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Change status of one side of a pair relative to the last sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordStatus {
    /// Hash still equals the last synced hash
    Unchanged,
    /// Hash differs from the last synced hash
    Modified,
    /// Record gone or tombstoned since the last sync
    Deleted,
    /// Record has never been paired
    New,
    /// No record on this side and no pairing ("(no pair)")
    Absent,
}

/// What the engine does for one pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncAction {
    /// Nothing to do
    None,
    /// Overwrite remote with local (recreating it if gone)
    PushLocal,
    /// Overwrite local with remote (recreating it if gone)
    PullRemote,
    /// Create the local-only record on the remote side
    CreateRemote,
    /// Create the remote-only record on the local side
    CreateLocal,
    DeleteRemote,
    DeleteLocal,
    /// Both sides gone; forget the pair
    DropState,
    /// Identical unpaired records on both sides; pair them without I/O
    Link,
    /// Both sides changed to the same content; record it without I/O
    Adopt,
    /// Leave both sides untouched until the next run
    Skip,
    /// Ask the caller
    Escalate,
}

impl SyncAction {
    /// Returns true if the action writes to a backend
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            SyncAction::PushLocal
                | SyncAction::PullRemote
                | SyncAction::CreateRemote
                | SyncAction::CreateLocal
                | SyncAction::DeleteRemote
                | SyncAction::DeleteLocal
        )
    }
}

/// Explicit answer to an escalated conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConflictChoice {
    KeepLocal,
    KeepRemote,
    Skip,
}

/// An escalated conflict, handed to the caller
#[derive(Debug, Clone)]
pub struct ConflictReport {
    pub collection_id: String,
    pub pair_key: PairKey,
    pub label: String,
    pub local_status: RecordStatus,
    pub remote_status: RecordStatus,
    /// Current local record, if it still exists
    pub local: Option<Record>,
    /// Current remote record, if it still exists
    pub remote: Option<Record>,
}

/// Progress notification, sent after each pair completes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub collection_id: String,
    pub completed: usize,
    pub total: usize,
    pub label: String,
}

/// How a single pair ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// Action applied and state persisted
    Synced,
    /// Nothing needed doing
    Unchanged,
    /// Conflict left alone by policy or choice
    Skipped,
    /// Escalated and no choice was supplied
    Conflicted(String),
    /// Backend reported a per-record error
    Failed(String),
}

/// Per-pair entry in a session result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairOutcome {
    pub collection_id: String,
    pub pair_key: PairKey,
    pub label: String,
    pub action: SyncAction,
    pub status: OutcomeStatus,
}

/// A collection that could not be processed at all (e.g. enumeration failed)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionFailure {
    pub collection_id: String,
    pub message: String,
}

/// Session state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Preparing,
    Syncing,
    Cancelled,
    Failed,
    Completed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Cancelled | SessionState::Failed | SessionState::Completed
        )
    }
}

/// Outcome counts for a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionCounts {
    pub synced: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub conflicted: usize,
    pub failed: usize,
}

/// Result of one `run_sync` call
#[derive(Debug, Clone)]
pub struct SessionResult {
    pub session_id: String,
    /// Terminal state the session ended in
    pub state: SessionState,
    /// Pairs discovered across all processed collections
    pub pairs_total: usize,
    pub outcomes: Vec<PairOutcome>,
    pub collection_failures: Vec<CollectionFailure>,
    /// Reason for a `Failed` session
    pub failure: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SessionResult {
    pub(crate) fn new() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            state: SessionState::Preparing,
            pairs_total: 0,
            outcomes: Vec::new(),
            collection_failures: Vec::new(),
            failure: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Tallies outcomes by status
    pub fn counts(&self) -> SessionCounts {
        let mut counts = SessionCounts::default();
        for outcome in &self.outcomes {
            match outcome.status {
                OutcomeStatus::Synced => counts.synced += 1,
                OutcomeStatus::Unchanged => counts.unchanged += 1,
                OutcomeStatus::Skipped => counts.skipped += 1,
                OutcomeStatus::Conflicted(_) => counts.conflicted += 1,
                OutcomeStatus::Failed(_) => counts.failed += 1,
            }
        }
        counts
    }

    /// Number of backend writes that were applied
    pub fn applied_mutations(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Synced && o.action.is_mutation())
            .count()
    }

    /// Outcomes for one collection
    pub fn outcomes_for<'a>(
        &'a self,
        collection_id: &'a str,
    ) -> impl Iterator<Item = &'a PairOutcome> {
        self.outcomes
            .iter()
            .filter(move |o| o.collection_id == collection_id)
    }

    pub fn is_completed(&self) -> bool {
        self.state == SessionState::Completed
    }
}
