// crates/sync-engine/src/conflict.rs
//! Conflict detection and resolution
//!
//! [`ConflictResolver::resolve`] is a pure function of the pair's statuses,
//! timestamps, and whether both sides currently hold the same content.

use crate::types::{ConflictChoice, RecordStatus, SyncAction};
use chrono::{DateTime, Utc};
use pilotsync_core::ConflictPolicy;

/// Everything the resolver looks at for one pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairView {
    pub local: RecordStatus,
    pub remote: RecordStatus,
    /// `last_modified` of the local record, if it still exists
    pub local_modified: Option<DateTime<Utc>>,
    /// `last_modified` of the remote record, if it still exists
    pub remote_modified: Option<DateTime<Utc>>,
    /// Current local and remote hashes are equal
    pub same_content: bool,
}

impl PairView {
    /// View with no timestamps and differing content
    pub fn new(local: RecordStatus, remote: RecordStatus) -> Self {
        Self {
            local,
            remote,
            local_modified: None,
            remote_modified: None,
            same_content: false,
        }
    }

    pub fn with_timestamps(
        mut self,
        local: Option<DateTime<Utc>>,
        remote: Option<DateTime<Utc>>,
    ) -> Self {
        self.local_modified = local;
        self.remote_modified = remote;
        self
    }

    pub fn with_same_content(mut self, same: bool) -> Self {
        self.same_content = same;
        self
    }
}

/// Turns pair statuses into actions under a session-wide policy
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictResolver {
    policy: ConflictPolicy,
}

impl ConflictResolver {
    pub fn new(policy: ConflictPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// Returns true for the rows decided by policy
    pub fn is_conflict(view: &PairView) -> bool {
        use RecordStatus::*;
        match (view.local, view.remote) {
            (Modified, Modified) => !view.same_content,
            (Modified, Deleted) | (Deleted, Modified) => true,
            _ => false,
        }
    }

    /// Decides the action for one pair
    pub fn resolve(&self, view: &PairView) -> SyncAction {
        use RecordStatus::*;

        if Self::is_conflict(view) {
            return self.resolve_conflict(view);
        }

        match (view.local, view.remote) {
            (Unchanged, Unchanged) => SyncAction::None,
            (Modified, Unchanged) => SyncAction::PushLocal,
            (Unchanged, Modified) => SyncAction::PullRemote,
            (New, Absent) => SyncAction::CreateRemote,
            (Absent, New) => SyncAction::CreateLocal,
            (New, New) if view.same_content => SyncAction::Link,
            (Deleted, Unchanged) => SyncAction::DeleteRemote,
            (Unchanged, Deleted) => SyncAction::DeleteLocal,
            (Deleted, Deleted) | (Deleted, Absent) | (Absent, Deleted) => SyncAction::DropState,
            (Modified, Modified) => SyncAction::Adopt,
            _ => SyncAction::None,
        }
    }

    fn resolve_conflict(&self, view: &PairView) -> SyncAction {
        match self.policy {
            ConflictPolicy::KeepLocal => Self::apply_choice(ConflictChoice::KeepLocal, view),
            ConflictPolicy::KeepRemote => Self::apply_choice(ConflictChoice::KeepRemote, view),
            ConflictPolicy::PreferNewer => {
                Self::apply_choice(Self::newer_side(view), view)
            }
            ConflictPolicy::Skip => SyncAction::Skip,
            ConflictPolicy::Escalate => SyncAction::Escalate,
        }
    }

    /// Ties go to local; a deleted side has no timestamp and loses
    fn newer_side(view: &PairView) -> ConflictChoice {
        match (view.local_modified, view.remote_modified) {
            (Some(local), Some(remote)) if remote > local => ConflictChoice::KeepRemote,
            (None, Some(_)) => ConflictChoice::KeepRemote,
            _ => ConflictChoice::KeepLocal,
        }
    }

    /// Maps an explicit choice onto the action that carries it out
    pub fn apply_choice(choice: ConflictChoice, view: &PairView) -> SyncAction {
        match choice {
            ConflictChoice::KeepLocal if view.local == RecordStatus::Deleted => {
                SyncAction::DeleteRemote
            }
            ConflictChoice::KeepLocal => SyncAction::PushLocal,
            ConflictChoice::KeepRemote if view.remote == RecordStatus::Deleted => {
                SyncAction::DeleteLocal
            }
            ConflictChoice::KeepRemote => SyncAction::PullRemote,
            ConflictChoice::Skip => SyncAction::Skip,
        }
    }
}
