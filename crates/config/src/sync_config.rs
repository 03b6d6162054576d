//! Sync session configuration section

use crate::validation::{ConfigSection, ValidationError};
use pilotsync_core::ConflictPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings applied to every sync session
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncSection {
    /// How records changed on both sides are resolved
    pub conflict_policy: ConflictPolicy,

    /// Where per-collection sync state tables live.
    /// `None` falls back to the platform data directory.
    pub state_dir: Option<PathBuf>,
}

impl ConfigSection for SyncSection {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        match self.state_dir {
            Some(ref dir) if dir.as_os_str().is_empty() => Err(vec![ValidationError::new(
                "sync.state_dir",
                "must not be empty when set",
            )]),
            _ => Ok(()),
        }
    }

    fn merge(&mut self, other: Self) {
        self.conflict_policy = other.conflict_policy;
        if other.state_dir.is_some() {
            self.state_dir = other.state_dir;
        }
    }

    fn section_name(&self) -> &'static str {
        "sync"
    }
}
