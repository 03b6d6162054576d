//! Conflict policy

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a sync session resolves records changed on both sides
///
/// The policy is a single setting for the whole session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Push local, overwriting remote
    KeepLocal,
    /// Pull remote, overwriting local
    KeepRemote,
    /// Newest `last_modified` wins; ties go to local
    PreferNewer,
    /// Leave both sides untouched until the next run
    Skip,
    /// Hand the pair to the caller for an explicit choice
    #[default]
    Escalate,
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictPolicy::KeepLocal => write!(f, "keep-local"),
            ConflictPolicy::KeepRemote => write!(f, "keep-remote"),
            ConflictPolicy::PreferNewer => write!(f, "prefer-newer"),
            ConflictPolicy::Skip => write!(f, "skip"),
            ConflictPolicy::Escalate => write!(f, "escalate"),
        }
    }
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "keep-local" => Ok(ConflictPolicy::KeepLocal),
            "keep-remote" => Ok(ConflictPolicy::KeepRemote),
            "prefer-newer" => Ok(ConflictPolicy::PreferNewer),
            "skip" => Ok(ConflictPolicy::Skip),
            "escalate" => Ok(ConflictPolicy::Escalate),
            other => Err(format!("unknown conflict policy: {}", other)),
        }
    }
}

impl ConflictPolicy {
    /// Every policy, in declaration order
    pub const ALL: [ConflictPolicy; 5] = [
        ConflictPolicy::KeepLocal,
        ConflictPolicy::KeepRemote,
        ConflictPolicy::PreferNewer,
        ConflictPolicy::Skip,
        ConflictPolicy::Escalate,
    ];
}
