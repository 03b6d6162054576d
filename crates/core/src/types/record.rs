//! Record domain model

use crate::hash::ContentHash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a record holds; inferred from collection and/or file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Memo,
    Contact,
    Event,
    Todo,
    Unknown,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Memo => write!(f, "memo"),
            RecordKind::Contact => write!(f, "contact"),
            RecordKind::Event => write!(f, "event"),
            RecordKind::Todo => write!(f, "todo"),
            RecordKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// A unit of synchronizable data owned by one backend
///
/// The content hash is private and recomputed on every payload change, so it
/// can never go stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Backend-specific identity, unique within a collection
    pub identity: String,
    payload: Vec<u8>,
    content_hash: ContentHash,
    /// Timestamp from the owning side's clock
    pub last_modified: DateTime<Utc>,
    /// Tombstone flag for backends that mark-delete
    pub is_deleted: bool,
    pub kind: RecordKind,
    /// Human label, only used to generate a readable identity
    pub display_name: Option<String>,
}

impl Record {
    /// Creates a live record, hashing the payload
    pub fn new(identity: impl Into<String>, payload: Vec<u8>, kind: RecordKind) -> Self {
        let content_hash = ContentHash::of(&payload);
        Self {
            identity: identity.into(),
            payload,
            content_hash,
            last_modified: Utc::now(),
            is_deleted: false,
            kind,
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_last_modified(mut self, at: DateTime<Utc>) -> Self {
        self.last_modified = at;
        self
    }

    /// Marks the record as a tombstone
    pub fn tombstoned(mut self) -> Self {
        self.is_deleted = true;
        self
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn content_hash(&self) -> &ContentHash {
        &self.content_hash
    }

    /// Replaces the payload and recomputes the hash
    pub fn set_payload(&mut self, payload: Vec<u8>) {
        self.content_hash = ContentHash::of(&payload);
        self.payload = payload;
    }

    /// Returns a copy carrying this record's content under another identity
    pub fn retarget(&self, identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            ..self.clone()
        }
    }

    /// Label for progress reporting: display name, falling back to identity
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.identity)
    }
}
