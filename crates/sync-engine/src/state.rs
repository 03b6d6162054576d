// crates/sync-engine/src/state.rs
//! Persisted sync state
//!
//! One JSON table per collection under the state directory, mapping each
//! pair key to the hash both sides agreed on at the end of the last sync.
//! Every `put`/`remove` rewrites the table through a synced temp file and an
//! atomic rename before returning, so a crash leaves either the old table or
//! the new one.

use crate::types::{PairKey, Side};
use chrono::{DateTime, Utc};
use pilotsync_core::ContentHash;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Current on-disk table format
pub const STATE_FORMAT_VERSION: u32 = 1;

const TABLE_SUFFIX: &str = ".state.json";

/// Result type for state store operations
pub type StateResult<T> = Result<T, StateError>;

/// Errors from the sync state store
#[derive(Debug, Error)]
pub enum StateError {
    #[error("State I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("State table at {path} is corrupted: {source}")]
    Corrupted {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Identity {identity} is already paired in collection {collection_id}")]
    DuplicateIdentity {
        collection_id: String,
        identity: String,
    },

    #[error("State entry {0} has neither a local nor a remote identity")]
    MissingIdentity(String),
}

impl StateError {
    /// The entry was refused before anything was written; the table is intact
    pub fn is_rejected(&self) -> bool {
        matches!(
            self,
            StateError::DuplicateIdentity { .. } | StateError::MissingIdentity(_)
        )
    }
}

/// What both sides agreed on for one pair at the end of the last sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStateEntry {
    pub collection_id: String,
    pub pair_key: PairKey,
    #[serde(default)]
    pub local_identity: Option<String>,
    #[serde(default)]
    pub remote_identity: Option<String>,
    pub last_synced_hash: ContentHash,
    /// Engine clock, not either side's
    pub last_synced_at: DateTime<Utc>,
    /// Sides whose record went away while the pair stayed unresolved; the
    /// identity there no longer claims a record, so it may be handed out again
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vacated: Vec<Side>,
}

impl SyncStateEntry {
    /// Entry for a pair present on both sides, stamped now
    pub fn paired(
        collection_id: impl Into<String>,
        pair_key: PairKey,
        local_identity: impl Into<String>,
        remote_identity: impl Into<String>,
        last_synced_hash: ContentHash,
    ) -> Self {
        Self {
            collection_id: collection_id.into(),
            pair_key,
            local_identity: Some(local_identity.into()),
            remote_identity: Some(remote_identity.into()),
            last_synced_hash,
            last_synced_at: Utc::now(),
            vacated: Vec::new(),
        }
    }

    /// Identity recorded for `side`, vacated or not
    pub fn identity(&self, side: Side) -> Option<&str> {
        match side {
            Side::Local => self.local_identity.as_deref(),
            Side::Remote => self.remote_identity.as_deref(),
        }
    }

    /// Identity on `side` that still belongs to this pair
    pub fn claimed(&self, side: Side) -> Option<&str> {
        if self.vacated.contains(&side) {
            None
        } else {
            self.identity(side)
        }
    }

    /// Lets go of the identity on `side`; the pair still sees that side as deleted
    pub fn vacate(&mut self, side: Side) {
        if !self.vacated.contains(&side) {
            self.vacated.push(side);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct StateTable {
    format_version: u32,
    collection_id: String,
    entries: BTreeMap<PairKey, SyncStateEntry>,
}

impl Default for StateTable {
    fn default() -> Self {
        Self {
            format_version: STATE_FORMAT_VERSION,
            collection_id: String::new(),
            entries: BTreeMap::new(),
        }
    }
}

impl StateTable {
    fn check_unique(&self, entry: &SyncStateEntry) -> StateResult<()> {
        for other in self.entries.values() {
            if other.pair_key == entry.pair_key {
                continue;
            }
            let clash = [Side::Local, Side::Remote].into_iter().find_map(|side| {
                match (entry.claimed(side), other.claimed(side)) {
                    (Some(a), Some(b)) if a == b => Some(a.to_string()),
                    _ => None,
                }
            });

            if let Some(identity) = clash {
                return Err(StateError::DuplicateIdentity {
                    collection_id: entry.collection_id.clone(),
                    identity,
                });
            }
        }
        Ok(())
    }

    fn find(&self, side: Side, identity: &str) -> Option<&SyncStateEntry> {
        self.entries
            .values()
            .find(|e| e.claimed(side) == Some(identity))
    }
}

/// File-backed store of [`SyncStateEntry`] rows, one table per collection
pub struct SyncStateStore {
    dir: PathBuf,
    tables: HashMap<String, StateTable>,
}

impl SyncStateStore {
    /// Opens (and creates if needed) the state directory
    pub fn open(dir: impl Into<PathBuf>) -> StateResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StateError::Io {
            path: dir.clone(),
            source: e,
        })?;
        log::debug!("Sync state directory: {}", dir.display());

        Ok(Self {
            dir,
            tables: HashMap::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the table file for a collection
    pub fn table_path(&self, collection_id: &str) -> PathBuf {
        self.dir.join(table_file_name(collection_id))
    }

    fn table(&mut self, collection_id: &str) -> StateResult<&StateTable> {
        match self.tables.entry(collection_id.to_string()) {
            Entry::Occupied(e) => Ok(&*e.into_mut()),
            Entry::Vacant(e) => {
                let table = read_table(&self.dir, collection_id)?;
                Ok(&*e.insert(table))
            }
        }
    }

    fn write_table(&self, collection_id: &str, table: &StateTable) -> StateResult<()> {
        let path = self.table_path(collection_id);
        let io_err = |source: std::io::Error| StateError::Io {
            path: path.clone(),
            source,
        };

        let json = serde_json::to_vec_pretty(table).map_err(|e| StateError::Corrupted {
            path: path.clone(),
            source: e,
        })?;

        let mut temp = NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        temp.write_all(&json).map_err(io_err)?;
        temp.flush().map_err(io_err)?;
        temp.as_file().sync_all().map_err(io_err)?;
        temp.persist(&path).map_err(|e| io_err(e.error))?;

        Ok(())
    }

    /// Applies `change` to a copy of the table, makes it durable, then keeps it
    fn commit<F>(&mut self, collection_id: &str, change: F) -> StateResult<bool>
    where
        F: FnOnce(&mut StateTable) -> StateResult<bool>,
    {
        let mut table = self.table(collection_id)?.clone();
        if !change(&mut table)? {
            return Ok(false);
        }
        table.format_version = STATE_FORMAT_VERSION;
        self.write_table(collection_id, &table)?;
        self.tables.insert(collection_id.to_string(), table);
        Ok(true)
    }

    pub fn get(
        &mut self,
        collection_id: &str,
        pair_key: &PairKey,
    ) -> StateResult<Option<SyncStateEntry>> {
        Ok(self.table(collection_id)?.entries.get(pair_key).cloned())
    }

    /// Inserts or replaces an entry and persists the table
    pub fn put(&mut self, entry: SyncStateEntry) -> StateResult<()> {
        if entry.local_identity.is_none() && entry.remote_identity.is_none() {
            return Err(StateError::MissingIdentity(entry.pair_key.to_string()));
        }

        let collection_id = entry.collection_id.clone();
        self.commit(&collection_id, |table| {
            table.check_unique(&entry)?;
            table.entries.insert(entry.pair_key.clone(), entry);
            Ok(true)
        })?;
        Ok(())
    }

    /// Removes an entry; returns false if there was nothing to remove
    pub fn remove(&mut self, collection_id: &str, pair_key: &PairKey) -> StateResult<bool> {
        self.commit(collection_id, |table| {
            Ok(table.entries.remove(pair_key).is_some())
        })
    }

    /// Every entry of a collection, ordered by pair key
    pub fn all_for_collection(&mut self, collection_id: &str) -> StateResult<Vec<SyncStateEntry>> {
        Ok(self
            .table(collection_id)?
            .entries
            .values()
            .cloned()
            .collect())
    }

    pub fn find_by_local(
        &mut self,
        collection_id: &str,
        identity: &str,
    ) -> StateResult<Option<SyncStateEntry>> {
        Ok(self.table(collection_id)?.find(Side::Local, identity).cloned())
    }

    pub fn find_by_remote(
        &mut self,
        collection_id: &str,
        identity: &str,
    ) -> StateResult<Option<SyncStateEntry>> {
        Ok(self.table(collection_id)?.find(Side::Remote, identity).cloned())
    }
}

fn read_table(dir: &Path, collection_id: &str) -> StateResult<StateTable> {
    let path = dir.join(table_file_name(collection_id));
    if !path.exists() {
        return Ok(StateTable {
            collection_id: collection_id.to_string(),
            ..Default::default()
        });
    }

    let bytes = fs::read(&path).map_err(|e| StateError::Io {
        path: path.clone(),
        source: e,
    })?;
    let table: StateTable =
        serde_json::from_slice(&bytes).map_err(|e| StateError::Corrupted {
            path: path.clone(),
            source: e,
        })?;

    if table.format_version > STATE_FORMAT_VERSION {
        log::warn!(
            "State table {} has format {} (newer than {}), unknown fields ignored",
            path.display(),
            table.format_version,
            STATE_FORMAT_VERSION
        );
    }

    Ok(table)
}

/// File name for a collection's table; ids needing sanitizing get a hash
/// suffix so two ids never share a file
fn table_file_name(collection_id: &str) -> String {
    let sanitized: String = collection_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized == collection_id && !sanitized.is_empty() {
        format!("{}{}", sanitized, TABLE_SUFFIX)
    } else {
        let digest = ContentHash::of(collection_id.as_bytes());
        format!("{}-{}{}", sanitized, &digest.short()[..8], TABLE_SUFFIX)
    }
}
