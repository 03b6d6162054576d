//! Local-file backend
//!
//! One directory per collection, one file per record. The file path is the
//! record identity. Writes go through a temp file in the same directory and
//! an atomic rename, so a crash never leaves a half-written record behind.

use crate::kind::{extension_for, infer_kind};
use crate::naming::{sanitize_name, NameCandidates};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use pilotsync_config::LocalStoreConfig;
use pilotsync_core::{
    Backend, BackendError, BackendResult, CollectionDescriptor, Record, RecordKind,
};
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

/// Backend over a directory tree of plain files
pub struct LocalFileBackend {
    name: String,
    config: LocalStoreConfig,
    registered: BTreeMap<String, CollectionDescriptor>,
}

impl LocalFileBackend {
    /// Creates a backend named "local"
    pub fn new(config: LocalStoreConfig) -> Self {
        Self::with_name("local", config)
    }

    /// Creates a backend with a custom log name
    pub fn with_name(name: impl Into<String>, config: LocalStoreConfig) -> Self {
        Self {
            name: name.into(),
            config,
            registered: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &LocalStoreConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    fn descriptor(&self, collection_id: &str) -> Option<&CollectionDescriptor> {
        self.config
            .collection(collection_id)
            .or_else(|| self.registered.get(collection_id))
    }

    fn require_descriptor(&self, collection_id: &str) -> BackendResult<&CollectionDescriptor> {
        self.descriptor(collection_id)
            .ok_or_else(|| BackendError::UnknownCollection(collection_id.to_string()))
    }

    /// Directory holding a collection
    pub fn collection_dir(&self, descriptor: &CollectionDescriptor) -> PathBuf {
        self.config.root.join(&descriptor.storage_locator)
    }

    fn declared(&self) -> impl Iterator<Item = &CollectionDescriptor> {
        self.config.collections.iter().chain(self.registered.values())
    }

    /// Finds the collection whose directory contains `path`
    fn collection_for_path(&self, path: &Path) -> Option<&CollectionDescriptor> {
        let parent = path.parent()?;
        self.declared().find(|d| self.collection_dir(d) == parent)
    }

    fn is_inside_root(&self, path: &Path) -> bool {
        path.starts_with(&self.config.root)
    }

    fn read_record(
        &self,
        path: &Path,
        collection: Option<&CollectionDescriptor>,
    ) -> BackendResult<Record> {
        let payload = fs::read(path)
            .map_err(|e| BackendError::io(format!("reading {}", path.display()), e))?;
        let modified = fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(|e| BackendError::io(format!("reading mtime of {}", path.display()), e))?;

        let kind = infer_kind(&self.config, path, collection.map(|c| c.kind));
        let mut record = Record::new(identity_of(path), payload, kind)
            .with_last_modified(DateTime::<Utc>::from(modified));
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            record = record.with_display_name(stem);
        }
        Ok(record)
    }

    /// Writes `payload` into a synced temp file next to `dir`'s entries
    fn staged_file(&self, dir: &Path, payload: &[u8]) -> BackendResult<NamedTempFile> {
        let context = || format!("staging a write in {}", dir.display());
        let mut temp = NamedTempFile::new_in(dir).map_err(|e| BackendError::io(context(), e))?;
        temp.write_all(payload)
            .map_err(|e| BackendError::io(context(), e))?;
        temp.flush().map_err(|e| BackendError::io(context(), e))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| BackendError::io(context(), e))?;
        Ok(temp)
    }
}

/// Identity string for a record file
fn identity_of(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

impl Backend for LocalFileBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        let root = &self.config.root;
        if root.exists() {
            return root.is_dir();
        }

        // Missing root is fine as long as it could be created
        root.ancestors()
            .skip(1)
            .map(|a| if a.as_os_str().is_empty() { Path::new(".") } else { a })
            .find(|a| a.exists())
            .is_some_and(|a| a.is_dir())
    }

    fn list_collections(&self) -> BackendResult<Vec<CollectionDescriptor>> {
        let mut found: BTreeMap<String, CollectionDescriptor> = self
            .declared()
            .map(|d| (d.id.clone(), d.clone()))
            .collect();

        if self.config.root.is_dir() {
            for entry in WalkDir::new(&self.config.root).min_depth(1).max_depth(1) {
                let entry = match entry {
                    Ok(e) => e,
                    Err(e) => {
                        warn!("Error listing {}: {}", self.config.root.display(), e);
                        continue;
                    }
                };
                if !entry.file_type().is_dir() {
                    continue;
                }
                let Some(dir_name) = entry.file_name().to_str() else {
                    continue;
                };
                let is_declared = self
                    .declared()
                    .any(|d| self.collection_dir(d) == entry.path());
                if is_hidden(dir_name) || is_declared {
                    continue;
                }
                found.entry(dir_name.to_string()).or_insert_with(|| {
                    CollectionDescriptor::new(dir_name, dir_name, dir_name, RecordKind::Unknown)
                });
            }
        }

        Ok(found.into_values().collect())
    }

    fn ensure_collection(&mut self, descriptor: &CollectionDescriptor) -> BackendResult<String> {
        let dir = self.collection_dir(descriptor);
        fs::create_dir_all(&dir)
            .map_err(|e| BackendError::io(format!("creating {}", dir.display()), e))?;

        if self.config.collection(&descriptor.id).is_none() {
            self.registered
                .insert(descriptor.id.clone(), descriptor.clone());
        }

        debug!("[{}] collection {} at {}", self.name, descriptor.id, dir.display());
        Ok(identity_of(&dir))
    }

    fn load_all(&self, collection_id: &str) -> BackendResult<Vec<Record>> {
        let descriptor = self.require_descriptor(collection_id)?;
        let dir = self.collection_dir(descriptor);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
                BackendError::io(format!("listing {}", dir.display()), source)
            })?;

            if !entry.file_type().is_file() {
                continue;
            }
            let hidden = entry.file_name().to_str().is_none_or(is_hidden);
            if hidden {
                debug!("[{}] skipping {}", self.name, entry.path().display());
                continue;
            }

            records.push(self.read_record(entry.path(), Some(descriptor))?);
        }

        records.sort_by(|a, b| a.identity.cmp(&b.identity));
        Ok(records)
    }

    fn load_one(&self, identity: &str) -> BackendResult<Option<Record>> {
        let path = Path::new(identity);
        if !self.is_inside_root(path) || !path.is_file() {
            return Ok(None);
        }

        match self.read_record(path, self.collection_for_path(path)) {
            Ok(record) => Ok(Some(record)),
            Err(BackendError::Io { ref source, .. }) if source.kind() == ErrorKind::NotFound => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn create(&mut self, collection_id: &str, record: &Record) -> BackendResult<String> {
        let descriptor = self.require_descriptor(collection_id)?;
        let dir = self.collection_dir(descriptor);
        fs::create_dir_all(&dir)
            .map_err(|e| BackendError::io(format!("creating {}", dir.display()), e))?;

        let hint = Path::new(&record.identity);
        let proposed = record
            .display_name
            .clone()
            .or_else(|| hint.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .unwrap_or_default();
        let stem = sanitize_name(&proposed, self.config.max_name_length);
        let extension = extension_for(&self.config, record.kind, descriptor.kind, hint);

        let mut staged = self.staged_file(&dir, record.payload())?;
        let candidates = NameCandidates::new(
            &stem,
            &extension,
            self.config.max_suffix_attempts,
            record.content_hash(),
        );

        for candidate in candidates {
            let target = dir.join(&candidate);
            match staged.persist_noclobber(&target) {
                Ok(_) => {
                    debug!("[{}] created {}", self.name, target.display());
                    return Ok(identity_of(&target));
                }
                Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                    staged = e.file;
                }
                Err(e) => {
                    return Err(BackendError::io(
                        format!("creating {}", target.display()),
                        e.error,
                    ));
                }
            }
        }

        Err(BackendError::NameCollisionExhausted {
            collection: collection_id.to_string(),
            proposed: stem,
        })
    }

    fn update(&mut self, record: &Record) -> BackendResult<()> {
        let path = Path::new(&record.identity);
        if !self.is_inside_root(path) {
            return Err(BackendError::Other(format!(
                "{} is outside the store root",
                record.identity
            )));
        }
        if !path.is_file() {
            return Err(BackendError::NotFound(record.identity.clone()));
        }

        let dir = path
            .parent()
            .ok_or_else(|| BackendError::NotFound(record.identity.clone()))?;
        let staged = self.staged_file(dir, record.payload())?;
        staged
            .persist(path)
            .map_err(|e| BackendError::io(format!("replacing {}", path.display()), e.error))?;

        debug!("[{}] updated {}", self.name, path.display());
        Ok(())
    }

    fn delete(&mut self, identity: &str) -> BackendResult<()> {
        let path = Path::new(identity);
        if !self.is_inside_root(path) {
            return Err(BackendError::Other(format!(
                "{} is outside the store root",
                identity
            )));
        }

        match fs::remove_file(path) {
            Ok(()) => {
                debug!("[{}] deleted {}", self.name, path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BackendError::io(format!("deleting {}", path.display()), e)),
        }
    }

    fn changed_since(
        &self,
        collection_id: &str,
        since: DateTime<Utc>,
    ) -> BackendResult<Vec<Record>> {
        Ok(self
            .load_all(collection_id)?
            .into_iter()
            .filter(|r| r.last_modified > since)
            .collect())
    }
}
