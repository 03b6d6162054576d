//! In-memory backend standing in for the device side
#![allow(dead_code)]

use chrono::{DateTime, Utc};
use pilotsync_core::{
    Backend, BackendError, BackendResult, CollectionDescriptor, Record, RecordKind,
};
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};

/// Failure injected into a backend call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Io,
    NotFound,
    Unavailable,
}

/// Parks `load_all` until the test lets it go
pub struct Gate {
    pub entered: Sender<()>,
    pub release: Receiver<()>,
}

#[derive(Default)]
struct Inner {
    available: bool,
    collections: BTreeMap<String, CollectionDescriptor>,
    /// identity -> (collection id, record)
    records: BTreeMap<String, (String, Record)>,
    next_id: u64,
    faults: HashMap<String, Fault>,
    calls: Vec<String>,
    gate: Option<Gate>,
}

/// Cloneable handle; every clone sees the same records
#[derive(Clone)]
pub struct MemoryBackend {
    name: String,
    inner: Arc<Mutex<Inner>>,
}

impl MemoryBackend {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            inner: Arc::new(Mutex::new(Inner {
                available: true,
                ..Default::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    pub fn boxed(&self) -> Box<dyn Backend> {
        Box::new(self.clone())
    }

    /// Seeds a record under a chosen identity, as if edited on this side
    pub fn insert(&self, collection: &str, identity: &str, body: &str) -> String {
        self.insert_named(collection, identity, identity, body)
    }

    pub fn insert_named(&self, collection: &str, identity: &str, name: &str, body: &str) -> String {
        let record = Record::new(identity, body.as_bytes().to_vec(), RecordKind::Memo)
            .with_display_name(name);
        self.lock()
            .records
            .insert(identity.to_string(), (collection.to_string(), record));
        identity.to_string()
    }

    pub fn edit(&self, identity: &str, body: &str) {
        self.edit_at(identity, body, Utc::now());
    }

    pub fn edit_at(&self, identity: &str, body: &str, at: DateTime<Utc>) {
        let mut inner = self.lock();
        let (_, record) = inner.records.get_mut(identity).unwrap();
        record.set_payload(body.as_bytes().to_vec());
        record.last_modified = at;
    }

    pub fn tombstone(&self, identity: &str) {
        let mut inner = self.lock();
        let (_, record) = inner.records.get_mut(identity).unwrap();
        record.is_deleted = true;
    }

    /// Removes a record behind the engine's back
    pub fn remove(&self, identity: &str) {
        self.lock().records.remove(identity);
    }

    pub fn get(&self, identity: &str) -> Option<Record> {
        self.lock().records.get(identity).map(|(_, r)| r.clone())
    }

    pub fn records(&self, collection: &str) -> Vec<Record> {
        self.lock()
            .records
            .values()
            .filter(|(c, _)| c == collection)
            .map(|(_, r)| r.clone())
            .collect()
    }

    /// Payloads of live records, sorted
    pub fn bodies(&self, collection: &str) -> Vec<String> {
        let mut bodies: Vec<String> = self
            .records(collection)
            .into_iter()
            .filter(|r| !r.is_deleted)
            .map(|r| String::from_utf8_lossy(r.payload()).into_owned())
            .collect();
        bodies.sort();
        bodies
    }

    pub fn set_available(&self, available: bool) {
        self.lock().available = available;
    }

    /// Fails every call naming `key` (an identity or a collection id)
    pub fn fail_on(&self, key: &str, fault: Fault) {
        self.lock().faults.insert(key.to_string(), fault);
    }

    pub fn clear_faults(&self) {
        self.lock().faults.clear();
    }

    pub fn gate(&self, gate: Gate) {
        self.lock().gate = Some(gate);
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Number of create/update/delete calls seen
    pub fn mutations(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| {
                c.starts_with("create") || c.starts_with("update") || c.starts_with("delete")
            })
            .count()
    }

    fn check(&self, inner: &Inner, key: &str) -> BackendResult<()> {
        if !inner.available {
            return Err(BackendError::Unavailable(self.name.clone()));
        }
        match inner.faults.get(key) {
            None => Ok(()),
            Some(Fault::Io) => Err(BackendError::io(
                format!("writing {}", key),
                io::Error::other("injected failure"),
            )),
            Some(Fault::NotFound) => Err(BackendError::NotFound(key.to_string())),
            Some(Fault::Unavailable) => Err(BackendError::Unavailable(self.name.clone())),
        }
    }
}

impl Backend for MemoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.lock().available
    }

    fn list_collections(&self) -> BackendResult<Vec<CollectionDescriptor>> {
        Ok(self.lock().collections.values().cloned().collect())
    }

    fn ensure_collection(&mut self, descriptor: &CollectionDescriptor) -> BackendResult<String> {
        let mut inner = self.lock();
        if !inner.available {
            return Err(BackendError::Unavailable(self.name.clone()));
        }
        inner
            .collections
            .entry(descriptor.id.clone())
            .or_insert_with(|| descriptor.clone());
        Ok(descriptor.id.clone())
    }

    fn load_all(&self, collection_id: &str) -> BackendResult<Vec<Record>> {
        let gate = self.lock().gate.take();
        if let Some(gate) = gate {
            let _ = gate.entered.send(());
            let _ = gate.release.recv();
        }

        let mut inner = self.lock();
        inner.calls.push(format!("load_all {}", collection_id));
        self.check(&inner, collection_id)?;
        Ok(inner
            .records
            .values()
            .filter(|(c, _)| c == collection_id)
            .map(|(_, r)| r.clone())
            .collect())
    }

    fn load_one(&self, identity: &str) -> BackendResult<Option<Record>> {
        let inner = self.lock();
        self.check(&inner, identity)?;
        Ok(inner.records.get(identity).map(|(_, r)| r.clone()))
    }

    fn create(&mut self, collection_id: &str, record: &Record) -> BackendResult<String> {
        let mut inner = self.lock();
        inner
            .calls
            .push(format!("create {} {}", collection_id, record.identity));
        self.check(&inner, &record.identity)?;
        if !inner.collections.contains_key(collection_id) {
            return Err(BackendError::UnknownCollection(collection_id.to_string()));
        }

        inner.next_id += 1;
        let identity = format!("{}-{}", self.name, inner.next_id);
        let mut stored = record.retarget(identity.clone());
        stored.is_deleted = false;
        inner
            .records
            .insert(identity.clone(), (collection_id.to_string(), stored));
        Ok(identity)
    }

    fn update(&mut self, record: &Record) -> BackendResult<()> {
        let mut inner = self.lock();
        inner.calls.push(format!("update {}", record.identity));
        self.check(&inner, &record.identity)?;
        match inner.records.get_mut(&record.identity) {
            Some((_, existing)) => {
                *existing = record.clone();
                existing.is_deleted = false;
                Ok(())
            }
            None => Err(BackendError::NotFound(record.identity.clone())),
        }
    }

    fn delete(&mut self, identity: &str) -> BackendResult<()> {
        let mut inner = self.lock();
        inner.calls.push(format!("delete {}", identity));
        self.check(&inner, identity)?;
        inner.records.remove(identity);
        Ok(())
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
