//! Backend capability interface
//!
//! Any store taking part in a sync implements [`Backend`]: the local-file
//! store, a handheld device transport, or a test double. The engine is the
//! only caller and serializes its calls, so implementations need not be
//! thread-safe beyond `Send`.

use crate::error::BackendResult;
use crate::types::{CollectionDescriptor, Record};
use chrono::{DateTime, Utc};

/// Capability set every store must provide
pub trait Backend: Send {
    /// Short name used in logs ("local", "device", ...)
    fn name(&self) -> &str;

    /// Side-effect-free readiness check
    fn is_available(&self) -> bool;

    /// Collections known to this backend
    fn list_collections(&self) -> BackendResult<Vec<CollectionDescriptor>>;

    /// Makes sure the collection exists; returns its backend-side identity.
    /// Calling this on an existing collection is a no-op success.
    fn ensure_collection(&mut self, descriptor: &CollectionDescriptor) -> BackendResult<String>;

    /// Full enumeration of a collection, tombstones included
    fn load_all(&self, collection_id: &str) -> BackendResult<Vec<Record>>;

    /// Loads one record; `Ok(None)` when the identity no longer exists
    fn load_one(&self, identity: &str) -> BackendResult<Option<Record>>;

    /// Stores a new record and returns the identity assigned to it.
    /// The incoming `identity` is only a naming hint.
    fn create(&mut self, collection_id: &str, record: &Record) -> BackendResult<String>;

    /// Overwrites an existing record; `NotFound` if its identity is gone
    fn update(&mut self, record: &Record) -> BackendResult<()>;

    /// Removes a record; deleting a missing identity succeeds
    fn delete(&mut self, identity: &str) -> BackendResult<()>;

    /// Records modified after `since`. Deletions are not reported, so callers
    /// needing deletion fidelity must diff [`Backend::load_all`] instead.
    fn changed_since(
        &self,
        collection_id: &str,
        since: DateTime<Utc>,
    ) -> BackendResult<Vec<Record>>;
}
