//! Local collection store
//!
//! A [`pilotsync_core::Backend`] over plain files: memos, contacts, calendar
//! entries and todos each live in their own directory under a configurable root.
//!
//! # Example
//!
//! ```rust,no_run
//! use pilotsync_config::LocalStoreConfig;
//! use pilotsync_core::{Backend, CollectionDescriptor, Record, RecordKind};
//! use pilotsync_local_store::LocalFileBackend;
//!
//! let mut store = LocalFileBackend::new(LocalStoreConfig::with_root("/tmp/pim"));
//! store.ensure_collection(&CollectionDescriptor::memos()).unwrap();
//!
//! let memo = Record::new("", b"buy milk".to_vec(), RecordKind::Memo).with_display_name("Shopping");
//! let identity = store.create("memos", &memo).unwrap();
//! assert!(identity.ends_with("Shopping.txt"));
//! ```

mod kind;
mod naming;
mod store;

pub use kind::{extension_for, infer_kind};
pub use naming::{sanitize_name, NameCandidates, DEFAULT_NAME, MAX_HASH_ATTEMPTS, PLACEHOLDER};
pub use store::LocalFileBackend;
