//! PilotSync core
//!
//! Shared building blocks for two-way record synchronization between a
//! handheld device and a local collection store:
//! - [`Record`] and [`CollectionDescriptor`], the data model
//! - [`ContentHash`], the change-detection oracle
//! - [`Backend`], the capability interface every store implements
//! - [`BackendError`], the explicit outcome of every backend call

pub mod backend;
pub mod error;
pub mod hash;
pub mod types;

pub use backend::Backend;
pub use error::{BackendError, BackendResult};
pub use hash::{hash, ContentHash, SHORT_HASH_LEN};
pub use types::{CollectionDescriptor, ConflictPolicy, Record, RecordKind};
