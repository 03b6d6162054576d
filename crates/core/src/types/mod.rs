//! Domain types for PilotSync
//!
//! - `record`: records and their kinds
//! - `collection`: collection descriptors and the builtin set
//! - `policy`: session-wide conflict policy

mod collection;
mod policy;
mod record;

pub use collection::CollectionDescriptor;
pub use policy::ConflictPolicy;
pub use record::{Record, RecordKind};
