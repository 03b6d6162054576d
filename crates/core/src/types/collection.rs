//! Collection descriptors

use crate::types::RecordKind;
use serde::{Deserialize, Serialize};

/// One logical set of records (e.g. "contacts"), independent of backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionDescriptor {
    pub id: String,
    pub display_name: String,
    /// Backend-interpreted location (a directory name for the local store)
    pub storage_locator: String,
    pub kind: RecordKind,
    #[serde(default)]
    pub is_builtin: bool,
}

impl CollectionDescriptor {
    /// Creates a user-defined collection stored under `storage_locator`
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        storage_locator: impl Into<String>,
        kind: RecordKind,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            storage_locator: storage_locator.into(),
            kind,
            is_builtin: false,
        }
    }

    fn builtin(id: &str, display_name: &str, kind: RecordKind) -> Self {
        Self {
            is_builtin: true,
            ..Self::new(id, display_name, id, kind)
        }
    }

    pub fn memos() -> Self {
        Self::builtin("memos", "Memos", RecordKind::Memo)
    }

    pub fn contacts() -> Self {
        Self::builtin("contacts", "Contacts", RecordKind::Contact)
    }

    pub fn calendar() -> Self {
        Self::builtin("calendar", "Calendar", RecordKind::Event)
    }

    pub fn todos() -> Self {
        Self::builtin("todos", "To-Do List", RecordKind::Todo)
    }

    /// All builtin collections
    pub fn builtins() -> Vec<Self> {
        vec![Self::memos(), Self::contacts(), Self::calendar(), Self::todos()]
    }
}
