//! Local-file store configuration section
//!
//! This struct is handed to the local-file backend at construction and is not
//! mutated afterwards, so collection behavior cannot change mid-session.

use crate::validation::{ConfigSection, ValidationError, Validator};
use pilotsync_core::{CollectionDescriptor, RecordKind};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Maps one file extension to the record kinds it may hold
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtensionRule {
    /// Lowercase extension without the dot
    pub extension: String,
    /// Candidate kinds; several kinds share an extension when the format is generic
    pub kinds: Vec<RecordKind>,
}

impl ExtensionRule {
    pub fn new(extension: impl Into<String>, kinds: Vec<RecordKind>) -> Self {
        Self {
            extension: extension.into(),
            kinds,
        }
    }
}

/// Local collection store settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LocalStoreConfig {
    /// Root directory; each collection is a sub-directory
    pub root: PathBuf,

    /// Longest generated file name, in characters, before the extension
    pub max_name_length: usize,

    /// How many `_<n>` suffixes to try before falling back to a hash-derived name
    pub max_suffix_attempts: u32,

    /// Extension to kind mapping, in priority order
    pub extensions: Vec<ExtensionRule>,

    /// Collections the store knows about up front
    pub collections: Vec<CollectionDescriptor>,
}

impl Default for LocalStoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("collections"),
            max_name_length: 64,
            max_suffix_attempts: 100,
            extensions: vec![
                ExtensionRule::new("txt", vec![RecordKind::Memo]),
                ExtensionRule::new("vcf", vec![RecordKind::Contact]),
                ExtensionRule::new("ics", vec![RecordKind::Event, RecordKind::Todo]),
            ],
            collections: CollectionDescriptor::builtins(),
        }
    }
}

impl LocalStoreConfig {
    /// Default settings rooted at `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Looks up a declared collection
    pub fn collection(&self, id: &str) -> Option<&CollectionDescriptor> {
        self.collections.iter().find(|c| c.id == id)
    }

    /// Candidate kinds for an extension (case-insensitive)
    pub fn kinds_for_extension(&self, extension: &str) -> &[RecordKind] {
        self.extensions
            .iter()
            .find(|rule| rule.extension.eq_ignore_ascii_case(extension))
            .map(|rule| rule.kinds.as_slice())
            .unwrap_or(&[])
    }

    /// First extension able to hold `kind`
    pub fn extension_for_kind(&self, kind: RecordKind) -> Option<&str> {
        self.extensions
            .iter()
            .find(|rule| rule.kinds.contains(&kind))
            .map(|rule| rule.extension.as_str())
    }
}

impl ConfigSection for LocalStoreConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut results = Vec::new();

        if self.root.as_os_str().is_empty() {
            results.push(Err(ValidationError::new(
                "local_store.root",
                "must not be empty",
            )));
        }

        results.push(Validator::in_range(
            self.max_name_length,
            8,
            255,
            "local_store.max_name_length",
        ));
        results.push(Validator::in_range(
            self.max_suffix_attempts,
            1,
            10_000,
            "local_store.max_suffix_attempts",
        ));

        for (i, rule) in self.extensions.iter().enumerate() {
            results.push(Validator::bare_extension(
                &rule.extension,
                &format!("local_store.extensions[{}].extension", i),
            ));
            if rule.kinds.is_empty() {
                results.push(Err(ValidationError::new(
                    format!("local_store.extensions[{}].kinds", i),
                    "must list at least one kind",
                )));
            }
        }
        let lowered: Vec<String> = self
            .extensions
            .iter()
            .map(|r| r.extension.to_ascii_lowercase())
            .collect();
        results.push(Validator::unique(
            lowered.iter().map(String::as_str),
            "local_store.extensions",
        ));

        for (i, collection) in self.collections.iter().enumerate() {
            results.push(Validator::not_empty(
                &collection.id,
                &format!("local_store.collections[{}].id", i),
            ));
            results.push(Validator::not_empty(
                &collection.storage_locator,
                &format!("local_store.collections[{}].storage_locator", i),
            ));
        }
        results.push(Validator::unique(
            self.collections.iter().map(|c| c.id.as_str()),
            "local_store.collections",
        ));

        Validator::collect_errors(results)
    }

    fn merge(&mut self, other: Self) {
        self.root = other.root;
        self.max_name_length = other.max_name_length;
        self.max_suffix_attempts = other.max_suffix_attempts;
        self.extensions = other.extensions;
        self.collections = other.collections;
    }

    fn section_name(&self) -> &'static str {
        "local_store"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(LocalStoreConfig::default().validate().is_ok());
    }

    #[test]
    fn test_shared_extension_lists_both_kinds() {
        let config = LocalStoreConfig::default();
        assert_eq!(
            config.kinds_for_extension("ICS"),
            &[RecordKind::Event, RecordKind::Todo]
        );
        assert!(config.kinds_for_extension("mp3").is_empty());
    }

    #[test]
    fn test_extension_for_kind() {
        let config = LocalStoreConfig::default();
        assert_eq!(config.extension_for_kind(RecordKind::Todo), Some("ics"));
        assert_eq!(config.extension_for_kind(RecordKind::Memo), Some("txt"));
        assert_eq!(config.extension_for_kind(RecordKind::Unknown), None);
    }

    #[test]
    fn test_invalid_name_length() {
        let mut config = LocalStoreConfig::default();
        config.max_name_length = 4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_collection_ids() {
        let mut config = LocalStoreConfig::default();
        config.collections.push(CollectionDescriptor::memos());
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.field == "local_store.collections"));
    }

    #[test]
    fn test_dotted_extension_rejected() {
        let mut config = LocalStoreConfig::default();
        config
            .extensions
            .push(ExtensionRule::new(".md", vec![RecordKind::Memo]));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_extension_rejected_case_insensitive() {
        let mut config = LocalStoreConfig::default();
        config
            .extensions
            .push(ExtensionRule::new("TXT", vec![RecordKind::Memo]));
        assert!(config.validate().is_err());
    }
}
