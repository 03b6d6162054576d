//! PilotSync Configuration System
//!
//! Loads and saves the TOML configuration shared by the sync engine and the
//! local collection store.
//!
//! - **Trait-based**: each section implements `ConfigSection`
//! - **Graceful degradation**: invalid configs load with warnings, never panic
//! - **Atomic writes**: config files are never left in a corrupted state
//!
//! # Example
//!
//! ```rust,no_run
//! use pilotsync_config::{Config, ConfigManager};
//!
//! let manager = ConfigManager::new().expect("Failed to initialize config");
//! let config = manager.load().unwrap_or_else(|e| {
//!     eprintln!("Config error: {}, using defaults", e);
//!     Config::default()
//! });
//!
//! println!("Conflict policy: {}", config.sync.conflict_policy);
//! ```

mod error;
mod manager;
mod persistence;
mod store_config;
mod sync_config;
mod validation;

pub use error::{ConfigError, ConfigResult, ValidationError};
pub use manager::ConfigManager;
pub use persistence::ConfigPersistence;
pub use store_config::{ExtensionRule, LocalStoreConfig};
pub use sync_config::SyncSection;
pub use validation::{ConfigSection, Validator};

use serde::{Deserialize, Serialize};

/// Current config file format version
pub const CONFIG_VERSION: u32 = 1;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Config file format version
    pub version: u32,

    /// Sync session settings
    pub sync: SyncSection,

    /// Local collection store settings
    pub local_store: LocalStoreConfig,
}

impl Config {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates the entire configuration
    ///
    /// Returns all validation errors found across all sections.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(mut e) = self.sync.validate() {
            errors.append(&mut e);
        }

        if let Err(mut e) = self.local_store.validate() {
            errors.append(&mut e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Merges this config with another, preferring values from `other`
    pub fn merge(&mut self, other: Config) {
        self.sync.merge(other.sync);
        self.local_store.merge(other.local_store);
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            sync: SyncSection::default(),
            local_store: LocalStoreConfig::default(),
        }
    }
}
