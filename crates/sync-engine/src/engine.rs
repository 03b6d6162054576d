// crates/sync-engine/src/engine.rs
//! Main sync engine

use crate::conduit::{Conduit, Flow};
use crate::conflict::ConflictResolver;
use crate::error::{SyncError, SyncResult};
use crate::state::SyncStateStore;
use crate::types::{
    ConflictChoice, ConflictReport, PairKey, Progress, SessionResult, SessionState,
};
use chrono::Utc;
use log::{debug, error, info, warn};
use pilotsync_config::{Config, ConfigManager};
use pilotsync_core::{Backend, CollectionDescriptor, ConflictPolicy};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Called after each pair completes
pub type ProgressCallback = Box<dyn FnMut(&Progress) + Send>;

/// Consulted before each pair; `true` stops the session
pub type CancelCheck = Box<dyn Fn() -> bool + Send>;

/// Asked about escalated pairs; `None` leaves the pair unresolved
pub type ConflictHandler = Box<dyn FnMut(&ConflictReport) -> Option<ConflictChoice> + Send>;

pub(crate) type PendingResolutions = HashMap<(String, PairKey), ConflictChoice>;

/// Caller-supplied callbacks
#[derive(Default)]
pub(crate) struct Hooks {
    pub(crate) progress: Option<ProgressCallback>,
    pub(crate) cancel: Option<CancelCheck>,
    pub(crate) conflict: Option<ConflictHandler>,
}

/// Configuration for the sync engine
#[derive(Debug, Clone, Default)]
pub struct SyncConfig {
    /// Session-wide conflict policy
    pub conflict_policy: ConflictPolicy,
    /// Directory holding the per-collection state tables
    pub state_dir: Option<PathBuf>,
    /// Collections synced, in order
    pub collections: Vec<CollectionDescriptor>,
}

impl SyncConfig {
    /// Builds the engine settings from the application config. An unset
    /// state directory falls back to the platform data directory.
    pub fn from_config(config: &Config) -> SyncResult<Self> {
        config.validate().map_err(|errors| {
            SyncError::Config(
                errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })?;

        let state_dir = match &config.sync.state_dir {
            Some(dir) => dir.clone(),
            None => ConfigManager::default_state_dir()
                .map_err(|e| SyncError::Config(e.to_string()))?,
        };

        Ok(Self {
            conflict_policy: config.sync.conflict_policy,
            state_dir: Some(state_dir),
            collections: config.local_store.collections.clone(),
        })
    }
}

/// Clears the busy flag however the session ends
struct SessionGuard<'a>(&'a AtomicBool);

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Main synchronization engine
///
/// Holds one backend per side and runs at most one session at a time.
/// Calls into each backend are serialized behind its own lock, so the engine
/// can be shared across threads while a session runs.
pub struct SyncEngine {
    local: Mutex<Box<dyn Backend>>,
    remote: Mutex<Box<dyn Backend>>,
    config: SyncConfig,
    hooks: Mutex<Hooks>,
    pending: Mutex<PendingResolutions>,
    syncing: AtomicBool,
    state: Mutex<SessionState>,
}

impl SyncEngine {
    /// Creates an engine with default settings and no collections
    pub fn new(local: Box<dyn Backend>, remote: Box<dyn Backend>) -> Self {
        Self::with_config(local, remote, SyncConfig::default())
    }

    pub fn with_config(
        local: Box<dyn Backend>,
        remote: Box<dyn Backend>,
        config: SyncConfig,
    ) -> Self {
        Self {
            local: Mutex::new(local),
            remote: Mutex::new(remote),
            config,
            hooks: Mutex::new(Hooks::default()),
            pending: Mutex::new(HashMap::new()),
            syncing: AtomicBool::new(false),
            state: Mutex::new(SessionState::Idle),
        }
    }

    /// Creates an engine from the application config
    pub fn from_config(
        config: &Config,
        local: Box<dyn Backend>,
        remote: Box<dyn Backend>,
    ) -> SyncResult<Self> {
        Ok(Self::with_config(local, remote, SyncConfig::from_config(config)?))
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Adds a collection; one with the same id is replaced in place
    pub fn register_collection(&mut self, descriptor: CollectionDescriptor) {
        match self
            .config
            .collections
            .iter_mut()
            .find(|c| c.id == descriptor.id)
        {
            Some(existing) => *existing = descriptor,
            None => self.config.collections.push(descriptor),
        }
    }

    pub fn set_conflict_policy(&mut self, policy: ConflictPolicy) {
        self.config.conflict_policy = policy;
    }

    pub fn set_state_directory(&mut self, dir: impl Into<PathBuf>) {
        self.config.state_dir = Some(dir.into());
    }

    pub fn set_progress_callback<F>(&mut self, callback: F) -> SyncResult<()>
    where
        F: FnMut(&Progress) + Send + 'static,
    {
        self.hooks_mut()?.progress = Some(Box::new(callback));
        Ok(())
    }

    pub fn set_cancel_check<F>(&mut self, check: F) -> SyncResult<()>
    where
        F: Fn() -> bool + Send + 'static,
    {
        self.hooks_mut()?.cancel = Some(Box::new(check));
        Ok(())
    }

    pub fn set_conflict_handler<F>(&mut self, handler: F) -> SyncResult<()>
    where
        F: FnMut(&ConflictReport) -> Option<ConflictChoice> + Send + 'static,
    {
        self.hooks_mut()?.conflict = Some(Box::new(handler));
        Ok(())
    }

    fn hooks_mut(&mut self) -> SyncResult<&mut Hooks> {
        self.hooks.get_mut().map_err(|_| SyncError::LockPoisoned)
    }

    /// Records the answer for an escalated pair. It is used the next time
    /// that pair escalates, in this session or a later one.
    pub fn supply_resolution(
        &self,
        collection_id: &str,
        pair_key: PairKey,
        choice: ConflictChoice,
    ) -> SyncResult<()> {
        let mut pending = self.pending.lock().map_err(|_| SyncError::LockPoisoned)?;
        pending.insert((collection_id.to_string(), pair_key), choice);
        Ok(())
    }

    /// Returns true while a session is running
    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }

    /// State of the current or most recent session
    pub fn state(&self) -> SyncResult<SessionState> {
        self.state
            .lock()
            .map(|s| *s)
            .map_err(|_| SyncError::LockPoisoned)
    }

    fn set_state(&self, next: SessionState) -> SyncResult<()> {
        let mut state = self.state.lock().map_err(|_| SyncError::LockPoisoned)?;
        debug!("Session state {:?} -> {:?}", *state, next);
        *state = next;
        Ok(())
    }

    /// Runs one sync session over every registered collection
    ///
    /// Returns `Err` only when the session cannot start at all; everything
    /// that happens once it has started is reported in the [`SessionResult`].
    pub fn run_sync(&self) -> SyncResult<SessionResult> {
        let state_dir = self
            .config
            .state_dir
            .clone()
            .ok_or(SyncError::NoStateDirectory)?;

        if self
            .syncing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SyncError::Busy);
        }
        let _guard = SessionGuard(&self.syncing);

        let mut result = SessionResult::new();
        info!(
            "Sync session {} starting ({} collection(s), policy {})",
            result.session_id,
            self.config.collections.len(),
            self.config.conflict_policy
        );
        self.set_state(SessionState::Preparing)?;

        let outcome = self.run_session(&state_dir, &mut result);
        let state = match outcome {
            Ok(Flow::Continue) => SessionState::Completed,
            Ok(Flow::Cancelled) => SessionState::Cancelled,
            Err(e) => {
                error!("Sync session {} failed: {}", result.session_id, e);
                result.failure = Some(e.to_string());
                SessionState::Failed
            }
        };

        result.state = state;
        result.finished_at = Some(Utc::now());
        self.set_state(state)?;

        let counts = result.counts();
        info!(
            "Sync session {} {:?}: {} synced, {} unchanged, {} skipped, {} conflicted, {} failed",
            result.session_id,
            state,
            counts.synced,
            counts.unchanged,
            counts.skipped,
            counts.conflicted,
            counts.failed
        );

        Ok(result)
    }

    fn run_session(&self, state_dir: &Path, result: &mut SessionResult) -> SyncResult<Flow> {
        let mut local = self.local.lock().map_err(|_| SyncError::LockPoisoned)?;
        let mut remote = self.remote.lock().map_err(|_| SyncError::LockPoisoned)?;

        for backend in [&**local, &**remote] {
            if !backend.is_available() {
                return Err(SyncError::BackendUnavailable(format!(
                    "{} backend is not available",
                    backend.name()
                )));
            }
        }

        let mut store = SyncStateStore::open(state_dir)?;

        for collection in &self.config.collections {
            for backend in [&mut **local, &mut **remote] {
                let identity = backend.ensure_collection(collection).map_err(|e| {
                    warn!(
                        "[{}] could not prepare collection on {}: {}",
                        collection.id,
                        backend.name(),
                        e
                    );
                    SyncError::Backend(e)
                })?;
                debug!("[{}] {} holds it as {}", collection.id, backend.name(), identity);
            }
        }

        self.set_state(SessionState::Syncing)?;

        let mut hooks = self.hooks.lock().map_err(|_| SyncError::LockPoisoned)?;
        let mut conduit = Conduit {
            local: &mut **local,
            remote: &mut **remote,
            store: &mut store,
            resolver: ConflictResolver::new(self.config.conflict_policy),
            hooks: &mut *hooks,
            pending: &self.pending,
            result,
            vacancies: HashSet::new(),
        };

        for collection in &self.config.collections {
            if conduit.run(collection)? == Flow::Cancelled {
                return Ok(Flow::Cancelled);
            }
        }

        Ok(Flow::Continue)
    }
}
