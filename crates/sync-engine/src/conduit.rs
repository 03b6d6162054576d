// crates/sync-engine/src/conduit.rs
//! Per-collection sync pass
//!
//! A conduit enumerates one collection on both sides, pairs records through
//! the state table, and settles each pair in a fixed order: state entries by
//! pair key, then unpaired local records by identity, then unpaired remote
//! records by identity. Escalated pairs are held back until the rest of the
//! collection is done.

use crate::conflict::{ConflictResolver, PairView};
use crate::engine::{Hooks, PendingResolutions};
use crate::error::{SyncError, SyncResult};
use crate::state::{StateError, SyncStateEntry, SyncStateStore};
use crate::types::{
    CollectionFailure, ConflictChoice, ConflictReport, OutcomeStatus, PairKey, PairOutcome,
    Progress, RecordStatus, SessionResult, Side, SyncAction,
};
use chrono::Utc;
use log::{debug, info, warn};
use pilotsync_core::{Backend, BackendError, CollectionDescriptor, Record};
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

/// Whether the session should go on after a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Cancelled,
}

/// One pair as found at enumeration time
#[derive(Debug, Clone)]
struct WorkItem {
    pair_key: PairKey,
    entry: Option<SyncStateEntry>,
    local: Option<Record>,
    remote: Option<Record>,
    /// Set once a vanished record has been folded back in
    reevaluated: bool,
}

impl WorkItem {
    fn record(&self, side: Side) -> Option<&Record> {
        match side {
            Side::Local => self.local.as_ref(),
            Side::Remote => self.remote.as_ref(),
        }
    }

    /// The record on `side` unless it is missing or tombstoned
    fn live(&self, side: Side) -> Option<&Record> {
        self.record(side).filter(|r| !r.is_deleted)
    }

    fn status(&self, side: Side) -> RecordStatus {
        let record = self.live(side);
        let Some(entry) = &self.entry else {
            return if record.is_some() {
                RecordStatus::New
            } else {
                RecordStatus::Absent
            };
        };

        let paired_here = entry.identity(side).is_some();
        let paired_there = entry.identity(side.opposite()).is_some();
        match record {
            _ if !paired_here => RecordStatus::Absent,
            None => RecordStatus::Deleted,
            Some(_) if !paired_there => RecordStatus::New,
            Some(r) if *r.content_hash() == entry.last_synced_hash => RecordStatus::Unchanged,
            Some(_) => RecordStatus::Modified,
        }
    }

    fn view(&self) -> PairView {
        let local = self.live(Side::Local);
        let remote = self.live(Side::Remote);
        let same_content = match (local, remote) {
            (Some(l), Some(r)) => l.content_hash() == r.content_hash(),
            _ => false,
        };

        PairView::new(self.status(Side::Local), self.status(Side::Remote))
            .with_timestamps(local.map(|r| r.last_modified), remote.map(|r| r.last_modified))
            .with_same_content(same_content)
    }

    fn label(&self) -> String {
        if let Some(record) = self.local.as_ref().or(self.remote.as_ref()) {
            return record.label().to_string();
        }
        self.entry
            .as_ref()
            .and_then(|e| e.local_identity.clone().or_else(|| e.remote_identity.clone()))
            .unwrap_or_else(|| self.pair_key.to_string())
    }

    /// Same pair with the record on `side` treated as gone
    fn vanished(mut self, side: Side) -> Self {
        match side {
            Side::Local => self.local = None,
            Side::Remote => self.remote = None,
        }
        self.reevaluated = true;
        self
    }
}

/// Keys are derived from the first-seen identity; a clash with an existing
/// key (an identity reused after its pair was re-homed) gets a counter
fn unique_key(used: &mut HashSet<PairKey>, side: Side, identity: &str) -> PairKey {
    let mut key = PairKey::derive(side, identity);
    let mut n = 1;
    while used.contains(&key) {
        key = PairKey::derive(side, &format!("{}#{}", identity, n));
        n += 1;
    }
    used.insert(key.clone());
    key
}

/// Orders every pair of a collection for processing
fn build_work(
    entries: Vec<SyncStateEntry>,
    local: Vec<Record>,
    remote: Vec<Record>,
) -> Vec<WorkItem> {
    let mut local: BTreeMap<String, Record> =
        local.into_iter().map(|r| (r.identity.clone(), r)).collect();
    let mut remote: BTreeMap<String, Record> =
        remote.into_iter().map(|r| (r.identity.clone(), r)).collect();
    let mut used: HashSet<PairKey> = entries.iter().map(|e| e.pair_key.clone()).collect();
    let mut work = Vec::with_capacity(entries.len() + local.len() + remote.len());

    for entry in entries {
        let l = entry.claimed(Side::Local).and_then(|id| local.remove(id));
        let r = entry.claimed(Side::Remote).and_then(|id| remote.remove(id));
        work.push(WorkItem {
            pair_key: entry.pair_key.clone(),
            entry: Some(entry),
            local: l,
            remote: r,
            reevaluated: false,
        });
    }

    let mut unpaired_remote: Vec<Option<Record>> = remote
        .into_values()
        .filter(|r| !r.is_deleted)
        .map(Some)
        .collect();

    for record in local.into_values().filter(|r| !r.is_deleted) {
        let twin = unpaired_remote
            .iter_mut()
            .find(|slot| {
                slot.as_ref()
                    .is_some_and(|r| r.content_hash() == record.content_hash())
            })
            .and_then(Option::take);
        work.push(WorkItem {
            pair_key: unique_key(&mut used, Side::Local, &record.identity),
            entry: None,
            local: Some(record),
            remote: twin,
            reevaluated: false,
        });
    }

    for record in unpaired_remote.into_iter().flatten() {
        work.push(WorkItem {
            pair_key: unique_key(&mut used, Side::Remote, &record.identity),
            entry: None,
            local: None,
            remote: Some(record),
            reevaluated: false,
        });
    }

    work
}

/// Identities that entries still claim but whose record was not enumerated
fn vacancies(work: &[WorkItem]) -> HashSet<(Side, String)> {
    let mut found = HashSet::new();
    for item in work {
        let Some(entry) = &item.entry else { continue };
        for side in [Side::Local, Side::Remote] {
            if let (Some(identity), None) = (entry.claimed(side), item.record(side)) {
                found.insert((side, identity.to_string()));
            }
        }
    }
    found
}

/// Why applying an action stopped
enum ApplyError {
    Backend { side: Side, error: BackendError },
    State(StateError),
}

impl From<StateError> for ApplyError {
    fn from(e: StateError) -> Self {
        ApplyError::State(e)
    }
}

fn on(side: Side) -> impl Fn(BackendError) -> ApplyError {
    move |error| ApplyError::Backend { side, error }
}

enum Settled {
    Done(PairOutcome),
    Escalated(WorkItem),
}

/// Borrowed session resources for walking collections one at a time
pub(crate) struct Conduit<'s> {
    pub(crate) local: &'s mut dyn Backend,
    pub(crate) remote: &'s mut dyn Backend,
    pub(crate) store: &'s mut SyncStateStore,
    pub(crate) resolver: ConflictResolver,
    pub(crate) hooks: &'s mut Hooks,
    pub(crate) pending: &'s Mutex<PendingResolutions>,
    pub(crate) result: &'s mut SessionResult,
    /// Identities claimed by state entries whose record was missing at enumeration
    pub(crate) vacancies: HashSet<(Side, String)>,
}

impl Conduit<'_> {
    /// Syncs one collection; `Err` only for session-fatal problems
    pub(crate) fn run(&mut self, collection: &CollectionDescriptor) -> SyncResult<Flow> {
        let id = collection.id.as_str();

        let Some(local) = self.enumerate(Side::Local, id)? else {
            return Ok(Flow::Continue);
        };
        let Some(remote) = self.enumerate(Side::Remote, id)? else {
            return Ok(Flow::Continue);
        };
        let entries = self.store.all_for_collection(id)?;

        let work = build_work(entries, local, remote);
        self.vacancies = vacancies(&work);
        let total = work.len();
        self.result.pairs_total += total;
        info!("[{}] {} pair(s) to examine", id, total);

        let mut completed = 0;
        let mut deferred = Vec::new();

        for item in work {
            if self.cancel_requested() {
                info!("[{}] cancelled after {}/{} pairs", id, completed, total);
                return Ok(Flow::Cancelled);
            }
            match self.settle(id, item)? {
                Settled::Done(outcome) => {
                    completed += 1;
                    self.finish(outcome, completed, total);
                }
                Settled::Escalated(item) => {
                    debug!("[{}] deferring escalated pair {}", id, item.pair_key);
                    deferred.push(item);
                }
            }
        }

        for item in deferred {
            if self.cancel_requested() {
                info!("[{}] cancelled after {}/{} pairs", id, completed, total);
                return Ok(Flow::Cancelled);
            }
            let outcome = self.escalate(id, item)?;
            completed += 1;
            self.finish(outcome, completed, total);
        }

        let counts = self.result.outcomes_for(id).fold((0, 0), |(synced, failed), o| {
            match o.status {
                OutcomeStatus::Synced => (synced + 1, failed),
                OutcomeStatus::Failed(_) => (synced, failed + 1),
                _ => (synced, failed),
            }
        });
        info!(
            "[{}] done: {} synced, {} failed, {} examined",
            id, counts.0, counts.1, total
        );

        Ok(Flow::Continue)
    }

    fn backend(&mut self, side: Side) -> &mut dyn Backend {
        match side {
            Side::Local => &mut *self.local,
            Side::Remote => &mut *self.remote,
        }
    }

    fn enumerate(&mut self, side: Side, collection_id: &str) -> SyncResult<Option<Vec<Record>>> {
        match self.backend(side).load_all(collection_id) {
            Ok(records) => Ok(Some(records)),
            Err(e) if e.is_fatal() => Err(SyncError::BackendUnavailable(format!(
                "{} side: {}",
                side, e
            ))),
            Err(e) => {
                warn!("[{}] skipping collection, {} side: {}", collection_id, side, e);
                self.result.collection_failures.push(CollectionFailure {
                    collection_id: collection_id.to_string(),
                    message: format!("{} side: {}", side, e),
                });
                Ok(None)
            }
        }
    }

    fn cancel_requested(&self) -> bool {
        self.hooks.cancel.as_ref().is_some_and(|check| check())
    }

    fn finish(&mut self, outcome: PairOutcome, completed: usize, total: usize) {
        if let Some(progress) = self.hooks.progress.as_mut() {
            progress(&Progress {
                collection_id: outcome.collection_id.clone(),
                completed,
                total,
                label: outcome.label.clone(),
            });
        }
        self.result.outcomes.push(outcome);
    }

    fn take_pending(
        &self,
        collection_id: &str,
        pair_key: &PairKey,
    ) -> SyncResult<Option<ConflictChoice>> {
        let mut pending = self.pending.lock().map_err(|_| SyncError::LockPoisoned)?;
        Ok(pending.remove(&(collection_id.to_string(), pair_key.clone())))
    }

    /// Resolves and applies one pair, unless it needs the caller
    fn settle(&mut self, collection_id: &str, item: WorkItem) -> SyncResult<Settled> {
        let view = item.view();
        let action = match self.resolver.resolve(&view) {
            SyncAction::Escalate => match self.take_pending(collection_id, &item.pair_key)? {
                Some(choice) => ConflictResolver::apply_choice(choice, &view),
                None => return Ok(Settled::Escalated(item)),
            },
            action => action,
        };
        self.carry_out(collection_id, item, action)
    }

    /// Final say on an escalated pair: supplied resolution, then the handler
    fn escalate(&mut self, collection_id: &str, item: WorkItem) -> SyncResult<PairOutcome> {
        let view = item.view();
        let choice = match self.take_pending(collection_id, &item.pair_key)? {
            Some(choice) => Some(choice),
            None => {
                let report = ConflictReport {
                    collection_id: collection_id.to_string(),
                    pair_key: item.pair_key.clone(),
                    label: item.label(),
                    local_status: view.local,
                    remote_status: view.remote,
                    local: item.live(Side::Local).cloned(),
                    remote: item.live(Side::Remote).cloned(),
                };
                self.hooks.conflict.as_mut().and_then(|handler| handler(&report))
            }
        };

        let Some(choice) = choice else {
            let unresolved = SyncError::ConflictUnresolved(item.pair_key.to_string());
            warn!("[{}] {}: {}", collection_id, item.label(), unresolved);
            return Ok(outcome(
                collection_id,
                &item,
                SyncAction::Escalate,
                OutcomeStatus::Conflicted(unresolved.to_string()),
            ));
        };

        debug!("[{}] {} resolved as {:?}", collection_id, item.label(), choice);
        let action = ConflictResolver::apply_choice(choice, &view);
        match self.carry_out(collection_id, item, action)? {
            Settled::Done(outcome) => Ok(outcome),
            Settled::Escalated(item) => self.escalate(collection_id, item),
        }
    }

    fn carry_out(
        &mut self,
        collection_id: &str,
        item: WorkItem,
        action: SyncAction,
    ) -> SyncResult<Settled> {
        debug!(
            "[{}] {} ({:?}/{:?}) -> {:?}",
            collection_id,
            item.label(),
            item.status(Side::Local),
            item.status(Side::Remote),
            action
        );

        match self.apply(collection_id, &item, action) {
            Ok(()) => {
                let status = match action {
                    SyncAction::None => OutcomeStatus::Unchanged,
                    SyncAction::Skip => OutcomeStatus::Skipped,
                    _ => OutcomeStatus::Synced,
                };
                Ok(Settled::Done(outcome(collection_id, &item, action, status)))
            }
            Err(ApplyError::State(e)) if e.is_rejected() => {
                warn!("[{}] {} not recorded: {}", collection_id, item.label(), e);
                Ok(Settled::Done(outcome(
                    collection_id,
                    &item,
                    action,
                    OutcomeStatus::Failed(e.to_string()),
                )))
            }
            Err(ApplyError::State(e)) => Err(e.into()),
            Err(ApplyError::Backend { side, error }) if error.is_fatal() => Err(
                SyncError::BackendUnavailable(format!("{} side: {}", side, error)),
            ),
            Err(ApplyError::Backend { side, error })
                if error.is_not_found() && !item.reevaluated =>
            {
                warn!(
                    "[{}] {} vanished on the {} side, re-evaluating",
                    collection_id,
                    item.label(),
                    side
                );
                self.settle(collection_id, item.vanished(side))
            }
            Err(ApplyError::Backend { side, error }) => {
                warn!(
                    "[{}] {} failed on the {} side: {}",
                    collection_id,
                    item.label(),
                    side,
                    error
                );
                Ok(Settled::Done(outcome(
                    collection_id,
                    &item,
                    action,
                    OutcomeStatus::Failed(error.to_string()),
                )))
            }
        }
    }

    fn apply(
        &mut self,
        collection_id: &str,
        item: &WorkItem,
        action: SyncAction,
    ) -> Result<(), ApplyError> {
        match action {
            SyncAction::None | SyncAction::Skip | SyncAction::Escalate => Ok(()),
            SyncAction::PushLocal | SyncAction::CreateRemote => {
                self.copy(collection_id, item, Side::Local)
            }
            SyncAction::PullRemote | SyncAction::CreateLocal => {
                self.copy(collection_id, item, Side::Remote)
            }
            SyncAction::DeleteRemote => self.delete(collection_id, item, Side::Remote),
            SyncAction::DeleteLocal => self.delete(collection_id, item, Side::Local),
            SyncAction::DropState => self.forget(collection_id, item),
            SyncAction::Link | SyncAction::Adopt => {
                let (Some(local), Some(remote)) = (item.live(Side::Local), item.live(Side::Remote))
                else {
                    return Err(ApplyError::Backend {
                        side: if item.live(Side::Local).is_none() {
                            Side::Local
                        } else {
                            Side::Remote
                        },
                        error: BackendError::NotFound(item.label()),
                    });
                };
                self.store.put(SyncStateEntry {
                    collection_id: collection_id.to_string(),
                    pair_key: item.pair_key.clone(),
                    local_identity: Some(local.identity.clone()),
                    remote_identity: Some(remote.identity.clone()),
                    last_synced_hash: local.content_hash().clone(),
                    last_synced_at: Utc::now(),
                    vacated: Vec::new(),
                })?;
                Ok(())
            }
        }
    }

    /// Makes the other side hold `from`'s content, then records the pair
    fn copy(&mut self, collection_id: &str, item: &WorkItem, from: Side) -> Result<(), ApplyError> {
        let to = from.opposite();
        let Some(source) = item.live(from) else {
            return Err(ApplyError::Backend {
                side: from,
                error: BackendError::NotFound(item.label()),
            });
        };

        let target = self.backend(to);
        let written = match item.record(to) {
            Some(existing) => {
                target
                    .update(&source.retarget(existing.identity.clone()))
                    .map_err(on(to))?;
                existing.identity.clone()
            }
            None => {
                let created = target.create(collection_id, source).map_err(on(to))?;
                self.release(collection_id, &item.pair_key, to, &created)?;
                created
            }
        };
        debug!("[{}] wrote {} on the {} side", collection_id, written, to);

        let (local_identity, remote_identity) = match from {
            Side::Local => (source.identity.clone(), written),
            Side::Remote => (written, source.identity.clone()),
        };
        self.store.put(SyncStateEntry {
            collection_id: collection_id.to_string(),
            pair_key: item.pair_key.clone(),
            local_identity: Some(local_identity),
            remote_identity: Some(remote_identity),
            last_synced_hash: source.content_hash().clone(),
            last_synced_at: Utc::now(),
            vacated: Vec::new(),
        })?;
        Ok(())
    }

    /// A create can hand out an identity whose record vanished under a stale
    /// pair; that pair lets go of it and keeps seeing the side as deleted
    fn release(
        &mut self,
        collection_id: &str,
        pair_key: &PairKey,
        side: Side,
        identity: &str,
    ) -> Result<(), ApplyError> {
        if !self.vacancies.remove(&(side, identity.to_string())) {
            return Ok(());
        }
        let holder = match side {
            Side::Local => self.store.find_by_local(collection_id, identity)?,
            Side::Remote => self.store.find_by_remote(collection_id, identity)?,
        };
        if let Some(mut holder) = holder.filter(|e| &e.pair_key != pair_key) {
            debug!(
                "[{}] pair {} releases {} on the {} side",
                collection_id, holder.pair_key, identity, side
            );
            holder.vacate(side);
            self.store.put(holder)?;
        }
        Ok(())
    }

    /// Deletes on `side`; the other side is already gone, so the pair ends
    fn delete(&mut self, collection_id: &str, item: &WorkItem, side: Side) -> Result<(), ApplyError> {
        if let Some(record) = item.record(side) {
            let identity = record.identity.clone();
            self.backend(side).delete(&identity).map_err(on(side))?;
            debug!("[{}] deleted {} on the {} side", collection_id, identity, side);
        }
        self.forget(collection_id, item)
    }

    fn forget(&mut self, collection_id: &str, item: &WorkItem) -> Result<(), ApplyError> {
        if item.entry.is_some() {
            self.store.remove(collection_id, &item.pair_key)?;
        }
        Ok(())
    }
}

fn outcome(
    collection_id: &str,
    item: &WorkItem,
    action: SyncAction,
    status: OutcomeStatus,
) -> PairOutcome {
    PairOutcome {
        collection_id: collection_id.to_string(),
        pair_key: item.pair_key.clone(),
        label: item.label(),
        action,
        status,
    }
}
