//! Integration tests for the sync state store

mod common;

use chrono::Utc;
use common::MemoryBackend;
use pilotsync_core::{CollectionDescriptor, ContentHash};
use pilotsync_sync_engine::{
    PairKey, SessionState, Side, StateError, SyncEngine, SyncStateEntry, SyncStateStore,
};
use std::fs;
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn entry(collection: &str, local: &str, remote: &str, body: &str) -> SyncStateEntry {
    SyncStateEntry::paired(
        collection,
        PairKey::derive(Side::Local, local),
        local,
        remote,
        ContentHash::of(body.as_bytes()),
    )
}

#[test]
fn test_entries_survive_reopen() -> TestResult {
    let dir = TempDir::new()?;
    {
        let mut store = SyncStateStore::open(dir.path())?;
        store.put(entry("memos", "b", "2", "two"))?;
        store.put(entry("memos", "a", "1", "one"))?;
        store.put(entry("contacts", "c", "3", "three"))?;
    }

    let mut store = SyncStateStore::open(dir.path())?;
    let memos = store.all_for_collection("memos")?;
    assert_eq!(memos.len(), 2);
    assert!(memos.windows(2).all(|w| w[0].pair_key < w[1].pair_key));

    let found = store.find_by_remote("memos", "2")?.ok_or("missing")?;
    assert_eq!(found.local_identity.as_deref(), Some("b"));
    assert_eq!(found.last_synced_hash, ContentHash::of(b"two"));
    assert!(store.find_by_local("memos", "c")?.is_none());
    assert_eq!(store.all_for_collection("contacts")?.len(), 1);
    Ok(())
}

#[test]
fn test_one_table_per_collection_and_no_leftovers() -> TestResult {
    let dir = TempDir::new()?;
    let mut store = SyncStateStore::open(dir.path())?;
    store.put(entry("memos", "a", "1", "one"))?;
    store.put(entry("todos", "t", "9", "todo"))?;
    store.remove("memos", &PairKey::derive(Side::Local, "a"))?;

    let mut names: Vec<String> = fs::read_dir(dir.path())?
        .map(|e| e.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<Result<_, _>>()?;
    names.sort();
    assert_eq!(names, vec!["memos.state.json", "todos.state.json"]);
    Ok(())
}

#[test]
fn test_unknown_fields_and_newer_versions_are_read() -> TestResult {
    let dir = TempDir::new()?;
    let key = PairKey::derive(Side::Local, "a");
    let table = serde_json::json!({
        "format_version": 7,
        "collection_id": "memos",
        "written_by": "a future release",
        "entries": {
            key.as_str(): {
                "collection_id": "memos",
                "pair_key": key.as_str(),
                "local_identity": "a",
                "remote_identity": "1",
                "last_synced_hash": ContentHash::of(b"one").as_str(),
                "last_synced_at": Utc::now(),
                "merge_base": "ignored"
            }
        }
    });
    let store = SyncStateStore::open(dir.path())?;
    fs::write(store.table_path("memos"), serde_json::to_vec(&table)?)?;

    let mut store = SyncStateStore::open(dir.path())?;
    let found = store.get("memos", &key)?.ok_or("missing")?;
    assert_eq!(found.remote_identity.as_deref(), Some("1"));
    Ok(())
}

#[test]
fn test_corrupted_table_is_reported() -> TestResult {
    let dir = TempDir::new()?;
    let store = SyncStateStore::open(dir.path())?;
    fs::write(store.table_path("memos"), b"{ not json")?;

    let mut store = SyncStateStore::open(dir.path())?;
    assert!(matches!(
        store.all_for_collection("memos"),
        Err(StateError::Corrupted { .. })
    ));
    Ok(())
}

#[test]
fn test_corrupted_table_fails_the_session() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = TempDir::new()?;
    let store = SyncStateStore::open(dir.path())?;
    fs::write(store.table_path("memos"), b"garbage")?;

    let local = MemoryBackend::new("pc");
    local.insert("memos", "a", "one");
    let remote = MemoryBackend::new("device");

    let mut engine = SyncEngine::new(local.boxed(), remote.boxed());
    engine.register_collection(CollectionDescriptor::memos());
    engine.set_state_directory(dir.path());

    let result = engine.run_sync()?;
    assert_eq!(result.state, SessionState::Failed);
    assert!(result.failure.is_some());
    assert_eq!(remote.mutations(), 0);
    Ok(())
}
