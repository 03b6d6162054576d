//! End-to-end sync between a local-file store and an in-memory device

mod common;

use common::MemoryBackend;
use pilotsync_config::LocalStoreConfig;
use pilotsync_core::{Backend, CollectionDescriptor, ConflictPolicy, Record, RecordKind};
use pilotsync_local_store::LocalFileBackend;
use pilotsync_sync_engine::{SessionState, SyncAction, SyncEngine};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn std::error::Error>>;

const MEMOS: &str = "memos";

fn store_config(root: &Path, ceiling: u32) -> LocalStoreConfig {
    let mut config = LocalStoreConfig::with_root(root);
    config.max_suffix_attempts = ceiling;
    config
}

fn engine(root: &Path, state: &Path, device: &MemoryBackend, ceiling: u32) -> SyncEngine {
    engine_with(root, state, device, ceiling, ConflictPolicy::PreferNewer)
}

fn engine_with(
    root: &Path,
    state: &Path,
    device: &MemoryBackend,
    ceiling: u32,
    policy: ConflictPolicy,
) -> SyncEngine {
    let local = LocalFileBackend::new(store_config(root, ceiling));
    let mut engine = SyncEngine::new(Box::new(local), device.boxed());
    engine.register_collection(CollectionDescriptor::memos());
    engine.set_conflict_policy(policy);
    engine.set_state_directory(state);
    engine
}

fn memo_files(root: &Path) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(root.join("memos"))? {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if !name.starts_with('.') {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

#[test]
fn test_colliding_device_names_become_distinct_files() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();
    let root = TempDir::new()?;
    let state = TempDir::new()?;
    let device = MemoryBackend::new("device");
    for (id, body) in [("1", "first"), ("2", "second"), ("3", "third"), ("4", "fourth")] {
        device.insert_named(MEMOS, id, "Shopping List", body);
    }

    let result = engine(root.path(), state.path(), &device, 2).run_sync()?;
    assert!(result.is_completed());
    assert_eq!(result.counts().synced, 4);

    let files = memo_files(root.path())?;
    assert_eq!(files.len(), 4);
    assert!(files.contains(&"Shopping List.txt".to_string()));
    assert!(files.contains(&"Shopping List_1.txt".to_string()));
    assert!(files.contains(&"Shopping List_2.txt".to_string()));
    let hashed: Vec<&String> = files
        .iter()
        .filter(|f| !f.starts_with("Shopping List"))
        .collect();
    assert_eq!(hashed.len(), 1, "{:?}", files);

    let bodies: HashSet<Vec<u8>> = files
        .iter()
        .map(|f| fs::read(root.path().join("memos").join(f)))
        .collect::<Result<_, _>>()?;
    assert_eq!(bodies.len(), 4);
    Ok(())
}

#[test]
fn test_file_edits_and_removals_reach_the_device() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();
    let root = TempDir::new()?;
    let state = TempDir::new()?;
    let device = MemoryBackend::new("device");

    let mut files = LocalFileBackend::new(store_config(root.path(), 100));
    files.ensure_collection(&CollectionDescriptor::memos())?;
    let keep = Record::new("", b"milk".to_vec(), RecordKind::Memo).with_display_name("groceries");
    let drop = Record::new("", b"old".to_vec(), RecordKind::Memo).with_display_name("scratch");
    let keep_id = files.create(MEMOS, &keep)?;
    let drop_id = files.create(MEMOS, &drop)?;

    let first = engine(root.path(), state.path(), &device, 100).run_sync()?;
    assert_eq!(first.counts().synced, 2);
    assert_eq!(device.bodies(MEMOS), vec!["milk", "old"]);

    fs::write(&keep_id, b"milk and eggs")?;
    fs::remove_file(&drop_id)?;

    let second = engine(root.path(), state.path(), &device, 100).run_sync()?;
    let mut actions: Vec<SyncAction> = second.outcomes.iter().map(|o| o.action).collect();
    actions.sort_by_key(|a| format!("{:?}", a));
    assert_eq!(actions, vec![SyncAction::DeleteRemote, SyncAction::PushLocal]);
    assert_eq!(device.bodies(MEMOS), vec!["milk and eggs"]);

    let third = engine(root.path(), state.path(), &device, 100).run_sync()?;
    assert_eq!(third.state, SessionState::Completed);
    assert_eq!(third.applied_mutations(), 0);
    Ok(())
}

#[test]
fn test_device_edit_is_written_back_to_the_same_file() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();
    let root = TempDir::new()?;
    let state = TempDir::new()?;
    let device = MemoryBackend::new("device");
    device.insert_named(MEMOS, "7", "todo", "call bob");

    engine(root.path(), state.path(), &device, 100).run_sync()?;
    let path = root.path().join("memos").join("todo.txt");
    assert_eq!(fs::read(&path)?, b"call bob");

    device.edit("7", "call bob and alice");
    let result = engine(root.path(), state.path(), &device, 100).run_sync()?;
    assert_eq!(result.outcomes[0].action, SyncAction::PullRemote);
    assert_eq!(fs::read(&path)?, b"call bob and alice");
    assert_eq!(memo_files(root.path())?, vec!["todo.txt"]);
    Ok(())
}

#[test]
fn test_path_freed_by_a_skipped_pair_can_be_reused() -> TestResult {
    let _ = env_logger::builder().is_test(true).try_init();
    let root = TempDir::new()?;
    let state = TempDir::new()?;
    let device = MemoryBackend::new("device");
    let run = |policy| engine_with(root.path(), state.path(), &device, 100, policy).run_sync();

    let mut files = LocalFileBackend::new(store_config(root.path(), 100));
    files.ensure_collection(&CollectionDescriptor::memos())?;
    let note = Record::new("", b"v1".to_vec(), RecordKind::Memo).with_display_name("Note");
    let path = files.create(MEMOS, &note)?;
    run(ConflictPolicy::Skip)?;
    let copy = device.records(MEMOS)[0].identity.clone();

    // deleted here, edited there: stays stale under Skip while the path is free
    fs::remove_file(&path)?;
    device.edit(&copy, "v2");
    device.insert_named(MEMOS, "9", "Note", "unrelated");

    let second = run(ConflictPolicy::Skip)?;
    assert_eq!(second.state, SessionState::Completed, "{:?}", second.failure);
    assert_eq!(fs::read(&path)?, b"unrelated");
    assert_eq!(device.get(&copy).ok_or("device copy gone")?.payload(), b"v2");

    let third = run(ConflictPolicy::Skip)?;
    assert_eq!(third.state, SessionState::Completed);
    assert_eq!(third.applied_mutations(), 0);
    assert_eq!(device.get(&copy).ok_or("device copy gone")?.payload(), b"v2");

    let fourth = run(ConflictPolicy::KeepRemote)?;
    assert_eq!(fourth.state, SessionState::Completed, "{:?}", fourth.failure);
    assert_eq!(memo_files(root.path())?, vec!["Note.txt", "Note_1.txt"]);
    assert_eq!(fs::read(&path)?, b"unrelated");
    assert_eq!(fs::read(root.path().join("memos").join("Note_1.txt"))?, b"v2");
    assert_eq!(device.bodies(MEMOS), vec!["unrelated", "v2"]);
    Ok(())
}
