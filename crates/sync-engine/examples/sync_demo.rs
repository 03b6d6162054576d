// crates/sync-engine/examples/sync_demo.rs
//! Demonstration of sync engine capabilities
//!
//! Two local-file stores stand in for the PC and the handheld. Run with
//! `RUST_LOG=debug` to watch every pair being settled.

use pilotsync_config::LocalStoreConfig;
use pilotsync_core::{Backend, CollectionDescriptor, ConflictPolicy, Record, RecordKind};
use pilotsync_local_store::LocalFileBackend;
use pilotsync_sync_engine::{ConflictChoice, SessionResult, SyncEngine};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn main() {
    env_logger::init();

    println!("PilotSync Engine Demo");
    println!("=====================\n");

    let pc = TempDir::new().unwrap();
    let handheld = TempDir::new().unwrap();
    let state = TempDir::new().unwrap();

    demo_first_sync(pc.path(), handheld.path(), state.path());
    println!();
    demo_conflict(pc.path(), handheld.path(), state.path());
}

fn store(root: &Path, name: &str) -> LocalFileBackend {
    let mut store = LocalFileBackend::with_name(name, LocalStoreConfig::with_root(root));
    store.ensure_collection(&CollectionDescriptor::memos()).unwrap();
    store
}

fn engine(pc: &Path, handheld: &Path, state: &Path) -> SyncEngine {
    let mut engine = SyncEngine::new(
        Box::new(store(pc, "pc")),
        Box::new(store(handheld, "handheld")),
    );
    engine.register_collection(CollectionDescriptor::memos());
    engine.set_state_directory(state);
    engine
        .set_progress_callback(|p| {
            println!("  [{}] {}/{} {}", p.collection_id, p.completed, p.total, p.label)
        })
        .unwrap();
    engine
}

fn report(result: &SessionResult) {
    let counts = result.counts();
    println!(
        "Session {:?}: {} synced, {} unchanged, {} conflicted, {} failed",
        result.state, counts.synced, counts.unchanged, counts.conflicted, counts.failed
    );
}

fn demo_first_sync(pc: &Path, handheld: &Path, state: &Path) {
    println!("1. First Synchronization");
    println!("------------------------");

    let mut desk = store(pc, "pc");
    for (name, body) in [("Shopping", "milk, eggs"), ("Ideas", "sync all the things")] {
        let memo = Record::new("", body.as_bytes().to_vec(), RecordKind::Memo)
            .with_display_name(name);
        let identity = desk.create("memos", &memo).unwrap();
        println!("PC: created {}", identity);
    }

    let mut palm = store(handheld, "handheld");
    let memo = Record::new("", b"call the office".to_vec(), RecordKind::Memo)
        .with_display_name("Reminder");
    palm.create("memos", &memo).unwrap();
    println!("Handheld: created Reminder\n");

    let result = engine(pc, handheld, state).run_sync().unwrap();
    report(&result);

    let again = engine(pc, handheld, state).run_sync().unwrap();
    println!("Second run applied {} mutation(s)", again.applied_mutations());
}

fn demo_conflict(pc: &Path, handheld: &Path, state: &Path) {
    println!("2. Conflict Escalation");
    println!("----------------------");

    fs::write(pc.join("memos").join("Shopping.txt"), "milk, eggs, bread").unwrap();
    fs::write(handheld.join("memos").join("Shopping.txt"), "milk, eggs, coffee").unwrap();
    println!("Both sides edited Shopping\n");

    let mut engine = engine(pc, handheld, state);
    engine.set_conflict_policy(ConflictPolicy::Escalate);
    engine
        .set_conflict_handler(|conflict| {
            println!(
                "  conflict on {} ({:?} vs {:?}), keeping the handheld copy",
                conflict.label, conflict.local_status, conflict.remote_status
            );
            Some(ConflictChoice::KeepRemote)
        })
        .unwrap();

    let result = engine.run_sync().unwrap();
    report(&result);

    let merged = fs::read_to_string(pc.join("memos").join("Shopping.txt")).unwrap();
    println!("PC now holds: {}", merged);
}
