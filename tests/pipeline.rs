//! End-to-end mutation pipeline coverage over a real log file.

use std::fs;

use serde_json::json;
use tempfile::TempDir;

use planlog::store::ItemDraft;
use planlog::{DepEdge, ItemId, PlanStore, Status, StoreConfig};

fn store_in(dir: &TempDir) -> PlanStore {
    PlanStore::new(StoreConfig::new(dir.path().join("plan.jsonl")))
}

fn id(raw: &str) -> ItemId {
    ItemId::parse(raw).unwrap()
}

fn log_bytes(store: &PlanStore) -> Vec<u8> {
    fs::read(store.path()).unwrap_or_default()
}

#[test]
fn init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    assert!(store.init().unwrap());
    assert!(!store.init().unwrap());

    let records = store.read_records().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].seq(), Some(1));
}

#[test]
fn full_scenario() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.init().unwrap();

    store
        .add(ItemDraft::new("A").with_id(id("st-001")))
        .unwrap();
    store
        .add(
            ItemDraft::new("B")
                .with_id(id("st-002"))
                .with_deps(vec![DepEdge::blocks(id("st-001"))]),
        )
        .unwrap();

    // Gated: st-001 is not completed yet.
    let before = log_bytes(&store);
    let err = store
        .set_status(&id("st-002"), Status::InProgress)
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("cannot be in_progress"), "{message}");
    assert!(message.contains("unresolved dependencies: st-001"), "{message}");
    assert_eq!(log_bytes(&store), before, "failed mutation must append nothing");

    store.set_status(&id("st-001"), Status::Completed).unwrap();
    store.set_status(&id("st-002"), Status::InProgress).unwrap();

    assert!(store.ready().unwrap().is_empty());
    let counts = store.counts().unwrap();
    assert_eq!(counts.completed, 1);
    assert_eq!(counts.in_progress, 1);
    assert_eq!(counts.pending, 0);
    assert_eq!(counts.total(), 2);
}

#[test]
fn replay_matches_live_projection_after_every_mutation() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.init().unwrap();

    store.add(ItemDraft::new("one")).unwrap();
    let replayed = store.load().unwrap();
    assert_eq!(replayed.len(), 1);

    store
        .add(ItemDraft::new("two").with_deps(vec![DepEdge::blocks(id("pl-001"))]))
        .unwrap();
    store.set_notes(&id("pl-001"), "first of the pair").unwrap();
    store.set_status(&id("pl-001"), Status::Completed).unwrap();
    store
        .add_comment(&id("pl-002"), Some("tester"), "unblocked now")
        .unwrap();

    let state = store.load_validated().unwrap();
    let ids: Vec<&str> = state.ids().map(ItemId::as_str).collect();
    assert_eq!(ids, ["pl-001", "pl-002"]);
    assert_eq!(state.get(&id("pl-001")).unwrap().notes, "first of the pair");
    assert_eq!(state.get(&id("pl-002")).unwrap().comments.len(), 1);

    // Removing and re-reading still replays cleanly.
    store.remove(&id("pl-002")).unwrap();
    assert_eq!(store.load_validated().unwrap().len(), 1);
}

#[test]
fn auto_ids_continue_from_highest() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.init().unwrap();

    let first = store.add(ItemDraft::new("a")).unwrap();
    assert_eq!(first.id.as_str(), "pl-001");

    store
        .add(ItemDraft::new("explicit").with_id(id("st-041")))
        .unwrap();
    let next = store.add(ItemDraft::new("b")).unwrap();
    assert_eq!(next.id.as_str(), "pl-042");
}

#[test]
fn upsert_with_existing_id_overwrites() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.init().unwrap();

    store.add(ItemDraft::new("old").with_id(id("a"))).unwrap();
    store
        .add(
            ItemDraft::new("new")
                .with_id(id("a"))
                .with_status(Status::Blocked),
        )
        .unwrap();

    let state = store.load_validated().unwrap();
    assert_eq!(state.len(), 1);
    let item = state.get(&id("a")).unwrap();
    assert_eq!(item.step, "new");
    assert_eq!(item.status, Status::Blocked);
}

#[test]
fn single_active_item_policy() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.init().unwrap();

    store
        .add(
            ItemDraft::new("a")
                .with_id(id("a"))
                .with_status(Status::InProgress),
        )
        .unwrap();
    store.add(ItemDraft::new("b").with_id(id("b"))).unwrap();

    let err = store.set_status(&id("b"), Status::InProgress).unwrap_err();
    assert!(err.to_string().contains("multiple in_progress items found"));

    let relaxed = PlanStore::new(
        StoreConfig::new(store.path()).with_multiple_in_progress(true),
    );
    relaxed.set_status(&id("b"), Status::InProgress).unwrap();
    assert_eq!(relaxed.counts().unwrap().in_progress, 2);

    // The strict handle now refuses to even load the projection.
    assert!(store.load_validated().is_err());
}

#[test]
fn unknown_id_is_rejected_before_append() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.init().unwrap();

    let before = log_bytes(&store);
    for result in [
        store.set_status(&id("ghost"), Status::Completed),
        store.set_notes(&id("ghost"), "x"),
        store.remove(&id("ghost")),
        store
            .add_comment(&id("ghost"), Some("t"), "text")
            .map(|_| ()),
    ] {
        let err = result.unwrap_err();
        assert!(err.to_string().contains("unknown id 'ghost'"), "{err}");
    }
    assert_eq!(log_bytes(&store), before);
}

#[test]
fn cycle_rejected_through_set_deps() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.init().unwrap();

    store.add(ItemDraft::new("a").with_id(id("a"))).unwrap();
    store
        .add(
            ItemDraft::new("b")
                .with_id(id("b"))
                .with_deps(vec![DepEdge::blocks(id("a"))]),
        )
        .unwrap();
    store
        .add(
            ItemDraft::new("c")
                .with_id(id("c"))
                .with_deps(vec![DepEdge::blocks(id("b"))]),
        )
        .unwrap();

    let err = store
        .set_deps(&id("a"), vec![DepEdge::blocks(id("c"))])
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("dependency cycle detected"), "{message}");
    for node in ["a", "b", "c"] {
        assert!(message.contains(node), "{message} missing {node}");
    }

    // Nothing appended; the projection still validates.
    store.load_validated().unwrap();
}

#[test]
fn self_dependency_rejected() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.init().unwrap();
    store.add(ItemDraft::new("a").with_id(id("a"))).unwrap();

    let err = store
        .set_deps(&id("a"), vec![DepEdge::blocks(id("a"))])
        .unwrap_err();
    assert!(err.to_string().contains("cannot depend on itself"));
}

#[test]
fn import_replace_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.init().unwrap();

    store.add(ItemDraft::new("stale").with_id(id("old"))).unwrap();

    let snapshot = json!({"items": [
        {"id": "x", "step": "the only one", "status": "pending", "deps": []},
    ]});
    for _ in 0..2 {
        assert_eq!(store.import(&snapshot, true).unwrap(), 1);
        let items = store.snapshot().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id.as_str(), "x");
    }
}

#[test]
fn import_merge_upserts_each_item() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.init().unwrap();
    store.add(ItemDraft::new("keep").with_id(id("keep"))).unwrap();

    let snapshot = json!([
        {"id": "new-1", "step": "added", "deps": []},
        {"id": "keep", "step": "rewritten", "deps": []},
    ]);
    assert_eq!(store.import(&snapshot, false).unwrap(), 2);

    let state = store.load_validated().unwrap();
    assert_eq!(state.len(), 2);
    assert_eq!(state.get(&id("keep")).unwrap().step, "rewritten");
}

#[test]
fn import_rejects_invalid_snapshots_without_appending() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.init().unwrap();
    let before = log_bytes(&store);

    // Duplicate ids.
    let err = store
        .import(
            &json!([
                {"id": "a", "step": "x", "deps": []},
                {"id": "a", "step": "y", "deps": []},
            ]),
            true,
        )
        .unwrap_err();
    assert!(err.to_string().contains("duplicate item id"));

    // Items referencing ids missing from the snapshot.
    let err = store
        .import(&json!([{"id": "a", "step": "x", "deps": ["ghost"]}]), true)
        .unwrap_err();
    assert!(err.to_string().contains("unknown dependency 'ghost'"));

    // Missing deps key.
    let err = store
        .import(&json!([{"id": "a", "step": "x"}]), true)
        .unwrap_err();
    assert!(err.to_string().contains("deps must be provided") || err.to_string().contains("deps"));

    assert_eq!(log_bytes(&store), before);
}

#[test]
fn clear_resets_a_populated_plan() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.init().unwrap();
    store
        .add(
            ItemDraft::new("busy")
                .with_id(id("a"))
                .with_status(Status::InProgress),
        )
        .unwrap();

    store.clear().unwrap();
    assert!(store.load_validated().unwrap().is_empty());
}

#[test]
fn checkpoint_appended_at_interval_and_replay_unchanged() {
    let dir = TempDir::new().unwrap();
    let store = PlanStore::new(
        StoreConfig::new(dir.path().join("plan.jsonl")).with_interval(3),
    );
    store.init().unwrap();

    // init + two adds reach the interval; the checkpoint follows the batch.
    store.add(ItemDraft::new("a").with_id(id("a"))).unwrap();
    let before_snapshot = store.snapshot().unwrap();
    assert!(!store.read_records().unwrap().iter().any(|r| r.is_checkpoint()));

    store.add(ItemDraft::new("b").with_id(id("b"))).unwrap();
    let records = store.read_records().unwrap();
    let checkpoints: Vec<_> = records.iter().filter(|r| r.is_checkpoint()).collect();
    assert_eq!(checkpoints.len(), 1);
    assert_eq!(checkpoints[0].seq(), Some(3));

    // Replay (which now starts from the checkpoint) matches the projection.
    let state = store.load_validated().unwrap();
    assert_eq!(state.len(), 2);
    assert_eq!(state.items()[0].step, before_snapshot[0].step);

    // The tail count restarts after a checkpoint.
    store.set_status(&id("a"), Status::Completed).unwrap();
    let records = store.read_records().unwrap();
    assert_eq!(records.iter().filter(|r| r.is_checkpoint()).count(), 1);
}

#[test]
fn comment_author_falls_back_when_blank() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.init().unwrap();
    store.add(ItemDraft::new("a").with_id(id("a"))).unwrap();

    let comment = store.add_comment(&id("a"), Some("  "), "note").unwrap();
    assert!(!comment.author.is_empty());

    let explicit = store.add_comment(&id("a"), Some("alice"), "note").unwrap();
    assert_eq!(explicit.author, "alice");

    let state = store.load_validated().unwrap();
    assert_eq!(state.get(&id("a")).unwrap().comments.len(), 2);
}

#[test]
fn blank_step_rejected() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.init().unwrap();
    assert!(store.add(ItemDraft::new("   ")).is_err());
}

#[test]
fn concurrent_writer_waits_for_the_lock() {
    use planlog::store::LogLock;
    use std::sync::mpsc;
    use std::time::Duration;

    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.init().unwrap();

    let lock = LogLock::acquire(store.path()).unwrap();
    let (tx, rx) = mpsc::channel();
    let path = store.path().to_path_buf();
    let writer = std::thread::spawn(move || {
        let store = PlanStore::open(path);
        let added = store.add(ItemDraft::new("queued behind the lock"));
        tx.send(()).unwrap();
        added
    });

    // The writer must not finish while the lock is held.
    assert!(
        rx.recv_timeout(Duration::from_millis(200)).is_err(),
        "mutation completed while the log was locked"
    );

    drop(lock);
    rx.recv_timeout(Duration::from_secs(5)).unwrap();
    writer.join().unwrap().unwrap();
    assert_eq!(store.load_validated().unwrap().len(), 1);
}
