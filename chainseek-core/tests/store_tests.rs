// Tests for checkpoint persistence

use chainseek_core::store::{JsonStateStore, StateStore};
use chainseek_scanner::{CrawlState, MatchRecord, NodeId};
use std::fs;
use tempfile::TempDir;

fn store_in(dir: &TempDir) -> JsonStateStore {
    JsonStateStore::new(dir.path().join("state"), dir.path().join("results"))
}

fn record(node: &str, handle: &str, keyword: &str) -> MatchRecord {
    MatchRecord {
        node_id: NodeId::from(node),
        handle: handle.to_string(),
        display_name: format!("{} display", handle),
        found_via_handle: "victim".to_string(),
        found_via_node_id: NodeId::from("victim_id"),
        depth: 0,
        matched_keyword: keyword.to_string(),
    }
}

fn sample_state(seed: &str) -> CrawlState {
    let mut state = CrawlState::new(seed);
    state.mark_visited(NodeId::from("victim_id"));
    state.mark_visited(NodeId::from("n1"));
    state.record_match(record("n1", "techguy", "tech"));
    state.record_match(record("n5", "codingqueen", "coding"));
    state.record_match(record("n6", "techcoder", "tech"));
    state
}

// ============================================================================
// load / save
// ============================================================================

#[test]
fn test_load_without_record_is_empty() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    let state = store.load("victim");

    assert_eq!(state.seed_handle(), "victim");
    assert!(state.visited().is_empty());
    assert!(state.matches().is_empty());
}

#[test]
fn test_save_then_load_round_trips() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let state = sample_state("victim");

    let path = store.save("victim", &state).unwrap();
    assert_eq!(path, store.state_path("victim"));

    let loaded = store.load("victim");
    assert_eq!(loaded.visited(), state.visited());
    assert_eq!(loaded.matches().records(), state.matches().records());
}

#[test]
fn test_saved_record_layout() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.save("victim", &sample_state("victim")).unwrap();

    let raw = fs::read_to_string(store.state_path("victim")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();

    assert_eq!(json["initial_username"], "victim");
    assert_eq!(json["visited"], serde_json::json!(["victim_id", "n1"]));
    assert_eq!(json["found_matches"].as_array().unwrap().len(), 3);
    assert_eq!(json["found_matches"][0]["username"], "techguy");
    assert!(json["saved_at"].is_string());
}

#[test]
fn test_save_overwrites_previous_record() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    store.save("victim", &sample_state("victim")).unwrap();
    let mut bigger = sample_state("victim");
    bigger.mark_visited(NodeId::from("n2"));
    store.save("victim", &bigger).unwrap();
    store.save("victim", &bigger).unwrap();

    let loaded = store.load("victim");
    assert_eq!(loaded.visited().len(), 3);
    assert_eq!(loaded.matches().len(), 3);
}

#[test]
fn test_legacy_record_with_numeric_ids_loads() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    fs::create_dir_all(store.state_dir()).unwrap();
    fs::write(
        store.state_path("victim"),
        r#"{
            "visited": ["111", 222],
            "found_matches": [{
                "username": "techguy",
                "full_name": "Tech Guy",
                "user_id": 333,
                "found_via_username": "victim",
                "found_via_user_id": "111",
                "depth_found": 0,
                "matched_keyword": "tech"
            }],
            "initial_username": "victim"
        }"#,
    )
    .unwrap();

    let loaded = store.load("victim");

    assert!(loaded.is_visited(&NodeId::from("222")));
    assert_eq!(loaded.matches().records()[0].node_id, NodeId::from("333"));
}

// ============================================================================
// Degraded loads
// ============================================================================

#[test]
fn test_seed_mismatch_yields_empty_state() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    // "a.lice" and "alice" sanitize to the same file name.
    store.save("a.lice", &sample_state("a.lice")).unwrap();
    assert_eq!(store.state_path("a.lice"), store.state_path("alice"));

    let loaded = store.load("alice");

    assert_eq!(loaded.seed_handle(), "alice");
    assert!(loaded.visited().is_empty());
    assert!(loaded.matches().is_empty());
    // The other seed's record is left alone.
    assert!(store.state_path("alice").exists());
    assert_eq!(store.load("a.lice").visited().len(), 2);
}

#[test]
fn test_foreign_seed_written_under_requested_path_is_ignored() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    fs::create_dir_all(store.state_dir()).unwrap();
    fs::write(
        store.state_path("bob"),
        r#"{"initial_username": "alice", "visited": ["x"], "found_matches": []}"#,
    )
    .unwrap();

    let loaded = store.load("bob");

    assert!(loaded.visited().is_empty());
}

#[test]
fn test_corrupt_record_is_discarded() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    fs::create_dir_all(store.state_dir()).unwrap();
    let path = store.state_path("victim");
    fs::write(&path, "{ \"visited\": [\"a\", ").unwrap();

    let loaded = store.load("victim");

    assert!(loaded.visited().is_empty());
    assert!(!path.exists(), "corrupt state file should be removed");

    // A fresh save works afterwards.
    store.save("victim", &sample_state("victim")).unwrap();
    assert_eq!(store.load("victim").visited().len(), 2);
}

// ============================================================================
// Keyword snapshots
// ============================================================================

#[test]
fn test_keyword_snapshot_contains_only_that_keyword() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let state = sample_state("victim");

    let path = store
        .save_matches_for_keyword("tech", state.matches().records())
        .unwrap()
        .expect("tech has matches");

    assert_eq!(path, dir.path().join("results/tech/tech_matches.json"));
    let saved: Vec<MatchRecord> = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(saved.len(), 2);
    assert!(saved.iter().all(|m| m.matched_keyword == "tech"));
    assert_eq!(saved[0].handle, "techguy");
    assert_eq!(saved[1].handle, "techcoder");
}

#[test]
fn test_keyword_snapshot_uses_lowercased_directory() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let records = vec![record("n9", "bigjohn", "John Doe")];

    let path = store
        .save_matches_for_keyword("John Doe", &records)
        .unwrap()
        .unwrap();

    assert_eq!(path, dir.path().join("results/john doe/john doe_matches.json"));
}

#[test]
fn test_keyword_snapshot_without_matches_is_noop() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let state = sample_state("victim");

    let result = store
        .save_matches_for_keyword("design", state.matches().records())
        .unwrap();

    assert!(result.is_none());
    assert!(!dir.path().join("results/design").exists());
}

#[test]
fn test_clear_removes_record() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.save("victim", &sample_state("victim")).unwrap();

    assert!(store.clear("victim").unwrap());
    assert!(!store.clear("victim").unwrap());
    assert!(store.load("victim").visited().is_empty());
}

#[test]
fn test_init_creates_directories() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    store.init().unwrap();

    assert!(store.state_dir().is_dir());
    assert!(store.results_dir().is_dir());
}
