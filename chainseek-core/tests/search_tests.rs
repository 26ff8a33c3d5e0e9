// Tests for search orchestration: resume, flush-on-exit and cancellation

use async_trait::async_trait;
use chainseek_core::search::{SearchOptions, execute_search};
use chainseek_core::store::{JsonStateStore, StateStore, StoreError};
use chainseek_scanner::error::Result as ScanResult;
use chainseek_scanner::{
    ChainFetcher, CrawlState, IdentityResolver, MatchRecord, NeighborDescriptor, NodeId, Pacing,
    ScanError, ScheduleMode,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct FakeGraph {
    handles: HashMap<String, NodeId>,
    edges: HashMap<NodeId, Vec<NeighborDescriptor>>,
    panics_on: Option<NodeId>,
    fetched: Mutex<Vec<NodeId>>,
}

impl FakeGraph {
    fn handle(mut self, handle: &str, id: &str) -> Self {
        self.handles.insert(handle.to_string(), NodeId::from(id));
        self
    }

    fn edges(mut self, from: &str, to: &[(&str, &str, &str)]) -> Self {
        self.edges.insert(
            NodeId::from(from),
            to.iter()
                .map(|(id, handle, name)| NeighborDescriptor::new(*id, *handle, *name))
                .collect(),
        );
        self
    }

    fn fetched(&self) -> Vec<NodeId> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityResolver for FakeGraph {
    async fn resolve(&self, handle: &str) -> ScanResult<NodeId> {
        self.handles
            .get(handle)
            .cloned()
            .ok_or_else(|| ScanError::NotFound(handle.to_string()))
    }
}

#[async_trait]
impl ChainFetcher for FakeGraph {
    async fn fetch(&self, node_id: &NodeId) -> ScanResult<Vec<NeighborDescriptor>> {
        if self.panics_on.as_ref() == Some(node_id) {
            panic!("fetcher blew up on {}", node_id);
        }
        self.fetched.lock().unwrap().push(node_id.clone());
        Ok(self.edges.get(node_id).cloned().unwrap_or_default())
    }
}

fn options(seed: &str, keywords: &[&str], max_depth: usize, mode: ScheduleMode) -> SearchOptions {
    let mut options = SearchOptions::new(seed, keywords.iter().map(|k| k.to_string()).collect());
    options.max_depth = max_depth;
    options.mode = mode;
    options.pacing = Pacing::none();
    options
}

fn store_in(dir: &TempDir) -> JsonStateStore {
    JsonStateStore::new(dir.path().join("state"), dir.path().join("results"))
}

fn victim_graph() -> FakeGraph {
    FakeGraph::default().handle("victim", "victim_id").edges(
        "victim_id",
        &[("n1", "techguy", "Tech Guy"), ("n2", "plainuser", "Plain User")],
    )
}

#[tokio::test]
async fn test_search_persists_state_and_snapshots() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let graph = Arc::new(victim_graph());

    let outcome = execute_search(
        options("victim", &["tech", "coding"], 1, ScheduleMode::Concurrent),
        graph.clone(),
        graph.clone(),
        &store,
        CancellationToken::new(),
        None,
    )
    .await
    .unwrap();

    assert_eq!(outcome.summary.new_matches, 1);
    assert_eq!(outcome.flush.state_path, Some(store.state_path("victim")));
    assert_eq!(outcome.flush.snapshots, vec![store.snapshot_path("tech")]);
    assert!(!store.snapshot_path("coding").exists());

    let reloaded = store.load("victim");
    assert_eq!(reloaded.visited().len(), 3);
    assert_eq!(reloaded.matches().records(), outcome.state.matches().records());
}

#[tokio::test]
async fn test_resume_does_not_refetch_visited_nodes() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let graph = Arc::new(
        FakeGraph::default()
            .handle("s", "S")
            .edges("S", &[("A", "a", "A"), ("B", "b", "B"), ("C", "c_tech", "C")])
            .edges("A", &[("X", "x_tech", "X")])
            .edges("C", &[("D", "d_tech", "D")]),
    );

    let m1 = MatchRecord {
        node_id: NodeId::from("OLD"),
        handle: "old_tech".to_string(),
        display_name: "Old".to_string(),
        found_via_handle: "a".to_string(),
        found_via_node_id: NodeId::from("A"),
        depth: 1,
        matched_keyword: "tech".to_string(),
    };
    let prior = CrawlState::restore("s", vec![NodeId::from("A"), NodeId::from("B")], vec![m1.clone()]);
    store.save("s", &prior).unwrap();

    execute_search(
        options("s", &["tech"], 2, ScheduleMode::Sequential),
        graph.clone(),
        graph.clone(),
        &store,
        CancellationToken::new(),
        None,
    )
    .await
    .unwrap();

    let fetched = graph.fetched();
    assert!(!fetched.contains(&NodeId::from("A")));
    assert!(!fetched.contains(&NodeId::from("B")));
    assert!(fetched.contains(&NodeId::from("C")));

    let persisted = store.load("s");
    let records = persisted.matches().records();
    assert_eq!(records[0], m1);
    assert!(records.iter().any(|m| m.handle == "c_tech"));
    assert!(records.iter().any(|m| m.handle == "d_tech"));
    assert!(!records.iter().any(|m| m.handle == "x_tech"));
}

#[tokio::test]
async fn test_cancelled_search_still_flushes() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let graph = Arc::new(victim_graph());
    let token = CancellationToken::new();
    token.cancel();

    let outcome = execute_search(
        options("victim", &["tech"], 3, ScheduleMode::Concurrent),
        graph.clone(),
        graph.clone(),
        &store,
        token,
        None,
    )
    .await
    .unwrap();

    assert!(outcome.summary.cancelled);
    assert!(graph.fetched().is_empty());
    assert!(store.state_path("victim").exists());
}

#[tokio::test]
async fn test_empty_keywords_rejected_without_touching_state() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let graph = Arc::new(victim_graph());

    let result = execute_search(
        options("victim", &["  ", ""], 1, ScheduleMode::Concurrent),
        graph.clone(),
        graph.clone(),
        &store,
        CancellationToken::new(),
        None,
    )
    .await;

    assert!(matches!(result, Err(ScanError::InvalidConfig(_))));
    assert!(!store.state_path("victim").exists());

    let result = execute_search(
        options("   ", &["tech"], 1, ScheduleMode::Concurrent),
        graph.clone(),
        graph.clone(),
        &store,
        CancellationToken::new(),
        None,
    )
    .await;
    assert!(matches!(result, Err(ScanError::InvalidConfig(_))));
}

#[tokio::test]
async fn test_crash_is_reported_after_flush() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let mut graph = victim_graph();
    graph.panics_on = Some(NodeId::from("n1"));
    let graph = Arc::new(graph);

    let result = execute_search(
        options("victim", &["tech"], 1, ScheduleMode::Sequential),
        graph.clone(),
        graph.clone(),
        &store,
        CancellationToken::new(),
        None,
    )
    .await;

    assert!(matches!(result, Err(ScanError::JoinError(_))));
    let persisted = store.load("victim");
    assert!(persisted.is_visited(&NodeId::from("victim_id")));
    assert_eq!(persisted.matches().len(), 1);
    assert!(store.snapshot_path("tech").exists());
}

#[tokio::test]
async fn test_branch_panic_in_concurrent_mode_is_contained() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let mut graph = victim_graph().edges("n2", &[("n3", "techie", "Techie")]);
    graph.panics_on = Some(NodeId::from("n1"));
    let graph = Arc::new(graph);

    let outcome = execute_search(
        options("victim", &["tech"], 2, ScheduleMode::Concurrent),
        graph.clone(),
        graph.clone(),
        &store,
        CancellationToken::new(),
        None,
    )
    .await
    .unwrap();

    assert_eq!(outcome.summary.leaf_failures, 1);
    assert!(graph.fetched().contains(&NodeId::from("n3")));
    assert_eq!(outcome.state.matches().len(), 2);
}

#[tokio::test]
async fn test_match_callback_sees_new_matches() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let graph = Arc::new(victim_graph());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();

    execute_search(
        options("victim", &["tech", "plain"], 0, ScheduleMode::Sequential),
        graph.clone(),
        graph.clone(),
        &store,
        CancellationToken::new(),
        Some(Arc::new(move |record: MatchRecord| {
            seen_clone.lock().unwrap().push(record.matched_keyword);
        })),
    )
    .await
    .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec!["tech".to_string(), "plain".to_string()]);
}

/// Store whose checkpoint writes always fail; snapshots go to disk.
struct ReadOnlyCheckpoints {
    inner: JsonStateStore,
    snapshot_calls: Mutex<Vec<String>>,
}

impl StateStore for ReadOnlyCheckpoints {
    fn load(&self, seed_handle: &str) -> CrawlState {
        self.inner.load(seed_handle)
    }

    fn save(&self, seed_handle: &str, _state: &CrawlState) -> Result<PathBuf, StoreError> {
        Err(StoreError::Io {
            path: self.inner.state_path(seed_handle),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        })
    }

    fn save_matches_for_keyword(
        &self,
        keyword: &str,
        matches: &[MatchRecord],
    ) -> Result<Option<PathBuf>, StoreError> {
        self.snapshot_calls.lock().unwrap().push(keyword.to_string());
        self.inner.save_matches_for_keyword(keyword, matches)
    }

    fn clear(&self, seed_handle: &str) -> Result<bool, StoreError> {
        self.inner.clear(seed_handle)
    }
}

#[tokio::test]
async fn test_failed_checkpoint_write_keeps_progress_and_snapshots() {
    let dir = TempDir::new().unwrap();
    let store = ReadOnlyCheckpoints {
        inner: store_in(&dir),
        snapshot_calls: Mutex::new(Vec::new()),
    };
    let graph = Arc::new(victim_graph());

    let outcome = execute_search(
        options("victim", &["tech", "plain"], 1, ScheduleMode::Concurrent),
        graph.clone(),
        graph.clone(),
        &store,
        CancellationToken::new(),
        None,
    )
    .await
    .unwrap();

    assert_eq!(outcome.flush.state_path, None);
    assert_eq!(outcome.state.visited().len(), 3);
    assert_eq!(outcome.state.matches().len(), 2);
    assert_eq!(
        *store.snapshot_calls.lock().unwrap(),
        vec!["tech".to_string(), "plain".to_string()]
    );
    assert_eq!(outcome.flush.snapshots.len(), 2);
    assert!(store.inner.snapshot_path("tech").exists());
    assert!(!store.inner.state_path("victim").exists());
}

#[tokio::test]
async fn test_zero_workers_rejected() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let graph = Arc::new(victim_graph());
    let mut opts = options("victim", &["tech"], 1, ScheduleMode::Concurrent);
    opts.workers = 0;

    let result = execute_search(opts, graph.clone(), graph.clone(), &store, CancellationToken::new(), None).await;

    assert!(matches!(result, Err(ScanError::InvalidConfig(_))));
    assert!(graph.fetched().is_empty());
    assert!(!store.state_path("victim").exists());
}
