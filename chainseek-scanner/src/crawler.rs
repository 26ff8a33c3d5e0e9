use crate::error::{Result, ScanError};
use crate::fetch::{ChainFetcher, IdentityResolver};
use crate::matcher::KeywordMatcher;
use crate::result::{MatchRecord, NeighborDescriptor, NodeId};
use crate::state::CrawlState;
use futures::FutureExt;
use futures::future::BoxFuture;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Called with `(depth, handle)` whenever a node is about to be fetched.
pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;
/// Called once for every newly recorded match.
pub type MatchCallback = Arc<dyn Fn(MatchRecord) + Send + Sync>;

/// State handle shared between the engine's branches and whoever has to
/// flush it on exit.
pub type SharedState = Arc<Mutex<CrawlState>>;

pub const DEFAULT_MAX_DEPTH: usize = 2;
pub const DEFAULT_WORKERS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScheduleMode {
    /// Depth-first, one branch at a time, paced between siblings.
    Sequential,
    /// Children of a node are explored concurrently; the parent waits for all.
    #[default]
    Concurrent,
}

impl ScheduleMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sequential" | "seq" => Some(ScheduleMode::Sequential),
            "concurrent" | "async" => Some(ScheduleMode::Concurrent),
            _ => None,
        }
    }
}

/// Randomized delay drawn uniformly from `[min, max]` before each child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    min: Duration,
    max: Duration,
}

impl Pacing {
    pub fn new(min: Duration, max: Duration) -> Result<Self> {
        if min > max {
            return Err(ScanError::InvalidConfig(format!(
                "pacing minimum {:?} exceeds maximum {:?}",
                min, max
            )));
        }
        Ok(Self { min, max })
    }

    pub fn none() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    fn sample(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let mut rng = rand::thread_rng();
        let millis = rng.gen_range(self.min.as_millis() as u64..=self.max.as_millis() as u64);
        Duration::from_millis(millis)
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(1000),
            max: Duration::from_millis(2000),
        }
    }
}

#[derive(Debug, Default)]
struct CrawlStats {
    nodes_visited: AtomicUsize,
    chains_fetched: AtomicUsize,
    leaf_failures: AtomicUsize,
    new_matches: AtomicUsize,
}

/// Counters for one `explore` run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlSummary {
    pub nodes_visited: usize,
    pub chains_fetched: usize,
    pub leaf_failures: usize,
    pub new_matches: usize,
    pub cancelled: bool,
}

/// One pending exploration: a handle, possibly its already-known id, and the
/// depth it was reached at.
#[derive(Debug, Clone)]
struct Task {
    handle: String,
    known_id: Option<NodeId>,
    depth: usize,
}

impl Task {
    fn child(neighbor: &NeighborDescriptor, id: &NodeId, depth: usize) -> Self {
        Self {
            handle: neighbor.handle.clone(),
            known_id: Some(id.clone()),
            depth,
        }
    }
}

/// Depth-bounded explorer of the suggestion graph.
///
/// Cloning is cheap: every field is shared, so spawned branches hold their
/// own handle on the same state, limiter and counters.
#[derive(Clone)]
pub struct CrawlEngine {
    resolver: Arc<dyn IdentityResolver>,
    fetcher: Arc<dyn ChainFetcher>,
    state: SharedState,
    max_depth: usize,
    mode: ScheduleMode,
    pacing: Pacing,
    limiter: Arc<Semaphore>,
    cancel: CancellationToken,
    stats: Arc<CrawlStats>,
    progress_callback: Option<ProgressCallback>,
    match_callback: Option<MatchCallback>,
}

impl CrawlEngine {
    pub fn new(
        resolver: Arc<dyn IdentityResolver>,
        fetcher: Arc<dyn ChainFetcher>,
        state: SharedState,
    ) -> Self {
        Self {
            resolver,
            fetcher,
            state,
            max_depth: DEFAULT_MAX_DEPTH,
            mode: ScheduleMode::default(),
            pacing: Pacing::default(),
            limiter: Arc::new(Semaphore::new(DEFAULT_WORKERS)),
            cancel: CancellationToken::new(),
            stats: Arc::new(CrawlStats::default()),
            progress_callback: None,
            match_callback: None,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_mode(mut self, mode: ScheduleMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Caps the number of resolve/fetch calls in flight at once.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.limiter = Arc::new(Semaphore::new(workers.max(1)));
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn with_match_callback(mut self, callback: MatchCallback) -> Self {
        self.match_callback = Some(callback);
        self
    }

    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Explores the graph from `seed_handle`, recording matches for
    /// `keywords` into the shared state.
    ///
    /// Per-node failures never surface here; only an unusable keyword set
    /// does.
    pub async fn explore<S: AsRef<str>>(&self, seed_handle: &str, keywords: &[S]) -> Result<CrawlSummary> {
        let matcher = Arc::new(KeywordMatcher::new(keywords.iter().map(|k| k.as_ref()))?);
        let root = Task {
            handle: seed_handle.to_string(),
            known_id: None,
            depth: 0,
        };

        info!(
            "Exploring chains from @{} for {} keyword(s), max depth {} ({:?})",
            seed_handle,
            matcher.len(),
            self.max_depth,
            self.mode
        );

        match self.mode {
            ScheduleMode::Sequential => self.explore_sequential(&matcher, root).await,
            ScheduleMode::Concurrent => self.clone().explore_concurrent(matcher, root).await,
        }

        let summary = self.summary();
        if summary.cancelled {
            warn!("Exploration from @{} interrupted", seed_handle);
        } else {
            info!(
                "Exploration from @{} complete: {} visited, {} new match(es)",
                seed_handle, summary.nodes_visited, summary.new_matches
            );
        }
        Ok(summary)
    }

    pub fn summary(&self) -> CrawlSummary {
        CrawlSummary {
            nodes_visited: self.stats.nodes_visited.load(Ordering::Relaxed),
            chains_fetched: self.stats.chains_fetched.load(Ordering::Relaxed),
            leaf_failures: self.stats.leaf_failures.load(Ordering::Relaxed),
            new_matches: self.stats.new_matches.load(Ordering::Relaxed),
            cancelled: self.cancel.is_cancelled(),
        }
    }

    async fn explore_sequential(&self, matcher: &KeywordMatcher, root: Task) {
        let mut stack = vec![root];

        while let Some(task) = stack.pop() {
            if self.cancel.is_cancelled() {
                break;
            }
            if task.depth > 0 && !self.pace().await {
                break;
            }
            let children = self.visit(matcher, &task).await;
            // Reversed so the first neighbor is explored first.
            stack.extend(children.into_iter().rev());
        }
    }

    fn explore_concurrent(self, matcher: Arc<KeywordMatcher>, task: Task) -> BoxFuture<'static, ()> {
        async move {
            let children = self.visit(&matcher, &task).await;
            if children.is_empty() {
                return;
            }

            debug!(depth = task.depth, "Fanning out {} branch(es) from @{}", children.len(), task.handle);
            let mut branches = JoinSet::new();
            for child in children {
                // Launches are staggered; a branch starts only after its pause.
                if !self.pace().await {
                    break;
                }
                let engine = self.clone();
                let matcher = matcher.clone();
                branches.spawn(engine.explore_concurrent(matcher, child));
            }

            while let Some(joined) = branches.join_next().await {
                if let Err(e) = joined {
                    warn!("Branch under @{} failed: {}", task.handle, e);
                    self.stats.leaf_failures.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        .boxed()
    }

    /// Sleeps for one pacing interval. Returns `false` if cancelled meanwhile.
    async fn pace(&self) -> bool {
        let delay = self.pacing.sample();
        if delay.is_zero() {
            return !self.cancel.is_cancelled();
        }
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    /// Explores one node and returns the tasks for its children.
    async fn visit(&self, matcher: &KeywordMatcher, task: &Task) -> Vec<Task> {
        let depth = task.depth;
        let handle = task.handle.as_str();

        if depth > self.max_depth {
            debug!(depth, "Depth limit {} reached at @{}", self.max_depth, handle);
            return Vec::new();
        }
        if self.cancel.is_cancelled() {
            return Vec::new();
        }

        let node_id = match &task.known_id {
            Some(id) => id.clone(),
            None => match self.resolve(handle).await {
                Ok(id) => id,
                Err(ScanError::Cancelled) => return Vec::new(),
                Err(e) => {
                    warn!(depth, handle = %handle, "Could not resolve @{}: {}", handle, e);
                    self.stats.leaf_failures.fetch_add(1, Ordering::Relaxed);
                    return Vec::new();
                }
            },
        };

        if !self.state.lock().await.mark_visited(node_id.clone()) {
            debug!(depth, node_id = %node_id, handle = %handle, "Already visited @{}, skipping", handle);
            return Vec::new();
        }
        self.stats.nodes_visited.fetch_add(1, Ordering::Relaxed);

        if let Some(ref callback) = self.progress_callback {
            callback(depth, handle.to_string());
        }
        info!(depth, node_id = %node_id, handle = %handle, "Searching chain of @{}", handle);

        let neighbors = match self.fetch(&node_id).await {
            Ok(neighbors) => neighbors,
            Err(ScanError::Cancelled) => return Vec::new(),
            Err(e) => {
                warn!(depth, node_id = %node_id, handle = %handle, "Failed to fetch chain of @{}: {}", handle, e);
                self.stats.leaf_failures.fetch_add(1, Ordering::Relaxed);
                return Vec::new();
            }
        };
        self.stats.chains_fetched.fetch_add(1, Ordering::Relaxed);

        if neighbors.is_empty() {
            info!(depth, "No suggestions for @{}", handle);
            return Vec::new();
        }

        let valid: Vec<(&NeighborDescriptor, &NodeId)> = neighbors
            .iter()
            .filter_map(|n| match n.valid_id() {
                Some(id) => Some((n, id)),
                None => {
                    warn!(depth, "Skipping suggestion with missing handle or id: {:?}", n);
                    None
                }
            })
            .collect();

        let found = self.match_pass(matcher, &valid, handle, &node_id, depth).await;
        for record in found {
            info!(
                keyword = %record.matched_keyword,
                "Found match: @{} ({}) via @{} at depth {}",
                record.handle, record.display_name, record.found_via_handle, record.depth
            );
            if let Some(ref callback) = self.match_callback {
                callback(record);
            }
        }

        if depth < self.max_depth {
            valid
                .into_iter()
                .map(|(neighbor, id)| Task::child(neighbor, id, depth + 1))
                .collect()
        } else {
            debug!(depth, "Max depth reached at @{}, not going deeper", handle);
            Vec::new()
        }
    }

    async fn match_pass(
        &self,
        matcher: &KeywordMatcher,
        neighbors: &[(&NeighborDescriptor, &NodeId)],
        via_handle: &str,
        via_id: &NodeId,
        depth: usize,
    ) -> Vec<MatchRecord> {
        let mut found = Vec::new();
        let mut state = self.state.lock().await;

        for (neighbor, id) in neighbors {
            debug!(depth, "-> @{} - {} ({})", neighbor.handle, neighbor.display_name, id);
            for keyword in matcher.matching(&neighbor.handle, &neighbor.display_name) {
                let record = MatchRecord {
                    node_id: (*id).clone(),
                    handle: neighbor.handle.clone(),
                    display_name: neighbor.display_name.clone(),
                    found_via_handle: via_handle.to_string(),
                    found_via_node_id: via_id.clone(),
                    depth,
                    matched_keyword: keyword.to_string(),
                };
                if state.record_match(record.clone()) {
                    found.push(record);
                }
            }
        }

        self.stats.new_matches.fetch_add(found.len(), Ordering::Relaxed);
        found
    }

    async fn resolve(&self, handle: &str) -> Result<NodeId> {
        let _permit = self.limiter.acquire().await.map_err(|_| ScanError::Cancelled)?;
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ScanError::Cancelled),
            resolved = self.resolver.resolve(handle) => resolved,
        }
    }

    async fn fetch(&self, node_id: &NodeId) -> Result<Vec<NeighborDescriptor>> {
        let _permit = self.limiter.acquire().await.map_err(|_| ScanError::Cancelled)?;
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ScanError::Cancelled),
            fetched = self.fetcher.fetch(node_id) => fetched,
        }
    }
}
