use crate::store::StateStore;
use chainseek_scanner::crawler::{DEFAULT_MAX_DEPTH, DEFAULT_WORKERS};
use chainseek_scanner::{
    ChainFetcher, CrawlEngine, CrawlState, CrawlSummary, DedupPolicy, IdentityResolver,
    KeywordMatcher, MatchCallback, MatchRecord, Pacing, ProgressCallback, ScanError, ScheduleMode,
};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Options for configuring a search run
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub seed_handle: String,
    pub keywords: Vec<String>,
    pub max_depth: usize,
    pub mode: ScheduleMode,
    pub workers: usize,
    pub pacing: Pacing,
    pub dedup: DedupPolicy,
    pub show_progress_bars: bool,
}

impl SearchOptions {
    pub fn new(seed_handle: impl Into<String>, keywords: Vec<String>) -> Self {
        Self {
            seed_handle: seed_handle.into(),
            keywords,
            max_depth: DEFAULT_MAX_DEPTH,
            mode: ScheduleMode::default(),
            workers: DEFAULT_WORKERS,
            pacing: Pacing::default(),
            dedup: DedupPolicy::default(),
            show_progress_bars: false,
        }
    }
}

/// Where the final flush wrote to.
#[derive(Debug, Clone, Default)]
pub struct FlushReport {
    pub state_path: Option<PathBuf>,
    pub snapshots: Vec<PathBuf>,
}

#[derive(Debug)]
pub struct SearchOutcome {
    pub state: CrawlState,
    pub summary: CrawlSummary,
    pub flush: FlushReport,
}

/// Persists the checkpoint and every keyword snapshot. Failures are logged
/// and skipped so the remaining writes still happen.
pub fn flush_state(
    store: &dyn StateStore,
    seed_handle: &str,
    keywords: &[String],
    state: &CrawlState,
) -> FlushReport {
    let mut report = FlushReport::default();

    match store.save(seed_handle, state) {
        Ok(path) => report.state_path = Some(path),
        Err(e) => error!("Failed to save search state for @{}: {}", seed_handle, e),
    }

    for keyword in keywords {
        match store.save_matches_for_keyword(keyword, state.matches().records()) {
            Ok(Some(path)) => report.snapshots.push(path),
            Ok(None) => info!("No matches found for '{}', nothing to save", keyword),
            Err(e) => error!("Failed to save matches for '{}': {}", keyword, e),
        }
    }

    report
}

fn progress_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message("Starting search...");
    pb
}

/// Announcement printed when a new match is recorded.
pub fn format_match(record: &MatchRecord) -> String {
    format!(
        "{} '{}': @{} - {} (id {}) via @{} at depth {}",
        "FOUND MATCH for".green().bold(),
        record.matched_keyword.bright_white(),
        record.handle.bright_white().bold(),
        record.display_name,
        record.node_id,
        record.found_via_handle,
        record.depth
    )
}

/// Execute a search with the given options.
///
/// The previous checkpoint for the seed is loaded from `store`, the crawl
/// runs until it completes or `cancel` fires, and the accumulated state is
/// flushed exactly once before returning, whatever the exit path. Errors
/// from the crawl itself are returned only after that flush.
pub async fn execute_search(
    options: SearchOptions,
    resolver: Arc<dyn IdentityResolver>,
    fetcher: Arc<dyn ChainFetcher>,
    store: &dyn StateStore,
    cancel: CancellationToken,
    match_callback: Option<MatchCallback>,
) -> Result<SearchOutcome, ScanError> {
    let SearchOptions {
        seed_handle,
        keywords,
        max_depth,
        mode,
        workers,
        pacing,
        dedup,
        show_progress_bars,
    } = options;

    let seed_handle = seed_handle.trim().to_string();
    if seed_handle.is_empty() {
        return Err(ScanError::InvalidConfig("seed handle must not be empty".to_string()));
    }
    if workers == 0 {
        return Err(ScanError::InvalidConfig("worker count must be at least 1".to_string()));
    }
    let keywords: Vec<String> = KeywordMatcher::new(&keywords)?
        .keywords()
        .map(str::to_string)
        .collect();

    let state = Arc::new(Mutex::new(store.load(&seed_handle).with_dedup_policy(dedup)));

    let progress_bar = show_progress_bars.then(|| Arc::new(progress_spinner()));
    let visited_count = Arc::new(AtomicUsize::new(0));
    let match_count = Arc::new(AtomicUsize::new(0));

    let mut engine = CrawlEngine::new(resolver, fetcher, state.clone())
        .with_max_depth(max_depth)
        .with_mode(mode)
        .with_workers(workers)
        .with_pacing(pacing)
        .with_cancellation(cancel.clone());

    if let Some(ref pb) = progress_bar {
        let pb_clone = pb.clone();
        let visited_clone = visited_count.clone();
        let matches_clone = match_count.clone();
        let progress: ProgressCallback = Arc::new(move |depth: usize, handle: String| {
            let visited = visited_clone.fetch_add(1, Ordering::Relaxed) + 1;
            pb_clone.set_message(format!(
                "Searching @{} (depth {})... {} profiles visited, {} matches",
                handle,
                depth,
                visited,
                matches_clone.load(Ordering::Relaxed)
            ));
        });
        engine = engine.with_progress_callback(progress);
    }

    let pb_clone = progress_bar.clone();
    let matches_clone = match_count.clone();
    let announce: MatchCallback = Arc::new(move |record: MatchRecord| {
        matches_clone.fetch_add(1, Ordering::Relaxed);
        if let Some(ref pb) = pb_clone {
            pb.println(format_match(&record));
        }
        if let Some(ref callback) = match_callback {
            callback(record);
        }
    });
    engine = engine.with_match_callback(announce);

    info!(
        "Starting search from @{} for keywords: {}",
        seed_handle,
        keywords.join(", ")
    );

    // Run on its own task so a panic inside the crawl still reaches the flush below.
    let crawl = {
        let engine = engine.clone();
        let seed_handle = seed_handle.clone();
        let keywords = keywords.clone();
        tokio::spawn(async move { engine.explore(&seed_handle, keywords.as_slice()).await })
    };
    let result = match crawl.await {
        Ok(result) => result,
        Err(e) => Err(ScanError::JoinError(e)),
    };

    let final_state = state.lock().await.clone();
    let flush = flush_state(store, &seed_handle, &keywords, &final_state);

    if let Some(ref pb) = progress_bar {
        let message = if cancel.is_cancelled() {
            format!(
                "Search interrupted! {} profiles visited, {} matches saved",
                visited_count.load(Ordering::Relaxed),
                final_state.matches().len()
            )
        } else {
            format!(
                "Search complete! {} profiles visited, {} matches total",
                visited_count.load(Ordering::Relaxed),
                final_state.matches().len()
            )
        };
        pb.finish_with_message(message);
    }

    let summary = result?;
    Ok(SearchOutcome {
        state: final_state,
        summary,
        flush,
    })
}
