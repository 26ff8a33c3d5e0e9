//! Checkpoint persistence for search state.
//!
//! One JSON record per seed lives under the state directory; per-keyword
//! match snapshots live under the results directory, one subdirectory per
//! keyword.

use chainseek_scanner::state::filter_by_keyword;
use chainseek_scanner::{CrawlState, MatchRecord, NodeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// On-disk shape of a checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateRecord {
    #[serde(rename = "initial_username", default)]
    pub seed_handle: String,
    #[serde(default)]
    pub visited: Vec<NodeId>,
    #[serde(rename = "found_matches", default)]
    pub matches: Vec<MatchRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl StateRecord {
    pub fn from_state(seed_handle: &str, state: &CrawlState) -> Self {
        Self {
            seed_handle: seed_handle.to_string(),
            visited: state.visited().iter().cloned().collect(),
            matches: state.matches().records().to_vec(),
            saved_at: Some(Utc::now()),
        }
    }

    pub fn into_state(self) -> CrawlState {
        CrawlState::restore(self.seed_handle, self.visited, self.matches)
    }
}

/// Persists and restores crawl checkpoints keyed by seed handle.
pub trait StateStore: Send + Sync {
    /// Never fails: missing, unreadable, corrupt or foreign records all yield
    /// an empty state for `seed_handle`.
    fn load(&self, seed_handle: &str) -> CrawlState;

    /// Overwrites the checkpoint for `seed_handle`.
    fn save(&self, seed_handle: &str, state: &CrawlState) -> Result<PathBuf>;

    /// Writes the matches for `keyword` as a standalone snapshot. Returns
    /// `None` without writing when nothing matched that keyword.
    fn save_matches_for_keyword(
        &self,
        keyword: &str,
        matches: &[MatchRecord],
    ) -> Result<Option<PathBuf>>;

    /// Removes the checkpoint for `seed_handle`, returning whether one existed.
    fn clear(&self, seed_handle: &str) -> Result<bool>;
}

/// Keeps only the alphanumeric characters of a seed handle.
pub fn sanitize_seed(seed_handle: &str) -> String {
    seed_handle.chars().filter(|c| c.is_alphanumeric()).collect()
}

/// Directory/file stem for a keyword snapshot: the lowercased keyword with
/// path separators replaced.
pub fn keyword_dir_name(keyword: &str) -> String {
    let name: String = keyword
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect();

    if name.is_empty() || name == "." || name == ".." {
        "_".to_string()
    } else {
        name
    }
}

/// JSON-file backed `StateStore`.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    state_dir: PathBuf,
    results_dir: PathBuf,
}

impl JsonStateStore {
    pub fn new(state_dir: impl Into<PathBuf>, results_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            results_dir: results_dir.into(),
        }
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    pub fn state_path(&self, seed_handle: &str) -> PathBuf {
        self.state_dir
            .join(format!("search_state_{}.json", sanitize_seed(seed_handle)))
    }

    pub fn snapshot_path(&self, keyword: &str) -> PathBuf {
        let name = keyword_dir_name(keyword);
        self.results_dir
            .join(&name)
            .join(format!("{}_matches.json", name))
    }

    /// Creates the state and results directories if missing.
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.state_dir).map_err(io_error(&self.state_dir))?;
        fs::create_dir_all(&self.results_dir).map_err(io_error(&self.results_dir))?;
        Ok(())
    }

    /// Writes through a sibling temp file so a crash mid-write never leaves
    /// a truncated record behind.
    fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        let json = serde_json::to_string_pretty(value)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_error(&tmp))?;
        fs::rename(&tmp, path).map_err(io_error(path))?;
        Ok(())
    }

    fn discard_corrupt(path: &Path) {
        match fs::remove_file(path) {
            Ok(()) => info!("Removed corrupted state file {}", path.display()),
            Err(e) => warn!("Could not remove corrupted state file {}: {}", path.display(), e),
        }
    }
}

impl StateStore for JsonStateStore {
    fn load(&self, seed_handle: &str) -> CrawlState {
        let path = self.state_path(seed_handle);

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(
                    "No previous search state at {}, starting fresh for @{}",
                    path.display(),
                    seed_handle
                );
                return CrawlState::new(seed_handle);
            }
            Err(e) => {
                error!(
                    "Could not read search state {}: {}. Starting fresh",
                    path.display(),
                    e
                );
                return CrawlState::new(seed_handle);
            }
        };

        let record: StateRecord = match serde_json::from_str(&contents) {
            Ok(record) => record,
            Err(e) => {
                warn!("Corrupted state file {}: {}. Starting fresh", path.display(), e);
                Self::discard_corrupt(&path);
                return CrawlState::new(seed_handle);
            }
        };

        if record.seed_handle != seed_handle {
            warn!(
                "State file {} belongs to @{}, not @{}. Starting fresh",
                path.display(),
                record.seed_handle,
                seed_handle
            );
            return CrawlState::new(seed_handle);
        }

        let state = record.into_state();
        info!(
            "Resuming search for @{}: {} visited, {} match(es) so far",
            seed_handle,
            state.visited().len(),
            state.matches().len()
        );
        state
    }

    fn save(&self, seed_handle: &str, state: &CrawlState) -> Result<PathBuf> {
        let path = self.state_path(seed_handle);
        Self::write_json(&path, &StateRecord::from_state(seed_handle, state))?;
        info!("Search state saved to {}", path.display());
        Ok(path)
    }

    fn save_matches_for_keyword(
        &self,
        keyword: &str,
        matches: &[MatchRecord],
    ) -> Result<Option<PathBuf>> {
        let keyword_matches = filter_by_keyword(matches, keyword);
        if keyword_matches.is_empty() {
            debug!("No matches for '{}', skipping snapshot", keyword);
            return Ok(None);
        }

        let path = self.snapshot_path(keyword);
        Self::write_json(&path, &keyword_matches)?;
        info!(
            "{} match(es) for '{}' saved to {}",
            keyword_matches.len(),
            keyword,
            path.display()
        );
        Ok(Some(path))
    }

    fn clear(&self, seed_handle: &str) -> Result<bool> {
        let path = self.state_path(seed_handle);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Io { path, source: e }),
        }
    }
}
