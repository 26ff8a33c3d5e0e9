//! Mutable traversal state shared by every branch of a crawl.
//!
//! `VisitedSet` and `MatchStore` only ever grow: there is no removal API. A
//! `CrawlState` bundles both for one seed and is the unit that gets
//! checkpointed and restored.

use crate::result::{MatchRecord, NodeId};
use indexmap::IndexSet;
use std::collections::HashSet;

/// Set of node ids already explored, in first-visit order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitedSet {
    ids: IndexSet<NodeId>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.ids.contains(id)
    }

    /// Inserts `id`, returning `true` only if it was not present before.
    pub fn insert(&mut self, id: NodeId) -> bool {
        self.ids.insert(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeId> {
        self.ids.iter()
    }
}

impl FromIterator<NodeId> for VisitedSet {
    fn from_iter<T: IntoIterator<Item = NodeId>>(iter: T) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

/// How two match records are judged to be the same match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DedupPolicy {
    /// Only exact repeats (every field equal, provenance included) are dropped.
    #[default]
    FullRecord,
    /// One record per `(node id, keyword)`; later provenances are dropped.
    NodeKeyword,
}

impl DedupPolicy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "full" | "full-record" => Some(DedupPolicy::FullRecord),
            "node-keyword" | "node" => Some(DedupPolicy::NodeKeyword),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DedupPolicy::FullRecord => "full-record",
            DedupPolicy::NodeKeyword => "node-keyword",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum MatchKey {
    Full(MatchRecord),
    NodeKeyword(NodeId, String),
}

/// Append-only, deduplicated list of match records.
#[derive(Debug, Clone, Default)]
pub struct MatchStore {
    policy: DedupPolicy,
    records: Vec<MatchRecord>,
    keys: HashSet<MatchKey>,
}

impl MatchStore {
    pub fn new(policy: DedupPolicy) -> Self {
        Self {
            policy,
            records: Vec::new(),
            keys: HashSet::new(),
        }
    }

    /// Rebuilds a store from previously persisted records. Records are kept
    /// as-is, in order, even if they would collide under `policy`.
    pub fn from_records(records: Vec<MatchRecord>, policy: DedupPolicy) -> Self {
        let keys = records.iter().map(|r| Self::key_for(policy, r)).collect();
        Self {
            policy,
            records,
            keys,
        }
    }

    fn key_for(policy: DedupPolicy, record: &MatchRecord) -> MatchKey {
        match policy {
            DedupPolicy::FullRecord => MatchKey::Full(record.clone()),
            DedupPolicy::NodeKeyword => {
                MatchKey::NodeKeyword(record.node_id.clone(), record.matched_keyword.clone())
            }
        }
    }

    pub fn policy(&self) -> DedupPolicy {
        self.policy
    }

    /// Appends `record` unless an equivalent one is already stored.
    pub fn insert(&mut self, record: MatchRecord) -> bool {
        if !self.keys.insert(Self::key_for(self.policy, &record)) {
            return false;
        }
        self.records.push(record);
        true
    }

    pub fn records(&self) -> &[MatchRecord] {
        &self.records
    }

    pub fn for_keyword(&self, keyword: &str) -> Vec<MatchRecord> {
        filter_by_keyword(&self.records, keyword)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Records whose `matched_keyword` is exactly `keyword`, in original order.
pub fn filter_by_keyword(records: &[MatchRecord], keyword: &str) -> Vec<MatchRecord> {
    records
        .iter()
        .filter(|r| r.matched_keyword == keyword)
        .cloned()
        .collect()
}

/// Everything a crawl knows about one seed: which nodes were explored and
/// which matches were found.
#[derive(Debug, Clone)]
pub struct CrawlState {
    seed_handle: String,
    visited: VisitedSet,
    matches: MatchStore,
}

impl CrawlState {
    pub fn new(seed_handle: impl Into<String>) -> Self {
        Self {
            seed_handle: seed_handle.into(),
            visited: VisitedSet::new(),
            matches: MatchStore::default(),
        }
    }

    pub fn restore(
        seed_handle: impl Into<String>,
        visited: impl IntoIterator<Item = NodeId>,
        matches: Vec<MatchRecord>,
    ) -> Self {
        Self {
            seed_handle: seed_handle.into(),
            visited: visited.into_iter().collect(),
            matches: MatchStore::from_records(matches, DedupPolicy::default()),
        }
    }

    /// Switches the dedup policy, re-indexing the records already held.
    pub fn with_dedup_policy(mut self, policy: DedupPolicy) -> Self {
        if self.matches.policy() != policy {
            let records = std::mem::take(&mut self.matches.records);
            self.matches = MatchStore::from_records(records, policy);
        }
        self
    }

    pub fn seed_handle(&self) -> &str {
        &self.seed_handle
    }

    pub fn visited(&self) -> &VisitedSet {
        &self.visited
    }

    pub fn matches(&self) -> &MatchStore {
        &self.matches
    }

    pub fn is_visited(&self, id: &NodeId) -> bool {
        self.visited.contains(id)
    }

    /// Atomic check-and-mark; `false` means some branch got there first.
    pub fn mark_visited(&mut self, id: NodeId) -> bool {
        self.visited.insert(id)
    }

    pub fn record_match(&mut self, record: MatchRecord) -> bool {
        self.matches.insert(record)
    }
}
