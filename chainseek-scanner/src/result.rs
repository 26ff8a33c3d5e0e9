use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Opaque, comparable identifier of a profile in the suggestion graph.
///
/// Upstream payloads carry ids either as JSON strings or as integers; both
/// normalize to the same textual token so `"42"` and `42` identify one node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Unsigned(u64),
            Signed(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => NodeId(s),
            RawId::Unsigned(n) => NodeId(n.to_string()),
            RawId::Signed(n) => NodeId(n.to_string()),
        })
    }
}

/// One outgoing suggestion edge as reported by a `ChainFetcher`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborDescriptor {
    pub id: Option<NodeId>,
    pub handle: String,
    pub display_name: String,
}

impl NeighborDescriptor {
    pub fn new(id: impl Into<NodeId>, handle: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            handle: handle.into(),
            display_name: display_name.into(),
        }
    }

    /// Returns the node id when the descriptor is usable for traversal,
    /// i.e. it carries a non-empty id and a non-empty handle.
    pub fn valid_id(&self) -> Option<&NodeId> {
        if self.handle.trim().is_empty() {
            return None;
        }
        self.id.as_ref().filter(|id| !id.is_empty())
    }
}

/// A neighbor whose handle or display name contained one of the keywords.
///
/// Field names on disk stay compatible with state files written by earlier
/// releases of the search tool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchRecord {
    #[serde(rename = "user_id")]
    pub node_id: NodeId,
    #[serde(rename = "username")]
    pub handle: String,
    #[serde(rename = "full_name")]
    pub display_name: String,
    #[serde(rename = "found_via_username")]
    pub found_via_handle: String,
    #[serde(rename = "found_via_user_id")]
    pub found_via_node_id: NodeId,
    #[serde(rename = "depth_found")]
    pub depth: usize,
    pub matched_keyword: String,
}
