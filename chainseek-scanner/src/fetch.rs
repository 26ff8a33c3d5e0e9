use crate::error::{Result, ScanError};
use crate::result::{NeighborDescriptor, NodeId};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://i.instagram.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Turns a handle into the node id the suggestion graph is keyed by.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, handle: &str) -> Result<NodeId>;
}

/// Lists the suggestion neighbors of a node. An empty list is a valid answer.
#[async_trait]
pub trait ChainFetcher: Send + Sync {
    async fn fetch(&self, node_id: &NodeId) -> Result<Vec<NeighborDescriptor>>;
}

#[derive(Debug, Deserialize)]
struct ProfileInfoResponse {
    data: Option<ProfileData>,
}

#[derive(Debug, Deserialize)]
struct ProfileData {
    user: Option<ProfileUser>,
}

#[derive(Debug, Deserialize)]
struct ProfileUser {
    id: Option<NodeId>,
}

#[derive(Debug, Deserialize)]
struct ChainingResponse {
    #[serde(default)]
    users: Option<Vec<WireUser>>,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    #[serde(default)]
    id: Option<NodeId>,
    #[serde(default)]
    pk: Option<NodeId>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    full_name: Option<String>,
}

impl From<WireUser> for NeighborDescriptor {
    fn from(user: WireUser) -> Self {
        NeighborDescriptor {
            id: user.id.or(user.pk),
            handle: user.username.unwrap_or_default(),
            display_name: user.full_name.unwrap_or_default(),
        }
    }
}

/// HTTP implementation of both collaborators over one pooled client.
///
/// The header map (session cookies, app id, user agent, ...) is attached to
/// every request.
pub struct HttpChainClient {
    client: Client,
    base_url: Url,
}

impl HttpChainClient {
    pub fn new(headers: HeaderMap) -> Result<Self> {
        Self::with_options(DEFAULT_BASE_URL, headers, DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_options(base_url: &str, headers: HeaderMap, timeout_secs: u64) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.div_ceil(2)))
            .pool_max_idle_per_host(8)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| ScanError::InvalidUrl(format!("{}{}: {}", self.base_url, path, e)))?;
        url.query_pairs_mut().extend_pairs(query);
        Ok(url)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: Url) -> Result<T> {
        debug!("GET {}", url);
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        debug!("Status {} for {}", status.as_u16(), url);

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ScanError::RateLimited);
        }
        if !status.is_success() {
            return Err(ScanError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| ScanError::ParseError(format!("{} (from {})", e, url)))
    }
}

#[async_trait]
impl IdentityResolver for HttpChainClient {
    async fn resolve(&self, handle: &str) -> Result<NodeId> {
        let url = self.endpoint("/api/v1/users/web_profile_info/", &[("username", handle)])?;

        let info: ProfileInfoResponse = match self.get_json(url).await {
            Ok(info) => info,
            Err(ScanError::UnexpectedStatus { status: 404, .. }) => {
                return Err(ScanError::NotFound(handle.to_string()));
            }
            Err(e) => return Err(e),
        };

        info.data
            .and_then(|d| d.user)
            .and_then(|u| u.id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ScanError::NotFound(handle.to_string()))
    }
}

#[async_trait]
impl ChainFetcher for HttpChainClient {
    async fn fetch(&self, node_id: &NodeId) -> Result<Vec<NeighborDescriptor>> {
        let url = self.endpoint(
            "/api/v1/discover/chaining/",
            &[
                ("module", "profile"),
                ("target_id", node_id.as_str()),
                ("profile_chaining_check", "false"),
            ],
        )?;

        let chain: ChainingResponse = self.get_json(url).await?;
        Ok(chain
            .users
            .unwrap_or_default()
            .into_iter()
            .map(NeighborDescriptor::from)
            .collect())
    }
}
