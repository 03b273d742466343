//! GitHub REST v3 client

use base64::Engine;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use super::cache::ResponseCache;
use super::models::*;
use crate::config::GitHubConfig;
use crate::error::{clip, retry_after_secs, PlannerError, Result};
use crate::metrics::METRICS;

const SERVICE: &str = "GitHub";
const USER_AGENT: &str = concat!("ticket-planner/", env!("CARGO_PKG_VERSION"));

pub const ACCEPT_JSON: &str = "application/vnd.github+json";
pub const ACCEPT_DIFF: &str = "application/vnd.github.v3.diff";

/// A repository's recursive file tree
#[derive(Debug, Clone)]
pub struct RepoTree {
    pub entries: Vec<TreeEntry>,
    /// GitHub cut the listing short (very large repositories)
    pub truncated: bool,
}

/// GitHub client; works anonymously when no token is configured
pub struct GitHubClient {
    http: Client,
    api_url: Url,
    token: Option<SecretString>,
    cache: ResponseCache,
}

impl GitHubClient {
    /// Create a new GitHub client
    pub fn new(config: &GitHubConfig, token: Option<SecretString>) -> Result<Self> {
        let api_url = Url::parse(&config.api_url)
            .map_err(|e| PlannerError::InvalidUrl(format!("GitHub API URL '{}': {}", config.api_url, e)))?;

        let http = Client::builder()
            .timeout(config.timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PlannerError::Internal(format!("failed to build GitHub client: {}", e)))?;

        let cache = if config.cache_enabled {
            ResponseCache::new(config.cache_ttl(), config.cache_max_entries)
        } else {
            ResponseCache::disabled()
        };

        info!(
            "GitHub client ready (token: {}, cache: {})",
            if token.is_some() { "yes" } else { "no" },
            config.cache_enabled
        );

        Ok(Self {
            http,
            api_url,
            token,
            cache,
        })
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Build an API URL from raw path segments; each segment is percent-encoded
    fn endpoint<'a, I>(&self, segments: I) -> Result<Url>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| PlannerError::Internal("GitHub API URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET a URL, serving successful bodies from the cache when possible
    async fn fetch(&self, url: Url, accept: &str) -> Result<Bytes> {
        if let Some(body) = self.cache.get(accept, url.as_str()).await {
            debug!("GitHub cache hit: {}", url);
            return Ok(body);
        }

        let start = Instant::now();
        let mut request = self
            .http
            .get(url.clone())
            .header(reqwest::header::ACCEPT, accept);
        if let Some(token) = &self.token {
            request = request.header(
                reqwest::header::AUTHORIZATION,
                format!("token {}", token.expose_secret()),
            );
        }

        let response = request.send().await.map_err(|e| {
            METRICS.record_upstream("github", false, start.elapsed());
            PlannerError::from_reqwest(SERVICE, e)
        })?;

        let status = response.status();
        if !status.is_success() {
            METRICS.record_upstream("github", false, start.elapsed());
            return Err(map_failure(response).await);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| PlannerError::from_reqwest(SERVICE, e))?;
        METRICS.record_upstream("github", true, start.elapsed());

        self.cache.insert(accept, url.as_str(), body.clone()).await;
        Ok(body)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let body = self.fetch(url, ACCEPT_JSON).await?;
        serde_json::from_slice(&body).map_err(|e| PlannerError::InvalidResponse {
            service: SERVICE,
            message: e.to_string(),
        })
    }

    /// `GET /repos/{owner}/{repo}`
    pub async fn get_repository(&self, owner: &str, repo: &str) -> Result<RepoInfo> {
        self.get_json(self.endpoint(["repos", owner, repo])?).await
    }

    /// `GET /repos/{owner}/{repo}/languages`
    pub async fn get_languages(&self, owner: &str, repo: &str) -> Result<Languages> {
        self.get_json(self.endpoint(["repos", owner, repo, "languages"])?)
            .await
    }

    /// `GET /repos/{owner}/{repo}/git/trees/{branch}?recursive=1`
    pub async fn get_tree(&self, owner: &str, repo: &str, branch: &str) -> Result<RepoTree> {
        let mut url = self.endpoint(["repos", owner, repo, "git", "trees", branch])?;
        url.query_pairs_mut().append_pair("recursive", "1");

        let tree: TreeResponse = self.get_json(url).await?;
        if tree.truncated {
            warn!("GitHub tree for {}/{} was truncated", owner, repo);
        }
        debug!("GitHub tree for {}/{}: {} entries", owner, repo, tree.tree.len());
        Ok(RepoTree {
            entries: tree.tree,
            truncated: tree.truncated,
        })
    }

    /// Fetch and decode a file; `Ok(None)` when the file does not exist
    pub async fn get_file_content(&self, owner: &str, repo: &str, path: &str) -> Result<Option<String>> {
        let segments = ["repos", owner, repo, "contents"]
            .into_iter()
            .chain(path.split('/').filter(|s| !s.is_empty()));
        let url = self.endpoint(segments)?;

        let content: ContentResponse = match self.get_json(url).await {
            Ok(content) => content,
            Err(PlannerError::NotFound(_)) => {
                debug!("{} not found in {}/{}", path, owner, repo);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        match (content.encoding.as_deref(), content.content) {
            (Some("base64"), Some(encoded)) => decode_content(&encoded).map(Some),
            (_, Some(raw)) => Ok(Some(raw)),
            (_, None) => Ok(Some(String::new())),
        }
    }

    /// `GET /repos/{owner}/{repo}/pulls/{n}`
    pub async fn get_pull_request(&self, owner: &str, repo: &str, number: u64) -> Result<PullRequest> {
        let number = number.to_string();
        self.get_json(self.endpoint(["repos", owner, repo, "pulls", number.as_str()])?)
            .await
    }

    /// Unified diff of a pull request
    pub async fn get_pull_request_diff(&self, owner: &str, repo: &str, number: u64) -> Result<String> {
        let number = number.to_string();
        let url = self.endpoint(["repos", owner, repo, "pulls", number.as_str()])?;
        let body = self.fetch(url, ACCEPT_DIFF).await?;
        Ok(lossy_utf8(&body))
    }

    /// `GET /rate_limit`; never cached
    pub async fn rate_limit(&self) -> Result<RateLimitStatus> {
        let url = self.endpoint(["rate_limit"])?;
        let start = Instant::now();
        let mut request = self.http.get(url).header(reqwest::header::ACCEPT, ACCEPT_JSON);
        if let Some(token) = &self.token {
            request = request.header(
                reqwest::header::AUTHORIZATION,
                format!("token {}", token.expose_secret()),
            );
        }
        let response = request.send().await.map_err(|e| {
            METRICS.record_upstream("github", false, start.elapsed());
            PlannerError::from_reqwest(SERVICE, e)
        })?;
        if !response.status().is_success() {
            METRICS.record_upstream("github", false, start.elapsed());
            return Err(map_failure(response).await);
        }
        METRICS.record_upstream("github", true, start.elapsed());

        let parsed: RateLimitResponse = response.json().await.map_err(|e| PlannerError::InvalidResponse {
            service: SERVICE,
            message: e.to_string(),
        })?;
        Ok(parsed.resources)
    }
}

/// GitHub reports rate limiting as 403 (primary) or 429 (secondary)
async fn map_failure(response: reqwest::Response) -> PlannerError {
    let status = response.status();
    match status {
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = retry_after_secs(response.headers())
                .or_else(|| reset_in_secs(response.headers()));
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!("GitHub rate limited (status {})", status);
            PlannerError::RateLimited {
                message: format!("GitHub: {}", clip(&body)),
                retry_after_secs: retry_after,
            }
        }
        _ => PlannerError::from_response(SERVICE, response).await,
    }
}

/// Seconds until `x-ratelimit-reset` (an epoch timestamp)
fn reset_in_secs(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    let reset: i64 = headers
        .get("x-ratelimit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())?;
    let now = chrono::Utc::now().timestamp();
    Some(reset.saturating_sub(now).max(0) as u64)
}

/// Decode GitHub's line-wrapped base64, dropping invalid UTF-8 bytes
pub fn decode_content(encoded: &str) -> Result<String> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| PlannerError::InvalidResponse {
            service: SERVICE,
            message: format!("invalid base64 content: {}", e),
        })?;
    Ok(lossy_utf8(&bytes))
}

fn lossy_utf8(bytes: &[u8]) -> String {
    bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()
}
