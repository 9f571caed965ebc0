pub mod types;

#[cfg(test)]
pub mod fake;

pub use types::{ChangedFile, PullRequestSummary, RequestIdentity};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, instrument};

use crate::config::GitHubSettings;

/// Versioned JSON media type of the GitHub REST API.
pub const ACCEPT_V3_JSON: &str = "application/vnd.github.v3+json";

/// Why a GitHub request produced no usable data. Callers only ever see a
/// generic failure message; the variant exists for the logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("resource not found (status 404)")]
    NotFound,

    #[error("request was not authorized (status {0})")]
    Unauthorized(u16),

    #[error("rate limit exceeded (status {0})")]
    RateLimited(u16),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl FetchError {
    /// Classify a non-success response. GitHub signals an exhausted primary
    /// rate limit with 403 plus `x-ratelimit-remaining: 0`.
    fn from_status(status: StatusCode, headers: &HeaderMap) -> Self {
        let rate_limit_exhausted = headers
            .get("x-ratelimit-remaining")
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.trim() == "0");

        match status {
            StatusCode::NOT_FOUND => Self::NotFound,
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimited(status.as_u16()),
            StatusCode::FORBIDDEN if rate_limit_exhausted => Self::RateLimited(status.as_u16()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Unauthorized(status.as_u16()),
            other => Self::Status(other.as_u16()),
        }
    }

    /// Short machine-friendly tag used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::NotFound => "not_found",
            FetchError::Unauthorized(_) => "unauthorized",
            FetchError::RateLimited(_) => "rate_limited",
            FetchError::Status(_) => "status",
            FetchError::Transport(_) => "transport",
            FetchError::Decode(_) => "decode",
        }
    }
}

/// Performs authenticated GET requests against the GitHub API.
///
/// The tool handlers only depend on this trait, so tests can substitute a
/// canned implementation for the real HTTP client.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// API root that endpoint URLs are built from.
    fn api_base(&self) -> &str;

    /// One GET, one outcome: the parsed JSON body on a 2xx response,
    /// otherwise a classified error. No retries.
    async fn get(&self, url: &str) -> Result<Value, FetchError>;
}

/// `Fetcher` backed by reqwest, carrying the token and fixed headers.
pub struct GitHubClient {
    client: reqwest::Client,
    settings: GitHubSettings,
}

impl GitHubClient {
    pub fn new(settings: GitHubSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
        }
    }
}

#[async_trait]
impl Fetcher for GitHubClient {
    fn api_base(&self) -> &str {
        &self.settings.api_base
    }

    #[instrument(skip(self))]
    async fn get(&self, url: &str) -> Result<Value, FetchError> {
        debug!("sending GitHub API request");
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, format!("token {}", self.settings.token))
            .header(ACCEPT, ACCEPT_V3_JSON)
            .header(USER_AGENT, self.settings.user_agent.as_str())
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::from_status(status, response.headers()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        debug!(status = status.as_u16(), body_bytes = body.len(), "received GitHub API response");

        serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

/// Fetch `url` and decode it as `T`. Every failure is logged and folded into
/// `None`; the caller decides what to tell the user.
pub async fn fetch_json<T: DeserializeOwned>(fetcher: &dyn Fetcher, url: &str) -> Option<T> {
    let result = fetcher.get(url).await.and_then(|value| {
        serde_json::from_value::<T>(value).map_err(|e| FetchError::Decode(e.to_string()))
    });

    match result {
        Ok(data) => Some(data),
        Err(err) => {
            error!(url = %url, kind = err.kind(), error = %err, "Error making GitHub request");
            None
        }
    }
}

/// `{base}/repos/{owner}/{repo}/pulls/{n}` followed by `tail`. Owner and
/// repo are percent-encoded as single path segments.
fn endpoint(api_base: &str, id: &RequestIdentity, tail: &[&str]) -> String {
    let number = id.pr_number.to_string();
    let segments = ["repos", id.owner.as_str(), id.repo.as_str(), "pulls", number.as_str()];

    match Url::parse(api_base) {
        Ok(mut url) if !url.cannot_be_a_base() => {
            if let Ok(mut path) = url.path_segments_mut() {
                path.pop_if_empty().extend(segments).extend(tail);
            }
            url.to_string()
        }
        // Not a usable base; the request itself will fail as a transport error.
        _ => {
            let mut url = api_base.trim_end_matches('/').to_string();
            for segment in segments.iter().chain(tail) {
                url.push('/');
                url.push_str(segment);
            }
            url
        }
    }
}

/// `{base}/repos/{owner}/{repo}/pulls/{n}`
pub fn pull_request_url(api_base: &str, id: &RequestIdentity) -> String {
    endpoint(api_base, id, &[])
}

/// `{base}/repos/{owner}/{repo}/pulls/{n}/files`
pub fn pull_request_files_url(api_base: &str, id: &RequestIdentity) -> String {
    endpoint(api_base, id, &["files"])
}
