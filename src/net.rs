// HTTP transport seam.
// Every outgoing GET goes through a Transport so the cache worker can intercept it.

use async_trait::async_trait;
use reqwest::{
    Client,
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AppConfig;
use crate::error::{PromptError, Result};

const GITHUB_API_VERSION: &str = "2022-11-28";

/// Rate limit information from response headers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    pub limit: u64,
    pub remaining: u64,
    pub reset: u64,
}

/// A fully buffered HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
    #[serde(default)]
    pub rate_limit: Option<RateLimit>,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: None,
            body: body.into(),
            rate_limit: None,
        }
    }

    pub fn with_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            ..Self::ok("")
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues GET requests. Transport errors are `Err`; HTTP error statuses are not.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse>;
}

/// Direct network access through reqwest.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a client with the GitHub default headers.
    pub fn new(config: &AppConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();

        if let Some(token) = config.token.as_deref() {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| PromptError::Config(e.to_string()))?,
            );
        }
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static(GITHUB_API_VERSION),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("promptcache"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout())
            .build()
            .map_err(PromptError::Transport)?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let rate_limit = read_rate_limit(response.headers());
        let body = response.text().await?;

        debug!(url, status, "network response");

        Ok(HttpResponse {
            status,
            content_type,
            body,
            rate_limit,
        })
    }
}

/// Parse rate limit headers. Returns None when the server sent none.
fn read_rate_limit(headers: &HeaderMap) -> Option<RateLimit> {
    let header = |name: &str| -> Option<u64> {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
    };

    let limit = header("x-ratelimit-limit")?;
    Some(RateLimit {
        limit,
        remaining: header("x-ratelimit-remaining").unwrap_or(0),
        reset: header("x-ratelimit-reset").unwrap_or(0),
    })
}
