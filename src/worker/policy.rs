// Per-request caching policy of the cache worker.
// Chosen from the request method and the shape of its URL.

use reqwest::{Method, Url};
use serde_json::json;

use crate::net::HttpResponse;

/// An intercepted outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: String,
}

impl Request {
    pub fn get(url: &str) -> Self {
        Self {
            method: Method::GET,
            url: url.to_string(),
        }
    }
}

/// How the worker answers a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPolicy {
    /// Serve the cached copy if present, else fetch and store.
    CacheFirst,
    /// Serve the cached copy now and refresh it in the background.
    StaleWhileRevalidate,
    /// Forward to the network untouched.
    PassThrough,
}

/// URL rules deciding the policy.
#[derive(Debug, Clone)]
pub struct PolicyRules {
    raw_prefix: String,
    assets: Vec<String>,
}

impl PolicyRules {
    pub fn new(raw_prefix: &str, assets: &[String]) -> Self {
        Self {
            raw_prefix: raw_prefix.to_string(),
            assets: assets.to_vec(),
        }
    }

    pub fn classify(&self, request: &Request) -> FetchPolicy {
        if request.method != Method::GET {
            return FetchPolicy::PassThrough;
        }
        if request.url.starts_with(&self.raw_prefix) {
            return FetchPolicy::StaleWhileRevalidate;
        }
        if self.is_asset(&request.url) {
            return FetchPolicy::CacheFirst;
        }
        FetchPolicy::PassThrough
    }

    /// Assets match by full URL or by URL path.
    fn is_asset(&self, url: &str) -> bool {
        if self.assets.iter().any(|asset| asset == url) {
            return true;
        }
        Url::parse(url)
            .map(|parsed| self.assets.iter().any(|asset| asset == parsed.path()))
            .unwrap_or(false)
    }
}

/// Answer for a document that is neither cached nor reachable.
pub fn offline_response() -> HttpResponse {
    HttpResponse {
        status: 404,
        content_type: Some("application/json".to_string()),
        body: json!({
            "error": "Prompt content is not available offline and not found in cache."
        })
        .to_string(),
        rate_limit: None,
    }
}
