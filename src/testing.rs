// Test doubles shared by unit tests.
// A scripted in-memory transport with call recording and offline switching.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{PromptError, Result};
use crate::net::{HttpResponse, Transport};

pub const API: &str = "https://api.test";
pub const RAW: &str = "https://raw.test";

/// Config pointing at the fake hosts above.
pub fn test_config(cache_dir: &std::path::Path) -> crate::config::AppConfig {
    crate::config::AppConfig {
        owner: "octo".into(),
        repo: "prompts".into(),
        branch: "main".into(),
        api_base: API.into(),
        raw_base: RAW.into(),
        max_recent: 5,
        cache_dir: Some(cache_dir.to_path_buf()),
        ..Default::default()
    }
}

pub fn contents_url(path: &str) -> String {
    format!("{}/repos/octo/prompts/contents/{}?ref=main", API, path)
}

pub fn raw_url(path: &str) -> String {
    format!("{}/octo/prompts/main/{}", RAW, path)
}

#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, HttpResponse>>,
    broken: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<String>>,
    offline: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self, url: &str, response: HttpResponse) {
        self.routes.lock().unwrap().insert(url.to_string(), response);
    }

    pub fn route_text(&self, url: &str, body: &str) {
        self.route(url, HttpResponse::ok(body));
    }

    pub fn route_json(&self, url: &str, body: Value) {
        self.route(url, HttpResponse::ok(body.to_string()));
    }

    /// Make a URL fail at the transport level.
    pub fn break_url(&self, url: &str) {
        self.broken.lock().unwrap().insert(url.to_string());
    }

    pub fn delay(&self, url: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(url.to_string(), delay);
    }

    /// Fail every request, as if the network were gone.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == url).count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        self.calls.lock().unwrap().push(url.to_string());

        // The response is decided when the request starts, not when it lands
        let unreachable =
            self.offline.load(Ordering::SeqCst) || self.broken.lock().unwrap().contains(url);
        let response = self.routes.lock().unwrap().get(url).cloned();

        let delay = self.delays.lock().unwrap().get(url).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if unreachable {
            return Err(PromptError::FetchFailed(format!("connection refused: {}", url)));
        }
        Ok(response.unwrap_or_else(|| HttpResponse::with_status(404, "Not Found")))
    }
}
