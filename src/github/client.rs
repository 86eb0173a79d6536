// GitHub HTTP client.
// Builds repository URLs, tracks rate limits and maps response statuses to errors.

use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::config::AppConfig;
use crate::error::{PromptError, Result};
use crate::net::{HttpResponse, RateLimit, Transport};

/// The repository and branch every request is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

impl RepoRef {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            branch: config.branch.clone(),
        }
    }
}

/// GitHub client for one repository.
pub struct GitHubClient {
    transport: Arc<dyn Transport>,
    repo: RepoRef,
    api_base: String,
    raw_base: String,
    rate_limit: Mutex<RateLimit>,
}

impl GitHubClient {
    pub fn new(transport: Arc<dyn Transport>, config: &AppConfig) -> Self {
        Self {
            transport,
            repo: RepoRef::from_config(config),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            raw_base: config.raw_base.trim_end_matches('/').to_string(),
            rate_limit: Mutex::new(RateLimit::default()),
        }
    }

    /// Last rate limit reported by the API.
    pub fn rate_limit(&self) -> RateLimit {
        self.lock_rate_limit().clone()
    }

    /// Contents API URL for a directory path ("" is the root).
    pub fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}?ref={}",
            self.api_base, self.repo.owner, self.repo.repo, path, self.repo.branch
        )
    }

    /// Raw content URL for a file path.
    pub fn raw_url(&self, path: &str) -> String {
        raw_document_url(
            &self.raw_base,
            &self.repo.owner,
            &self.repo.repo,
            &self.repo.branch,
            path,
        )
    }

    /// GET a URL and return the response if it succeeded.
    pub async fn get(&self, url: &str) -> Result<HttpResponse> {
        let response = self.transport.get(url).await.map_err(|e| match e {
            PromptError::Transport(e) => PromptError::FetchFailed(e.to_string()),
            other => other,
        })?;

        self.update_rate_limit(&response);
        self.check_response(url, response)
    }

    fn update_rate_limit(&self, response: &HttpResponse) {
        if let Some(rate_limit) = &response.rate_limit {
            if rate_limit.remaining == 0 {
                warn!(reset = rate_limit.reset, "GitHub rate limit exhausted");
            }
            *self.lock_rate_limit() = rate_limit.clone();
        }
    }

    /// Check response status and convert errors.
    fn check_response(&self, url: &str, response: HttpResponse) -> Result<HttpResponse> {
        match response.status {
            200..=299 => Ok(response),
            401 => Err(PromptError::Unauthorized),
            404 => Err(PromptError::NotFound(url.to_string())),
            403 if response.rate_limit.as_ref().is_some_and(|r| r.remaining == 0) => {
                let reset = response.rate_limit.as_ref().map_or(0, |r| r.reset);
                let reset_at = chrono::DateTime::from_timestamp(reset as i64, 0)
                    .map(|dt| dt.format("%H:%M:%S").to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                Err(PromptError::RateLimited { reset_at })
            }
            status => Err(PromptError::FetchFailed(format!(
                "HTTP {}: {}",
                status, response.body
            ))),
        }
    }

    fn lock_rate_limit(&self) -> std::sync::MutexGuard<'_, RateLimit> {
        self.rate_limit
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Raw content URL built from its four parts.
pub fn raw_document_url(raw_base: &str, owner: &str, repo: &str, branch: &str, path: &str) -> String {
    format!(
        "{}/{}/{}/{}/{}",
        raw_base.trim_end_matches('/'),
        owner,
        repo,
        branch,
        path
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockTransport, contents_url, raw_url, test_config};

    fn client(transport: Arc<MockTransport>) -> GitHubClient {
        let config = test_config(std::path::Path::new("/unused"));
        GitHubClient::new(transport, &config)
    }

    #[test]
    fn test_urls() {
        let client = client(Arc::new(MockTransport::new()));
        assert_eq!(client.contents_url(""), contents_url(""));
        assert_eq!(client.contents_url("tools/git"), contents_url("tools/git"));
        assert_eq!(client.raw_url("tools/a.md"), raw_url("tools/a.md"));
        assert_eq!(
            raw_document_url("https://raw.test/", "o", "r", "b", "x/y.md"),
            "https://raw.test/o/r/b/x/y.md"
        );
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let transport = Arc::new(MockTransport::new());
        transport.route("https://x/401", HttpResponse::with_status(401, ""));
        transport.route("https://x/500", HttpResponse::with_status(500, "oops"));
        transport.route_text("https://x/ok", "fine");
        let client = client(transport.clone());

        assert!(client.get("https://x/ok").await.is_ok());
        assert!(matches!(
            client.get("https://x/401").await,
            Err(PromptError::Unauthorized)
        ));
        assert!(matches!(
            client.get("https://x/missing").await,
            Err(PromptError::NotFound(_))
        ));
        match client.get("https://x/500").await {
            Err(PromptError::FetchFailed(msg)) => assert!(msg.contains("500")),
            other => panic!("unexpected: {:?}", other.map(|r| r.status)),
        }
    }

    #[tokio::test]
    async fn test_rate_limited_forbidden() {
        let transport = Arc::new(MockTransport::new());
        let mut response = HttpResponse::with_status(403, "rate limited");
        response.rate_limit = Some(RateLimit {
            limit: 60,
            remaining: 0,
            reset: 0,
        });
        transport.route("https://x/limited", response);
        let client = client(transport);

        assert!(matches!(
            client.get("https://x/limited").await,
            Err(PromptError::RateLimited { .. })
        ));
        assert_eq!(client.rate_limit().limit, 60);
    }
}
