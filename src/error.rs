// Error types for promptcache.
// Covers network, cache, worker and configuration failures.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PromptError {
    #[error("Offline: no network connection")]
    NetworkUnavailable,

    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    #[error("Not available: {0}")]
    NotAvailable(String),

    #[error("Cache worker is not controlling this client yet")]
    WorkerUnready,

    #[error("Failed to clear cache: {0}")]
    ClearFailed(String),

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Authentication failed: invalid or expired token")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded, resets at {reset_at}")]
    RateLimited { reset_at: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl PromptError {
    /// Whether this error came from the network side while connected.
    /// These are retried once against the local store before giving up.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            PromptError::FetchFailed(_)
                | PromptError::Transport(_)
                | PromptError::Unauthorized
                | PromptError::NotFound(_)
                | PromptError::RateLimited { .. }
                | PromptError::Json(_)
        )
    }

    /// User-visible status text for this error.
    pub fn status_message(&self) -> String {
        match self {
            PromptError::NetworkUnavailable => "Cannot refresh while offline".to_string(),
            PromptError::NotAvailable(path) if path.is_empty() => {
                "Content is not available offline".to_string()
            }
            PromptError::NotAvailable(path) => format!("{} is not available offline", path),
            PromptError::WorkerUnready => {
                "Offline cache is not ready yet, reload and try again".to_string()
            }
            PromptError::ClearFailed(reason) => format!("Failed to clear cache: {}", reason),
            other => format!("Failed to load content: {}", other),
        }
    }
}

pub type Result<T> = std::result::Result<T, PromptError>;
