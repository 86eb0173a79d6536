// User-visible status line.
// Errors never reach the presentation layer directly; they are rendered here first.

use chrono::{DateTime, Utc};

use crate::error::PromptError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warn,
    Error,
}

/// A status message for the user.
#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub level: StatusLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl StatusMessage {
    fn at(level: StatusLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::at(StatusLevel::Info, message)
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self::at(StatusLevel::Warn, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::at(StatusLevel::Error, message)
    }

    /// Shown when content came from the store because the fetch failed.
    pub fn loaded_from_cache(path: &str) -> Self {
        if path.is_empty() {
            Self::warn("Loaded from cache")
        } else {
            Self::warn(format!("Loaded {} from cache", path))
        }
    }
}

impl From<&PromptError> for StatusMessage {
    fn from(err: &PromptError) -> Self {
        let level = match err {
            PromptError::NotAvailable(_)
            | PromptError::NetworkUnavailable
            | PromptError::WorkerUnready => StatusLevel::Warn,
            _ => StatusLevel::Error,
        };
        Self::at(level, err.status_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_errors_are_warnings() {
        let status = StatusMessage::from(&PromptError::NotAvailable("a/b.md".into()));
        assert_eq!(status.level, StatusLevel::Warn);
        assert_eq!(status.message, "a/b.md is not available offline");

        let status = StatusMessage::from(&PromptError::WorkerUnready);
        assert_eq!(status.level, StatusLevel::Warn);
    }

    #[test]
    fn test_other_errors_are_errors() {
        let status = StatusMessage::from(&PromptError::ClearFailed("locked".into()));
        assert_eq!(status.level, StatusLevel::Error);
        assert_eq!(status.message, "Failed to clear cache: locked");
    }

    #[test]
    fn test_loaded_from_cache_text() {
        assert_eq!(StatusMessage::loaded_from_cache("").message, "Loaded from cache");
        assert_eq!(
            StatusMessage::loaded_from_cache("tools").message,
            "Loaded tools from cache"
        );
    }
}
