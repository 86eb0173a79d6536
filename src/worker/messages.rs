// Cache worker wire protocol.
// Inbound commands are tagged by `action`, outbound replies by `type`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies a foreground client connected to the worker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClientId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ClientId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Commands a client can post to the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum WorkerCommand {
    /// Fetch and store the raw content of every listed document.
    #[serde(rename_all = "camelCase")]
    CacheAllPrompts {
        file_paths: Vec<String>,
        owner: String,
        repo: String,
        branch: String,
        #[serde(default)]
        client_id: Option<ClientId>,
    },
    /// Drop the whole prompt region.
    #[serde(rename_all = "camelCase")]
    ClearPromptCache {
        #[serde(default)]
        client_id: Option<ClientId>,
    },
    /// Activate a waiting worker now.
    SkipWaiting,
}

/// Acknowledgements and notifications sent back to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkerReply {
    #[serde(rename = "CACHE_ALL_PROMPTS_COMPLETE")]
    CacheAllPromptsComplete,
    #[serde(rename = "PROMPT_CACHE_CLEARED")]
    PromptCacheCleared,
    #[serde(rename = "PROMPT_CACHE_CLEAR_FAILED")]
    PromptCacheClearFailed { error: String },
    #[serde(rename = "swUpdated")]
    SwUpdated,
}

/// A command together with the client that posted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub command: WorkerCommand,
    pub source: Option<ClientId>,
}
