// Application configuration.
// Layered loading from defaults, an optional TOML file and PROMPTCACHE_* env vars.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::error::{PromptError, Result};

/// Smallest and largest allowed size of the recently viewed list.
pub const MIN_RECENT: usize = 5;
pub const MAX_RECENT: usize = 10;

/// Application configuration.
///
/// Loading precedence (highest wins):
/// 1. Environment variables prefixed with `PROMPTCACHE_`
/// 2. TOML file from `PROMPTCACHE_CONFIG_FILE` (if set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Repository owner (user or organization).
    pub owner: String,

    /// Repository holding the prompts.
    pub repo: String,

    /// Branch to read from.
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Base URL of the contents API.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Base URL of the raw content host.
    #[serde(default = "default_raw_base")]
    pub raw_base: String,

    /// Extension that marks a leaf document.
    #[serde(default = "default_document_extension")]
    pub document_extension: String,

    /// Size of the recently viewed list.
    #[serde(default = "default_max_recent")]
    pub max_recent: usize,

    /// Override for the cache directory. Defaults to the platform cache dir.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Optional GitHub token, raises the API rate limit.
    #[serde(default)]
    pub token: Option<String>,

    /// Static assets pre-cached by the cache worker on install.
    #[serde(default)]
    pub shell_assets: Vec<String>,
}

fn default_branch() -> String {
    "main".into()
}

fn default_api_base() -> String {
    "https://api.github.com".into()
}

fn default_raw_base() -> String {
    "https://raw.githubusercontent.com".into()
}

fn default_document_extension() -> String {
    ".md".into()
}

fn default_max_recent() -> usize {
    MAX_RECENT
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            repo: String::new(),
            branch: default_branch(),
            api_base: default_api_base(),
            raw_base: default_raw_base(),
            document_extension: default_document_extension(),
            max_recent: default_max_recent(),
            cache_dir: None,
            timeout_ms: default_timeout_ms(),
            token: None,
            shell_assets: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for reqwest.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Prefix shared by every raw document URL of any repository.
    pub fn raw_prefix(&self) -> String {
        format!("{}/", self.raw_base.trim_end_matches('/'))
    }

    /// Load configuration from all sources.
    pub fn load() -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("PROMPTCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(Env::prefixed("PROMPTCACHE_").ignore(&["config_file"]));

        let config: Self = figment
            .extract()
            .map_err(|e| PromptError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Check invariants the rest of the crate relies on.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("owner", &self.owner),
            ("repo", &self.repo),
            ("branch", &self.branch),
        ] {
            if value.trim().is_empty() {
                return Err(PromptError::Config(format!(
                    "{} is required (set PROMPTCACHE_{})",
                    field,
                    field.to_uppercase()
                )));
            }
        }

        if !(MIN_RECENT..=MAX_RECENT).contains(&self.max_recent) {
            return Err(PromptError::Config(format!(
                "max_recent must be between {} and {}, got {}",
                MIN_RECENT, MAX_RECENT, self.max_recent
            )));
        }

        if !self.document_extension.starts_with('.') || self.document_extension.len() < 2 {
            return Err(PromptError::Config(format!(
                "document_extension must look like \".md\", got {:?}",
                self.document_extension
            )));
        }

        for (field, value) in [("api_base", &self.api_base), ("raw_base", &self.raw_base)] {
            if !(value.starts_with("http://") || value.starts_with("https://")) {
                return Err(PromptError::Config(format!(
                    "{} must be an http(s) URL, got {}",
                    field, value
                )));
            }
        }

        Ok(())
    }
}
