// Cache path utilities.
// Lays out the cache directory and maps record keys to file names.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use sha2::{Digest, Sha256};

use crate::config::AppConfig;
use crate::error::{PromptError, Result};

/// Key under which the root directory listing is persisted.
pub const ROOT_KEY: &str = "root";

/// Get the platform cache directory (~/.cache/promptcache on Linux).
pub fn default_cache_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "promptcache").map(|dirs| dirs.cache_dir().to_path_buf())
}

/// Cache directory for this configuration.
pub fn cache_dir(config: &AppConfig) -> Result<PathBuf> {
    config
        .cache_dir
        .clone()
        .or_else(default_cache_dir)
        .ok_or_else(|| PromptError::Config("no cache directory available".into()))
}

/// Directory of the foreground store.
pub fn store_dir(base: &Path) -> PathBuf {
    base.join("store")
}

/// Directory of the cache worker's regions.
pub fn worker_dir(base: &Path) -> PathBuf {
    base.join("worker")
}

/// Path to the schema marker of a store.
pub fn schema_path(store: &Path) -> PathBuf {
    store.join("schema.json")
}

/// Directory holding one region's records.
pub fn region_dir(store: &Path, region: &str) -> PathBuf {
    store.join(sanitize_name(region))
}

/// File holding the record for a key. Keys are hashed so any path or URL fits.
pub fn record_path(region: &Path, key: &str) -> PathBuf {
    let digest = Sha256::digest(key.as_bytes());
    region.join(format!("{}.json", hex::encode(digest)))
}

/// Store key of a resource path. The root directory has no path of its own.
pub fn resource_key(path: &str) -> &str {
    if path.is_empty() { ROOT_KEY } else { path }
}

/// Sanitize a name for use in filesystem paths.
/// Replaces problematic characters with underscores.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}
