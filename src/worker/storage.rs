// Named cache regions owned by the cache worker.
// Responses are keyed by full request URL and persisted like the foreground store.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::{debug, info};

use crate::cache::paths::region_dir;
use crate::cache::store::{delete_dir, read_all, read_record, write_record};
use crate::error::Result;
use crate::net::HttpResponse;

/// The worker's persisted cache regions.
///
/// Every region has a generation that a delete bumps. A write tagged with an
/// older generation is dropped, so a fetch started before a delete can not
/// repopulate the region after it.
#[derive(Debug)]
pub struct CacheStorage {
    root: PathBuf,
    generations: Mutex<HashMap<String, u64>>,
}

impl CacheStorage {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            generations: Mutex::new(HashMap::new()),
        })
    }

    /// Names of every region on disk.
    pub fn keys(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn has(&self, region: &str) -> bool {
        region_dir(&self.root, region).is_dir()
    }

    /// Create a region if it does not exist yet.
    pub fn open_region(&self, region: &str) -> Result<()> {
        fs::create_dir_all(region_dir(&self.root, region))?;
        Ok(())
    }

    /// Delete a region and everything in it. Returns whether it existed.
    pub fn delete(&self, region: &str) -> Result<bool> {
        let mut generations = self.lock();
        *generations.entry(region.to_string()).or_insert(0) += 1;

        let dir = region_dir(&self.root, region);
        let existed = dir.is_dir();
        delete_dir(&dir)?;
        info!(region, existed, "cache region deleted");
        Ok(existed)
    }

    /// Current generation of a region.
    pub fn generation(&self, region: &str) -> u64 {
        self.lock().get(region).copied().unwrap_or(0)
    }

    /// Cached response for a URL.
    pub fn match_url(&self, region: &str, url: &str) -> Result<Option<HttpResponse>> {
        read_record(&region_dir(&self.root, region), url)
    }

    /// Store a response under its URL.
    pub fn put(&self, region: &str, url: &str, response: &HttpResponse) -> Result<()> {
        let _generations = self.lock();
        debug!(region, url, "caching response");
        write_record(&region_dir(&self.root, region), url, response)
    }

    /// Store a response only if the region was not deleted since `generation`.
    pub fn put_if_current(
        &self,
        region: &str,
        url: &str,
        response: &HttpResponse,
        generation: u64,
    ) -> Result<bool> {
        let generations = self.lock();
        if generations.get(region).copied().unwrap_or(0) != generation {
            debug!(region, url, "dropping write for a cleared region");
            return Ok(false);
        }
        write_record(&region_dir(&self.root, region), url, response)?;
        Ok(true)
    }

    /// URLs cached in a region.
    pub fn urls(&self, region: &str) -> Result<Vec<String>> {
        let mut urls: Vec<String> = read_all::<HttpResponse>(&region_dir(&self.root, region))?
            .into_iter()
            .map(|record| record.key)
            .collect();
        urls.sort();
        Ok(urls)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, u64>> {
        self.generations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
