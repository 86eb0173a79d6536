// Recently viewed documents.
// A bounded move-to-front list persisted in the store, newest first.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::github::display_name;

use super::store::Store;

/// A document the user opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentEntry {
    pub path: String,
    pub name: String,
    pub timestamp: DateTime<Utc>,
}

impl RecentEntry {
    pub fn new(path: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            path: path.to_string(),
            name: display_name(path).to_string(),
            timestamp,
        }
    }
}

/// Maintains the recently viewed list in the store.
pub struct RecencyTracker {
    store: Arc<Store>,
    max_recent: usize,
    // Serializes read-modify-write cycles on the region
    write_lock: Mutex<()>,
}

impl RecencyTracker {
    pub fn new(store: Arc<Store>, max_recent: usize) -> Self {
        Self {
            store,
            max_recent,
            write_lock: Mutex::new(()),
        }
    }

    /// Record a view of a document: move it to the front and trim the tail.
    pub fn record(&self, path: &str) -> Result<RecentEntry> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let existing = self.store.recent_entries()?;

        // Timestamps strictly increase so ordering survives same-tick views
        let now = Utc::now();
        let timestamp = existing
            .iter()
            .map(|e| e.timestamp)
            .max()
            .map_or(now, |newest| now.max(newest + Duration::microseconds(1)));

        if existing.iter().any(|e| e.path == path) {
            self.store.delete_recent(path)?;
        }

        let entry = RecentEntry::new(path, timestamp);
        self.store.put_recent(&entry)?;
        debug!(path, "recorded view");

        let mut entries: Vec<RecentEntry> = existing
            .into_iter()
            .filter(|e| e.path != path)
            .collect();
        entries.push(entry.clone());
        sort_newest_first(&mut entries);
        for stale in entries.iter().skip(self.max_recent) {
            self.store.delete_recent(&stale.path)?;
        }

        Ok(entry)
    }

    /// The list, newest first, at most `max_recent` long.
    pub fn list(&self) -> Result<Vec<RecentEntry>> {
        let mut entries = self.store.recent_entries()?;
        sort_newest_first(&mut entries);
        entries.truncate(self.max_recent);
        Ok(entries)
    }
}

fn sort_newest_first(entries: &mut [RecentEntry]) {
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}
