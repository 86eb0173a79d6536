// Persisted store for cached resources and recently viewed entries.
// Each region is a directory of JSON records written atomically via temp files.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, info, warn};

use crate::error::Result;

use super::paths::{record_path, region_dir, resource_key, schema_path};
use super::recent::RecentEntry;
use super::resource::Resource;

/// Bump when a region is added. Opening never destroys regions that still exist.
pub const SCHEMA_VERSION: u32 = 1;

/// Region of cached resources keyed by path.
pub const PROMPTS: &str = "prompts";

/// Region of recently viewed documents keyed by path.
pub const RECENTLY_VIEWED: &str = "recently_viewed";

const REGIONS: &[&str] = &[PROMPTS, RECENTLY_VIEWED];

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A record on disk: the key it was stored under and its value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record<T> {
    pub key: String,
    pub value: T,
}

#[derive(Debug, Serialize, Deserialize)]
struct Schema {
    version: u32,
    regions: Vec<String>,
}

/// Write a record to a region directory, replacing any previous value.
pub fn write_record<T: Serialize>(region: &Path, key: &str, value: &T) -> Result<()> {
    fs::create_dir_all(region)?;

    let path = record_path(region, key);
    let json = serde_json::to_string_pretty(&Record {
        key: key.to_string(),
        value,
    })?;

    // Write atomically via a temp file unique to this writer
    let temp_path = path.with_extension(format!(
        "{}.{}.tmp",
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    let mut file = fs::File::create(&temp_path)?;
    file.write_all(json.as_bytes())?;
    file.sync_all()?;
    fs::rename(&temp_path, &path)?;

    Ok(())
}

/// Read the record stored under a key.
pub fn read_record<T: DeserializeOwned>(region: &Path, key: &str) -> Result<Option<T>> {
    let contents = match fs::read_to_string(record_path(region, key)) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let record: Record<T> = serde_json::from_str(&contents)?;
    Ok(Some(record.value))
}

/// Read every record in a region. Unreadable files are skipped.
pub fn read_all<T: DeserializeOwned>(region: &Path) -> Result<Vec<Record<T>>> {
    let dir = match fs::read_dir(region) {
        Ok(dir) => dir,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut records = Vec::new();
    for entry in dir {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let parsed = fs::read_to_string(&path)
            .map_err(crate::error::PromptError::from)
            .and_then(|contents| Ok(serde_json::from_str::<Record<T>>(&contents)?));
        match parsed {
            Ok(record) => records.push(record),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable record"),
        }
    }

    Ok(records)
}

/// Delete the record stored under a key.
pub fn delete_record(region: &Path, key: &str) -> Result<()> {
    match fs::remove_file(record_path(region, key)) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

/// Delete a directory and all contents.
pub fn delete_dir(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

/// Durable keyed store with the `prompts` and `recently_viewed` regions.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
    /// Bumped by every clear. Writes tagged with an older value are dropped.
    generation: Arc<Mutex<u64>>,
}

impl Store {
    /// Open a store, creating missing regions and upgrading the schema marker.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;

        let previous = match fs::read_to_string(schema_path(&root)) {
            Ok(contents) => Some(serde_json::from_str::<Schema>(&contents)?),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        for region in REGIONS {
            fs::create_dir_all(region_dir(&root, region))?;
        }

        match previous {
            Some(schema) if schema.version > SCHEMA_VERSION => {
                warn!(
                    found = schema.version,
                    supported = SCHEMA_VERSION,
                    "store was written by a newer version, leaving schema marker alone"
                );
            }
            Some(schema) if schema.version == SCHEMA_VERSION => {}
            previous => {
                if let Some(schema) = previous {
                    info!(from = schema.version, to = SCHEMA_VERSION, "upgrading store schema");
                }
                let schema = Schema {
                    version: SCHEMA_VERSION,
                    regions: REGIONS.iter().map(|r| r.to_string()).collect(),
                };
                write_schema(&root, &schema)?;
            }
        }

        Ok(Self {
            root,
            generation: Arc::new(Mutex::new(0)),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn region(&self, name: &str) -> PathBuf {
        region_dir(&self.root, name)
    }

    /// Store a resource, overwriting any previous one at the same path.
    pub fn put_resource(&self, resource: &Resource) -> Result<()> {
        debug!(path = %resource.path, "caching resource");
        write_record(&self.region(PROMPTS), resource_key(&resource.path), resource)
    }

    /// Store a resource only if the store was not cleared since `generation`.
    pub fn put_resource_if_current(&self, resource: &Resource, generation: u64) -> Result<bool> {
        let current = self.lock_generation();
        if *current != generation {
            debug!(path = %resource.path, "dropping write for a cleared store");
            return Ok(false);
        }
        self.put_resource(resource)?;
        Ok(true)
    }

    /// Current clear generation.
    pub fn generation(&self) -> u64 {
        *self.lock_generation()
    }

    /// Load the resource cached for a path.
    pub fn get_resource(&self, path: &str) -> Result<Option<Resource>> {
        read_record(&self.region(PROMPTS), resource_key(path))
    }

    /// Store a recently viewed entry keyed by its path.
    pub fn put_recent(&self, entry: &RecentEntry) -> Result<()> {
        write_record(&self.region(RECENTLY_VIEWED), &entry.path, entry)
    }

    pub fn delete_recent(&self, path: &str) -> Result<()> {
        delete_record(&self.region(RECENTLY_VIEWED), path)
    }

    /// Every recently viewed entry, in no particular order.
    pub fn recent_entries(&self) -> Result<Vec<RecentEntry>> {
        Ok(read_all::<RecentEntry>(&self.region(RECENTLY_VIEWED))?
            .into_iter()
            .map(|record| record.value)
            .collect())
    }

    /// Remove everything from both regions.
    pub fn clear(&self) -> Result<()> {
        let mut generation = self.lock_generation();
        *generation += 1;
        for region in REGIONS {
            let dir = self.region(region);
            delete_dir(&dir)?;
            fs::create_dir_all(&dir)?;
        }
        info!(root = %self.root.display(), "store cleared");
        Ok(())
    }

    fn lock_generation(&self) -> MutexGuard<'_, u64> {
        self.generation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn write_schema(root: &Path, schema: &Schema) -> Result<()> {
    let json = serde_json::to_string_pretty(schema)?;
    let path = schema_path(root);
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, json)?;
    fs::rename(&temp_path, &path)?;
    Ok(())
}
