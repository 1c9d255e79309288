//! Content-addressed merge cache.
//!
//! Each entry lives in `<cache_dir>/<key>/` where `key` is the SHA-1 hex
//! digest of the merge call's defining parameters. An entry holds the
//! Parquet tick table, the JSONL event list, and a human-readable TOML
//! manifest recording creation time and parameters.
//!
//! Entries are never invalidated automatically: the cache is a pure
//! performance layer, and stale results persist until `clear` is run.
//! Writes go to a temporary sibling directory and are renamed into place,
//! so a concurrent reader never observes a partially written entry.
//! Concurrent identical runs may race on the rename; the loser's work is
//! discarded, which is harmless because identical keys hold identical
//! content.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use tracing::{debug, info, warn};

use super::{read_ticks, write_ticks, JsonlReader, JsonlWriter, StorageError};
use crate::models::{RecordingEvents, TickTable};

const TICKS_FILE: &str = "ticks.parquet";
const EVENTS_FILE: &str = "events.jsonl";
const MANIFEST_FILE: &str = "manifest.toml";

/// SHA-1 hex digest of the concatenated defining parameters.
pub fn cache_key(parts: &[&str]) -> String {
    let mut hasher = Sha1::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update(b"|");
        }
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Human-readable record of what produced a cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheManifest {
    pub created_at: DateTime<Utc>,
    pub source_path: String,
    pub fields: Vec<String>,
    pub players: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_filter: Option<String>,
}

/// A merge result loaded back from the cache.
#[derive(Debug, Clone)]
pub struct CachedMerge {
    pub ticks: TickTable,
    pub events: Vec<RecordingEvents>,
    pub manifest: CacheManifest,
}

/// The on-disk merge cache.
pub struct MergeCache {
    cache_dir: PathBuf,
}

impl MergeCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn entry_dir(&self, key: &str) -> PathBuf {
        self.cache_dir.join(key)
    }

    /// Load the entry for `key`, if present and complete.
    pub fn lookup(&self, key: &str) -> Result<Option<CachedMerge>, StorageError> {
        let dir = self.entry_dir(key);
        if !dir.is_dir() {
            return Ok(None);
        }

        let manifest_raw = fs::read_to_string(dir.join(MANIFEST_FILE)).map_err(|e| {
            StorageError::CorruptEntry {
                key: key.to_string(),
                reason: format!("manifest unreadable: {}", e),
            }
        })?;
        let manifest: CacheManifest = toml::from_str(&manifest_raw)?;

        let ticks = read_ticks(&dir.join(TICKS_FILE))?;
        let events = JsonlReader::<RecordingEvents>::new(dir.join(EVENTS_FILE)).read_all()?;

        debug!("Cache hit for key {}", key);
        Ok(Some(CachedMerge {
            ticks,
            events,
            manifest,
        }))
    }

    /// Store a merge result under `key`, atomically.
    pub fn store(
        &self,
        key: &str,
        manifest: &CacheManifest,
        ticks: &TickTable,
        events: &[RecordingEvents],
    ) -> Result<(), StorageError> {
        fs::create_dir_all(&self.cache_dir)?;

        let tmp = self.cache_dir.join(format!(".tmp-{}", key));
        if tmp.exists() {
            fs::remove_dir_all(&tmp)?;
        }
        fs::create_dir_all(&tmp)?;

        write_ticks(&tmp.join(TICKS_FILE), ticks)?;
        JsonlWriter::new(tmp.join(EVENTS_FILE)).write_all(events)?;
        fs::write(tmp.join(MANIFEST_FILE), toml::to_string_pretty(manifest)?)?;

        let dest = self.entry_dir(key);
        match fs::rename(&tmp, &dest) {
            Ok(()) => {
                info!("Stored merge result in cache entry {}", key);
                Ok(())
            }
            Err(e) if dest.is_dir() => {
                // A concurrent identical run won the rename race.
                warn!("Cache entry {} already exists, discarding duplicate", key);
                let _ = fs::remove_dir_all(&tmp);
                debug!("Rename failed with: {}", e);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// All complete entries as (key, manifest), sorted by key.
    pub fn entries(&self) -> Result<Vec<(String, CacheManifest)>, StorageError> {
        if !self.cache_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.cache_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || !entry.file_type()?.is_dir() {
                continue;
            }
            let manifest_path = entry.path().join(MANIFEST_FILE);
            let Ok(raw) = fs::read_to_string(&manifest_path) else {
                warn!("Cache entry {} has no readable manifest, skipping", name);
                continue;
            };
            match toml::from_str(&raw) {
                Ok(manifest) => entries.push((name, manifest)),
                Err(e) => warn!("Cache entry {} manifest unparseable: {}", name, e),
            }
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }

    /// Remove every entry. Returns the number removed.
    pub fn clear(&self) -> Result<usize, StorageError> {
        if !self.cache_dir.is_dir() {
            return Ok(0);
        }
        let mut removed = 0;
        for entry in fs::read_dir(&self.cache_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                fs::remove_dir_all(entry.path())?;
                removed += 1;
            }
        }
        info!("Cleared {} cache entries", removed);
        Ok(removed)
    }
}
