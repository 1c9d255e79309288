//! Tick table merger.
//!
//! Turns a directory of recordings into one unified tick table tagged with
//! `match_id` and `map_name`, plus the per-recording event collections.
//! Results are memoized in the content-addressed merge cache keyed by the
//! request's defining parameters.
//!
//! A recording that fails to decode is skipped and reported; it never
//! aborts the rest of the batch. The merge materializes everything in
//! memory; the player allow-list is applied per recording, before
//! concatenation, to bound the common large-merge case.

use std::path::PathBuf;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::decode::{match_id_for_path, DecodeError, RecordingProvider};
use crate::models::{RecordingEvents, TableError, TickTable};
use crate::storage::{cache_key, CacheManifest, MergeCache, StorageError};

/// Errors raised by the merger.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error("All {0} recordings failed to decode")]
    AllFailed(usize),
}

/// Defining parameters of a merge call. These five values form the cache
/// key; two requests with equal parameters address the same cache entry.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeRequest {
    /// Directory searched recursively for recordings.
    pub folder: PathBuf,

    /// Telemetry fields to decode per tick.
    pub fields: Vec<String>,

    /// Player allow-list; empty keeps every player.
    pub players: Vec<String>,

    /// Maximum number of recordings to process.
    pub limit: Option<usize>,

    /// Keep only recordings played on this map.
    pub map_filter: Option<String>,
}

impl MergeRequest {
    pub fn new(folder: impl Into<PathBuf>, fields: Vec<String>) -> Self {
        Self {
            folder: folder.into(),
            fields,
            players: Vec::new(),
            limit: None,
            map_filter: None,
        }
    }

    /// Deterministic cache key for this request.
    pub fn cache_key(&self) -> String {
        let folder = self.folder.to_string_lossy();
        let fields = self.fields.join(",");
        let players = self.players.join(",");
        let limit = self.limit.map(|l| l.to_string()).unwrap_or_default();
        cache_key(&[
            folder.as_ref(),
            fields.as_str(),
            players.as_str(),
            limit.as_str(),
            self.map_filter.as_deref().unwrap_or(""),
        ])
    }

    fn manifest(&self) -> CacheManifest {
        CacheManifest {
            created_at: Utc::now(),
            source_path: self.folder.to_string_lossy().into_owned(),
            fields: self.fields.clone(),
            players: self.players.clone(),
            limit: self.limit,
            map_filter: self.map_filter.clone(),
        }
    }
}

/// A recording that could not be decoded, with the reason it was skipped.
#[derive(Debug)]
pub struct SkippedRecording {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of a merge call.
#[derive(Debug)]
pub struct MergeOutput {
    /// Unified tick table across all merged recordings.
    pub ticks: TickTable,

    /// Event collections, one per merged recording.
    pub events: Vec<RecordingEvents>,

    /// Recordings that failed to decode (empty on a cache hit).
    pub skipped: Vec<SkippedRecording>,

    /// Whether the result came from the cache without touching the
    /// decoder.
    pub from_cache: bool,
}

impl MergeOutput {
    /// Number of distinct recordings present in the merged table.
    pub fn merged_recordings(&self) -> usize {
        self.ticks.matches().len()
    }
}

/// Merge every recording under `request.folder`.
///
/// With a cache, an existing entry for the request key is returned
/// verbatim, without invoking the decoder; otherwise the merge runs and
/// the result is stored before returning.
pub fn merge_recordings(
    request: &MergeRequest,
    provider: &dyn RecordingProvider,
    cache: Option<&MergeCache>,
) -> Result<MergeOutput, MergeError> {
    let key = request.cache_key();
    if let Some(cache) = cache {
        if let Some(hit) = cache.lookup(&key)? {
            info!(
                "Cache hit {} ({} rows, {} recordings)",
                key,
                hit.ticks.len(),
                hit.ticks.matches().len()
            );
            return Ok(MergeOutput {
                ticks: hit.ticks,
                events: hit.events,
                skipped: Vec::new(),
                from_cache: true,
            });
        }
    }

    let mut paths = provider.discover(&request.folder)?;
    info!(
        "Found {} recordings under {:?}",
        paths.len(),
        request.folder
    );
    if let Some(limit) = request.limit {
        paths.truncate(limit);
    }
    let total = paths.len();

    let mut ticks = TickTable::new();
    let mut events = Vec::new();
    let mut skipped = Vec::new();

    for (index, path) in paths.iter().enumerate() {
        let match_id = match_id_for_path(path);
        match merge_one(request, provider, path, &match_id) {
            Ok(Some((recording_ticks, recording_events))) => {
                info!(
                    "[{}/{}] Merged {} ({} rows)",
                    index + 1,
                    total,
                    match_id,
                    recording_ticks.len()
                );
                ticks.append(recording_ticks)?;
                events.push(RecordingEvents::new(match_id, recording_events));
            }
            Ok(None) => {
                debug!("[{}/{}] Skipped {} (map filter)", index + 1, total, match_id);
            }
            Err(e) => {
                warn!("[{}/{}] Failed to decode {:?}: {}", index + 1, total, path, e);
                skipped.push(SkippedRecording {
                    path: path.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    if !skipped.is_empty() && events.is_empty() && skipped.len() == total {
        return Err(MergeError::AllFailed(total));
    }

    if let Some(cache) = cache {
        cache.store(&key, &request.manifest(), &ticks, &events)?;
    }

    Ok(MergeOutput {
        ticks,
        events,
        skipped,
        from_cache: false,
    })
}

/// Decode one recording. `Ok(None)` means the map filter excluded it.
fn merge_one(
    request: &MergeRequest,
    provider: &dyn RecordingProvider,
    path: &std::path::Path,
    match_id: &str,
) -> Result<Option<(TickTable, Vec<crate::models::GameEvent>)>, DecodeError> {
    let decoder = provider.open(path)?;
    let header = decoder.parse_header()?;

    if let Some(wanted) = &request.map_filter {
        if &header.map_name != wanted {
            return Ok(None);
        }
    }

    let mut recording_ticks = decoder.parse_ticks(&request.fields)?;
    recording_ticks.retain_players(&request.players);
    recording_ticks.assign_recording(match_id, &header.map_name);

    let recording_events = decoder.parse_events(&["all".to_string()])?;
    Ok(Some((recording_ticks, recording_events)))
}
