//! Demo decoder boundary.
//!
//! The real binary demo decoder is an external collaborator; this module
//! defines the shapes the pipeline consumes:
//! - `Decoder`: header / ticks / events of one recording
//! - `RecordingProvider`: discovery and opening of recordings
//!
//! Two implementations ship with the crate: `JsonFixtureDecoder` for JSON
//! recordings (CLI and integration tests) and `MockProvider` for
//! programmable in-memory recordings.

mod fixture;
mod mock;

pub use fixture::JsonFixtureDecoder;
pub use mock::{MockProvider, MockRecording};

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::{GameEvent, TickTable};

/// Errors raised at the decoder boundary.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Unsupported recording format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("Requested field absent from recording: {0}")]
    MissingField(String),

    #[error("Malformed recording {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error(transparent)]
    Table(#[from] crate::models::TableError),
}

/// Recording header metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Map the match was played on.
    pub map_name: String,
}

/// One decoded recording.
///
/// `parse_ticks` returns a table whose identity columns carry
/// `player_name` and `steam_id`; `match_id` and `map_name` are stamped by
/// the merger afterwards.
pub trait Decoder {
    fn parse_header(&self) -> Result<Header, DecodeError>;

    /// Per-tick telemetry restricted to the requested fields. A field the
    /// recording never carries is an error, per the fail-fast validation
    /// contract.
    fn parse_ticks(&self, fields: &[String]) -> Result<TickTable, DecodeError>;

    /// Events filtered by name; an empty list or `["all"]` returns every
    /// event.
    fn parse_events(&self, names: &[String]) -> Result<Vec<GameEvent>, DecodeError>;
}

/// Discovers recordings under a directory and opens them for decoding.
pub trait RecordingProvider {
    /// Recording paths under `folder`, recursively, in sorted order.
    fn discover(&self, folder: &Path) -> Result<Vec<PathBuf>, DecodeError>;

    fn open(&self, path: &Path) -> Result<Box<dyn Decoder>, DecodeError>;
}

/// Filesystem provider dispatching on file extension.
pub struct FsProvider {
    extension: String,
}

impl FsProvider {
    /// `extension` is matched without a leading dot (e.g. `"json"`).
    pub fn new(extension: impl Into<String>) -> Self {
        let mut extension = extension.into();
        if let Some(stripped) = extension.strip_prefix('.') {
            extension = stripped.to_string();
        }
        Self { extension }
    }
}

impl Default for FsProvider {
    fn default() -> Self {
        Self::new("json")
    }
}

impl RecordingProvider for FsProvider {
    fn discover(&self, folder: &Path) -> Result<Vec<PathBuf>, DecodeError> {
        if !folder.is_dir() {
            return Err(DecodeError::NotADirectory(folder.to_path_buf()));
        }
        let pattern = folder
            .join("**")
            .join(format!("*.{}", self.extension))
            .to_string_lossy()
            .into_owned();

        let mut paths: Vec<PathBuf> = glob::glob(&pattern)?
            .filter_map(|entry| entry.ok())
            .filter(|p| p.is_file())
            .collect();
        paths.sort();
        Ok(paths)
    }

    fn open(&self, path: &Path) -> Result<Box<dyn Decoder>, DecodeError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(Box::new(JsonFixtureDecoder::open(path)?)),
            _ => Err(DecodeError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Derive the match identifier for a recording path:
/// `<containing-folder>_<file-stem>`. The folder prefix disambiguates
/// files with identical basenames across folders.
pub fn match_id_for_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string());
    let parent = path
        .parent()
        .and_then(|p| p.file_name())
        .map(|s| s.to_string_lossy().into_owned());
    match parent {
        Some(folder) => format!("{}_{}", folder, stem),
        None => stem,
    }
}
