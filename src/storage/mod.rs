//! On-disk storage.
//!
//! Handles the merge result cache and its serialization formats:
//! - Parquet tick tables (columnar, Snappy-compressed)
//! - JSONL event collections
//! - TOML cache manifests

mod cache;
mod jsonl;
mod parquet;

pub use cache::{cache_key, CacheManifest, CachedMerge, MergeCache};
pub use jsonl::{JsonlReader, JsonlWriter};
pub use parquet::{read_ticks, write_ticks};

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Manifest serialization error: {0}")]
    ManifestWrite(#[from] toml::ser::Error),

    #[error("Manifest parse error: {0}")]
    ManifestRead(#[from] toml::de::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] ::parquet::errors::ParquetError),

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Corrupt cache entry {key}: {reason}")]
    CorruptEntry { key: String, reason: String },

    #[error(transparent)]
    Table(#[from] crate::models::TableError),
}
