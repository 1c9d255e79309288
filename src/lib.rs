//! # demoscope
//!
//! Offline analytics for esports demo recordings.
//!
//! ## Architecture
//!
//! - **models**: Core data structures (tick tables, events, feature summaries)
//! - **decode**: Decoder boundary for recordings (trait, JSON fixtures, mock)
//! - **merge**: Tick table merger with content-addressed caching
//! - **calculate**: Statistics and similarity computation
//! - **storage**: On-disk cache (Parquet, JSONL, TOML manifests)
//! - **config**: Configuration loading and validation

pub mod calculate;
pub mod config;
pub mod decode;
pub mod merge;
pub mod models;
pub mod storage;

pub use models::*;
