//! Statistics calculation engine.
//!
//! Computes derived metrics from merged tick tables:
//! - Angular derivative signals (speed, acceleration, smoothness)
//! - Per-player behavioral feature summaries
//! - Similarity scoring and candidate ranking
//! - Roster self/other evaluation
//! - Boolean fraction-of-time-active statistics
//! - Field discrimination ranking
//!
//! Everything in this module is pure: functions of their input tables,
//! no I/O and no caching. Degenerate statistical inputs (empty slices,
//! zero variance, zero-sum histograms) resolve to sentinel values and are
//! logged, never propagated as numeric faults.

pub mod boolean;
pub mod derivatives;
pub mod evaluate;
pub mod features;
pub mod metrics;
pub mod rank;
pub mod similarity;

use thiserror::Error;

/// Errors raised by statistics computations.
///
/// These are input-validation failures only; degenerate numeric cases
/// degrade to sentinel values instead of erroring.
#[derive(Debug, Error)]
pub enum CalculateError {
    #[error("Field not found in tick table: {0}")]
    FieldNotFound(String),

    #[error("Field {0} is not scalar; decompose vector columns first")]
    NotScalar(String),

    #[error(transparent)]
    Table(#[from] crate::models::TableError),
}
