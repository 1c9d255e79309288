//! Feature extraction.
//!
//! Reduces a tick table slice for a single player (optionally restricted
//! to one map) into a `FeatureSummary`. Pure: a function of its input
//! table only: no I/O, no caching.
//!
//! Missing-data policy: a boolean/occupancy column absent from the slice
//! defaults to fraction 0; scalar NaNs are excluded from histograms,
//! variances and fraction denominators; absent position columns leave the
//! heatmap all-zero (which compares as similarity 0 downstream).

use tracing::{debug, warn};

use super::derivatives::compute_derivatives;
use super::metrics::{mean_finite, sample_variance};
use crate::models::{AngularSignals, FeatureSummary, SpatialHistogram, TickTable};

/// Well-known telemetry field names.
pub mod fields {
    pub const POS_X: &str = "X";
    pub const POS_Y: &str = "Y";
    pub const VELOCITY: &str = "velocity";
    pub const DUCK_AMOUNT: &str = "duck_amount";
    pub const IS_AIRBORNE: &str = "is_airborne";
    pub const AIM_PUNCH: &str = "aim_punch_angle";
    pub const YAW: &str = "yaw";
    pub const PITCH: &str = "pitch";
}

/// Extraction knobs.
#[derive(Debug, Clone)]
pub struct FeatureOptions {
    /// Heatmap resolution per axis.
    pub heatmap_bins: usize,

    /// Velocity below this counts as standing still, above as moving.
    pub standing_speed_threshold: f64,

    /// Compute the six angular derivative sequences (needed by the
    /// angular similarity strategies; skipped otherwise, since
    /// derivatives over long slices are the expensive part).
    pub include_angular: bool,
}

impl Default for FeatureOptions {
    fn default() -> Self {
        Self {
            heatmap_bins: 50,
            standing_speed_threshold: 5.0,
            include_angular: false,
        }
    }
}

/// Extract the feature summary for one player.
pub fn extract_features(
    ticks: &TickTable,
    player: &str,
    map: Option<&str>,
    options: &FeatureOptions,
) -> FeatureSummary {
    let slice = ticks.player_slice(player, map);
    debug!(
        "Extracting features for {} ({} ticks, map {:?})",
        player,
        slice.len(),
        map
    );

    let heatmap = match (slice.scalar(fields::POS_X), slice.scalar(fields::POS_Y)) {
        (Ok(xs), Ok(ys)) => SpatialHistogram::from_positions(xs, ys, options.heatmap_bins),
        _ => SpatialHistogram::from_positions(&[], &[], options.heatmap_bins),
    };

    let aim_variance: Vec<f64> = ["_X", "_Y", "_Z"]
        .iter()
        .filter_map(|suffix| {
            slice
                .scalar(&format!("{}{}", fields::AIM_PUNCH, suffix))
                .ok()
                .map(sample_variance)
        })
        .collect();

    let ducking_fraction = boolean_fraction(&slice, fields::DUCK_AMOUNT);
    let airborne_fraction = boolean_fraction(&slice, fields::IS_AIRBORNE);

    let (standing_still, moving) = match slice.scalar(fields::VELOCITY) {
        Ok(velocity) => {
            let finite: Vec<f64> = velocity.iter().copied().filter(|v| v.is_finite()).collect();
            if finite.is_empty() {
                (0.0, 0.0)
            } else {
                let n = finite.len() as f64;
                let below = finite
                    .iter()
                    .filter(|&&v| v < options.standing_speed_threshold)
                    .count() as f64;
                let above = finite
                    .iter()
                    .filter(|&&v| v > options.standing_speed_threshold)
                    .count() as f64;
                (below / n, above / n)
            }
        }
        Err(_) => (0.0, 0.0),
    };

    let angular = if options.include_angular {
        Some(extract_angular(&slice))
    } else {
        None
    };

    FeatureSummary {
        player_name: player.to_string(),
        map_name: map.map(|m| m.to_string()),
        tick_count: slice.len(),
        heatmap,
        aim_variance,
        ducking_fraction,
        airborne_fraction,
        standing_still,
        moving,
        angular,
    }
}

/// Mean of a 0/1 column; absent column defaults to 0.
fn boolean_fraction(slice: &TickTable, field: &str) -> f64 {
    slice
        .scalar(field)
        .ok()
        .and_then(mean_finite)
        .unwrap_or(0.0)
}

/// The six angular derivative sequences of a single-player slice.
///
/// Derivatives still group by (player, match) internally, so a slice
/// spanning several recordings never differences across a recording
/// boundary.
fn extract_angular(slice: &TickTable) -> AngularSignals {
    let mut work = slice.clone();
    let mut props = Vec::new();
    for prop in [fields::YAW, fields::PITCH] {
        if work.scalar(prop).is_ok() {
            props.push(prop);
        }
    }
    if !props.is_empty() {
        // Only fails on absent/non-scalar columns, which were filtered out.
        if let Err(e) = compute_derivatives(&mut work, &props) {
            warn!("Angular derivative computation failed: {}", e);
        }
    }

    let take = |name: &str| work.scalar(name).map(|v| v.to_vec()).unwrap_or_default();
    AngularSignals {
        yaw_speed: take("yaw_speed"),
        yaw_acceleration: take("yaw_acceleration"),
        yaw_smoothness: take("yaw_smoothness"),
        pitch_speed: take("pitch_speed"),
        pitch_acceleration: take("pitch_acceleration"),
        pitch_smoothness: take("pitch_smoothness"),
    }
}
