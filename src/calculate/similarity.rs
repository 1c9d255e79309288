//! Similarity scoring and candidate ranking.
//!
//! Two strategies over angular-motion distributions, plus the older
//! full-feature weighted score kept as a selectable diagnostic:
//!
//! - `AngularJs` (canonical): Jensen-Shannon divergence between 50-bin
//!   density histograms of the six derivative signals, averaged and
//!   converted to similarity as `1 - mean_distance`. Bounded in [0, 1].
//! - `AngularWasserstein`: earth-mover distance between the raw
//!   derivative samples. Unbounded, so the "similarity" can go negative.
//!   That asymmetry is inherent to the metric and deliberately not
//!   clamped; ranking stays well-defined.
//! - `FullFeature`: heatmap JS similarity weighted 0.8 plus 0.2 each for
//!   aim-variance, ducking, airborne and movement similarities. The
//!   weights sum to more than 1, so scores can exceed 1 at the edges;
//!   consumers must tolerate out-of-range values.

use std::fmt;
use std::str::FromStr;

use tracing::warn;

use super::metrics::{
    cosine_similarity, density, histogram, jensen_shannon, mahalanobis_identity, wasserstein_1d,
};
use crate::models::{FeatureSummary, SpatialHistogram};

/// Scoring strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Metric {
    /// Angular-motion Jensen-Shannon. Canonical and bounded.
    #[default]
    AngularJs,

    /// Angular-motion Wasserstein. Diagnostic; unbounded.
    AngularWasserstein,

    /// Weighted full-feature score. Diagnostic; can exceed 1.
    FullFeature,
}

impl Metric {
    /// Whether feature extraction must produce angular signals.
    pub fn needs_angular(&self) -> bool {
        matches!(self, Metric::AngularJs | Metric::AngularWasserstein)
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "js" => Ok(Metric::AngularJs),
            "wasserstein" => Ok(Metric::AngularWasserstein),
            "full" => Ok(Metric::FullFeature),
            other => Err(format!(
                "unknown metric {:?} (expected js, wasserstein or full)",
                other
            )),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::AngularJs => write!(f, "js"),
            Metric::AngularWasserstein => write!(f, "wasserstein"),
            Metric::FullFeature => write!(f, "full"),
        }
    }
}

/// Scoring knobs.
#[derive(Debug, Clone)]
pub struct SimilarityOptions {
    /// Bin count for the per-signal density histograms.
    pub bins: usize,

    /// Heatmap weight in the full-feature score.
    pub heatmap_weight: f64,
}

impl Default for SimilarityOptions {
    fn default() -> Self {
        Self {
            bins: 50,
            heatmap_weight: 0.8,
        }
    }
}

/// One ranked reference player.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub player_name: String,
    pub score: f64,
}

/// Score a candidate summary against a reference summary.
/// Higher is more similar; degenerate pairings score 0.
pub fn score(
    metric: Metric,
    candidate: &FeatureSummary,
    reference: &FeatureSummary,
    options: &SimilarityOptions,
) -> f64 {
    let value = match metric {
        Metric::AngularJs => angular_score(candidate, reference, options, false),
        Metric::AngularWasserstein => angular_score(candidate, reference, options, true),
        Metric::FullFeature => full_feature_score(candidate, reference, options),
    };
    if value.is_finite() {
        value
    } else {
        warn!(
            "Non-finite {} score for {} vs {}, degrading to 0",
            metric, candidate.player_name, reference.player_name
        );
        0.0
    }
}

/// Similarity between two positional occupancy histograms:
/// `1 - JS divergence`. Either side without mass compares as 0.
pub fn heatmap_similarity(a: &SpatialHistogram, b: &SpatialHistogram) -> f64 {
    if a.is_zero() || b.is_zero() {
        return 0.0;
    }
    match jensen_shannon(a.mass(), b.mass()) {
        Some(js) => 1.0 - js,
        None => 0.0,
    }
}

/// Mean-distance score over the six angular derivative signals.
///
/// A signal with no usable samples on either side is excluded from the
/// average and logged; when every signal is degenerate the pairing scores
/// 0 so the audit trail explains the zero.
fn angular_score(
    candidate: &FeatureSummary,
    reference: &FeatureSummary,
    options: &SimilarityOptions,
    use_wasserstein: bool,
) -> f64 {
    let (Some(cand), Some(refr)) = (&candidate.angular, &reference.angular) else {
        warn!(
            "Angular signals missing for {} vs {}, scoring 0",
            candidate.player_name, reference.player_name
        );
        return 0.0;
    };

    let mut distances = Vec::with_capacity(6);
    for ((name, a), (_, b)) in cand.signals().iter().zip(refr.signals().iter()) {
        let distance = if use_wasserstein {
            wasserstein_1d(a, b)
        } else {
            jensen_shannon(
                &density(&histogram(a, options.bins)),
                &density(&histogram(b, options.bins)),
            )
        };
        match distance {
            Some(d) => distances.push(d),
            None => warn!(
                "Signal {} degenerate for {} vs {}, excluded from average",
                name, candidate.player_name, reference.player_name
            ),
        }
    }

    if distances.is_empty() {
        warn!(
            "All angular signals degenerate for {} vs {}, scoring 0",
            candidate.player_name, reference.player_name
        );
        return 0.0;
    }

    let mean_distance: f64 = distances.iter().sum::<f64>() / distances.len() as f64;
    1.0 - mean_distance
}

/// The older combined score: heatmap-heavy weighted sum.
fn full_feature_score(
    candidate: &FeatureSummary,
    reference: &FeatureSummary,
    options: &SimilarityOptions,
) -> f64 {
    let heatmap = heatmap_similarity(&candidate.heatmap, &reference.heatmap);

    let aim = match mahalanobis_identity(&candidate.aim_variance, &reference.aim_variance) {
        Some(d) => 1.0 / (1.0 + d),
        None => {
            warn!(
                "Degenerate aim variance for {} vs {}, aim similarity 0",
                candidate.player_name, reference.player_name
            );
            0.0
        }
    };

    let ducking = 1.0 - (candidate.ducking_fraction - reference.ducking_fraction).abs();
    let airborne = 1.0 - (candidate.airborne_fraction - reference.airborne_fraction).abs();

    let movement = cosine_similarity(
        &[candidate.standing_still, candidate.moving],
        &[reference.standing_still, reference.moving],
    )
    .unwrap_or_else(|| {
        warn!(
            "Degenerate movement vector for {} vs {}, movement similarity 0",
            candidate.player_name, reference.player_name
        );
        0.0
    });

    options.heatmap_weight * heatmap + 0.2 * aim + 0.2 * ducking + 0.2 * airborne + 0.2 * movement
}

/// Score one candidate against every reference, descending by score.
///
/// Empty reference summaries are skipped, not scored; ties keep the
/// references' enumeration order (the sort is stable).
pub fn rank_candidates(
    candidate: &FeatureSummary,
    references: &[FeatureSummary],
    metric: Metric,
    options: &SimilarityOptions,
) -> Vec<RankedCandidate> {
    if candidate.is_empty() {
        warn!(
            "Candidate {} has no ticks, nothing to rank",
            candidate.player_name
        );
        return Vec::new();
    }

    let mut ranked: Vec<RankedCandidate> = references
        .iter()
        .filter(|r| {
            if r.is_empty() {
                warn!("Reference {} has no ticks, skipped", r.player_name);
                false
            } else {
                true
            }
        })
        .map(|r| RankedCandidate {
            player_name: r.player_name.clone(),
            score: score(metric, candidate, r, options),
        })
        .collect();

    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AngularSignals;

    fn angular_summary(name: &str, base: f64) -> FeatureSummary {
        angular_summary_shaped(name, base, |i| (i % 7) as f64)
    }

    fn angular_summary_shaped(name: &str, base: f64, shape: impl Fn(usize) -> f64) -> FeatureSummary {
        let seq: Vec<f64> = (0..200).map(|i| base + shape(i)).collect();
        let signals = AngularSignals {
            yaw_speed: seq.clone(),
            yaw_acceleration: seq.clone(),
            yaw_smoothness: seq.clone(),
            pitch_speed: seq.clone(),
            pitch_acceleration: seq.clone(),
            pitch_smoothness: seq,
        };
        FeatureSummary {
            player_name: name.to_string(),
            map_name: None,
            tick_count: 200,
            heatmap: SpatialHistogram::from_positions(
                &[base, base + 1.0, base + 2.0],
                &[0.0, 1.0, 2.0],
                50,
            ),
            aim_variance: vec![0.1, 0.2, 0.3],
            ducking_fraction: 0.25,
            airborne_fraction: 0.1,
            standing_still: 0.4,
            moving: 0.6,
            angular: Some(signals),
        }
    }

    #[test]
    fn test_js_identical_scores_one() {
        let a = angular_summary("alpha", 0.0);
        let s = score(Metric::AngularJs, &a, &a, &SimilarityOptions::default());
        assert!((s - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_js_score_bounded() {
        let a = angular_summary("alpha", 0.0);
        let b = angular_summary_shaped("beta", 0.0, |i| ((i % 2) * 6) as f64);
        let s = score(Metric::AngularJs, &a, &b, &SimilarityOptions::default());
        assert!((0.0..1.0).contains(&s));
    }

    #[test]
    fn test_wasserstein_can_go_negative() {
        let a = angular_summary("alpha", 0.0);
        let b = angular_summary("beta", 1000.0);
        let s = score(
            Metric::AngularWasserstein,
            &a,
            &b,
            &SimilarityOptions::default(),
        );
        assert!(s < 0.0);
    }

    #[test]
    fn test_missing_angular_scores_zero() {
        let mut a = angular_summary("alpha", 0.0);
        a.angular = None;
        let b = angular_summary("beta", 0.0);
        let s = score(Metric::AngularJs, &a, &b, &SimilarityOptions::default());
        assert_eq!(s, 0.0);
    }

    #[test]
    fn test_full_feature_identical() {
        let a = angular_summary("alpha", 0.0);
        let s = score(Metric::FullFeature, &a, &a, &SimilarityOptions::default());
        // 0.8·1 + 0.2·(1 + 1 + 1 + 1): the legacy weights overshoot 1.
        assert!((s - 1.6).abs() < 1e-9);
    }

    #[test]
    fn test_full_feature_zero_mass_heatmap() {
        let mut a = angular_summary("alpha", 0.0);
        a.heatmap = SpatialHistogram::from_positions(&[], &[], 50);
        let b = angular_summary("beta", 0.0);
        let s = score(Metric::FullFeature, &a, &b, &SimilarityOptions::default());
        // Heatmap contributes nothing; the remaining terms stay bounded.
        assert!(s <= 0.2 * 4.0 + 1e-9);
    }

    #[test]
    fn test_heatmap_similarity_identical() {
        let h = SpatialHistogram::from_positions(&[0.0, 1.0, 2.0], &[0.0, 1.0, 2.0], 50);
        assert!((heatmap_similarity(&h, &h) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_rank_descending_and_stable() {
        let candidate = angular_summary("candidate", 0.0);
        let close = angular_summary("close", 0.0);
        // Different distribution shape, not just a location shift:
        // per-side data-driven binning makes histograms shift-invariant.
        let far = angular_summary_shaped("far", 0.0, |i| ((i % 2) * 6) as f64);
        let far_twin = angular_summary_shaped("far_twin", 0.0, |i| ((i % 2) * 6) as f64);

        let ranked = rank_candidates(
            &candidate,
            &[far, close, far_twin],
            Metric::AngularJs,
            &SimilarityOptions::default(),
        );
        assert_eq!(ranked[0].player_name, "close");
        // Equal scores keep enumeration order: far before far_twin.
        assert_eq!(ranked[1].player_name, "far");
        assert_eq!(ranked[2].player_name, "far_twin");
    }

    #[test]
    fn test_rank_skips_empty_references() {
        let candidate = angular_summary("candidate", 0.0);
        let mut empty = angular_summary("empty", 0.0);
        empty.tick_count = 0;

        let ranked = rank_candidates(
            &candidate,
            &[empty],
            Metric::AngularJs,
            &SimilarityOptions::default(),
        );
        assert!(ranked.is_empty());
    }

    #[test]
    fn test_metric_parse() {
        assert_eq!("js".parse::<Metric>().unwrap(), Metric::AngularJs);
        assert_eq!(
            "wasserstein".parse::<Metric>().unwrap(),
            Metric::AngularWasserstein
        );
        assert_eq!("full".parse::<Metric>().unwrap(), Metric::FullFeature);
        assert!("bogus".parse::<Metric>().is_err());
    }
}
