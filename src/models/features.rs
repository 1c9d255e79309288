//! Derived feature models.
//!
//! A `FeatureSummary` is the per-(player, map) statistical fingerprint the
//! similarity scorer compares. Summaries are computed on demand from a
//! tick table slice and never persisted.

/// Fixed-resolution 2D occupancy histogram over player positions,
/// normalized to a probability mass function.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialHistogram {
    bins: usize,
    mass: Vec<f64>,
}

impl SpatialHistogram {
    /// Build a `bins`×`bins` histogram over (x, y) positions and normalize
    /// it so the mass sums to 1. Non-finite positions are skipped. With no
    /// usable positions the histogram stays all-zero; comparisons treat
    /// that as similarity 0, never as a division fault.
    ///
    /// Bin edges are data-driven (min..max per axis), matching how the
    /// occupancy maps were always built for these comparisons.
    pub fn from_positions(xs: &[f64], ys: &[f64], bins: usize) -> Self {
        let mut mass = vec![0.0; bins * bins];

        let pairs: Vec<(f64, f64)> = xs
            .iter()
            .zip(ys.iter())
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .map(|(x, y)| (*x, *y))
            .collect();

        if pairs.is_empty() || bins == 0 {
            return Self { bins, mass };
        }

        let (mut x_min, mut x_max) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut y_min, mut y_max) = (f64::INFINITY, f64::NEG_INFINITY);
        for &(x, y) in &pairs {
            x_min = x_min.min(x);
            x_max = x_max.max(x);
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }

        let x_span = (x_max - x_min).max(f64::MIN_POSITIVE);
        let y_span = (y_max - y_min).max(f64::MIN_POSITIVE);

        for (x, y) in pairs {
            let bx = (((x - x_min) / x_span) * bins as f64) as usize;
            let by = (((y - y_min) / y_span) * bins as f64) as usize;
            let bx = bx.min(bins - 1);
            let by = by.min(bins - 1);
            mass[bx * bins + by] += 1.0;
        }

        let total: f64 = mass.iter().sum();
        if total > 0.0 {
            for m in &mut mass {
                *m /= total;
            }
        }

        Self { bins, mass }
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Flattened bin masses, row-major, summing to 1 (or all zero).
    pub fn mass(&self) -> &[f64] {
        &self.mass
    }

    /// True when no position ever landed in a bin.
    pub fn is_zero(&self) -> bool {
        self.mass.iter().all(|&m| m == 0.0)
    }
}

/// The six angular-motion derivative sequences for one player slice:
/// yaw/pitch × speed/acceleration/smoothness.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AngularSignals {
    pub yaw_speed: Vec<f64>,
    pub yaw_acceleration: Vec<f64>,
    pub yaw_smoothness: Vec<f64>,
    pub pitch_speed: Vec<f64>,
    pub pitch_acceleration: Vec<f64>,
    pub pitch_smoothness: Vec<f64>,
}

impl AngularSignals {
    /// The six signals with their names, in a fixed order.
    pub fn signals(&self) -> [(&'static str, &[f64]); 6] {
        [
            ("yaw_speed", self.yaw_speed.as_slice()),
            ("yaw_acceleration", self.yaw_acceleration.as_slice()),
            ("yaw_smoothness", self.yaw_smoothness.as_slice()),
            ("pitch_speed", self.pitch_speed.as_slice()),
            ("pitch_acceleration", self.pitch_acceleration.as_slice()),
            ("pitch_smoothness", self.pitch_smoothness.as_slice()),
        ]
    }
}

/// Per-(player, map) behavioral fingerprint.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSummary {
    /// Player this summary was extracted for.
    pub player_name: String,

    /// Map restriction, if one was applied.
    pub map_name: Option<String>,

    /// Number of ticks in the underlying slice.
    pub tick_count: usize,

    /// Positional occupancy pmf.
    pub heatmap: SpatialHistogram,

    /// Per-axis sample variance of the aim-punch angle. NaN for axes with
    /// fewer than two samples; the scorer degrades those to similarity 0.
    pub aim_variance: Vec<f64>,

    /// Fraction of ticks spent crouched.
    pub ducking_fraction: f64,

    /// Fraction of ticks spent airborne.
    pub airborne_fraction: f64,

    /// Fraction of ticks with velocity below the standing threshold.
    pub standing_still: f64,

    /// Fraction of ticks with velocity above the standing threshold.
    pub moving: f64,

    /// Angular derivative distributions, present when the requested
    /// metric needs them.
    pub angular: Option<AngularSignals>,
}

impl FeatureSummary {
    /// True when the underlying slice had no ticks. Callers skip empty
    /// summaries instead of scoring them.
    pub fn is_empty(&self) -> bool {
        self.tick_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_sums_to_one() {
        let xs = [0.0, 1.0, 2.0, 3.0, 10.0];
        let ys = [0.0, 5.0, 2.0, 8.0, 10.0];
        let h = SpatialHistogram::from_positions(&xs, &ys, 50);
        let total: f64 = h.mass().iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!(!h.is_zero());
    }

    #[test]
    fn test_histogram_empty_is_zero() {
        let h = SpatialHistogram::from_positions(&[], &[], 50);
        assert!(h.is_zero());
        assert_eq!(h.mass().len(), 50 * 50);
    }

    #[test]
    fn test_histogram_skips_nan_positions() {
        let xs = [f64::NAN, 1.0];
        let ys = [0.0, 1.0];
        let h = SpatialHistogram::from_positions(&xs, &ys, 10);
        let total: f64 = h.mass().iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_histogram_single_point() {
        // Degenerate span: everything lands in one bin, still a valid pmf.
        let h = SpatialHistogram::from_positions(&[5.0, 5.0], &[3.0, 3.0], 50);
        let total: f64 = h.mass().iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert_eq!(h.mass().iter().filter(|&&m| m > 0.0).count(), 1);
    }

    #[test]
    fn test_angular_signals_order() {
        let signals = AngularSignals::default();
        let names: Vec<&str> = signals.signals().iter().map(|(n, _)| *n).collect();
        assert_eq!(
            names,
            vec![
                "yaw_speed",
                "yaw_acceleration",
                "yaw_smoothness",
                "pitch_speed",
                "pitch_acceleration",
                "pitch_smoothness"
            ]
        );
    }
}
