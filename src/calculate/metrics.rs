//! Statistical distance primitives.
//!
//! Small numeric kernels shared by the similarity strategies. Degenerate
//! inputs (empty samples, zero norms, zero-mass distributions) return
//! `None`; callers map that to sentinel similarity 0.

/// Mean of the finite values, if any.
pub fn mean_finite(values: &[f64]) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for &v in values {
        if v.is_finite() {
            sum += v;
            count += 1;
        }
    }
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Sample variance (n - 1 denominator) over the finite values.
///
/// Fewer than two finite samples yield NaN, mirroring how the variance of
/// a near-empty series is undefined rather than zero.
pub fn sample_variance(values: &[f64]) -> f64 {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.len() < 2 {
        return f64::NAN;
    }
    let mean = finite.iter().sum::<f64>() / finite.len() as f64;
    let ss: f64 = finite.iter().map(|v| (v - mean) * (v - mean)).sum();
    ss / (finite.len() - 1) as f64
}

/// Fixed-bin histogram counts over the finite values, with data-driven
/// range. Empty input yields all-zero counts.
pub fn histogram(values: &[f64], bins: usize) -> Vec<f64> {
    let mut counts = vec![0.0; bins];
    if bins == 0 {
        return counts;
    }
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return counts;
    }

    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = (max - min).max(f64::MIN_POSITIVE);

    for v in finite {
        let bin = (((v - min) / span) * bins as f64) as usize;
        counts[bin.min(bins - 1)] += 1.0;
    }
    counts
}

/// Normalize histogram counts into a probability mass function.
/// A zero-sum histogram stays zero.
pub fn density(counts: &[f64]) -> Vec<f64> {
    let total: f64 = counts.iter().sum();
    if total <= 0.0 {
        return counts.to_vec();
    }
    counts.iter().map(|c| c / total).collect()
}

/// Jensen-Shannon divergence between two probability mass functions,
/// base 2, bounded in [0, 1]. `None` when either side carries no mass.
pub fn jensen_shannon(p: &[f64], q: &[f64]) -> Option<f64> {
    if p.len() != q.len() {
        return None;
    }
    let p_sum: f64 = p.iter().sum();
    let q_sum: f64 = q.iter().sum();
    if p_sum <= 0.0 || q_sum <= 0.0 {
        return None;
    }

    let mut js = 0.0;
    for (&pi, &qi) in p.iter().zip(q.iter()) {
        let m = (pi + qi) / 2.0;
        if pi > 0.0 {
            js += 0.5 * pi * (pi / m).log2();
        }
        if qi > 0.0 {
            js += 0.5 * qi * (qi / m).log2();
        }
    }
    // Floating error can push an exact-match divergence slightly negative.
    Some(js.clamp(0.0, 1.0))
}

/// 1-D Wasserstein (earth-mover) distance between two empirical samples.
/// Unbounded. `None` when either sample has no finite values.
pub fn wasserstein_1d(a: &[f64], b: &[f64]) -> Option<f64> {
    let mut a: Vec<f64> = a.iter().copied().filter(|v| v.is_finite()).collect();
    let mut b: Vec<f64> = b.iter().copied().filter(|v| v.is_finite()).collect();
    if a.is_empty() || b.is_empty() {
        return None;
    }
    a.sort_by(f64::total_cmp);
    b.sort_by(f64::total_cmp);

    let mut all: Vec<f64> = a.iter().chain(b.iter()).copied().collect();
    all.sort_by(f64::total_cmp);

    // Integrate |F_a - F_b| over the merged support.
    let mut distance = 0.0;
    for w in all.windows(2) {
        let delta = w[1] - w[0];
        if delta <= 0.0 {
            continue;
        }
        let ca = a.partition_point(|&v| v <= w[0]) as f64 / a.len() as f64;
        let cb = b.partition_point(|&v| v <= w[0]) as f64 / b.len() as f64;
        distance += (ca - cb).abs() * delta;
    }
    Some(distance)
}

/// Cosine similarity between two equal-length vectors. `None` when either
/// vector has zero norm or a non-finite component.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let mut dot = 0.0;
    let mut na = 0.0;
    let mut nb = 0.0;
    for (&x, &y) in a.iter().zip(b.iter()) {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na <= 0.0 || nb <= 0.0 {
        return None;
    }
    Some(dot / (na.sqrt() * nb.sqrt()))
}

/// Mahalanobis distance with identity covariance (Euclidean distance).
/// `None` on length mismatch, empty input or non-finite components,
/// the degenerate cases that historically made this metric raise.
pub fn mahalanobis_identity(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let mut ss = 0.0;
    for (&x, &y) in a.iter().zip(b.iter()) {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        ss += (x - y) * (x - y);
    }
    Some(ss.sqrt())
}
