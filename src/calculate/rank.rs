//! Field discrimination ranking.
//!
//! A diagnostic for choosing telemetry fields worth comparing: a field is
//! discriminative when each player is self-consistent on it (low average
//! per-player variance) while players differ from each other (high spread
//! of per-player means). Fields are ranked by (ascending average
//! variance, descending mean difference).

use std::collections::BTreeMap;

use tracing::debug;

use super::metrics::{mean_finite, sample_variance};
use super::CalculateError;
use crate::models::{TableError, TickTable};

/// Discrimination summary for one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDiscrimination {
    pub field: String,

    /// Mean of the per-player sample variances.
    pub avg_variance: f64,

    /// Spread between the highest and lowest per-player mean.
    pub mean_difference: f64,
}

/// Rank scalar fields by how well they discriminate between players.
pub fn rank_fields(
    ticks: &TickTable,
    fields: &[String],
) -> Result<Vec<FieldDiscrimination>, CalculateError> {
    // Row indices per player, across every match.
    let mut by_player: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, player) in ticks.player_names().iter().enumerate() {
        by_player.entry(player.as_str()).or_default().push(i);
    }

    let mut ranked = Vec::with_capacity(fields.len());
    for field in fields {
        let values = match ticks.scalar(field) {
            Ok(v) => v,
            Err(TableError::UnknownColumn(name)) => {
                return Err(CalculateError::FieldNotFound(name));
            }
            Err(_) => return Err(CalculateError::NotScalar(field.clone())),
        };

        let mut variances = Vec::new();
        let mut means = Vec::new();
        for indices in by_player.values() {
            let player_values: Vec<f64> = indices.iter().map(|&i| values[i]).collect();
            let variance = sample_variance(&player_values);
            if variance.is_finite() {
                variances.push(variance);
            }
            if let Some(mean) = mean_finite(&player_values) {
                means.push(mean);
            }
        }

        let avg_variance = mean_finite(&variances).unwrap_or(0.0);
        let mean_difference = match (
            means.iter().copied().reduce(f64::max),
            means.iter().copied().reduce(f64::min),
        ) {
            (Some(max), Some(min)) => max - min,
            _ => 0.0,
        };

        debug!(
            "Field {}: avg variance {:.6}, mean difference {:.6}",
            field, avg_variance, mean_difference
        );
        ranked.push(FieldDiscrimination {
            field: field.clone(),
            avg_variance,
            mean_difference,
        });
    }

    ranked.sort_by(|a, b| {
        a.avg_variance
            .partial_cmp(&b.avg_variance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(
                b.mean_difference
                    .partial_cmp(&a.mean_difference)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
    });
    Ok(ranked)
}
