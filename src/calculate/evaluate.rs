//! Roster self/other evaluation.
//!
//! For a configured roster of players of interest, score every player's
//! new-session features against their own known-session features
//! (self-similarity) and against every other roster player
//! (other-similarity), then aggregate both groups. Used to check
//! empirically that self scores separate from other scores: a
//! statistical property of the aggregates, not a per-pair guarantee.

use tracing::{info, warn};

use super::features::{extract_features, FeatureOptions};
use super::similarity::{score, Metric, SimilarityOptions};
use crate::models::{FeatureSummary, TickTable};

/// Min/max/mean over a score group.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub count: usize,
}

impl Aggregate {
    fn from_scores(scores: &[f64]) -> Self {
        if scores.is_empty() {
            return Self {
                min: 0.0,
                max: 0.0,
                mean: 0.0,
                count: 0,
            };
        }
        let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
        let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        Self {
            min,
            max,
            mean,
            count: scores.len(),
        }
    }
}

/// One roster player's evaluation row.
#[derive(Debug, Clone)]
pub struct PlayerEvaluation {
    pub player_name: String,

    /// New-session vs own known-session score.
    pub self_score: f64,

    /// New-session vs every *other* roster player's known session.
    pub other_scores: Vec<(String, f64)>,
}

/// Full evaluation report.
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub players: Vec<PlayerEvaluation>,

    /// Roster players missing from either table, with no scores computed.
    pub skipped: Vec<String>,

    pub self_aggregate: Aggregate,
    pub other_aggregate: Aggregate,
}

/// Evaluate every roster player's new session against the known sessions.
pub fn evaluate_roster(
    new_ticks: &TickTable,
    known_ticks: &TickTable,
    roster: &[String],
    map: Option<&str>,
    metric: Metric,
    feature_options: &FeatureOptions,
    similarity_options: &SimilarityOptions,
) -> EvaluationReport {
    // Extract each roster player's summaries once; empty slices mean the
    // player is absent from that table and must be skipped, not scored.
    let mut new_summaries: Vec<Option<FeatureSummary>> = Vec::with_capacity(roster.len());
    let mut known_summaries: Vec<Option<FeatureSummary>> = Vec::with_capacity(roster.len());
    for player in roster {
        let new = extract_features(new_ticks, player, map, feature_options);
        let known = extract_features(known_ticks, player, map, feature_options);
        new_summaries.push((!new.is_empty()).then_some(new));
        known_summaries.push((!known.is_empty()).then_some(known));
    }

    let mut players = Vec::new();
    let mut skipped = Vec::new();
    let mut self_scores = Vec::new();
    let mut other_scores = Vec::new();

    for (i, player) in roster.iter().enumerate() {
        let (Some(new), Some(known)) = (&new_summaries[i], &known_summaries[i]) else {
            warn!("Roster player {} absent from new or known ticks, skipped", player);
            skipped.push(player.clone());
            continue;
        };

        let self_score = score(metric, new, known, similarity_options);
        self_scores.push(self_score);

        let mut others = Vec::new();
        for (j, other) in roster.iter().enumerate() {
            if i == j {
                continue;
            }
            let Some(other_known) = &known_summaries[j] else {
                continue;
            };
            let s = score(metric, new, other_known, similarity_options);
            other_scores.push(s);
            others.push((other.clone(), s));
        }

        info!(
            "Evaluated {}: self {:.4}, {} cross pairings",
            player,
            self_score,
            others.len()
        );
        players.push(PlayerEvaluation {
            player_name: player.clone(),
            self_score,
            other_scores: others,
        });
    }

    EvaluationReport {
        players,
        skipped,
        self_aggregate: Aggregate::from_scores(&self_scores),
        other_aggregate: Aggregate::from_scores(&other_scores),
    }
}
