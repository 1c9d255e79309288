//! End-to-end pipeline tests: fixtures → merge → features → scoring.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use demoscope::calculate::boolean::compute_boolean_fractions;
use demoscope::calculate::evaluate::evaluate_roster;
use demoscope::calculate::features::{extract_features, FeatureOptions};
use demoscope::calculate::similarity::{rank_candidates, Metric, SimilarityOptions};
use demoscope::decode::FsProvider;
use demoscope::merge::{merge_recordings, MergeRequest};
use demoscope::models::TickTable;

/// Yaw pattern of a "twitchy" player: short 7-tick sweeps.
fn twitchy_yaw(i: usize) -> f64 {
    (i % 7) as f64 * 1.5
}

/// Yaw pattern of a "flicky" player: alternating large jumps.
fn flicky_yaw(i: usize) -> f64 {
    ((i % 2) * 12) as f64
}

fn session_json(ticks_per_player: usize, jitter: f64) -> serde_json::Value {
    let mut ticks = Vec::new();
    for i in 0..ticks_per_player {
        ticks.push(serde_json::json!({
            "steam_id": 101,
            "player_name": "alpha",
            "X": (i % 40) as f64,
            "Y": (i % 25) as f64,
            "yaw": twitchy_yaw(i) + jitter,
            "pitch": twitchy_yaw(i) / 3.0,
            "velocity": if i % 2 == 0 { 0.0 } else { 200.0 },
            "duck_amount": if i % 4 == 0 { 1.0 } else { 0.0 },
        }));
        ticks.push(serde_json::json!({
            "steam_id": 102,
            "player_name": "beta",
            "X": 500.0 + (i % 10) as f64,
            "Y": 500.0 + (i % 50) as f64,
            "yaw": flicky_yaw(i) - jitter,
            "pitch": flicky_yaw(i) / 4.0,
            "velocity": 200.0,
            "duck_amount": 0.0,
        }));
    }
    serde_json::json!(ticks)
}

fn write_session(dir: &Path, rel: &str, jitter: f64) {
    let path = dir.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let body = serde_json::json!({
        "header": { "map_name": "de_dust2" },
        "ticks": session_json(240, jitter),
        "events": []
    });
    fs::write(path, serde_json::to_string(&body).unwrap()).unwrap();
}

fn merge_folder(folder: &Path) -> TickTable {
    let request = MergeRequest::new(
        folder,
        vec![
            "X".to_string(),
            "Y".to_string(),
            "yaw".to_string(),
            "pitch".to_string(),
            "velocity".to_string(),
            "duck_amount".to_string(),
        ],
    );
    merge_recordings(&request, &FsProvider::default(), None)
        .unwrap()
        .ticks
}

fn angular_options() -> FeatureOptions {
    FeatureOptions {
        include_angular: true,
        ..FeatureOptions::default()
    }
}

#[test]
fn candidate_ranks_own_play_style_first() {
    let new_dir = TempDir::new().unwrap();
    let known_dir = TempDir::new().unwrap();
    write_session(new_dir.path(), "fresh/session.json", 0.3);
    write_session(known_dir.path(), "archive/session.json", 0.0);

    let new_ticks = merge_folder(new_dir.path());
    let known_ticks = merge_folder(known_dir.path());

    let options = angular_options();
    let candidate = extract_features(&new_ticks, "alpha", None, &options);
    let references: Vec<_> = known_ticks
        .players()
        .into_iter()
        .map(|(_, name)| extract_features(&known_ticks, &name, None, &options))
        .collect();

    let ranked = rank_candidates(
        &candidate,
        &references,
        Metric::AngularJs,
        &SimilarityOptions::default(),
    );

    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].player_name, "alpha");
    assert!(ranked[0].score > ranked[1].score);
    for entry in &ranked {
        assert!((0.0..=1.0).contains(&entry.score));
    }
}

#[test]
fn evaluate_mode_separates_self_from_other() {
    let new_dir = TempDir::new().unwrap();
    let known_dir = TempDir::new().unwrap();
    write_session(new_dir.path(), "fresh/session.json", 0.2);
    write_session(known_dir.path(), "archive/session.json", 0.0);

    let new_ticks = merge_folder(new_dir.path());
    let known_ticks = merge_folder(known_dir.path());

    let roster = vec!["alpha".to_string(), "beta".to_string()];
    let report = evaluate_roster(
        &new_ticks,
        &known_ticks,
        &roster,
        None,
        Metric::AngularJs,
        &angular_options(),
        &SimilarityOptions::default(),
    );

    assert_eq!(report.players.len(), 2);
    assert!(report.skipped.is_empty());
    assert!(report.self_aggregate.mean > report.other_aggregate.mean);
    assert!(report.self_aggregate.min >= 0.0);
    assert!(report.self_aggregate.max <= 1.0);
}

#[test]
fn boolean_fractions_match_hand_computed_counts() {
    let dir = TempDir::new().unwrap();
    // 2 players x 2 matches with known ducking counts per group.
    for (rel, alpha_active, beta_active) in
        [("a/m1.json", 3usize, 1usize), ("b/m2.json", 0usize, 4usize)]
    {
        let mut ticks = Vec::new();
        for i in 0..6 {
            ticks.push(serde_json::json!({
                "steam_id": 101,
                "player_name": "alpha",
                "ducking": if i < alpha_active { 1.0 } else { 0.0 },
            }));
            ticks.push(serde_json::json!({
                "steam_id": 102,
                "player_name": "beta",
                "ducking": if i < beta_active { 1.0 } else { 0.0 },
            }));
        }
        let path = dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let body = serde_json::json!({
            "header": { "map_name": "de_dust2" },
            "ticks": ticks,
            "events": []
        });
        fs::write(path, serde_json::to_string(&body).unwrap()).unwrap();
    }

    let request = MergeRequest::new(dir.path(), vec!["ducking".to_string()]);
    let out = merge_recordings(&request, &FsProvider::default(), None).unwrap();
    let rows = compute_boolean_fractions(&out.ticks, "ducking").unwrap();

    assert_eq!(rows.len(), 4);
    let fraction = |player: &str, m: &str| {
        rows.iter()
            .find(|r| r.player_name == player && r.match_id == m)
            .unwrap()
            .fraction_active
    };
    assert_eq!(fraction("alpha", "a_m1"), 0.5);
    assert_eq!(fraction("alpha", "b_m2"), 0.0);
    assert_eq!(fraction("beta", "a_m1"), 1.0 / 6.0);
    assert_eq!(fraction("beta", "b_m2"), 4.0 / 6.0);
}

#[test]
fn full_feature_metric_prefers_matching_position_profile() {
    let new_dir = TempDir::new().unwrap();
    let known_dir = TempDir::new().unwrap();
    write_session(new_dir.path(), "fresh/session.json", 0.0);
    write_session(known_dir.path(), "archive/session.json", 0.0);

    let new_ticks = merge_folder(new_dir.path());
    let known_ticks = merge_folder(known_dir.path());

    let options = FeatureOptions::default();
    let candidate = extract_features(&new_ticks, "alpha", None, &options);
    let references: Vec<_> = known_ticks
        .players()
        .into_iter()
        .map(|(_, name)| extract_features(&known_ticks, &name, None, &options))
        .collect();

    let ranked = rank_candidates(
        &candidate,
        &references,
        Metric::FullFeature,
        &SimilarityOptions::default(),
    );
    assert_eq!(ranked[0].player_name, "alpha");
}
