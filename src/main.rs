use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use demoscope::calculate::boolean::compute_boolean_fractions;
use demoscope::calculate::evaluate::evaluate_roster;
use demoscope::calculate::features::{extract_features, fields, FeatureOptions};
use demoscope::calculate::rank::rank_fields;
use demoscope::calculate::similarity::{rank_candidates, Metric, SimilarityOptions};
use demoscope::config::AppConfig;
use demoscope::decode::FsProvider;
use demoscope::merge::{merge_recordings, MergeOutput, MergeRequest};
use demoscope::storage::MergeCache;

#[derive(Parser)]
#[command(name = "demoscope")]
#[command(about = "Offline analytics for esports demo recordings")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: String,

    /// Cache directory (overrides the configured one)
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge recordings into one cached tick table
    Merge {
        /// Folder containing recordings
        folder: PathBuf,

        /// Telemetry fields to decode (default: configured fields)
        #[arg(long, num_args = 0..)]
        fields: Vec<String>,

        /// Player allow-list (empty for all players)
        #[arg(long, num_args = 0..)]
        players: Vec<String>,

        /// Limit the number of recordings to process
        #[arg(long)]
        limit: Option<usize>,

        /// Keep only recordings played on this map
        #[arg(long)]
        map: Option<String>,

        /// Bypass the merge cache
        #[arg(long)]
        no_cache: bool,
    },

    /// Rank known players by similarity to a candidate player
    Similarity {
        /// Folder with the new/candidate recordings
        new_folder: PathBuf,

        /// Folder with the known/reference recordings
        known_folder: PathBuf,

        /// Candidate player name in the new recordings
        #[arg(long)]
        player: String,

        /// Restrict comparison to one map
        #[arg(long)]
        map: Option<String>,

        /// Limit the number of recordings per folder
        #[arg(long)]
        limit: Option<usize>,

        /// Metric: js, wasserstein or full (default: configured metric)
        #[arg(long)]
        metric: Option<Metric>,
    },

    /// Evaluate self vs other similarity across the configured roster
    Evaluate {
        /// Folder with the new recordings
        new_folder: PathBuf,

        /// Folder with the known recordings
        known_folder: PathBuf,

        /// Restrict comparison to one map
        #[arg(long)]
        map: Option<String>,

        /// Limit the number of recordings per folder
        #[arg(long)]
        limit: Option<usize>,

        /// Metric: js, wasserstein or full (default: configured metric)
        #[arg(long)]
        metric: Option<Metric>,

        /// Roster override (default: configured roster)
        #[arg(long, num_args = 0..)]
        roster: Vec<String>,
    },

    /// Fraction of time players spend in a boolean state
    BoolStats {
        /// Folder containing recordings
        folder: PathBuf,

        /// Boolean field to analyze (e.g. duck_amount, is_airborne)
        field: String,

        /// Player allow-list (empty for all players)
        #[arg(long, num_args = 0..)]
        players: Vec<String>,

        /// Limit the number of recordings to process
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Rank telemetry fields by how well they discriminate players
    RankFields {
        /// Folder containing recordings
        folder: PathBuf,

        /// Fields to rank (default: configured fields)
        #[arg(long, num_args = 0..)]
        fields: Vec<String>,

        /// Limit the number of recordings to process
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Manage the merge cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cache entries with their parameters
    List,

    /// Remove every cache entry
    Clear,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("Starting demoscope v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&cli.config)?;
    let cache_dir = cli
        .cache_dir
        .clone()
        .unwrap_or_else(|| config.cache_dir.clone());

    match cli.command {
        Commands::Merge {
            folder,
            fields,
            players,
            limit,
            map,
            no_cache,
        } => {
            let fields = if fields.is_empty() {
                config.merge.fields.clone()
            } else {
                fields
            };
            let mut request = MergeRequest::new(folder, fields);
            request.players = players;
            request.limit = limit;
            request.map_filter = map;

            let out = run_merge(&request, &config, &cache_dir, !no_cache)?;

            println!("\n=== Merge Results ===");
            println!("Rows:          {}", out.ticks.len());
            println!("Recordings:    {}", out.merged_recordings());
            println!("Players:       {}", out.ticks.players().len());
            println!("Maps:          {}", out.ticks.maps().join(", "));
            println!("Event lists:   {}", out.events.len());
            println!("From cache:    {}", if out.from_cache { "yes" } else { "no" });
            if !out.skipped.is_empty() {
                println!("\nSkipped recordings:");
                for skip in &out.skipped {
                    println!("  - {:?}: {}", skip.path, skip.reason);
                }
            }
        }
        Commands::Similarity {
            new_folder,
            known_folder,
            player,
            map,
            limit,
            metric,
        } => {
            let metric = resolve_metric(metric, &config)?;
            let merge_fields = similarity_fields(&config, metric);

            let mut new_ticks =
                merged_ticks(&new_folder, &merge_fields, limit, &config, &cache_dir)?;
            let mut known_ticks =
                merged_ticks(&known_folder, &merge_fields, limit, &config, &cache_dir)?;
            new_ticks.split_vector_columns()?;
            known_ticks.split_vector_columns()?;

            let feature_options = feature_options(&config, metric);
            let similarity_options = similarity_options(&config);

            let candidate =
                extract_features(&new_ticks, &player, map.as_deref(), &feature_options);
            if candidate.is_empty() {
                bail!(
                    "Player {:?} has no ticks in {:?} (map filter: {:?})",
                    player,
                    new_folder,
                    map
                );
            }

            let references: Vec<_> = known_ticks
                .players()
                .into_iter()
                .map(|(_, name)| {
                    extract_features(&known_ticks, &name, map.as_deref(), &feature_options)
                })
                .collect();

            let ranked = rank_candidates(&candidate, &references, metric, &similarity_options);
            if ranked.is_empty() {
                bail!("No scorable reference players in {:?}", known_folder);
            }

            println!("\nPlayer Similarity Rankings ({} metric):", metric);
            for (rank, entry) in ranked.iter().enumerate() {
                println!("{}. {}: {:.4}", rank + 1, entry.player_name, entry.score);
            }
        }
        Commands::Evaluate {
            new_folder,
            known_folder,
            map,
            limit,
            metric,
            roster,
        } => {
            let metric = resolve_metric(metric, &config)?;
            let roster = if roster.is_empty() {
                config.roster.clone()
            } else {
                roster
            };
            if roster.is_empty() {
                bail!("Evaluate mode needs a roster: set `roster` in the config or pass --roster");
            }

            let merge_fields = similarity_fields(&config, metric);
            let mut new_ticks =
                merged_ticks(&new_folder, &merge_fields, limit, &config, &cache_dir)?;
            let mut known_ticks =
                merged_ticks(&known_folder, &merge_fields, limit, &config, &cache_dir)?;
            new_ticks.split_vector_columns()?;
            known_ticks.split_vector_columns()?;

            let report = evaluate_roster(
                &new_ticks,
                &known_ticks,
                &roster,
                map.as_deref(),
                metric,
                &feature_options(&config, metric),
                &similarity_options(&config),
            );

            println!("\n=== Evaluation Results ({} metric) ===", metric);
            for player in &report.players {
                println!("\n{}", player.player_name);
                println!("  self: {:.4}", player.self_score);
                for (other, score) in &player.other_scores {
                    println!("  vs {}: {:.4}", other, score);
                }
            }
            if !report.skipped.is_empty() {
                println!("\nSkipped (absent from new or known ticks):");
                for player in &report.skipped {
                    println!("  - {}", player);
                }
            }
            println!("\nSelf similarity  ({} pairings):", report.self_aggregate.count);
            print_aggregate(&report.self_aggregate);
            println!("Other similarity ({} pairings):", report.other_aggregate.count);
            print_aggregate(&report.other_aggregate);
            println!(
                "Separation (self mean - other mean): {:.4}",
                report.self_aggregate.mean - report.other_aggregate.mean
            );
        }
        Commands::BoolStats {
            folder,
            field,
            players,
            limit,
        } => {
            let mut request = MergeRequest::new(folder, vec![field.clone()]);
            request.players = players;
            request.limit = limit;

            let out = run_merge(&request, &config, &cache_dir, true)?;
            let rows = compute_boolean_fractions(&out.ticks, &field)?;

            println!("\n=== {} Fractions ===", field);
            println!("{:<20} {:<30} {:>8} {:>8} {:>10}", "player", "match", "active", "total", "fraction");
            for row in &rows {
                println!(
                    "{:<20} {:<30} {:>8} {:>8} {:>10.4}",
                    row.player_name,
                    row.match_id,
                    row.active_ticks,
                    row.total_ticks,
                    row.fraction_active
                );
            }
        }
        Commands::RankFields {
            folder,
            fields,
            limit,
        } => {
            let fields = if fields.is_empty() {
                config.merge.fields.clone()
            } else {
                fields
            };
            let request = {
                let mut r = MergeRequest::new(folder, fields);
                r.limit = limit;
                r
            };

            let out = run_merge(&request, &config, &cache_dir, true)?;
            let mut ticks = out.ticks;
            ticks.split_vector_columns()?;

            // Vector fields were decomposed; rank every scalar column.
            let scalar_fields: Vec<String> = ticks
                .column_names()
                .into_iter()
                .filter(|name| ticks.scalar(name).is_ok())
                .collect();
            let ranked = rank_fields(&ticks, &scalar_fields)?;

            println!("\nField Rankings by Average Variance and Mean Difference:");
            for (index, field) in ranked.iter().enumerate() {
                println!("{}. Field: {}", index + 1, field.field);
                println!("   - Average Variance:  {:.6}", field.avg_variance);
                println!("   - Mean Difference:   {:.6}", field.mean_difference);
            }
        }
        Commands::Cache { action } => {
            let cache = MergeCache::new(cache_dir.clone());
            match action {
                CacheAction::List => {
                    let entries = cache.entries()?;
                    if entries.is_empty() {
                        println!("Cache is empty ({:?})", cache_dir);
                    } else {
                        println!("=== Cache Entries ({}) ===\n", entries.len());
                        for (key, manifest) in &entries {
                            println!("{}", key);
                            println!("  created:  {}", manifest.created_at);
                            println!("  source:   {}", manifest.source_path);
                            println!("  fields:   {}", manifest.fields.join(", "));
                            if !manifest.players.is_empty() {
                                println!("  players:  {}", manifest.players.join(", "));
                            }
                            if let Some(limit) = manifest.limit {
                                println!("  limit:    {}", limit);
                            }
                            if let Some(map) = &manifest.map_filter {
                                println!("  map:      {}", map);
                            }
                        }
                    }
                }
                CacheAction::Clear => {
                    let removed = cache.clear()?;
                    println!("Cleared {} cache entries", removed);
                }
            }
        }
    }

    Ok(())
}

/// Load the config file when it exists, otherwise fall back to defaults.
fn load_config(path: &str) -> Result<AppConfig> {
    let path_buf = PathBuf::from(path);
    if path_buf.exists() {
        AppConfig::from_file(&path_buf).with_context(|| format!("loading config {:?}", path))
    } else {
        tracing::debug!("No config file at {:?}, using defaults", path);
        Ok(AppConfig::default())
    }
}

fn resolve_metric(cli_metric: Option<Metric>, config: &AppConfig) -> Result<Metric> {
    match cli_metric {
        Some(metric) => Ok(metric),
        None => config
            .similarity
            .metric
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e)),
    }
}

/// Fields the similarity path needs, merged with the configured set.
fn similarity_fields(config: &AppConfig, metric: Metric) -> Vec<String> {
    let mut merge_fields = config.merge.fields.clone();
    if metric.needs_angular() {
        for angle in [fields::YAW, fields::PITCH] {
            if !merge_fields.iter().any(|f| f == angle) {
                merge_fields.push(angle.to_string());
            }
        }
    }
    merge_fields
}

fn feature_options(config: &AppConfig, metric: Metric) -> FeatureOptions {
    FeatureOptions {
        heatmap_bins: config.similarity.heatmap_bins,
        standing_speed_threshold: config.similarity.standing_speed_threshold,
        include_angular: metric.needs_angular(),
    }
}

fn similarity_options(config: &AppConfig) -> SimilarityOptions {
    SimilarityOptions {
        bins: config.similarity.bins,
        heatmap_weight: config.similarity.heatmap_weight,
    }
}

fn run_merge(
    request: &MergeRequest,
    config: &AppConfig,
    cache_dir: &PathBuf,
    use_cache: bool,
) -> Result<MergeOutput> {
    let provider = FsProvider::new(config.merge.extension.clone());
    let cache = MergeCache::new(cache_dir.clone());
    let cache_ref = use_cache.then_some(&cache);
    let out = merge_recordings(request, &provider, cache_ref)
        .with_context(|| format!("merging recordings under {:?}", request.folder))?;
    Ok(out)
}

fn merged_ticks(
    folder: &PathBuf,
    merge_fields: &[String],
    limit: Option<usize>,
    config: &AppConfig,
    cache_dir: &PathBuf,
) -> Result<demoscope::models::TickTable> {
    let mut request = MergeRequest::new(folder.clone(), merge_fields.to_vec());
    request.limit = limit;
    let out = run_merge(&request, config, cache_dir, true)?;
    if !out.skipped.is_empty() {
        for skip in &out.skipped {
            tracing::warn!("Skipped {:?}: {}", skip.path, skip.reason);
        }
    }
    Ok(out.ticks)
}

fn print_aggregate(aggregate: &demoscope::calculate::evaluate::Aggregate) {
    println!(
        "  min {:.4} | mean {:.4} | max {:.4}",
        aggregate.min, aggregate.mean, aggregate.max
    );
}
