//! Offline batch jobs: collect game logs, build the training table, train.
//!
//! Each job runs sequentially against the provider, one upstream call at a
//! time, with the retry policy's pacing between calls.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use crate::db::models::FeatureRow;
use crate::db::Database;
use crate::error::PredictionError;
use crate::model::logistic::{evaluate, fit_logistic, EvalMetrics, FitParams, StandardScaler};
use crate::model::TrainedModel;
use crate::pipeline::features::FEATURE_NAMES;
use crate::pipeline::combiner::has_advanced_stats;
use crate::pipeline::{build_features, combine, CombinedTeamStats, GameLabelBuilder};
use crate::stats::{RetryPolicy, SeasonType, StatsProvider};

// ── Collect ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectSummary {
    pub stored: usize,
    pub discarded: usize,
    pub failed_fetches: usize,
}

/// Fetch the game log for every (season, season type) and upsert the paired
/// games. A failed season is logged and skipped.
pub async fn collect_games(
    provider: &dyn StatsProvider,
    db: &Database,
    seasons: &[String],
    season_types: &[SeasonType],
    retry: &RetryPolicy,
) -> Result<CollectSummary> {
    let mut summary = CollectSummary::default();
    for season in seasons {
        for season_type in season_types {
            let label = format!("game log {} {}", season, season_type);
            info!("Fetching {} from {}", label, provider.name());
            let table = match retry
                .run_paced(&label, || provider.game_log(season, *season_type))
                .await
            {
                Ok(t) => t,
                Err(e) => {
                    warn!("Skipping {}: {}", label, e);
                    summary.failed_fetches += 1;
                    continue;
                }
            };

            let outcome = match GameLabelBuilder::new(season, *season_type).build(&table) {
                Ok(o) => o,
                Err(e) => {
                    warn!("Skipping {}: {}", label, e);
                    summary.failed_fetches += 1;
                    continue;
                }
            };
            summary.stored += db
                .upsert_games(&outcome.games)
                .with_context(|| format!("Failed to store {}", label))?;
            summary.discarded += outcome.discarded;
        }
    }
    info!(
        "Collection finished: {} games stored, {} discarded, {} failed fetches",
        summary.stored, summary.discarded, summary.failed_fetches
    );
    Ok(summary)
}

// ── Build features ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSummary {
    pub processed: usize,
    pub skipped: usize,
}

/// Standings and advanced stats for one season, fetched one after the
/// other and joined.
pub async fn fetch_combined_stats(
    provider: &dyn StatsProvider,
    season: &str,
    season_type: SeasonType,
    retry: &RetryPolicy,
) -> Result<CombinedTeamStats, PredictionError> {
    let standings = retry
        .run_paced(&format!("standings {} {}", season, season_type), || {
            provider.standings(season, season_type)
        })
        .await?;
    let advanced = retry
        .run_paced(&format!("advanced stats {} {}", season, season_type), || {
            provider.advanced_team_stats(season, season_type)
        })
        .await?;
    combine(&standings, &advanced)
}

/// Rebuild the training table from every stored game. Games whose season
/// stats could not be fetched, whose teams are absent from them, or whose
/// teams lack advanced ratings are skipped.
pub async fn build_feature_table(
    provider: &dyn StatsProvider,
    db: &Database,
    retry: &RetryPolicy,
) -> Result<BuildSummary> {
    let games = db.list_games().context("Failed to load games")?;
    info!("Loaded {} games", games.len());

    let mut season_stats: HashMap<(String, String), Option<CombinedTeamStats>> = HashMap::new();
    for game in &games {
        let key = (game.season_year.clone(), game.season_type.clone());
        if season_stats.contains_key(&key) {
            continue;
        }
        let stats = match SeasonType::parse(&game.season_type) {
            Some(st) => match fetch_combined_stats(provider, &game.season_year, st, retry).await {
                Ok(s) => Some(s),
                Err(e) => {
                    warn!("No season stats for {} {}: {}", key.0, key.1, e);
                    None
                }
            },
            None => {
                warn!("Unknown season type '{}'", game.season_type);
                None
            }
        };
        season_stats.insert(key, stats);
    }

    let mut rows = Vec::new();
    let mut summary = BuildSummary::default();
    for game in &games {
        let key = (game.season_year.clone(), game.season_type.clone());
        let Some(Some(stats)) = season_stats.get(&key) else {
            summary.skipped += 1;
            continue;
        };
        let (home, visitor) = match stats.pair(game.home_team_id, game.visitor_team_id) {
            Ok(pair) => pair,
            Err(e) => {
                warn!("Skipping game {}: {}", game.game_id, e);
                summary.skipped += 1;
                continue;
            }
        };
        if !(has_advanced_stats(home) && has_advanced_stats(visitor)) {
            warn!("Skipping game {}: advanced stats missing", game.game_id);
            summary.skipped += 1;
            continue;
        }
        match build_features(home, visitor) {
            Ok(m) => {
                rows.push(FeatureRow {
                    game_id: game.game_id.clone(),
                    game_date: game.game_date,
                    season_year: game.season_year.clone(),
                    season_type: game.season_type.clone(),
                    home_team_id: game.home_team_id,
                    visitor_team_id: game.visitor_team_id,
                    home_team_abbr: game.home_team_abbreviation.clone(),
                    visitor_team_abbr: game.visitor_team_abbreviation.clone(),
                    home_win: game.home_won(),
                    features: m.vector,
                    home_point_diff_norm: m.home_point_diff_norm,
                    visitor_point_diff_norm: m.visitor_point_diff_norm,
                });
                summary.processed += 1;
                if summary.processed % 100 == 0 {
                    info!("Processed features for {} games...", summary.processed);
                }
            }
            Err(e) => {
                warn!("Skipping game {}: {}", game.game_id, e);
                summary.skipped += 1;
            }
        }
    }

    db.replace_feature_rows(&rows)
        .context("Failed to store feature rows")?;
    info!(
        "Feature build finished. Processed: {}, Skipped: {}",
        summary.processed, summary.skipped
    );
    Ok(summary)
}

// ── Train ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct TrainParams {
    /// Share of the most recent games held out for evaluation.
    pub test_fraction: f64,
    pub fit: FitParams,
}

impl Default for TrainParams {
    fn default() -> Self {
        TrainParams {
            test_fraction: 0.2,
            fit: FitParams::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainReport {
    pub train: EvalMetrics,
    pub test: Option<EvalMetrics>,
}

/// Chronological split, scaler fit on the training part only, then
/// logistic regression. `rows` must be ordered oldest first.
pub fn train_on_rows(rows: &[FeatureRow], params: TrainParams) -> Result<(TrainedModel, TrainReport)> {
    let usable: Vec<&FeatureRow> = rows
        .iter()
        .filter(|r| r.features.first_non_finite().is_none())
        .collect();
    if usable.len() < rows.len() {
        warn!("Dropped {} rows with non-finite features", rows.len() - usable.len());
    }
    if usable.len() < 2 {
        bail!("not enough feature rows to train ({})", usable.len());
    }

    let n_test = ((usable.len() as f64) * params.test_fraction.clamp(0.0, 0.9)).ceil() as usize;
    let n_train = usable.len() - n_test;
    let (train, test) = usable.split_at(n_train);
    info!("Train size: {}, Test size: {}", train.len(), test.len());

    let x_train: Vec<&[f64]> = train.iter().map(|r| r.features.values().as_slice()).collect();
    let y_train: Vec<f64> = train.iter().map(|r| label(r)).collect();
    let scaler = StandardScaler::fit(&FEATURE_NAMES, &x_train);
    let xs_train: Vec<Vec<f64>> = x_train.iter().map(|x| scaler.transform(x)).collect();

    let model = fit_logistic(&FEATURE_NAMES, &xs_train, &y_train, params.fit)
        .context("training split needs both home wins and home losses")?;

    let train_probs: Vec<f64> = xs_train.iter().map(|x| model.probability(x)).collect();
    let train_metrics = evaluate(&train_probs, &y_train);

    let test_metrics = if test.is_empty() {
        None
    } else {
        let probs: Vec<f64> = test
            .iter()
            .map(|r| model.probability(&scaler.transform(r.features.values())))
            .collect();
        let y: Vec<f64> = test.iter().map(|r| label(r)).collect();
        Some(evaluate(&probs, &y))
    };

    Ok((
        TrainedModel { model, scaler },
        TrainReport {
            train: train_metrics,
            test: test_metrics,
        },
    ))
}

fn label(row: &FeatureRow) -> f64 {
    if row.home_win {
        1.0
    } else {
        0.0
    }
}

/// Train on the stored feature table and write both artifacts to `model_dir`.
pub fn train_model(db: &Database, model_dir: &Path, params: TrainParams) -> Result<TrainReport> {
    let rows = db.list_feature_rows().context("Failed to load feature rows")?;
    info!("Loaded {} feature rows", rows.len());
    let (trained, report) = train_on_rows(&rows, params)?;

    log_metrics("Training", &report.train);
    if let Some(test) = &report.test {
        log_metrics("Testing", test);
    }

    trained.save(model_dir)?;
    info!("Model and scaler saved to {}", model_dir.display());
    Ok(report)
}

fn log_metrics(split: &str, m: &EvalMetrics) {
    info!(
        "{} ({} games): accuracy {:.4}, AUC {}, log loss {:.4}, Brier {:.4}",
        split,
        m.samples,
        m.accuracy,
        m.auc.map(|a| format!("{:.4}", a)).unwrap_or_else(|| "n/a".into()),
        m.logloss,
        m.brier
    );
    let c = &m.confusion;
    info!(
        "{} confusion matrix: [[{} {}] [{} {}]]",
        split, c.true_negative, c.false_positive, c.false_negative, c.true_positive
    );
}
