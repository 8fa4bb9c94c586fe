use clap::{Args, Parser, Subcommand};
use std::time::Duration;

use crate::jobs::TrainParams;
use crate::model::logistic::FitParams;
use crate::stats::nba_api::{DEFAULT_LIVE_URL, DEFAULT_STATS_URL};
use crate::stats::{RetryPolicy, SeasonType};

/// NBA game win-probability service and its offline training jobs
#[derive(Parser, Debug, Clone)]
#[command(name = "courtside-odds", version, about)]
pub struct Config {
    /// SQLite database holding collected games and the training table
    #[arg(long, env = "DATABASE_PATH", default_value = "courtside.db", global = true)]
    pub database_path: String,

    /// Directory with the model and scaler artifacts
    #[arg(long, env = "MODEL_DIR", default_value = "models", global = true)]
    pub model_dir: String,

    /// NBA stats API base URL
    #[arg(long, env = "NBA_STATS_URL", default_value = DEFAULT_STATS_URL, global = true)]
    pub stats_url: String,

    /// NBA live data CDN base URL
    #[arg(long, env = "NBA_LIVE_URL", default_value = DEFAULT_LIVE_URL, global = true)]
    pub live_url: String,

    /// Per-request timeout against the upstream APIs, in seconds
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value = "30", global = true)]
    pub http_timeout_secs: u64,

    /// Attempts per upstream call before giving up
    #[arg(long, env = "RETRY_ATTEMPTS", default_value = "3", global = true)]
    pub retry_attempts: u32,

    /// Base pause between upstream calls, in milliseconds
    #[arg(long, env = "RETRY_BASE_DELAY_MS", default_value = "700", global = true)]
    pub retry_base_delay_ms: u64,

    /// Random extra backoff as a fraction of the pause (0.0–1.0)
    #[arg(long, env = "RETRY_JITTER", default_value = "0.0", global = true)]
    pub retry_jitter: f64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Serve the prediction API
    Serve(ServeArgs),
    /// Download game logs and store one labelled record per game
    Collect(CollectArgs),
    /// Rebuild the training table from the stored games
    BuildFeatures,
    /// Fit the model on the training table and write the artifacts
    Train(TrainArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// API listen address
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8000")]
    pub listen_addr: String,

    /// How long fetched team stats are reused, in seconds
    #[arg(long, env = "CACHE_TTL_SECS", default_value = "900")]
    pub cache_ttl_secs: u64,

    /// Season to serve stats for, e.g. "2024-25". Follows the calendar when unset.
    #[arg(long, env = "SEASON")]
    pub season: Option<String>,

    #[arg(long, env = "SEASON_TYPE", default_value = "Regular Season")]
    pub season_type: String,
}

#[derive(Args, Debug, Clone)]
pub struct CollectArgs {
    #[arg(long, env = "SEASONS", value_delimiter = ',', default_value = "2023-24,2022-23")]
    pub seasons: Vec<String>,

    #[arg(
        long,
        env = "SEASON_TYPES",
        value_delimiter = ',',
        default_value = "Regular Season,Playoffs"
    )]
    pub season_types: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// Share of the most recent games held out for evaluation
    #[arg(long, env = "TEST_FRACTION", default_value = "0.2")]
    pub test_fraction: f64,

    #[arg(long, env = "MAX_ITERS", default_value = "1000")]
    pub max_iters: usize,

    #[arg(long, env = "LEARNING_RATE", default_value = "0.5")]
    pub learning_rate: f64,

    /// Inverse regularization strength
    #[arg(long, env = "REGULARIZATION_C", default_value = "1.0")]
    pub c: f64,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.retry_attempts == 0 {
            anyhow::bail!("retry_attempts must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.retry_jitter) {
            anyhow::bail!("retry_jitter must be between 0.0 and 1.0");
        }
        if self.http_timeout_secs == 0 {
            anyhow::bail!("http_timeout_secs must be positive");
        }
        match &self.command {
            Command::Serve(args) => {
                parse_season_type(&args.season_type)?;
                if let Some(season) = &args.season {
                    validate_season(season)?;
                }
            }
            Command::Collect(args) => {
                if args.seasons.is_empty() {
                    anyhow::bail!("at least one season is required");
                }
                for season in &args.seasons {
                    validate_season(season)?;
                }
                for st in &args.season_types {
                    parse_season_type(st)?;
                }
            }
            Command::Train(args) => {
                if !(0.0..1.0).contains(&args.test_fraction) {
                    anyhow::bail!("test_fraction must be in [0.0, 1.0)");
                }
                if args.learning_rate <= 0.0 || args.c <= 0.0 {
                    anyhow::bail!("learning_rate and c must be positive");
                }
            }
            Command::BuildFeatures => {}
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_attempts,
            Duration::from_millis(self.retry_base_delay_ms),
        )
        .with_jitter(self.retry_jitter)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl CollectArgs {
    pub fn season_types(&self) -> anyhow::Result<Vec<SeasonType>> {
        self.season_types.iter().map(|s| parse_season_type(s)).collect()
    }
}

impl TrainArgs {
    pub fn params(&self) -> TrainParams {
        TrainParams {
            test_fraction: self.test_fraction,
            fit: FitParams {
                max_iters: self.max_iters,
                learning_rate: self.learning_rate,
                c: self.c,
            },
        }
    }
}

pub fn parse_season_type(s: &str) -> anyhow::Result<SeasonType> {
    SeasonType::parse(s.trim())
        .ok_or_else(|| anyhow::anyhow!("unknown season type '{}'", s))
}

/// "2023-24" style labels only.
fn validate_season(season: &str) -> anyhow::Result<()> {
    let ok = season.len() == 7
        && season.as_bytes()[4] == b'-'
        && season
            .char_indices()
            .all(|(i, c)| i == 4 || c.is_ascii_digit());
    if !ok {
        anyhow::bail!("season must look like 2023-24, got '{}'", season);
    }
    Ok(())
}
