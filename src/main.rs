use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

mod api;
mod cache;
mod config;
mod db;
mod error;
mod jobs;
mod model;
mod pipeline;
mod scoreboard;
mod stats;

use api::AppState;
use cache::TtlCache;
use config::{parse_season_type, Command, Config, ServeArgs};
use db::Database;
use model::WinProbabilityEstimator;
use stats::NbaStatsClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let client = NbaStatsClient::new(&config.stats_url, &config.live_url, config.http_timeout())?;
    let retry = config.retry_policy();
    debug!("Upstream retry backoff: {:?}", retry.schedule());

    match &config.command {
        Command::Serve(args) => serve(&config, args, client).await,
        Command::Collect(args) => {
            let db = Database::open(&config.database_path)?;
            info!("Database opened: {}", config.database_path);
            let summary = jobs::collect_games(
                &client,
                &db,
                &args.seasons,
                &args.season_types()?,
                &retry,
            )
            .await?;
            info!(
                "Collection finished: {} games stored, {} discarded, {} failed fetches ({} games in database)",
                summary.stored,
                summary.discarded,
                summary.failed_fetches,
                db.count_games()?
            );
            Ok(())
        }
        Command::BuildFeatures => {
            let db = Database::open(&config.database_path)?;
            let summary = jobs::build_feature_table(&client, &db, &retry).await?;
            info!(
                "Feature table rebuilt: {} games processed, {} skipped",
                summary.processed, summary.skipped
            );
            Ok(())
        }
        Command::Train(args) => {
            let db = Database::open(&config.database_path)?;
            jobs::train_model(&db, Path::new(&config.model_dir), args.params())?;
            Ok(())
        }
    }
}

async fn serve(config: &Config, args: &ServeArgs, client: NbaStatsClient) -> Result<()> {
    // A missing model leaves the server up; predictions answer 503.
    let estimator = WinProbabilityEstimator::load(Path::new(&config.model_dir));
    if !estimator.is_ready() {
        warn!("Serving without a model; win probability requests will fail");
    }

    let state = AppState {
        provider: Arc::new(client),
        estimator,
        team_stats: Arc::new(TtlCache::new(
            "team stats",
            Duration::from_secs(args.cache_ttl_secs),
        )),
        retry: config.retry_policy(),
        season: args.season.clone(),
        season_type: parse_season_type(&args.season_type)?,
    };
    let app = api::router(state);

    let addr: SocketAddr = args
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid listen address {}", args.listen_addr))?;
    info!("API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
