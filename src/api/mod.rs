use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::cache::TtlCache;
use crate::error::PredictionError;
use crate::model::WinProbabilityEstimator;
use crate::pipeline::{build_features, combine, rating_probability, CombinedTeamStats, RatingWeights};
use crate::scoreboard::{transform_boxscore, transform_live_scoreboard, transform_scoreboard};
use crate::stats::{season_label, RetryPolicy, SeasonType, StatsProvider};

#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn StatsProvider>,
    pub estimator: WinProbabilityEstimator,
    /// Current-season standings joined with advanced stats.
    pub team_stats: Arc<TtlCache<CombinedTeamStats>>,
    pub retry: RetryPolicy,
    /// Fixed season label; `None` follows the calendar.
    pub season: Option<String>,
    pub season_type: SeasonType,
}

/// Build the Axum router for the prediction API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/api/predictions/win_probability", get(win_probability_handler))
        .route("/api/predictions/rating_probability", get(rating_probability_handler))
        .route("/api/games", get(games_handler))
        .route("/api/boxscores/:game_id", get(boxscore_handler))
        .route("/api/live_scores", get(live_scores_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

pub fn status_for(e: &PredictionError) -> StatusCode {
    match e {
        PredictionError::UpstreamUnavailable(_) | PredictionError::ModelUnready => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        PredictionError::TeamNotFound(_) => StatusCode::NOT_FOUND,
        PredictionError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        PredictionError::StructureMismatch(_) | PredictionError::FeatureComputation(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn api_error(e: PredictionError) -> (StatusCode, String) {
    let status = status_for(&e);
    if status.is_server_error() {
        warn!("Request failed: {}", e);
    }
    (status, e.to_string())
}

/// Cached combined stats, refreshed from the provider once the TTL lapses.
/// Standings and advanced stats are fetched concurrently.
async fn team_stats(state: &AppState) -> Result<Arc<CombinedTeamStats>, PredictionError> {
    let season = state
        .season
        .clone()
        .unwrap_or_else(|| season_label(Local::now().date_naive()));
    let provider = state.provider.as_ref();
    let retry = &state.retry;
    let season_type = state.season_type;

    state
        .team_stats
        .get_or_fetch(|| async move {
            info!("Fetching team stats for {} {}", season, season_type);
            let (standings, advanced) = tokio::try_join!(
                retry.run("standings", || provider.standings(&season, season_type)),
                retry.run("advanced stats", || {
                    provider.advanced_team_stats(&season, season_type)
                }),
            )?;
            combine(&standings, &advanced)
        })
        .await
}

#[derive(Debug, Deserialize)]
struct MatchupQuery {
    home_team_id: i64,
    visitor_team_id: i64,
}

#[derive(Debug, Deserialize)]
struct DateQuery {
    date: String,
}

async fn root_handler() -> impl IntoResponse {
    Json(json!({ "message": "Welcome to the NBA win probability API" }))
}

/// GET /api/predictions/win_probability?home_team_id=..&visitor_team_id=..
async fn win_probability_handler(
    State(state): State<Arc<AppState>>,
    Query(q): Query<MatchupQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if !state.estimator.is_ready() {
        return Err(api_error(PredictionError::ModelUnready));
    }
    let stats = team_stats(&state).await.map_err(api_error)?;
    let (home, visitor) = stats
        .pair(q.home_team_id, q.visitor_team_id)
        .map_err(api_error)?;
    let features = build_features(home, visitor).map_err(api_error)?;
    let p = state.estimator.predict(&features.vector).map_err(api_error)?;
    info!(
        "Win probability H:{} vs V:{} = {:.4}/{:.4}",
        q.home_team_id, q.visitor_team_id, p.home_win_probability, p.visitor_win_probability
    );
    Ok(Json(p))
}

/// GET /api/predictions/rating_probability?home_team_id=..&visitor_team_id=..
async fn rating_probability_handler(
    State(state): State<Arc<AppState>>,
    Query(q): Query<MatchupQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let stats = team_stats(&state).await.map_err(api_error)?;
    let (home, visitor) = stats
        .pair(q.home_team_id, q.visitor_team_id)
        .map_err(api_error)?;
    Ok(Json(rating_probability(home, visitor, &RatingWeights::default())))
}

/// GET /api/games?date=YYYY-MM-DD
async fn games_handler(
    State(state): State<Arc<AppState>>,
    Query(q): Query<DateQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let date = NaiveDate::parse_from_str(&q.date, "%Y-%m-%d").map_err(|_| {
        api_error(PredictionError::InvalidRequest(format!(
            "date must be YYYY-MM-DD, got '{}'",
            q.date
        )))
    })?;
    let provider = state.provider.as_ref();
    let sets = state
        .retry
        .run("scoreboard", || provider.scoreboard(date))
        .await
        .map_err(api_error)?;
    let games = transform_scoreboard(&sets).map_err(api_error)?;
    info!("Returning {} games for {}", games.len(), date);
    Ok(Json(games))
}

/// GET /api/boxscores/{game_id}
async fn boxscore_handler(
    State(state): State<Arc<AppState>>,
    Path(game_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if game_id.len() != 10 {
        return Err(api_error(PredictionError::InvalidRequest(
            "Invalid Game ID format.".into(),
        )));
    }
    let provider = state.provider.as_ref();
    let raw = state
        .retry
        .run("box score", || provider.boxscore(&game_id))
        .await
        .map_err(api_error)?;
    Ok(Json(transform_boxscore(&raw)))
}

/// GET /api/live_scores
async fn live_scores_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let provider = state.provider.as_ref();
    let raw = state
        .retry
        .run("live scoreboard", || provider.live_scoreboard())
        .await
        .map_err(api_error)?;
    Ok(Json(transform_live_scoreboard(&raw)))
}
