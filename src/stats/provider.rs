use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

use crate::error::PredictionError;
use super::table::RawStatTable;

/// Regular season or playoffs, with the label the stats API expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeasonType {
    Regular,
    Playoffs,
}

impl SeasonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeasonType::Regular => "Regular Season",
            SeasonType::Playoffs => "Playoffs",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace([' ', '_', '-'], "").as_str() {
            "regularseason" | "regular" => Some(SeasonType::Regular),
            "playoffs" | "playoff" => Some(SeasonType::Playoffs),
            _ => None,
        }
    }
}

impl std::fmt::Display for SeasonType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The upstream stats source. Everything tabular comes back as a
/// [`RawStatTable`]; the live scoreboard and V3 box score are nested JSON
/// documents and are returned as-is for the transforms to pick apart.
#[async_trait]
pub trait StatsProvider: Send + Sync {
    /// One row per (game, team) for a whole season.
    async fn game_log(&self, season: &str, season_type: SeasonType)
        -> Result<RawStatTable, PredictionError>;

    /// Standings with W-L split records and point differential.
    async fn standings(&self, season: &str, season_type: SeasonType)
        -> Result<RawStatTable, PredictionError>;

    /// Advanced team metrics (ratings, pace).
    async fn advanced_team_stats(&self, season: &str, season_type: SeasonType)
        -> Result<RawStatTable, PredictionError>;

    /// Named result sets of the daily scoreboard ("GameHeader", "LineScore").
    async fn scoreboard(&self, date: NaiveDate)
        -> Result<Vec<(String, RawStatTable)>, PredictionError>;

    async fn live_scoreboard(&self) -> Result<Value, PredictionError>;

    async fn boxscore(&self, game_id: &str) -> Result<Value, PredictionError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}
