use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::pipeline::features::FeatureVector;

/// One completed historical game with both sides resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    /// Upstream game ID, e.g. "0022300061"
    pub game_id: String,
    /// Season label, e.g. "2023-24"
    pub season_year: String,
    pub game_date: NaiveDate,
    /// Matchup descriptor as seen on the first row of the game, e.g. "LAL @ DEN"
    pub matchup: String,
    pub home_team_id: i64,
    pub home_team_abbreviation: String,
    pub visitor_team_id: i64,
    pub visitor_team_abbreviation: String,
    pub home_pts: i64,
    pub visitor_pts: i64,
    /// "W" | "L" (null for games the provider has not settled)
    pub wl_home: Option<String>,
    pub wl_visitor: Option<String>,
    pub plus_minus_home: f64,
    pub plus_minus_visitor: f64,
    /// "Regular Season" | "Playoffs"
    pub season_type: String,
}

impl GameRecord {
    pub fn home_won(&self) -> bool {
        self.wl_home.as_deref() == Some("W")
    }
}

/// One row of the training table: identity, label and model inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub game_id: String,
    pub game_date: NaiveDate,
    pub season_year: String,
    pub season_type: String,
    pub home_team_id: i64,
    pub visitor_team_id: i64,
    pub home_team_abbr: String,
    pub visitor_team_abbr: String,
    pub home_win: bool,
    pub features: FeatureVector,
    /// Normalized (0–1) point differential, kept for diagnostics only.
    pub home_point_diff_norm: f64,
    pub visitor_point_diff_norm: f64,
}
