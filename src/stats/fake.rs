//! In-memory [`StatsProvider`] for tests.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use super::provider::{SeasonType, StatsProvider};
use super::table::RawStatTable;
use crate::error::PredictionError;

pub const LAL: i64 = 1610612747;
pub const BOS: i64 = 1610612738;
pub const DEN: i64 = 1610612743;

#[derive(Default)]
pub struct FakeProvider {
    pub game_logs: HashMap<(String, SeasonType), RawStatTable>,
    pub standings: RawStatTable,
    pub advanced: RawStatTable,
    pub scoreboard: Vec<(String, RawStatTable)>,
    pub live: Value,
    pub boxscore: Value,
    pub standings_calls: AtomicU32,
}

impl FakeProvider {
    /// Standings and advanced stats for LAL, BOS and DEN.
    pub fn with_team_stats() -> Self {
        FakeProvider {
            standings: standings_table(),
            advanced: advanced_table(),
            ..Default::default()
        }
    }
}

fn non_empty(table: &RawStatTable, what: &str) -> Result<RawStatTable, PredictionError> {
    if table.is_empty() {
        Err(PredictionError::UpstreamUnavailable(format!("{} returned no rows", what)))
    } else {
        Ok(table.clone())
    }
}

#[async_trait]
impl StatsProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn game_log(
        &self,
        season: &str,
        season_type: SeasonType,
    ) -> Result<RawStatTable, PredictionError> {
        match self.game_logs.get(&(season.to_string(), season_type)) {
            Some(t) => non_empty(t, "game log"),
            None => Err(PredictionError::UpstreamUnavailable(format!(
                "no game log for {} {}",
                season, season_type
            ))),
        }
    }

    async fn standings(&self, _: &str, _: SeasonType) -> Result<RawStatTable, PredictionError> {
        self.standings_calls.fetch_add(1, Ordering::SeqCst);
        non_empty(&self.standings, "standings")
    }

    async fn advanced_team_stats(
        &self,
        _: &str,
        _: SeasonType,
    ) -> Result<RawStatTable, PredictionError> {
        non_empty(&self.advanced, "advanced stats")
    }

    async fn scoreboard(
        &self,
        _: NaiveDate,
    ) -> Result<Vec<(String, RawStatTable)>, PredictionError> {
        Ok(self.scoreboard.clone())
    }

    async fn live_scoreboard(&self) -> Result<Value, PredictionError> {
        Ok(self.live.clone())
    }

    async fn boxscore(&self, _: &str) -> Result<Value, PredictionError> {
        Ok(self.boxscore.clone())
    }
}

pub fn standings_table() -> RawStatTable {
    RawStatTable::new(
        ["LeagueID", "TeamID", "TeamCity", "WinPCT", "HOME", "ROAD", "L10", "DiffPointsPG"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        vec![
            vec![json!("00"), json!(LAL), json!("Los Angeles"), json!(0.6), json!("20-5"), json!("10-10"), json!("7-3"), json!(4.5)],
            vec![json!("00"), json!(BOS), json!("Boston"), json!(0.5), json!("15-10"), json!("10-15"), json!("5-5"), json!(0.0)],
            vec![json!("00"), json!(DEN), json!("Denver"), json!(0.7), json!("22-3"), json!("13-12"), json!("8-2"), json!(8.0)],
        ],
    )
}

pub fn advanced_table() -> RawStatTable {
    RawStatTable::new(
        ["TEAM_ID", "TEAM_NAME", "OFF_RATING", "DEF_RATING", "NET_RATING", "PACE"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        vec![
            vec![json!(LAL), json!("Los Angeles Lakers"), json!(115.0), json!(108.0), json!(7.0), json!(99.0)],
            vec![json!(BOS), json!("Boston Celtics"), json!(112.0), json!(110.0), json!(2.0), json!(97.0)],
            vec![json!(DEN), json!("Denver Nuggets"), json!(118.0), json!(109.0), json!(9.0), json!(98.0)],
        ],
    )
}
