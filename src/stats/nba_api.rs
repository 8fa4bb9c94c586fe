use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{header, Client};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::error::PredictionError;
use super::provider::{SeasonType, StatsProvider};
use super::table::RawStatTable;

pub const DEFAULT_STATS_URL: &str = "https://stats.nba.com/stats";
pub const DEFAULT_LIVE_URL: &str = "https://cdn.nba.com/static/json/liveData";

/// Stats provider backed by stats.nba.com and the live-data CDN.
///
/// stats.nba.com rejects requests without browser-like headers, so every
/// request carries a user agent, referer and origin.
#[derive(Clone)]
pub struct NbaStatsClient {
    http: Client,
    stats_url: String,
    live_url: String,
}

impl NbaStatsClient {
    pub fn new(stats_url: &str, live_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:72.0) Gecko/20100101 Firefox/72.0",
            ),
        );
        headers.insert(header::REFERER, header::HeaderValue::from_static("https://www.nba.com/"));
        headers.insert(header::ORIGIN, header::HeaderValue::from_static("https://www.nba.com"));
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;
        Ok(NbaStatsClient {
            http,
            stats_url: stats_url.trim_end_matches('/').to_string(),
            live_url: live_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value, PredictionError> {
        debug!("GET {} {:?}", url, query);
        let resp = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| PredictionError::UpstreamUnavailable(format!("request to {} failed: {}", url, e)))?;

        if !resp.status().is_success() {
            return Err(PredictionError::UpstreamUnavailable(format!(
                "{} returned {}",
                url,
                resp.status()
            )));
        }

        resp.json::<Value>()
            .await
            .map_err(|e| PredictionError::UpstreamUnavailable(format!("invalid JSON from {}: {}", url, e)))
    }

    async fn stats_endpoint(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<Value, PredictionError> {
        let url = format!("{}/{}", self.stats_url, endpoint);
        self.get_json(&url, query).await
    }
}

#[async_trait]
impl StatsProvider for NbaStatsClient {
    fn name(&self) -> &str {
        "stats.nba.com"
    }

    async fn game_log(
        &self,
        season: &str,
        season_type: SeasonType,
    ) -> Result<RawStatTable, PredictionError> {
        let raw = self
            .stats_endpoint(
                "leaguegamelog",
                &[
                    ("Counter", "0"),
                    ("Direction", "ASC"),
                    ("LeagueID", "00"),
                    ("PlayerOrTeam", "T"),
                    ("Season", season),
                    ("SeasonType", season_type.as_str()),
                    ("Sorter", "DATE"),
                ],
            )
            .await?;
        first_result_set(&raw)
    }

    async fn standings(
        &self,
        season: &str,
        season_type: SeasonType,
    ) -> Result<RawStatTable, PredictionError> {
        let raw = self
            .stats_endpoint(
                "leaguestandingsv3",
                &[
                    ("LeagueID", "00"),
                    ("Season", season),
                    ("SeasonType", season_type.as_str()),
                ],
            )
            .await?;
        first_result_set(&raw)
    }

    async fn advanced_team_stats(
        &self,
        season: &str,
        season_type: SeasonType,
    ) -> Result<RawStatTable, PredictionError> {
        let raw = self
            .stats_endpoint(
                "leaguedashteamstats",
                &[
                    ("MeasureType", "Advanced"),
                    ("PerMode", "PerGame"),
                    ("PlusMinus", "N"),
                    ("PaceAdjust", "N"),
                    ("Rank", "N"),
                    ("LeagueID", "00"),
                    ("Season", season),
                    ("SeasonType", season_type.as_str()),
                    ("LastNGames", "0"),
                    ("Month", "0"),
                    ("OpponentTeamID", "0"),
                    ("Period", "0"),
                    ("TeamID", "0"),
                    ("DateFrom", ""),
                    ("DateTo", ""),
                    ("GameSegment", ""),
                    ("Location", ""),
                    ("Outcome", ""),
                    ("PORound", "0"),
                    ("SeasonSegment", ""),
                    ("ShotClockRange", ""),
                    ("VsConference", ""),
                    ("VsDivision", ""),
                    ("Conference", ""),
                    ("Division", ""),
                    ("GameScope", ""),
                    ("PlayerExperience", ""),
                    ("PlayerPosition", ""),
                    ("StarterBench", ""),
                    ("TwoWay", "0"),
                ],
            )
            .await?;
        first_result_set(&raw)
    }

    async fn scoreboard(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<(String, RawStatTable)>, PredictionError> {
        let date = date.format("%Y-%m-%d").to_string();
        let raw = self
            .stats_endpoint(
                "scoreboardv2",
                &[("GameDate", date.as_str()), ("LeagueID", "00"), ("DayOffset", "0")],
            )
            .await?;
        parse_result_sets(&raw)
    }

    async fn live_scoreboard(&self) -> Result<Value, PredictionError> {
        let url = format!("{}/scoreboard/todaysScoreboard_00.json", self.live_url);
        self.get_json(&url, &[]).await
    }

    async fn boxscore(&self, game_id: &str) -> Result<Value, PredictionError> {
        self.stats_endpoint(
            "boxscoretraditionalv3",
            &[
                ("GameID", game_id),
                ("StartPeriod", "0"),
                ("EndPeriod", "0"),
                ("StartRange", "0"),
                ("EndRange", "0"),
                ("RangeType", "0"),
            ],
        )
        .await
    }
}

/// Parse every entry of a `resultSets` payload into `(name, table)` pairs.
///
/// A payload without `resultSets`, or whose sets lack `headers`/`rowSet`, is
/// malformed and reported as an upstream failure so callers may retry.
pub fn parse_result_sets(raw: &Value) -> Result<Vec<(String, RawStatTable)>, PredictionError> {
    // A few endpoints return a single object under `resultSet` instead.
    let sets: Vec<&Value> = if let Some(a) = raw["resultSets"].as_array() {
        a.iter().collect()
    } else if raw["resultSet"].is_object() {
        vec![&raw["resultSet"]]
    } else {
        return Err(PredictionError::UpstreamUnavailable(
            "response has no resultSets".into(),
        ));
    };

    sets.into_iter()
        .enumerate()
        .map(|(i, set)| {
            let name = set["name"].as_str().map(str::to_string).unwrap_or_else(|| i.to_string());
            let headers = set["headers"]
                .as_array()
                .ok_or_else(|| {
                    PredictionError::UpstreamUnavailable(format!("result set '{}' has no headers", name))
                })?
                .iter()
                .map(|h| h.as_str().unwrap_or_default().to_string())
                .collect();
            let rows = set["rowSet"]
                .as_array()
                .ok_or_else(|| {
                    PredictionError::UpstreamUnavailable(format!("result set '{}' has no rowSet", name))
                })?
                .iter()
                .map(|r| r.as_array().cloned().unwrap_or_default())
                .collect();
            Ok((name, RawStatTable::new(headers, rows)))
        })
        .collect()
}

/// The first result set, which is the one every tabular endpoint here
/// cares about. An empty row set counts as an upstream failure.
pub fn first_result_set(raw: &Value) -> Result<RawStatTable, PredictionError> {
    let (name, table) = parse_result_sets(raw)?
        .into_iter()
        .next()
        .ok_or_else(|| PredictionError::UpstreamUnavailable("resultSets is empty".into()))?;
    if table.is_empty() {
        return Err(PredictionError::UpstreamUnavailable(format!(
            "result set '{}' returned no rows",
            name
        )));
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_named_result_sets() {
        let raw = json!({
            "resultSets": [
                {"name": "GameHeader", "headers": ["GAME_ID", "HOME_TEAM_ID"], "rowSet": [["0022300001", 1610612747]]},
                {"name": "LineScore", "headers": ["GAME_ID"], "rowSet": []}
            ]
        });
        let sets = parse_result_sets(&raw).unwrap();
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].0, "GameHeader");
        assert_eq!(sets[0].1.headers, vec!["GAME_ID", "HOME_TEAM_ID"]);
        assert_eq!(sets[0].1.rows[0][1], json!(1610612747));
        assert!(sets[1].1.is_empty());
    }

    #[test]
    fn single_result_set_object_is_accepted() {
        let raw = json!({"resultSet": {"name": "Standings", "headers": ["TeamID"], "rowSet": [[1]]}});
        let t = first_result_set(&raw).unwrap();
        assert_eq!(t.rows.len(), 1);
    }

    #[test]
    fn empty_or_malformed_payloads_are_upstream_failures() {
        let empty = json!({"resultSets": [{"name": "LeagueGameLog", "headers": ["GAME_ID"], "rowSet": []}]});
        assert!(matches!(
            first_result_set(&empty),
            Err(PredictionError::UpstreamUnavailable(_))
        ));
        assert!(matches!(
            first_result_set(&json!({"message": "rate limited"})),
            Err(PredictionError::UpstreamUnavailable(_))
        ));
    }
}
