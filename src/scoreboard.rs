//! Field mapping from upstream scoreboard and box-score payloads to the
//! shapes served by the API.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::error::PredictionError;
use crate::stats::table::{value_as_f64, value_as_i64, FieldAliases, RawStatTable};

const TEAM_ID_TO_ABBR: [(i64, &str); 30] = [
    (1610612737, "ATL"),
    (1610612738, "BOS"),
    (1610612751, "BKN"),
    (1610612766, "CHA"),
    (1610612741, "CHI"),
    (1610612739, "CLE"),
    (1610612742, "DAL"),
    (1610612743, "DEN"),
    (1610612765, "DET"),
    (1610612744, "GSW"),
    (1610612745, "HOU"),
    (1610612754, "IND"),
    (1610612746, "LAC"),
    (1610612747, "LAL"),
    (1610612763, "MEM"),
    (1610612748, "MIA"),
    (1610612749, "MIL"),
    (1610612750, "MIN"),
    (1610612740, "NOP"),
    (1610612752, "NYK"),
    (1610612760, "OKC"),
    (1610612753, "ORL"),
    (1610612755, "PHI"),
    (1610612756, "PHX"),
    (1610612757, "POR"),
    (1610612758, "SAC"),
    (1610612759, "SAS"),
    (1610612761, "TOR"),
    (1610612762, "UTA"),
    (1610612764, "WAS"),
];

pub fn team_abbreviation(team_id: i64) -> &'static str {
    TEAM_ID_TO_ABBR
        .iter()
        .find(|(id, _)| *id == team_id)
        .map(|(_, abbr)| *abbr)
        .unwrap_or("UNK")
}

// ── Live scoreboard ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveGame {
    pub id: String,
    pub home_team_score: Option<i64>,
    pub visitor_team_score: Option<i64>,
    /// e.g. "Q1 9:34", "Halftime", "Final"
    pub status: Option<String>,
    pub period: i64,
    pub game_clock: Option<String>,
}

/// `{"scoreboard": {"games": [...]}}` into live games. Malformed games are
/// skipped; a malformed document yields no games.
pub fn transform_live_scoreboard(raw: &Value) -> Vec<LiveGame> {
    let Some(games) = raw["scoreboard"]["games"].as_array() else {
        warn!("Live scoreboard has no scoreboard.games list");
        return Vec::new();
    };

    games
        .iter()
        .filter_map(|game| {
            let id = game["gameId"].as_str().filter(|s| !s.is_empty());
            let (home, away) = (&game["homeTeam"], &game["awayTeam"]);
            let Some(id) = id.filter(|_| home.is_object() && away.is_object()) else {
                warn!("Skipping live game without gameId/homeTeam/awayTeam");
                return None;
            };
            Some(LiveGame {
                id: id.to_string(),
                home_team_score: value_as_i64(&home["score"]),
                visitor_team_score: value_as_i64(&away["score"]),
                status: game["gameStatusText"].as_str().map(str::to_string),
                period: value_as_i64(&game["period"]).unwrap_or(0),
                game_clock: game["gameClock"].as_str().map(str::to_string),
            })
        })
        .collect()
}

// ── Daily scoreboard ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamSummary {
    pub id: i64,
    pub abbreviation: String,
    pub full_name: String,
    pub name: String,
}

impl TeamSummary {
    fn new(id: i64, full_name: Option<&str>) -> Self {
        let abbreviation = team_abbreviation(id).to_string();
        let full_name = full_name
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| abbreviation.clone());
        let name = match full_name.rsplit_once(' ') {
            Some((_, last)) => last.to_string(),
            None => abbreviation.clone(),
        };
        TeamSummary {
            id,
            abbreviation,
            full_name,
            name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodScore {
    pub period: usize,
    /// "Q1".."Q4", then "OT1", "OT2", ...
    pub period_name: String,
    pub home_score: i64,
    pub visitor_score: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduledGame {
    pub id: String,
    pub date: String,
    pub home_team_score: i64,
    pub visitor_team_score: i64,
    pub period: i64,
    pub status: String,
    /// Game clock while in progress, otherwise the status text.
    pub time: String,
    pub home_team: TeamSummary,
    pub visitor_team: TeamSummary,
    pub period_scores: Vec<PeriodScore>,
}

const GH_GAME_ID: FieldAliases = FieldAliases::new("game_id", &["GAME_ID"]);
const GH_DATE: FieldAliases = FieldAliases::new("game_date_est", &["GAME_DATE_EST"]);
const GH_STATUS: FieldAliases = FieldAliases::new("game_status_text", &["GAME_STATUS_TEXT"]);
const GH_HOME_ID: FieldAliases = FieldAliases::new("home_team_id", &["HOME_TEAM_ID"]);
const GH_VISITOR_ID: FieldAliases = FieldAliases::new("visitor_team_id", &["VISITOR_TEAM_ID"]);
const GH_CLOCK: FieldAliases = FieldAliases::new("live_pc_time", &["LIVE_PC_TIME"]);
const GH_PERIOD: FieldAliases = FieldAliases::new("period", &["LIVE_PERIOD", "PERIOD"]);
const GH_HOME_NAME: FieldAliases = FieldAliases::new("home_team_name", &["HOME_TEAM_NAME"]);
const GH_VISITOR_NAME: FieldAliases =
    FieldAliases::new("visitor_team_name", &["VISITOR_TEAM_NAME"]);

const LS_GAME_ID: FieldAliases = FieldAliases::new("game_id", &["GAME_ID"]);
const LS_TEAM_ID: FieldAliases = FieldAliases::new("team_id", &["TEAM_ID"]);
const LS_PTS: FieldAliases = FieldAliases::new("pts", &["PTS"]);

const REGULATION_PERIODS: usize = 4;
const MAX_OVERTIMES: usize = 10;

#[derive(Debug, Default)]
struct LineScore {
    total: i64,
    periods: Vec<i64>,
}

fn period_name(index: usize) -> String {
    if index < REGULATION_PERIODS {
        format!("Q{}", index + 1)
    } else {
        format!("OT{}", index + 1 - REGULATION_PERIODS)
    }
}

/// Line scores keyed by (game id, team id). Period cells that were never
/// played (null or absent) are dropped.
fn line_scores(table: &RawStatTable) -> Result<HashMap<(String, i64), LineScore>, PredictionError> {
    let game_col = table.resolve_column(&LS_GAME_ID)?;
    let team_col = table.resolve_column(&LS_TEAM_ID)?;
    let pts_col = table.resolve_column(&LS_PTS)?;

    let period_cols: Vec<Option<usize>> = (1..=REGULATION_PERIODS)
        .map(|i| format!("PTS_QTR{}", i))
        .chain((1..=MAX_OVERTIMES).map(|i| format!("PTS_OT{}", i)))
        .map(|name| table.headers.iter().position(|h| h.eq_ignore_ascii_case(&name)))
        .collect();

    let mut scores = HashMap::new();
    for row in &table.rows {
        let (Some(game_id), Some(team_id)) = (
            row.get(game_col).and_then(Value::as_str),
            row.get(team_col).and_then(value_as_i64),
        ) else {
            continue;
        };
        let periods = period_cols
            .iter()
            .filter_map(|c| c.and_then(|c| row.get(c)).and_then(value_as_i64))
            .collect();
        scores.insert(
            (game_id.to_string(), team_id),
            LineScore {
                total: row.get(pts_col).and_then(value_as_i64).unwrap_or(0),
                periods,
            },
        );
    }
    Ok(scores)
}

fn find_set<'a>(sets: &'a [(String, RawStatTable)], name: &str) -> Option<&'a RawStatTable> {
    sets.iter().find(|(n, _)| n == name).map(|(_, t)| t)
}

/// Join the scoreboard's "GameHeader" and "LineScore" sets. No header rows
/// means no games; a header set missing its identity columns is a
/// structure mismatch. A broken line score only costs the scores.
pub fn transform_scoreboard(
    sets: &[(String, RawStatTable)],
) -> Result<Vec<ScheduledGame>, PredictionError> {
    let Some(header) = find_set(sets, "GameHeader").filter(|t| !t.is_empty()) else {
        debug!("Scoreboard has no GameHeader rows");
        return Ok(Vec::new());
    };

    let id_col = header.resolve_column(&GH_GAME_ID)?;
    let date_col = header.resolve_column(&GH_DATE)?;
    let status_col = header.resolve_column(&GH_STATUS)?;
    let home_col = header.resolve_column(&GH_HOME_ID)?;
    let visitor_col = header.resolve_column(&GH_VISITOR_ID)?;
    let period_col = header.find_column(&GH_PERIOD);
    let clock_col = header.find_column(&GH_CLOCK);
    let home_name_col = header.find_column(&GH_HOME_NAME);
    let visitor_name_col = header.find_column(&GH_VISITOR_NAME);

    let scores = match find_set(sets, "LineScore").filter(|t| !t.is_empty()) {
        Some(t) => line_scores(t).unwrap_or_else(|e| {
            warn!("Ignoring line scores: {}", e);
            HashMap::new()
        }),
        None => HashMap::new(),
    };

    let cell = |row: &[Value], col: Option<usize>| -> Option<String> {
        col.and_then(|c| row.get(c))
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    let mut games = Vec::new();
    for row in &header.rows {
        let Some(id) = cell(row, Some(id_col)) else {
            warn!("Skipping GameHeader row without a game id");
            continue;
        };
        let home_id = row.get(home_col).and_then(value_as_i64).unwrap_or(0);
        let visitor_id = row.get(visitor_col).and_then(value_as_i64).unwrap_or(0);
        let home_ls = scores.get(&(id.clone(), home_id));
        let visitor_ls = scores.get(&(id.clone(), visitor_id));

        let home_periods = home_ls.map(|l| l.periods.as_slice()).unwrap_or_default();
        let visitor_periods = visitor_ls.map(|l| l.periods.as_slice()).unwrap_or_default();
        let period_scores = (0..home_periods.len().max(visitor_periods.len()))
            .map(|i| PeriodScore {
                period: i + 1,
                period_name: period_name(i),
                home_score: home_periods.get(i).copied().unwrap_or(0),
                visitor_score: visitor_periods.get(i).copied().unwrap_or(0),
            })
            .collect();

        let status = cell(row, Some(status_col)).unwrap_or_default().trim().to_string();
        let time = cell(row, clock_col)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| status.clone());

        games.push(ScheduledGame {
            id,
            date: cell(row, Some(date_col)).unwrap_or_default(),
            home_team_score: home_ls.map(|l| l.total).unwrap_or(0),
            visitor_team_score: visitor_ls.map(|l| l.total).unwrap_or(0),
            period: period_col
                .and_then(|c| row.get(c))
                .and_then(value_as_i64)
                .unwrap_or(0),
            status,
            time,
            home_team: TeamSummary::new(home_id, cell(row, home_name_col).as_deref()),
            visitor_team: TeamSummary::new(visitor_id, cell(row, visitor_name_col).as_deref()),
            period_scores,
        });
    }
    Ok(games)
}

// ── Box score ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerRef {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamRef {
    pub abbreviation: String,
    pub nba_team_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerLine {
    pub player: PlayerRef,
    pub team: TeamRef,
    pub min: String,
    pub pts: i64,
    pub reb: i64,
    pub ast: i64,
    pub fgm: Option<i64>,
    pub fga: Option<i64>,
    pub fg_pct: Option<f64>,
    pub fg3m: Option<i64>,
    pub fg3a: Option<i64>,
    pub fg3_pct: Option<f64>,
    pub ftm: Option<i64>,
    pub fta: Option<i64>,
    pub ft_pct: Option<f64>,
    pub oreb: Option<i64>,
    pub dreb: Option<i64>,
    pub stl: Option<i64>,
    pub blk: Option<i64>,
    pub tov: Option<i64>,
    pub pf: Option<i64>,
    pub plus_minus: i64,
}

fn stat_i64(stats: &Value, key: &str) -> Option<i64> {
    match &stats[key] {
        Value::String(s) if s.is_empty() => None,
        v => value_as_f64(v).map(|f| f.trunc() as i64),
    }
}

fn stat_f64(stats: &Value, key: &str) -> Option<f64> {
    value_as_f64(&stats[key])
}

fn player_line(player: &Value, team_id: &str, tricode: &str) -> Option<PlayerLine> {
    let id = value_as_i64(&player["personId"])?;
    let first_name = player["firstName"].as_str()?.to_string();
    let last_name = player["familyName"].as_str()?.to_string();
    let s = &player["statistics"];
    Some(PlayerLine {
        player: PlayerRef {
            id,
            first_name,
            last_name,
        },
        team: TeamRef {
            abbreviation: tricode.to_string(),
            nba_team_id: team_id.to_string(),
        },
        min: s["minutes"]
            .as_str()
            .filter(|m| !m.is_empty())
            .unwrap_or("-")
            .to_string(),
        pts: stat_i64(s, "points").unwrap_or(0),
        reb: stat_i64(s, "reboundsTotal").unwrap_or(0),
        ast: stat_i64(s, "assists").unwrap_or(0),
        fgm: stat_i64(s, "fieldGoalsMade"),
        fga: stat_i64(s, "fieldGoalsAttempted"),
        fg_pct: stat_f64(s, "fieldGoalsPercentage"),
        fg3m: stat_i64(s, "threePointersMade"),
        fg3a: stat_i64(s, "threePointersAttempted"),
        fg3_pct: stat_f64(s, "threePointersPercentage"),
        ftm: stat_i64(s, "freeThrowsMade"),
        fta: stat_i64(s, "freeThrowsAttempted"),
        ft_pct: stat_f64(s, "freeThrowsPercentage"),
        oreb: stat_i64(s, "reboundsOffensive"),
        dreb: stat_i64(s, "reboundsDefensive"),
        stl: stat_i64(s, "steals"),
        blk: stat_i64(s, "blocks"),
        tov: stat_i64(s, "turnovers"),
        pf: stat_i64(s, "foulsPersonal"),
        plus_minus: stat_i64(s, "plusMinusPoints").unwrap_or(0),
    })
}

/// Player lines of both teams from a V3 traditional box score, home team
/// first. Players without an id or name are skipped.
pub fn transform_boxscore(raw: &Value) -> Vec<PlayerLine> {
    let body = &raw["boxScoreTraditional"];
    let mut lines = Vec::new();
    for side in ["homeTeam", "awayTeam"] {
        let team = &body[side];
        let Some(players) = team["players"].as_array() else {
            warn!("Box score has no players for {}", side);
            continue;
        };
        let team_id = match &team["teamId"] {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            v => v.to_string(),
        };
        let tricode = team["teamTricode"].as_str().unwrap_or_default();
        for p in players {
            match player_line(p, &team_id, tricode) {
                Some(line) => lines.push(line),
                None => warn!("Skipping box score player without id/name in {}", side),
            }
        }
    }
    lines
}
