//! Game-log rows (one per team per game) into one labelled [`GameRecord`]
//! per game.

use chrono::NaiveDate;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::db::models::GameRecord;
use crate::error::PredictionError;
use crate::stats::table::{value_as_f64, value_as_i64, FieldAliases, RawStatTable};
use crate::stats::SeasonType;

const GAME_ID: FieldAliases = FieldAliases::new("game_id", &["GAME_ID"]);
const GAME_DATE: FieldAliases = FieldAliases::new("game_date", &["GAME_DATE"]);
const MATCHUP: FieldAliases = FieldAliases::new("matchup", &["MATCHUP"]);
const TEAM_ID: FieldAliases = FieldAliases::new("team_id", &["TEAM_ID"]);
const TEAM_ABBREVIATION: FieldAliases =
    FieldAliases::new("team_abbreviation", &["TEAM_ABBREVIATION"]);
const WL: FieldAliases = FieldAliases::new("wl", &["WL"]);
const PTS: FieldAliases = FieldAliases::new("pts", &["PTS"]);
const PLUS_MINUS: FieldAliases = FieldAliases::new("plus_minus", &["PLUS_MINUS"]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Home,
    Visitor,
}

/// Venue of `abbr` within a matchup descriptor ("DEN vs. LAL", "LAL @ DEN").
/// Home patterns are tested first.
pub fn classify_side(matchup: &str, abbr: &str) -> Option<Side> {
    if matchup.contains(&format!("@{}", abbr)) || matchup.contains(&format!("{} vs.", abbr)) {
        Some(Side::Home)
    } else if matchup.contains(&format!("{} @", abbr)) || matchup.contains(&format!("vs. {}", abbr))
    {
        Some(Side::Visitor)
    } else {
        None
    }
}

#[derive(Debug, Clone, Default)]
pub struct LabelBuildOutcome {
    pub games: Vec<GameRecord>,
    /// Games dropped because one side was never assigned.
    pub discarded: usize,
    /// Rows whose identity cells could not be read.
    pub skipped_rows: usize,
    /// Rows ignored because their side was already taken or undeterminable.
    pub unassigned_rows: usize,
}

struct Columns {
    game_id: usize,
    game_date: usize,
    matchup: usize,
    team_id: usize,
    abbr: usize,
    wl: usize,
    pts: usize,
    plus_minus: usize,
}

impl Columns {
    fn resolve(table: &RawStatTable) -> Result<Self, PredictionError> {
        Ok(Columns {
            game_id: table.resolve_column(&GAME_ID)?,
            game_date: table.resolve_column(&GAME_DATE)?,
            matchup: table.resolve_column(&MATCHUP)?,
            team_id: table.resolve_column(&TEAM_ID)?,
            abbr: table.resolve_column(&TEAM_ABBREVIATION)?,
            wl: table.resolve_column(&WL)?,
            pts: table.resolve_column(&PTS)?,
            plus_minus: table.resolve_column(&PLUS_MINUS)?,
        })
    }
}

#[derive(Debug, Clone)]
struct TeamLine {
    team_id: i64,
    abbr: String,
    wl: Option<String>,
    pts: i64,
    plus_minus: f64,
}

struct LogRow {
    game_id: String,
    game_date: NaiveDate,
    matchup: String,
    line: TeamLine,
}

struct PendingGame {
    game_id: String,
    game_date: NaiveDate,
    matchup: String,
    home: Option<TeamLine>,
    visitor: Option<TeamLine>,
}

pub struct GameLabelBuilder {
    season: String,
    season_type: SeasonType,
}

impl GameLabelBuilder {
    pub fn new(season: &str, season_type: SeasonType) -> Self {
        GameLabelBuilder {
            season: season.to_string(),
            season_type,
        }
    }

    /// Pair the two rows of every game into one record. A missing required
    /// column fails the whole table; unreadable rows and one-sided games are
    /// counted and dropped.
    pub fn build(&self, table: &RawStatTable) -> Result<LabelBuildOutcome, PredictionError> {
        let cols = Columns::resolve(table)?;
        let mut outcome = LabelBuildOutcome::default();
        let mut pending: Vec<PendingGame> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for row in &table.rows {
            let Some(parsed) = read_row(&cols, row) else {
                debug!("Skipping unreadable game-log row: {:?}", row);
                outcome.skipped_rows += 1;
                continue;
            };

            let slot = *index.entry(parsed.game_id.clone()).or_insert_with(|| {
                pending.push(PendingGame {
                    game_id: parsed.game_id.clone(),
                    game_date: parsed.game_date,
                    matchup: parsed.matchup.clone(),
                    home: None,
                    visitor: None,
                });
                pending.len() - 1
            });
            let game = &mut pending[slot];

            match classify_side(&parsed.matchup, &parsed.line.abbr) {
                Some(side) => {
                    let target = match side {
                        Side::Home => &mut game.home,
                        Side::Visitor => &mut game.visitor,
                    };
                    if target.is_none() {
                        *target = Some(parsed.line);
                    } else {
                        warn!(
                            "Assigning {:?} {} twice for game {}; keeping the first",
                            side, parsed.line.abbr, parsed.game_id
                        );
                        outcome.unassigned_rows += 1;
                    }
                }
                None => {
                    warn!(
                        "Could not determine home/visitor for {} in '{}' game {}",
                        parsed.line.abbr, parsed.matchup, parsed.game_id
                    );
                    outcome.unassigned_rows += 1;
                }
            }
        }

        for game in pending {
            match (game.home, game.visitor) {
                (Some(home), Some(visitor)) => outcome.games.push(GameRecord {
                    game_id: game.game_id,
                    season_year: self.season.clone(),
                    game_date: game.game_date,
                    matchup: game.matchup,
                    home_team_id: home.team_id,
                    home_team_abbreviation: home.abbr,
                    visitor_team_id: visitor.team_id,
                    visitor_team_abbreviation: visitor.abbr,
                    home_pts: home.pts,
                    visitor_pts: visitor.pts,
                    wl_home: home.wl,
                    wl_visitor: visitor.wl,
                    plus_minus_home: home.plus_minus,
                    plus_minus_visitor: visitor.plus_minus,
                    season_type: self.season_type.as_str().to_string(),
                }),
                _ => {
                    warn!("Missing home or visitor data for game {}, skipping", game.game_id);
                    outcome.discarded += 1;
                }
            }
        }

        info!(
            "{} {}: {} games labelled, {} discarded, {} rows skipped",
            self.season,
            self.season_type,
            outcome.games.len(),
            outcome.discarded,
            outcome.skipped_rows
        );
        Ok(outcome)
    }
}

fn read_row(cols: &Columns, row: &[Value]) -> Option<LogRow> {
    let game_id = match row.get(cols.game_id)? {
        Value::String(s) if !s.is_empty() => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let date_text = row.get(cols.game_date)?.as_str()?;
    let date_part = date_text.split('T').next().unwrap_or(date_text);
    let game_date = NaiveDate::parse_from_str(date_part.trim(), "%Y-%m-%d").ok()?;
    let matchup = row.get(cols.matchup)?.as_str()?.trim().to_string();
    let team_id = value_as_i64(row.get(cols.team_id)?)?;
    let abbr = row.get(cols.abbr)?.as_str()?.to_string();
    let wl = row.get(cols.wl)?.as_str().map(str::to_string);
    let pts = match row.get(cols.pts)? {
        Value::Null => 0,
        v => value_as_i64(v)?,
    };
    let plus_minus = match row.get(cols.plus_minus)? {
        Value::Null => 0.0,
        v => value_as_f64(v)?,
    };

    Some(LogRow {
        game_id,
        game_date,
        matchup,
        line: TeamLine {
            team_id,
            abbr,
            wl,
            pts,
            plus_minus,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use serde_json::json;

    fn headers() -> Vec<String> {
        [
            "SEASON_ID", "TEAM_ID", "TEAM_ABBREVIATION", "GAME_ID", "GAME_DATE", "MATCHUP", "WL",
            "PTS", "PLUS_MINUS",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn row(team_id: i64, abbr: &str, game_id: &str, matchup: &str, wl: &str, pts: i64, pm: f64) -> Vec<Value> {
        vec![
            json!("22023"),
            json!(team_id),
            json!(abbr),
            json!(game_id),
            json!("2023-10-24T00:00:00"),
            json!(matchup),
            json!(wl),
            json!(pts),
            json!(pm),
        ]
    }

    fn season_table() -> RawStatTable {
        RawStatTable::new(
            headers(),
            vec![
                row(1610612747, "LAL", "0022300061", "LAL @ DEN", "L", 107, -12.0),
                row(1610612743, "DEN", "0022300061", "DEN vs. LAL", "W", 119, 12.0),
                row(1610612756, "PHX", "0022300062", "PHX @ GSW", "W", 108, 4.0),
                row(1610612744, "GSW", "0022300062", "GSW vs. PHX", "L", 104, -4.0),
            ],
        )
    }

    #[test]
    fn classifies_both_matchup_styles() {
        assert_eq!(classify_side("DEN vs. LAL", "DEN"), Some(Side::Home));
        assert_eq!(classify_side("LAL @ DEN", "LAL"), Some(Side::Visitor));
        assert_eq!(classify_side("LAL@DEN", "DEN"), Some(Side::Home));
        assert_eq!(classify_side("DEN vs. LAL", "LAL"), Some(Side::Visitor));
        assert_eq!(classify_side("DEN vs. LAL", "BOS"), None);
    }

    #[test]
    fn pairs_rows_into_games_in_first_seen_order() {
        let outcome = GameLabelBuilder::new("2023-24", SeasonType::Regular)
            .build(&season_table())
            .unwrap();
        assert_eq!(outcome.discarded, 0);
        assert_eq!(outcome.games.len(), 2);

        let g = &outcome.games[0];
        assert_eq!(g.game_id, "0022300061");
        assert_eq!(g.game_date, NaiveDate::from_ymd_opt(2023, 10, 24).unwrap());
        assert_eq!(g.matchup, "LAL @ DEN");
        assert_eq!(g.home_team_abbreviation, "DEN");
        assert_eq!(g.visitor_team_id, 1610612747);
        assert_eq!((g.home_pts, g.visitor_pts), (119, 107));
        assert!(g.home_won());
        assert_eq!(g.season_type, "Regular Season");
        assert_eq!(outcome.games[1].game_id, "0022300062");
    }

    #[test]
    fn one_sided_games_are_discarded_and_counted() {
        let mut table = season_table();
        table.rows.push(row(1610612738, "BOS", "0022300063", "BOS vs. NYK", "W", 108, 4.0));
        let outcome = GameLabelBuilder::new("2023-24", SeasonType::Regular)
            .build(&table)
            .unwrap();
        assert_eq!(outcome.games.len(), 2);
        assert_eq!(outcome.discarded, 1);
    }

    #[test]
    fn first_assignment_wins_on_conflict() {
        // Both rows claim the visitor side; the game never gets a home team.
        let table = RawStatTable::new(
            headers(),
            vec![
                row(1, "AAA", "1", "AAA @ BBB", "W", 100, 1.0),
                row(2, "BBB", "1", "BBB @ AAA", "L", 99, -1.0),
            ],
        );
        let outcome = GameLabelBuilder::new("2023-24", SeasonType::Playoffs)
            .build(&table)
            .unwrap();
        assert!(outcome.games.is_empty());
        assert_eq!(outcome.discarded, 1);
        assert_eq!(outcome.unassigned_rows, 1);
    }

    #[test]
    fn null_points_default_to_zero() {
        let mut table = season_table();
        table.rows[0][7] = Value::Null;
        table.rows[0][8] = Value::Null;
        let outcome = GameLabelBuilder::new("2023-24", SeasonType::Regular)
            .build(&table)
            .unwrap();
        assert_eq!(outcome.games[0].visitor_pts, 0);
        assert_eq!(outcome.games[0].plus_minus_visitor, 0.0);
    }

    #[test]
    fn unreadable_rows_are_skipped() {
        let mut table = season_table();
        table.rows[3][3] = Value::Null;
        let outcome = GameLabelBuilder::new("2023-24", SeasonType::Regular)
            .build(&table)
            .unwrap();
        assert_eq!(outcome.skipped_rows, 1);
        assert_eq!(outcome.games.len(), 1);
        assert_eq!(outcome.discarded, 1);
    }

    #[test]
    fn missing_column_is_structure_mismatch() {
        let mut table = season_table();
        table.headers[5] = "MATCH".into();
        let err = GameLabelBuilder::new("2023-24", SeasonType::Regular)
            .build(&table)
            .unwrap_err();
        assert!(matches!(err, PredictionError::StructureMismatch(_)));
    }

    #[test]
    fn rebuilding_and_storing_twice_keeps_one_row_per_game() {
        let db = Database::open_in_memory().unwrap();
        let builder = GameLabelBuilder::new("2023-24", SeasonType::Regular);
        for _ in 0..2 {
            let outcome = builder.build(&season_table()).unwrap();
            db.upsert_games(&outcome.games).unwrap();
        }
        assert_eq!(db.count_games().unwrap(), 2);
    }
}
