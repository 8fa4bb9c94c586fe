use anyhow::{anyhow, Context, Result};
use rusqlite::{params, params_from_iter, Connection};
use std::sync::{Arc, Mutex, MutexGuard};

pub mod models;
use models::*;

use crate::pipeline::features::{FeatureVector, FEATURE_COUNT, FEATURE_NAMES};

/// Thread-safe SQLite handle (single connection with mutex)
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the SQLite database at the given path
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection mutex poisoned"))
    }

    // ── Games ────────────────────────────────────────────────────────────────

    /// Insert a game, replacing any existing row with the same game ID.
    #[cfg(test)]
    pub fn upsert_game(&self, game: &GameRecord) -> Result<()> {
        let conn = self.conn()?;
        insert_game(&conn, game)?;
        Ok(())
    }

    /// Upsert a batch of games in one transaction; returns how many were written.
    pub fn upsert_games(&self, games: &[GameRecord]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for game in games {
            insert_game(&tx, game)
                .with_context(|| format!("Failed to store game {}", game.game_id))?;
        }
        tx.commit()?;
        Ok(games.len())
    }

    /// Every game with both teams known, oldest first.
    pub fn list_games(&self) -> Result<Vec<GameRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT game_id, season_year, game_date, matchup,
                    home_team_id, home_team_abbreviation,
                    visitor_team_id, visitor_team_abbreviation,
                    home_pts, visitor_pts, wl_home, wl_visitor,
                    plus_minus_home, plus_minus_visitor, season_type
             FROM games
             WHERE home_team_id IS NOT NULL AND visitor_team_id IS NOT NULL
             ORDER BY game_date ASC, game_id ASC",
        )?;
        let games = stmt
            .query_map([], map_game)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(games)
    }

    pub fn count_games(&self) -> Result<i64> {
        let conn = self.conn()?;
        let n = conn.query_row("SELECT COUNT(*) FROM games", [], |r| r.get(0))?;
        Ok(n)
    }

    // ── Training features ────────────────────────────────────────────────────

    /// Replace the whole training table with `rows`.
    pub fn replace_feature_rows(&self, rows: &[FeatureRow]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM game_features", [])?;
        {
            let mut stmt = tx.prepare(&insert_feature_sql())?;
            for row in rows {
                let mut values: Vec<rusqlite::types::Value> = vec![
                    row.game_id.clone().into(),
                    row.game_date.format("%Y-%m-%d").to_string().into(),
                    row.season_year.clone().into(),
                    row.season_type.clone().into(),
                    row.home_team_id.into(),
                    row.visitor_team_id.into(),
                    row.home_team_abbr.clone().into(),
                    row.visitor_team_abbr.clone().into(),
                    i64::from(row.home_win).into(),
                ];
                values.extend(row.features.values().iter().map(|v| (*v).into()));
                values.push(row.home_point_diff_norm.into());
                values.push(row.visitor_point_diff_norm.into());
                stmt.execute(params_from_iter(values))?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }

    /// The training table, oldest game first.
    pub fn list_feature_rows(&self) -> Result<Vec<FeatureRow>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT game_id, game_date, season_year, season_type,
                    home_team_id, visitor_team_id, home_team_abbr, visitor_team_abbr,
                    home_win, {}, home_point_diff_norm, visitor_point_diff_norm
             FROM game_features ORDER BY game_date ASC, game_id ASC",
            FEATURE_NAMES.join(", ")
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], map_feature_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

// ── SQL helpers ────────────────────────────────────────────────────────────────

fn insert_game(conn: &Connection, game: &GameRecord) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT OR REPLACE INTO games (
            game_id, season_year, game_date, matchup,
            home_team_id, home_team_abbreviation,
            visitor_team_id, visitor_team_abbreviation,
            home_pts, visitor_pts, wl_home, wl_visitor,
            plus_minus_home, plus_minus_visitor, season_type
         ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15)",
        params![
            game.game_id,
            game.season_year,
            game.game_date,
            game.matchup,
            game.home_team_id,
            game.home_team_abbreviation,
            game.visitor_team_id,
            game.visitor_team_abbreviation,
            game.home_pts,
            game.visitor_pts,
            game.wl_home,
            game.wl_visitor,
            game.plus_minus_home,
            game.plus_minus_visitor,
            game.season_type,
        ],
    )
}

fn insert_feature_sql() -> String {
    let columns = 9 + FEATURE_COUNT + 2;
    let placeholders = (1..=columns)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "INSERT OR REPLACE INTO game_features (
            game_id, game_date, season_year, season_type,
            home_team_id, visitor_team_id, home_team_abbr, visitor_team_abbr,
            home_win, {}, home_point_diff_norm, visitor_point_diff_norm
         ) VALUES ({})",
        FEATURE_NAMES.join(", "),
        placeholders
    )
}

fn map_game(row: &rusqlite::Row) -> rusqlite::Result<GameRecord> {
    Ok(GameRecord {
        game_id: row.get(0)?,
        season_year: row.get(1)?,
        game_date: row.get(2)?,
        matchup: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        home_team_id: row.get(4)?,
        home_team_abbreviation: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        visitor_team_id: row.get(6)?,
        visitor_team_abbreviation: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        home_pts: row.get::<_, Option<i64>>(8)?.unwrap_or(0),
        visitor_pts: row.get::<_, Option<i64>>(9)?.unwrap_or(0),
        wl_home: row.get(10)?,
        wl_visitor: row.get(11)?,
        plus_minus_home: row.get::<_, Option<f64>>(12)?.unwrap_or(0.0),
        plus_minus_visitor: row.get::<_, Option<f64>>(13)?.unwrap_or(0.0),
        season_type: row.get(14)?,
    })
}

fn map_feature_row(row: &rusqlite::Row) -> rusqlite::Result<FeatureRow> {
    let mut values = [0.0f64; FEATURE_COUNT];
    for (i, v) in values.iter_mut().enumerate() {
        *v = row.get(9 + i)?;
    }
    Ok(FeatureRow {
        game_id: row.get(0)?,
        game_date: row.get(1)?,
        season_year: row.get(2)?,
        season_type: row.get(3)?,
        home_team_id: row.get(4)?,
        visitor_team_id: row.get(5)?,
        home_team_abbr: row.get(6)?,
        visitor_team_abbr: row.get(7)?,
        home_win: row.get::<_, i64>(8)? == 1,
        features: FeatureVector::from_values(values),
        home_point_diff_norm: row.get(9 + FEATURE_COUNT)?,
        visitor_point_diff_norm: row.get(10 + FEATURE_COUNT)?,
    })
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS games (
    game_id                   TEXT    PRIMARY KEY,
    season_year               TEXT    NOT NULL,
    game_date                 TEXT    NOT NULL,
    matchup                   TEXT,
    home_team_id              INTEGER,
    home_team_abbreviation    TEXT,
    visitor_team_id           INTEGER,
    visitor_team_abbreviation TEXT,
    home_pts                  INTEGER,
    visitor_pts               INTEGER,
    wl_home                   TEXT,
    wl_visitor                TEXT,
    plus_minus_home           REAL,
    plus_minus_visitor        REAL,
    season_type               TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS game_features (
    game_id                 TEXT    PRIMARY KEY,
    game_date               TEXT    NOT NULL,
    season_year             TEXT    NOT NULL,
    season_type             TEXT    NOT NULL,
    home_team_id            INTEGER NOT NULL,
    visitor_team_id         INTEGER NOT NULL,
    home_team_abbr          TEXT    NOT NULL,
    visitor_team_abbr       TEXT    NOT NULL,
    home_win                INTEGER NOT NULL,
    h_wpct                  REAL NOT NULL,
    v_wpct                  REAL NOT NULL,
    diff_wpct               REAL NOT NULL,
    h_loc_wpct              REAL NOT NULL,
    v_loc_wpct              REAL NOT NULL,
    diff_loc_wpct           REAL NOT NULL,
    h_l10_wpct              REAL NOT NULL,
    v_l10_wpct              REAL NOT NULL,
    diff_l10_wpct           REAL NOT NULL,
    h_off_rtg               REAL NOT NULL,
    v_off_rtg               REAL NOT NULL,
    diff_off_rtg            REAL NOT NULL,
    h_def_rtg               REAL NOT NULL,
    v_def_rtg               REAL NOT NULL,
    diff_def_rtg_inv        REAL NOT NULL,
    h_net_rtg               REAL NOT NULL,
    v_net_rtg               REAL NOT NULL,
    diff_net_rtg            REAL NOT NULL,
    h_pace                  REAL NOT NULL,
    v_pace                  REAL NOT NULL,
    diff_pace               REAL NOT NULL,
    home_point_diff_norm    REAL NOT NULL,
    visitor_point_diff_norm REAL NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_games_date ON games(game_date);
CREATE INDEX IF NOT EXISTS idx_features_date ON game_features(game_date);
"#;

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::NaiveDate;

    pub fn game(id: &str, date: &str, home_wl: &str) -> GameRecord {
        GameRecord {
            game_id: id.into(),
            season_year: "2023-24".into(),
            game_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            matchup: "LAL @ DEN".into(),
            home_team_id: 1610612743,
            home_team_abbreviation: "DEN".into(),
            visitor_team_id: 1610612747,
            visitor_team_abbreviation: "LAL".into(),
            home_pts: 119,
            visitor_pts: 107,
            wl_home: Some(home_wl.into()),
            wl_visitor: Some(if home_wl == "W" { "L" } else { "W" }.into()),
            plus_minus_home: 12.0,
            plus_minus_visitor: -12.0,
            season_type: "Regular Season".into(),
        }
    }

    #[test]
    fn upsert_is_idempotent_per_game_id() {
        let db = Database::open_in_memory().unwrap();
        let g = game("0022300061", "2023-10-24", "W");
        db.upsert_game(&g).unwrap();
        db.upsert_game(&g).unwrap();
        assert_eq!(db.count_games().unwrap(), 1);

        // A later fetch overwrites the earlier one.
        let mut updated = g.clone();
        updated.home_pts = 120;
        db.upsert_games(&[updated.clone()]).unwrap();
        let games = db.list_games().unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0], updated);
    }

    #[test]
    fn games_are_listed_oldest_first() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_games(&[
            game("0022300100", "2023-11-02", "L"),
            game("0022300001", "2023-10-24", "W"),
            game("0022300050", "2023-10-30", "W"),
        ])
        .unwrap();
        let ids: Vec<String> = db.list_games().unwrap().into_iter().map(|g| g.game_id).collect();
        assert_eq!(ids, vec!["0022300001", "0022300050", "0022300100"]);
    }

    #[test]
    fn feature_rows_round_trip_in_date_order() {
        let db = Database::open_in_memory().unwrap();
        let mut values = [0.0; FEATURE_COUNT];
        for (i, v) in values.iter_mut().enumerate() {
            *v = i as f64 * 0.5;
        }
        let row = |id: &str, date: &str| FeatureRow {
            game_id: id.into(),
            game_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            season_year: "2023-24".into(),
            season_type: "Regular Season".into(),
            home_team_id: 1,
            visitor_team_id: 2,
            home_team_abbr: "AAA".into(),
            visitor_team_abbr: "BBB".into(),
            home_win: true,
            features: FeatureVector::from_values(values),
            home_point_diff_norm: 0.6,
            visitor_point_diff_norm: 0.4,
        };
        db.replace_feature_rows(&[row("2", "2023-12-01"), row("1", "2023-11-01")])
            .unwrap();
        let stored = db.list_feature_rows().unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0], row("1", "2023-11-01"));

        // Rebuilding replaces, it does not append.
        db.replace_feature_rows(&[row("3", "2024-01-01")]).unwrap();
        assert_eq!(db.list_feature_rows().unwrap().len(), 1);
    }
}
