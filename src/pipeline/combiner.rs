use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::error::PredictionError;
use crate::stats::table::{value_as_i64, FieldAliases, RawStatTable, TeamStatRecord};

/// Every upstream table names its team identifier differently.
pub const TEAM_ID: FieldAliases =
    FieldAliases::new("team id", &["TEAM_ID", "TeamID", "teamid", "team_id"]);

/// Advanced columns carried into the merged record. Null when the team has
/// no advanced row.
const ADVANCED_COLUMNS: [&str; 4] = ["off_rating", "def_rating", "pace", "net_rating"];

/// Estimated variants, copied only when the advanced table has them.
const ESTIMATED_COLUMNS: [&str; 4] = ["e_off_rating", "e_def_rating", "e_pace", "e_net_rating"];

/// Standings joined with advanced metrics, keyed by canonical team id.
#[derive(Debug, Clone, Default)]
pub struct CombinedTeamStats {
    teams: HashMap<i64, TeamStatRecord>,
}

impl CombinedTeamStats {
    pub fn get(&self, team_id: i64) -> Option<&TeamStatRecord> {
        self.teams.get(&team_id)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.teams.len()
    }

    /// Both teams of a matchup; a miss names every absent id.
    pub fn pair(
        &self,
        home_team_id: i64,
        visitor_team_id: i64,
    ) -> Result<(&TeamStatRecord, &TeamStatRecord), PredictionError> {
        match (self.get(home_team_id), self.get(visitor_team_id)) {
            (Some(h), Some(v)) => Ok((h, v)),
            (h, v) => {
                let mut missing = Vec::new();
                if h.is_none() {
                    missing.push(home_team_id);
                }
                if v.is_none() {
                    missing.push(visitor_team_id);
                }
                Err(PredictionError::TeamNotFound(missing))
            }
        }
    }
}

/// Whether the merged record carries the advanced ratings the model is
/// trained on. Serving tolerates the nulls; the training table does not.
pub fn has_advanced_stats(record: &TeamStatRecord) -> bool {
    ["off_rating", "def_rating", "pace"]
        .iter()
        .all(|col| matches!(record.value(col), Some(v) if !v.is_null()))
}

/// Left join standings onto advanced stats by team id.
pub fn combine(
    standings: &RawStatTable,
    advanced: &RawStatTable,
) -> Result<CombinedTeamStats, PredictionError> {
    let standings = index_by_team(standings, "standings")?;
    let advanced = index_by_team(advanced, "advanced")?;

    let teams = standings
        .into_iter()
        .map(|(id, mut record)| {
            let adv = advanced.get(&id);
            if adv.is_none() {
                warn!("Team {} has no advanced stats row", id);
            }
            for col in ADVANCED_COLUMNS {
                let v = adv.and_then(|a| a.value(col)).cloned().unwrap_or(Value::Null);
                record.insert(col, v);
            }
            for col in ESTIMATED_COLUMNS {
                if let Some(v) = adv.and_then(|a| a.value(col)) {
                    record.insert(col, v.clone());
                }
            }
            (id, record)
        })
        .collect::<HashMap<_, _>>();

    debug!("Combined stats for {} teams", teams.len());
    Ok(CombinedTeamStats { teams })
}

fn index_by_team(
    table: &RawStatTable,
    label: &str,
) -> Result<HashMap<i64, TeamStatRecord>, PredictionError> {
    let id_col = table.resolve_column(&TEAM_ID).map_err(|e| match e {
        PredictionError::StructureMismatch(msg) => {
            PredictionError::StructureMismatch(format!("{} table: {}", label, msg))
        }
        other => other,
    })?;

    let mut by_team = HashMap::new();
    for (row, record) in table.rows.iter().zip(table.records()) {
        match row.get(id_col).and_then(value_as_i64) {
            Some(id) => {
                by_team.entry(id).or_insert(record);
            }
            None => warn!("Dropping {} row with unreadable team id: {:?}", label, row.get(id_col)),
        }
    }
    Ok(by_team)
}
