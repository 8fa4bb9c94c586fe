//! Matchup feature vector for the win-probability model.
//!
//! The order of [`FEATURE_NAMES`] is part of the model contract: the trained
//! artifact records it and refuses to load against a different one.

use serde_json::Value;
use tracing::warn;

use crate::error::PredictionError;
use crate::stats::table::{value_as_f64, FieldAliases, TeamStatRecord};

pub const FEATURE_COUNT: usize = 21;

pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "H_WPCT",
    "V_WPCT",
    "DIFF_WPCT",
    "H_LOC_WPCT",
    "V_LOC_WPCT",
    "DIFF_LOC_WPCT",
    "H_L10_WPCT",
    "V_L10_WPCT",
    "DIFF_L10_WPCT",
    "H_OFF_RTG",
    "V_OFF_RTG",
    "DIFF_OFF_RTG",
    "H_DEF_RTG",
    "V_DEF_RTG",
    "DIFF_DEF_RTG_INV",
    "H_NET_RTG",
    "V_NET_RTG",
    "DIFF_NET_RTG",
    "H_PACE",
    "V_PACE",
    "DIFF_PACE",
];

// Standings fields
pub const WIN_PCT: FieldAliases = FieldAliases::new("win pct", &["w_pct", "winpct"]);
pub const HOME_RECORD: FieldAliases = FieldAliases::new("home record", &["home"]);
pub const ROAD_RECORD: FieldAliases = FieldAliases::new("road record", &["road"]);
pub const LAST_10_RECORD: FieldAliases = FieldAliases::new("last-10 record", &["l10"]);
pub const POINT_DIFF: FieldAliases =
    FieldAliases::new("point differential", &["diffpointspg", "plus_minus"]);

// Advanced fields
pub const OFF_RATING: FieldAliases = FieldAliases::new("offensive rating", &["off_rating"]);
pub const DEF_RATING: FieldAliases = FieldAliases::new("defensive rating", &["def_rating"]);
pub const PACE: FieldAliases = FieldAliases::new("pace", &["pace"]);

const POINT_DIFF_MIN: f64 = -15.0;
const POINT_DIFF_MAX: f64 = 15.0;

/// A win-percentage cell: either already a fraction, or a "W-L" record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WinPctSource {
    Numeric(f64),
    Record { wins: u32, losses: u32 },
}

impl WinPctSource {
    /// Classify a raw cell. `None` for null, text that is neither a number
    /// nor a well-formed record, and any other JSON shape.
    pub fn from_value(v: &Value) -> Option<Self> {
        match v {
            Value::Number(n) => n.as_f64().map(WinPctSource::Numeric),
            Value::String(s) => Self::parse(s),
            _ => None,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.contains('-') {
            let (w, l) = s.split_once('-')?;
            Some(WinPctSource::Record {
                wins: w.trim().parse().ok()?,
                losses: l.trim().parse().ok()?,
            })
        } else {
            s.parse().ok().map(WinPctSource::Numeric)
        }
    }
}

/// Fraction of games won. A record with no games played is 0.0.
pub fn win_pct(source: WinPctSource) -> f64 {
    match source {
        WinPctSource::Numeric(v) => v,
        WinPctSource::Record { wins, losses } => {
            let played = f64::from(wins) + f64::from(losses);
            if played == 0.0 {
                0.0
            } else {
                f64::from(wins) / played
            }
        }
    }
}

/// "W-L" text to a fraction, or `default` when malformed or 0-0.
#[cfg(test)]
pub fn pct_from_record(record: &str, default: f64) -> f64 {
    match WinPctSource::parse(record) {
        Some(source @ WinPctSource::Record { wins, losses }) if wins > 0 || losses > 0 => {
            win_pct(source)
        }
        _ => default,
    }
}

/// Clamp a per-game point differential to ±15 and rescale it to [0, 1].
/// Missing or non-finite input maps to the neutral 0.5.
pub fn normalize_point_diff(diff: Option<f64>) -> f64 {
    match diff {
        Some(d) if d.is_finite() => {
            let clamped = d.clamp(POINT_DIFF_MIN, POINT_DIFF_MAX);
            (clamped - POINT_DIFF_MIN) / (POINT_DIFF_MAX - POINT_DIFF_MIN)
        }
        _ => 0.5,
    }
}

/// Ordered model inputs for one matchup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn from_values(values: [f64; FEATURE_COUNT]) -> Self {
        FeatureVector(values)
    }

    pub fn values(&self) -> &[f64; FEATURE_COUNT] {
        &self.0
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| self.0[i])
    }

    /// Name of the first non-finite feature, if any.
    pub fn first_non_finite(&self) -> Option<&'static str> {
        self.0
            .iter()
            .zip(FEATURE_NAMES)
            .find(|(v, _)| !v.is_finite())
            .map(|(_, name)| name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchupFeatures {
    pub vector: FeatureVector,
    pub home_point_diff_norm: f64,
    pub visitor_point_diff_norm: f64,
}

/// Win percentage of one field, 0.0 with a warning when absent or garbled.
pub fn record_win_pct(record: &TeamStatRecord, field: &FieldAliases, team: &str) -> f64 {
    match record.value_any(field).and_then(WinPctSource::from_value) {
        Some(source) => win_pct(source),
        None => {
            warn!(
                "{}: unusable {} ({:?}), using 0.0",
                team,
                field.field,
                record.value_any(field)
            );
            0.0
        }
    }
}

fn rating(record: &TeamStatRecord, field: &FieldAliases, team: &str) -> f64 {
    match record.f64_field(field) {
        Some(v) => v,
        None => {
            warn!("{}: {} missing or non-numeric, using 0.0", team, field.field);
            0.0
        }
    }
}

pub fn point_diff(record: &TeamStatRecord) -> Option<f64> {
    record.value_any(&POINT_DIFF).and_then(value_as_f64)
}

/// Build the feature vector for `home` hosting `visitor`. Absent fields are
/// defaulted; a non-finite result is an error.
pub fn build_features(
    home: &TeamStatRecord,
    visitor: &TeamStatRecord,
) -> Result<MatchupFeatures, PredictionError> {
    let h_wpct = record_win_pct(home, &WIN_PCT, "home");
    let v_wpct = record_win_pct(visitor, &WIN_PCT, "visitor");
    let h_loc = record_win_pct(home, &HOME_RECORD, "home");
    let v_loc = record_win_pct(visitor, &ROAD_RECORD, "visitor");
    let h_l10 = record_win_pct(home, &LAST_10_RECORD, "home");
    let v_l10 = record_win_pct(visitor, &LAST_10_RECORD, "visitor");

    let h_off = rating(home, &OFF_RATING, "home");
    let v_off = rating(visitor, &OFF_RATING, "visitor");
    let h_def = rating(home, &DEF_RATING, "home");
    let v_def = rating(visitor, &DEF_RATING, "visitor");
    let h_pace = rating(home, &PACE, "home");
    let v_pace = rating(visitor, &PACE, "visitor");

    let h_net = h_off - h_def;
    let v_net = v_off - v_def;

    let vector = FeatureVector([
        h_wpct,
        v_wpct,
        h_wpct - v_wpct,
        h_loc,
        v_loc,
        h_loc - v_loc,
        h_l10,
        v_l10,
        h_l10 - v_l10,
        h_off,
        v_off,
        h_off - v_off,
        h_def,
        v_def,
        v_def - h_def,
        h_net,
        v_net,
        h_net - v_net,
        h_pace,
        v_pace,
        h_pace - v_pace,
    ]);

    if let Some(name) = vector.first_non_finite() {
        return Err(PredictionError::FeatureComputation(format!(
            "{} is not finite",
            name
        )));
    }

    Ok(MatchupFeatures {
        vector,
        home_point_diff_norm: normalize_point_diff(point_diff(home)),
        visitor_point_diff_norm: normalize_point_diff(point_diff(visitor)),
    })
}
