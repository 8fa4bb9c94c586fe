//! Weighted standings rating: a model-free estimate from win percentages and
//! point differentials.

use tracing::debug;

use super::features::{
    normalize_point_diff, point_diff, record_win_pct, HOME_RECORD, LAST_10_RECORD, ROAD_RECORD,
    WIN_PCT,
};
use crate::model::WinProbability;
use crate::stats::table::{FieldAliases, TeamStatRecord};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingWeights {
    pub overall_wpct: f64,
    pub location_wpct: f64,
    pub last10_wpct: f64,
    pub overall_diff: f64,
    pub location_diff: f64,
    pub last10_diff: f64,
}

impl Default for RatingWeights {
    fn default() -> Self {
        RatingWeights {
            overall_wpct: 0.10,
            location_wpct: 0.15,
            last10_wpct: 0.15,
            overall_diff: 0.30,
            location_diff: 0.15,
            last10_diff: 0.15,
        }
    }
}

const HOME_POINT_DIFF: FieldAliases = FieldAliases::new("home point differential", &["homepointdiff"]);
const ROAD_POINT_DIFF: FieldAliases = FieldAliases::new("road point differential", &["roadpointdiff"]);
const LAST_10_POINT_DIFF: FieldAliases =
    FieldAliases::new("last-10 point differential", &["l10pointdiff"]);

/// Split differential when the table has one, else the overall one.
fn split_diff(record: &TeamStatRecord, split: &FieldAliases) -> f64 {
    let diff = record.f64_field(split).or_else(|| point_diff(record));
    normalize_point_diff(diff)
}

/// Rating of one side. `location` is the home record for the home team and
/// the road record for the visitor.
pub fn team_rating(
    record: &TeamStatRecord,
    location: &FieldAliases,
    location_diff: &FieldAliases,
    weights: &RatingWeights,
    team: &str,
) -> f64 {
    record_win_pct(record, &WIN_PCT, team) * weights.overall_wpct
        + record_win_pct(record, location, team) * weights.location_wpct
        + record_win_pct(record, &LAST_10_RECORD, team) * weights.last10_wpct
        + normalize_point_diff(point_diff(record)) * weights.overall_diff
        + split_diff(record, location_diff) * weights.location_diff
        + split_diff(record, &LAST_10_POINT_DIFF) * weights.last10_diff
}

/// Share of the combined rating held by each side; an even split when the
/// ratings sum to nothing.
pub fn rating_probability(
    home: &TeamStatRecord,
    visitor: &TeamStatRecord,
    weights: &RatingWeights,
) -> WinProbability {
    let rating_home = team_rating(home, &HOME_RECORD, &HOME_POINT_DIFF, weights, "home");
    let rating_visitor = team_rating(visitor, &ROAD_RECORD, &ROAD_POINT_DIFF, weights, "visitor");
    debug!("Rating H: {:.4}, Rating V: {:.4}", rating_home, rating_visitor);

    let total = rating_home + rating_visitor;
    if total.is_nan() || total <= 0.0 {
        return WinProbability::from_home(0.5);
    }
    WinProbability::from_home(rating_home / total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    fn team(wpct: f64, loc: &str, l10: &str, diff: f64) -> TeamStatRecord {
        TeamStatRecord::from_pairs([
            ("WinPCT", json!(wpct)),
            ("HOME", json!(loc)),
            ("ROAD", json!(loc)),
            ("L10", json!(l10)),
            ("DiffPointsPG", json!(diff)),
        ])
    }

    #[test]
    fn even_teams_split_evenly() {
        let t = team(0.5, "10-10", "5-5", 0.0);
        let p = rating_probability(&t, &t, &RatingWeights::default());
        assert_eq!(p.home_win_probability, 0.5);
        assert_eq!(p.visitor_win_probability, 0.5);
    }

    #[test]
    fn stronger_home_team_is_favoured() {
        let home = team(0.7, "15-5", "8-2", 8.0);
        let visitor = team(0.4, "6-14", "3-7", -4.0);
        let p = rating_probability(&home, &visitor, &RatingWeights::default());
        assert!(p.home_win_probability > 0.5);
        assert_relative_eq!(p.home_win_probability + p.visitor_win_probability, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn split_differentials_fall_back_to_overall() {
        let w = RatingWeights::default();
        let mut with_split = team(0.5, "10-10", "5-5", 3.0);
        let without_split = with_split.clone();
        // Same value as the overall differential: no change.
        with_split.insert("HomePointDiff", json!(3.0));
        assert_relative_eq!(
            team_rating(&with_split, &HOME_RECORD, &HOME_POINT_DIFF, &w, "home"),
            team_rating(&without_split, &HOME_RECORD, &HOME_POINT_DIFF, &w, "home"),
        );
    }

    #[test]
    fn zero_weights_give_even_split() {
        let zero = RatingWeights {
            overall_wpct: 0.0,
            location_wpct: 0.0,
            last10_wpct: 0.0,
            overall_diff: 0.0,
            location_diff: 0.0,
            last10_diff: 0.0,
        };
        let t = team(0.9, "18-2", "9-1", 12.0);
        let p = rating_probability(&t, &t, &zero);
        assert_eq!(p.home_win_probability, 0.5);
    }
}
