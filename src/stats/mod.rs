pub mod nba_api;
pub mod provider;
pub mod retry;
pub mod table;

#[cfg(test)]
pub(crate) mod fake;

pub use nba_api::NbaStatsClient;
pub use provider::{SeasonType, StatsProvider};
pub use retry::RetryPolicy;

use chrono::{Datelike, NaiveDate};

/// Season label ("2024-25") in play on `today`. Seasons roll over in
/// September; anything earlier belongs to the season that started the
/// previous autumn.
pub fn season_label(today: NaiveDate) -> String {
    let start = if today.month() < 9 {
        today.year() - 1
    } else {
        today.year()
    };
    format!("{}-{:02}", start, (start + 1).rem_euclid(100))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn season_label_rolls_over_in_september() {
        assert_eq!(season_label(d("2024-03-15")), "2023-24");
        assert_eq!(season_label(d("2024-08-31")), "2023-24");
        assert_eq!(season_label(d("2024-09-01")), "2024-25");
        assert_eq!(season_label(d("1999-12-01")), "1999-00");
    }
}
