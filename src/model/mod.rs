pub mod artifact;
pub mod estimator;
pub mod logistic;

pub use artifact::TrainedModel;
pub use estimator::WinProbabilityEstimator;

use serde::Serialize;

/// Home and visitor win probabilities, rounded to four decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WinProbability {
    pub home_win_probability: f64,
    pub visitor_win_probability: f64,
}

impl WinProbability {
    /// The visitor side is derived from the rounded home side so the pair
    /// always sums to one.
    pub fn from_home(p: f64) -> Self {
        let home = round4(p);
        WinProbability {
            home_win_probability: home,
            visitor_win_probability: round4(1.0 - home),
        }
    }
}

pub fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}
