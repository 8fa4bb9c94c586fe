pub mod combiner;
pub mod features;
pub mod labels;
pub mod rating;

pub use combiner::{combine, CombinedTeamStats};
pub use features::build_features;
pub use labels::GameLabelBuilder;
pub use rating::{rating_probability, RatingWeights};
