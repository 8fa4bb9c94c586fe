use thiserror::Error;

/// Failure kinds surfaced by the stats pipeline and the prediction service.
///
/// Every variant is distinguishable by callers; only per-field defaulting in
/// the feature builder absorbs errors instead of returning one of these.
#[derive(Debug, Error)]
pub enum PredictionError {
    /// The stats provider failed or returned an empty/malformed table.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// An expected column (or every alias of it) is absent. Not retryable.
    #[error("structure mismatch: {0}")]
    StructureMismatch(String),

    /// One or both requested teams have no entry in the combined stats.
    #[error("team data not found for: {}", format_team_ids(.0))]
    TeamNotFound(Vec<i64>),

    /// The model or its standardization transform failed to load at startup.
    #[error("win probability model is not loaded")]
    ModelUnready,

    #[error("feature computation failed: {0}")]
    FeatureComputation(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl PredictionError {
    /// Whether another attempt against the upstream provider could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PredictionError::UpstreamUnavailable(_))
    }
}

fn format_team_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| format!("Team ID {}", id))
        .collect::<Vec<_>>()
        .join(", ")
}
