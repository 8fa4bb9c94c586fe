use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

use super::artifact::TrainedModel;
use super::WinProbability;
use crate::error::PredictionError;
use crate::pipeline::features::FeatureVector;

/// Serves home-win probabilities from the model loaded at startup.
///
/// An estimator without a model stays usable: every prediction reports
/// [`PredictionError::ModelUnready`] instead of failing the process.
#[derive(Clone, Default)]
pub struct WinProbabilityEstimator {
    model: Option<Arc<TrainedModel>>,
}

impl WinProbabilityEstimator {
    pub fn new(model: TrainedModel) -> Self {
        WinProbabilityEstimator {
            model: Some(Arc::new(model)),
        }
    }

    pub fn unready() -> Self {
        Self::default()
    }

    /// Load both artifacts from `dir`, logging instead of failing when they
    /// are absent or invalid.
    pub fn load(dir: &Path) -> Self {
        match TrainedModel::load(dir) {
            Ok(m) => {
                info!("Win probability model loaded from {}", dir.display());
                Self::new(m)
            }
            Err(e) => {
                error!("Win probability model unavailable: {:#}", e);
                Self::unready()
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.model.is_some()
    }

    pub fn predict(&self, features: &FeatureVector) -> Result<WinProbability, PredictionError> {
        let trained = self.model.as_ref().ok_or(PredictionError::ModelUnready)?;
        let scaled = trained.scaler.transform(features.values());
        let p = trained.model.probability(&scaled);
        if !p.is_finite() {
            return Err(PredictionError::FeatureComputation(
                "model produced a non-finite probability".into(),
            ));
        }
        Ok(WinProbability::from_home(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::artifact::tests::net_rating_model;
    use crate::pipeline::features::FEATURE_COUNT;
    use approx::assert_relative_eq;

    fn vector_with_net_diff(diff: f64) -> FeatureVector {
        let mut values = [0.0; FEATURE_COUNT];
        values[17] = diff;
        FeatureVector::from_values(values)
    }

    #[test]
    fn unready_estimator_rejects_every_request() {
        let est = WinProbabilityEstimator::unready();
        assert!(!est.is_ready());
        assert!(matches!(
            est.predict(&vector_with_net_diff(5.0)),
            Err(PredictionError::ModelUnready)
        ));
    }

    #[test]
    fn predictions_sum_to_one_and_follow_the_signal() {
        let est = WinProbabilityEstimator::new(net_rating_model());
        let even = est.predict(&vector_with_net_diff(-0.5)).unwrap();
        assert_eq!(even.home_win_probability, 0.5);

        let mut prev = 0.0;
        for d in [-20.0, -5.0, 0.0, 3.3, 12.0] {
            let p = est.predict(&vector_with_net_diff(d)).unwrap();
            assert_relative_eq!(
                p.home_win_probability + p.visitor_win_probability,
                1.0,
                epsilon = 1e-9
            );
            assert!(p.home_win_probability >= prev);
            prev = p.home_win_probability;
        }
    }

    #[test]
    fn scaling_is_applied_before_scoring() {
        let mut m = net_rating_model();
        m.scaler.mean[17] = 10.0;
        m.scaler.scale[17] = 0.0;
        let est = WinProbabilityEstimator::new(m);
        // (9.5 - 10) / 1 * 0.2 + 0.1 = 0
        let p = est.predict(&vector_with_net_diff(9.5)).unwrap();
        assert_eq!(p.home_win_probability, 0.5);
    }

    #[test]
    fn missing_artifacts_leave_estimator_unready() {
        let est = WinProbabilityEstimator::load(Path::new("/nonexistent/model/dir"));
        assert!(!est.is_ready());
    }
}
