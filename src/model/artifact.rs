use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

use super::logistic::{LogisticModel, StandardScaler};
use crate::pipeline::features::{FEATURE_COUNT, FEATURE_NAMES};

pub const MODEL_FILE: &str = "logistic_regression_model.json";
pub const SCALER_FILE: &str = "scaler.json";

/// Logistic scorer plus the standardization it was trained behind.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedModel {
    pub model: LogisticModel,
    pub scaler: StandardScaler,
}

impl TrainedModel {
    /// Check the pair against the compiled feature order.
    pub fn validate(&self) -> Result<()> {
        let expected: Vec<String> = FEATURE_NAMES.iter().map(|s| s.to_string()).collect();
        if self.model.feature_names != expected {
            bail!(
                "model was trained on features {:?}, expected {:?}",
                self.model.feature_names,
                expected
            );
        }
        if self.scaler.feature_names != expected {
            bail!("scaler feature list does not match the model");
        }
        if self.model.weights.len() != FEATURE_COUNT
            || self.scaler.mean.len() != FEATURE_COUNT
            || self.scaler.scale.len() != FEATURE_COUNT
        {
            bail!("model or scaler has the wrong number of coefficients");
        }
        Ok(())
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create model directory {}", dir.display()))?;
        write_json(&dir.join(MODEL_FILE), &self.model)?;
        write_json(&dir.join(SCALER_FILE), &self.scaler)?;
        Ok(())
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let model: LogisticModel = read_json(&dir.join(MODEL_FILE))?;
        let scaler: StandardScaler = read_json(&dir.join(SCALER_FILE))?;
        let trained = TrainedModel { model, scaler };
        trained.validate()?;
        Ok(trained)
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let body = serde_json::to_string_pretty(value)?;
    fs::write(path, body).with_context(|| format!("Failed to write {}", path.display()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let body =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&body).with_context(|| format!("Invalid artifact {}", path.display()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Identity scaler and a model that only looks at DIFF_NET_RTG.
    pub fn net_rating_model() -> TrainedModel {
        let names: Vec<String> = FEATURE_NAMES.iter().map(|s| s.to_string()).collect();
        let mut weights = vec![0.0; FEATURE_COUNT];
        weights[17] = 0.2;
        TrainedModel {
            model: LogisticModel {
                feature_names: names.clone(),
                weights,
                intercept: 0.1,
            },
            scaler: StandardScaler {
                feature_names: names,
                mean: vec![0.0; FEATURE_COUNT],
                scale: vec![1.0; FEATURE_COUNT],
            },
        }
    }

    fn temp_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("courtside-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn save_then_load_returns_the_same_model() {
        let dir = temp_dir("artifact");
        let m = net_rating_model();
        m.save(&dir).unwrap();
        assert_eq!(TrainedModel::load(&dir).unwrap(), m);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_or_mismatched_artifacts_fail_to_load() {
        let dir = temp_dir("missing");
        assert!(TrainedModel::load(&dir).is_err());

        let mut m = net_rating_model();
        m.model.feature_names.swap(0, 1);
        m.save(&dir).unwrap();
        assert!(TrainedModel::load(&dir).is_err());
        let _ = fs::remove_dir_all(&dir);
    }
}
