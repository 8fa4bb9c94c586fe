//! Standardization and L2-regularized logistic regression fit by full-batch
//! gradient descent, plus the evaluation metrics reported after training.

use serde::{Deserialize, Serialize};

const EPS: f64 = 1e-15;

pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        let z = (-x).exp();
        1.0 / (1.0 + z)
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}

fn clamp_prob(p: f64) -> f64 {
    p.clamp(EPS, 1.0 - EPS)
}

fn logloss(p: f64, y: f64) -> f64 {
    let p = clamp_prob(p);
    -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
}

/// Per-feature mean and (population) standard deviation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub feature_names: Vec<String>,
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Fit on `rows`; every row must have `feature_names.len()` values.
    /// Constant columns get a scale of 1.
    pub fn fit<R: AsRef<[f64]>>(feature_names: &[&str], rows: &[R]) -> Self {
        let width = feature_names.len();
        let n = rows.len().max(1) as f64;
        let mut mean = vec![0.0; width];
        for row in rows {
            for (m, x) in mean.iter_mut().zip(row.as_ref()) {
                *m += x;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut var = vec![0.0; width];
        for row in rows {
            for ((v, x), m) in var.iter_mut().zip(row.as_ref()).zip(&mean) {
                *v += (x - m).powi(2);
            }
        }
        let scale = var
            .into_iter()
            .map(|v| {
                let s = (v / n).sqrt();
                if s > 0.0 && s.is_finite() {
                    s
                } else {
                    1.0
                }
            })
            .collect();

        StandardScaler {
            feature_names: feature_names.iter().map(|s| s.to_string()).collect(),
            mean,
            scale,
        }
    }

    pub fn transform(&self, x: &[f64]) -> Vec<f64> {
        x.iter()
            .zip(&self.mean)
            .zip(&self.scale)
            .map(|((x, m), s)| {
                let s = if *s == 0.0 { 1.0 } else { *s };
                (x - m) / s
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub feature_names: Vec<String>,
    pub weights: Vec<f64>,
    pub intercept: f64,
}

impl LogisticModel {
    pub fn decision(&self, x: &[f64]) -> f64 {
        self.intercept + self.weights.iter().zip(x).map(|(w, x)| w * x).sum::<f64>()
    }

    /// Probability of the positive class (home win).
    pub fn probability(&self, x: &[f64]) -> f64 {
        sigmoid(self.decision(x))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FitParams {
    pub max_iters: usize,
    pub learning_rate: f64,
    /// Inverse regularization strength; the penalty is `||w||² / (2·C·n)`
    /// per sample, as in the usual `C` parameterisation.
    pub c: f64,
}

impl Default for FitParams {
    fn default() -> Self {
        FitParams {
            max_iters: 1000,
            learning_rate: 0.5,
            c: 1.0,
        }
    }
}

/// Fit on already-standardized rows. `None` when there are no samples,
/// only one class, or the descent diverges.
pub fn fit_logistic<R: AsRef<[f64]>>(
    feature_names: &[&str],
    x: &[R],
    y: &[f64],
    params: FitParams,
) -> Option<LogisticModel> {
    if x.is_empty() || x.len() != y.len() {
        return None;
    }
    let positives = y.iter().filter(|v| **v > 0.5).count();
    if positives == 0 || positives == y.len() {
        return None;
    }

    let width = feature_names.len();
    let n = x.len() as f64;
    let l2 = if params.c > 0.0 { 1.0 / (params.c * n) } else { 0.0 };
    let mut w = vec![0.0f64; width];
    let mut b = 0.0f64;

    for i in 0..params.max_iters.max(1) {
        let lr = params.learning_rate / (1.0 + 0.001 * i as f64);
        let mut grad_w = vec![0.0f64; width];
        let mut grad_b = 0.0;
        for (row, target) in x.iter().zip(y) {
            let row = row.as_ref();
            let z = b + w.iter().zip(row).map(|(w, x)| w * x).sum::<f64>();
            let err = sigmoid(z) - target;
            for (g, xi) in grad_w.iter_mut().zip(row) {
                *g += err * xi;
            }
            grad_b += err;
        }
        for (wj, g) in w.iter_mut().zip(&grad_w) {
            *wj -= lr * (g / n + l2 * *wj);
        }
        b -= lr * grad_b / n;
        if !b.is_finite() || w.iter().any(|v| !v.is_finite()) {
            return None;
        }
    }

    Some(LogisticModel {
        feature_names: feature_names.iter().map(|s| s.to_string()).collect(),
        weights: w,
        intercept: b,
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub true_negative: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    pub true_positive: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvalMetrics {
    pub samples: usize,
    pub accuracy: f64,
    /// Undefined when only one class is present.
    pub auc: Option<f64>,
    pub logloss: f64,
    pub brier: f64,
    pub confusion: ConfusionMatrix,
}

/// Score predicted probabilities against 0/1 labels (threshold 0.5).
pub fn evaluate(probs: &[f64], y: &[f64]) -> EvalMetrics {
    let n = probs.len().max(1) as f64;
    let mut confusion = ConfusionMatrix::default();
    let mut ll = 0.0;
    let mut br = 0.0;
    for (p, t) in probs.iter().zip(y) {
        let predicted = *p >= 0.5;
        let actual = *t > 0.5;
        match (actual, predicted) {
            (false, false) => confusion.true_negative += 1,
            (false, true) => confusion.false_positive += 1,
            (true, false) => confusion.false_negative += 1,
            (true, true) => confusion.true_positive += 1,
        }
        ll += logloss(*p, *t);
        br += (p - t).powi(2);
    }
    EvalMetrics {
        samples: probs.len(),
        accuracy: (confusion.true_positive + confusion.true_negative) as f64 / n,
        auc: roc_auc(probs, y),
        logloss: ll / n,
        brier: br / n,
        confusion,
    }
}

/// Area under the ROC curve via the rank-sum statistic; tied scores share
/// their average rank.
pub fn roc_auc(probs: &[f64], y: &[f64]) -> Option<f64> {
    let positives = y.iter().filter(|t| **t > 0.5).count();
    let negatives = y.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..probs.len()).collect();
    order.sort_by(|a, b| probs[*a].total_cmp(&probs[*b]));

    let mut ranks = vec![0.0; probs.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && probs[order[j + 1]] == probs[order[i]] {
            j += 1;
        }
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = ranks
        .iter()
        .zip(y)
        .filter(|(_, t)| **t > 0.5)
        .map(|(r, _)| r)
        .sum();
    let p = positives as f64;
    Some((pos_rank_sum - p * (p + 1.0) / 2.0) / (p * negatives as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn scaler_centers_and_scales() {
        let rows = vec![vec![1.0, 5.0], vec![3.0, 5.0]];
        let s = StandardScaler::fit(&["a", "b"], &rows);
        assert_eq!(s.mean, vec![2.0, 5.0]);
        assert_eq!(s.scale, vec![1.0, 1.0]);
        assert_eq!(s.transform(&[3.0, 7.0]), vec![1.0, 2.0]);
    }

    #[test]
    fn zero_scale_is_treated_as_one() {
        let s = StandardScaler {
            feature_names: vec!["a".into()],
            mean: vec![1.0],
            scale: vec![0.0],
        };
        assert_eq!(s.transform(&[4.0]), vec![3.0]);
    }

    #[test]
    fn learns_a_separable_signal() {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..200 {
            let signal = (i as f64 - 100.0) / 50.0;
            let noise = ((i * 37) % 11) as f64 / 11.0 - 0.5;
            x.push(vec![signal, noise]);
            y.push(if signal > 0.0 { 1.0 } else { 0.0 });
        }
        let model = fit_logistic(&["signal", "noise"], &x, &y, FitParams::default()).unwrap();
        assert!(model.weights[0] > 1.0);
        assert!(model.weights[0].abs() > model.weights[1].abs() * 2.0);

        let probs: Vec<f64> = x.iter().map(|r| model.probability(r)).collect();
        let m = evaluate(&probs, &y);
        assert!(m.accuracy > 0.95);
        assert!(m.auc.unwrap() > 0.99);
        assert!(m.logloss < 0.4);
    }

    #[test]
    fn single_class_cannot_be_fit() {
        let x = vec![vec![1.0]; 10];
        let y = vec![1.0; 10];
        assert!(fit_logistic(&["a"], &x, &y, FitParams::default()).is_none());
    }

    #[test]
    fn auc_handles_ties_and_perfect_ranking() {
        assert_relative_eq!(roc_auc(&[0.1, 0.4, 0.35, 0.8], &[0.0, 0.0, 1.0, 1.0]).unwrap(), 0.75);
        assert_relative_eq!(roc_auc(&[0.5, 0.5], &[0.0, 1.0]).unwrap(), 0.5);
        assert_relative_eq!(roc_auc(&[0.2, 0.9], &[0.0, 1.0]).unwrap(), 1.0);
        assert_eq!(roc_auc(&[0.2, 0.9], &[1.0, 1.0]), None);
    }

    #[test]
    fn confusion_matrix_counts() {
        let m = evaluate(&[0.9, 0.2, 0.7, 0.4], &[1.0, 0.0, 0.0, 1.0]);
        assert_eq!(
            m.confusion,
            ConfusionMatrix {
                true_negative: 1,
                false_positive: 1,
                false_negative: 1,
                true_positive: 1,
            }
        );
        assert_relative_eq!(m.accuracy, 0.5);
    }
}
