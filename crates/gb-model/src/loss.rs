//! Deviance losses for binary and multiclass boosting.
//!
//! Raw scores are stored as an `(n_samples, n_trees_per_stage)` matrix. The
//! binomial loss keeps a single log-odds column for the second class; the
//! multinomial loss keeps one column per class.

use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

const DENOMINATOR_FLOOR: f64 = 1e-150;
const PRIOR_EPS: f64 = 1e-15;

/// Which deviance to minimize, chosen from the number of classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Deviance {
    Binomial,
    Multinomial { n_classes: usize },
}

impl Deviance {
    pub fn for_classes(n_classes: usize) -> Self {
        if n_classes <= 2 {
            Self::Binomial
        } else {
            Self::Multinomial { n_classes }
        }
    }

    pub fn trees_per_stage(&self) -> usize {
        match self {
            Self::Binomial => 1,
            Self::Multinomial { n_classes } => *n_classes,
        }
    }

    pub fn n_classes(&self) -> usize {
        match self {
            Self::Binomial => 2,
            Self::Multinomial { n_classes } => *n_classes,
        }
    }

    /// Constant starting scores from the class priors of the encoded labels.
    pub fn initial_scores(&self, encoded: &[usize]) -> Vec<f64> {
        let n = encoded.len().max(1) as f64;
        let mut counts = vec![0usize; self.n_classes()];
        for &label in encoded {
            counts[label] += 1;
        }
        let priors: Vec<f64> = counts
            .iter()
            .map(|&c| (c as f64 / n).clamp(PRIOR_EPS, 1.0 - PRIOR_EPS))
            .collect();
        match self {
            Self::Binomial => vec![(priors[1] / (1.0 - priors[1])).ln()],
            Self::Multinomial { .. } => priors.iter().map(|p| p.ln()).collect(),
        }
    }

    /// Negative gradient for column `k` of the raw scores.
    pub fn residuals(&self, encoded: &[usize], raw: ArrayView2<f64>, k: usize) -> Vec<f64> {
        encoded
            .iter()
            .enumerate()
            .map(|(i, &label)| {
                let row = raw.row(i);
                match self {
                    Self::Binomial => indicator(label == 1) - sigmoid(row[0]),
                    Self::Multinomial { .. } => indicator(label == k) - softmax_at(row, k),
                }
            })
            .collect()
    }

    /// Newton step for a terminal region given the residuals of its rows.
    pub fn leaf_value(&self, rows: &[usize], residuals: &[f64], encoded: &[usize], k: usize) -> f64 {
        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for &i in rows {
            let r = residuals[i];
            let y = match self {
                Self::Binomial => indicator(encoded[i] == 1),
                Self::Multinomial { .. } => indicator(encoded[i] == k),
            };
            numerator += r;
            denominator += (y - r) * (1.0 - y + r);
        }
        if let Self::Multinomial { n_classes } = self {
            let k = *n_classes as f64;
            numerator *= (k - 1.0) / k;
        }
        if denominator.abs() < DENOMINATOR_FLOOR {
            0.0
        } else {
            numerator / denominator
        }
    }

    /// Class probabilities for one row of raw scores.
    pub fn probabilities(&self, raw: ArrayView1<f64>) -> Vec<f64> {
        match self {
            Self::Binomial => {
                let p = sigmoid(raw[0]);
                vec![1.0 - p, p]
            }
            Self::Multinomial { n_classes } => (0..*n_classes).map(|k| softmax_at(raw, k)).collect(),
        }
    }

    /// Mean deviance of the raw scores against the encoded labels.
    pub fn deviance(&self, encoded: &[usize], raw: &Array2<f64>) -> f64 {
        if encoded.is_empty() {
            return 0.0;
        }
        let total: f64 = encoded
            .iter()
            .enumerate()
            .map(|(i, &label)| {
                let p = self.probabilities(raw.row(i))[label].max(PRIOR_EPS);
                -2.0 * p.ln()
            })
            .sum();
        total / encoded.len() as f64
    }
}

fn indicator(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

pub(crate) fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

fn softmax_at(row: ArrayView1<f64>, k: usize) -> f64 {
    let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let denom: f64 = row.iter().map(|v| (v - max).exp()).sum();
    (row[k] - max).exp() / denom
}
