//! Gradient-boosted decision trees for classification.

use gb_types::{GbResult, ModelError, ParameterSet, ParameterValue};
use ndarray::{Array2, ArrayView2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::loss::Deviance;
use crate::tree::{RegressionTree, TreeParams};

const MAX_PREALLOCATED_STAGES: usize = 4096;

/// Hyperparameters of [`GradientBoostingClassifier`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientBoostingParams {
    /// Number of boosting stages.
    pub n_estimators: usize,
    /// Shrinkage applied to every tree's contribution.
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Fraction of training rows drawn (without replacement) per stage.
    pub subsample: f64,
    /// Seed for row subsampling. `None` draws a fresh seed per fit.
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
            subsample: 1.0,
            random_state: None,
        }
    }
}

impl GradientBoostingParams {
    /// Names accepted by [`set_param`](Self::set_param).
    pub const NAMES: [&'static str; 7] = [
        "learning_rate",
        "max_depth",
        "min_samples_leaf",
        "min_samples_split",
        "n_estimators",
        "random_state",
        "subsample",
    ];

    /// Set a single hyperparameter by name.
    pub fn set_param(&mut self, name: &str, value: ParameterValue) -> GbResult<()> {
        match name {
            "n_estimators" => self.n_estimators = positive_int(name, value, 1)?,
            "max_depth" => self.max_depth = positive_int(name, value, 1)?,
            "min_samples_split" => self.min_samples_split = positive_int(name, value, 2)?,
            "min_samples_leaf" => self.min_samples_leaf = positive_int(name, value, 1)?,
            "random_state" => self.random_state = Some(positive_int(name, value, 0)? as u64),
            "learning_rate" => {
                let v = value.as_f64();
                if !(v > 0.0 && v.is_finite()) {
                    return Err(invalid(name, format!("must be a positive number, got {value}")));
                }
                self.learning_rate = v;
            }
            "subsample" => {
                let v = value.as_f64();
                if !(v > 0.0 && v <= 1.0) {
                    return Err(invalid(name, format!("must be in (0, 1], got {value}")));
                }
                self.subsample = v;
            }
            _ => {
                return Err(ModelError::UnknownParameter {
                    parameter: name.to_string(),
                }
                .into())
            }
        }
        Ok(())
    }

    /// Copy of these params with every entry of `overrides` applied.
    pub fn with_params(&self, overrides: &ParameterSet) -> GbResult<Self> {
        let mut params = self.clone();
        for (name, value) in overrides {
            params.set_param(name, *value)?;
        }
        Ok(params)
    }

    pub fn validate(&self) -> GbResult<()> {
        let checks = [
            ("n_estimators", self.n_estimators >= 1),
            ("max_depth", self.max_depth >= 1),
            ("min_samples_split", self.min_samples_split >= 2),
            ("min_samples_leaf", self.min_samples_leaf >= 1),
            ("learning_rate", self.learning_rate > 0.0 && self.learning_rate.is_finite()),
            ("subsample", self.subsample > 0.0 && self.subsample <= 1.0),
        ];
        for (name, ok) in checks {
            if !ok {
                return Err(invalid(name, "out of range".to_string()));
            }
        }
        Ok(())
    }

    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
        }
    }
}

fn invalid(name: &str, message: String) -> gb_types::GbError {
    ModelError::InvalidParameter {
        parameter: name.to_string(),
        message,
    }
    .into()
}

fn positive_int(name: &str, value: ParameterValue, min: i64) -> GbResult<usize> {
    match value.as_i64() {
        Some(v) if v >= min => Ok(v as usize),
        _ => Err(invalid(name, format!("must be an integer >= {min}, got {value}"))),
    }
}

/// State learned by a fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Fitted {
    classes: Vec<i64>,
    loss: Deviance,
    init: Vec<f64>,
    /// One entry per stage, each holding `loss.trees_per_stage()` trees.
    stages: Vec<Vec<RegressionTree>>,
    n_features: usize,
    train_deviance: Vec<f64>,
}

/// Gradient boosting classifier using deviance loss and least-squares trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    params: GradientBoostingParams,
    fitted: Option<Fitted>,
}

impl GradientBoostingClassifier {
    pub fn new(params: GradientBoostingParams) -> Self {
        Self {
            params,
            fitted: None,
        }
    }

    pub fn params(&self) -> &GradientBoostingParams {
        &self.params
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Fit the ensemble. Labels are arbitrary class ids; at least two are required.
    pub fn fit(&mut self, features: ArrayView2<f64>, labels: &[i64]) -> GbResult<()> {
        self.params.validate()?;
        if features.nrows() != labels.len() {
            return Err(gb_types::DataError::ShapeMismatch {
                expected: features.nrows(),
                actual: labels.len(),
            }
            .into());
        }
        if labels.is_empty() {
            return Err(ModelError::EmptyInput {
                message: "no training samples".to_string(),
            }
            .into());
        }
        if features.ncols() == 0 {
            return Err(ModelError::EmptyInput {
                message: "no feature columns".to_string(),
            }
            .into());
        }

        let mut classes = labels.to_vec();
        classes.sort_unstable();
        classes.dedup();
        if classes.len() < 2 {
            return Err(ModelError::TooFewClasses {
                n_classes: classes.len(),
            }
            .into());
        }
        let encoded: Vec<usize> = labels
            .iter()
            .map(|l| classes.binary_search(l).unwrap_or_default())
            .collect();

        let loss = Deviance::for_classes(classes.len());
        let n_samples = labels.len();
        let per_stage = loss.trees_per_stage();
        let init = loss.initial_scores(&encoded);
        let mut raw = Array2::from_shape_fn((n_samples, per_stage), |(_, k)| init[k]);

        let tree_params = self.params.tree_params();
        let n_inbag = ((self.params.subsample * n_samples as f64) as usize).max(1);
        let mut rng = match self.params.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        // n_estimators is user-supplied, so the preallocation is capped.
        let reserve = self.params.n_estimators.min(MAX_PREALLOCATED_STAGES);
        let mut stages = Vec::with_capacity(reserve);
        let mut train_deviance = Vec::with_capacity(reserve);

        for _ in 0..self.params.n_estimators {
            let rows: Vec<usize> = if n_inbag < n_samples {
                let mut picked = rand::seq::index::sample(&mut rng, n_samples, n_inbag).into_vec();
                picked.sort_unstable();
                picked
            } else {
                (0..n_samples).collect()
            };

            let mut stage = Vec::with_capacity(per_stage);
            // Residuals for every column come from the scores before this stage.
            let residuals: Vec<Vec<f64>> = (0..per_stage)
                .map(|k| loss.residuals(&encoded, raw.view(), k))
                .collect();

            for (k, residual) in residuals.iter().enumerate() {
                let (mut tree, regions) =
                    RegressionTree::fit(features, residual, rows.clone(), &tree_params);
                for region in &regions {
                    let value = loss.leaf_value(&region.rows, residual, &encoded, k);
                    tree.set_leaf_value(region.node, value);
                }
                for (i, row) in features.rows().into_iter().enumerate() {
                    raw[[i, k]] += self.params.learning_rate * tree.predict_row(row);
                }
                stage.push(tree);
            }

            train_deviance.push(loss.deviance(&encoded, &raw));
            stages.push(stage);
        }

        debug!(
            "Fitted {} stages on {} samples x {} features ({} classes), final deviance {:.4}",
            stages.len(),
            n_samples,
            features.ncols(),
            classes.len(),
            train_deviance.last().copied().unwrap_or_default()
        );

        self.fitted = Some(Fitted {
            classes,
            loss,
            init,
            stages,
            n_features: features.ncols(),
            train_deviance,
        });
        Ok(())
    }

    fn fitted(&self) -> GbResult<&Fitted> {
        self.fitted.as_ref().ok_or_else(|| ModelError::NotFitted.into())
    }

    /// Raw additive scores, shape `(n_samples, trees_per_stage)`.
    pub fn decision_function(&self, features: ArrayView2<f64>) -> GbResult<Array2<f64>> {
        let fitted = self.fitted()?;
        if features.ncols() != fitted.n_features {
            return Err(ModelError::FeatureMismatch {
                expected: fitted.n_features,
                actual: features.ncols(),
            }
            .into());
        }
        let per_stage = fitted.loss.trees_per_stage();
        let mut raw = Array2::from_shape_fn((features.nrows(), per_stage), |(_, k)| fitted.init[k]);
        for (i, row) in features.rows().into_iter().enumerate() {
            for stage in &fitted.stages {
                for (k, tree) in stage.iter().enumerate() {
                    raw[[i, k]] += self.params.learning_rate * tree.predict_row(row);
                }
            }
        }
        Ok(raw)
    }

    /// Class probabilities, columns ordered like [`classes`](Self::classes).
    pub fn predict_proba(&self, features: ArrayView2<f64>) -> GbResult<Array2<f64>> {
        let fitted = self.fitted()?;
        let raw = self.decision_function(features)?;
        let n_classes = fitted.classes.len();
        let mut proba = Array2::zeros((raw.nrows(), n_classes));
        for (i, row) in raw.rows().into_iter().enumerate() {
            for (k, p) in fitted.loss.probabilities(row).into_iter().enumerate() {
                proba[[i, k]] = p;
            }
        }
        Ok(proba)
    }

    /// Most probable class per row; ties go to the smaller class id.
    pub fn predict(&self, features: ArrayView2<f64>) -> GbResult<Vec<i64>> {
        let fitted = self.fitted()?;
        let proba = self.predict_proba(features)?;
        Ok(proba
            .rows()
            .into_iter()
            .map(|row| {
                let mut best = 0;
                for (k, p) in row.iter().enumerate() {
                    if *p > row[best] {
                        best = k;
                    }
                }
                fitted.classes[best]
            })
            .collect())
    }

    pub fn classes(&self) -> GbResult<&[i64]> {
        Ok(&self.fitted()?.classes)
    }

    pub fn n_stages(&self) -> usize {
        self.fitted.as_ref().map_or(0, |f| f.stages.len())
    }

    /// Mean training deviance after each stage.
    pub fn train_deviance(&self) -> GbResult<&[f64]> {
        Ok(&self.fitted()?.train_deviance)
    }

    /// Mean of the per-tree normalized importances, normalized to sum to one.
    pub fn feature_importances(&self) -> GbResult<Vec<f64>> {
        let fitted = self.fitted()?;
        let mut total = vec![0.0; fitted.n_features];
        let mut n_trees = 0usize;
        for tree in fitted.stages.iter().flatten() {
            for (acc, v) in total.iter_mut().zip(tree.feature_importances()) {
                *acc += v;
            }
            n_trees += 1;
        }
        if n_trees > 0 {
            total.iter_mut().for_each(|v| *v /= n_trees as f64);
        }
        let sum: f64 = total.iter().sum();
        if sum > 0.0 {
            total.iter_mut().for_each(|v| *v /= sum);
        }
        Ok(total)
    }
}
