//! Feature matrices, train/test splits and the frequency-indexed dataset map.

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::errors::{DataError, GbResult};

/// Target sampling frequency in Hz used when downsampling raw signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Frequency(pub u32);

impl Frequency {
    pub fn hz(&self) -> u32 {
        self.0
    }

    pub fn as_f64(&self) -> f64 {
        f64::from(self.0)
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Hz", self.0)
    }
}

impl From<u32> for Frequency {
    fn from(hz: u32) -> Self {
        Self(hz)
    }
}

/// Which side of the train/test partition a recording belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitKind {
    Train,
    Test,
}

impl std::str::FromStr for SplitKind {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "train" => Ok(Self::Train),
            "test" => Ok(Self::Test),
            other => Err(DataError::InvalidFormat {
                message: format!("unknown split '{other}', expected 'train' or 'test'"),
            }),
        }
    }
}

/// A feature matrix with one class label per row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Split {
    pub features: Array2<f64>,
    pub labels: Vec<i64>,
}

impl Split {
    pub fn new(features: Array2<f64>, labels: Vec<i64>) -> GbResult<Self> {
        if features.nrows() != labels.len() {
            return Err(DataError::ShapeMismatch {
                expected: features.nrows(),
                actual: labels.len(),
            }
            .into());
        }
        Ok(Self { features, labels })
    }

    /// Build a split from row vectors. Every row must have `n_features` values.
    pub fn from_rows(rows: Vec<Vec<f64>>, labels: Vec<i64>, n_features: usize) -> GbResult<Self> {
        let n_rows = rows.len();
        let mut flat = Vec::with_capacity(n_rows * n_features);
        for row in rows {
            if row.len() != n_features {
                return Err(DataError::ShapeMismatch {
                    expected: n_features,
                    actual: row.len(),
                }
                .into());
            }
            flat.extend(row);
        }
        let features = Array2::from_shape_vec((n_rows, n_features), flat).map_err(|e| {
            DataError::InvalidFormat {
                message: format!("cannot shape feature matrix: {e}"),
            }
        })?;
        Self::new(features, labels)
    }

    pub fn n_samples(&self) -> usize {
        self.labels.len()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Keep only the given columns, in the given order.
    pub fn select_columns(&self, columns: &[usize]) -> GbResult<Self> {
        if let Some(&bad) = columns.iter().find(|&&c| c >= self.n_features()) {
            return Err(DataError::ShapeMismatch {
                expected: self.n_features(),
                actual: bad + 1,
            }
            .into());
        }
        Ok(Self {
            features: self.features.select(Axis(1), columns),
            labels: self.labels.clone(),
        })
    }

    /// Keep only the given rows. Indices must be in bounds.
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        Self {
            features: self.features.select(Axis(0), rows),
            labels: rows.iter().map(|&r| self.labels[r]).collect(),
        }
    }
}

/// Train and test splits sharing the same named feature columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainTest {
    pub feature_names: Vec<String>,
    pub train: Split,
    pub test: Split,
}

impl TrainTest {
    pub fn new(feature_names: Vec<String>, train: Split, test: Split) -> GbResult<Self> {
        for split in [&train, &test] {
            if split.n_features() != feature_names.len() {
                return Err(DataError::ShapeMismatch {
                    expected: feature_names.len(),
                    actual: split.n_features(),
                }
                .into());
            }
        }
        Ok(Self {
            feature_names,
            train,
            test,
        })
    }

    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.feature_names.iter().position(|n| n == name)
    }

    /// Project both splits onto a subset of columns.
    pub fn select_features(&self, columns: &[usize]) -> GbResult<Self> {
        let train = self.train.select_columns(columns)?;
        let test = self.test.select_columns(columns)?;
        let feature_names = columns
            .iter()
            .map(|&c| self.feature_names[c].clone())
            .collect();
        Ok(Self {
            feature_names,
            train,
            test,
        })
    }
}

/// Datasets indexed by downsampling frequency, iterated in ascending order.
pub type FrequencyDatasets = BTreeMap<Frequency, TrainTest>;

/// The three feature conditions each frequency is evaluated under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Every feature.
    AllFeatures,
    /// Every feature except the held-out one.
    AllButHeldOut,
    /// Only the held-out feature.
    HeldOutOnly,
}

impl Condition {
    pub const ALL: [Condition; 3] = [
        Condition::AllFeatures,
        Condition::AllButHeldOut,
        Condition::HeldOutOnly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AllFeatures => "all_features",
            Self::AllButHeldOut => "all_but_held_out",
            Self::HeldOutOnly => "held_out_only",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
