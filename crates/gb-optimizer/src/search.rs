//! Parameter grids and exhaustive candidate enumeration.

use gb_types::{GbResult, ParameterSet, ParameterValue, SearchError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Discrete values to try for each named hyperparameter.
///
/// Names are kept sorted so candidate order does not depend on insertion
/// order: the first name varies slowest and the last name fastest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterGrid {
    axes: BTreeMap<String, Vec<ParameterValue>>,
}

impl ParameterGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, name: impl Into<String>, values: Vec<ParameterValue>) -> Self {
        self.axes.insert(name.into(), values);
        self
    }

    pub fn add_ints(self, name: impl Into<String>, values: &[i64]) -> Self {
        self.add(name, values.iter().map(|v| ParameterValue::Int(*v)).collect())
    }

    pub fn add_floats(self, name: impl Into<String>, values: &[f64]) -> Self {
        self.add(name, values.iter().map(|v| ParameterValue::Float(*v)).collect())
    }

    /// The grid searched for every (condition, frequency) cell.
    pub fn gradient_boosting_default() -> Self {
        Self::new()
            .add_ints("n_estimators", &[5, 10, 20, 40, 60, 80])
            .add_ints("max_depth", &[5, 8, 12, 16])
            .add_ints("min_samples_split", &[50, 200, 600, 1000, 1400, 2000])
            .add_ints("min_samples_leaf", &[30, 50, 70])
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.axes.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    /// Total number of candidates (`None` on overflow).
    pub fn grid_size(&self) -> Option<usize> {
        let mut total: usize = 1;
        for values in self.axes.values() {
            total = total.checked_mul(values.len())?;
        }
        Some(total)
    }

    pub fn validate(&self) -> GbResult<()> {
        if let Some((name, _)) = self.axes.iter().find(|(_, v)| v.is_empty()) {
            return Err(SearchError::InvalidGrid {
                message: format!("parameter '{name}' has no values"),
            }
            .into());
        }
        if self.grid_size().is_none() {
            return Err(SearchError::InvalidGrid {
                message: "grid size overflows".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Every combination, first name slowest. An empty grid yields one empty set.
    pub fn candidates(&self) -> Vec<ParameterSet> {
        let mut result: Vec<ParameterSet> = vec![ParameterSet::new()];
        for (name, values) in &self.axes {
            let mut next = Vec::with_capacity(result.len() * values.len());
            for existing in &result {
                for value in values {
                    let mut combo = existing.clone();
                    combo.insert(name.clone(), *value);
                    next.push(combo);
                }
            }
            result = next;
        }
        result
    }
}

/// Exhaustive grid search handing out candidates in batches.
#[derive(Debug, Clone)]
pub struct GridSearch {
    cursor: usize,
    combos: Vec<ParameterSet>,
}

impl GridSearch {
    pub fn new(grid: &ParameterGrid) -> GbResult<Self> {
        grid.validate()?;
        Ok(Self {
            cursor: 0,
            combos: grid.candidates(),
        })
    }

    /// Next batch of at most `count` candidates.
    pub fn suggest(&mut self, count: usize) -> Vec<ParameterSet> {
        let end = (self.cursor + count).min(self.combos.len());
        let batch = self.combos[self.cursor..end].to_vec();
        self.cursor = end;
        batch
    }

    pub fn remaining(&self) -> usize {
        self.combos.len() - self.cursor
    }

    pub fn len(&self) -> usize {
        self.combos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combos.is_empty()
    }
}
