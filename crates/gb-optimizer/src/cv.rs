//! Stratified k-fold splitting.

use gb_types::{GbResult, SearchError};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Row indices of one train/validation split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// K folds preserving class proportions, without shuffling.
///
/// Classes are ordered by first appearance. Fold class counts come from
/// dealing the label-sorted samples round-robin across folds, and each class's
/// samples are then assigned to folds in their original order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StratifiedKFold {
    pub n_splits: usize,
}

impl Default for StratifiedKFold {
    fn default() -> Self {
        Self { n_splits: 5 }
    }
}

impl StratifiedKFold {
    pub fn new(n_splits: usize) -> Self {
        Self { n_splits }
    }

    pub fn split(&self, labels: &[i64]) -> GbResult<Vec<Fold>> {
        let k = self.n_splits;
        if k < 2 {
            return Err(invalid(format!("n_splits must be at least 2, got {k}")));
        }
        if labels.len() < k {
            return Err(invalid(format!(
                "cannot have n_splits={k} greater than the number of samples ({})",
                labels.len()
            )));
        }

        let mut order: Vec<i64> = Vec::new();
        let encoded: Vec<usize> = labels
            .iter()
            .map(|l| match order.iter().position(|o| o == l) {
                Some(idx) => idx,
                None => {
                    order.push(*l);
                    order.len() - 1
                }
            })
            .collect();
        let n_classes = order.len();
        let mut counts = vec![0usize; n_classes];
        for &c in &encoded {
            counts[c] += 1;
        }

        if counts.iter().all(|&c| c < k) {
            return Err(invalid(format!(
                "n_splits={k} cannot be greater than the number of members in each class"
            )));
        }
        let least = counts.iter().copied().min().unwrap_or_default();
        if least < k {
            warn!(
                "The least populated class has only {} members, which is less than n_splits={}",
                least, k
            );
        }

        let mut sorted = encoded.clone();
        sorted.sort_unstable();
        // allocation[fold][class]
        let mut allocation = vec![vec![0usize; n_classes]; k];
        for (i, &class) in sorted.iter().enumerate() {
            allocation[i % k][class] += 1;
        }

        let mut test_fold = vec![0usize; labels.len()];
        for class in 0..n_classes {
            let folds_for_class =
                (0..k).flat_map(|fold| std::iter::repeat(fold).take(allocation[fold][class]));
            let members = encoded
                .iter()
                .enumerate()
                .filter(|&(_, &c)| c == class)
                .map(|(i, _)| i);
            for (row, fold) in members.zip(folds_for_class) {
                test_fold[row] = fold;
            }
        }

        Ok((0..k)
            .map(|fold| {
                let (test, train): (Vec<usize>, Vec<usize>) =
                    (0..labels.len()).partition(|&i| test_fold[i] == fold);
                Fold { train, test }
            })
            .collect())
    }
}

fn invalid(message: String) -> gb_types::GbError {
    SearchError::InvalidCv { message }.into()
}
