use gb_types::{Condition, DataError, FrequencyDatasets, GbResult};

/// Derives the three feature conditions from frequency-indexed datasets.
///
/// The held-out feature is looked up by name in each frequency's feature
/// columns, so its position may differ between frequencies.
#[derive(Debug, Clone)]
pub struct ThreeDatasets {
    datasets: FrequencyDatasets,
    held_out: String,
}

impl ThreeDatasets {
    pub fn new(datasets: FrequencyDatasets, held_out: impl Into<String>) -> Self {
        Self {
            datasets,
            held_out: held_out.into(),
        }
    }

    pub fn held_out(&self) -> &str {
        &self.held_out
    }

    /// All features, all but the held-out one, and the held-out one alone,
    /// in that order, each still indexed by frequency.
    pub fn get_three_datasets(&self) -> GbResult<[(Condition, FrequencyDatasets); 3]> {
        let mut all_but = FrequencyDatasets::new();
        let mut only = FrequencyDatasets::new();

        for (freq, dataset) in &self.datasets {
            let idx = dataset
                .feature_index(&self.held_out)
                .ok_or_else(|| DataError::FeatureNotFound {
                    feature: format!("{} (at {})", self.held_out, freq),
                })?;
            let n_features = dataset.feature_names.len();
            if n_features < 2 {
                return Err(DataError::InsufficientData {
                    message: format!(
                        "dataset at {} has only '{}', nothing remains without it",
                        freq, self.held_out
                    ),
                }
                .into());
            }
            let rest: Vec<usize> = (0..n_features).filter(|&c| c != idx).collect();
            all_but.insert(*freq, dataset.select_features(&rest)?);
            only.insert(*freq, dataset.select_features(&[idx])?);
        }

        Ok([
            (Condition::AllFeatures, self.datasets.clone()),
            (Condition::AllButHeldOut, all_but),
            (Condition::HeldOutOnly, only),
        ])
    }
}
