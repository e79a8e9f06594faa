use gb_types::{
    validation_error, DataError, Frequency, FrequencyDatasets, GbResult, Split, SplitKind, TrainTest,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::downsample::downsample;
use crate::recordings::Recording;

/// How raw recordings become feature rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Covariates placed first in every feature row, in this order.
    pub covariates: Vec<String>,
    /// Seconds of downsampled signal appended after the covariates.
    pub window_seconds: f64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            covariates: vec!["age".to_string()],
            window_seconds: 1.0,
        }
    }
}

/// Builds train/test feature matrices for each downsampling frequency.
#[derive(Debug, Clone)]
pub struct DatasetBuilder {
    config: BuildConfig,
}

impl DatasetBuilder {
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Number of signal samples kept at `freq`.
    pub fn signal_len(&self, freq: Frequency) -> usize {
        (self.config.window_seconds * freq.as_f64()).round() as usize
    }

    pub fn feature_names(&self, freq: Frequency) -> Vec<String> {
        self.config
            .covariates
            .iter()
            .cloned()
            .chain((0..self.signal_len(freq)).map(|i| format!("signal_{i}")))
            .collect()
    }

    pub fn build(&self, recordings: &[Recording], freqs: &[Frequency]) -> GbResult<FrequencyDatasets> {
        if freqs.is_empty() {
            return Err(DataError::InsufficientData {
                message: "no downsampling frequencies given".to_string(),
            }
            .into());
        }
        if !(self.config.window_seconds > 0.0) {
            return Err(validation_error!(
                "window must be positive, got {}s",
                self.config.window_seconds
            ));
        }

        let unique: BTreeSet<Frequency> = freqs.iter().copied().collect();
        let mut datasets = FrequencyDatasets::new();
        for freq in unique {
            let dataset = self.build_at(recordings, freq)?;
            info!(
                "Built {} dataset: {} train / {} test rows, {} features",
                freq,
                dataset.train.n_samples(),
                dataset.test.n_samples(),
                dataset.feature_names.len()
            );
            datasets.insert(freq, dataset);
        }
        Ok(datasets)
    }

    fn build_at(&self, recordings: &[Recording], freq: Frequency) -> GbResult<TrainTest> {
        let names = self.feature_names(freq);
        if names.is_empty() {
            return Err(DataError::InsufficientData {
                message: format!("no features at {freq} with a {}s window", self.config.window_seconds),
            }
            .into());
        }
        let n_signal = self.signal_len(freq);

        let rows: Vec<(SplitKind, i64, Vec<f64>)> = recordings
            .par_iter()
            .map(|rec| {
                let row = self.feature_row(rec, freq, n_signal)?;
                Ok((rec.split, rec.label, row))
            })
            .collect::<GbResult<_>>()?;

        let mut train = (Vec::new(), Vec::new());
        let mut test = (Vec::new(), Vec::new());
        for (split, label, row) in rows {
            let side = match split {
                SplitKind::Train => &mut train,
                SplitKind::Test => &mut test,
            };
            side.0.push(row);
            side.1.push(label);
        }
        for (side, (rows, _)) in [("train", &train), ("test", &test)] {
            if rows.is_empty() {
                return Err(DataError::InsufficientData {
                    message: format!("no {side} recordings"),
                }
                .into());
            }
        }

        let width = names.len();
        TrainTest::new(
            names,
            Split::from_rows(train.0, train.1, width)?,
            Split::from_rows(test.0, test.1, width)?,
        )
    }

    fn feature_row(&self, rec: &Recording, freq: Frequency, n_signal: usize) -> GbResult<Vec<f64>> {
        let mut row = Vec::with_capacity(self.config.covariates.len() + n_signal);
        for name in &self.config.covariates {
            let value = rec.covariates.get(name).ok_or_else(|| DataError::InvalidFormat {
                message: format!("recording '{}' has no covariate '{}'", rec.id, name),
            })?;
            row.push(*value);
        }
        if n_signal > 0 {
            let pooled = downsample(&rec.signal, rec.sample_rate_hz, freq.as_f64())?;
            if pooled.len() < n_signal {
                return Err(DataError::InsufficientData {
                    message: format!(
                        "recording '{}' yields {} samples at {}, window needs {}",
                        rec.id,
                        pooled.len(),
                        freq,
                        n_signal
                    ),
                }
                .into());
            }
            row.extend_from_slice(&pooled[..n_signal]);
        }
        debug!("recording {} -> {} features at {}", rec.id, row.len(), freq);
        Ok(row)
    }
}

/// Build datasets for every frequency with the given configuration.
pub fn make_datasets(
    recordings: &[Recording],
    freqs: &[Frequency],
    config: BuildConfig,
) -> GbResult<FrequencyDatasets> {
    DatasetBuilder::new(config).build(recordings, freqs)
}
