//! Run configuration: JSON file, environment overrides, validation.

use gb_data::{BuildConfig, DEFAULT_RESULTS_PATH};
use gb_model::GradientBoostingParams;
use gb_optimizer::ParameterGrid;
use gb_types::{config_error, Frequency, GbResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_RECORDINGS: &str = "GB_SWEEP_RECORDINGS";
pub const ENV_OUTPUT: &str = "GB_SWEEP_OUTPUT";
pub const ENV_N_JOBS: &str = "GB_SWEEP_N_JOBS";

/// Everything one sweep needs. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Downsampling frequencies in Hz.
    pub frequencies: Vec<u32>,
    /// Feature removed for the all-but-one condition and kept alone for the
    /// single-feature condition.
    pub held_out_feature: String,
    pub covariates: Vec<String>,
    pub window_seconds: f64,
    pub cv_folds: usize,
    pub n_jobs: i32,
    pub param_grid: ParameterGrid,
    pub base_params: GradientBoostingParams,
    pub recordings: Option<PathBuf>,
    pub output: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            frequencies: vec![8, 30, 480],
            held_out_feature: "age".to_string(),
            covariates: vec!["age".to_string()],
            window_seconds: 1.0,
            cv_folds: 5,
            n_jobs: -1,
            param_grid: ParameterGrid::gradient_boosting_default(),
            base_params: GradientBoostingParams::default(),
            recordings: None,
            output: PathBuf::from(DEFAULT_RESULTS_PATH),
        }
    }
}

impl RunConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> GbResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| config_error!("cannot read {}: {}", path.display(), e))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| config_error!("invalid config {}: {}", path.display(), e))?;
        tracing::info!("Loaded run configuration from {}", path.display());
        Ok(config)
    }

    /// Apply `GB_SWEEP_*` overrides from the process environment.
    pub fn apply_env(self) -> GbResult<Self> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    pub fn apply_env_from<F>(mut self, lookup: F) -> GbResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_RECORDINGS) {
            self.recordings = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup(ENV_OUTPUT) {
            self.output = PathBuf::from(path);
        }
        if let Some(raw) = lookup(ENV_N_JOBS) {
            self.n_jobs = raw
                .trim()
                .parse()
                .map_err(|e| config_error!("{} must be an integer, got '{}': {}", ENV_N_JOBS, raw, e))?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> GbResult<()> {
        if self.frequencies.is_empty() {
            return Err(config_error!("at least one frequency is required"));
        }
        if self.frequencies.contains(&0) {
            return Err(config_error!("frequencies must be positive"));
        }
        if !(self.window_seconds > 0.0 && self.window_seconds.is_finite()) {
            return Err(config_error!("window_seconds must be positive, got {}", self.window_seconds));
        }
        if self.cv_folds < 2 {
            return Err(config_error!("cv_folds must be at least 2, got {}", self.cv_folds));
        }
        if self.n_jobs == 0 {
            return Err(config_error!("n_jobs must be -1 or non-zero"));
        }
        if self.held_out_feature.trim().is_empty() {
            return Err(config_error!("held_out_feature must be set"));
        }
        self.param_grid.validate()?;
        self.base_params.validate()?;
        Ok(())
    }

    pub fn frequencies(&self) -> Vec<Frequency> {
        self.frequencies.iter().copied().map(Frequency).collect()
    }

    pub fn build_config(&self) -> BuildConfig {
        BuildConfig {
            covariates: self.covariates.clone(),
            window_seconds: self.window_seconds,
        }
    }
}
