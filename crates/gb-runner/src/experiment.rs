//! The search-and-score loop over every (condition, frequency) cell.

use gb_data::{make_datasets, Recording, ThreeDatasets};
use gb_model::accuracy_score;
use gb_optimizer::{GridSearchCv, StratifiedKFold};
use gb_types::{CellReport, Condition, ExperimentResults, Frequency, GbResult, TrainTest};
use std::time::Instant;
use tracing::info;

use crate::config::RunConfig;

/// Build the frequency datasets, derive the three conditions, and grid-search
/// every cell. Conditions run in declaration order, frequencies ascending.
pub fn run_experiment(config: &RunConfig, recordings: &[Recording]) -> GbResult<ExperimentResults> {
    config.validate()?;
    info!(
        "Starting sweep over {} recordings at {:?}Hz, held-out feature '{}'",
        recordings.len(),
        config.frequencies,
        config.held_out_feature
    );

    let datasets = make_datasets(recordings, &config.frequencies(), config.build_config())?;
    let three = ThreeDatasets::new(datasets, config.held_out_feature.clone()).get_three_datasets()?;

    let mut results = ExperimentResults::new(config.held_out_feature.clone());
    for (condition, datasets) in &three {
        for (freq, data) in datasets {
            let report = search_cell(config, *condition, *freq, data)?;
            info!(
                "{} @ {}: test accuracy {:.4} (cv {:.4}) in {:.1}s",
                condition, freq, report.test_accuracy, report.best_cv_score, report.elapsed_seconds
            );
            results.record(report);
        }
    }

    results.mark_finished();
    info!(
        "Sweep {} finished {} cells in {:.1}s",
        results.id,
        results.reports.len(),
        results.duration_seconds().unwrap_or_default()
    );
    Ok(results)
}

/// Grid-search one dataset and score the refitted best estimator on its test split.
pub fn search_cell(
    config: &RunConfig,
    condition: Condition,
    freq: Frequency,
    data: &TrainTest,
) -> GbResult<CellReport> {
    let started = Instant::now();
    info!(
        "Searching {} @ {} ({} features, {} train rows)",
        condition,
        freq,
        data.feature_names.len(),
        data.train.n_samples()
    );

    let outcome = GridSearchCv::new(config.base_params.clone(), config.param_grid.clone())
        .with_cv(StratifiedKFold::new(config.cv_folds))
        .with_n_jobs(config.n_jobs)
        .fit(&data.train)?;

    let predictions = outcome.best_estimator.predict(data.test.features.view())?;
    let test_accuracy = accuracy_score(&data.test.labels, &predictions)?;

    Ok(CellReport {
        condition,
        frequency: freq,
        n_features: data.feature_names.len(),
        n_train: data.train.n_samples(),
        n_test: data.test.n_samples(),
        best_params: outcome.best_params,
        best_cv_score: outcome.best_score,
        test_accuracy,
        candidates: outcome.cv_results.len(),
        failed_fits: outcome.status.fits_failed,
        elapsed_seconds: started.elapsed().as_secs_f64(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gb_data::synthetic::{generate, SyntheticConfig};
    use gb_optimizer::ParameterGrid;

    fn small_config() -> RunConfig {
        RunConfig {
            frequencies: vec![4, 8],
            window_seconds: 1.0,
            cv_folds: 3,
            n_jobs: 2,
            param_grid: ParameterGrid::new()
                .add_ints("n_estimators", &[5, 10])
                .add_ints("max_depth", &[2]),
            ..Default::default()
        }
    }

    fn cohort() -> Vec<Recording> {
        generate(&SyntheticConfig {
            n_recordings: 48,
            sample_rate_hz: 16.0,
            duration_seconds: 1.0,
            ..Default::default()
        })
    }

    #[test]
    fn fills_every_condition_and_frequency() {
        let results = run_experiment(&small_config(), &cohort()).unwrap();
        assert_eq!(results.reports.len(), 6);
        for condition in Condition::ALL {
            let table = results.table(condition).unwrap();
            let freqs: Vec<u32> = table.iter().map(|(f, _)| f.hz()).collect();
            assert_eq!(freqs, vec![4, 8]);
            assert!(table.iter().all(|(_, acc)| (0.0..=1.0).contains(&acc)));
        }
        assert!(results.finished_at.is_some());
    }

    #[test]
    fn held_out_only_cells_use_one_feature() {
        let results = run_experiment(&small_config(), &cohort()).unwrap();
        let only: Vec<_> = results
            .reports
            .iter()
            .filter(|r| r.condition == Condition::HeldOutOnly)
            .collect();
        assert!(only.iter().all(|r| r.n_features == 1));
        let all_but = results
            .reports
            .iter()
            .find(|r| r.condition == Condition::AllButHeldOut && r.frequency == Frequency(8))
            .unwrap();
        assert_eq!(all_but.n_features, 8);
        assert_eq!(all_but.candidates, 2);
    }

    #[test]
    fn invalid_config_stops_before_building() {
        let config = RunConfig {
            cv_folds: 1,
            ..small_config()
        };
        assert!(run_experiment(&config, &cohort()).is_err());
    }
}
