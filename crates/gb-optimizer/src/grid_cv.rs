//! Exhaustive grid search with cross-validation.

use gb_model::{accuracy_score, GradientBoostingClassifier, GradientBoostingParams};
use gb_types::{format_params, GbResult, ParameterSet, SearchError, Split};
use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::cv::{Fold, StratifiedKFold};
use crate::search::{GridSearch, ParameterGrid};
use crate::trial::{SearchStatus, TrialResult};

/// Grid search over [`GradientBoostingParams`] scored by mean fold accuracy.
#[derive(Debug, Clone)]
pub struct GridSearchCv {
    base: GradientBoostingParams,
    grid: ParameterGrid,
    cv: StratifiedKFold,
    /// `-1` uses every core, `n > 0` a dedicated pool of `n` threads,
    /// `n < -1` all but `|n| - 1` cores.
    n_jobs: i32,
}

/// What a finished search hands back.
#[derive(Debug, Clone)]
pub struct GridSearchOutcome {
    /// The best candidate refitted on the full training split.
    pub best_estimator: GradientBoostingClassifier,
    pub best_params: ParameterSet,
    pub best_score: f64,
    pub best_index: usize,
    /// One entry per candidate, in grid order.
    pub cv_results: Vec<TrialResult>,
    pub status: SearchStatus,
}

struct FitOutcome {
    candidate: usize,
    fold: usize,
    score: f64,
    seconds: f64,
}

impl GridSearchCv {
    pub fn new(base: GradientBoostingParams, grid: ParameterGrid) -> Self {
        Self {
            base,
            grid,
            cv: StratifiedKFold::default(),
            n_jobs: -1,
        }
    }

    pub fn with_cv(mut self, cv: StratifiedKFold) -> Self {
        self.cv = cv;
        self
    }

    pub fn with_n_jobs(mut self, n_jobs: i32) -> Self {
        self.n_jobs = n_jobs;
        self
    }

    pub fn fit(&self, train: &Split) -> GbResult<GridSearchOutcome> {
        let mut search = GridSearch::new(&self.grid)?;
        let candidates = search.suggest(search.len());
        // Reject unknown names or bad values before spending any fits.
        let resolved: Vec<GradientBoostingParams> = candidates
            .iter()
            .map(|c| self.base.with_params(c))
            .collect::<GbResult<_>>()?;

        let folds = self.cv.split(&train.labels)?;
        let mut status = SearchStatus::new(candidates.len(), folds.len());
        info!(
            "Fitting {} folds for each of {} candidates, totalling {} fits",
            folds.len(),
            candidates.len(),
            status.total_fits()
        );
        status.mark_running();

        let fold_splits: Vec<(Split, Split)> = folds
            .iter()
            .map(|Fold { train: tr, test: te }| (train.select_rows(tr), train.select_rows(te)))
            .collect();
        let tasks: Vec<(usize, usize)> = (0..candidates.len())
            .flat_map(|c| (0..folds.len()).map(move |f| (c, f)))
            .collect();

        let evaluate = || -> Vec<FitOutcome> {
            tasks
                .par_iter()
                .map(|&(candidate, fold)| {
                    let (fit_split, val_split) = &fold_splits[fold];
                    evaluate_fit(&resolved[candidate], fit_split, val_split, candidate, fold)
                })
                .collect()
        };
        let outcomes = match resolve_threads(self.n_jobs)? {
            Some(threads) => rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| SearchError::Pool {
                    message: e.to_string(),
                })?
                .install(evaluate),
            None => evaluate(),
        };

        let mut fold_scores = vec![vec![f64::NAN; folds.len()]; candidates.len()];
        let mut fit_seconds = vec![0.0; candidates.len()];
        for outcome in &outcomes {
            fold_scores[outcome.candidate][outcome.fold] = outcome.score;
            fit_seconds[outcome.candidate] += outcome.seconds;
            status.record_fit(!outcome.score.is_nan());
        }

        let mut cv_results: Vec<TrialResult> = candidates
            .into_iter()
            .zip(fold_scores)
            .zip(fit_seconds)
            .enumerate()
            .map(|(i, ((params, scores), seconds))| TrialResult::new(i, params, scores, seconds))
            .collect();
        assign_ranks(&mut cv_results);

        for result in &cv_results {
            debug!(
                "[CV] candidate {} ({}) mean={:.4} std={:.4} rank={}",
                result.candidate,
                format_params(&result.parameters),
                result.mean_score,
                result.std_score,
                result.rank
            );
            status.update_best(result);
        }

        let best = match status.best_trial.clone() {
            Some(best) => best,
            None => {
                let err = SearchError::AllCandidatesFailed {
                    candidates: cv_results.len(),
                };
                status.mark_failed(err.to_string());
                return Err(err.into());
            }
        };

        let mut best_estimator = GradientBoostingClassifier::new(resolved[best.candidate].clone());
        best_estimator.fit(train.features.view(), &train.labels)?;
        status.mark_completed();

        info!(
            "Best candidate {} ({}) with mean CV accuracy {:.4}",
            best.candidate,
            format_params(&best.parameters),
            best.mean_score
        );

        Ok(GridSearchOutcome {
            best_estimator,
            best_params: best.parameters.clone(),
            best_score: best.mean_score,
            best_index: best.candidate,
            cv_results,
            status,
        })
    }
}

fn evaluate_fit(
    params: &GradientBoostingParams,
    fit_split: &Split,
    val_split: &Split,
    candidate: usize,
    fold: usize,
) -> FitOutcome {
    let started = Instant::now();
    let mut model = GradientBoostingClassifier::new(params.clone());
    let score = model
        .fit(fit_split.features.view(), &fit_split.labels)
        .and_then(|_| model.predict(val_split.features.view()))
        .and_then(|pred| accuracy_score(&val_split.labels, &pred));
    let score = match score {
        Ok(score) => score,
        Err(e) => {
            warn!("Fit failed for candidate {} on fold {}: {}", candidate, fold, e);
            f64::NAN
        }
    };
    FitOutcome {
        candidate,
        fold,
        score,
        seconds: started.elapsed().as_secs_f64(),
    }
}

/// Rank by mean score, highest first; ties share the lowest rank and failed
/// candidates rank last.
fn assign_ranks(results: &mut [TrialResult]) {
    let scores: Vec<f64> = results.iter().map(|r| r.mean_score).collect();
    for result in results.iter_mut() {
        result.rank = if result.failed() {
            scores.iter().filter(|s| !s.is_nan()).count() + 1
        } else {
            1 + scores
                .iter()
                .filter(|s| !s.is_nan() && **s > result.mean_score)
                .count()
        };
    }
}

fn resolve_threads(n_jobs: i32) -> GbResult<Option<usize>> {
    match n_jobs {
        -1 => Ok(None),
        0 => Err(SearchError::Pool {
            message: "n_jobs must not be zero".to_string(),
        }
        .into()),
        n if n > 0 => Ok(Some(n as usize)),
        n => {
            let cpus = std::thread::available_parallelism()
                .map(|c| c.get())
                .unwrap_or(1) as i64;
            Ok(Some((cpus + 1 + i64::from(n)).max(1) as usize))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// Two informative-ish classes split on column 0 with a noisy column 1.
    fn training_split() -> Split {
        let n = 60;
        let features = Array2::from_shape_fn((n, 2), |(i, j)| {
            if j == 0 {
                i as f64
            } else {
                ((i * 13) % 7) as f64
            }
        });
        let labels = (0..n).map(|i| if i < n / 2 { 0 } else { 1 }).collect();
        Split::new(features, labels).unwrap()
    }

    fn base() -> GradientBoostingParams {
        GradientBoostingParams {
            random_state: Some(0),
            ..Default::default()
        }
    }

    #[test]
    fn picks_the_best_candidate_and_refits() {
        let grid = ParameterGrid::new()
            .add_ints("n_estimators", &[1, 20])
            .add_ints("min_samples_leaf", &[1, 40]);
        let outcome = GridSearchCv::new(base(), grid)
            .with_cv(StratifiedKFold::new(3))
            .with_n_jobs(2)
            .fit(&training_split())
            .unwrap();

        assert_eq!(outcome.cv_results.len(), 4);
        assert_eq!(outcome.status.total_fits(), 12);
        assert_eq!(outcome.status.fits_completed, 12);
        assert!(outcome.best_estimator.is_fitted());
        let best = &outcome.cv_results[outcome.best_index];
        assert_eq!(best.rank, 1);
        assert_eq!(outcome.best_score, best.mean_score);
        assert!(outcome
            .cv_results
            .iter()
            .all(|r| r.mean_score <= outcome.best_score));
        // leaves of 40 rows cannot fit in a 40-row training fold
        assert_eq!(outcome.best_params["min_samples_leaf"].as_i64(), Some(1));
    }

    #[test]
    fn ties_go_to_the_earliest_candidate() {
        // min_samples_split does not matter when max_depth=1 and folds are large
        let grid = ParameterGrid::new().add_ints("min_samples_split", &[2, 3, 4]);
        let params = GradientBoostingParams {
            max_depth: 1,
            n_estimators: 5,
            ..base()
        };
        let outcome = GridSearchCv::new(params, grid)
            .with_cv(StratifiedKFold::new(3))
            .fit(&training_split())
            .unwrap();
        assert_eq!(outcome.best_index, 0);
        assert!(outcome.cv_results.iter().all(|r| r.rank == 1));
    }

    #[test]
    fn unknown_parameter_fails_before_fitting() {
        let grid = ParameterGrid::new().add_ints("gamma", &[1]);
        let err = GridSearchCv::new(base(), grid)
            .fit(&training_split())
            .unwrap_err();
        assert!(err.to_string().contains("Unknown parameter"));
    }

    #[test]
    fn single_class_training_folds_fail_every_candidate() {
        let mut split = training_split();
        // A lone class-1 row lands in one validation fold, leaving that
        // fold's training rows with a single class.
        split.labels = vec![0; 60];
        split.labels[59] = 1;
        let grid = ParameterGrid::new().add_ints("n_estimators", &[2, 4]);
        let err = GridSearchCv::new(base(), grid)
            .with_cv(StratifiedKFold::new(2))
            .fit(&split)
            .unwrap_err();
        assert!(err.to_string().contains("All 2 candidates failed"));
    }

    #[test]
    fn ranks_treat_failures_as_worst() {
        let mut results = vec![
            TrialResult::new(0, ParameterSet::new(), vec![0.5], 0.0),
            TrialResult::new(1, ParameterSet::new(), vec![f64::NAN], 0.0),
            TrialResult::new(2, ParameterSet::new(), vec![0.9], 0.0),
            TrialResult::new(3, ParameterSet::new(), vec![0.5], 0.0),
        ];
        assign_ranks(&mut results);
        let ranks: Vec<usize> = results.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![2, 4, 1, 2]);
    }

    #[test]
    fn n_jobs_resolution() {
        assert_eq!(resolve_threads(-1).unwrap(), None);
        assert_eq!(resolve_threads(3).unwrap(), Some(3));
        assert!(resolve_threads(0).is_err());
        assert!(resolve_threads(-1000).unwrap().unwrap() >= 1);
    }
}
