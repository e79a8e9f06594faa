//! Per-candidate results and search run tracking.

use chrono::{DateTime, Utc};
use gb_types::ParameterSet;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique search run identifier.
pub type SearchId = Uuid;

/// Lifecycle state for a grid search run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchState {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Cross-validated result of one parameter candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    /// Position of the candidate in grid order.
    pub candidate: usize,
    pub parameters: ParameterSet,
    /// Validation accuracy per fold, NaN where the fit failed.
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
    pub std_score: f64,
    /// 1 is best; equal means share the lowest rank.
    pub rank: usize,
    pub mean_fit_seconds: f64,
}

impl TrialResult {
    pub fn new(candidate: usize, parameters: ParameterSet, fold_scores: Vec<f64>, fit_seconds: f64) -> Self {
        let n = fold_scores.len().max(1) as f64;
        let mean_score = fold_scores.iter().sum::<f64>() / n;
        let std_score = (fold_scores
            .iter()
            .map(|s| (s - mean_score).powi(2))
            .sum::<f64>()
            / n)
            .sqrt();
        Self {
            candidate,
            parameters,
            fold_scores,
            mean_score,
            std_score,
            rank: 0,
            mean_fit_seconds: fit_seconds / n,
        }
    }

    pub fn failed(&self) -> bool {
        self.mean_score.is_nan()
    }
}

/// Aggregate status of a grid search run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchStatus {
    pub id: SearchId,
    pub state: SearchState,
    pub candidates: usize,
    pub folds: usize,
    pub fits_completed: usize,
    pub fits_failed: usize,
    pub best_trial: Option<TrialResult>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl SearchStatus {
    pub fn new(candidates: usize, folds: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SearchState::Pending,
            candidates,
            folds,
            fits_completed: 0,
            fits_failed: 0,
            best_trial: None,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    pub fn total_fits(&self) -> usize {
        self.candidates * self.folds
    }

    pub fn mark_running(&mut self) {
        self.state = SearchState::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self) {
        self.state = SearchState::Completed;
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: String) {
        self.state = SearchState::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error);
    }

    /// Count one finished fit.
    pub fn record_fit(&mut self, succeeded: bool) {
        if succeeded {
            self.fits_completed += 1;
        } else {
            self.fits_failed += 1;
        }
    }

    /// Replace the best trial only on a strictly higher mean score, so the
    /// earliest candidate wins ties. Failed trials never become best.
    pub fn update_best(&mut self, result: &TrialResult) {
        if result.failed() {
            return;
        }
        let improves = match &self.best_trial {
            None => true,
            Some(current) => result.mean_score > current.mean_score,
        };
        if improves {
            self.best_trial = Some(result.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial(candidate: usize, scores: Vec<f64>) -> TrialResult {
        TrialResult::new(candidate, ParameterSet::new(), scores, 1.0)
    }

    #[test]
    fn trial_result_statistics() {
        let t = trial(0, vec![0.5, 1.0]);
        assert_eq!(t.mean_score, 0.75);
        assert!((t.std_score - 0.25).abs() < 1e-12);
        assert_eq!(t.mean_fit_seconds, 0.5);
        assert!(!t.failed());
        assert!(trial(1, vec![0.5, f64::NAN]).failed());
    }

    #[test]
    fn search_status_lifecycle() {
        let mut status = SearchStatus::new(4, 5);
        assert_eq!(status.state, SearchState::Pending);
        assert_eq!(status.total_fits(), 20);

        status.mark_running();
        assert_eq!(status.state, SearchState::Running);
        assert!(status.started_at.is_some());

        status.record_fit(true);
        status.record_fit(false);
        assert_eq!((status.fits_completed, status.fits_failed), (1, 1));

        status.mark_completed();
        assert_eq!(status.state, SearchState::Completed);
        assert!(status.finished_at.is_some());
    }

    #[test]
    fn best_trial_keeps_earliest_on_ties() {
        let mut status = SearchStatus::new(3, 2);
        status.update_best(&trial(0, vec![0.8, 0.8]));
        status.update_best(&trial(1, vec![0.8, 0.8]));
        assert_eq!(status.best_trial.as_ref().unwrap().candidate, 0);

        status.update_best(&trial(2, vec![0.9, 0.9]));
        assert_eq!(status.best_trial.as_ref().unwrap().candidate, 2);
    }

    #[test]
    fn failed_trials_never_win() {
        let mut status = SearchStatus::new(1, 2);
        status.update_best(&trial(0, vec![f64::NAN, 1.0]));
        assert!(status.best_trial.is_none());
    }

    #[test]
    fn search_failure() {
        let mut status = SearchStatus::new(1, 5);
        status.mark_failed("all candidates failed".into());
        assert_eq!(status.state, SearchState::Failed);
        assert_eq!(status.error.as_deref(), Some("all candidates failed"));
    }
}
