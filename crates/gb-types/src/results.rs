use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::dataset::{Condition, Frequency};
use crate::params::ParameterSet;

/// Unique experiment run identifier
pub type RunId = Uuid;

/// Best-model test accuracy per frequency for one condition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreTable(BTreeMap<Frequency, f64>);

impl ScoreTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, freq: Frequency, accuracy: f64) -> Option<f64> {
        self.0.insert(freq, accuracy)
    }

    pub fn get(&self, freq: Frequency) -> Option<f64> {
        self.0.get(&freq).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Frequency, f64)> + '_ {
        self.0.iter().map(|(f, a)| (*f, *a))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Everything the search learned about one (condition, frequency) cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellReport {
    pub condition: Condition,
    pub frequency: Frequency,
    pub n_features: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub best_params: ParameterSet,
    /// Mean cross-validated accuracy of the winning candidate.
    pub best_cv_score: f64,
    pub test_accuracy: f64,
    pub candidates: usize,
    pub failed_fits: usize,
    pub elapsed_seconds: f64,
}

/// Score tables for all three conditions plus run metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResults {
    pub id: RunId,
    pub scores: BTreeMap<Condition, ScoreTable>,
    pub reports: Vec<CellReport>,
    pub held_out_feature: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ExperimentResults {
    pub fn new(held_out_feature: impl Into<String>) -> Self {
        let scores = Condition::ALL
            .iter()
            .map(|c| (*c, ScoreTable::new()))
            .collect();
        Self {
            id: Uuid::new_v4(),
            scores,
            reports: Vec::new(),
            held_out_feature: held_out_feature.into(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Store the test accuracy of a cell and keep its report.
    pub fn record(&mut self, report: CellReport) {
        self.scores
            .entry(report.condition)
            .or_default()
            .insert(report.frequency, report.test_accuracy);
        self.reports
            .retain(|r| !(r.condition == report.condition && r.frequency == report.frequency));
        self.reports.push(report);
    }

    pub fn accuracy(&self, condition: Condition, freq: Frequency) -> Option<f64> {
        self.scores.get(&condition).and_then(|t| t.get(freq))
    }

    pub fn table(&self, condition: Condition) -> Option<&ScoreTable> {
        self.scores.get(&condition)
    }

    pub fn mark_finished(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds() as f64 / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(condition: Condition, hz: u32, acc: f64) -> CellReport {
        CellReport {
            condition,
            frequency: Frequency(hz),
            n_features: 3,
            n_train: 40,
            n_test: 10,
            best_params: ParameterSet::new(),
            best_cv_score: 0.7,
            test_accuracy: acc,
            candidates: 4,
            failed_fits: 0,
            elapsed_seconds: 0.1,
        }
    }

    #[test]
    fn new_results_have_three_empty_tables() {
        let results = ExperimentResults::new("age");
        assert_eq!(results.scores.len(), 3);
        assert!(results.scores.values().all(|t| t.is_empty()));
        assert!(results.finished_at.is_none());
    }

    #[test]
    fn record_keys_by_condition_and_frequency() {
        let mut results = ExperimentResults::new("age");
        results.record(report(Condition::AllFeatures, 30, 0.8));
        results.record(report(Condition::HeldOutOnly, 30, 0.6));
        results.record(report(Condition::AllFeatures, 8, 0.75));

        assert_eq!(results.accuracy(Condition::AllFeatures, Frequency(30)), Some(0.8));
        assert_eq!(results.accuracy(Condition::HeldOutOnly, Frequency(30)), Some(0.6));
        assert_eq!(results.accuracy(Condition::AllButHeldOut, Frequency(30)), None);

        let freqs: Vec<_> = results
            .table(Condition::AllFeatures)
            .unwrap()
            .iter()
            .map(|(f, _)| f.hz())
            .collect();
        assert_eq!(freqs, vec![8, 30]);
    }

    #[test]
    fn rerecording_a_cell_replaces_it() {
        let mut results = ExperimentResults::new("age");
        results.record(report(Condition::AllFeatures, 8, 0.5));
        results.record(report(Condition::AllFeatures, 8, 0.9));
        assert_eq!(results.reports.len(), 1);
        assert_eq!(results.accuracy(Condition::AllFeatures, Frequency(8)), Some(0.9));
    }

    #[test]
    fn score_tables_serialize_with_string_keys() {
        let mut results = ExperimentResults::new("age");
        results.record(report(Condition::AllButHeldOut, 480, 0.625));
        let json = serde_json::to_value(&results).unwrap();
        assert_eq!(json["scores"]["all_but_held_out"]["480"], 0.625);

        let back: ExperimentResults = serde_json::from_value(json).unwrap();
        assert_eq!(back, results);
    }
}
