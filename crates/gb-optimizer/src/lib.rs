//! # gb-optimizer
//!
//! Hyperparameter search for the gradient boosting classifier.
//!
//! Provides parameter grids, stratified k-fold splitting, parallel grid search
//! with cross-validation, and trial tracking.

mod cv;
mod grid_cv;
mod search;
mod trial;

pub use cv::{Fold, StratifiedKFold};
pub use grid_cv::{GridSearchCv, GridSearchOutcome};
pub use search::{GridSearch, ParameterGrid};
pub use trial::{SearchId, SearchState, SearchStatus, TrialResult};
