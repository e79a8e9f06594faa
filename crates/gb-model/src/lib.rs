//! # gb-model
//!
//! Gradient-boosted decision trees for classification.
//!
//! Provides least-squares regression trees, binomial and multinomial deviance
//! losses, the boosting classifier built on them, and accuracy scoring.

mod boosting;
mod loss;
mod metrics;
mod tree;

pub use boosting::{GradientBoostingClassifier, GradientBoostingParams};
pub use loss::Deviance;
pub use metrics::accuracy_score;
pub use tree::{Node, RegressionTree, TerminalRegion, TreeParams};
