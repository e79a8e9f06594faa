// gbsweep runner
// Wires dataset construction, partitioning, grid search and result storage.

pub mod config;
pub mod experiment;

pub use config::RunConfig;
pub use experiment::{run_experiment, search_cell};
