//! CLI entry point for the gradient boosting sweep.

use anyhow::{bail, Context};
use clap::Parser;
use gb_data::synthetic::{generate, SyntheticConfig};
use gb_data::{load_recordings, ResultSink};
use gb_runner::{run_experiment, RunConfig};
use gb_types::Condition;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "gb-sweep",
    about = "Grid-search a gradient boosting classifier per feature condition and frequency"
)]
struct Cli {
    /// JSON run configuration. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Recordings file (.jsonl, .ndjson or .csv).
    #[arg(long, conflicts_with = "synthetic")]
    recordings: Option<PathBuf>,

    /// Where to write the results JSON.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Generate this many synthetic recordings instead of loading a file.
    #[arg(long)]
    synthetic: Option<usize>,

    /// Seed for synthetic recordings.
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Parallel fits; -1 uses every core.
    #[arg(long, allow_hyphen_values = true)]
    n_jobs: Option<i32>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    }
    .apply_env()?;
    if let Some(path) = cli.recordings {
        config.recordings = Some(path);
    }
    if let Some(path) = cli.output {
        config.output = path;
    }
    if let Some(n_jobs) = cli.n_jobs {
        config.n_jobs = n_jobs;
    }

    let recordings = match (cli.synthetic, &config.recordings) {
        (Some(n), _) => {
            tracing::info!("Generating {} synthetic recordings (seed {})", n, cli.seed);
            generate(&SyntheticConfig {
                n_recordings: n,
                seed: cli.seed,
                ..Default::default()
            })
        }
        (None, Some(path)) => load_recordings(path)
            .with_context(|| format!("loading recordings from {}", path.display()))?,
        (None, None) => bail!("no recordings: pass --recordings, set GB_SWEEP_RECORDINGS, or use --synthetic N"),
    };

    let results = run_experiment(&config, &recordings)?;
    ResultSink::new(&config.output).write(&results)?;

    for condition in Condition::ALL {
        if let Some(table) = results.table(condition) {
            let cells: Vec<String> = table
                .iter()
                .map(|(freq, acc)| format!("{freq}={acc:.4}"))
                .collect();
            tracing::info!("{}: {}", condition, cells.join(" "));
        }
    }
    Ok(())
}
