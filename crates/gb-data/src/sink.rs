use gb_types::{ExperimentResults, GbResult};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Default location of the results file, relative to the working directory.
pub const DEFAULT_RESULTS_PATH: &str = "results/gb_results.json";

/// Persists experiment score tables as JSON.
#[derive(Debug, Clone)]
pub struct ResultSink {
    path: PathBuf,
}

impl ResultSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the results, replacing any previous file atomically.
    pub fn write(&self, results: &ExperimentResults) -> GbResult<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        // The temp file is removed on drop if anything below fails.
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        {
            let mut out = std::io::BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut out, results)?;
            out.write_all(b"\n")?;
            out.flush()?;
        }
        tmp.persist(&self.path).map_err(|e| e.error)?;

        tracing::info!(
            "Wrote {} score cells to {}",
            results.reports.len(),
            self.path.display()
        );
        Ok(())
    }

    pub fn read(&self) -> GbResult<ExperimentResults> {
        read_results(&self.path)
    }
}

impl Default for ResultSink {
    fn default() -> Self {
        Self::new(DEFAULT_RESULTS_PATH)
    }
}

/// Load a results file written by [`ResultSink::write`].
pub fn read_results<P: AsRef<Path>>(path: P) -> GbResult<ExperimentResults> {
    let file = std::fs::File::open(path.as_ref())?;
    Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gb_types::{CellReport, Condition, Frequency, ParameterSet, ParameterValue};
    use tempfile::TempDir;

    fn results() -> ExperimentResults {
        let mut results = ExperimentResults::new("age");
        let mut best_params = ParameterSet::new();
        best_params.insert("max_depth".into(), ParameterValue::Int(5));
        results.record(CellReport {
            condition: Condition::HeldOutOnly,
            frequency: Frequency(8),
            n_features: 1,
            n_train: 150,
            n_test: 50,
            best_params,
            best_cv_score: 0.71,
            test_accuracy: 0.68,
            candidates: 432,
            failed_fits: 0,
            elapsed_seconds: 3.5,
        });
        results.mark_finished();
        results
    }

    #[test]
    fn write_creates_directories_and_reads_back() {
        let dir = TempDir::new().unwrap();
        let sink = ResultSink::new(dir.path().join("results/nested/gb_results.json"));
        let written = results();
        sink.write(&written).unwrap();
        assert_eq!(sink.read().unwrap(), written);
        let entries = std::fs::read_dir(dir.path().join("results/nested")).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn failed_write_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        // A directory at the target path makes the final rename fail.
        let target = dir.path().join("gb_results.json");
        std::fs::create_dir(&target).unwrap();
        let sink = ResultSink::new(&target);
        assert!(sink.write(&results()).is_err());
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("gb_results.json")]);
    }

    #[test]
    fn write_replaces_previous_results() {
        let dir = TempDir::new().unwrap();
        let sink = ResultSink::new(dir.path().join("gb_results.json"));
        sink.write(&ExperimentResults::new("age")).unwrap();
        let second = results();
        sink.write(&second).unwrap();
        let back = read_results(sink.path()).unwrap();
        assert_eq!(back.accuracy(Condition::HeldOutOnly, Frequency(8)), Some(0.68));
    }

    #[test]
    fn reading_a_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        assert!(read_results(dir.path().join("absent.json")).is_err());
    }

    #[test]
    fn default_path() {
        assert_eq!(ResultSink::default().path(), Path::new(DEFAULT_RESULTS_PATH));
    }
}
