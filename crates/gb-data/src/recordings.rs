use gb_types::{DataError, GbResult, SplitKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

/// One subject's raw signal plus static covariates and class label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub id: String,
    pub split: SplitKind,
    pub label: i64,
    #[serde(default)]
    pub covariates: BTreeMap<String, f64>,
    pub sample_rate_hz: f64,
    pub signal: Vec<f64>,
}

impl Recording {
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate_hz > 0.0 {
            self.signal.len() as f64 / self.sample_rate_hz
        } else {
            0.0
        }
    }
}

/// Columns every CSV recordings file must carry before covariates.
const CSV_FIXED_COLUMNS: [&str; 4] = ["id", "split", "label", "sample_rate_hz"];
const SIGNAL_PREFIX: &str = "signal_";

/// Load recordings, picking the format from the file extension
/// (`.jsonl`/`.ndjson` or `.csv`).
pub fn load_recordings<P: AsRef<Path>>(path: P) -> GbResult<Vec<Recording>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(DataError::SourceNotFound(path.display().to_string()).into());
    }
    tracing::info!("Loading recordings from: {}", path.display());

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let recordings = match ext.as_str() {
        "jsonl" | "ndjson" => load_jsonl(path)?,
        "csv" => load_csv(path)?,
        other => {
            return Err(DataError::InvalidFormat {
                message: format!("unsupported recordings extension '{other}'"),
            }
            .into())
        }
    };

    if recordings.is_empty() {
        return Err(DataError::InsufficientData {
            message: format!("no recordings in {}", path.display()),
        }
        .into());
    }
    tracing::info!("Loaded {} recordings from {}", recordings.len(), path.display());
    Ok(recordings)
}

fn load_jsonl(path: &Path) -> GbResult<Vec<Recording>> {
    let file = std::fs::File::open(path)?;
    let mut recordings = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let recording: Recording =
            serde_json::from_str(&line).map_err(|e| DataError::ParseError {
                line: idx + 1,
                message: e.to_string(),
            })?;
        recordings.push(recording);
    }
    Ok(recordings)
}

fn load_csv(path: &Path) -> GbResult<Vec<Recording>> {
    use csv::ReaderBuilder;

    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| DataError::LoadingFailed {
            message: format!("Failed to open CSV file {}: {}", path.display(), e),
        })?;
    let headers = rdr
        .headers()
        .map_err(|e| DataError::LoadingFailed {
            message: format!("Failed to read CSV headers: {}", e),
        })?
        .clone();
    tracing::debug!("CSV headers: {:?}", headers);

    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| DataError::InvalidFormat {
                message: format!("missing required column '{name}'"),
            })
    };
    let [id_col, split_col, label_col, rate_col] = [
        column(CSV_FIXED_COLUMNS[0])?,
        column(CSV_FIXED_COLUMNS[1])?,
        column(CSV_FIXED_COLUMNS[2])?,
        column(CSV_FIXED_COLUMNS[3])?,
    ];
    let signal_cols: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| h.starts_with(SIGNAL_PREFIX))
        .map(|(i, _)| i)
        .collect();
    let covariate_cols: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !CSV_FIXED_COLUMNS.iter().any(|c| c == h) && !h.starts_with(SIGNAL_PREFIX))
        .map(|(i, h)| (i, h.to_string()))
        .collect();

    let mut recordings = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        // header is line 1
        let line = idx + 2;
        let record = result.map_err(|e| DataError::LoadingFailed {
            message: format!("Failed to read CSV record at line {}: {}", line, e),
        })?;
        let field = |col: usize| record.get(col).unwrap_or_default();
        let number = |col: usize| -> Result<f64, DataError> {
            f64::from_str(field(col)).map_err(|e| DataError::ParseError {
                line,
                message: format!("column '{}': {}", &headers[col], e),
            })
        };

        let split = SplitKind::from_str(field(split_col)).map_err(|e| DataError::ParseError {
            line,
            message: e.to_string(),
        })?;
        let label = i64::from_str(field(label_col)).map_err(|e| DataError::ParseError {
            line,
            message: format!("column 'label': {e}"),
        })?;
        let mut covariates = BTreeMap::new();
        for (col, name) in &covariate_cols {
            covariates.insert(name.clone(), number(*col)?);
        }
        // Trailing empty cells pad shorter recordings; a gap before the last
        // filled cell is an error.
        let filled = signal_cols
            .iter()
            .rposition(|&col| !field(col).is_empty())
            .map_or(0, |last| last + 1);
        let mut signal = Vec::with_capacity(filled);
        for &col in &signal_cols[..filled] {
            if field(col).is_empty() {
                return Err(DataError::ParseError {
                    line,
                    message: format!("column '{}': empty cell inside the signal", &headers[col]),
                }
                .into());
            }
            signal.push(number(col)?);
        }

        recordings.push(Recording {
            id: field(id_col).to_string(),
            split,
            label,
            covariates,
            sample_rate_hz: number(rate_col)?,
            signal,
        });
    }
    Ok(recordings)
}

/// Write recordings as JSON lines.
pub fn save_recordings_jsonl<P: AsRef<Path>>(path: P, recordings: &[Recording]) -> GbResult<()> {
    use std::io::Write;

    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = std::io::BufWriter::new(std::fs::File::create(path)?);
    for recording in recordings {
        serde_json::to_writer(&mut out, recording)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_jsonl_and_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "recs.jsonl",
            r#"{"id":"a","split":"train","label":1,"covariates":{"age":61.0},"sample_rate_hz":4.0,"signal":[1,2,3,4]}

{"id":"b","split":"test","label":0,"sample_rate_hz":4.0,"signal":[0,0]}
"#,
        );
        let recs = load_recordings(&path).unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].covariates["age"], 61.0);
        assert_eq!(recs[0].duration_seconds(), 1.0);
        assert_eq!(recs[1].split, SplitKind::Test);
        assert!(recs[1].covariates.is_empty());
    }

    #[test]
    fn jsonl_errors_name_the_line() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "bad.jsonl", "{\"id\":\"a\"}\n");
        let err = load_recordings(&path).unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn loads_csv_with_covariates_and_ragged_signal() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "recs.csv",
            "id,split,label,sample_rate_hz,age,bmi,signal_0,signal_1,signal_2\n\
             s1,train,1,2,70,22.5,0.1,0.2,0.3\n\
             s2,TEST,0,2,40,30.0,1.0,2.0,\n",
        );
        let recs = load_recordings(&path).unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].signal, vec![0.1, 0.2, 0.3]);
        assert_eq!(recs[1].signal, vec![1.0, 2.0]);
        assert_eq!(recs[1].covariates["bmi"], 30.0);
        assert_eq!(recs[1].split, SplitKind::Test);
    }

    #[test]
    fn csv_gap_inside_signal_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "recs.csv",
            "id,split,label,sample_rate_hz,signal_0,signal_1,signal_2,signal_3\n\
             a,train,1,2,1.0,2.0,3.0,\n\
             b,train,0,2,1.0,,3.0,\n",
        );
        let err = load_recordings(&path).unwrap_err();
        assert!(err.to_string().contains("line 3"));
        assert!(err.to_string().contains("signal_1"));
    }

    #[test]
    fn csv_requires_fixed_columns() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "recs.csv", "id,label,signal_0\na,1,0.5\n");
        let err = load_recordings(&path).unwrap_err();
        assert!(err.to_string().contains("split"));
    }

    #[test]
    fn csv_parse_errors_name_the_line() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "recs.csv",
            "id,split,label,sample_rate_hz,signal_0\na,train,1,2,0.5\nb,train,x,2,0.5\n",
        );
        let err = load_recordings(&path).unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn missing_and_empty_files_fail() {
        let dir = TempDir::new().unwrap();
        assert!(load_recordings(dir.path().join("nope.jsonl")).is_err());
        let empty = write_file(&dir, "empty.jsonl", "\n");
        assert!(load_recordings(&empty).is_err());
        let other = write_file(&dir, "recs.parquet", "");
        assert!(load_recordings(&other).is_err());
    }

    #[test]
    fn jsonl_save_then_load() {
        let dir = TempDir::new().unwrap();
        let recs = vec![Recording {
            id: "x".into(),
            split: SplitKind::Train,
            label: 2,
            covariates: BTreeMap::from([("age".to_string(), 55.0)]),
            sample_rate_hz: 8.0,
            signal: vec![0.5; 8],
        }];
        let path = dir.path().join("nested/out.jsonl");
        save_recordings_jsonl(&path, &recs).unwrap();
        assert_eq!(load_recordings(&path).unwrap(), recs);
    }
}
