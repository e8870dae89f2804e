// src/report.rs

use crate::error::{ConvertError, ErrorKind, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

/// What one successful conversion produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FileStats {
    pub rows: usize,
    pub columns: usize,
    pub bytes: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConvertedFile {
    pub source: PathBuf,
    pub output: PathBuf,
    #[serde(flatten)]
    pub stats: FileStats,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FailedFile {
    pub source: PathBuf,
    pub kind: ErrorKind,
    pub reason: String,
}

impl FailedFile {
    pub fn new(source: PathBuf, err: &ConvertError) -> Self {
        Self {
            source,
            kind: err.kind(),
            reason: err.to_string(),
        }
    }
}

/// Result of one attempt at one source file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileOutcome {
    Converted(ConvertedFile),
    Failed(FailedFile),
}

impl FileOutcome {
    pub fn source(&self) -> &Path {
        match self {
            FileOutcome::Converted(c) => &c.source,
            FileOutcome::Failed(f) => &f.source,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FileOutcome::Converted(_))
    }
}

/// Summary of a directory run.
#[derive(Clone, Debug, Serialize)]
pub struct ConversionReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub succeeded: usize,
    pub failed: usize,
    pub converted: Vec<ConvertedFile>,
    pub failures: Vec<FailedFile>,
}

impl ConversionReport {
    /// Fold outcomes into a report, keeping their order.
    pub fn from_outcomes<I>(started_at: DateTime<Utc>, outcomes: I) -> Self
    where
        I: IntoIterator<Item = FileOutcome>,
    {
        let mut converted = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                FileOutcome::Converted(c) => converted.push(c),
                FileOutcome::Failed(f) => failures.push(f),
            }
        }
        Self {
            started_at,
            finished_at: Utc::now(),
            succeeded: converted.len(),
            failed: failures.len(),
            converted,
            failures,
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    pub fn rows_written(&self) -> usize {
        self.converted.iter().map(|c| c.stats.rows).sum()
    }

    pub fn failure_for(&self, source: &Path) -> Option<&FailedFile> {
        self.failures.iter().find(|f| f.source == source)
    }

    /// Write the report as pretty JSON (trailing newline included).
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let report_err = |source| ConvertError::Report {
            path: path.to_path_buf(),
            source,
        };
        let mut f = fs::File::create(path).map_err(report_err)?;
        serde_json::to_writer_pretty(&mut f, self).map_err(|e| report_err(e.into()))?;
        f.write_all(b"\n").map_err(report_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(name: &str, rows: usize) -> FileOutcome {
        FileOutcome::Converted(ConvertedFile {
            source: PathBuf::from(format!("in/{name}.csv")),
            output: PathBuf::from(format!("out/{name}.parquet")),
            stats: FileStats {
                rows,
                columns: 2,
                bytes: 100,
            },
        })
    }

    fn bad(name: &str) -> FileOutcome {
        let source = PathBuf::from(format!("in/{name}.csv"));
        FileOutcome::Failed(FailedFile::new(
            source.clone(),
            &ConvertError::MissingHeader(source),
        ))
    }

    #[test]
    fn counts_and_lookup() {
        let report = ConversionReport::from_outcomes(
            Utc::now(),
            vec![ok("a", 3), bad("b"), ok("c", 4)],
        );
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.total(), 3);
        assert_eq!(report.rows_written(), 7);
        assert!(!report.is_clean());

        let f = report.failure_for(Path::new("in/b.csv")).unwrap();
        assert_eq!(f.kind, ErrorKind::Parse);
        assert!(f.reason.contains("no header row"));
        assert!(report.failure_for(Path::new("in/a.csv")).is_none());
        assert!(report.started_at <= report.finished_at);
    }

    #[test]
    fn empty_report_is_clean() {
        let report = ConversionReport::from_outcomes(Utc::now(), Vec::new());
        assert_eq!(report.total(), 0);
        assert!(report.is_clean());
    }

    #[test]
    fn json_shape() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("report.json");
        let report = ConversionReport::from_outcomes(Utc::now(), vec![ok("a", 1), bad("b")]);
        report.write_json(&path)?;

        let v: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
        assert_eq!(v["succeeded"], 1);
        assert_eq!(v["failed"], 1);
        assert_eq!(v["converted"][0]["rows"], 1);
        assert_eq!(v["converted"][0]["output"], "out/a.parquet");
        assert_eq!(v["failures"][0]["kind"], "parse");
        Ok(())
    }

    #[test]
    fn report_into_missing_dir_is_a_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no").join("report.json");
        let report = ConversionReport::from_outcomes(Utc::now(), vec![ok("a", 1)]);
        let err = report.write_json(&path).unwrap_err();
        assert!(matches!(err, ConvertError::Report { .. }));
        assert_eq!(err.kind(), ErrorKind::Write);
    }
}
