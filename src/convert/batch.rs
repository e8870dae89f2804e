// src/convert/batch.rs

use crate::convert::{convert_file_with, output_path_for, ParseOptions, WriteOptions};
use crate::error::{ConvertError, Result};
use crate::report::{ConversionReport, ConvertedFile, FailedFile, FileOutcome};
use chrono::Utc;
use glob::Pattern;
use rayon::prelude::*;
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Converts every eligible file of an input directory into one Parquet file
/// in an output directory.
///
/// Eligible means: a regular file directly inside the input directory, not
/// hidden, not already carrying the output extension, and matching the
/// optional file-name pattern.
#[derive(Clone, Debug)]
pub struct BatchConverter {
    parse: ParseOptions,
    write: WriteOptions,
    pattern: Option<Pattern>,
    threads: usize,
}

/// One planned unit of work.
#[derive(Debug)]
enum Job {
    Convert { source: PathBuf, output: PathBuf },
    Reject { source: PathBuf, error: ConvertError },
}

impl BatchConverter {
    pub fn new(parse: ParseOptions) -> Self {
        Self {
            parse,
            write: WriteOptions::default(),
            pattern: None,
            threads: 1,
        }
    }

    pub fn with_write_options(mut self, write: WriteOptions) -> Self {
        self.write = write;
        self
    }

    /// Only convert files whose name matches `pattern` (e.g. `*.csv`).
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self> {
        let compiled = Pattern::new(pattern).map_err(|source| ConvertError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        self.pattern = Some(compiled);
        Ok(self)
    }

    /// Number of files converted at once; `1` keeps the run sequential.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn parse_options(&self) -> &ParseOptions {
        &self.parse
    }

    pub fn write_options(&self) -> &WriteOptions {
        &self.write
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Convert the whole directory and summarise the run.
    ///
    /// Only precondition failures are returned as `Err`; anything that goes
    /// wrong with a single file lands in the report.
    #[instrument(level = "info", skip(self, input_dir, output_dir), fields(input = %input_dir.as_ref().display(), output = %output_dir.as_ref().display()))]
    pub fn convert_directory<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_dir: P,
        output_dir: Q,
    ) -> Result<ConversionReport> {
        let started_at = Utc::now();
        let jobs = self.plan(input_dir.as_ref(), output_dir.as_ref())?;
        info!(files = jobs.len(), threads = self.threads, "converting");

        let outcomes = self.execute(jobs);
        let report = ConversionReport::from_outcomes(started_at, outcomes);
        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            rows = report.rows_written(),
            "batch complete"
        );
        Ok(report)
    }

    /// Lazily convert the directory one file at a time, in sorted order.
    ///
    /// Preconditions are checked and the output directory is prepared before
    /// the iterator is returned; each `next()` converts exactly one file.
    pub fn attempts<'a>(
        &'a self,
        input_dir: &Path,
        output_dir: &Path,
    ) -> Result<impl Iterator<Item = FileOutcome> + 'a> {
        let jobs = self.plan(input_dir, output_dir)?;
        Ok(jobs.into_iter().map(move |job| self.run_job(job)))
    }

    /// Check preconditions, list eligible files and assign output paths.
    /// Nothing outside `input_dir` is touched until the listing succeeds.
    fn plan(&self, input_dir: &Path, output_dir: &Path) -> Result<Vec<Job>> {
        let sources = self.discover(input_dir)?;

        fs::create_dir_all(output_dir).map_err(|source| ConvertError::OutputDirUnusable {
            path: output_dir.to_path_buf(),
            source,
        })?;

        let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();
        let mut jobs = Vec::with_capacity(sources.len());
        for source in sources {
            let Some(output) = output_path_for(&source, output_dir, &self.write.extension) else {
                continue;
            };
            if let Some(owner) = claimed.get(&output) {
                jobs.push(Job::Reject {
                    error: ConvertError::OutputCollision {
                        path: output,
                        claimed_by: owner.clone(),
                    },
                    source,
                });
                continue;
            }
            claimed.insert(output.clone(), source.clone());
            jobs.push(Job::Convert { source, output });
        }
        Ok(jobs)
    }

    fn discover(&self, input_dir: &Path) -> Result<Vec<PathBuf>> {
        let unreadable = |source| ConvertError::InputDirUnreadable {
            path: input_dir.to_path_buf(),
            source,
        };
        match fs::metadata(input_dir) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(ConvertError::InputDirMissing(input_dir.to_path_buf())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConvertError::InputDirMissing(input_dir.to_path_buf()))
            }
            Err(e) => return Err(unreadable(e)),
        }

        let mut found = Vec::new();
        for entry in fs::read_dir(input_dir).map_err(unreadable)? {
            let path = entry.map_err(unreadable)?.path();
            // follow symlinks; a dangling link is simply not a file
            let is_file = fs::metadata(&path).map(|m| m.is_file()).unwrap_or(false);
            if !is_file || !self.is_eligible(&path) {
                debug!(path = %path.display(), "skipping");
                continue;
            }
            found.push(path);
        }
        found.sort();
        Ok(found)
    }

    fn is_eligible(&self, path: &Path) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };
        let name = name.to_string_lossy();
        if name.starts_with('.') {
            return false;
        }
        let is_output = path
            .extension()
            .map(|e| e.to_string_lossy().eq_ignore_ascii_case(&self.write.extension))
            .unwrap_or(false);
        if is_output {
            return false;
        }
        self.pattern.as_ref().map_or(true, |p| p.matches(&name))
    }

    fn execute(&self, jobs: Vec<Job>) -> Vec<FileOutcome> {
        if self.threads <= 1 || jobs.len() < 2 {
            return jobs.into_iter().map(|job| self.run_job(job)).collect();
        }

        // a private pool caps open files at `threads` readers + writers
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .thread_name(|i| format!("tablecast-{}", i))
            .build();
        match pool {
            Ok(pool) => pool.install(|| {
                jobs.into_par_iter()
                    .map(|job| self.run_job(job))
                    .collect::<Vec<_>>()
            }),
            Err(e) => {
                warn!(error = %e, "thread pool unavailable, converting sequentially");
                jobs.into_iter().map(|job| self.run_job(job)).collect()
            }
        }
    }

    fn run_job(&self, job: Job) -> FileOutcome {
        match job {
            Job::Convert { source, output } => {
                match convert_file_with(&source, &output, &self.parse, &self.write) {
                    Ok(stats) => {
                        info!(
                            source = %source.display(),
                            output = %output.display(),
                            rows = stats.rows,
                            bytes = stats.bytes,
                            "converted"
                        );
                        FileOutcome::Converted(ConvertedFile {
                            source,
                            output,
                            stats,
                        })
                    }
                    Err(err) => {
                        warn!(source = %source.display(), kind = err.kind().as_str(), error = %err, "conversion failed");
                        FileOutcome::Failed(FailedFile::new(source, &err))
                    }
                }
            }
            Job::Reject { source, error } => {
                warn!(source = %source.display(), error = %error, "not converted");
                FileOutcome::Failed(FailedFile::new(source, &error))
            }
        }
    }
}

/// Convert every eligible file in `input_dir` to Parquet in `output_dir`,
/// splitting fields on `delimiter`, with default settings otherwise.
pub fn convert_directory<P: AsRef<Path>, Q: AsRef<Path>>(
    input_dir: P,
    output_dir: Q,
    delimiter: char,
) -> Result<ConversionReport> {
    BatchConverter::new(ParseOptions::new(delimiter)?).convert_directory(input_dir, output_dir)
}
