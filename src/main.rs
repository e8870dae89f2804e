use anyhow::{Context, Result};
use clap::Parser;
use std::{path::PathBuf, process::ExitCode, time::Instant};
use tablecast::{convert::Codec, Settings};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

/// Convert a directory of delimited text files into Parquet, one output per input.
#[derive(Parser, Debug)]
#[command(name = "tablecast", version)]
struct Cli {
    /// Directory holding the delimited text files
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Directory receiving the Parquet files (created if missing)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Field delimiter, a single ASCII character
    #[arg(short, long)]
    delimiter: Option<char>,

    /// YAML settings file; flags given here override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only convert files whose name matches this glob, e.g. "*.csv"
    #[arg(long)]
    pattern: Option<String>,

    /// none, snappy, lz4, gzip[:level], zstd[:level] or brotli[:level]
    #[arg(long)]
    compression: Option<Codec>,

    /// Files converted concurrently
    #[arg(long)]
    threads: Option<usize>,

    /// Write the run report as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

impl Cli {
    fn settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };
        if let Some(v) = &self.input {
            settings.input_dir = Some(v.clone());
        }
        if let Some(v) = &self.output {
            settings.output_dir = Some(v.clone());
        }
        if let Some(v) = self.delimiter {
            settings.delimiter = v;
        }
        if let Some(v) = &self.pattern {
            settings.pattern = Some(v.clone());
        }
        if let Some(v) = self.compression {
            settings.compression = v;
        }
        if let Some(v) = self.threads {
            settings.threads = v;
        }
        settings.validate()?;
        Ok(settings)
    }
}

fn main() -> Result<ExitCode> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    // ─── 2) settings: file, then flags ───────────────────────────────
    let cli = Cli::parse();
    let settings = cli.settings()?;
    let input_dir = settings
        .input_dir
        .clone()
        .context("no input directory: pass --input or set input_dir")?;
    let output_dir = settings
        .output_dir
        .clone()
        .context("no output directory: pass --output or set output_dir")?;
    info!(
        input = %input_dir.display(),
        output = %output_dir.display(),
        delimiter = ?settings.delimiter,
        compression = %settings.compression,
        threads = settings.threads,
        "startup"
    );

    // ─── 3) convert ──────────────────────────────────────────────────
    let start = Instant::now();
    let converter = settings.converter()?;
    let report = converter
        .convert_directory(&input_dir, &output_dir)
        .with_context(|| format!("converting {}", input_dir.display()))?;

    // ─── 4) report ───────────────────────────────────────────────────
    for failure in &report.failures {
        error!(
            source = %failure.source.display(),
            kind = failure.kind.as_str(),
            "{}",
            failure.reason
        );
    }
    if let Some(path) = &cli.report {
        report.write_json(path)?;
        info!(path = %path.display(), "wrote report");
    }
    info!(
        succeeded = report.succeeded,
        failed = report.failed,
        rows = report.rows_written(),
        elapsed = ?start.elapsed(),
        "all done"
    );

    Ok(if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}
