// src/error.rs

use arrow::error::ArrowError;
use parquet::errors::ParquetError;
use serde::{Deserialize, Serialize};
use std::{io, path::PathBuf};
use thiserror::Error;

/// Canonical result for the library.
pub type Result<T> = std::result::Result<T, ConvertError>;

/// Coarse classification of a [`ConvertError`].
///
/// `Precondition` aborts a whole batch; `Parse` and `Write` are recorded
/// against a single source file and the batch carries on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Precondition,
    Parse,
    Write,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Precondition => "precondition",
            ErrorKind::Parse => "parse",
            ErrorKind::Write => "write",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConvertError {
    // ── precondition ────────────────────────────────────────────────
    #[error("input directory {0:?} does not exist or is not a directory")]
    InputDirMissing(PathBuf),

    #[error("input directory {path:?} cannot be read: {source}")]
    InputDirUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("output directory {path:?} cannot be used: {source}")]
    OutputDirUnusable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("delimiter {0:?} must be a single ASCII character")]
    InvalidDelimiter(char),

    #[error("invalid file pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    // ── parse ───────────────────────────────────────────────────────
    #[error("reading {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path:?} is not valid UTF-8 (first bad byte at offset {offset})")]
    Encoding { path: PathBuf, offset: usize },

    #[error("{0:?} has no header row")]
    MissingHeader(PathBuf),

    #[error("parsing {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: ArrowError,
    },

    // ── write ───────────────────────────────────────────────────────
    #[error("writing {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("encoding parquet for {path:?}: {source}")]
    Parquet {
        path: PathBuf,
        #[source]
        source: ParquetError,
    },

    #[error("placing {path:?}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("output {path:?} is already produced by {claimed_by:?}")]
    OutputCollision { path: PathBuf, claimed_by: PathBuf },

    #[error("writing report {path:?}: {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ConvertError {
    pub fn kind(&self) -> ErrorKind {
        use ConvertError::*;
        match self {
            InputDirMissing(_)
            | InputDirUnreadable { .. }
            | OutputDirUnusable { .. }
            | InvalidDelimiter(_)
            | InvalidPattern { .. } => ErrorKind::Precondition,
            Read { .. } | Encoding { .. } | MissingHeader(_) | Csv { .. } => ErrorKind::Parse,
            Write { .. }
            | Parquet { .. }
            | Persist { .. }
            | OutputCollision { .. }
            | Report { .. } => ErrorKind::Write,
        }
    }

    /// True when the error must abort a batch rather than be recorded per file.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Precondition
    }
}
