// src/convert/mod.rs

//! Delimited text → Parquet conversion.
//!
//! [`read`] turns one delimited file into an in-memory [`Table`], [`write`]
//! places that table at its destination as Parquet, and [`batch`] drives both
//! over a whole directory.

pub mod batch;
pub mod read;
pub mod write;

pub use batch::{convert_directory, BatchConverter};
pub use read::{read_delimited, read_parquet, Table};
pub use write::{output_path_for, write_parquet, Codec, WriteOptions};

use crate::error::{ConvertError, Result};
use crate::report::FileStats;
use std::path::Path;
use tracing::{debug, instrument};

/// Rows per Arrow record batch while reading delimited text.
pub const DEFAULT_BATCH_SIZE: usize = 8192;

/// How every file of a run is tokenized. The first row is always the header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParseOptions {
    delimiter: u8,
    batch_size: usize,
}

impl ParseOptions {
    /// Fails with [`ConvertError::InvalidDelimiter`] unless `delimiter` is one
    /// ASCII byte that can separate fields (not a line break or the quote).
    pub fn new(delimiter: char) -> Result<Self> {
        if !delimiter.is_ascii() || matches!(delimiter, '\n' | '\r' | '"') {
            return Err(ConvertError::InvalidDelimiter(delimiter));
        }
        Ok(Self {
            delimiter: delimiter as u8,
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

/// Convert a single delimited file to Parquet with default write options.
///
/// Any existing file at `output_path` is replaced only once the new file is
/// complete; on error it is left as it was.
pub fn convert_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input_path: P,
    output_path: Q,
    delimiter: char,
) -> Result<FileStats> {
    let parse = ParseOptions::new(delimiter)?;
    convert_file_with(
        input_path.as_ref(),
        output_path.as_ref(),
        &parse,
        &WriteOptions::default(),
    )
}

#[instrument(level = "debug", skip(parse, write), fields(input = %input_path.display()))]
pub fn convert_file_with(
    input_path: &Path,
    output_path: &Path,
    parse: &ParseOptions,
    write: &WriteOptions,
) -> Result<FileStats> {
    let table = read_delimited(input_path, parse)?;
    debug!(
        rows = table.num_rows(),
        columns = table.num_columns(),
        "parsed table"
    );
    let bytes = write_parquet(&table, output_path, write)?;

    Ok(FileStats {
        rows: table.num_rows(),
        columns: table.num_columns(),
        bytes,
    })
}
