// src/lib.rs

//! Batch conversion of delimited text files into Parquet.
//!
//! ```no_run
//! let report = tablecast::convert_directory("data/raw/csv", "data/raw/parquet", '|')?;
//! println!("{} converted, {} failed", report.succeeded, report.failed);
//! # Ok::<(), tablecast::ConvertError>(())
//! ```

pub mod config;
pub mod convert;
pub mod error;
pub mod report;

pub use config::Settings;
pub use convert::{convert_directory, convert_file, BatchConverter, ParseOptions, WriteOptions};
pub use error::{ConvertError, ErrorKind, Result};
pub use report::{ConversionReport, FileOutcome, FileStats};
