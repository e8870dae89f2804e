// src/config.rs

use crate::convert::{BatchConverter, Codec, ParseOptions, WriteOptions, DEFAULT_BATCH_SIZE};
use crate::convert::write::DEFAULT_EXTENSION;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Run settings, usually read from a YAML file and then overridden by CLI
/// flags. Every key is optional.
///
/// ```yaml
/// input_dir: data/raw/csv/transactions
/// output_dir: data/raw/parquet/transactions
/// delimiter: "|"
/// pattern: "*.csv"
/// compression: zstd:3
/// threads: 4
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub input_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub delimiter: char,
    pub pattern: Option<String>,
    pub extension: String,
    pub compression: Codec,
    pub batch_size: usize,
    pub threads: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input_dir: None,
            output_dir: None,
            delimiter: '|',
            pattern: None,
            extension: DEFAULT_EXTENSION.to_string(),
            compression: Codec::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            threads: 1,
        }
    }
}

impl Settings {
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        // an empty document means "all defaults"
        if s.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Settings = serde_yaml::from_str(s).context("parsing settings YAML")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading settings file {:?}", path))?;
        Self::from_yaml_str(&text).with_context(|| format!("in settings file {:?}", path))
    }

    pub fn validate(&self) -> Result<()> {
        ParseOptions::new(self.delimiter)?;
        if self.extension.is_empty()
            || self.extension.starts_with('.')
            || self.extension.contains(['/', '\\'])
        {
            bail!(
                "extension {:?} must be a bare file extension such as \"parquet\"",
                self.extension
            );
        }
        if self.batch_size == 0 {
            bail!("batch_size must be at least 1");
        }
        if self.threads == 0 {
            bail!("threads must be at least 1");
        }
        if let Some(p) = &self.pattern {
            glob::Pattern::new(p).with_context(|| format!("invalid pattern {:?}", p))?;
        }
        Ok(())
    }

    /// Build the converter these settings describe.
    pub fn converter(&self) -> crate::Result<BatchConverter> {
        let parse = ParseOptions::new(self.delimiter)?.with_batch_size(self.batch_size);
        let write = WriteOptions {
            codec: self.compression,
            extension: self.extension.clone(),
        };
        let converter = BatchConverter::new(parse)
            .with_write_options(write)
            .with_threads(self.threads);
        match &self.pattern {
            Some(p) => converter.with_pattern(p),
            None => Ok(converter),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parquet::basic::Compression;

    #[test]
    fn defaults() {
        let s = Settings::from_yaml_str("").unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.delimiter, '|');
        assert_eq!(s.extension, "parquet");
        assert_eq!(s.compression.compression(), Compression::SNAPPY);
        assert_eq!(s.threads, 1);
    }

    #[test]
    fn full_document() {
        let yaml = r#"
input_dir: data/raw/csv/transactions
output_dir: data/raw/parquet/transactions
delimiter: ","
pattern: "*.csv"
extension: pq
compression: zstd:3
batch_size: 1024
threads: 4
"#;
        let s = Settings::from_yaml_str(yaml).unwrap();
        assert_eq!(
            s.input_dir.as_deref(),
            Some(Path::new("data/raw/csv/transactions"))
        );
        assert_eq!(s.delimiter, ',');
        assert_eq!(s.compression.to_string(), "zstd:3");

        let c = s.converter().unwrap();
        assert_eq!(c.parse_options().delimiter(), b',');
        assert_eq!(c.parse_options().batch_size(), 1024);
        assert_eq!(c.write_options().extension, "pq");
        assert_eq!(c.threads(), 4);
    }

    #[test]
    fn rejects_bad_values() {
        for yaml in [
            "delimiter: \"\\n\"",
            "compression: lzma",
            "compression: zstd:40",
            "extension: .parquet",
            "extension: ''",
            "threads: 0",
            "batch_size: 0",
            "pattern: \"[\"",
            "delimeter: \",\"",
        ] {
            assert!(Settings::from_yaml_str(yaml).is_err(), "accepted {yaml:?}");
        }
    }

    #[test]
    fn settings_round_trip_through_yaml() {
        let s = Settings {
            pattern: Some("*.txt".into()),
            compression: "brotli:4".parse().unwrap(),
            ..Settings::default()
        };
        let text = serde_yaml::to_string(&s).unwrap();
        assert_eq!(Settings::from_yaml_str(&text).unwrap(), s);
    }

    #[test]
    fn load_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tablecast.yaml");
        fs::write(&path, "threads: nope\n").unwrap();
        let err = Settings::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("tablecast.yaml"));
    }
}
