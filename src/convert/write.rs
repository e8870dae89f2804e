// src/convert/write.rs

use crate::convert::Table;
use crate::error::{ConvertError, Result};
use parquet::arrow::ArrowWriter;
use parquet::basic::{BrotliLevel, Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use serde::{Deserialize, Serialize};
use std::{
    ffi::OsString,
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

pub const DEFAULT_EXTENSION: &str = "parquet";

/// Parquet compression codec, written as `none`, `snappy`, `lz4`,
/// `gzip[:level]`, `zstd[:level]` or `brotli[:level]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Codec(Compression);

impl Codec {
    pub fn compression(&self) -> Compression {
        self.0
    }
}

impl Default for Codec {
    fn default() -> Self {
        Codec(Compression::SNAPPY)
    }
}

impl FromStr for Codec {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let (name, level) = match lower.split_once(':') {
            Some((n, l)) => (n, Some(l)),
            None => (lower.as_str(), None),
        };
        let bad_level = |e: parquet::errors::ParquetError| format!("{}: {}", s, e);
        let parse_level = |l: &str| {
            l.parse::<i64>()
                .map_err(|_| format!("{}: level {:?} is not a number", s, l))
        };

        let compression = match (name, level) {
            ("none" | "uncompressed", None) => Compression::UNCOMPRESSED,
            ("snappy", None) => Compression::SNAPPY,
            ("lz4", None) => Compression::LZ4_RAW,
            ("gzip", None) => Compression::GZIP(GzipLevel::default()),
            ("zstd", None) => Compression::ZSTD(ZstdLevel::default()),
            ("brotli", None) => Compression::BROTLI(BrotliLevel::default()),
            ("gzip", Some(l)) => {
                let l = u32::try_from(parse_level(l)?).map_err(|e| e.to_string())?;
                Compression::GZIP(GzipLevel::try_new(l).map_err(bad_level)?)
            }
            ("zstd", Some(l)) => {
                let l = i32::try_from(parse_level(l)?).map_err(|e| e.to_string())?;
                Compression::ZSTD(ZstdLevel::try_new(l).map_err(bad_level)?)
            }
            ("brotli", Some(l)) => {
                let l = u32::try_from(parse_level(l)?).map_err(|e| e.to_string())?;
                Compression::BROTLI(BrotliLevel::try_new(l).map_err(bad_level)?)
            }
            (_, Some(_)) if matches!(name, "none" | "uncompressed" | "snappy" | "lz4") => {
                return Err(format!("{}: codec takes no level", s))
            }
            _ => return Err(format!("unknown compression codec {:?}", s)),
        };
        Ok(Codec(compression))
    }
}

impl TryFrom<String> for Codec {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Compression::UNCOMPRESSED => write!(f, "none"),
            Compression::SNAPPY => write!(f, "snappy"),
            Compression::LZ4_RAW => write!(f, "lz4"),
            Compression::GZIP(l) => write!(f, "gzip:{}", l.compression_level()),
            Compression::ZSTD(l) => write!(f, "zstd:{}", l.compression_level()),
            Compression::BROTLI(l) => write!(f, "brotli:{}", l.compression_level()),
            other => write!(f, "{:?}", other),
        }
    }
}

impl From<Codec> for String {
    fn from(c: Codec) -> Self {
        c.to_string()
    }
}

/// How every output of a run is encoded and named.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteOptions {
    pub codec: Codec,
    /// Output file extension, without the dot.
    pub extension: String,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            codec: Codec::default(),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }
}

impl WriteOptions {
    pub fn properties(&self) -> WriterProperties {
        WriterProperties::builder()
            .set_compression(self.codec.compression())
            .build()
    }
}

/// `out_dir/<stem>.<extension>`, where `<stem>` is `source`'s file name with
/// only its last extension removed, kept as raw OS bytes.
///
/// `None` when `source` has no file name.
pub fn output_path_for(source: &Path, out_dir: &Path, extension: &str) -> Option<PathBuf> {
    let stem = source.file_stem()?;
    let mut name = OsString::from(stem);
    name.push(".");
    name.push(extension);
    Some(out_dir.join(name))
}

/// Write `table` to `out_path` as Parquet, returning the size in bytes.
///
/// Bytes go to a hidden temp file next to `out_path` which is renamed over it
/// once the footer is written. On error the temp file is removed and whatever
/// was at `out_path` stays untouched.
pub fn write_parquet(table: &Table, out_path: &Path, opts: &WriteOptions) -> Result<u64> {
    let io_err = |source| ConvertError::Write {
        path: out_path.to_path_buf(),
        source,
    };
    let parquet_err = |source| ConvertError::Parquet {
        path: out_path.to_path_buf(),
        source,
    };

    let dir = match out_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(".tablecast-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(io_err)?;

    let mut writer = ArrowWriter::try_new(tmp.as_file_mut(), table.schema(), Some(opts.properties()))
        .map_err(parquet_err)?;
    for batch in table.batches() {
        writer.write(batch).map_err(parquet_err)?;
    }
    writer.close().map_err(parquet_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    match_target_mode(tmp.as_file(), out_path).map_err(io_err)?;

    tmp.persist(out_path)
        .map_err(|e| ConvertError::Persist {
            path: out_path.to_path_buf(),
            source: e.error,
        })?;

    let bytes = fs::metadata(out_path).map_err(io_err)?.len();
    debug!(out = %out_path.display(), bytes, "wrote parquet");
    Ok(bytes)
}

/// Temp files are created owner-only; give the output the mode of the file
/// it replaces, or a world-readable 0644 when there is none.
#[cfg(unix)]
fn match_target_mode(file: &fs::File, target: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = match fs::metadata(target) {
        Ok(meta) => meta.permissions().mode() & 0o7777,
        Err(_) => NEW_FILE_MODE,
    };
    file.set_permissions(fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn match_target_mode(_file: &fs::File, _target: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(unix)]
const NEW_FILE_MODE: u32 = 0o644;
