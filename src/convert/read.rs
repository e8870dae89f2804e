// src/convert/read.rs

use crate::convert::ParseOptions;
use crate::error::{ConvertError, Result};
use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::errors::ParquetError;
use std::{fs, fs::File, io::Cursor, path::Path, sync::Arc};
use tracing::{debug, trace};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// One file's worth of rows, held as Arrow record batches under one schema.
/// Every column keeps the single type inferred for the whole file.
#[derive(Debug, Clone)]
pub struct Table {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl Table {
    pub fn new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        Self { schema, batches }
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    pub fn num_columns(&self) -> usize {
        self.schema.fields().len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.schema
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect()
    }
}

/// Read `path` as delimited text: first row is the header, every other row
/// must have the header's field count. Column types are inferred over all
/// rows, so a column that mixes `1` and `2.5` ends up Float64 throughout.
pub fn read_delimited(path: &Path, opts: &ParseOptions) -> Result<Table> {
    let bytes = fs::read(path).map_err(|source| ConvertError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_delimited(path, &bytes, opts)
}

/// Parse an in-memory buffer; `path` only labels errors.
pub fn parse_delimited(path: &Path, bytes: &[u8], opts: &ParseOptions) -> Result<Table> {
    let (body, skipped) = match bytes.strip_prefix(UTF8_BOM) {
        Some(rest) => (rest, UTF8_BOM.len()),
        None => (bytes, 0),
    };
    let text = std::str::from_utf8(body).map_err(|e| ConvertError::Encoding {
        path: path.to_path_buf(),
        offset: skipped + e.valid_up_to(),
    })?;

    if text.trim().is_empty() {
        return Err(ConvertError::MissingHeader(path.to_path_buf()));
    }

    let csv_err = |source| ConvertError::Csv {
        path: path.to_path_buf(),
        source,
    };

    // 1) infer over every record so types cannot change mid-file
    let format = Format::default()
        .with_header(true)
        .with_delimiter(opts.delimiter());
    let (schema, records) = format
        .infer_schema(Cursor::new(text.as_bytes()), None)
        .map_err(csv_err)?;
    if schema.fields().is_empty() {
        return Err(ConvertError::MissingHeader(path.to_path_buf()));
    }
    let schema = Arc::new(text_for_untyped(&schema));
    trace!(?schema, records, "inferred schema");

    // 2) decode into record batches
    let (schema, batches) = match decode(text, &schema, opts, None) {
        Ok(batches) => (schema, batches),
        Err(err) => {
            // inference goes by shape, so `2020-02-30` is typed as a date
            // and only fails here; such columns are kept as text
            let stuck = undecodable_columns(text, &schema, opts);
            if stuck.is_empty() {
                return Err(csv_err(err));
            }
            debug!(
                path = %path.display(),
                columns = ?stuck,
                "storing undecodable columns as text"
            );
            let schema = Arc::new(as_text(&schema, &stuck));
            let batches = decode(text, &schema, opts, None).map_err(csv_err)?;
            (schema, batches)
        }
    };

    debug!(
        path = %path.display(),
        records,
        batches = batches.len(),
        "decoded delimited text"
    );
    Ok(Table::new(schema, batches))
}

/// Columns with no values to infer from (header-only files, all-empty
/// columns) come back as `Null`; store them as nullable text instead.
fn text_for_untyped(schema: &Schema) -> Schema {
    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .map(|f| match f.data_type() {
            DataType::Null => f.as_ref().clone().with_data_type(DataType::Utf8),
            _ => f.as_ref().clone(),
        })
        .collect();
    Schema::new_with_metadata(fields, schema.metadata().clone())
}

fn decode(
    text: &str,
    schema: &SchemaRef,
    opts: &ParseOptions,
    projection: Option<Vec<usize>>,
) -> std::result::Result<Vec<RecordBatch>, ArrowError> {
    let mut builder = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .with_delimiter(opts.delimiter())
        .with_batch_size(opts.batch_size());
    if let Some(columns) = projection {
        builder = builder.with_projection(columns);
    }
    builder.build(Cursor::new(text.as_bytes()))?.collect()
}

/// Typed columns that fail to decode on their own. A structural fault
/// (ragged row) fails every column, so widening them all still fails later.
fn undecodable_columns(text: &str, schema: &SchemaRef, opts: &ParseOptions) -> Vec<usize> {
    schema
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, f)| f.data_type() != &DataType::Utf8)
        .filter(|(i, _)| decode(text, schema, opts, Some(vec![*i])).is_err())
        .map(|(i, _)| i)
        .collect()
}

fn as_text(schema: &Schema, columns: &[usize]) -> Schema {
    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .enumerate()
        .map(|(i, f)| {
            let f = f.as_ref().clone();
            if columns.contains(&i) {
                f.with_data_type(DataType::Utf8)
            } else {
                f
            }
        })
        .collect();
    Schema::new_with_metadata(fields, schema.metadata().clone())
}

/// Load a Parquet file back into a [`Table`].
pub fn read_parquet(path: &Path) -> Result<Table> {
    let parquet_err = |source| ConvertError::Parquet {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(|source| ConvertError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(parquet_err)?;
    let schema = builder.schema().clone();
    let reader = builder.build().map_err(parquet_err)?;
    let batches = reader
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| parquet_err(ParquetError::External(Box::new(e))))?;

    Ok(Table::new(schema, batches))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Float64Array, Int64Array, StringArray};
    use std::path::PathBuf;

    fn pipe() -> ParseOptions {
        ParseOptions::new('|').unwrap()
    }

    fn label() -> PathBuf {
        PathBuf::from("mem.csv")
    }

    #[test]
    fn header_names_and_types() {
        let t = parse_delimited(&label(), b"id|name|score\n1|ann|2\n2|bob|3.5\n", &pipe()).unwrap();
        assert_eq!(t.column_names(), vec!["id", "name", "score"]);
        assert_eq!(t.num_rows(), 2);

        let schema = t.schema();
        assert_eq!(schema.field(0).data_type(), &DataType::Int64);
        assert_eq!(schema.field(1).data_type(), &DataType::Utf8);
        // 2 and 3.5 in one column → one float type for both rows
        assert_eq!(schema.field(2).data_type(), &DataType::Float64);

        let scores = t.batches()[0]
            .column(2)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(scores.value(0), 2.0);
        assert_eq!(scores.value(1), 3.5);
    }

    #[test]
    fn delimiter_is_honoured() {
        let t = parse_delimited(&label(), b"a,b|c\n1,2|3\n", &pipe()).unwrap();
        assert_eq!(t.column_names(), vec!["a,b", "c"]);
        let first = t.batches()[0]
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(first.value(0), "1,2");
    }

    #[test]
    fn empty_cells_are_null() {
        let t = parse_delimited(&label(), b"a|b\n1|\n|2\n", &pipe()).unwrap();
        let b = t.batches()[0]
            .column(1)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert!(b.is_null(0));
        assert_eq!(b.value(1), 2);
    }

    #[test]
    fn header_only_gives_zero_rows_of_text() {
        let t = parse_delimited(&label(), b"a|b\n", &pipe()).unwrap();
        assert_eq!(t.num_rows(), 0);
        assert_eq!(t.num_columns(), 2);
        assert_eq!(t.schema().field(0).data_type(), &DataType::Utf8);
    }

    #[test]
    fn all_empty_column_is_text() {
        let t = parse_delimited(&label(), b"a|b\n1|\n2|\n", &pipe()).unwrap();
        assert_eq!(t.schema().field(1).data_type(), &DataType::Utf8);
        assert_eq!(t.batches()[0].column(1).null_count(), 2);
    }

    #[test]
    fn bom_is_not_part_of_first_header() {
        let t = parse_delimited(&label(), b"\xEF\xBB\xBFid|v\n1|2\n", &pipe()).unwrap();
        assert_eq!(t.column_names(), vec!["id", "v"]);
    }

    #[test]
    fn empty_input_has_no_header() {
        let err = parse_delimited(&label(), b"", &pipe()).unwrap_err();
        assert!(matches!(err, ConvertError::MissingHeader(_)));
    }

    #[test]
    fn invalid_utf8_reports_offset() {
        let err = parse_delimited(&label(), b"a|b\n1|\xff\n", &pipe()).unwrap_err();
        match err {
            ConvertError::Encoding { offset, .. } => assert_eq!(offset, 6),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = parse_delimited(&label(), b"a|b\n1|2|3\n", &pipe()).unwrap_err();
        assert!(matches!(err, ConvertError::Csv { .. }));
        assert_eq!(err.kind(), crate::ErrorKind::Parse);
    }

    #[test]
    fn impossible_dates_stay_text() {
        let t = parse_delimited(&label(), b"day|v\n2020-02-30|1\n", &pipe()).unwrap();
        assert_eq!(t.schema().field(0).data_type(), &DataType::Utf8);
        assert_eq!(t.schema().field(1).data_type(), &DataType::Int64);

        let batch = &t.batches()[0];
        let day = batch.column(0).as_any().downcast_ref::<StringArray>().unwrap();
        let v = batch.column(1).as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(day.value(0), "2020-02-30");
        assert_eq!(v.value(0), 1);
    }

    #[test]
    fn valid_dates_keep_their_type() {
        let t = parse_delimited(
            &label(),
            b"day|blank\n2020-02-28|0000-00-00\n2021-01-01|0000-00-00\n",
            &pipe(),
        )
        .unwrap();
        assert_eq!(t.schema().field(0).data_type(), &DataType::Date32);
        assert_eq!(t.schema().field(1).data_type(), &DataType::Utf8);
        assert_eq!(t.num_rows(), 2);
    }

    #[test]
    fn small_batches_keep_every_row() {
        let mut data = String::from("n\n");
        for i in 0..25 {
            data.push_str(&format!("{i}\n"));
        }
        let opts = pipe().with_batch_size(10);
        let t = parse_delimited(&label(), data.as_bytes(), &opts).unwrap();
        assert_eq!(t.batches().len(), 3);
        assert_eq!(t.num_rows(), 25);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = read_delimited(Path::new("/definitely/not/here.csv"), &pipe()).unwrap_err();
        assert!(matches!(err, ConvertError::Read { .. }));
    }
}
