use anyhow::{Context, Result};
use arrow::util::display::array_value_to_string;
use clap::Parser;
use parquet::file::metadata::RowGroupMetaData;
use parquet::file::reader::{FileReader, SerializedFileReader};
use std::{fs::File, path::PathBuf};
use tablecast::convert::read_parquet;

/// Print the schema, row groups and leading rows of a converted file.
#[derive(Parser, Debug)]
#[command(name = "inspect_parquet")]
struct Args {
    /// Parquet file produced by tablecast
    file: PathBuf,

    /// Number of rows to print
    #[arg(short, long, default_value_t = 10)]
    rows: usize,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let path = &args.file;

    // 1) file-level metadata
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let reader = SerializedFileReader::new(file)?;
    let meta = reader.metadata();
    let file_meta = meta.file_metadata();

    println!("=== {} ===", path.display());
    println!(
        "Created by:           {}",
        file_meta.created_by().unwrap_or("<unknown>")
    );
    println!("Total rows:           {}", file_meta.num_rows());
    println!("Number of row groups: {}", meta.num_row_groups());
    println!("Size on disk:         {} bytes", std::fs::metadata(path)?.len());
    println!();

    for idx in 0..meta.num_row_groups() {
        print_row_group(idx, meta.row_group(idx));
    }

    // 2) arrow view: schema + leading rows
    let table = read_parquet(path)?;
    println!("=== Columns ===");
    for field in table.schema().fields() {
        println!("- {:<30} | {}", field.name(), field.data_type());
    }
    println!();

    println!("=== First {} rows ===", args.rows);
    println!("{}", table.column_names().join(" | "));
    let mut printed = 0;
    'batches: for batch in table.batches() {
        for row in 0..batch.num_rows() {
            if printed == args.rows {
                break 'batches;
            }
            let cells = batch
                .columns()
                .iter()
                .map(|col| array_value_to_string(col, row))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            println!("{}", cells.join(" | "));
            printed += 1;
        }
    }

    Ok(())
}

fn print_row_group(idx: usize, rg: &RowGroupMetaData) {
    println!("--- Row Group {} ---", idx);
    println!("  Rows:              {}", rg.num_rows());
    println!("  Uncompressed size: {} bytes", rg.total_byte_size());
    for col in rg.columns() {
        println!(
            "  > {:<28} {:?} {} → {} bytes",
            col.column_descr().name(),
            col.compression(),
            col.uncompressed_size(),
            col.compressed_size()
        );
    }
    println!();
}
