//! Dataset loader and writer for CSV and Parquet files

use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use polars::prelude::*;
use serde::Serialize;
use tempfile::NamedTempFile;

/// Rows used for CSV schema inference
pub const DEFAULT_INFER_SCHEMA_LENGTH: usize = 10_000;

/// Token R and pandas write for missing cells
const NA_TOKEN: &str = "NA";

/// Load a dataset from a file (CSV or Parquet based on extension)
///
/// CSV cells that are empty or contain `NA` are read as nulls.
pub fn load_dataset(path: &Path, infer_schema_length: usize) -> Result<DataFrame> {
    let extension = file_extension(path);

    let lf = match extension.as_str() {
        "csv" => {
            // 0 means full table scan
            let schema_length = if infer_schema_length == 0 {
                None
            } else {
                Some(infer_schema_length)
            };
            LazyCsvReader::new(path)
                .with_infer_schema_length(schema_length)
                .with_null_values(Some(NullValues::AllColumnsSingle(NA_TOKEN.into())))
                .finish()
                .with_context(|| format!("Failed to load CSV file: {}", path.display()))?
        }
        "parquet" => LazyFrame::scan_parquet(path, Default::default())
            .with_context(|| format!("Failed to load Parquet file: {}", path.display()))?,
        _ => anyhow::bail!(
            "Unsupported file format: {}. Supported formats: csv, parquet",
            extension
        ),
    };

    lf.collect()
        .with_context(|| format!("Failed to read {}", path.display()))
}

/// Save dataset to file (CSV or Parquet based on extension)
///
/// The table is written to a temporary file next to `path` and renamed into
/// place, so readers never observe a partially written file.
pub fn save_dataset(df: &mut DataFrame, path: &Path) -> Result<()> {
    let extension = file_extension(path);
    if extension != "csv" && extension != "parquet" {
        anyhow::bail!(
            "Unsupported output format: {}. Supported formats: csv, parquet",
            extension
        );
    }

    let mut tmp = temp_file_beside(path)?;

    if extension == "csv" {
        CsvWriter::new(tmp.as_file_mut())
            .finish(df)
            .with_context(|| format!("Failed to write CSV file: {}", path.display()))?;
    } else {
        ParquetWriter::new(tmp.as_file_mut())
            .finish(df)
            .with_context(|| format!("Failed to write Parquet file: {}", path.display()))?;
    }

    tmp.persist(path)
        .with_context(|| format!("Failed to move output into place: {}", path.display()))?;

    Ok(())
}

/// Serialize `value` as pretty JSON and move it into place at `path`
///
/// Like [`save_dataset`], the file only appears once it is complete.
pub fn save_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
    let mut tmp = temp_file_beside(path)?;

    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, value)
            .with_context(|| format!("Failed to serialize JSON for {}", path.display()))?;
        writer
            .flush()
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    tmp.persist(path)
        .with_context(|| format!("Failed to move output into place: {}", path.display()))?;

    Ok(())
}

/// Temporary file in the destination directory, creating the directory if needed
fn temp_file_beside(path: &Path) -> Result<NamedTempFile> {
    let dir = parent_dir(path);
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create output file next to {}", path.display()))
}

/// Directory a file lives in, `.` for bare file names
pub fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

fn file_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}
