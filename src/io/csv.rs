//! CSV output of processed tables.
//!
//! This module provides:
//! - [`write_csv_table`]: header row plus one line per row, no index column
//! - [`read_csv_table`]: reads a CSV back as an all-`Utf8` table
//!
//! # Design notes
//! - Every cell is rendered by Arrow's display formatter, so nested and
//!   temporal types are written in their display form and never fail.
//! - Nulls are written as empty cells and read back as nulls; a round trip
//!   therefore widens every column to text.

use crate::error::WriteError;
use anyhow::{Context, Result};
use arrow::array::{Array, ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use arrow::util::display::{ArrayFormatter, FormatOptions};
use csv::WriterBuilder;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;

/// Write a table to a CSV file with a header row.
///
/// # Returns
/// The number of data rows written.
///
/// # Errors
/// Returns an error if the file cannot be created or a cell cannot be
/// rendered or written.
pub fn write_csv_table(path: impl AsRef<Path>, batch: &RecordBatch) -> Result<usize, WriteError> {
    let file = File::create(path.as_ref())?;
    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .from_writer(BufWriter::new(file));

    let schema = batch.schema();
    wtr.write_record(schema.fields().iter().map(|f| f.name().as_str()))?;

    let options = FormatOptions::default();
    let formatters = batch
        .columns()
        .iter()
        .map(|c| ArrayFormatter::try_new(c.as_ref(), &options))
        .collect::<Result<Vec<_>, _>>()?;

    let mut cells: Vec<String> = Vec::with_capacity(formatters.len());
    for row in 0..batch.num_rows() {
        cells.clear();
        for (fmt, column) in formatters.iter().zip(batch.columns()) {
            if column.is_null(row) {
                cells.push(String::new());
            } else {
                cells.push(fmt.value(row).try_to_string()?);
            }
        }
        wtr.write_record(&cells)?;
    }
    wtr.flush()?;
    Ok(batch.num_rows())
}

/// Read a CSV file with a header row into a table of nullable `Utf8` columns.
///
/// Empty cells become nulls.
///
/// # Errors
/// Returns an error if the file cannot be opened or a record fails to parse.
pub fn read_csv_table(path: impl AsRef<Path>) -> Result<RecordBatch> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(f);
    let headers: Vec<String> = rdr
        .headers()
        .with_context(|| format!("read CSV header of {}", path.display()))?
        .iter()
        .map(ToString::to_string)
        .collect();

    let mut columns: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    let mut rows = 0usize;
    for (i, rec) in rdr.records().enumerate() {
        let rec = rec.with_context(|| format!("parse CSV record #{}", i + 1))?;
        for (col, cell) in columns.iter_mut().zip(rec.iter()) {
            col.push((!cell.is_empty()).then(|| cell.to_string()));
        }
        rows += 1;
    }

    let schema = Arc::new(Schema::new(
        headers
            .iter()
            .map(|h| Field::new(h, DataType::Utf8, true))
            .collect::<Vec<_>>(),
    ));
    let arrays: Vec<ArrayRef> = columns
        .into_iter()
        .map(|c| Arc::new(StringArray::from(c)) as ArrayRef)
        .collect();
    RecordBatch::try_new_with_options(
        schema,
        arrays,
        &RecordBatchOptions::new().with_row_count(Some(rows)),
    )
    .context("assemble CSV table")
}
