//! Parquet output of processed tables.
//!
//! This module provides:
//! - [`write_parquet_table`]: a single-batch `ArrowWriter` write
//! - [`read_parquet_table`]: reads every row group back into one table
//! - [`check_parquet_compatible`]: schema pre-flight for shapes Parquet
//!   cannot store
//!
//! Parquet has no representation for a struct without child fields. Such
//! schemas are refused before the output file is created, and schema
//! conversion failures raised by the writer itself are reported the same way,
//! as [`WriteError::Incompatible`].

use crate::config::ParquetCompression;
use crate::error::WriteError;
use anyhow::{Context, Result};
use arrow::compute::concat_batches;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::errors::ParquetError;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::Path;

impl From<ParquetCompression> for Compression {
    fn from(c: ParquetCompression) -> Self {
        match c {
            ParquetCompression::Zstd => Self::ZSTD(ZstdLevel::default()),
            ParquetCompression::Snappy => Self::SNAPPY,
            ParquetCompression::None => Self::UNCOMPRESSED,
        }
    }
}

/// Path of the first struct field without children, if any.
fn find_empty_struct(field: &Field, path: String) -> Option<String> {
    match field.data_type() {
        DataType::Struct(children) if children.is_empty() => Some(path),
        DataType::Struct(children) => children
            .iter()
            .find_map(|c| find_empty_struct(c, format!("{path}.{}", c.name()))),
        DataType::List(child)
        | DataType::LargeList(child)
        | DataType::FixedSizeList(child, _)
        | DataType::Map(child, _) => find_empty_struct(child, format!("{path}[]")),
        _ => None,
    }
}

/// Refuse schemas Parquet cannot represent.
///
/// # Errors
/// [`WriteError::Incompatible`] naming the offending field.
pub fn check_parquet_compatible(schema: &Schema) -> Result<(), WriteError> {
    for field in schema.fields() {
        if let Some(path) = find_empty_struct(field, field.name().clone()) {
            return Err(WriteError::Incompatible {
                format: "parquet",
                detail: format!("struct field `{path}` has no child fields"),
            });
        }
    }
    Ok(())
}

fn classify(err: ParquetError) -> WriteError {
    match err {
        ParquetError::NYI(detail) | ParquetError::ArrowError(detail) => WriteError::Incompatible {
            format: "parquet",
            detail,
        },
        other => WriteError::Parquet(other),
    }
}

/// Write a table to a Parquet file.
///
/// # Returns
/// Number of rows written.
///
/// # Errors
/// [`WriteError::Incompatible`] if the schema cannot be stored as Parquet;
/// other variants for I/O and encoding failures.
pub fn write_parquet_table(
    path: impl AsRef<Path>,
    batch: &RecordBatch,
    compression: ParquetCompression,
) -> Result<usize, WriteError> {
    check_parquet_compatible(batch.schema_ref())?;

    let file = File::create(path.as_ref())?;
    let props = WriterProperties::builder()
        .set_compression(compression.into())
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props)).map_err(classify)?;
    writer.write(batch)?;
    writer.close()?;
    Ok(batch.num_rows())
}

/// Read a Parquet file into a single table.
///
/// # Errors
/// Returns an error if the file cannot be opened, the reader cannot be built,
/// or batch iteration fails.
pub fn read_parquet_table(path: impl AsRef<Path>) -> Result<RecordBatch> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("open ParquetRecordBatchReader")?;
    let schema = builder.schema().clone();
    let reader = builder
        .with_batch_size(64 * 1024)
        .build()
        .context("build ParquetRecordBatchReader")?;
    let batches = reader
        .collect::<Result<Vec<_>, _>>()
        .context("read parquet batches")?;
    concat_batches(&schema, &batches).context("concatenate parquet batches")
}
