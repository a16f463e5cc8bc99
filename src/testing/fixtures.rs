//! Pre-built tables and records.

use crate::io::ipc::encode_table;
use crate::record::Record;
use arrow::array::{ArrayRef, Int64Array, StringArray, StructArray};
use arrow::datatypes::{DataType, Field, Fields, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

/// A table of nullable `Utf8` columns.
///
/// # Errors
/// Returns an [`ArrowError`] if the columns differ in length.
///
/// # Example
///
/// ```
/// use ironsieve::testing::string_table;
///
/// let t = string_table(&[("a", vec![Some("x"), None])]).unwrap();
/// assert_eq!(t.num_rows(), 2);
/// ```
pub fn string_table(columns: &[(&str, Vec<Option<&str>>)]) -> Result<RecordBatch, ArrowError> {
    let schema = Arc::new(Schema::new(
        columns
            .iter()
            .map(|(name, _)| Field::new(*name, DataType::Utf8, true))
            .collect::<Vec<_>>(),
    ));
    let arrays: Vec<ArrayRef> = columns
        .iter()
        .map(|(_, values)| Arc::new(StringArray::from(values.clone())) as ArrayRef)
        .collect();
    RecordBatch::try_new(schema, arrays)
}

/// A `rows` x `cols` table whose every column passes the default column checks.
///
/// Column `c{j}` holds `"r{i}c{j}"` in row `i`, so every row and every value
/// is distinct.
///
/// # Errors
/// Returns an [`ArrowError`] if the batch cannot be assembled.
pub fn wide_table(rows: usize, cols: usize) -> Result<RecordBatch, ArrowError> {
    let schema = Arc::new(Schema::new(
        (0..cols)
            .map(|j| Field::new(format!("c{j}"), DataType::Utf8, true))
            .collect::<Vec<_>>(),
    ));
    let arrays: Vec<ArrayRef> = (0..cols)
        .map(|j| {
            Arc::new(StringArray::from_iter_values(
                (0..rows).map(|i| format!("r{i}c{j}")),
            )) as ArrayRef
        })
        .collect();
    RecordBatch::try_new(schema, arrays)
}

/// A table with a `Utf8` column `text` and an `Int64` column `id` numbered
/// from zero.
///
/// # Errors
/// Returns an [`ArrowError`] if the batch cannot be assembled.
pub fn text_with_ids(texts: &[&str]) -> Result<RecordBatch, ArrowError> {
    let ids = (0..texts.len()).map(|i| i64::try_from(i).unwrap_or(i64::MAX));
    RecordBatch::try_from_iter(vec![
        ("text", Arc::new(StringArray::from(texts.to_vec())) as ArrayRef),
        ("id", Arc::new(Int64Array::from_iter_values(ids)) as ArrayRef),
    ])
}

/// A table whose `meta` column is a struct without child fields, next to a
/// valid `Utf8` column `name`. CSV can encode it; Parquet cannot.
///
/// # Errors
/// Returns an [`ArrowError`] if the batch cannot be assembled.
pub fn empty_struct_table(rows: usize) -> Result<RecordBatch, ArrowError> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("name", DataType::Utf8, true),
        Field::new("meta", DataType::Struct(Fields::empty()), true),
    ]));
    let names = StringArray::from_iter_values((0..rows).map(|i| format!("name-{i}")));
    let meta = StructArray::new_empty_fields(rows, None);
    RecordBatch::try_new(schema, vec![Arc::new(names), Arc::new(meta)])
}

/// A record whose table travels as Arrow IPC stream bytes.
///
/// # Errors
/// Returns an [`ArrowError`] if the table cannot be encoded.
pub fn ipc_record(content_hash: &str, table: &RecordBatch) -> Result<Record, ArrowError> {
    Ok(Record::from_arrow_bytes(content_hash, encode_table(table)?))
}

/// A record whose `arrow_bytes` are not Arrow IPC.
#[must_use]
pub fn corrupt_record(content_hash: &str) -> Record {
    Record::from_arrow_bytes(content_hash, b"definitely not arrow".to_vec())
}
