//! Thin helpers over Arrow `RecordBatch` used by the filter stages.
//!
//! The pipeline only needs a handful of table operations: read a cell as text,
//! render any cell for comparison, keep rows by mask, take rows by index, and
//! project columns. Everything here preserves row order except [`take_rows`],
//! which returns rows in the order of the given indices.

use arrow::array::{Array, AsArray, BooleanArray, UInt64Array};
use arrow::compute::{filter_record_batch, take};
use arrow::datatypes::DataType;
use arrow::error::ArrowError;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use arrow::util::display::{ArrayFormatter, FormatOptions};

/// Whether a column of this type takes part in row predicates.
#[must_use]
pub const fn is_string_type(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View
    )
}

/// Indices of the string-typed columns, in schema order.
#[must_use]
pub fn string_column_indices(batch: &RecordBatch) -> Vec<usize> {
    batch
        .schema()
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, f)| is_string_type(f.data_type()))
        .map(|(i, _)| i)
        .collect()
}

/// The text of a string cell. `None` for nulls and for non-string arrays.
#[must_use]
pub fn string_value(array: &dyn Array, row: usize) -> Option<&str> {
    if array.is_null(row) {
        return None;
    }
    match array.data_type() {
        DataType::Utf8 => Some(array.as_string::<i32>().value(row)),
        DataType::LargeUtf8 => Some(array.as_string::<i64>().value(row)),
        DataType::Utf8View => Some(array.as_string_view().value(row)),
        _ => None,
    }
}

/// Render every cell of a column through Arrow's display formatter.
///
/// Nulls come back as `None` so they stay distinguishable from empty strings.
///
/// # Errors
/// Returns an [`ArrowError`] if the column type has no display implementation.
pub fn formatted_values(array: &dyn Array) -> Result<Vec<Option<String>>, ArrowError> {
    let options = FormatOptions::default();
    let formatter = ArrayFormatter::try_new(array, &options)?;
    (0..array.len())
        .map(|row| {
            if array.is_null(row) {
                Ok(None)
            } else {
                formatter.value(row).try_to_string().map(Some)
            }
        })
        .collect()
}

/// Keep the rows whose mask entry is `true`.
///
/// # Errors
/// Returns an [`ArrowError`] if the mask length differs from the row count.
pub fn filter_rows(batch: &RecordBatch, keep: Vec<bool>) -> Result<RecordBatch, ArrowError> {
    filter_record_batch(batch, &BooleanArray::from(keep))
}

/// Gather rows by index, in the given order.
///
/// # Errors
/// Returns an [`ArrowError`] if an index is out of bounds.
pub fn take_rows(batch: &RecordBatch, indices: &[usize]) -> Result<RecordBatch, ArrowError> {
    let idx = UInt64Array::from_iter_values(indices.iter().map(|&i| i as u64));
    let columns = batch
        .columns()
        .iter()
        .map(|c| take(c.as_ref(), &idx, None))
        .collect::<Result<Vec<_>, _>>()?;
    RecordBatch::try_new_with_options(
        batch.schema(),
        columns,
        &RecordBatchOptions::new().with_row_count(Some(indices.len())),
    )
}
