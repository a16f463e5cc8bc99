//! Assertion functions for processed tables.

use crate::table::{formatted_values, string_column_indices, string_value};
use arrow::record_batch::RecordBatch;
use std::collections::HashSet;

/// Assert that `batch` has exactly these column names, in this order.
///
/// # Panics
///
/// Panics if the names differ.
pub fn assert_column_names(batch: &RecordBatch, expected: &[&str]) {
    let schema = batch.schema();
    let actual: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
    assert_eq!(
        actual, expected,
        "Column mismatch:\n  Expected: {expected:?}\n  Actual: {actual:?}"
    );
}

/// Assert that no string cell of `batch` contains `needle`.
///
/// # Panics
///
/// Panics naming the first offending row and column.
pub fn assert_no_string_contains(batch: &RecordBatch, needle: &str) {
    for col in string_column_indices(batch) {
        let array = batch.column(col);
        for row in 0..batch.num_rows() {
            if let Some(v) = string_value(array.as_ref(), row) {
                assert!(
                    !v.contains(needle),
                    "row {row}, column {:?} contains {needle:?}: {v:?}",
                    batch.schema().field(col).name()
                );
            }
        }
    }
}

/// Assert that every row of `batch` is distinct.
///
/// # Panics
///
/// Panics on the first repeated row, or if a column cannot be rendered.
pub fn assert_rows_unique(batch: &RecordBatch) {
    let columns: Vec<Vec<Option<String>>> = batch
        .columns()
        .iter()
        .map(|c| formatted_values(c.as_ref()).expect("column should render"))
        .collect();
    let mut seen = HashSet::new();
    for row in 0..batch.num_rows() {
        let key: Vec<Option<&str>> = columns.iter().map(|c| c[row].as_deref()).collect();
        assert!(seen.insert(key.clone()), "row {row} repeats an earlier row: {key:?}");
    }
}
