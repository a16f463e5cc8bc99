//! Row deduplication and row sampling.

use crate::table::{filter_rows, formatted_values, take_rows};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use rand::Rng;
use rand::seq::index;
use std::collections::HashSet;

/// Remove rows that equal an earlier row in every column, keeping the first
/// occurrence and the original order.
///
/// Cells are compared by their rendered value; a null never equals an empty
/// string.
///
/// # Errors
/// Returns an [`ArrowError`] if a column cannot be rendered or filtered.
pub fn drop_duplicate_rows(batch: &RecordBatch) -> Result<RecordBatch, ArrowError> {
    let columns = batch
        .columns()
        .iter()
        .map(|c| formatted_values(c.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;

    let mut seen: HashSet<Vec<Option<&str>>> = HashSet::with_capacity(batch.num_rows());
    let keep: Vec<bool> = (0..batch.num_rows())
        .map(|row| seen.insert(columns.iter().map(|col| col[row].as_deref()).collect()))
        .collect();

    if keep.iter().all(|&k| k) {
        return Ok(batch.clone());
    }
    filter_rows(batch, keep)
}

/// Draw exactly `n` rows uniformly without replacement (or every row, if the
/// table is not larger than `n`). The result follows draw order, not the
/// original row order.
///
/// # Errors
/// Returns an [`ArrowError`] if gathering the rows fails.
pub fn sample_rows<R: Rng + ?Sized>(
    batch: &RecordBatch,
    n: usize,
    rng: &mut R,
) -> Result<RecordBatch, ArrowError> {
    if batch.num_rows() <= n {
        return Ok(batch.clone());
    }
    let picked = index::sample(rng, batch.num_rows(), n).into_vec();
    take_rows(batch, &picked)
}
