//! Column validation and column sampling.
//!
//! A column is kept only if it passes all three checks:
//! 1. its header has at most `max_header_len_chars` characters,
//! 2. it holds at least `min_unique_column_values` distinct non-null-like values,
//! 3. at most `max_null_like_frac` of its cells are null-like.
//!
//! Null-like means an Arrow null, an empty string, or one of the configured
//! sentinels. Cells are compared through their display form, so the checks work
//! for every column type.

use crate::config::FilterConfig;
use crate::table::formatted_values;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use rand::Rng;
use rand::seq::index;
use std::collections::HashSet;

/// The three column-quality thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnThresholds {
    pub max_header_len_chars: usize,
    pub min_unique_column_values: usize,
    pub max_null_like_frac: f64,
}

impl From<&FilterConfig> for ColumnThresholds {
    fn from(cfg: &FilterConfig) -> Self {
        Self {
            max_header_len_chars: cfg.max_header_len_chars,
            min_unique_column_values: cfg.min_unique_column_values,
            max_null_like_frac: cfg.max_null_like_frac,
        }
    }
}

/// Profile of a single column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnStats {
    pub name: String,
    pub header_len: usize,
    pub unique_values: usize,
    pub null_like: usize,
    pub rows: usize,
}

impl ColumnStats {
    /// Fraction of null-like cells; zero for an empty column.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn null_like_frac(&self) -> f64 {
        if self.rows == 0 {
            0.0
        } else {
            self.null_like as f64 / self.rows as f64
        }
    }

    /// First failed check, if any.
    #[must_use]
    pub fn verdict(&self, t: &ColumnThresholds) -> ColumnVerdict {
        if self.header_len > t.max_header_len_chars {
            ColumnVerdict::HeaderTooLong(self.header_len)
        } else if self.unique_values < t.min_unique_column_values {
            ColumnVerdict::TooFewUnique(self.unique_values)
        } else if self.null_like_frac() > t.max_null_like_frac {
            ColumnVerdict::TooManyNullLike(self.null_like_frac())
        } else {
            ColumnVerdict::Valid
        }
    }
}

/// Outcome of validating one column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnVerdict {
    Valid,
    HeaderTooLong(usize),
    TooFewUnique(usize),
    TooManyNullLike(f64),
}

impl ColumnVerdict {
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Whether a rendered cell counts as absent.
#[must_use]
pub fn is_null_like(value: Option<&str>, sentinels: &[String]) -> bool {
    match value {
        None => true,
        Some(v) => v.is_empty() || sentinels.iter().any(|s| s == v),
    }
}

/// Profile every column of `batch`.
///
/// # Errors
/// Returns an [`ArrowError`] if a column type cannot be rendered.
pub fn column_stats(
    batch: &RecordBatch,
    null_like_values: &[String],
) -> Result<Vec<ColumnStats>, ArrowError> {
    let schema = batch.schema();
    schema
        .fields()
        .iter()
        .zip(batch.columns())
        .map(|(field, column)| {
            let values = formatted_values(column.as_ref())?;
            let mut unique = HashSet::new();
            let mut null_like = 0usize;
            for v in &values {
                let v = v.as_deref();
                if is_null_like(v, null_like_values) {
                    null_like += 1;
                } else {
                    unique.insert(v);
                }
            }
            Ok(ColumnStats {
                name: field.name().clone(),
                header_len: field.name().chars().count(),
                unique_values: unique.len(),
                null_like,
                rows: values.len(),
            })
        })
        .collect()
}

/// Indices of the columns passing every check, in schema order.
///
/// # Errors
/// Returns an [`ArrowError`] if a column type cannot be rendered.
pub fn valid_column_indices(
    batch: &RecordBatch,
    thresholds: &ColumnThresholds,
    null_like_values: &[String],
) -> Result<Vec<usize>, ArrowError> {
    Ok(column_stats(batch, null_like_values)?
        .iter()
        .enumerate()
        .filter_map(|(i, stats)| {
            let verdict = stats.verdict(thresholds);
            if !verdict.is_valid() {
                tracing::debug!(column = %stats.name, ?verdict, "dropping invalid column");
            }
            verdict.is_valid().then_some(i)
        })
        .collect())
}

/// Names of the columns passing every check, in schema order.
///
/// # Errors
/// Returns an [`ArrowError`] if a column type cannot be rendered.
pub fn fetch_names_of_valid_columns(
    batch: &RecordBatch,
    thresholds: &ColumnThresholds,
    null_like_values: &[String],
) -> Result<Vec<String>, ArrowError> {
    let schema = batch.schema();
    Ok(valid_column_indices(batch, thresholds, null_like_values)?
        .into_iter()
        .map(|i| schema.field(i).name().clone())
        .collect())
}

/// Choose which of `num_columns` columns to keep so that at most `max_cols`
/// remain.
///
/// Below the limit every index is returned in order. Above it, exactly
/// `max_cols` distinct indices are drawn uniformly without replacement, in
/// draw order.
pub fn sample_columns<R: Rng + ?Sized>(num_columns: usize, max_cols: usize, rng: &mut R) -> Vec<usize> {
    if num_columns <= max_cols {
        return (0..num_columns).collect();
    }
    index::sample(rng, num_columns, max_cols).into_vec()
}

/// Project `batch` onto at most `max_cols` sampled columns.
///
/// # Errors
/// Returns an [`ArrowError`] if the projection fails.
pub fn sample_columns_if_needed<R: Rng + ?Sized>(
    batch: &RecordBatch,
    max_cols: usize,
    rng: &mut R,
) -> Result<RecordBatch, ArrowError> {
    if batch.num_columns() <= max_cols {
        return Ok(batch.clone());
    }
    batch.project(&sample_columns(batch.num_columns(), max_cols, rng))
}
