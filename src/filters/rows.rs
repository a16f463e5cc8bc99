//! Row-level filters over string cells, with early exit on empty tables.
//!
//! Stages run in a fixed order, each on the output of the previous:
//! max value length, forbidden substrings, code content, PII. A row is dropped
//! as soon as any of its string cells matches the stage predicate; cells of
//! non-string columns are never inspected but stay in the output.
//!
//! When a stage leaves no rows the engine stops and reports that stage, so the
//! caller can reject the record without running anything downstream.

use crate::config::FilterConfig;
use crate::detect::ContentDetector;
use crate::filters::Stage;
use crate::table::{filter_rows, string_column_indices, string_value};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use tracing::debug;

/// A single row predicate.
pub enum RowStage<'a> {
    MaxValueLength(usize),
    ForbiddenSubstrings(&'a [String]),
    Code(&'a dyn ContentDetector),
    Pii(&'a dyn ContentDetector),
}

impl RowStage<'_> {
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::MaxValueLength(_) => Stage::MaxValueLength,
            Self::ForbiddenSubstrings(_) => Stage::ForbiddenSubstrings,
            Self::Code(_) => Stage::CodeContent,
            Self::Pii(_) => Stage::Pii,
        }
    }

    /// Whether a string cell disqualifies its row.
    #[must_use]
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Self::MaxValueLength(max) => value.chars().count() > *max,
            Self::ForbiddenSubstrings(subs) => subs.iter().any(|s| value.contains(s.as_str())),
            Self::Code(d) | Self::Pii(d) => d.detect(value),
        }
    }
}

/// Result of running the row stages.
#[derive(Debug, Clone, PartialEq)]
pub enum RowFilterOutcome {
    /// At least one row survived every stage.
    Kept(RecordBatch),
    /// The named stage removed the last row.
    Emptied(Stage),
}

/// Drop every row in which `drop_value` holds for some string cell.
///
/// Null cells are not text and never match.
///
/// # Errors
/// Returns an [`ArrowError`] if the row filter kernel fails.
pub fn apply_row_based_filter<F>(batch: &RecordBatch, drop_value: F) -> Result<RecordBatch, ArrowError>
where
    F: Fn(&str) -> bool,
{
    let string_cols = string_column_indices(batch);
    if string_cols.is_empty() {
        return Ok(batch.clone());
    }
    let keep: Vec<bool> = (0..batch.num_rows())
        .map(|row| {
            !string_cols.iter().any(|&c| {
                string_value(batch.column(c).as_ref(), row).is_some_and(&drop_value)
            })
        })
        .collect();
    if keep.iter().all(|&k| k) {
        return Ok(batch.clone());
    }
    filter_rows(batch, keep)
}

/// The ordered set of enabled row stages.
pub struct RowFilterEngine<'a> {
    stages: Vec<RowStage<'a>>,
}

impl<'a> RowFilterEngine<'a> {
    #[must_use]
    pub const fn new(stages: Vec<RowStage<'a>>) -> Self {
        Self { stages }
    }

    /// Build the stages enabled by `cfg`, skipping any whose threshold or flag
    /// is unset.
    #[must_use]
    pub fn from_config(
        cfg: &'a FilterConfig,
        code: &'a dyn ContentDetector,
        pii: &'a dyn ContentDetector,
    ) -> Self {
        let mut stages = Vec::with_capacity(4);
        if let Some(max) = cfg.max_value_len_chars {
            stages.push(RowStage::MaxValueLength(max));
        }
        if !cfg.filter_rows_containing_substrings.is_empty() {
            stages.push(RowStage::ForbiddenSubstrings(&cfg.filter_rows_containing_substrings));
        }
        if cfg.filter_rows_containing_code {
            stages.push(RowStage::Code(code));
        }
        if cfg.filter_rows_containing_pii {
            stages.push(RowStage::Pii(pii));
        }
        Self { stages }
    }

    /// Stages that will run, in order.
    #[must_use]
    pub fn stages(&self) -> Vec<Stage> {
        self.stages.iter().map(RowStage::stage).collect()
    }

    /// Run every stage, stopping at the first one that empties the table.
    ///
    /// # Errors
    /// Returns an [`ArrowError`] if a row filter kernel fails.
    pub fn run(&self, mut batch: RecordBatch) -> Result<RowFilterOutcome, ArrowError> {
        for stage in &self.stages {
            let before = batch.num_rows();
            batch = apply_row_based_filter(&batch, |v| stage.matches(v))?;
            debug!(stage = %stage.stage(), before, after = batch.num_rows(), "row filter applied");
            if batch.num_rows() == 0 {
                return Ok(RowFilterOutcome::Emptied(stage.stage()));
            }
        }
        Ok(RowFilterOutcome::Kept(batch))
    }
}
