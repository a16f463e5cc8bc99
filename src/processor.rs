//! The per-record pipeline.
//!
//! [`RecordProcessor`] runs the column and row stages in a fixed order:
//!
//! 1. column validation, then column sampling
//! 2. the row predicates of [`RowFilterEngine`] (value length, substrings,
//!    code, PII), stopping as soon as one empties the table
//! 3. deduplication, the minimum-row check, then row sampling
//!
//! The result is either the filtered table or the reason it was rejected.

use crate::config::FilterConfig;
use crate::detect::{CodeDetector, ContentDetector, PiiDetector};
use crate::error;
use crate::filters::columns::{ColumnThresholds, sample_columns_if_needed, valid_column_indices};
use crate::filters::reduce::{drop_duplicate_rows, sample_rows};
use crate::filters::rows::{RowFilterEngine, RowFilterOutcome};
use crate::filters::{Stage, sampling_rng};
use crate::record::Record;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Why a record produced no output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    /// A stage left zero rows.
    Emptied { stage: Stage },
    /// Fewer rows than `min_rows` survived filtering.
    TooFewRows { rows: usize, min_rows: usize },
    /// No column passed validation.
    NoValidColumns,
}

impl RejectReason {
    /// Short machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Emptied { .. } => "emptied",
            Self::TooFewRows { .. } => "too_few_rows",
            Self::NoValidColumns => "no_valid_columns",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Emptied { stage } => write!(f, "no rows left after {stage}"),
            Self::TooFewRows { rows, min_rows } => {
                write!(f, "{rows} rows left, at least {min_rows} required")
            }
            Self::NoValidColumns => f.write_str("no valid columns"),
        }
    }
}

/// Result of running the pipeline over one table.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    Kept(RecordBatch),
    Rejected(RejectReason),
}

impl ProcessOutcome {
    #[must_use]
    pub const fn is_kept(&self) -> bool {
        matches!(self, Self::Kept(_))
    }

    /// The kept table, if any.
    #[must_use]
    pub fn table(&self) -> Option<&RecordBatch> {
        match self {
            Self::Kept(t) => Some(t),
            Self::Rejected(_) => None,
        }
    }

    #[must_use]
    pub const fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Self::Kept(_) => None,
            Self::Rejected(r) => Some(*r),
        }
    }
}

/// Applies a [`FilterConfig`] to tables.
///
/// Cloning is cheap; the config and detectors are shared.
#[derive(Clone)]
pub struct RecordProcessor {
    config: Arc<FilterConfig>,
    code: Arc<dyn ContentDetector>,
    pii: Arc<dyn ContentDetector>,
}

impl fmt::Debug for RecordProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordProcessor")
            .field("config", &self.config)
            .field("code_detector", &self.code.name())
            .field("pii_detector", &self.pii.name())
            .finish()
    }
}

impl RecordProcessor {
    /// A processor using the built-in regex detectors.
    pub fn new(config: impl Into<Arc<FilterConfig>>) -> Self {
        Self {
            config: config.into(),
            code: Arc::new(CodeDetector::default()),
            pii: Arc::new(PiiDetector),
        }
    }

    #[must_use]
    pub fn with_code_detector(mut self, detector: Arc<dyn ContentDetector>) -> Self {
        self.code = detector;
        self
    }

    #[must_use]
    pub fn with_pii_detector(mut self, detector: Arc<dyn ContentDetector>) -> Self {
        self.pii = detector;
        self
    }

    #[must_use]
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Run every enabled stage over `table`.
    ///
    /// # Errors
    /// Returns an [`ArrowError`] if a kernel fails; filtering outcomes are
    /// reported through [`ProcessOutcome`].
    pub fn process(&self, table: RecordBatch) -> Result<ProcessOutcome, ArrowError> {
        let cfg = self.config.as_ref();
        let mut rng = sampling_rng(cfg.sample_seed);
        let mut table = table;

        if cfg.drop_invalid_cols {
            let before = table.num_columns();
            let keep = valid_column_indices(
                &table,
                &ColumnThresholds::from(cfg),
                &cfg.null_like_values,
            )?;
            if keep.len() != before {
                table = table.project(&keep)?;
            }
            debug!(stage = %Stage::ColumnValidation, before, after = table.num_columns(), "columns validated");
        }
        if table.num_columns() == 0 {
            return Ok(ProcessOutcome::Rejected(RejectReason::NoValidColumns));
        }

        if cfg.drop_extra_cols {
            let before = table.num_columns();
            table = sample_columns_if_needed(&table, cfg.max_cols, &mut rng)?;
            debug!(stage = %Stage::ColumnReduction, before, after = table.num_columns(), "columns reduced");
        }

        let engine = RowFilterEngine::from_config(cfg, self.code.as_ref(), self.pii.as_ref());
        table = match engine.run(table)? {
            RowFilterOutcome::Kept(t) => t,
            RowFilterOutcome::Emptied(stage) => {
                return Ok(ProcessOutcome::Rejected(RejectReason::Emptied { stage }));
            }
        };

        if cfg.drop_duplicate_rows {
            let before = table.num_rows();
            table = drop_duplicate_rows(&table)?;
            debug!(stage = %Stage::Deduplication, before, after = table.num_rows(), "duplicates dropped");
        }

        if let Some(min_rows) = cfg.min_rows {
            let rows = table.num_rows();
            debug!(stage = %Stage::MinRows, rows, min_rows, "row count checked");
            if rows < min_rows {
                return Ok(ProcessOutcome::Rejected(RejectReason::TooFewRows { rows, min_rows }));
            }
        }

        if cfg.drop_extra_rows {
            let before = table.num_rows();
            table = sample_rows(&table, cfg.max_output_rows, &mut rng)?;
            debug!(stage = %Stage::RowSampling, before, after = table.num_rows(), "rows sampled");
            if table.num_rows() == 0 && before > 0 {
                return Ok(ProcessOutcome::Rejected(RejectReason::Emptied {
                    stage: Stage::RowSampling,
                }));
            }
        }

        Ok(ProcessOutcome::Kept(table))
    }

    /// Resolve the record's table and process it.
    ///
    /// Rejections are logged with the record's content hash.
    ///
    /// # Errors
    /// Decode errors from [`Record::resolve_table`] and kernel failures.
    pub fn process_record(&self, record: &Record) -> error::Result<ProcessOutcome> {
        let table = record.resolve_table()?;
        let outcome = self.process(table)?;
        if let ProcessOutcome::Rejected(reason) = &outcome {
            warn!(
                content_hash = %record.content_hash,
                reason = reason.code(),
                "record rejected: {reason}"
            );
        }
        Ok(outcome)
    }
}
