//! Configuration for the filtering pipeline and the task dispatcher.
//!
//! [`FilterConfig`] is built once per batch and shared read-only by every task
//! through an `Arc`. It deserializes from TOML or JSON with every field
//! defaulted, so a config file only needs to name what it changes:
//!
//! ```
//! use ironsieve::FilterConfig;
//!
//! let cfg = FilterConfig::from_toml_str(r#"
//!     max_value_len_chars = 50
//!     filter_rows_containing_pii = true
//!     min_rows = 5
//! "#).unwrap();
//! assert_eq!(cfg.max_value_len_chars, Some(50));
//! assert!(cfg.drop_duplicate_rows);
//! ```

use crate::error::SieveError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Values counted as absent when profiling columns, in addition to nulls and
/// empty strings.
pub const DEFAULT_NULL_LIKE_VALUES: &[&str] = &[
    "-", "--", "?", "null", "NULL", "None", "none", "NaN", "nan", "N/A", "n/a", "NA",
];

/// Thresholds and stage toggles of the per-record filtering pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Run column validation.
    pub drop_invalid_cols: bool,
    /// Longest accepted column header, in characters.
    pub max_header_len_chars: usize,
    /// Fewest distinct non-null-like values a column must hold.
    pub min_unique_column_values: usize,
    /// Largest accepted fraction of null-like values in a column.
    pub max_null_like_frac: f64,
    /// Extra sentinels treated as null-like.
    pub null_like_values: Vec<String>,

    /// Sample columns down to `max_cols`.
    pub drop_extra_cols: bool,
    pub max_cols: usize,

    /// Drop rows holding a string longer than this many characters.
    pub max_value_len_chars: Option<usize>,
    /// Drop rows holding a string containing any of these substrings.
    pub filter_rows_containing_substrings: Vec<String>,
    pub filter_rows_containing_code: bool,
    pub filter_rows_containing_pii: bool,

    pub drop_duplicate_rows: bool,
    /// Reject tables with fewer rows than this after filtering.
    pub min_rows: Option<usize>,
    /// Sample rows down to `max_output_rows`.
    pub drop_extra_rows: bool,
    pub max_output_rows: usize,

    /// Seed for column and row sampling. Unset means fresh entropy per record.
    pub sample_seed: Option<u64>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            drop_invalid_cols: true,
            max_header_len_chars: 256,
            min_unique_column_values: 2,
            max_null_like_frac: 0.1,
            null_like_values: DEFAULT_NULL_LIKE_VALUES
                .iter()
                .map(ToString::to_string)
                .collect(),
            drop_extra_cols: true,
            max_cols: 64,
            max_value_len_chars: Some(1024),
            filter_rows_containing_substrings: Vec::new(),
            filter_rows_containing_code: false,
            filter_rows_containing_pii: false,
            drop_duplicate_rows: true,
            min_rows: None,
            drop_extra_rows: true,
            max_output_rows: 1000,
            sample_seed: None,
        }
    }
}

impl FilterConfig {
    /// A config with every stage switched off; useful as a base for enabling
    /// single stages.
    #[must_use]
    pub fn passthrough() -> Self {
        Self {
            drop_invalid_cols: false,
            drop_extra_cols: false,
            max_value_len_chars: None,
            drop_duplicate_rows: false,
            drop_extra_rows: false,
            ..Self::default()
        }
    }

    /// Parse a TOML document.
    ///
    /// # Errors
    /// Returns an error if the document is not valid TOML for this struct or
    /// fails [`FilterConfig::validate`].
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(s).context("parse filter config TOML")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from a `.json` or `.toml` file (anything that is not `.json` is read as TOML).
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let cfg: Self = if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("json")) {
            serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?
        } else {
            toml::from_str(&raw).with_context(|| format!("parse {}", path.display()))?
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject threshold combinations no table could satisfy.
    ///
    /// # Errors
    /// Returns [`SieveError::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<(), SieveError> {
        if !(0.0..=1.0).contains(&self.max_null_like_frac) {
            return Err(SieveError::Config(format!(
                "max_null_like_frac must be within [0, 1], got {}",
                self.max_null_like_frac
            )));
        }
        if self.drop_extra_cols && self.max_cols == 0 {
            return Err(SieveError::Config(
                "max_cols must be at least 1 when drop_extra_cols is set".into(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn with_max_value_len_chars(mut self, n: Option<usize>) -> Self {
        self.max_value_len_chars = n;
        self
    }

    #[must_use]
    pub fn with_forbidden_substrings<I, S>(mut self, substrings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter_rows_containing_substrings = substrings.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_min_rows(mut self, n: Option<usize>) -> Self {
        self.min_rows = n;
        self
    }

    #[must_use]
    pub fn with_max_cols(mut self, n: usize) -> Self {
        self.drop_extra_cols = true;
        self.max_cols = n;
        self
    }

    #[must_use]
    pub fn with_max_output_rows(mut self, n: usize) -> Self {
        self.drop_extra_rows = true;
        self.max_output_rows = n;
        self
    }

    #[must_use]
    pub fn with_sample_seed(mut self, seed: Option<u64>) -> Self {
        self.sample_seed = seed;
        self
    }
}

/// On-disk format of the per-record output files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Row-oriented text.
    Csv,
    /// Columnar binary.
    Parquet,
}

impl OutputFormat {
    /// File extension without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Parquet => "parquet",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "parquet" => Ok(Self::Parquet),
            other => Err(format!("unknown output format `{other}` (expected csv or parquet)")),
        }
    }
}

/// Compression codec for Parquet output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParquetCompression {
    #[default]
    Zstd,
    Snappy,
    None,
}

impl FromStr for ParquetCompression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "zstd" => Ok(Self::Zstd),
            "snappy" => Ok(Self::Snappy),
            "none" | "uncompressed" => Ok(Self::None),
            other => Err(format!("unknown parquet compression `{other}`")),
        }
    }
}

/// CPU and memory held by one task for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskReservation {
    pub num_cpus: usize,
    pub memory_bytes: u64,
}

impl Default for TaskReservation {
    fn default() -> Self {
        Self {
            num_cpus: 1,
            memory_bytes: 512 * 1024 * 1024,
        }
    }
}

/// Total resources the dispatcher may hand out to concurrently running tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCapacity {
    pub num_cpus: usize,
    pub memory_bytes: u64,
}

impl Default for ResourceCapacity {
    fn default() -> Self {
        Self {
            num_cpus: num_cpus::get().max(1),
            memory_bytes: u64::MAX,
        }
    }
}

impl ResourceCapacity {
    /// Whether a single reservation could ever be admitted.
    #[must_use]
    pub const fn admits(&self, r: &TaskReservation) -> bool {
        r.num_cpus <= self.num_cpus && r.memory_bytes <= self.memory_bytes
    }

    /// How many copies of `r` fit side by side.
    #[must_use]
    pub fn concurrent_slots(&self, r: &TaskReservation) -> usize {
        let by_cpu = self.num_cpus.checked_div(r.num_cpus).unwrap_or(usize::MAX);
        let by_mem = self
            .memory_bytes
            .checked_div(r.memory_bytes)
            .map_or(usize::MAX, |n| usize::try_from(n).unwrap_or(usize::MAX));
        by_cpu.min(by_mem)
    }
}

/// How the dispatcher runs tasks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecMode {
    /// Every task runs on the calling thread.
    Sequential,
    /// Tasks run on a dedicated pool; `workers` defaults to the number of
    /// reservations that fit into the capacity.
    Parallel { workers: Option<usize> },
}

impl Default for ExecMode {
    fn default() -> Self {
        Self::Parallel { workers: None }
    }
}

/// Settings of the dispatch layer: where and how results are written and what
/// each task reserves.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub base_path: PathBuf,
    pub output_format: OutputFormat,
    pub parquet_compression: ParquetCompression,
    pub reservation: TaskReservation,
    pub capacity: ResourceCapacity,
    pub mode: ExecMode,
    /// Abort the batch on the first record whose table cannot be decoded.
    pub strict_decode: bool,
}

impl DispatchConfig {
    /// Parallel dispatch with default reservations.
    pub fn new(base_path: impl Into<PathBuf>, output_format: OutputFormat) -> Self {
        Self {
            base_path: base_path.into(),
            output_format,
            parquet_compression: ParquetCompression::default(),
            reservation: TaskReservation::default(),
            capacity: ResourceCapacity::default(),
            mode: ExecMode::default(),
            strict_decode: false,
        }
    }

    #[must_use]
    pub fn with_reservation(mut self, reservation: TaskReservation) -> Self {
        self.reservation = reservation;
        self
    }

    #[must_use]
    pub fn with_capacity(mut self, capacity: ResourceCapacity) -> Self {
        self.capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: ExecMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_strict_decode(mut self, strict: bool) -> Self {
        self.strict_decode = strict;
        self
    }

    #[must_use]
    pub fn with_parquet_compression(mut self, compression: ParquetCompression) -> Self {
        self.parquet_compression = compression;
        self
    }
}
