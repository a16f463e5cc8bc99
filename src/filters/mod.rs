//! Column and row filters applied by the [`RecordProcessor`](crate::RecordProcessor).
//!
//! - [`columns`] - column validation (header length, uniqueness, null-like
//!   fraction) and column sampling
//! - [`rows`] - the ordered row-predicate engine with early exit
//! - [`reduce`] - exact deduplication and row sampling
//!
//! Sampling draws from a [`StdRng`] created per record by [`sampling_rng`], so
//! a fixed `sample_seed` gives reproducible output.

pub mod columns;
pub mod reduce;
pub mod rows;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of the per-record pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ColumnValidation,
    ColumnReduction,
    MaxValueLength,
    ForbiddenSubstrings,
    CodeContent,
    Pii,
    Deduplication,
    MinRows,
    RowSampling,
}

impl Stage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ColumnValidation => "column_validation",
            Self::ColumnReduction => "column_reduction",
            Self::MaxValueLength => "max_value_length",
            Self::ForbiddenSubstrings => "forbidden_substrings",
            Self::CodeContent => "code_content",
            Self::Pii => "pii",
            Self::Deduplication => "deduplication",
            Self::MinRows => "min_rows",
            Self::RowSampling => "row_sampling",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RNG for one record's sampling steps.
#[must_use]
pub fn sampling_rng(seed: Option<u64>) -> StdRng {
    seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64)
}
