//! # ironsieve
//!
//! A **table filtering pipeline** for Rust. ironsieve takes a batch of records,
//! each carrying one Arrow table, drops invalid columns and unwanted rows, and
//! writes each surviving table to its own CSV or Parquet file. Every record is
//! handled by an isolated, resource-bounded task, so one bad record never stops
//! the batch.
//!
//! ## Key Features
//!
//! - **Column validation** - header length, distinct values, null-like fraction
//! - **Row filters** - value length, forbidden substrings, code and PII content
//! - **Reduction** - column sampling, exact deduplication, row sampling
//! - **Explicit outcomes** - every record comes back written, rejected with a
//!   reason, or failed with a category
//! - **Bounded concurrency** - per-task CPU and memory reservations on a Rayon pool
//! - **Output formats** - CSV and Parquet (optional via feature flags)
//!
//! ## Quick Start
//!
//! ```no_run
//! use ironsieve::*;
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! let config = FilterConfig::default()
//!     .with_forbidden_substrings(["lorem ipsum"])
//!     .with_min_rows(Some(5));
//! let processor = RecordProcessor::new(config);
//! let dispatcher = TaskDispatcher::new(
//!     processor,
//!     DispatchConfig::new("out", OutputFormat::Parquet),
//! )?;
//!
//! let records: Vec<Record> = Vec::new(); // Record::from_arrow_bytes(hash, bytes), ...
//! let outcomes = dispatcher.dispatch_batch(records)?;
//! let report = BatchReport::from_outcomes(&outcomes);
//! println!("{}", serde_json::to_string_pretty(&report)?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Pipeline Order
//!
//! [`RecordProcessor`] always runs the stages in the same order:
//!
//! 1. column validation ([`filters::columns`])
//! 2. column sampling down to `max_cols`
//! 3. value length, forbidden substrings, code, PII ([`filters::rows`])
//! 4. deduplication ([`filters::reduce`])
//! 5. the `min_rows` check
//! 6. row sampling down to `max_output_rows`
//!
//! Row predicates only look at string columns. A stage that leaves no rows ends
//! the pipeline for that record.
//!
//! ## Feature Flags
//!
//! - `io-csv` - CSV output
//! - `io-parquet` - Parquet output
//! - `cli` - the `ironsieve` binary
//!
//! ## Module Overview
//!
//! - [`config`] - filter and dispatch settings, TOML/JSON loading
//! - [`filters`] - column and row stages
//! - [`processor`] - the per-record pipeline
//! - [`dispatcher`] - task execution, failure containment, batch reports
//! - [`io`] - Arrow IPC input, CSV and Parquet output
//! - [`detect`] - code and PII detectors
//! - [`testing`] - fixtures and helpers for tests

pub mod config;
pub mod detect;
pub mod dispatcher;
pub mod error;
pub mod filters;
pub mod io;
pub mod processor;
pub mod record;
pub mod table;
pub mod testing;

pub use config::{
    DispatchConfig, ExecMode, FilterConfig, OutputFormat, ParquetCompression, ResourceCapacity,
    TaskReservation,
};
pub use detect::{CodeDetector, ContentDetector, PiiDetector, PiiKind};
pub use dispatcher::{BatchReport, DispatchOutcome, FailureKind, TaskDispatcher};
pub use error::{SieveError, WriteError};
pub use filters::Stage;
pub use io::ipc::{decode_table, encode_table, read_ipc_table};
pub use io::writer::{OutputWriter, output_file_name};
pub use processor::{ProcessOutcome, RecordProcessor, RejectReason};
pub use record::Record;

#[cfg(feature = "io-csv")]
pub use io::csv::{read_csv_table, write_csv_table};

#[cfg(feature = "io-parquet")]
pub use io::parquet::{read_parquet_table, write_parquet_table};
