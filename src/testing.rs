//! Fixtures and helpers for testing filter configurations.
//!
//! - **Fixtures**: small Arrow tables and records with known shapes
//! - **Detectors**: [`ContentDetector`](crate::ContentDetector) doubles that
//!   count calls, sleep or panic
//! - **Output directories**: a temporary destination that lists what the
//!   dispatcher wrote
//! - **Assertions**: table-level checks with readable failure messages
//!
//! # Quick Start
//!
//! ```
//! use ironsieve::testing::*;
//! use ironsieve::{FilterConfig, ProcessOutcome, RecordProcessor};
//!
//! # fn main() -> anyhow::Result<()> {
//! let table = string_table(&[
//!     ("name", vec![Some("ada"), Some("grace"), Some("ada")]),
//!     ("lang", vec![Some("rust"), Some("cobol"), Some("rust")]),
//! ])?;
//! let processor = RecordProcessor::new(FilterConfig::default());
//! let ProcessOutcome::Kept(out) = processor.process(table)? else {
//!     panic!("table should be kept");
//! };
//! assert_eq!(out.num_rows(), 2);
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod detectors;
pub mod fixtures;
pub mod output;

pub use assertions::*;
pub use detectors::*;
pub use fixtures::*;
pub use output::*;
