//! Error types for record resolution, processing and output.

use arrow::error::ArrowError;
use thiserror::Error;

/// Result type for record-level operations.
pub type Result<T> = std::result::Result<T, SieveError>;

/// Errors raised while resolving, processing or writing a single record.
#[derive(Error, Debug)]
pub enum SieveError {
    /// The record has neither an in-memory table nor encoded bytes.
    #[error("record {content_hash} carries neither an in-memory table nor arrow_bytes")]
    MissingTable { content_hash: String },

    /// The encoded `arrow_bytes` could not be decoded into a table.
    #[error("decode arrow_bytes for record {content_hash}: {source}")]
    Decode {
        content_hash: String,
        #[source]
        source: ArrowError,
    },

    /// An Arrow kernel failed while transforming the table.
    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Serializing the processed table failed.
    #[error("write error: {0}")]
    Write(#[from] WriteError),

    /// Configuration rejected before any record was touched.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SieveError {
    /// Whether this error signals corrupt or missing input rather than a
    /// processing problem.
    #[must_use]
    pub const fn is_decode(&self) -> bool {
        matches!(self, Self::MissingTable { .. } | Self::Decode { .. })
    }
}

/// Errors from the output writers.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[cfg(feature = "io-csv")]
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[cfg(feature = "io-parquet")]
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// The table is structurally valid Arrow but the target format cannot encode it.
    #[error("{format} cannot encode this table: {detail}")]
    Incompatible { format: &'static str, detail: String },

    /// The requested format was not compiled into this build.
    #[error("output format `{0}` is not enabled in this build")]
    FormatDisabled(&'static str),
}
