//! Per-record output files.
//!
//! Every surviving record is written to its own file under the base directory,
//! named `{content_hash}__{token}.{ext}` where `token` is a fresh UUID v4. The
//! token keeps names unique when the same content is processed more than once.

use crate::config::{OutputFormat, ParquetCompression};
use crate::error::WriteError;
use arrow::record_batch::RecordBatch;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// File name for one record's output.
#[must_use]
pub fn output_file_name(content_hash: &str, token: &str, format: OutputFormat) -> String {
    format!("{content_hash}__{token}.{}", format.extension())
}

/// Writes processed tables into a directory in one format.
#[derive(Debug, Clone)]
pub struct OutputWriter {
    base_path: PathBuf,
    format: OutputFormat,
    compression: ParquetCompression,
}

impl OutputWriter {
    pub fn new(base_path: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            base_path: base_path.into(),
            format,
            compression: ParquetCompression::default(),
        }
    }

    #[must_use]
    pub fn with_parquet_compression(mut self, compression: ParquetCompression) -> Self {
        self.compression = compression;
        self
    }

    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    #[must_use]
    pub const fn format(&self) -> OutputFormat {
        self.format
    }

    /// Write `table` as a new file for `content_hash` and return its path.
    ///
    /// The base directory is created if missing. No index column is added. On
    /// failure any partially written file is removed.
    ///
    /// # Errors
    /// [`WriteError::Incompatible`] when the format cannot represent the
    /// table, [`WriteError::FormatDisabled`] when the format is not compiled
    /// in, and I/O or encoder errors otherwise.
    pub fn write(&self, content_hash: &str, table: &RecordBatch) -> Result<PathBuf, WriteError> {
        fs::create_dir_all(&self.base_path)?;
        let token = Uuid::new_v4().to_string();
        let path = self
            .base_path
            .join(output_file_name(content_hash, &token, self.format));

        debug!(
            path = %path.display(),
            rows = table.num_rows(),
            columns = table.num_columns(),
            "writing table"
        );
        match self.encode(&path, table) {
            Ok(_) => Ok(path),
            Err(e) => {
                if path.exists() {
                    fs::remove_file(&path).ok();
                }
                Err(e)
            }
        }
    }

    fn encode(&self, path: &Path, table: &RecordBatch) -> Result<usize, WriteError> {
        match self.format {
            #[cfg(feature = "io-csv")]
            OutputFormat::Csv => crate::io::csv::write_csv_table(path, table),
            #[cfg(not(feature = "io-csv"))]
            OutputFormat::Csv => {
                let _ = (path, table);
                Err(WriteError::FormatDisabled("csv"))
            }
            #[cfg(feature = "io-parquet")]
            OutputFormat::Parquet => {
                crate::io::parquet::write_parquet_table(path, table, self.compression)
            }
            #[cfg(not(feature = "io-parquet"))]
            OutputFormat::Parquet => {
                let _ = (path, table, self.compression);
                Err(WriteError::FormatDisabled("parquet"))
            }
        }
    }
}
