//! The unit of work flowing through the dispatcher.

use crate::error::{Result, SieveError};
use crate::io::ipc::decode_table;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use serde_json::{Map, Value};

/// One input record: a content identifier plus its table, either in memory or
/// as encoded Arrow IPC bytes.
///
/// Fields other than the table travel through untouched in `extra`.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Stable identifier of the source content; used for output naming and logs.
    pub content_hash: String,
    /// In-memory table. Takes precedence over `arrow_bytes` when present.
    pub table: Option<RecordBatch>,
    /// Arrow IPC stream or file bytes, decoded on demand.
    pub arrow_bytes: Option<Bytes>,
    /// Passthrough fields.
    pub extra: Map<String, Value>,
}

impl Record {
    pub fn from_table(content_hash: impl Into<String>, table: RecordBatch) -> Self {
        Self {
            content_hash: content_hash.into(),
            table: Some(table),
            arrow_bytes: None,
            extra: Map::new(),
        }
    }

    pub fn from_arrow_bytes(content_hash: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            content_hash: content_hash.into(),
            table: None,
            arrow_bytes: Some(bytes.into()),
            extra: Map::new(),
        }
    }

    /// Attach a passthrough field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// The table this record describes.
    ///
    /// Only one representation is consulted: the in-memory table if present,
    /// otherwise the decoded `arrow_bytes`.
    ///
    /// # Errors
    /// [`SieveError::Decode`] if the bytes are not valid Arrow IPC, and
    /// [`SieveError::MissingTable`] if the record carries neither form.
    pub fn resolve_table(&self) -> Result<RecordBatch> {
        if let Some(table) = &self.table {
            return Ok(table.clone());
        }
        let bytes = self
            .arrow_bytes
            .as_ref()
            .ok_or_else(|| SieveError::MissingTable {
                content_hash: self.content_hash.clone(),
            })?;
        decode_table(bytes).map_err(|source| SieveError::Decode {
            content_hash: self.content_hash.clone(),
            source,
        })
    }
}
