//! Arrow IPC encoding of record payloads.
//!
//! Records may carry their table as raw IPC bytes in either the streaming
//! format or the file format; the file format is recognised by its leading
//! `ARROW1` magic. All batches in the payload are concatenated into one table.

use anyhow::{Context, Result};
use arrow::buffer::Buffer;
use arrow::compute::concat_batches;
use arrow::error::ArrowError;
use arrow::ipc::convert::fb_to_schema;
use arrow::ipc::reader::{FileDecoder, StreamDecoder, read_footer_length};
use arrow::ipc::writer::StreamWriter;
use arrow::ipc::{Block, root_as_footer};
use arrow::record_batch::RecordBatch;
use std::path::Path;
use std::sync::Arc;

const ARROW_FILE_MAGIC: &[u8] = b"ARROW1";
/// Footer length (i32) followed by the trailing magic.
const FILE_TRAILER_LEN: usize = 10;

/// Decode IPC stream or file bytes into a single table.
///
/// Decoding works on the payload buffer itself: message, body and footer
/// lengths are checked against the bytes actually present, so a short or
/// garbled payload fails without allocating what its headers claim.
///
/// # Errors
/// Returns an [`ArrowError`] if the bytes are truncated, malformed, or hold
/// batches with inconsistent schemas.
pub fn decode_table(bytes: &[u8]) -> Result<RecordBatch, ArrowError> {
    let buffer = Buffer::from(bytes.to_vec());
    if bytes.starts_with(ARROW_FILE_MAGIC) {
        decode_file(&buffer)
    } else {
        decode_stream(buffer)
    }
}

fn decode_stream(mut buffer: Buffer) -> Result<RecordBatch, ArrowError> {
    let mut decoder = StreamDecoder::new();
    let mut batches = Vec::new();
    while !buffer.is_empty() {
        if let Some(batch) = decoder.decode(&mut buffer)? {
            batches.push(batch);
        }
    }
    decoder.finish()?;
    let schema = decoder
        .schema()
        .ok_or_else(|| ArrowError::IpcError("IPC stream carries no schema message".into()))?;
    concat_batches(&schema, &batches)
}

fn decode_file(buffer: &Buffer) -> Result<RecordBatch, ArrowError> {
    let trailer_start = buffer
        .len()
        .checked_sub(FILE_TRAILER_LEN)
        .ok_or_else(|| ArrowError::IpcError("IPC file shorter than its trailer".into()))?;
    let mut trailer = [0u8; FILE_TRAILER_LEN];
    trailer.copy_from_slice(&buffer[trailer_start..]);
    let footer_len = read_footer_length(trailer)?;
    let footer_start = trailer_start
        .checked_sub(footer_len)
        .filter(|start| *start >= ARROW_FILE_MAGIC.len())
        .ok_or_else(|| {
            ArrowError::IpcError(format!(
                "IPC footer of {footer_len} bytes does not fit in a {} byte payload",
                buffer.len()
            ))
        })?;

    let footer = root_as_footer(&buffer[footer_start..trailer_start])
        .map_err(|e| ArrowError::IpcError(format!("invalid IPC footer: {e}")))?;
    let fb_schema = footer
        .schema()
        .ok_or_else(|| ArrowError::IpcError("IPC footer carries no schema".into()))?;
    let schema = Arc::new(fb_to_schema(fb_schema));
    let mut decoder = FileDecoder::new(Arc::clone(&schema), footer.version());

    let dictionaries: Vec<Block> = footer
        .dictionaries()
        .map(|blocks| blocks.iter().copied().collect())
        .unwrap_or_default();
    for block in &dictionaries {
        decoder.read_dictionary(block, &block_bytes(buffer, block)?)?;
    }

    let record_blocks: Vec<Block> = footer
        .recordBatches()
        .map(|blocks| blocks.iter().copied().collect())
        .unwrap_or_default();
    let mut batches = Vec::with_capacity(record_blocks.len());
    for block in &record_blocks {
        if let Some(batch) = decoder.read_record_batch(block, &block_bytes(buffer, block)?)? {
            batches.push(batch);
        }
    }
    concat_batches(&schema, &batches)
}

/// The bytes a footer block points at, if they lie inside the payload.
fn block_bytes(buffer: &Buffer, block: &Block) -> Result<Buffer, ArrowError> {
    let offset = usize::try_from(block.offset()).ok();
    let len = usize::try_from(block.metaDataLength())
        .ok()
        .zip(usize::try_from(block.bodyLength()).ok())
        .and_then(|(meta, body)| meta.checked_add(body));
    match (offset, len) {
        (Some(offset), Some(len)) if offset.checked_add(len).is_some_and(|end| end <= buffer.len()) => {
            Ok(buffer.slice_with_length(offset, len))
        }
        _ => Err(ArrowError::IpcError(format!(
            "IPC block at offset {} with {} + {} bytes lies outside a {} byte payload",
            block.offset(),
            block.metaDataLength(),
            block.bodyLength(),
            buffer.len()
        ))),
    }
}

/// Encode a table as IPC stream bytes.
///
/// # Errors
/// Returns an [`ArrowError`] if the writer rejects the batch.
pub fn encode_table(batch: &RecordBatch) -> Result<Vec<u8>, ArrowError> {
    let mut buf = Vec::new();
    {
        let mut writer = StreamWriter::try_new(&mut buf, &batch.schema())?;
        writer.write(batch)?;
        writer.finish()?;
    }
    Ok(buf)
}

/// Read an IPC file (either format) from disk.
///
/// # Errors
/// Returns an error if the file cannot be read or decoded.
pub fn read_ipc_table(path: impl AsRef<Path>) -> Result<RecordBatch> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    decode_table(&bytes).with_context(|| format!("decode Arrow IPC {}", path.display()))
}
