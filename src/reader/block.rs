//! Avro data block framing
//!
//! Each data block in a container file is laid out as:
//! - Record count (zigzag long)
//! - Payload size in bytes (zigzag long)
//! - Payload bytes (records encoded back to back, possibly compressed)
//! - 16-byte sync marker, identical to the one in the file header

use std::io::Read;

use bytes::Bytes;
use tracing::debug;

use crate::codec::Codec;
use crate::error::ReaderError;

use super::buffer::{framing_error, TrackedReader};

/// Size of the sync marker in bytes
pub const SYNC_MARKER_SIZE: usize = 16;

/// A single data block from an Avro file.
#[derive(Debug, Clone)]
pub struct AvroBlock {
    /// Number of records in this block
    pub record_count: u64,
    /// The raw block payload
    pub data: Bytes,
    /// The sync marker following this block
    pub sync_marker: [u8; 16],
    /// Offset of the block's record count in the file
    pub file_offset: u64,
    /// Sequential block number (0-indexed)
    pub block_index: usize,
}

/// A block whose payload has been through the codec and holds plain
/// encoded records.
#[derive(Debug, Clone)]
pub struct DecompressedBlock {
    pub record_count: u64,
    pub data: Bytes,
    pub block_index: usize,
}

impl AvroBlock {
    /// Read the next block from a stream positioned at a block boundary.
    ///
    /// Returns `Ok(None)` when the stream ends exactly where the next block
    /// would start. A stream that ends anywhere after that point is a
    /// truncated file.
    ///
    /// # Errors
    /// - `ReaderError::Parse` on negative counts or sizes, or a size above
    ///   `max_block_size`
    /// - `ReaderError::Truncated` if the stream ends inside the block
    /// - `ReaderError::InvalidSyncMarker` if the trailing marker doesn't match
    pub fn read_from<R: Read>(
        reader: &mut TrackedReader<R>,
        expected_sync: &[u8; 16],
        block_index: usize,
        max_block_size: usize,
    ) -> Result<Option<Self>, ReaderError> {
        let file_offset = reader.offset();

        let Some(record_count) = reader
            .read_long_or_eof()
            .map_err(|e| framing_error(e, reader.offset(), "block record count"))?
        else {
            return Ok(None);
        };

        if record_count < 0 {
            return Err(ReaderError::Parse {
                offset: file_offset,
                message: format!("Invalid negative record count: {}", record_count),
            });
        }

        let size_offset = reader.offset();
        let size = reader
            .read_long()
            .map_err(|e| framing_error(e, reader.offset(), "block size"))?;

        if size < 0 {
            return Err(ReaderError::Parse {
                offset: size_offset,
                message: format!("Invalid negative block size: {}", size),
            });
        }
        let size = usize::try_from(size)
            .ok()
            .filter(|&size| size <= max_block_size)
            .ok_or_else(|| ReaderError::Parse {
                offset: size_offset,
                message: format!(
                    "Block size {} exceeds the maximum of {} bytes",
                    size, max_block_size
                ),
            })?;

        let data = reader
            .read_vec(size)
            .map_err(|e| framing_error(e, reader.offset(), "block payload"))?;

        let sync_offset = reader.offset();
        let mut sync_marker = [0u8; SYNC_MARKER_SIZE];
        reader
            .read_exact(&mut sync_marker)
            .map_err(|e| framing_error(e, reader.offset(), "block sync marker"))?;

        if &sync_marker != expected_sync {
            return Err(ReaderError::InvalidSyncMarker {
                block_index,
                offset: sync_offset,
                expected: *expected_sync,
                actual: sync_marker,
            });
        }

        debug!(
            block_index,
            record_count,
            size,
            offset = file_offset,
            "Read block"
        );

        Ok(Some(AvroBlock {
            record_count: record_count as u64,
            data: Bytes::from(data),
            sync_marker,
            file_offset,
            block_index,
        }))
    }

    /// Run the payload through `codec`.
    pub fn decompress(self, codec: Codec) -> Result<DecompressedBlock, ReaderError> {
        Ok(DecompressedBlock {
            record_count: self.record_count,
            data: codec.decompress(self.data)?,
            block_index: self.block_index,
        })
    }
}
