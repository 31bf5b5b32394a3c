//! Record-level reader over an Avro object container file
//!
//! `ContainerFileReader` parses the header once at open time and then
//! yields decoded records lazily, one block at a time:
//! 1. Read the next block's record count and size
//! 2. Read the payload and check the trailing sync marker
//! 3. Decode the block's records one by one with the writer schema
//!
//! Only one block payload is held in memory at a time.

use std::io::Read;
use std::iter::FusedIterator;
use std::path::Path;

use bytes::Bytes;
use tracing::{debug, trace};

use crate::error::ReaderError;
use crate::schema::{AvroSchema, SchemaResolutionContext};
use crate::source::{LocalSource, DEFAULT_BUFFER_SIZE};

use super::block::AvroBlock;
use super::buffer::TrackedReader;
use super::decode::{AvroValue, ValueDecoder, DEFAULT_MAX_DEPTH, DEFAULT_MAX_ZERO_WIDTH_ITEMS};
use super::header::AvroHeader;

/// Default upper bound on a single block's declared size (256 MiB)
pub const DEFAULT_MAX_BLOCK_SIZE: usize = 256 * 1024 * 1024;

/// Configuration for the ContainerFileReader.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Read buffer capacity used when opening a path (default: 64 KiB).
    pub buffer_size: usize,
    /// Largest block payload accepted, in bytes (default: 256 MiB).
    pub max_block_size: usize,
    /// Reject schema naming and union violations instead of logging them.
    pub strict_schema: bool,
    /// Deepest nesting of records, arrays and maps in one record (default: 64).
    pub max_depth: usize,
    /// Most array items occupying no bytes in one record (default: 2^20).
    pub max_zero_width_items: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_block_size: DEFAULT_MAX_BLOCK_SIZE,
            strict_schema: false,
            max_depth: DEFAULT_MAX_DEPTH,
            max_zero_width_items: DEFAULT_MAX_ZERO_WIDTH_ITEMS,
        }
    }
}

impl ReaderConfig {
    /// Create a new ReaderConfig with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the read buffer capacity.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Set the largest block payload accepted.
    pub fn with_max_block_size(mut self, max_block_size: usize) -> Self {
        self.max_block_size = max_block_size;
        self
    }

    /// Enable or disable strict schema validation.
    pub fn with_strict_schema(mut self, strict: bool) -> Self {
        self.strict_schema = strict;
        self
    }

    /// Set the deepest nesting accepted in one record.
    ///
    /// Recursive schemas can describe arbitrarily deep values, so records
    /// nested beyond this fail with a decode error.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set how many zero-width array items (`null`, empty records) one
    /// record may hold.
    pub fn with_max_zero_width_items(mut self, max_items: usize) -> Self {
        self.max_zero_width_items = max_items;
        self
    }
}

/// Streaming reader for Avro object container files.
///
/// The reader is an [`Iterator`] over decoded records. Iteration is not
/// restartable; open the file again to read it a second time. After the
/// first error, or after [`close`](Self::close), the iterator yields
/// nothing further.
///
/// The underlying handle is owned by the reader and released on `close()`
/// or when the reader is dropped.
///
/// # Example
/// ```no_run
/// use avrocat::ContainerFileReader;
///
/// let mut reader = ContainerFileReader::open("users.avro")?;
/// for record in reader.by_ref() {
///     println!("{}", record?.to_json());
/// }
/// reader.close();
/// # Ok::<(), avrocat::ReaderError>(())
/// ```
pub struct ContainerFileReader<R: Read = LocalSource> {
    /// Positioned stream, `None` once closed
    reader: Option<TrackedReader<R>>,
    header: AvroHeader,
    /// Named types of the writer schema
    context: SchemaResolutionContext,
    config: ReaderConfig,
    /// Payload of the block being decoded
    block: Bytes,
    /// Decode position within `block`
    position: usize,
    /// Records of the current block not yet decoded
    remaining: u64,
    /// Index of the current block and of the next record within it
    block_index: usize,
    record_index: usize,
    blocks_read: usize,
    records_read: u64,
    /// Set at end of file or after an error
    finished: bool,
}

impl ContainerFileReader<LocalSource> {
    /// Open a container file with the default configuration.
    ///
    /// # Errors
    /// - `ErrorKind::NotFound` if the file does not exist
    /// - `ErrorKind::Format` if the magic bytes do not match or the header
    ///   is malformed
    /// - `ErrorKind::Schema` if the writer schema is missing or malformed
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ReaderError> {
        Self::open_with_config(path, ReaderConfig::default())
    }

    /// Open a container file.
    pub fn open_with_config<P: AsRef<Path>>(
        path: P,
        config: ReaderConfig,
    ) -> Result<Self, ReaderError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Opening Avro file");

        let source = LocalSource::open_with_buffer_size(path, config.buffer_size)?;
        Self::from_reader(source, config)
    }
}

impl<R: Read> ContainerFileReader<R> {
    /// Read the header from `reader` and prepare to iterate records.
    ///
    /// The reader must be positioned at the start of the file. Reads are
    /// small, so an unbuffered handle should be wrapped in a
    /// `std::io::BufReader` first.
    pub fn from_reader(reader: R, config: ReaderConfig) -> Result<Self, ReaderError> {
        let mut reader = TrackedReader::new(reader);
        let header = AvroHeader::read_from(&mut reader, config.strict_schema)?;
        let context = SchemaResolutionContext::build_from_schema(&header.schema);

        debug!(
            codec = %header.codec,
            header_size = header.header_size,
            named_types = context.len(),
            "Parsed Avro header"
        );

        Ok(Self {
            reader: Some(reader),
            header,
            context,
            config,
            block: Bytes::new(),
            position: 0,
            remaining: 0,
            block_index: 0,
            record_index: 0,
            blocks_read: 0,
            records_read: 0,
            finished: false,
        })
    }

    /// The parsed file header.
    pub fn header(&self) -> &AvroHeader {
        &self.header
    }

    /// The writer schema embedded in the file.
    pub fn schema(&self) -> &AvroSchema {
        &self.header.schema
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Number of data blocks read so far.
    pub fn blocks_read(&self) -> usize {
        self.blocks_read
    }

    /// Number of records yielded so far.
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    pub fn is_closed(&self) -> bool {
        self.reader.is_none()
    }

    /// Release the underlying handle.
    ///
    /// Safe to call more than once. The iterator yields nothing afterwards.
    pub fn close(&mut self) {
        if self.reader.take().is_some() {
            debug!(
                blocks_read = self.blocks_read,
                records_read = self.records_read,
                "Closed Avro reader"
            );
        }
        self.block = Bytes::new();
        self.position = 0;
        self.remaining = 0;
        self.finished = true;
    }

    fn fail(&mut self, err: ReaderError) -> ReaderError {
        self.finished = true;
        self.remaining = 0;
        err
    }

    /// Load the next block. `Ok(false)` at end of file.
    fn next_block(&mut self) -> Result<bool, ReaderError> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(false);
        };

        let Some(block) = AvroBlock::read_from(
            reader,
            &self.header.sync_marker,
            self.blocks_read,
            self.config.max_block_size,
        )?
        else {
            debug!(
                blocks_read = self.blocks_read,
                records_read = self.records_read,
                "Reached end of file"
            );
            return Ok(false);
        };

        let block = block.decompress(self.header.codec)?;
        trace!(
            block_index = block.block_index,
            record_count = block.record_count,
            "Decoding block"
        );

        self.block = block.data;
        self.position = 0;
        self.remaining = block.record_count;
        self.block_index = block.block_index;
        self.record_index = 0;
        self.blocks_read += 1;
        Ok(true)
    }

    /// Decode the next record of the current block.
    fn decode_next(&mut self) -> Result<AvroValue, ReaderError> {
        let mut cursor = &self.block[self.position..];
        let mut decoder = ValueDecoder::with_limits(
            &self.context,
            self.config.max_depth,
            self.config.max_zero_width_items,
        );
        let value = decoder
            .decode(&mut cursor, &self.header.schema)
            .map_err(|e| ReaderError::Decode {
                block_index: self.block_index,
                record_index: self.record_index,
                message: e.to_string(),
            })?;

        self.position = self.block.len() - cursor.len();
        self.remaining -= 1;
        self.record_index += 1;
        self.records_read += 1;
        Ok(value)
    }

    /// Every record decoded but payload bytes left over.
    fn check_block_consumed(&self) -> Result<(), ReaderError> {
        let leftover = self.block.len() - self.position;
        if leftover == 0 {
            return Ok(());
        }
        Err(ReaderError::Decode {
            block_index: self.block_index,
            record_index: self.record_index,
            message: format!(
                "{} bytes left in block after decoding its {} records",
                leftover, self.record_index
            ),
        })
    }
}

impl<R: Read> Iterator for ContainerFileReader<R> {
    type Item = Result<AvroValue, ReaderError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        while self.remaining == 0 {
            if let Err(e) = self.check_block_consumed() {
                return Some(Err(self.fail(e)));
            }
            match self.next_block() {
                Ok(true) => {}
                Ok(false) => {
                    self.finished = true;
                    return None;
                }
                Err(e) => return Some(Err(self.fail(e))),
            }
        }

        match self.decode_next() {
            Ok(value) => Some(Ok(value)),
            Err(e) => Some(Err(self.fail(e))),
        }
    }
}

impl<R: Read> FusedIterator for ContainerFileReader<R> {}

impl<R: Read> std::fmt::Debug for ContainerFileReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerFileReader")
            .field("codec", &self.header.codec)
            .field("blocks_read", &self.blocks_read)
            .field("records_read", &self.records_read)
            .field("closed", &self.is_closed())
            .finish()
    }
}
