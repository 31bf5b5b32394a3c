//! Avro file header parsing
//!
//! Parses the Avro Object Container File header which contains:
//! - Magic bytes ("Obj\x01")
//! - Metadata map (including schema and codec)
//! - 16-byte sync marker

use std::collections::HashMap;
use std::io::Read;

use tracing::trace;

use crate::codec::Codec;
use crate::error::{CodecError, ReaderError, SchemaError};
use crate::schema::{parse_schema_with_options, AvroSchema};

use super::buffer::{framing_error, TrackedReader};

/// The Avro magic bytes that identify an Object Container File.
/// Format: "Obj" followed by version byte (0x01)
pub const AVRO_MAGIC: [u8; 4] = [b'O', b'b', b'j', 0x01];

/// Metadata key holding the writer schema JSON.
pub const SCHEMA_KEY: &str = "avro.schema";

/// Metadata key holding the block codec name.
pub const CODEC_KEY: &str = "avro.codec";

/// Parsed Avro file header containing schema and metadata.
#[derive(Debug, Clone)]
pub struct AvroHeader {
    /// The magic bytes (always "Obj\x01" once parsed)
    pub magic: [u8; 4],
    /// Metadata key-value pairs from the header
    pub metadata: HashMap<String, Vec<u8>>,
    /// 16-byte sync marker repeated after every block
    pub sync_marker: [u8; 16],
    /// Writer schema parsed from `avro.schema`
    pub schema: AvroSchema,
    /// Block codec from `avro.codec`
    pub codec: Codec,
    /// Total size of the header in bytes (offset where blocks begin)
    pub header_size: u64,
}

impl AvroHeader {
    /// Parse a header from the start of an in-memory file.
    ///
    /// Bytes after the header are ignored.
    pub fn parse(bytes: &[u8]) -> Result<Self, ReaderError> {
        Self::read_from(&mut TrackedReader::new(bytes), false)
    }

    /// Read the header from a stream positioned at offset 0.
    ///
    /// On success the stream is positioned at the first data block.
    ///
    /// # Errors
    /// - `ReaderError::InvalidMagic` if magic bytes don't match
    /// - `ReaderError::Truncated` if the stream ends inside the header
    /// - `ReaderError::Parse` if the metadata map is malformed
    /// - `ReaderError::Schema` if the schema is missing or invalid
    /// - `ReaderError::Codec` if the codec cannot be read
    pub fn read_from<R: Read>(
        reader: &mut TrackedReader<R>,
        strict_schema: bool,
    ) -> Result<Self, ReaderError> {
        let magic = Self::read_magic(reader)?;
        let metadata = Self::read_metadata(reader)?;
        let sync_marker = Self::read_sync_marker(reader)?;

        let schema = Self::extract_schema(&metadata, strict_schema)?;
        let codec = Self::extract_codec(&metadata)?;

        Ok(Self {
            magic,
            metadata,
            sync_marker,
            schema,
            codec,
            header_size: reader.offset(),
        })
    }

    fn read_magic<R: Read>(reader: &mut TrackedReader<R>) -> Result<[u8; 4], ReaderError> {
        let mut magic = [0u8; 4];
        reader
            .read_exact(&mut magic)
            .map_err(|e| framing_error(e, reader.offset(), "magic bytes"))?;

        if magic != AVRO_MAGIC {
            return Err(ReaderError::InvalidMagic(magic));
        }
        Ok(magic)
    }

    /// Read the metadata map.
    ///
    /// The map is a series of blocks, each starting with an item count.
    /// A negative count is followed by the block's byte size, which is
    /// skipped. A zero count ends the map.
    fn read_metadata<R: Read>(
        reader: &mut TrackedReader<R>,
    ) -> Result<HashMap<String, Vec<u8>>, ReaderError> {
        let mut metadata = HashMap::new();

        loop {
            let count = reader
                .read_long()
                .map_err(|e| framing_error(e, reader.offset(), "metadata block count"))?;

            if count == 0 {
                break;
            }

            if count < 0 {
                let _block_size = reader
                    .read_long()
                    .map_err(|e| framing_error(e, reader.offset(), "metadata block size"))?;
            }

            for _ in 0..count.unsigned_abs() {
                let key = reader
                    .read_string()
                    .map_err(|e| framing_error(e, reader.offset(), "metadata key"))?;
                let value = reader.read_bytes().map_err(|e| {
                    framing_error(
                        e,
                        reader.offset(),
                        &format!("metadata value for key '{}'", key),
                    )
                })?;

                trace!(key = %key, len = value.len(), "Header metadata entry");
                metadata.insert(key, value);
            }
        }

        Ok(metadata)
    }

    fn read_sync_marker<R: Read>(reader: &mut TrackedReader<R>) -> Result<[u8; 16], ReaderError> {
        let mut sync_marker = [0u8; 16];
        reader
            .read_exact(&mut sync_marker)
            .map_err(|e| framing_error(e, reader.offset(), "header sync marker"))?;
        Ok(sync_marker)
    }

    fn extract_schema(
        metadata: &HashMap<String, Vec<u8>>,
        strict: bool,
    ) -> Result<AvroSchema, ReaderError> {
        let schema_bytes = metadata.get(SCHEMA_KEY).ok_or(SchemaError::MissingSchema)?;

        let schema_json = std::str::from_utf8(schema_bytes).map_err(|e| {
            SchemaError::InvalidSchema(format!("Schema is not valid UTF-8: {}", e))
        })?;

        Ok(parse_schema_with_options(schema_json, strict)?)
    }

    /// The codec named by `avro.codec`, `null` when absent.
    fn extract_codec(metadata: &HashMap<String, Vec<u8>>) -> Result<Codec, ReaderError> {
        match metadata.get(CODEC_KEY) {
            Some(codec_bytes) => {
                let codec_name = std::str::from_utf8(codec_bytes).map_err(|_| {
                    CodecError::UnknownCodec(String::from_utf8_lossy(codec_bytes).into_owned())
                })?;
                Ok(Codec::from_name(codec_name)?)
            }
            None => Ok(Codec::Null),
        }
    }

    /// Get the schema as a JSON string.
    pub fn schema_json(&self) -> String {
        self.schema.to_json()
    }

    /// Get a metadata value by key.
    pub fn get_metadata(&self, key: &str) -> Option<&[u8]> {
        self.metadata.get(key).map(|v| v.as_slice())
    }

    /// Get a metadata value as a string.
    pub fn get_metadata_string(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .and_then(|v| std::str::from_utf8(v).ok())
    }

    /// Metadata entries sorted by key.
    pub fn sorted_metadata(&self) -> Vec<(&str, &[u8])> {
        let mut entries: Vec<_> = self
            .metadata
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
            .collect();
        entries.sort_by_key(|(k, _)| *k);
        entries
    }
}
