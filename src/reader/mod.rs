//! Avro file reader components
//!
//! This module provides the core reading functionality for Avro container
//! files: header parsing, block framing, binary decoding, and the
//! record-level `ContainerFileReader`.

mod block;
pub mod buffer;
mod container;
pub mod decode;
mod header;
pub mod varint;

pub use block::{AvroBlock, DecompressedBlock, SYNC_MARKER_SIZE};
pub use buffer::TrackedReader;
pub use container::{ContainerFileReader, ReaderConfig, DEFAULT_MAX_BLOCK_SIZE};
pub use decode::{
    decode_value, decode_value_with_context, AvroValue, RecursionCounter, ValueDecoder,
    DEFAULT_MAX_DEPTH, DEFAULT_MAX_ZERO_WIDTH_ITEMS,
};
pub use header::{AvroHeader, AVRO_MAGIC, CODEC_KEY, SCHEMA_KEY};
pub use varint::{encode_varint, encode_zigzag};
