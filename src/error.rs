//! Error types for Avro container reading

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during schema operations
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Invalid schema format
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),
    /// Unsupported schema type
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),
    /// Schema parsing error
    #[error("Parse error: {0}")]
    ParseError(String),
    /// The header carries no `avro.schema` entry
    #[error("Missing 'avro.schema' in file metadata")]
    MissingSchema,
}

/// Errors that can occur during codec selection
#[derive(Debug, Error)]
pub enum CodecError {
    /// Codec name is not part of the Avro specification
    #[error("Unknown codec: {0}")]
    UnknownCodec(String),
    /// Codec is valid Avro but this reader does not decompress it
    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),
}

/// Errors that can occur during decoding
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Invalid Avro data
    #[error("Invalid data: {0}")]
    InvalidData(String),
    /// Unexpected end of data
    #[error("Unexpected end of data")]
    UnexpectedEof,
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Invalid varint encoding
    #[error("Invalid varint encoding")]
    InvalidVarint,
    /// String is not valid UTF-8
    #[error("Invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    /// Records, arrays and maps nested deeper than the configured limit
    #[error("Nesting exceeds the maximum depth of {0}")]
    RecursionLimitExceeded(usize),
    /// More zero-width array or map items than the configured limit
    #[error("More than {0} zero-width array or map items in one value")]
    TooManyItems(usize),
}

/// Errors that can occur while opening or reading the underlying file
#[derive(Debug, Error)]
pub enum SourceError {
    /// Path not found
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),
    /// Permission denied
    #[error("Permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),
    /// Any other IO error, with the path it happened on
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Top-level reader error type
#[derive(Debug, Error)]
pub enum ReaderError {
    /// Source error
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Read failure on an already open stream
    #[error("IO error at offset {offset}: {source}")]
    Io {
        offset: u64,
        #[source]
        source: io::Error,
    },

    /// Structural parse error at a specific offset
    #[error("Parse error at offset {offset}: {message}")]
    Parse { offset: u64, message: String },

    /// Stream ended inside the header or a block
    #[error("Unexpected end of file at offset {offset}: {message}")]
    Truncated { offset: u64, message: String },

    /// Schema error
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Decode error in block/record
    #[error("Decode error in block {block_index}, record {record_index}: {message}")]
    Decode {
        block_index: usize,
        record_index: usize,
        message: String,
    },

    /// Codec error
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Invalid magic bytes
    #[error("Invalid magic bytes: expected 'Obj\\x01', found {0:?}")]
    InvalidMagic([u8; 4]),

    /// Invalid sync marker
    #[error("Invalid sync marker at block {block_index}, offset {offset}")]
    InvalidSyncMarker {
        block_index: usize,
        offset: u64,
        expected: [u8; 16],
        actual: [u8; 16],
    },
}

/// Coarse classification of a [`ReaderError`].
///
/// Callers that only care about what went wrong, not where, match on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input file does not exist
    NotFound,
    /// The bytes are not a well-formed container file
    Format,
    /// The embedded writer schema is missing or malformed
    Schema,
    /// The underlying read failed
    Io,
}

impl ReaderError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReaderError::Source(SourceError::NotFound(_)) => ErrorKind::NotFound,
            ReaderError::Source(_) | ReaderError::Io { .. } => ErrorKind::Io,
            ReaderError::Schema(_) => ErrorKind::Schema,
            ReaderError::Parse { .. }
            | ReaderError::Truncated { .. }
            | ReaderError::Decode { .. }
            | ReaderError::Codec(_)
            | ReaderError::InvalidMagic(_)
            | ReaderError::InvalidSyncMarker { .. } => ErrorKind::Format,
        }
    }
}
