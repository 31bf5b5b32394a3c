//! Streaming reader for Avro object container files
//!
//! This library opens an Avro container file, parses its header (magic
//! bytes, metadata, writer schema, sync marker), and yields the records it
//! contains one at a time, validating each block's sync marker on the way.
//!
//! ```no_run
//! use avrocat::{ContainerFileReader, ErrorKind};
//!
//! match ContainerFileReader::open("events.avro") {
//!     Ok(reader) => {
//!         for record in reader {
//!             println!("{}", record?.to_json());
//!         }
//!     }
//!     Err(e) if e.kind() == ErrorKind::NotFound => eprintln!("no such file"),
//!     Err(e) => return Err(e),
//! }
//! # Ok::<(), avrocat::ReaderError>(())
//! ```

pub mod codec;
pub mod error;
pub mod output;
pub mod reader;
pub mod schema;
pub mod source;

// Re-export main types
pub use codec::Codec;
pub use error::{CodecError, DecodeError, ErrorKind, ReaderError, SchemaError, SourceError};
pub use output::{OutputFormat, RecordWriter};
pub use reader::{AvroHeader, AvroValue, ContainerFileReader, ReaderConfig};
pub use schema::{
    parse_schema, parse_schema_with_options, AvroSchema, EnumSchema, FieldSchema, FixedSchema,
    LogicalType, LogicalTypeName, RecordSchema, SchemaParser, SchemaResolutionContext,
};
pub use source::LocalSource;
