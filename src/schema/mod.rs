//! Avro schema types and parsing.
//!
//! This module defines the Avro schema type system (primitives, complex
//! types, logical types), the JSON parser for writer schemas, and the
//! named type registry used while decoding.

mod parser;
mod resolution;
mod types;

pub use parser::{parse_schema, parse_schema_with_options, SchemaParser};
pub use resolution::SchemaResolutionContext;
pub use types::*;
