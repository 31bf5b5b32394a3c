//! Block codec selection.
//!
//! The `avro.codec` header entry names how block payloads are compressed.
//! This reader decodes the default `null` codec only; the other codecs the
//! Avro specification defines are recognised so that such files fail with
//! a clear "unsupported" error instead of an "unknown codec" one.

use bytes::Bytes;

use crate::error::CodecError;

/// Codec names defined by the Avro specification that are not decoded here.
const UNSUPPORTED_CODECS: &[&str] = &["deflate", "snappy", "zstandard", "zstd", "bzip2", "xz"];

/// Compression codec used within Avro blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    /// No compression (passthrough)
    #[default]
    Null,
}

impl Codec {
    /// Parse a codec from its name string as found in Avro metadata.
    ///
    /// # Examples
    /// ```
    /// use avrocat::codec::Codec;
    ///
    /// assert_eq!(Codec::from_name("null").unwrap(), Codec::Null);
    ///
    /// let err = Codec::from_name("deflate").unwrap_err();
    /// assert!(err.to_string().contains("deflate"));
    /// ```
    pub fn from_name(name: &str) -> Result<Self, CodecError> {
        match name {
            "null" => Ok(Codec::Null),
            known if UNSUPPORTED_CODECS.contains(&known) => Err(CodecError::UnsupportedCodec(
                format!("'{}' (only the 'null' codec can be read)", known),
            )),
            unknown => Err(CodecError::UnknownCodec(format!(
                "'{}'. Codecs defined by Avro: null, {}",
                unknown,
                UNSUPPORTED_CODECS.join(", ")
            ))),
        }
    }

    /// The name as it appears in Avro file metadata.
    pub fn name(&self) -> &'static str {
        match self {
            Codec::Null => "null",
        }
    }

    /// Turn a raw block payload into the encoded record bytes.
    pub fn decompress(&self, data: Bytes) -> Result<Bytes, CodecError> {
        match self {
            Codec::Null => Ok(data),
        }
    }
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
