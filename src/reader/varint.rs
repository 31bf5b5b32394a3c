//! Shared varint encoding and decoding utilities.
//!
//! Avro uses the same varint encoding as Protocol Buffers:
//! - Each byte has 7 bits of data and 1 continuation bit (MSB)
//! - The continuation bit indicates if more bytes follow
//! - Bytes are in little-endian order
//!
//! For signed integers, Avro uses zigzag encoding to map signed values to unsigned:
//! - 0 -> 0, -1 -> 1, 1 -> 2, -2 -> 3, 2 -> 4, ...
//! - Encoding formula: (n << 1) ^ (n >> 63)
//! - Decoding formula: (n >> 1) ^ -(n & 1)

use crate::error::DecodeError;

/// Maximum encoded length of a 64-bit varint.
pub const MAX_VARINT_LEN: usize = 10;

// ============================================================================
// Decoding Functions
// ============================================================================

/// Decode an unsigned variable-length integer.
///
/// # Errors
/// - `DecodeError::UnexpectedEof` if the input is truncated
/// - `DecodeError::InvalidVarint` if the varint exceeds 10 bytes
#[inline]
pub fn decode_varint(data: &mut &[u8]) -> Result<u64, DecodeError> {
    let mut result: u64 = 0;
    let mut shift: u32 = 0;

    loop {
        let Some((&byte, rest)) = data.split_first() else {
            return Err(DecodeError::UnexpectedEof);
        };
        *data = rest;

        result |= ((byte & 0x7F) as u64) << shift;

        if byte & 0x80 == 0 {
            return Ok(result);
        }

        shift += 7;

        if shift >= 64 {
            return Err(DecodeError::InvalidVarint);
        }
    }
}

/// Undo zigzag encoding of an already decoded unsigned varint.
#[inline]
pub fn zigzag_to_signed(unsigned: u64) -> i64 {
    ((unsigned >> 1) as i64) ^ (-((unsigned & 1) as i64))
}

/// Decode a signed variable-length integer (zigzag encoded).
///
/// # Errors
/// - `DecodeError::UnexpectedEof` if the input is truncated
/// - `DecodeError::InvalidVarint` if the varint exceeds 10 bytes
#[inline]
pub fn decode_zigzag(data: &mut &[u8]) -> Result<i64, DecodeError> {
    decode_varint(data).map(zigzag_to_signed)
}

// ============================================================================
// Encoding Functions
// ============================================================================

/// Encode an unsigned integer as a variable-length integer.
#[inline]
pub fn encode_varint(mut value: u64) -> Vec<u8> {
    let mut result = Vec::with_capacity(MAX_VARINT_LEN);
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        result.push(byte);
        if value == 0 {
            break;
        }
    }
    result
}

/// Encode a signed integer as a zigzag-encoded variable-length integer.
#[inline]
pub fn encode_zigzag(value: i64) -> Vec<u8> {
    let zigzag = ((value << 1) ^ (value >> 63)) as u64;
    encode_varint(zigzag)
}
