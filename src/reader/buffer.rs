//! Offset-tracking reader over a byte stream.
//!
//! Header and block framing are read straight from the file rather than
//! from a fully buffered slice. `TrackedReader` wraps any `Read` and keeps
//! the absolute file offset so errors can point at the byte that failed.
//! It also separates "stream ended cleanly before this value" from "stream
//! ended inside this value", which is how the container reader tells a
//! normal end of file from a truncated block.

use std::io::{self, Read};

use crate::error::{DecodeError, ReaderError};

use super::varint::{zigzag_to_signed, MAX_VARINT_LEN};

/// A `Read` wrapper that counts consumed bytes.
#[derive(Debug)]
pub struct TrackedReader<R> {
    inner: R,
    offset: u64,
}

impl<R: Read> TrackedReader<R> {
    /// Wrap a reader positioned at offset 0.
    pub fn new(inner: R) -> Self {
        Self { inner, offset: 0 }
    }

    /// Absolute number of bytes consumed so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read one byte, `None` at end of stream.
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.offset += 1;
                    return Ok(Some(byte[0]));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Read an unsigned varint.
    ///
    /// Returns `Ok(None)` if the stream ends before the first byte, and
    /// `DecodeError::UnexpectedEof` if it ends after the first byte.
    pub fn read_varint_or_eof(&mut self) -> Result<Option<u64>, DecodeError> {
        let mut result: u64 = 0;
        let mut shift: u32 = 0;

        for i in 0..MAX_VARINT_LEN {
            let byte = match self.read_byte()? {
                Some(b) => b,
                None if i == 0 => return Ok(None),
                None => return Err(DecodeError::UnexpectedEof),
            };

            result |= ((byte & 0x7F) as u64) << shift;
            if byte & 0x80 == 0 {
                return Ok(Some(result));
            }
            shift += 7;
        }

        Err(DecodeError::InvalidVarint)
    }

    /// Read a zigzag long, `Ok(None)` on a clean end of stream.
    pub fn read_long_or_eof(&mut self) -> Result<Option<i64>, DecodeError> {
        Ok(self.read_varint_or_eof()?.map(zigzag_to_signed))
    }

    /// Read a zigzag long; end of stream is an error.
    pub fn read_long(&mut self) -> Result<i64, DecodeError> {
        self.read_long_or_eof()?.ok_or(DecodeError::UnexpectedEof)
    }

    /// Fill `buf` completely.
    ///
    /// Unlike `Read::read_exact`, the offset reflects every byte that was
    /// actually consumed even when the stream ends early.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), DecodeError> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => return Err(DecodeError::UnexpectedEof),
                Ok(n) => {
                    filled += n;
                    self.offset += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(DecodeError::Io(e)),
            }
        }
        Ok(())
    }

    /// Read exactly `len` bytes into a new buffer.
    ///
    /// The buffer grows with the data actually read, so a corrupted length
    /// prefix near the end of a file fails with `UnexpectedEof` instead of
    /// allocating the declared size up front.
    pub fn read_vec(&mut self, len: usize) -> Result<Vec<u8>, DecodeError> {
        let mut buf = Vec::new();
        let read = (&mut self.inner)
            .take(len as u64)
            .read_to_end(&mut buf)
            .map_err(DecodeError::Io)?;
        self.offset += read as u64;

        if read < len {
            return Err(DecodeError::UnexpectedEof);
        }
        Ok(buf)
    }

    /// Read Avro `bytes`: a long length followed by that many bytes.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>, DecodeError> {
        let len = self.read_long()?;
        if len < 0 {
            return Err(DecodeError::InvalidData(format!(
                "Negative length for bytes: {}",
                len
            )));
        }
        self.read_vec(len as usize)
    }

    /// Read an Avro `string`.
    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes).map_err(DecodeError::InvalidUtf8)
    }
}

/// Lift a framing read failure into a reader error at `offset`.
///
/// A stream that ends inside a value is a truncated file, an underlying
/// read failure stays an I/O error, and anything else is malformed framing.
pub(crate) fn framing_error(err: DecodeError, offset: u64, what: &str) -> ReaderError {
    match err {
        DecodeError::UnexpectedEof => ReaderError::Truncated {
            offset,
            message: format!("stream ended while reading {}", what),
        },
        DecodeError::Io(source) => ReaderError::Io { offset, source },
        other => ReaderError::Parse {
            offset,
            message: format!("Failed to decode {}: {}", what, other),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::super::varint::encode_zigzag;
    use super::*;

    fn tracked(bytes: &[u8]) -> TrackedReader<&[u8]> {
        TrackedReader::new(bytes)
    }

    #[test]
    fn test_read_varint_clean_eof() {
        let mut reader = tracked(&[]);
        assert!(reader.read_varint_or_eof().unwrap().is_none());
        assert_eq!(reader.offset(), 0);
    }

    #[test]
    fn test_read_varint_truncated() {
        let mut reader = tracked(&[0x80, 0x80]);
        assert!(matches!(
            reader.read_varint_or_eof(),
            Err(DecodeError::UnexpectedEof)
        ));
        assert_eq!(reader.offset(), 2);
    }

    #[test]
    fn test_read_long_sequence() {
        let mut data = encode_zigzag(-3);
        data.extend(encode_zigzag(1_000_000));
        let mut reader = tracked(&data);
        assert_eq!(reader.read_long().unwrap(), -3);
        assert_eq!(reader.offset(), 1);
        assert_eq!(reader.read_long().unwrap(), 1_000_000);
        assert_eq!(reader.offset(), data.len() as u64);
        assert!(matches!(reader.read_long(), Err(DecodeError::UnexpectedEof)));
    }

    #[test]
    fn test_read_exact_partial_tracks_offset() {
        let mut reader = tracked(&[1, 2, 3]);
        let mut buf = [0u8; 5];
        assert!(matches!(
            reader.read_exact(&mut buf),
            Err(DecodeError::UnexpectedEof)
        ));
        assert_eq!(reader.offset(), 3);
    }

    #[test]
    fn test_read_vec_huge_length_does_not_preallocate() {
        let mut reader = tracked(&[9, 9, 9]);
        assert!(matches!(
            reader.read_vec(usize::MAX / 2),
            Err(DecodeError::UnexpectedEof)
        ));
        assert_eq!(reader.offset(), 3);
    }

    #[test]
    fn test_read_string() {
        let mut reader = tracked(&[0x0A, b'h', b'e', b'l', b'l', b'o']);
        assert_eq!(reader.read_string().unwrap(), "hello");
        assert_eq!(reader.offset(), 6);
    }

    #[test]
    fn test_read_bytes_negative_length() {
        let mut reader = tracked(&[0x01]);
        assert!(matches!(
            reader.read_bytes(),
            Err(DecodeError::InvalidData(_))
        ));
    }

    #[test]
    fn test_framing_error_mapping() {
        assert!(matches!(
            framing_error(DecodeError::UnexpectedEof, 7, "sync marker"),
            ReaderError::Truncated { offset: 7, .. }
        ));
        assert!(matches!(
            framing_error(DecodeError::InvalidVarint, 3, "block count"),
            ReaderError::Parse { offset: 3, .. }
        ));
        let io = io::Error::new(io::ErrorKind::BrokenPipe, "gone");
        assert!(matches!(
            framing_error(DecodeError::Io(io), 9, "block payload"),
            ReaderError::Io { offset: 9, .. }
        ));
    }

    #[test]
    fn test_read_string_invalid_utf8() {
        let mut reader = tracked(&[0x04, 0xC3, 0x28]);
        assert!(matches!(
            reader.read_string(),
            Err(DecodeError::InvalidUtf8(_))
        ));
    }
}
