//! Local filesystem source implementation
//!
//! Provides buffered blocking reads of an Avro file from the local
//! filesystem.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use crate::error::SourceError;

/// Default read buffer capacity
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// A data source for reading from the local filesystem.
///
/// The file handle is owned by the source and released when the source
/// is dropped.
pub struct LocalSource {
    file: BufReader<File>,
    /// Path to the file (for error reporting)
    path: PathBuf,
}

impl LocalSource {
    /// Open a local file with the default buffer size.
    ///
    /// # Errors
    /// Returns `SourceError::NotFound` if the file doesn't exist.
    /// Returns `SourceError::PermissionDenied` if access is denied.
    /// Returns `SourceError::Io` for other I/O errors.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        Self::open_with_buffer_size(path, DEFAULT_BUFFER_SIZE)
    }

    /// Open a local file with a read buffer of `buffer_size` bytes.
    pub fn open_with_buffer_size<P: AsRef<Path>>(
        path: P,
        buffer_size: usize,
    ) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();

        let file = File::open(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => SourceError::NotFound(path.clone()),
            io::ErrorKind::PermissionDenied => SourceError::PermissionDenied(path.clone()),
            _ => SourceError::Io {
                path: path.clone(),
                source: e,
            },
        })?;

        let metadata = file.metadata().map_err(|e| SourceError::Io {
            path: path.clone(),
            source: e,
        })?;

        // Opening a directory succeeds on some platforms; reading it does not
        if metadata.is_dir() {
            return Err(SourceError::Io {
                path,
                source: io::Error::new(io::ErrorKind::InvalidInput, "is a directory"),
            });
        }

        Ok(Self {
            file: BufReader::with_capacity(buffer_size.max(1), file),
            path,
        })
    }
}

impl Read for LocalSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl std::fmt::Debug for LocalSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSource")
            .field("path", &self.path)
            .field("buffered", &self.file.buffer().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_open_and_read() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"Obj\x01rest").unwrap();
        temp.flush().unwrap();

        let mut source = LocalSource::open_with_buffer_size(temp.path(), 2).unwrap();

        let mut contents = Vec::new();
        source.read_to_end(&mut contents).unwrap();
        assert_eq!(contents, b"Obj\x01rest");
    }

    #[test]
    fn test_open_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.avro");
        match LocalSource::open(&missing) {
            Err(SourceError::NotFound(path)) => assert_eq!(path, missing),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_open_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(LocalSource::open(dir.path()).is_err());
    }

    #[test]
    fn test_zero_buffer_size_still_reads() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"abc").unwrap();
        temp.flush().unwrap();

        let mut source = LocalSource::open_with_buffer_size(temp.path(), 0).unwrap();
        let mut contents = String::new();
        source.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "abc");
        assert!(format!("{:?}", source).contains("LocalSource"));
    }
}
