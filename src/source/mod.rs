//! Data sources for reading Avro container files
//!
//! The container reader works over any `std::io::Read`. `LocalSource` is
//! the filesystem implementation used when opening a path.

mod local;

pub use local::{LocalSource, DEFAULT_BUFFER_SIZE};
