//! Backend errors.

use std::io;
use thiserror::Error;

/// Result alias used by every backend.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The underlying file or device failed.
    #[error("storage I/O failed: {0}")]
    Io(#[from] io::Error),

    /// A read reached past the stored bytes.
    #[error("read of {len} bytes at offset {offset} exceeds stored size {size}")]
    ReadPastEnd {
        /// Offset of the read.
        offset: u64,
        /// Bytes requested.
        len: usize,
        /// Bytes stored.
        size: u64,
    },

    /// A truncate asked to grow the store.
    #[error("cannot truncate to {requested} bytes, storage holds {size}")]
    TruncateBeyondEnd {
        /// Size asked for.
        requested: u64,
        /// Bytes stored.
        size: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_sizes() {
        let err = StorageError::ReadPastEnd {
            offset: 10,
            len: 4,
            size: 12,
        };
        assert_eq!(
            err.to_string(),
            "read of 4 bytes at offset 10 exceeds stored size 12"
        );

        let err: StorageError = io::Error::new(io::ErrorKind::Other, "disk gone").into();
        assert!(err.to_string().contains("disk gone"));
    }
}
