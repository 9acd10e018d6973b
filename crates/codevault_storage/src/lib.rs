//! # CodeVault Storage
//!
//! Byte-store backends for the CodeVault write-ahead log.
//!
//! A backend is an **opaque, append-only byte store**. It knows nothing about
//! WAL records, collections or documents; `codevault_core` owns every byte
//! format written here.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - ephemeral stores and tests
//! - [`FileBackend`] - persistent storage on the local file system
//!
//! ## Example
//!
//! ```rust
//! use codevault_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"hello world").unwrap();
//! let data = backend.read_at(offset, 11).unwrap();
//! assert_eq!(&data, b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
