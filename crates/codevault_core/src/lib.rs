//! # CodeVault Core
//!
//! Embedded persistence layer for a code editor.
//!
//! This crate provides:
//! - WAL (Write-Ahead Log) for durability
//! - Transaction management with multi-collection atomic commits
//! - Collections with primary keys and composite BTree indexes
//! - Versioned code documents with an append-only revision history
//! - Snippet library, settings, import/export and stats
//!
//! Most callers only need [`CodeVault`]:
//!
//! ```rust,ignore
//! use codevault_core::{CodeVault, SaveOptions};
//!
//! let vault = CodeVault::open(Path::new("store"))?;
//! let record = vault.save_code("js", "print(1)", &SaveOptions::new().filename("a"))?;
//! let history = vault.get_history("js", Some("a"), 10)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod code;
mod collection;
mod config;
mod database;
mod dir;
mod error;
mod history;
mod index;
mod manifest;
mod model;
mod schema;
mod settings;
mod snippets;
mod stats;
mod transaction;
mod transfer;
mod types;
mod upgrade;
mod vault;
mod wal;

pub use clock::{Clock, ManualClock, SystemClock};
pub use collection::{Catalog, CollectionSchema, CollectionStore};
pub use config::Config;
pub use database::Database;
pub use dir::DatabaseDir;
pub use error::{CoreError, CoreResult};
pub use index::{BTreeIndex, CompositeKey, Direction, IndexSpec, IndexValue, KeyRange};
pub use manifest::{Manifest, ManifestCollection};
pub use model::{CodeRecord, HistoryEntry, SaveOptions, Setting, Snippet};
pub use schema::{bootstrap, DEFAULT_HISTORY_LIMIT, DEFAULT_STORE_NAME, SCHEMA_VERSION};
pub use stats::{CollectionStats, Stats};
pub use transaction::{Transaction, TransactionManager, TransactionMode};
pub use transfer::{ExportDocument, ExportMeta};
pub use types::{CollectionId, RecordKey, SequenceNumber, TransactionId};
pub use upgrade::SchemaBuilder;
pub use vault::{CodeVault, CollectionNames, StoreOptions};
pub use wal::{WalRecord, WalRecordIterator, WalRecordType};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
