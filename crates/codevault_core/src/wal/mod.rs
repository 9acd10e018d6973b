//! Write-Ahead Log (WAL) for atomic, durable commits.
//!
//! The WAL is the only persistent copy of a store's records. Every
//! transaction is appended as one contiguous batch and becomes visible only
//! once its `Commit` marker is durable; on open the log is replayed to
//! rebuild every collection and index.
//!
//! ## WAL Record Format
//!
//! ```text
//! | magic (4) | version (2) | type (1) | length (4) | payload (N) | crc32 (4) |
//! ```
//!
//! ## Recovery Policy
//!
//! Tolerated (treated as a clean end of log, the tail is cut off):
//!
//! - **Truncated header**: fewer than 11 bytes left
//! - **Truncated payload**: the length field runs past the end of the log
//!
//! Fatal (open fails):
//!
//! - **CRC mismatch**
//! - **Invalid magic bytes**
//! - **Unknown record type** or **future format version**
//!
//! ## Invariants
//!
//! - The WAL is append-only between checkpoints
//! - A transaction without a `Commit` record is never replayed
//! - Replay applies committed transactions in log order

mod iterator;
mod record;
mod writer;

pub use iterator::WalRecordIterator;
pub use record::{WalRecord, WalRecordType};
pub use writer::WalManager;
