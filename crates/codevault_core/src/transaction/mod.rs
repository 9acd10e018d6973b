//! Transaction management.
//!
//! CodeVault transactions provide:
//! - **Atomicity**: all staged writes reach the WAL in one batch behind a
//!   single commit marker, or none do
//! - **Read-your-writes**: reads inside a transaction see its staged writes
//! - **Isolation**: one writer at a time; readers see committed state only
//! - **Durability**: the WAL is flushed (and synced) before a commit returns

mod manager;
mod state;

pub use manager::TransactionManager;
pub(crate) use state::{decode_all, scan_committed};
pub use state::{Transaction, TransactionMode};
