//! Transaction manager.

use crate::collection::Catalog;
use crate::error::{CoreError, CoreResult};
use crate::transaction::state::{Overlay, Transaction, TransactionMode};
use crate::types::{CollectionId, SequenceNumber, TransactionId};
use crate::wal::{WalManager, WalRecord};
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Manages transactions over the committed catalog.
///
/// The transaction manager provides:
/// - Single-writer concurrency control: a read-write transaction holds the
///   write lock from `begin` until it commits or is dropped
/// - WAL-based durability: a transaction is logged as one contiguous batch
///   ending in its `Commit` marker before anything becomes visible
/// - Commit ordering via sequence numbers
/// - Checkpoints that compact the WAL into a snapshot
pub struct TransactionManager {
    wal: WalManager,
    catalog: RwLock<Catalog>,
    write_lock: Mutex<()>,
    next_txid: AtomicU64,
    next_seq: AtomicU64,
    committed_seq: AtomicU64,
    max_wal_size: u64,
}

impl TransactionManager {
    /// Creates a transaction manager initialized from recovery state.
    pub(crate) fn with_state(
        wal: WalManager,
        catalog: Catalog,
        next_txid: u64,
        committed_seq: u64,
        max_wal_size: u64,
    ) -> Self {
        Self {
            wal,
            catalog: RwLock::new(catalog),
            write_lock: Mutex::new(()),
            next_txid: AtomicU64::new(next_txid),
            next_seq: AtomicU64::new(committed_seq + 1),
            committed_seq: AtomicU64::new(committed_seq),
            max_wal_size,
        }
    }

    pub(crate) fn catalog(&self) -> &RwLock<Catalog> {
        &self.catalog
    }

    pub(crate) fn wal(&self) -> &WalManager {
        &self.wal
    }

    /// Acquires the single-writer lock.
    pub(crate) fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock()
    }

    fn allocate_txid(&self) -> TransactionId {
        TransactionId::new(self.next_txid.fetch_add(1, Ordering::SeqCst))
    }

    /// Begins a transaction scoped to `collections`.
    ///
    /// A read-write transaction blocks until the previous writer finishes.
    pub fn begin(
        &self,
        collections: &[&str],
        mode: TransactionMode,
    ) -> CoreResult<Transaction<'_>> {
        if collections.is_empty() {
            return Err(CoreError::invalid_operation(
                "a transaction must name at least one collection",
            ));
        }

        let resolve = |catalog: &Catalog| -> CoreResult<HashMap<String, CollectionId>> {
            collections
                .iter()
                .map(|name| Ok(((*name).to_string(), catalog.resolve(name)?)))
                .collect()
        };

        let txn = match mode {
            TransactionMode::ReadOnly => {
                let guard = self.catalog.read();
                let scope = resolve(&*guard)?;
                Transaction::new_shared(self, guard, self.allocate_txid(), scope)
            }
            TransactionMode::ReadWrite => {
                let guard = self.write_lock.lock();
                let scope = resolve(&*self.catalog.read())?;
                Transaction::new_exclusive(self, guard, self.allocate_txid(), scope)
            }
        };
        Ok(txn)
    }

    /// Commits a transaction.
    ///
    /// 1. Refuse if any write failed
    /// 2. Append `Begin`, the staged writes and `Commit` to the WAL and make
    ///    them durable
    /// 3. Apply the writes to the committed collections and indexes
    /// 4. Checkpoint if the WAL has outgrown `max_wal_size`
    pub(crate) fn commit(&self, mut txn: Transaction<'_>) -> CoreResult<SequenceNumber> {
        let txid = txn.id();

        if let Some(reason) = txn.failure.take() {
            tracing::warn!(%txid, %reason, "refusing to commit failed transaction");
            return Err(CoreError::transaction_aborted(reason));
        }

        let writes: Vec<(CollectionId, Overlay)> = std::mem::take(&mut txn.overlays)
            .into_iter()
            .filter(|(_, overlay)| !overlay.is_empty())
            .collect();
        if writes.is_empty() {
            return Ok(self.committed_seq());
        }

        let sequence = SequenceNumber::new(self.next_seq.fetch_add(1, Ordering::SeqCst));
        let records = match log_records(txid, sequence, &writes) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(%txid, error = %e, "transaction aborted");
                return Err(CoreError::transaction_aborted(e.to_string()));
            }
        };

        if let Err(e) = self.wal.commit_batch(&records) {
            tracing::warn!(%txid, error = %e, "WAL append failed, transaction aborted");
            return Err(CoreError::transaction_aborted(format!("WAL write failed: {e}")));
        }

        {
            let mut catalog = self.catalog.write();
            for (id, overlay) in writes {
                let store = catalog.store_mut(id)?;
                if overlay.cleared {
                    store.apply_clear();
                }
                for (key, write) in overlay.writes {
                    match write {
                        Some(value) => store.apply_put(key, value),
                        None => {
                            store.apply_delete(&key);
                        }
                    }
                }
            }
        }

        self.committed_seq.store(sequence.as_u64(), Ordering::SeqCst);
        tracing::debug!(%txid, %sequence, records = records.len(), "transaction committed");

        // `txn` still holds the writer lock here.
        if self.max_wal_size > 0 {
            match self.wal.size() {
                Ok(size) if size > self.max_wal_size => {
                    if let Err(e) = self.checkpoint_locked() {
                        tracing::warn!(error = %e, "automatic checkpoint failed");
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "could not read WAL size"),
            }
        }

        drop(txn);
        Ok(sequence)
    }

    /// Returns the current committed sequence number.
    #[must_use]
    pub fn committed_seq(&self) -> SequenceNumber {
        SequenceNumber::new(self.committed_seq.load(Ordering::SeqCst))
    }

    /// Rewrites the WAL as a snapshot of the committed state.
    pub fn checkpoint(&self) -> CoreResult<SequenceNumber> {
        let _writer = self.write_lock.lock();
        self.checkpoint_locked()
    }

    /// Checkpoint body; the caller holds the writer lock.
    ///
    /// The snapshot is a `Checkpoint` record carrying the key generators,
    /// followed by one committed transaction that puts every live record.
    fn checkpoint_locked(&self) -> CoreResult<SequenceNumber> {
        let sequence = self.committed_seq();
        let before = self.wal.size()?;

        let mut catalog = self.catalog.write();
        let generators = catalog
            .stores()
            .filter(|store| store.schema().auto_increment)
            .map(|store| (store.id(), store.next_key()))
            .collect();

        let txid = self.allocate_txid();
        let mut body = Vec::new();
        for store in catalog.stores() {
            for (key, value) in store.iter() {
                body.push(WalRecord::Put {
                    txid,
                    collection_id: store.id(),
                    key: key.clone(),
                    payload: serde_json::to_vec(value)?,
                });
            }
        }

        let mut records = Vec::with_capacity(body.len() + 3);
        records.push(WalRecord::Checkpoint {
            sequence,
            generators,
        });
        if !body.is_empty() {
            records.push(WalRecord::Begin { txid });
            records.append(&mut body);
            records.push(WalRecord::Commit { txid, sequence });
        }

        self.wal.replace_with(&records)?;
        catalog.set_last_checkpoint(sequence.as_u64());

        tracing::info!(
            %sequence,
            wal_before = before,
            wal_after = self.wal.size().unwrap_or(0),
            "checkpoint complete"
        );
        Ok(sequence)
    }
}

/// Encodes a transaction's staged writes as its WAL batch.
fn log_records(
    txid: TransactionId,
    sequence: SequenceNumber,
    writes: &[(CollectionId, Overlay)],
) -> CoreResult<Vec<WalRecord>> {
    let mut records = vec![WalRecord::Begin { txid }];
    for (collection_id, overlay) in writes {
        let collection_id = *collection_id;
        if overlay.cleared {
            records.push(WalRecord::Clear {
                txid,
                collection_id,
            });
        }
        for (key, write) in &overlay.writes {
            records.push(match write {
                Some(value) => WalRecord::Put {
                    txid,
                    collection_id,
                    key: key.clone(),
                    payload: serde_json::to_vec(value)?,
                },
                None => WalRecord::Delete {
                    txid,
                    collection_id,
                    key: key.clone(),
                },
            });
        }
    }
    records.push(WalRecord::Commit { txid, sequence });
    Ok(records)
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("committed_seq", &self.committed_seq())
            .field("max_wal_size", &self.max_wal_size)
            .finish_non_exhaustive()
    }
}
