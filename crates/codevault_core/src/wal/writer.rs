//! WAL writer and reader.

use crate::error::CoreResult;
use crate::wal::record::WalRecord;
use codevault_storage::StorageBackend;
use parking_lot::Mutex;

/// Manages WAL writes and reads.
///
/// The `WalManager` provides append-only writes to the WAL, reads the whole
/// log back for recovery and swaps in checkpoint snapshots.
pub struct WalManager {
    backend: Mutex<Box<dyn StorageBackend>>,
    sync_on_commit: bool,
}

impl WalManager {
    /// Creates a new WAL manager.
    pub fn new(backend: Box<dyn StorageBackend>, sync_on_commit: bool) -> Self {
        Self {
            backend: Mutex::new(backend),
            sync_on_commit,
        }
    }

    /// Appends a batch of records as one contiguous write and makes it
    /// durable.
    ///
    /// Returns the offset of the first record. If any step fails, the log is
    /// cut back to its previous length so that no fragment of the batch
    /// survives to be replayed. When even that fails, an `Abort` marker for
    /// the batch's transaction is appended instead.
    pub fn commit_batch(&self, records: &[WalRecord]) -> CoreResult<u64> {
        let mut data = Vec::new();
        for record in records {
            data.extend_from_slice(&record.to_bytes()?);
        }

        let mut backend = self.backend.lock();
        let start = backend.size()?;

        let result = backend.append(&data).and_then(|offset| {
            backend.flush()?;
            if self.sync_on_commit {
                backend.sync()?;
            }
            Ok(offset)
        });

        match result {
            Ok(offset) => Ok(offset),
            Err(e) => {
                if let Err(undo) = backend.truncate(start) {
                    tracing::warn!(error = %undo, offset = start, "failed to roll back partial WAL write");
                    if let Some(txid) = records.first().and_then(WalRecord::txid) {
                        let marker = WalRecord::Abort { txid }.to_bytes()?;
                        if let Err(marker_err) = backend.append(&marker).and_then(|_| backend.flush()) {
                            tracing::warn!(error = %marker_err, %txid, "failed to write abort marker");
                        }
                    }
                }
                Err(e.into())
            }
        }
    }

    /// Flushes and fsyncs the log.
    pub fn sync(&self) -> CoreResult<()> {
        let mut backend = self.backend.lock();
        backend.flush()?;
        backend.sync()?;
        Ok(())
    }

    /// Returns the current WAL size.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.lock().size()?)
    }

    /// Returns the whole WAL image.
    pub fn read_all(&self) -> CoreResult<Vec<u8>> {
        Ok(self.backend.lock().read_all()?)
    }

    /// Truncates the WAL to the specified offset.
    ///
    /// Used on open to discard a torn trailing record.
    pub fn truncate(&self, offset: u64) -> CoreResult<()> {
        self.backend.lock().truncate(offset)?;
        Ok(())
    }

    /// Atomically replaces the log with a snapshot made of `records`.
    pub fn replace_with(&self, records: &[WalRecord]) -> CoreResult<()> {
        let mut data = Vec::new();
        for record in records {
            data.extend_from_slice(&record.to_bytes()?);
        }
        let mut backend = self.backend.lock();
        backend.replace(&data)?;
        backend.sync()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CollectionId, RecordKey, SequenceNumber, TransactionId};
    use crate::wal::WalRecordIterator;
    use codevault_storage::{InMemoryBackend, StorageError, StorageResult};
    use std::io;

    /// Rejects every write, including the rollback truncate.
    struct BrokenDisk;

    fn disk_error() -> StorageError {
        io::Error::new(io::ErrorKind::Other, "disk full").into()
    }

    impl StorageBackend for BrokenDisk {
        fn read_at(&self, _offset: u64, _len: usize) -> StorageResult<Vec<u8>> {
            Ok(Vec::new())
        }
        fn append(&mut self, _data: &[u8]) -> StorageResult<u64> {
            Err(disk_error())
        }
        fn flush(&mut self) -> StorageResult<()> {
            Err(disk_error())
        }
        fn sync(&mut self) -> StorageResult<()> {
            Err(disk_error())
        }
        fn size(&self) -> StorageResult<u64> {
            Ok(0)
        }
        fn truncate(&mut self, _new_size: u64) -> StorageResult<()> {
            Err(disk_error())
        }
        fn replace(&mut self, _data: &[u8]) -> StorageResult<()> {
            Err(disk_error())
        }
    }

    fn put(txid: u64, key: u64) -> WalRecord {
        WalRecord::Put {
            txid: TransactionId::new(txid),
            collection_id: CollectionId::new(1),
            key: RecordKey::Int(key),
            payload: b"{}".to_vec(),
        }
    }

    fn records(wal: &WalManager) -> Vec<WalRecord> {
        let data = wal.read_all().unwrap();
        WalRecordIterator::new(&data)
            .map(|r| r.unwrap().1)
            .collect()
    }

    #[test]
    fn commit_batch_appends_in_order() {
        let wal = WalManager::new(Box::new(InMemoryBackend::new()), false);
        let batch = vec![
            WalRecord::Begin {
                txid: TransactionId::new(1),
            },
            put(1, 1),
            WalRecord::Commit {
                txid: TransactionId::new(1),
                sequence: SequenceNumber::new(1),
            },
        ];
        assert_eq!(wal.commit_batch(&batch).unwrap(), 0);
        assert_eq!(records(&wal), batch);
    }

    #[test]
    fn replace_with_snapshot() {
        let wal = WalManager::new(Box::new(InMemoryBackend::new()), true);
        wal.commit_batch(&[put(1, 1), put(2, 2)]).unwrap();

        let snapshot = vec![WalRecord::Checkpoint {
            sequence: SequenceNumber::new(2),
            generators: vec![(CollectionId::new(1), 3)],
        }];
        wal.replace_with(&snapshot).unwrap();
        assert_eq!(records(&wal), snapshot);
    }

    #[test]
    fn truncate_discards_tail() {
        let wal = WalManager::new(Box::new(InMemoryBackend::new()), false);
        wal.commit_batch(&[put(1, 1)]).unwrap();
        let second = wal.commit_batch(&[put(2, 2)]).unwrap();
        wal.truncate(second).unwrap();
        assert_eq!(records(&wal), vec![put(1, 1)]);
    }

    #[test]
    fn failed_commit_reports_the_write_error() {
        let wal = WalManager::new(Box::new(BrokenDisk), true);
        let batch = [
            WalRecord::Begin {
                txid: TransactionId::new(3),
            },
            put(3, 1),
        ];
        let err = wal.commit_batch(&batch).unwrap_err();
        assert!(err.to_string().contains("disk full"));
    }
}
