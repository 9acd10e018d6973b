//! Database facade and recovery.

use crate::collection::Catalog;
use crate::config::Config;
use crate::dir::DatabaseDir;
use crate::error::{CoreError, CoreResult};
use crate::index::{BTreeIndex, Direction, KeyRange};
use crate::manifest::{Manifest, ManifestCollection};
use crate::transaction::{decode_all, scan_committed, Transaction, TransactionManager, TransactionMode};
use crate::types::{CollectionId, RecordKey, SequenceNumber, TransactionId};
use crate::upgrade::SchemaBuilder;
use crate::wal::{WalManager, WalRecord, WalRecordIterator};
use codevault_storage::{FileBackend, InMemoryBackend, StorageBackend};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

/// Where the manifest lives.
enum ManifestStore {
    /// `MANIFEST` inside a locked store directory.
    Dir(DatabaseDir),
    /// A caller-supplied backend holding only the encoded manifest.
    Backend(Mutex<Box<dyn StorageBackend>>),
}

impl ManifestStore {
    fn load(&self) -> CoreResult<Option<Manifest>> {
        match self {
            Self::Dir(dir) => dir.load_manifest(),
            Self::Backend(backend) => {
                let data = backend.lock().read_all()?;
                if data.is_empty() {
                    Ok(None)
                } else {
                    Manifest::decode(&data).map(Some)
                }
            }
        }
    }

    fn save(&self, manifest: &Manifest) -> CoreResult<()> {
        match self {
            Self::Dir(dir) => dir.save_manifest(manifest),
            Self::Backend(backend) => {
                let data = manifest.encode()?;
                let mut backend = backend.lock();
                backend.replace(&data)?;
                backend.sync()?;
                Ok(())
            }
        }
    }
}

/// The main database handle.
///
/// `Database` is the storage engine under the vault: named collections of
/// JSON records, each with a primary key and any number of secondary BTree
/// indexes, changed through atomic multi-collection transactions and
/// persisted through a write-ahead log.
///
/// # Opening a Database
///
/// ```rust,ignore
/// use codevault_core::{Database, TransactionMode};
/// use serde_json::json;
///
/// let db = Database::open(Path::new("my_store"))?;
/// db.transact(&["code", "history"], TransactionMode::ReadWrite, |txn| {
///     txn.put("code", json!({"id": "js:main", "code": "print(1)"}))?;
///     txn.add("history", json!({"lang": "js", "code": "print(1)"}))?;
///     Ok(())
/// })?;
/// db.close()?;
/// ```
///
/// # In-Memory Databases
///
/// For testing, use `Database::open_in_memory()`, or
/// `Database::open_with_backends()` with shared [`InMemoryBackend`] clones to
/// simulate a reopen.
pub struct Database {
    config: Config,
    manager: TransactionManager,
    manifest_store: ManifestStore,
    is_open: AtomicBool,
}

impl Database {
    /// Opens a store directory with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Another process has the store locked (`DatabaseLocked`)
    /// - The store format is incompatible (`InvalidFormat`)
    /// - The WAL is corrupted (`WalCorruption`, `ChecksumMismatch`)
    /// - I/O errors occur
    pub fn open(path: &Path) -> CoreResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens a store directory with custom configuration.
    pub fn open_with_config(path: &Path, config: Config) -> CoreResult<Self> {
        let dir = DatabaseDir::open(path, config.create_if_missing)?;

        if !config.create_if_missing && dir.is_new_database() {
            return Err(CoreError::invalid_format(
                "store does not exist and create_if_missing is false",
            ));
        }
        if config.error_if_exists && !dir.is_new_database() {
            return Err(CoreError::invalid_format(
                "store already exists and error_if_exists is true",
            ));
        }

        let wal_backend = FileBackend::open_with_create_dirs(&dir.wal_path())?;
        tracing::info!(path = %path.display(), "opening store");
        Self::assemble(config, ManifestStore::Dir(dir), Box::new(wal_backend))
    }

    /// Opens a database over caller-supplied backends.
    ///
    /// `wal_backend` receives the write-ahead log and `manifest_backend` the
    /// encoded manifest. No directory lock is taken.
    pub fn open_with_backends(
        config: Config,
        wal_backend: Box<dyn StorageBackend>,
        manifest_backend: Box<dyn StorageBackend>,
    ) -> CoreResult<Self> {
        Self::assemble(
            config,
            ManifestStore::Backend(Mutex::new(manifest_backend)),
            wal_backend,
        )
    }

    /// Opens a fresh in-memory database.
    ///
    /// Data is lost when the database is dropped.
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::open_with_backends(
            Config::default(),
            Box::new(InMemoryBackend::new()),
            Box::new(InMemoryBackend::new()),
        )
    }

    fn assemble(
        config: Config,
        manifest_store: ManifestStore,
        wal_backend: Box<dyn StorageBackend>,
    ) -> CoreResult<Self> {
        let manifest = match manifest_store.load()? {
            Some(manifest) => {
                if manifest.format_version.0 != config.format_version.0 {
                    return Err(CoreError::invalid_format(format!(
                        "incompatible format version: store is v{}.{}, expected v{}.{}",
                        manifest.format_version.0,
                        manifest.format_version.1,
                        config.format_version.0,
                        config.format_version.1
                    )));
                }
                manifest
            }
            None => {
                let manifest = Manifest::new(config.format_version);
                manifest_store.save(&manifest)?;
                manifest
            }
        };

        let catalog = Catalog::from_manifest(&manifest)?;
        let wal = WalManager::new(wal_backend, config.sync_on_commit);
        let recovered = recover(&wal, catalog)?;

        let manager = TransactionManager::with_state(
            wal,
            recovered.catalog,
            recovered.next_txid,
            recovered.committed_seq,
            config.max_wal_size,
        );

        Ok(Self {
            config,
            manager,
            manifest_store,
            is_open: AtomicBool::new(true),
        })
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Begins a transaction over `collections`.
    ///
    /// Prefer [`transact`](Self::transact), which commits or rolls back for
    /// you.
    pub fn begin(
        &self,
        collections: &[&str],
        mode: TransactionMode,
    ) -> CoreResult<Transaction<'_>> {
        self.ensure_open()?;
        self.manager.begin(collections, mode)
    }

    /// Runs `body` inside a transaction.
    ///
    /// If `body` returns `Ok`, the transaction is committed. If it returns
    /// `Err`, every staged write is discarded and the error is returned,
    /// except that a failed write inside the body always surfaces as
    /// `TransactionAborted`.
    pub fn transact<F, T>(&self, collections: &[&str], mode: TransactionMode, body: F) -> CoreResult<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> CoreResult<T>,
    {
        let mut txn = self.begin(collections, mode)?;
        match body(&mut txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(err) => {
                let txid = txn.id();
                let failure = txn.failure().map(str::to_string);
                txn.abort();
                tracing::warn!(%txid, error = %err, "transaction aborted");
                Err(match failure {
                    Some(reason) if !err.is_transaction_aborted() => {
                        CoreError::transaction_aborted(reason)
                    }
                    _ => err,
                })
            }
        }
    }

    // ========================================================================
    // Committed reads
    // ========================================================================

    /// Gets a record by primary key.
    pub fn get(&self, collection: &str, key: &RecordKey) -> CoreResult<Option<Value>> {
        self.ensure_open()?;
        let catalog = self.manager.catalog().read();
        Ok(catalog.store_by_name(collection)?.get(key).cloned())
    }

    /// Gets every record of a collection in primary-key order.
    pub fn get_all(&self, collection: &str) -> CoreResult<Vec<Value>> {
        self.ensure_open()?;
        let catalog = self.manager.catalog().read();
        Ok(catalog
            .store_by_name(collection)?
            .iter()
            .map(|(_, value)| value.clone())
            .collect())
    }

    /// Counts the records of a collection.
    pub fn count(&self, collection: &str) -> CoreResult<usize> {
        self.ensure_open()?;
        Ok(self.manager.catalog().read().store_by_name(collection)?.len())
    }

    /// Scans a secondary index, stopping after `limit` records.
    pub fn scan_index(
        &self,
        collection: &str,
        index: &str,
        range: &KeyRange,
        direction: Direction,
        limit: Option<usize>,
    ) -> CoreResult<Vec<Value>> {
        self.ensure_open()?;
        let catalog = self.manager.catalog().read();
        scan_committed(catalog.store_by_name(collection)?, index, range, direction, limit)
    }

    /// Gets a record and deserializes it.
    pub fn get_as<T: DeserializeOwned>(
        &self,
        collection: &str,
        key: &RecordKey,
    ) -> CoreResult<Option<T>> {
        self.get(collection, key)?
            .map(serde_json::from_value)
            .transpose()
            .map_err(Into::into)
    }

    /// Gets and deserializes every record of a collection.
    pub fn get_all_as<T: DeserializeOwned>(&self, collection: &str) -> CoreResult<Vec<T>> {
        decode_all(self.get_all(collection)?)
    }

    /// Scans an index and deserializes the records.
    pub fn scan_index_as<T: DeserializeOwned>(
        &self,
        collection: &str,
        index: &str,
        range: &KeyRange,
        direction: Direction,
        limit: Option<usize>,
    ) -> CoreResult<Vec<T>> {
        decode_all(self.scan_index(collection, index, range, direction, limit)?)
    }

    // ========================================================================
    // Single-operation writes
    // ========================================================================

    /// Inserts or replaces one record in its own transaction.
    pub fn put(&self, collection: &str, record: Value) -> CoreResult<RecordKey> {
        self.transact(&[collection], TransactionMode::ReadWrite, |txn| {
            txn.put(collection, record)
        })
    }

    /// Inserts one new record in its own transaction.
    pub fn add(&self, collection: &str, record: Value) -> CoreResult<RecordKey> {
        self.transact(&[collection], TransactionMode::ReadWrite, |txn| {
            txn.add(collection, record)
        })
    }

    /// Serializes and stores one record in its own transaction.
    pub fn put_as<T: Serialize>(&self, collection: &str, record: &T) -> CoreResult<RecordKey> {
        self.transact(&[collection], TransactionMode::ReadWrite, |txn| {
            txn.put_as(collection, record)
        })
    }

    /// Serializes and inserts one new record in its own transaction.
    pub fn add_as<T: Serialize>(&self, collection: &str, record: &T) -> CoreResult<RecordKey> {
        self.transact(&[collection], TransactionMode::ReadWrite, |txn| {
            txn.add_as(collection, record)
        })
    }

    /// Deletes one record. Returns whether it existed.
    pub fn delete(&self, collection: &str, key: &RecordKey) -> CoreResult<bool> {
        self.transact(&[collection], TransactionMode::ReadWrite, |txn| {
            txn.delete(collection, key)
        })
    }

    /// Removes every record of a collection.
    pub fn clear(&self, collection: &str) -> CoreResult<()> {
        self.transact(&[collection], TransactionMode::ReadWrite, |txn| {
            txn.clear(collection)
        })
    }

    // ========================================================================
    // Schema
    // ========================================================================

    /// Brings the schema to `version` through additive changes.
    ///
    /// `upgrade` runs with the writer lock held. The new manifest is written
    /// before the in-memory catalog changes and only when something actually
    /// changed; returns whether it did.
    ///
    /// # Errors
    ///
    /// - `VersionDowngrade` if the store already holds a newer schema
    /// - `InvalidFormat` if the store was created under another name
    /// - `ConstraintViolation` if a new unique index clashes with existing
    ///   records
    pub fn upgrade<F>(&self, store_name: &str, version: u32, f: F) -> CoreResult<bool>
    where
        F: FnOnce(&mut SchemaBuilder<'_>) -> CoreResult<()>,
    {
        self.ensure_open()?;
        let _writer = self.manager.lock_writer();
        let mut catalog = self.manager.catalog().write();

        let stored = catalog.schema_version();
        if version < stored {
            return Err(CoreError::VersionDowngrade {
                stored,
                requested: version,
            });
        }
        if !catalog.store_name().is_empty() && catalog.store_name() != store_name {
            return Err(CoreError::invalid_format(format!(
                "store is named {:?}, not {store_name:?}",
                catalog.store_name()
            )));
        }

        let plan = {
            let mut builder = SchemaBuilder::new(&catalog, stored, version);
            f(&mut builder)?;
            builder.into_plan()
        };
        let renamed = catalog.store_name() != store_name;
        if plan.is_empty() && stored == version && !renamed {
            return Ok(false);
        }

        let mut built = Vec::with_capacity(plan.indexes.len());
        for (collection, spec) in plan.indexes {
            let store = catalog.store_by_name(&collection)?;
            built.push((store.id(), BTreeIndex::build(spec, store.iter())?));
        }

        let mut manifest = catalog.to_manifest();
        manifest.store_name = store_name.to_string();
        manifest.schema_version = version;
        for schema in &plan.collections {
            manifest.collections.push(ManifestCollection {
                id: CollectionId::new(manifest.next_collection_id),
                schema: schema.clone(),
            });
            manifest.next_collection_id += 1;
        }
        for (id, index) in &built {
            if let Some(entry) = manifest.collections.iter_mut().find(|c| c.id == *id) {
                entry.schema.indexes.push(index.spec().clone());
            }
        }
        self.manifest_store.save(&manifest)?;

        let created = plan.collections.len();
        let indexed = built.len();
        for schema in plan.collections {
            catalog.create_collection(schema);
        }
        for (id, index) in built {
            catalog.store_mut(id)?.attach_index(index);
        }
        catalog.set_identity(store_name, version);

        tracing::info!(
            store = store_name,
            from = stored,
            to = version,
            collections = created,
            indexes = indexed,
            "schema upgraded"
        );
        Ok(true)
    }

    /// Names of all collections.
    #[must_use]
    pub fn collection_names(&self) -> Vec<String> {
        self.manager.catalog().read().names()
    }

    /// Logical store name recorded by the last upgrade.
    #[must_use]
    pub fn store_name(&self) -> String {
        self.manager.catalog().read().store_name().to_string()
    }

    /// Schema version recorded by the last upgrade.
    #[must_use]
    pub fn schema_version(&self) -> u32 {
        self.manager.catalog().read().schema_version()
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Rewrites the WAL as a compact snapshot of the committed state.
    pub fn checkpoint(&self) -> CoreResult<SequenceNumber> {
        self.ensure_open()?;
        let sequence = self.manager.checkpoint()?;
        let manifest = self.manager.catalog().read().to_manifest();
        self.manifest_store.save(&manifest)?;
        Ok(sequence)
    }

    /// Returns the current committed sequence number.
    #[must_use]
    pub fn committed_seq(&self) -> SequenceNumber {
        self.manager.committed_seq()
    }

    /// Returns the current WAL size in bytes.
    pub fn wal_size(&self) -> CoreResult<u64> {
        self.manager.wal().size()
    }

    /// Closes the database.
    ///
    /// Waits for the active writer, syncs the WAL and saves the manifest.
    /// Later calls return `DatabaseClosed`; closing twice is a no-op.
    pub fn close(&self) -> CoreResult<()> {
        let _writer = self.manager.lock_writer();
        if !self.is_open.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        self.manager.wal().sync()?;
        let manifest = self.manager.catalog().read().to_manifest();
        self.manifest_store.save(&manifest)?;
        tracing::info!(committed_seq = %self.committed_seq(), "store closed");
        Ok(())
    }

    /// Checks if the database is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.is_open.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(CoreError::DatabaseClosed)
        }
    }

    /// Returns database configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("is_open", &self.is_open())
            .field("committed_seq", &self.committed_seq())
            .field("collections", &self.collection_names())
            .finish_non_exhaustive()
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "failed to close store cleanly");
        }
    }
}

// ============================================================================
// Recovery
// ============================================================================

struct Recovered {
    catalog: Catalog,
    next_txid: u64,
    committed_seq: u64,
}

/// Rebuilds every collection by replaying committed transactions.
///
/// A torn trailing record is cut off the log. A transaction is applied when
/// its `Commit` record is reached, unless an `Abort` marker for it appears
/// anywhere in the log; transactions still open at the end are discarded.
fn recover(wal: &WalManager, mut catalog: Catalog) -> CoreResult<Recovered> {
    let data = wal.read_all()?;
    let mut iter = WalRecordIterator::new(&data);
    let records: Vec<(u64, WalRecord)> = iter.by_ref().collect::<CoreResult<_>>()?;

    if let Some(offset) = iter.torn_tail() {
        tracing::warn!(
            offset,
            discarded = data.len() as u64 - offset,
            "truncating torn WAL tail"
        );
        wal.truncate(offset)?;
    }

    let aborted: HashSet<TransactionId> = records
        .iter()
        .filter_map(|(_, record)| match record {
            WalRecord::Abort { txid } => Some(*txid),
            _ => None,
        })
        .collect();

    let mut pending: HashMap<TransactionId, Vec<WalRecord>> = HashMap::new();
    let mut max_txid = 0u64;
    let mut committed_seq = 0u64;
    let mut replayed = 0usize;
    let total = records.len();

    for (offset, record) in records {
        if let Some(txid) = record.txid() {
            max_txid = max_txid.max(txid.as_u64());
        }

        match &record {
            WalRecord::Begin { txid } => {
                pending.insert(*txid, Vec::new());
            }
            WalRecord::Put { txid, .. }
            | WalRecord::Delete { txid, .. }
            | WalRecord::Clear { txid, .. } => {
                let txid = *txid;
                let Some(ops) = pending.get_mut(&txid) else {
                    return Err(CoreError::wal_corruption(format!(
                        "{txid} writes at offset {offset} without a begin record"
                    )));
                };
                ops.push(record);
            }
            WalRecord::Commit { txid, sequence } => {
                committed_seq = committed_seq.max(sequence.as_u64());
                let Some(ops) = pending.remove(txid) else {
                    return Err(CoreError::wal_corruption(format!(
                        "{txid} commits at offset {offset} without a begin record"
                    )));
                };
                if aborted.contains(txid) {
                    continue;
                }
                replay(&mut catalog, ops)?;
                replayed += 1;
            }
            WalRecord::Abort { txid } => {
                pending.remove(txid);
            }
            WalRecord::Checkpoint {
                sequence,
                generators,
            } => {
                committed_seq = committed_seq.max(sequence.as_u64());
                for (collection_id, next_key) in generators {
                    store_for_replay(&mut catalog, *collection_id)?.advance_generator(*next_key);
                }
                catalog.set_last_checkpoint(sequence.as_u64());
            }
        }
    }

    if !pending.is_empty() {
        tracing::warn!(
            transactions = pending.len(),
            "discarding transactions without a commit record"
        );
    }
    tracing::info!(
        records = total,
        transactions = replayed,
        committed_seq,
        "recovery complete"
    );

    Ok(Recovered {
        catalog,
        next_txid: max_txid + 1,
        committed_seq,
    })
}

fn store_for_replay(
    catalog: &mut Catalog,
    collection_id: CollectionId,
) -> CoreResult<&mut crate::collection::CollectionStore> {
    catalog.store_mut(collection_id).map_err(|_| {
        CoreError::wal_corruption(format!("WAL references unknown collection {collection_id}"))
    })
}

fn replay(catalog: &mut Catalog, ops: Vec<WalRecord>) -> CoreResult<()> {
    for op in ops {
        match op {
            WalRecord::Put {
                collection_id,
                key,
                payload,
                ..
            } => {
                let value: Value = serde_json::from_slice(&payload).map_err(|e| {
                    CoreError::wal_corruption(format!("undecodable record {key}: {e}"))
                })?;
                store_for_replay(catalog, collection_id)?.apply_put(key, value);
            }
            WalRecord::Delete {
                collection_id, key, ..
            } => {
                store_for_replay(catalog, collection_id)?.apply_delete(&key);
            }
            WalRecord::Clear { collection_id, .. } => {
                store_for_replay(catalog, collection_id)?.apply_clear();
            }
            _ => {}
        }
    }
    Ok(())
}
