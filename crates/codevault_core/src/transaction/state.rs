//! Transaction state.

use crate::collection::{Catalog, CollectionStore};
use crate::error::{CoreError, CoreResult};
use crate::index::{CompositeKey, Direction, KeyRange};
use crate::transaction::manager::TransactionManager;
use crate::types::{CollectionId, RecordKey, SequenceNumber, TransactionId};
use parking_lot::{MutexGuard, RwLockReadGuard};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Access mode of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    /// Reads only; runs alongside other readers.
    ReadOnly,
    /// Reads and writes; holds the single-writer lock until it ends.
    ReadWrite,
}

/// Writes staged against one collection.
#[derive(Debug, Default)]
pub(crate) struct Overlay {
    /// Every committed record is dropped first.
    pub(crate) cleared: bool,
    /// `Some` replaces or inserts, `None` deletes.
    pub(crate) writes: BTreeMap<RecordKey, Option<Value>>,
    /// Generator position once this transaction has assigned a key.
    next_key: Option<u64>,
}

impl Overlay {
    pub(crate) fn is_empty(&self) -> bool {
        !self.cleared && self.writes.is_empty()
    }

    /// Resolves a key against the overlay. `None` means "ask the committed
    /// state".
    fn lookup(&self, key: &RecordKey) -> Option<Option<&Value>> {
        match self.writes.get(key) {
            Some(write) => Some(write.as_ref()),
            None if self.cleared => Some(None),
            None => None,
        }
    }
}

enum Access<'a> {
    Shared(RwLockReadGuard<'a, Catalog>),
    Exclusive(#[allow(dead_code)] MutexGuard<'a, ()>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteKind {
    Put,
    Add,
}

/// An open transaction over a fixed set of collections.
///
/// Reads see the committed state plus this transaction's own staged writes.
/// Writes are staged in memory and reach the WAL only on [`commit`]; dropping
/// the transaction discards them.
///
/// A write that fails (bad key, unique index clash, unserializable value)
/// marks the whole transaction as failed: whatever the caller does next,
/// committing it returns `TransactionAborted`.
///
/// A read-only transaction holds a shared lock on the committed state and a
/// read-write transaction holds the writer lock, so the body must not call
/// back into the [`Database`](crate::Database) directly.
///
/// [`commit`]: Transaction::commit
pub struct Transaction<'a> {
    manager: &'a TransactionManager,
    access: Access<'a>,
    id: TransactionId,
    mode: TransactionMode,
    scope: HashMap<String, CollectionId>,
    pub(crate) overlays: BTreeMap<CollectionId, Overlay>,
    pub(crate) failure: Option<String>,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new_shared(
        manager: &'a TransactionManager,
        guard: RwLockReadGuard<'a, Catalog>,
        id: TransactionId,
        scope: HashMap<String, CollectionId>,
    ) -> Self {
        Self::new(manager, Access::Shared(guard), id, TransactionMode::ReadOnly, scope)
    }

    pub(crate) fn new_exclusive(
        manager: &'a TransactionManager,
        guard: MutexGuard<'a, ()>,
        id: TransactionId,
        scope: HashMap<String, CollectionId>,
    ) -> Self {
        Self::new(manager, Access::Exclusive(guard), id, TransactionMode::ReadWrite, scope)
    }

    fn new(
        manager: &'a TransactionManager,
        access: Access<'a>,
        id: TransactionId,
        mode: TransactionMode,
        scope: HashMap<String, CollectionId>,
    ) -> Self {
        Self {
            manager,
            access,
            id,
            mode,
            scope,
            overlays: BTreeMap::new(),
            failure: None,
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the access mode.
    #[must_use]
    pub fn mode(&self) -> TransactionMode {
        self.mode
    }

    /// Returns the reason this transaction will abort, if a write failed.
    #[must_use]
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Commits every staged write atomically.
    ///
    /// Returns the commit's sequence number, or the current committed
    /// sequence when nothing was written (no WAL record is produced then).
    pub fn commit(self) -> CoreResult<SequenceNumber> {
        let manager = self.manager;
        manager.commit(self)
    }

    /// Discards every staged write.
    pub fn abort(self) {
        tracing::debug!(txid = %self.id, "transaction rolled back");
    }

    fn with_catalog<R>(&self, f: impl FnOnce(&Catalog) -> R) -> R {
        match &self.access {
            Access::Shared(guard) => f(guard),
            Access::Exclusive(_) => f(&self.manager.catalog().read()),
        }
    }

    fn collection_id(&self, collection: &str) -> CoreResult<CollectionId> {
        self.scope.get(collection).copied().ok_or_else(|| {
            CoreError::invalid_operation(format!(
                "collection {collection} is not part of this transaction"
            ))
        })
    }

    fn ensure_writable(&self) -> CoreResult<()> {
        if self.mode == TransactionMode::ReadOnly {
            return Err(CoreError::invalid_operation(
                "cannot write in a read-only transaction",
            ));
        }
        Ok(())
    }

    fn fail<T>(&mut self, err: CoreError) -> CoreResult<T> {
        if self.failure.is_none() {
            self.failure = Some(err.to_string());
        }
        Err(err)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Gets a record by primary key.
    pub fn get(&self, collection: &str, key: &RecordKey) -> CoreResult<Option<Value>> {
        let id = self.collection_id(collection)?;
        if let Some(staged) = self.overlays.get(&id).and_then(|o| o.lookup(key)) {
            return Ok(staged.cloned());
        }
        self.with_catalog(|catalog| Ok(catalog.store(id)?.get(key).cloned()))
    }

    /// Gets every record in primary-key order.
    pub fn get_all(&self, collection: &str) -> CoreResult<Vec<Value>> {
        let id = self.collection_id(collection)?;
        let overlay = self.overlays.get(&id);
        self.with_catalog(|catalog| {
            let store = catalog.store(id)?;
            Ok(match overlay {
                None => store.iter().map(|(_, v)| v.clone()).collect(),
                Some(overlay) => merged(store, overlay).into_values().collect(),
            })
        })
    }

    /// Counts records.
    pub fn count(&self, collection: &str) -> CoreResult<usize> {
        let id = self.collection_id(collection)?;
        let overlay = self.overlays.get(&id);
        self.with_catalog(|catalog| {
            let store = catalog.store(id)?;
            let Some(overlay) = overlay else {
                return Ok(store.len());
            };
            let mut count = if overlay.cleared { 0 } else { store.len() };
            for (key, write) in &overlay.writes {
                let committed = !overlay.cleared && store.get(key).is_some();
                match (committed, write.is_some()) {
                    (false, true) => count += 1,
                    (true, false) => count -= 1,
                    _ => {}
                }
            }
            Ok(count)
        })
    }

    /// Scans a secondary index.
    ///
    /// Returns the records whose index key lies in `range`, ordered by index
    /// key and then primary key (reversed for [`Direction::Reverse`]), and
    /// at most `limit` of them. Without staged writes on the collection the
    /// scan stops as soon as the limit is reached.
    pub fn scan_index(
        &self,
        collection: &str,
        index: &str,
        range: &KeyRange,
        direction: Direction,
        limit: Option<usize>,
    ) -> CoreResult<Vec<Value>> {
        let id = self.collection_id(collection)?;
        let overlay = self.overlays.get(&id).filter(|o| !o.is_empty());
        self.with_catalog(|catalog| {
            let store = catalog.store(id)?;
            match overlay {
                None => scan_committed(store, index, range, direction, limit),
                Some(overlay) => scan_merged(store, overlay, index, range, direction, limit),
            }
        })
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

    /// Gets and deserializes every record.
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

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Inserts or replaces a record.
    ///
    /// The key is read from the collection's key path; in an auto-increment
    /// collection a record without one is assigned the next key, which is
    /// also written into the record.
    pub fn put(&mut self, collection: &str, record: Value) -> CoreResult<RecordKey> {
        self.write(collection, record, WriteKind::Put)
    }

    /// Inserts a record that must not exist yet.
    pub fn add(&mut self, collection: &str, record: Value) -> CoreResult<RecordKey> {
        self.write(collection, record, WriteKind::Add)
    }

    /// Serializes and stores a record (see [`put`](Self::put)).
    pub fn put_as<T: Serialize>(&mut self, collection: &str, record: &T) -> CoreResult<RecordKey> {
        let value = self.to_record(record)?;
        self.put(collection, value)
    }

    /// Serializes and inserts a new record (see [`add`](Self::add)).
    pub fn add_as<T: Serialize>(&mut self, collection: &str, record: &T) -> CoreResult<RecordKey> {
        let value = self.to_record(record)?;
        self.add(collection, value)
    }

    /// Deletes a record. Returns whether it existed.
    pub fn delete(&mut self, collection: &str, key: &RecordKey) -> CoreResult<bool> {
        self.ensure_writable()?;
        let id = self.collection_id(collection)?;
        if self.get(collection, key)?.is_none() {
            return Ok(false);
        }
        self.overlays
            .entry(id)
            .or_default()
            .writes
            .insert(key.clone(), None);
        Ok(true)
    }

    /// Removes every record from a collection.
    pub fn clear(&mut self, collection: &str) -> CoreResult<()> {
        self.ensure_writable()?;
        let id = self.collection_id(collection)?;
        let overlay = self.overlays.entry(id).or_default();
        overlay.cleared = true;
        overlay.writes.clear();
        Ok(())
    }

    fn to_record<T: Serialize>(&mut self, record: &T) -> CoreResult<Value> {
        self.ensure_writable()?;
        match serde_json::to_value(record) {
            Ok(value) => Ok(value),
            Err(e) => self.fail(e.into()),
        }
    }

    fn write(&mut self, collection: &str, record: Value, kind: WriteKind) -> CoreResult<RecordKey> {
        self.ensure_writable()?;
        let id = self.collection_id(collection)?;
        match self.stage(id, record, kind) {
            Ok(key) => Ok(key),
            Err(e) => self.fail(e),
        }
    }

    fn stage(&mut self, id: CollectionId, record: Value, kind: WriteKind) -> CoreResult<RecordKey> {
        let manager = self.manager;
        let catalog = manager.catalog().read();
        let store = catalog.store(id)?;
        let overlay = self.overlays.entry(id).or_default();

        let key = match store.key_of(&record)? {
            Some(key) => key,
            None if store.schema().auto_increment => {
                let next = overlay.next_key.get_or_insert(store.next_key());
                let key = RecordKey::Int(*next);
                *next += 1;
                key
            }
            None => {
                return Err(CoreError::invalid_input(format!(
                    "record for {} has no key at {}",
                    store.name(),
                    store.schema().key_path
                )))
            }
        };

        if kind == WriteKind::Add {
            let exists = match overlay.lookup(&key) {
                Some(staged) => staged.is_some(),
                None => store.get(&key).is_some(),
            };
            if exists {
                return Err(CoreError::ConstraintViolation {
                    index: "primary key".to_string(),
                    key: key.to_string(),
                });
            }
        }

        let record = store.with_key(record, &key);
        check_unique(store, overlay, &key, &record)?;

        if let (RecordKey::Int(n), true) = (&key, store.schema().auto_increment) {
            let next = overlay.next_key.get_or_insert(store.next_key());
            *next = (*next).max(n.saturating_add(1));
        }

        overlay.writes.insert(key.clone(), Some(record));
        Ok(key)
    }
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("failure", &self.failure)
            .finish_non_exhaustive()
    }
}

/// Rejects `record` if a unique index already maps its key to another
/// record, counting both committed and staged records.
fn check_unique(
    store: &CollectionStore,
    overlay: &Overlay,
    key: &RecordKey,
    record: &Value,
) -> CoreResult<()> {
    for index in store.indexes().filter(|i| i.spec().unique) {
        let Some(index_key) = index.key_for(record) else {
            continue;
        };

        let committed = !overlay.cleared
            && index
                .lookup(&index_key)
                .iter()
                .any(|holder| holder != key && !overlay.writes.contains_key(holder));
        let staged = overlay.writes.iter().any(|(other, write)| {
            other != key
                && write
                    .as_ref()
                    .and_then(|value| index.key_for(value))
                    .is_some_and(|k| k == index_key)
        });

        if committed || staged {
            return Err(CoreError::ConstraintViolation {
                index: index.spec().name.clone(),
                key: index_key.to_string(),
            });
        }
    }
    Ok(())
}

fn merged(store: &CollectionStore, overlay: &Overlay) -> BTreeMap<RecordKey, Value> {
    let mut records: BTreeMap<RecordKey, Value> = if overlay.cleared {
        BTreeMap::new()
    } else {
        store.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    };
    for (key, write) in &overlay.writes {
        match write {
            Some(value) => {
                records.insert(key.clone(), value.clone());
            }
            None => {
                records.remove(key);
            }
        }
    }
    records
}

pub(crate) fn scan_committed(
    store: &CollectionStore,
    index: &str,
    range: &KeyRange,
    direction: Direction,
    limit: Option<usize>,
) -> CoreResult<Vec<Value>> {
    let index = store.index(index)?;
    Ok(index
        .scan(range, direction, limit)
        .iter()
        .filter_map(|key| store.get(key).cloned())
        .collect())
}

fn scan_merged(
    store: &CollectionStore,
    overlay: &Overlay,
    index: &str,
    range: &KeyRange,
    direction: Direction,
    limit: Option<usize>,
) -> CoreResult<Vec<Value>> {
    let index = store.index(index)?;
    let mut hits: Vec<(CompositeKey, RecordKey, Value)> = Vec::new();

    if !overlay.cleared {
        for (index_key, key) in index.scan_entries(range, Direction::Forward) {
            if overlay.writes.contains_key(key) {
                continue;
            }
            if let Some(value) = store.get(key) {
                hits.push((index_key.clone(), key.clone(), value.clone()));
            }
        }
    }
    for (key, write) in &overlay.writes {
        let Some(value) = write else { continue };
        if let Some(index_key) = index.key_for(value).filter(|k| range.contains(k)) {
            hits.push((index_key, key.clone(), value.clone()));
        }
    }

    hits.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
    if direction == Direction::Reverse {
        hits.reverse();
    }
    Ok(hits
        .into_iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|(_, _, value)| value)
        .collect())
}

pub(crate) fn decode_all<T: DeserializeOwned>(values: Vec<Value>) -> CoreResult<Vec<T>> {
    values
        .into_iter()
        .map(|v| serde_json::from_value(v).map_err(Into::into))
        .collect()
}
