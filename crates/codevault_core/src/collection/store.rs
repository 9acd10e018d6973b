//! Committed records of one collection.

use crate::collection::schema::CollectionSchema;
use crate::error::{CoreError, CoreResult};
use crate::index::BTreeIndex;
use crate::types::{CollectionId, RecordKey};
use serde_json::Value;
use std::collections::BTreeMap;

/// The committed contents of a collection together with its indexes.
///
/// Mutations go through `apply_*`, which keep every index in step with the
/// records. They never fail: constraints are checked before a write is
/// accepted into a transaction.
#[derive(Debug, Clone)]
pub struct CollectionStore {
    id: CollectionId,
    schema: CollectionSchema,
    records: BTreeMap<RecordKey, Value>,
    indexes: BTreeMap<String, BTreeIndex>,
    next_key: u64,
}

impl CollectionStore {
    /// Creates an empty collection with empty indexes.
    pub(crate) fn new(id: CollectionId, schema: CollectionSchema) -> Self {
        let indexes = schema
            .indexes
            .iter()
            .map(|spec| (spec.name.clone(), BTreeIndex::new(spec.clone())))
            .collect();
        Self {
            id,
            schema,
            records: BTreeMap::new(),
            indexes,
            next_key: 1,
        }
    }

    /// Returns the collection ID.
    #[must_use]
    pub fn id(&self) -> CollectionId {
        self.id
    }

    /// Returns the collection name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.schema.name
    }

    /// Returns the collection definition.
    #[must_use]
    pub fn schema(&self) -> &CollectionSchema {
        &self.schema
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the collection holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Looks up a record by primary key.
    #[must_use]
    pub fn get(&self, key: &RecordKey) -> Option<&Value> {
        self.records.get(key)
    }

    /// Iterates over records in primary-key order.
    pub fn iter(&self) -> impl Iterator<Item = (&RecordKey, &Value)> + '_ {
        self.records.iter()
    }

    /// Returns the next key the generator would hand out.
    #[must_use]
    pub fn next_key(&self) -> u64 {
        self.next_key
    }

    /// Returns an index by name.
    pub fn index(&self, name: &str) -> CoreResult<&BTreeIndex> {
        self.indexes.get(name).ok_or_else(|| CoreError::IndexNotFound {
            collection: self.schema.name.clone(),
            index: name.to_string(),
        })
    }

    /// Iterates over the indexes.
    pub fn indexes(&self) -> impl Iterator<Item = &BTreeIndex> + '_ {
        self.indexes.values()
    }

    /// Reads the primary key of a record.
    ///
    /// Returns `Ok(None)` when the key field is absent. Fails if the record
    /// is not an object or the key is neither a non-negative integer nor a
    /// string.
    pub fn key_of(&self, record: &Value) -> CoreResult<Option<RecordKey>> {
        let Value::Object(fields) = record else {
            return Err(CoreError::invalid_input(format!(
                "records in {} must be JSON objects",
                self.schema.name
            )));
        };
        match fields.get(&self.schema.key_path) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => RecordKey::from_value(value).map(Some).ok_or_else(|| {
                CoreError::invalid_input(format!(
                    "invalid key {value} at {}.{}",
                    self.schema.name, self.schema.key_path
                ))
            }),
        }
    }

    /// Writes `key` into the record's key field.
    pub(crate) fn with_key(&self, mut record: Value, key: &RecordKey) -> Value {
        if let Value::Object(fields) = &mut record {
            fields.insert(self.schema.key_path.clone(), key.to_value());
        }
        record
    }

    /// Inserts or replaces a record.
    pub(crate) fn apply_put(&mut self, key: RecordKey, record: Value) {
        self.observe_key(&key);
        if let Some(old) = self.records.get(&key) {
            for index in self.indexes.values_mut() {
                index.remove_record(&key, old);
            }
        }
        for index in self.indexes.values_mut() {
            index.insert_record(&key, &record);
        }
        self.records.insert(key, record);
    }

    /// Deletes a record, returning it if it existed.
    pub(crate) fn apply_delete(&mut self, key: &RecordKey) -> Option<Value> {
        let old = self.records.remove(key)?;
        for index in self.indexes.values_mut() {
            index.remove_record(key, &old);
        }
        Some(old)
    }

    /// Removes every record. The key generator is left untouched.
    pub(crate) fn apply_clear(&mut self) {
        self.records.clear();
        for index in self.indexes.values_mut() {
            index.clear();
        }
    }

    /// Advances the key generator past an explicit numeric key.
    pub(crate) fn observe_key(&mut self, key: &RecordKey) {
        if let RecordKey::Int(n) = key {
            self.advance_generator(n.saturating_add(1));
        }
    }

    /// Moves the key generator forward to `next`; never moves it back.
    pub(crate) fn advance_generator(&mut self, next: u64) {
        self.next_key = self.next_key.max(next);
    }

    /// Attaches an index already built over this collection's records.
    pub(crate) fn attach_index(&mut self, index: BTreeIndex) {
        let spec = index.spec().clone();
        if self.schema.find_index(&spec.name).is_none() {
            self.schema.indexes.push(spec.clone());
        }
        self.indexes.insert(spec.name, index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composite_key;
    use crate::index::{Direction, IndexSpec, KeyRange};
    use serde_json::json;

    fn snippets() -> CollectionStore {
        let schema = CollectionSchema::new("snippets", "id")
            .auto_increment()
            .index(IndexSpec::new("lang", ["lang"]));
        CollectionStore::new(CollectionId::new(1), schema)
    }

    #[test]
    fn put_replaces_index_entries() {
        let mut store = snippets();
        let key = RecordKey::Int(1);
        store.apply_put(key.clone(), json!({"id": 1, "lang": "js"}));
        store.apply_put(key.clone(), json!({"id": 1, "lang": "py"}));

        let index = store.index("lang").unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.lookup(&composite_key!["js"]).is_empty());
        assert_eq!(index.lookup(&composite_key!["py"]), vec![key]);
    }

    #[test]
    fn delete_and_clear() {
        let mut store = snippets();
        for id in 1..=3u64 {
            store.apply_put(RecordKey::Int(id), json!({"id": id, "lang": "js"}));
        }
        assert!(store.apply_delete(&RecordKey::Int(2)).is_some());
        assert!(store.apply_delete(&RecordKey::Int(2)).is_none());
        assert_eq!(store.len(), 2);

        store.apply_clear();
        assert!(store.is_empty());
        assert!(store
            .index("lang")
            .unwrap()
            .scan(&KeyRange::all(), Direction::Forward, None)
            .is_empty());
        assert_eq!(store.next_key(), 4);
    }

    #[test]
    fn explicit_keys_advance_generator() {
        let mut store = snippets();
        store.apply_put(RecordKey::Int(41), json!({"id": 41}));
        assert_eq!(store.next_key(), 42);
        store.apply_put(RecordKey::Int(7), json!({"id": 7}));
        assert_eq!(store.next_key(), 42);
        store.apply_put(RecordKey::text("x"), json!({"id": "x"}));
        assert_eq!(store.next_key(), 42);
    }

    #[test]
    fn key_of_validates() {
        let store = snippets();
        assert_eq!(store.key_of(&json!({"id": 3})).unwrap(), Some(RecordKey::Int(3)));
        assert_eq!(store.key_of(&json!({"lang": "js"})).unwrap(), None);
        assert!(store.key_of(&json!({"id": -3})).is_err());
        assert!(store.key_of(&json!([1, 2])).is_err());
    }

    #[test]
    fn with_key_injects_field() {
        let store = snippets();
        let record = store.with_key(json!({"lang": "js"}), &RecordKey::Int(9));
        assert_eq!(record["id"], json!(9));
    }

    #[test]
    fn unknown_index() {
        let store = snippets();
        assert!(matches!(
            store.index("lang_name"),
            Err(CoreError::IndexNotFound { .. })
        ));
    }
}
