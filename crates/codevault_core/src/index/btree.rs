//! BTree index implementation.

use crate::error::{CoreError, CoreResult};
use crate::index::key::{CompositeKey, Direction, KeyRange};
use crate::index::spec::IndexSpec;
use crate::types::RecordKey;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// BTree-based secondary index for ordered traversal and range queries.
///
/// Maps each composite key to the primary keys of the records holding it.
/// Records sharing a key are visited in primary-key order, which for
/// auto-increment collections is insertion order.
///
/// `BTreeIndex` supports:
/// - Equality lookups
/// - Bounded range scans in either direction
/// - Early termination once a limit is reached
///
/// Uniqueness is checked by the caller before a write is staged
/// (see [`BTreeIndex::conflict`]); [`BTreeIndex::insert`] itself never fails,
/// so applying an already validated transaction cannot fail halfway.
#[derive(Debug, Clone)]
pub struct BTreeIndex {
    spec: IndexSpec,
    entries: BTreeMap<CompositeKey, BTreeSet<RecordKey>>,
    count: usize,
}

impl BTreeIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new(spec: IndexSpec) -> Self {
        Self {
            spec,
            entries: BTreeMap::new(),
            count: 0,
        }
    }

    /// Builds an index over existing records.
    ///
    /// Fails with `ConstraintViolation` if the index is unique and two
    /// records share a key.
    pub fn build<'r, I>(spec: IndexSpec, records: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = (&'r RecordKey, &'r Value)>,
    {
        let mut index = Self::new(spec);
        for (record_key, record) in records {
            if let Some(key) = index.key_for(record) {
                if index.conflict(&key, record_key).is_some() {
                    return Err(CoreError::ConstraintViolation {
                        index: index.spec.name.clone(),
                        key: key.to_string(),
                    });
                }
                index.insert(key, record_key.clone());
            }
        }
        Ok(index)
    }

    /// Returns the index definition.
    #[must_use]
    pub fn spec(&self) -> &IndexSpec {
        &self.spec
    }

    /// Computes the key a record would be indexed under.
    #[must_use]
    pub fn key_for(&self, record: &Value) -> Option<CompositeKey> {
        CompositeKey::extract(record, &self.spec.fields)
    }

    /// For a unique index, returns a record other than `record_key` that
    /// already holds `key`.
    #[must_use]
    pub fn conflict(&self, key: &CompositeKey, record_key: &RecordKey) -> Option<&RecordKey> {
        if !self.spec.unique {
            return None;
        }
        self.entries
            .get(key)
            .and_then(|holders| holders.iter().find(|held| *held != record_key))
    }

    /// Adds an entry.
    pub fn insert(&mut self, key: CompositeKey, record_key: RecordKey) {
        if self.entries.entry(key).or_default().insert(record_key) {
            self.count += 1;
        }
    }

    /// Removes an entry. Returns whether it was present.
    pub fn remove(&mut self, key: &CompositeKey, record_key: &RecordKey) -> bool {
        let Some(set) = self.entries.get_mut(key) else {
            return false;
        };
        if !set.remove(record_key) {
            return false;
        }
        self.count -= 1;
        if set.is_empty() {
            self.entries.remove(key);
        }
        true
    }

    /// Indexes a record if it carries every indexed field.
    pub fn insert_record(&mut self, record_key: &RecordKey, record: &Value) {
        if let Some(key) = self.key_for(record) {
            self.insert(key, record_key.clone());
        }
    }

    /// Removes a record's entry.
    pub fn remove_record(&mut self, record_key: &RecordKey, record: &Value) {
        if let Some(key) = self.key_for(record) {
            self.remove(&key, record_key);
        }
    }

    /// Returns the records holding exactly `key`.
    #[must_use]
    pub fn lookup(&self, key: &CompositeKey) -> Vec<RecordKey> {
        self.entries
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the primary keys inside `range`, in `direction` order, stopping
    /// after `limit` results.
    ///
    /// Walks the tree lazily from the matching end of the range and stops as
    /// soon as `limit` results are collected.
    #[must_use]
    pub fn scan(
        &self,
        range: &KeyRange,
        direction: Direction,
        limit: Option<usize>,
    ) -> Vec<RecordKey> {
        self.scan_entries(range, direction)
            .take(limit.unwrap_or(usize::MAX))
            .map(|(_, record_key)| record_key.clone())
            .collect()
    }

    /// Lazily yields `(index key, primary key)` pairs inside `range`.
    pub fn scan_entries<'a>(
        &'a self,
        range: &'a KeyRange,
        direction: Direction,
    ) -> Box<dyn Iterator<Item = (&'a CompositeKey, &'a RecordKey)> + 'a> {
        if range.is_empty() {
            return Box::new(std::iter::empty());
        }
        let prefix = range.prefix.as_ref();
        let in_prefix = move |key: &CompositeKey| prefix.map_or(true, |p| key.starts_with(p));
        let entries = self.entries.range(range.bounds());

        match direction {
            Direction::Forward => Box::new(
                entries
                    .take_while(move |&(key, _)| in_prefix(key))
                    .flat_map(|(key, set)| set.iter().map(move |rk| (key, rk))),
            ),
            Direction::Reverse => Box::new(
                entries
                    .rev()
                    .skip_while(move |&(key, _)| !in_prefix(key))
                    .take_while(move |&(key, _)| in_prefix(key))
                    .flat_map(|(key, set)| set.iter().rev().map(move |rk| (key, rk))),
            ),
        }
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns true if the index holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composite_key;
    use serde_json::json;

    fn history_index() -> BTreeIndex {
        BTreeIndex::new(IndexSpec::new("lang_timestamp", ["lang", "timestamp"]))
    }

    fn filled() -> BTreeIndex {
        let mut index = history_index();
        for (id, lang, ts) in [(1, "js", 10), (2, "js", 30), (3, "py", 20), (4, "js", 20)] {
            index.insert_record(&RecordKey::Int(id), &json!({"lang": lang, "timestamp": ts}));
        }
        index
    }

    fn js_range() -> KeyRange {
        KeyRange::inclusive(composite_key!["js", i64::MIN], composite_key!["js", i64::MAX])
    }

    #[test]
    fn forward_scan_in_key_order() {
        let index = filled();
        let keys = index.scan(&js_range(), Direction::Forward, None);
        assert_eq!(keys, vec![RecordKey::Int(1), RecordKey::Int(4), RecordKey::Int(2)]);
    }

    #[test]
    fn reverse_scan_with_limit() {
        let index = filled();
        let keys = index.scan(&js_range(), Direction::Reverse, Some(2));
        assert_eq!(keys, vec![RecordKey::Int(2), RecordKey::Int(4)]);
    }

    #[test]
    fn ties_follow_primary_key_order() {
        let mut index = history_index();
        for id in [3, 1, 2] {
            index.insert_record(&RecordKey::Int(id), &json!({"lang": "js", "timestamp": 7}));
        }
        assert_eq!(
            index.scan(&js_range(), Direction::Forward, None),
            vec![RecordKey::Int(1), RecordKey::Int(2), RecordKey::Int(3)]
        );
        assert_eq!(
            index.scan(&js_range(), Direction::Reverse, Some(1)),
            vec![RecordKey::Int(3)]
        );
    }

    #[test]
    fn prefix_scan_both_directions() {
        let mut index = BTreeIndex::new(IndexSpec::new("lang_filename", ["lang", "filename"]));
        for (id, lang, file) in [("a", "js", "b"), ("b", "js", "a"), ("c", "jsx", "a"), ("d", "c", "z")] {
            index.insert_record(&RecordKey::text(id), &json!({"lang": lang, "filename": file}));
        }
        let range = KeyRange::prefix(composite_key!["js"]);
        assert_eq!(
            index.scan(&range, Direction::Forward, None),
            vec![RecordKey::text("b"), RecordKey::text("a")]
        );
        assert_eq!(
            index.scan(&range, Direction::Reverse, None),
            vec![RecordKey::text("a"), RecordKey::text("b")]
        );
    }

    #[test]
    fn inverted_range_yields_nothing() {
        let index = filled();
        let range = KeyRange::inclusive(composite_key!["py"], composite_key!["js"]);
        assert!(index.scan(&range, Direction::Forward, None).is_empty());
    }

    #[test]
    fn records_without_fields_are_skipped() {
        let mut index = history_index();
        index.insert_record(&RecordKey::Int(1), &json!({"lang": "js"}));
        assert!(index.is_empty());
    }

    #[test]
    fn remove_drops_empty_keys() {
        let mut index = filled();
        let record = json!({"lang": "py", "timestamp": 20});
        index.remove_record(&RecordKey::Int(3), &record);
        assert_eq!(index.len(), 3);
        assert!(index.lookup(&composite_key!["py", 20i64]).is_empty());
        assert!(!index.remove(&composite_key!["py", 20i64], &RecordKey::Int(3)));
    }

    #[test]
    fn unique_conflict_and_build() {
        let spec = IndexSpec::new("lang_filename", ["lang", "filename"]).unique();
        let a = json!({"lang": "js", "filename": "main"});
        let ka = RecordKey::text("x");
        let kb = RecordKey::text("y");

        let index = BTreeIndex::build(spec.clone(), [(&ka, &a)]).unwrap();
        let key = index.key_for(&a).unwrap();
        assert_eq!(index.conflict(&key, &kb), Some(&ka));
        assert_eq!(index.conflict(&key, &ka), None);

        let result = BTreeIndex::build(spec, [(&ka, &a), (&kb, &a)]);
        assert!(matches!(result, Err(CoreError::ConstraintViolation { .. })));
    }
}
