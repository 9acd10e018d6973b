//! Additive schema upgrades.

use crate::collection::{Catalog, CollectionSchema};
use crate::error::{CoreError, CoreResult};
use crate::index::IndexSpec;

/// Collects schema changes during [`Database::upgrade`](crate::Database::upgrade).
///
/// Upgrades are additive: collections and indexes can be created, never
/// altered or dropped. Asking for something that already exists is a no-op,
/// so an upgrade callback can be re-run against an up-to-date store without
/// producing any change.
#[derive(Debug)]
pub struct SchemaBuilder<'c> {
    catalog: &'c Catalog,
    old_version: u32,
    new_version: u32,
    collections: Vec<CollectionSchema>,
    indexes: Vec<(String, IndexSpec)>,
}

impl<'c> SchemaBuilder<'c> {
    pub(crate) fn new(catalog: &'c Catalog, old_version: u32, new_version: u32) -> Self {
        Self {
            catalog,
            old_version,
            new_version,
            collections: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Schema version stored before this upgrade (0 for a new store).
    #[must_use]
    pub fn old_version(&self) -> u32 {
        self.old_version
    }

    /// Schema version being opened.
    #[must_use]
    pub fn new_version(&self) -> u32 {
        self.new_version
    }

    /// Returns true if the collection exists or is about to be created.
    #[must_use]
    pub fn has_collection(&self, name: &str) -> bool {
        self.catalog.contains(name) || self.pending_collection(name).is_some()
    }

    /// Returns true if the index exists or is about to be created.
    #[must_use]
    pub fn has_index(&self, collection: &str, index: &str) -> bool {
        if let Ok(store) = self.catalog.store_by_name(collection) {
            if store.schema().find_index(index).is_some() {
                return true;
            }
        }
        if let Some(schema) = self.pending_collection(collection) {
            if schema.find_index(index).is_some() {
                return true;
            }
        }
        self.indexes
            .iter()
            .any(|(c, spec)| c == collection && spec.name == index)
    }

    fn pending_collection(&self, name: &str) -> Option<&CollectionSchema> {
        self.collections.iter().find(|schema| schema.name == name)
    }

    /// Creates a collection unless one with the same name exists.
    ///
    /// Returns whether the collection will be created. An existing
    /// collection is left exactly as it is, including its indexes.
    pub fn create_collection(&mut self, schema: CollectionSchema) -> bool {
        if self.has_collection(&schema.name) {
            return false;
        }
        self.collections.push(schema);
        true
    }

    /// Creates an index unless one with the same name exists.
    ///
    /// An index added to a collection that already holds records is built
    /// from those records when the upgrade is applied.
    pub fn create_index(&mut self, collection: &str, spec: IndexSpec) -> CoreResult<bool> {
        if !self.has_collection(collection) {
            return Err(CoreError::collection_not_found(collection));
        }
        if self.has_index(collection, &spec.name) {
            return Ok(false);
        }
        if let Some(schema) = self
            .collections
            .iter_mut()
            .find(|schema| schema.name == collection)
        {
            schema.indexes.push(spec);
        } else {
            self.indexes.push((collection.to_string(), spec));
        }
        Ok(true)
    }

    pub(crate) fn into_plan(self) -> UpgradePlan {
        UpgradePlan {
            collections: self.collections,
            indexes: self.indexes,
        }
    }
}

/// Changes collected by a [`SchemaBuilder`].
#[derive(Debug, Default)]
pub(crate) struct UpgradePlan {
    pub(crate) collections: Vec<CollectionSchema>,
    pub(crate) indexes: Vec<(String, IndexSpec)>,
}

impl UpgradePlan {
    pub(crate) fn is_empty(&self) -> bool {
        self.collections.is_empty() && self.indexes.is_empty()
    }
}
