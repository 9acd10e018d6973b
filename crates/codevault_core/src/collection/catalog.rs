//! Registry of every collection in a store.

use crate::collection::schema::CollectionSchema;
use crate::collection::store::CollectionStore;
use crate::error::{CoreError, CoreResult};
use crate::manifest::{Manifest, ManifestCollection};
use crate::types::CollectionId;
use std::collections::{BTreeMap, HashMap};

/// All committed collections, addressable by ID and by name.
///
/// The catalog is the in-memory form of the manifest plus the records
/// recovered from the WAL.
#[derive(Debug)]
pub struct Catalog {
    format_version: (u16, u16),
    store_name: String,
    schema_version: u32,
    next_collection_id: u32,
    last_checkpoint: Option<u64>,
    stores: BTreeMap<CollectionId, CollectionStore>,
    names: HashMap<String, CollectionId>,
}

impl Catalog {
    /// Builds empty collections for every entry of `manifest`.
    pub(crate) fn from_manifest(manifest: &Manifest) -> CoreResult<Self> {
        let mut catalog = Self {
            format_version: manifest.format_version,
            store_name: manifest.store_name.clone(),
            schema_version: manifest.schema_version,
            next_collection_id: manifest.next_collection_id,
            last_checkpoint: manifest.last_checkpoint,
            stores: BTreeMap::new(),
            names: HashMap::new(),
        };
        for entry in &manifest.collections {
            if entry.id.as_u32() >= catalog.next_collection_id {
                return Err(CoreError::invalid_format(format!(
                    "collection {} has id {} beyond next id {}",
                    entry.schema.name, entry.id, catalog.next_collection_id
                )));
            }
            if catalog.names.contains_key(&entry.schema.name) || catalog.stores.contains_key(&entry.id) {
                return Err(CoreError::invalid_format(format!(
                    "duplicate collection {} in manifest",
                    entry.schema.name
                )));
            }
            catalog.insert(CollectionStore::new(entry.id, entry.schema.clone()));
        }
        Ok(catalog)
    }

    /// Renders the catalog's metadata as a manifest.
    #[must_use]
    pub(crate) fn to_manifest(&self) -> Manifest {
        Manifest {
            format_version: self.format_version,
            store_name: self.store_name.clone(),
            schema_version: self.schema_version,
            next_collection_id: self.next_collection_id,
            collections: self
                .stores
                .values()
                .map(|store| ManifestCollection {
                    id: store.id(),
                    schema: store.schema().clone(),
                })
                .collect(),
            last_checkpoint: self.last_checkpoint,
        }
    }

    fn insert(&mut self, store: CollectionStore) {
        self.names.insert(store.name().to_string(), store.id());
        self.stores.insert(store.id(), store);
    }

    /// Registers a new, empty collection and returns its ID.
    pub(crate) fn create_collection(&mut self, schema: CollectionSchema) -> CollectionId {
        let id = CollectionId::new(self.next_collection_id);
        self.next_collection_id += 1;
        self.insert(CollectionStore::new(id, schema));
        id
    }

    /// Resolves a collection name.
    pub fn resolve(&self, name: &str) -> CoreResult<CollectionId> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| CoreError::collection_not_found(name))
    }

    /// Returns a collection by ID.
    pub fn store(&self, id: CollectionId) -> CoreResult<&CollectionStore> {
        self.stores
            .get(&id)
            .ok_or_else(|| CoreError::collection_not_found(id.to_string()))
    }

    pub(crate) fn store_mut(&mut self, id: CollectionId) -> CoreResult<&mut CollectionStore> {
        self.stores
            .get_mut(&id)
            .ok_or_else(|| CoreError::collection_not_found(id.to_string()))
    }

    /// Returns a collection by name.
    pub fn store_by_name(&self, name: &str) -> CoreResult<&CollectionStore> {
        self.store(self.resolve(name)?)
    }

    /// Returns true if a collection with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Iterates over collections in ID order.
    pub fn stores(&self) -> impl Iterator<Item = &CollectionStore> + '_ {
        self.stores.values()
    }

    /// Collection names in ID order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.stores.values().map(|s| s.name().to_string()).collect()
    }

    /// Logical store name.
    #[must_use]
    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    /// Schema version.
    #[must_use]
    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    pub(crate) fn set_identity(&mut self, store_name: &str, schema_version: u32) {
        self.store_name = store_name.to_string();
        self.schema_version = schema_version;
    }

    pub(crate) fn set_last_checkpoint(&mut self, sequence: u64) {
        self.last_checkpoint = Some(sequence);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_resolve() {
        let mut catalog = Catalog::from_manifest(&Manifest::default()).unwrap();
        let code = catalog.create_collection(CollectionSchema::new("code", "id"));
        let history = catalog.create_collection(CollectionSchema::new("history", "id"));
        assert_ne!(code, history);
        assert_eq!(catalog.resolve("history").unwrap(), history);
        assert!(matches!(
            catalog.resolve("snippets"),
            Err(CoreError::CollectionNotFound { .. })
        ));
        assert_eq!(catalog.names(), vec!["code", "history"]);
    }

    #[test]
    fn manifest_round_trip_keeps_ids() {
        let mut catalog = Catalog::from_manifest(&Manifest::default()).unwrap();
        catalog.create_collection(CollectionSchema::new("settings", "key"));
        let code = catalog.create_collection(CollectionSchema::new("code", "id"));
        catalog.set_identity("CodeVault", 1);

        let manifest = catalog.to_manifest();
        let reloaded = Catalog::from_manifest(&manifest).unwrap();
        assert_eq!(reloaded.resolve("code").unwrap(), code);
        assert_eq!(reloaded.store_name(), "CodeVault");
        assert_eq!(reloaded.to_manifest(), manifest);
    }

    #[test]
    fn rejects_inconsistent_manifest() {
        let mut manifest = Manifest::default();
        manifest.collections.push(ManifestCollection {
            id: CollectionId::new(5),
            schema: CollectionSchema::new("code", "id"),
        });
        assert!(Catalog::from_manifest(&manifest).is_err());
    }
}
