//! The vault handle.

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::database::Database;
use crate::error::CoreResult;
use crate::schema::{bootstrap, DEFAULT_STORE_NAME, SCHEMA_VERSION};
use crate::types::SequenceNumber;
use std::path::Path;
use std::sync::Arc;

/// Names of the four vault collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionNames {
    /// User settings, keyed by `key`.
    pub settings: String,
    /// Current code documents, keyed by `lang:filename`.
    pub code: String,
    /// Revision history, keyed by an assigned number.
    pub history: String,
    /// Snippet library, keyed by an assigned number.
    pub snippets: String,
}

impl Default for CollectionNames {
    fn default() -> Self {
        Self {
            settings: "settings".to_string(),
            code: "code".to_string(),
            history: "history".to_string(),
            snippets: "snippets".to_string(),
        }
    }
}

impl CollectionNames {
    pub(crate) fn all(&self) -> [&str; 4] {
        [
            self.settings.as_str(),
            self.code.as_str(),
            self.history.as_str(),
            self.snippets.as_str(),
        ]
    }
}

/// Options for opening a [`CodeVault`].
#[derive(Clone)]
pub struct StoreOptions {
    /// Logical store name recorded in the manifest and exports.
    pub name: String,
    /// Schema version to open with.
    pub version: u32,
    /// Collection names.
    pub collections: CollectionNames,
    /// Engine configuration.
    pub config: Config,
    /// Source of record timestamps.
    pub clock: Arc<dyn Clock>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            name: DEFAULT_STORE_NAME.to_string(),
            version: SCHEMA_VERSION,
            collections: CollectionNames::default(),
            config: Config::default(),
            clock: Arc::new(SystemClock),
        }
    }
}

impl StoreOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the store name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the schema version.
    #[must_use]
    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Sets the collection names.
    #[must_use]
    pub fn collections(mut self, collections: CollectionNames) -> Self {
        self.collections = collections;
        self
    }

    /// Sets the engine configuration.
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Sets the clock.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl std::fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreOptions")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("collections", &self.collections)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// A code vault: settings, versioned code documents, their history and a
/// snippet library in one store.
///
/// `CodeVault` is a cheap handle around a shared [`Database`]; every
/// operation runs in its own transaction. Opening a vault declares its
/// collections, so a fresh store is ready to use immediately and an
/// existing one is upgraded in place when opened with a newer version.
#[derive(Clone)]
pub struct CodeVault {
    pub(crate) db: Arc<Database>,
    pub(crate) names: CollectionNames,
    clock: Arc<dyn Clock>,
}

impl CodeVault {
    /// Opens (or creates) a vault directory with default options.
    pub fn open(path: &Path) -> CoreResult<Self> {
        Self::open_with_options(path, StoreOptions::default())
    }

    /// Opens (or creates) a vault directory.
    pub fn open_with_options(path: &Path, options: StoreOptions) -> CoreResult<Self> {
        let db = Database::open_with_config(path, options.config.clone())?;
        Self::with_database(Arc::new(db), options)
    }

    /// Opens a vault that lives only in memory.
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::open_in_memory_with_options(StoreOptions::default())
    }

    /// Opens an in-memory vault with custom options.
    pub fn open_in_memory_with_options(options: StoreOptions) -> CoreResult<Self> {
        Self::with_database(Arc::new(Database::open_in_memory()?), options)
    }

    /// Wraps an open database, declaring the vault collections on it.
    ///
    /// # Errors
    ///
    /// `VersionDowngrade` if the store holds a newer schema than
    /// `options.version`, `InvalidFormat` if it was created under another
    /// name.
    pub fn with_database(db: Arc<Database>, options: StoreOptions) -> CoreResult<Self> {
        let names = options.collections;
        let changed = db.upgrade(&options.name, options.version, |builder| {
            bootstrap(builder, &names)
        })?;
        tracing::info!(
            store = %options.name,
            version = options.version,
            upgraded = changed,
            "vault ready"
        );
        Ok(Self {
            db,
            names,
            clock: options.clock,
        })
    }

    /// Returns the underlying database.
    #[must_use]
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Returns the collection names.
    #[must_use]
    pub fn names(&self) -> &CollectionNames {
        &self.names
    }

    /// Logical store name.
    #[must_use]
    pub fn store_name(&self) -> String {
        self.db.store_name()
    }

    /// Schema version of the store.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.db.schema_version()
    }

    /// Compacts the write-ahead log.
    pub fn checkpoint(&self) -> CoreResult<SequenceNumber> {
        self.db.checkpoint()
    }

    /// Closes the underlying database.
    pub fn close(&self) -> CoreResult<()> {
        self.db.close()
    }

    pub(crate) fn now(&self) -> i64 {
        self.clock.now_millis()
    }
}

impl std::fmt::Debug for CodeVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeVault")
            .field("db", &self.db)
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use codevault_storage::InMemoryBackend;

    #[test]
    fn opens_with_defaults() {
        let vault = CodeVault::open_in_memory().unwrap();
        assert_eq!(vault.store_name(), DEFAULT_STORE_NAME);
        assert_eq!(vault.version(), SCHEMA_VERSION);
        assert_eq!(vault.database().collection_names().len(), 4);
    }

    #[test]
    fn reopen_with_older_version_fails() {
        let wal = InMemoryBackend::new();
        let manifest = InMemoryBackend::new();
        let open = |version: u32| {
            let db = Database::open_with_backends(
                Config::default(),
                Box::new(wal.clone()),
                Box::new(manifest.clone()),
            )
            .unwrap();
            CodeVault::with_database(Arc::new(db), StoreOptions::new().version(version))
        };

        drop(open(3).unwrap());
        assert_eq!(open(3).unwrap().version(), 3);
        assert!(matches!(
            open(2),
            Err(CoreError::VersionDowngrade { stored: 3, requested: 2 })
        ));
    }

    #[test]
    fn file_vault_reopens() {
        let dir = tempfile::tempdir().unwrap();
        {
            let vault = CodeVault::open(dir.path()).unwrap();
            vault.close().unwrap();
        }
        let vault = CodeVault::open(dir.path()).unwrap();
        assert_eq!(vault.store_name(), DEFAULT_STORE_NAME);
    }
}
