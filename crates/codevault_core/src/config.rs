//! Store configuration.

/// Default WAL size that triggers an automatic checkpoint.
pub const DEFAULT_MAX_WAL_SIZE: u64 = 16 * 1024 * 1024;

/// Options that control how a store is opened and how it writes.
///
/// Every option has a builder method:
///
/// ```rust,ignore
/// let config = Config::new().sync_on_commit(false).max_wal_size(1 << 20);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Create the store directory and files when they are missing.
    pub create_if_missing: bool,

    /// Refuse to open a store that already holds data.
    pub error_if_exists: bool,

    /// Once a commit leaves the WAL larger than this many bytes, the log is
    /// rewritten as a checkpoint. Zero turns automatic checkpoints off.
    pub max_wal_size: u64,

    /// fsync the WAL before a commit returns. Without it a commit is only
    /// flushed to the OS.
    pub sync_on_commit: bool,

    /// On-disk format written into new manifests. Stores whose major
    /// version differs are rejected.
    pub format_version: (u16, u16),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            error_if_exists: false,
            max_wal_size: DEFAULT_MAX_WAL_SIZE,
            sync_on_commit: true,
            format_version: (1, 0),
        }
    }
}

impl Config {
    /// Returns the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `create_if_missing`.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets `error_if_exists`.
    #[must_use]
    pub const fn error_if_exists(mut self, value: bool) -> Self {
        self.error_if_exists = value;
        self
    }

    /// Sets the automatic checkpoint threshold in bytes.
    #[must_use]
    pub const fn max_wal_size(mut self, bytes: u64) -> Self {
        self.max_wal_size = bytes;
        self
    }

    /// Turns automatic checkpoints off; the WAL then only shrinks on an
    /// explicit checkpoint.
    #[must_use]
    pub const fn without_auto_checkpoint(self) -> Self {
        self.max_wal_size(0)
    }

    /// Sets `sync_on_commit`.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the format version written to new stores.
    #[must_use]
    pub const fn format_version(mut self, major: u16, minor: u16) -> Self {
        self.format_version = (major, minor);
        self
    }
}
