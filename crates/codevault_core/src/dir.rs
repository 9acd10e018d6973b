//! Store directory management.
//!
//! This module handles the file system layout of a store:
//!
//! ```text
//! <store_path>/
//! ├─ MANIFEST          # Metadata (collections, indexes, schema version)
//! ├─ LOCK              # Advisory lock for single-process access
//! └─ wal.log           # Write-ahead log (the records themselves)
//! ```

use crate::error::{CoreError, CoreResult};
use crate::manifest::Manifest;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const MANIFEST_FILE: &str = "MANIFEST";
const LOCK_FILE: &str = "LOCK";
const WAL_FILE: &str = "wal.log";
const MANIFEST_TEMP: &str = "MANIFEST.tmp";

/// A locked store directory.
///
/// `LOCK` stays exclusively locked (via `fs2`) until the value is dropped, so
/// a second open of the same directory, from this process or another, fails
/// with `DatabaseLocked`.
#[derive(Debug)]
pub struct DatabaseDir {
    path: PathBuf,
    _lock_file: File,
}

impl DatabaseDir {
    /// Opens or creates a store directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another process holds the lock (returns `DatabaseLocked`)
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        match (path.exists(), create_if_missing) {
            (false, true) => fs::create_dir_all(path)?,
            (false, false) => {
                return Err(CoreError::invalid_format(format!(
                    "no store at {}",
                    path.display()
                )))
            }
            (true, _) if !path.is_dir() => {
                return Err(CoreError::invalid_format(format!(
                    "{} is not a directory",
                    path.display()
                )))
            }
            (true, _) => {}
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| CoreError::DatabaseLocked)?;
        tracing::debug!(path = %path.display(), "store directory locked");

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the path to the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path to the WAL file.
    #[must_use]
    pub fn wal_path(&self) -> PathBuf {
        self.path.join(WAL_FILE)
    }

    /// Returns the path to the MANIFEST file.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.path.join(MANIFEST_FILE)
    }

    /// Reads `MANIFEST`; `None` for a store that has never saved one.
    pub fn load_manifest(&self) -> CoreResult<Option<Manifest>> {
        let data = match fs::read(self.manifest_path()) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if data.is_empty() {
            return Ok(None);
        }
        Manifest::decode(&data).map(Some)
    }

    /// Saves the manifest to disk atomically.
    ///
    /// 1. Write to a temporary file and sync it
    /// 2. Rename it over MANIFEST
    /// 3. Fsync the directory so the rename is durable
    pub fn save_manifest(&self, manifest: &Manifest) -> CoreResult<()> {
        let temp_path = self.path.join(MANIFEST_TEMP);

        let data = manifest.encode()?;
        let mut file = File::create(&temp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, self.manifest_path())?;
        self.sync_directory()
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> CoreResult<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> CoreResult<()> {
        // NTFS journals metadata; directories cannot be fsynced there.
        Ok(())
    }

    /// Checks if this is a new (empty) store directory.
    #[must_use]
    pub fn is_new_database(&self) -> bool {
        !self.manifest_path().exists() && !self.wal_path().exists()
    }
}
