//! Content cache keyed by URL.
//!
//! Each key maps to one file under the store root whose name is the
//! mangled key. Entries are written through a temp file and renamed into
//! place, so a reader sees either a complete entry or none.

use super::error::PkgError;
use nestpm_util::fs::atomic_write;
use nestpm_util::hash::mangle_key;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Durable key → bytes cache.
#[derive(Debug, Clone)]
pub struct Blobstore {
    root: PathBuf,
}

impl Blobstore {
    /// Create a store rooted at `root`. The directory is created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the store root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the entry for `key`.
    #[must_use]
    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(mangle_key(key))
    }

    /// Open the entry for `key`.
    ///
    /// With `force_invalidate` any existing entry is deleted and `None` is
    /// returned.
    ///
    /// # Errors
    /// Returns `PKG_CACHE_ERROR` if the entry exists but cannot be opened
    /// or removed.
    pub fn get(&self, key: &str, force_invalidate: bool) -> Result<Option<File>, PkgError> {
        if force_invalidate {
            self.invalidate(key)?;
            return Ok(None);
        }

        let path = self.entry_path(key);
        match File::open(&path) {
            Ok(file) => {
                debug!(key, path = %path.display(), "Blobstore hit");
                Ok(Some(file))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PkgError::cache_error(format!(
                "Failed to open cache entry {}: {e}",
                path.display()
            ))),
        }
    }

    /// Store `bytes` under `key`, replacing any existing entry.
    ///
    /// # Errors
    /// Returns `PKG_CACHE_ERROR` if the entry cannot be written.
    pub fn put(&self, key: &str, bytes: &[u8]) -> Result<PathBuf, PkgError> {
        let path = self.entry_path(key);
        atomic_write(&path, bytes).map_err(|e| {
            PkgError::cache_error(format!("Failed to write cache entry {}: {e}", path.display()))
        })?;
        debug!(key, bytes = bytes.len(), "Blobstore put");
        Ok(path)
    }

    /// Open the entry for `key`, calling `populate` and storing its result
    /// on a miss (or when `force_invalidate` is set).
    ///
    /// # Errors
    /// Propagates errors from `populate` unchanged; cache failures are
    /// `PKG_CACHE_ERROR`.
    pub fn fetch_or_populate<F>(
        &self,
        key: &str,
        force_invalidate: bool,
        populate: F,
    ) -> Result<File, PkgError>
    where
        F: FnOnce() -> Result<Vec<u8>, PkgError>,
    {
        if let Some(file) = self.get(key, force_invalidate)? {
            return Ok(file);
        }

        let bytes = populate()?;
        let path = self.put(key, &bytes)?;
        File::open(&path).map_err(|e| {
            PkgError::cache_error(format!("Failed to reopen cache entry {}: {e}", path.display()))
        })
    }

    /// Remove the entry for `key`. Returns whether one existed.
    ///
    /// # Errors
    /// Returns `PKG_CACHE_ERROR` if the entry exists but cannot be removed.
    pub fn invalidate(&self, key: &str) -> Result<bool, PkgError> {
        let path = self.entry_path(key);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(key, "Blobstore entry invalidated");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(PkgError::cache_error(format!(
                "Failed to remove cache entry {}: {e}",
                path.display()
            ))),
        }
    }

    /// Number of stored entries.
    ///
    /// # Errors
    /// Returns `PKG_CACHE_ERROR` if the root exists but cannot be listed.
    pub fn entry_count(&self) -> Result<usize, PkgError> {
        Ok(self.entries()?.len())
    }

    /// Remove every entry. Returns how many were removed.
    ///
    /// # Errors
    /// Returns `PKG_CACHE_ERROR` if an entry cannot be removed.
    pub fn clear(&self) -> Result<usize, PkgError> {
        let entries = self.entries()?;
        for path in &entries {
            fs::remove_file(path).map_err(|e| {
                PkgError::cache_error(format!("Failed to remove {}: {e}", path.display()))
            })?;
        }
        Ok(entries.len())
    }

    fn entries(&self) -> Result<Vec<PathBuf>, PkgError> {
        let read_dir = match fs::read_dir(&self.root) {
            Ok(rd) => rd,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(PkgError::cache_error(format!(
                    "Failed to read cache dir {}: {e}",
                    self.root.display()
                )))
            }
        };

        Ok(read_dir
            .filter_map(Result::ok)
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            // In-flight temp files start with '.'
            .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
            .map(|e| e.path())
            .collect())
    }
}
