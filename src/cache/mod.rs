//! Email-to-handle cache
//!
//! The cache is owned by the caller and threaded through every resolution
//! run. Entries are only ever added or overwritten, never removed, and the
//! insertion order is kept so the persisted file is reproducible.
//!
//! The on-disk format is a JSON array of `[email, handle]` pairs:
//!
//! ```json
//! [
//!   ["alice@example.com", "alice"],
//!   ["bob@example.com", "bob"]
//! ]
//! ```

pub mod paths;

pub use paths::{default_cache_path, get_cache_dir};

use crate::error::{AuthorsError, AuthorsResult};
use indexmap::IndexMap;
use std::fs;
use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Thread-safe email -> handle mapping
#[derive(Debug, Default)]
pub struct EmailCache {
    entries: RwLock<IndexMap<String, String>>,
}

impl EmailCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the handle recorded for `email` (case-sensitive).
    pub fn get(&self, email: &str) -> Option<String> {
        self.read().get(email).cloned()
    }

    /// Record `handle` for `email`, overwriting any earlier value in place.
    pub fn set(&self, email: impl Into<String>, handle: impl Into<String>) {
        self.write().insert(email.into(), handle.into());
    }

    pub fn contains(&self, email: &str) -> bool {
        self.read().contains_key(email)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Snapshot the entries as ordered `(email, handle)` pairs.
    pub fn to_persistable(&self) -> Vec<(String, String)> {
        self.read()
            .iter()
            .map(|(email, handle)| (email.clone(), handle.clone()))
            .collect()
    }

    /// Build a cache from ordered pairs. A repeated email keeps its first
    /// position and its last handle.
    pub fn from_persistable<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            entries: RwLock::new(pairs.into_iter().collect()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexMap<String, String>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexMap<String, String>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PartialEq for EmailCache {
    fn eq(&self, other: &Self) -> bool {
        self.to_persistable() == other.to_persistable()
    }
}

impl Eq for EmailCache {}

impl Clone for EmailCache {
    fn clone(&self) -> Self {
        Self::from_persistable(self.to_persistable())
    }
}

impl FromIterator<(String, String)> for EmailCache {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self::from_persistable(iter)
    }
}

/// Parse the persisted pair-array format.
pub fn parse_cache(data: &str, path: &Path) -> AuthorsResult<EmailCache> {
    if data.trim().is_empty() {
        return Err(AuthorsError::EmptyCache(path.to_path_buf()));
    }
    let pairs: Vec<(String, String)> =
        serde_json::from_str(data).map_err(|source| AuthorsError::CacheParse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(EmailCache::from_persistable(pairs))
}

/// Load a cache file. Empty, unreadable or malformed files are errors.
pub fn load_cache(path: &Path) -> AuthorsResult<EmailCache> {
    let data = fs::read_to_string(path).map_err(|source| AuthorsError::CacheIo {
        path: path.to_path_buf(),
        source,
    })?;
    let cache = parse_cache(&data, path)?;
    debug!("Loaded {} cached emails from {}", cache.len(), path.display());
    Ok(cache)
}

/// Like [`load_cache`], but a missing file yields an empty cache.
pub fn load_cache_or_default(path: &Path) -> AuthorsResult<EmailCache> {
    if !path.exists() {
        debug!("No cache at {}, starting empty", path.display());
        return Ok(EmailCache::new());
    }
    load_cache(path)
}

/// Write the cache as a pretty-printed pair array, creating parent dirs.
pub fn save_cache(path: &Path, cache: &EmailCache) -> AuthorsResult<()> {
    let io_err = |source| AuthorsError::CacheIo {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let data = serde_json::to_string_pretty(&cache.to_persistable()).map_err(|source| {
        AuthorsError::CacheParse {
            path: path.to_path_buf(),
            source,
        }
    })?;
    fs::write(path, data + "\n").map_err(io_err)?;
    debug!("Saved {} cached emails to {}", cache.len(), path.display());
    Ok(())
}
