//! Cached, sorted listing of completed files in the download directory.
//!
//! The listing is rebuilt only when the directory's mtime is newer than both the
//! caller's threshold and the mtime recorded at the previous rebuild. Files still
//! being written carry [`TEMP_SUFFIX`] and are never listed.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::SystemTime;

use crate::error::IndexError;

/// Suffix the downloader uses for files still being written.
pub const TEMP_SUFFIX: &str = ".part";

#[derive(Debug, Default)]
struct IndexState {
    entries: Vec<String>,
    last_modified: Option<SystemTime>,
}

/// Point-in-time copy of the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSnapshot {
    pub entries: Vec<String>,
    /// Directory mtime at the last rebuild; `None` before the first one.
    pub last_modified: Option<SystemTime>,
}

#[derive(Debug)]
pub struct StoredIndex {
    dir: PathBuf,
    /// Serializes rebuilds so directory I/O happens outside the state lock.
    refresh_lock: Mutex<()>,
    state: RwLock<IndexState>,
}

impl StoredIndex {
    /// Empty index over `dir`. Nothing is read until the first `refresh`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            refresh_lock: Mutex::new(()),
            state: RwLock::new(IndexState::default()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Rebuild the listing if the directory changed after `since` (and after
    /// the last rebuild). Returns true if the listing was rebuilt. The first call
    /// always rebuilds.
    pub fn refresh(&self, since: SystemTime) -> Result<bool, IndexError> {
        let _guard = self
            .refresh_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let dir_err = |source| IndexError::Directory {
            path: self.dir.clone(),
            source,
        };
        let meta = fs::metadata(&self.dir).map_err(dir_err)?;
        if !meta.is_dir() {
            return Err(IndexError::NotADirectory(self.dir.clone()));
        }
        let mtime = meta.modified().map_err(dir_err)?;

        if let Some(last) = self.last_modified() {
            if mtime <= last.max(since) {
                return Ok(false);
            }
        }

        let entries = list_completed(&self.dir).map_err(dir_err)?;
        tracing::debug!(dir = %self.dir.display(), entries = entries.len(), "stored index refreshed");

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.entries = entries;
        state.last_modified = Some(mtime);
        Ok(true)
    }

    /// Rebuild only if the directory changed since the last rebuild.
    pub fn refresh_if_stale(&self) -> Result<bool, IndexError> {
        self.refresh(SystemTime::UNIX_EPOCH)
    }

    pub fn last_modified(&self) -> Option<SystemTime> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .last_modified
    }

    pub fn snapshot(&self) -> IndexSnapshot {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        IndexSnapshot {
            entries: state.entries.clone(),
            last_modified: state.last_modified,
        }
    }

    /// True if `name` is in the current listing. This is the only gate for
    /// serving stored files, so it must match exact entries only.
    pub fn contains(&self, name: &str) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .binary_search_by(|e| e.as_str().cmp(name))
            .is_ok()
    }
}

/// Directory entry names without the temp suffix, sorted bytewise.
fn list_completed(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        match entry.file_name().into_string() {
            Ok(name) if !name.ends_with(TEMP_SUFFIX) => names.push(name),
            Ok(_) => {}
            Err(raw) => tracing::debug!(name = ?raw, "skipping non-UTF-8 file name"),
        }
    }
    names.sort();
    Ok(names)
}
