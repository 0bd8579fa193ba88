//! Cache and disk lifecycle of named indices.
//!
//! Each index lives in `<storage>/indexes/<name>`. The manager hands out at
//! most one [`SearchIndex`] per name for its whole lifetime: the first
//! `get_index` opens or creates it, later calls return the same `Arc`.
//!
//! Nothing here coordinates with other processes. Two processes rebuilding
//! the same index at once can corrupt it; callers that need that must lock
//! above this layer.

use crate::config::IndexConfig;
use crate::error::{Result, StoreError};
use crate::index::SearchIndex;
use crate::storage::{remove_path, validate_name};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Directory holding all indices, relative to the namespace directory.
pub const INDEXES_DIR: &str = "indexes";

#[derive(Default)]
struct CacheState {
    open: HashMap<String, Arc<SearchIndex>>,
    closed: bool,
}

/// Per-handle registry of open indices.
pub struct IndexManager {
    root: PathBuf,
    tokenizer: IndexConfig,
    state: Mutex<CacheState>,
}

impl IndexManager {
    /// Creates a manager for indices under `root`. Nothing is touched on disk.
    pub fn new(root: impl Into<PathBuf>, tokenizer: IndexConfig) -> Self {
        Self {
            root: root.into(),
            tokenizer,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Returns the directory holding the indices.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the on-disk location of the index `name`.
    pub fn location(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }

    /// Returns the index `name`, opening it from disk or creating it on first use.
    ///
    /// Repeated calls return the same object until the index is cleared.
    ///
    /// # Errors
    ///
    /// - `InvalidName` if `name` could escape the indexes directory.
    /// - `IndexOpen` if the on-disk index is partial, unreadable or incompatible.
    /// - `IndexBusy` if another handle or process holds the index open.
    /// - `UseAfterClose` once the manager has been closed.
    ///
    /// A failed call leaves neither a cache entry nor new disk state behind.
    pub fn get_index(&self, name: &str) -> Result<Arc<SearchIndex>> {
        let mut state = self.lock();
        if state.closed {
            return Err(StoreError::UseAfterClose);
        }
        let location = self.location(name)?;

        if let Some(index) = state.open.get(name) {
            debug!(name, "index cache hit");
            return Ok(Arc::clone(index));
        }

        let exists = match fs::symlink_metadata(&location) {
            Ok(_) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(StoreError::from_io(e, &location)),
        };

        let index = if exists {
            let index = SearchIndex::open(name, &location)?;
            info!(name, path = %location.display(), "reopened index");
            index
        } else {
            let index = self.create(name, &location, |dir| {
                SearchIndex::create(name, dir, self.tokenizer.clone())
            })?;
            info!(name, path = %location.display(), "created index");
            index
        };

        let index = Arc::new(index);
        state.open.insert(name.to_string(), Arc::clone(&index));
        Ok(index)
    }

    /// Closes and forgets the index `name`, then deletes it from disk.
    ///
    /// Clearing an index that was never created succeeds without side effects.
    /// Objects handed out earlier for `name` are closed and must not be reused.
    pub fn clear_index(&self, name: &str) -> Result<()> {
        let mut state = self.lock();
        if state.closed {
            return Err(StoreError::UseAfterClose);
        }
        let location = self.location(name)?;

        let closed = match state.open.remove(name) {
            Some(index) => index.close(),
            None => Ok(()),
        };

        remove_path(&location)?;
        info!(name, "cleared index");
        closed
    }

    /// Clears `name` and rebuilds it from `documents` in one batch.
    ///
    /// Returns the fresh index and the number of documents written.
    pub fn rebuild_index<I, D, T>(&self, name: &str, documents: I) -> Result<(Arc<SearchIndex>, usize)>
    where
        I: IntoIterator<Item = (D, T)>,
        D: AsRef<str>,
        T: AsRef<str>,
    {
        self.clear_index(name)?;
        let index = self.get_index(name)?;
        let written = index.index_documents(documents)?;
        info!(name, written, "rebuilt index");
        Ok((index, written))
    }

    /// Lists the names of the indices present on disk, sorted.
    pub fn list_indices(&self) -> Result<Vec<String>> {
        if self.lock().closed {
            return Err(StoreError::UseAfterClose);
        }

        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::from_io(e, &self.root)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::from_io(e, &self.root))?;
            let file_type = entry
                .file_type()
                .map_err(|e| StoreError::from_io(e, entry.path()))?;
            if !file_type.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if validate_name(name).is_ok() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Returns true if `name` is currently cached.
    pub fn is_open(&self, name: &str) -> bool {
        self.lock().open.contains_key(name)
    }

    /// Returns true once [`IndexManager::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Closes every cached index and refuses further use.
    ///
    /// All indices are closed even if some fail; the first failure is
    /// reported together with the total count. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let mut state = self.lock();
        if state.closed {
            return Ok(());
        }
        state.closed = true;

        let mut first = None;
        let mut count = 0;
        for (name, index) in state.open.drain() {
            if let Err(e) = index.close() {
                warn!(name = %name, error = %e, "failed to close index");
                count += 1;
                first.get_or_insert(e);
            }
        }

        match first {
            None => Ok(()),
            Some(first) => Err(StoreError::Close {
                first: Box::new(first),
                count,
            }),
        }
    }

    /// Runs `init` to build a fresh index at `location`.
    ///
    /// On failure, the index directory is removed together with any parent
    /// directories this call brought into existence, up to the namespace
    /// directory.
    fn create<F>(&self, name: &str, location: &Path, init: F) -> Result<SearchIndex>
    where
        F: FnOnce(&Path) -> Result<SearchIndex>,
    {
        let boundary = self.root.parent().unwrap_or(&self.root);
        let mut topmost_new = location.to_path_buf();
        for dir in location.ancestors().skip(1) {
            if !dir.starts_with(boundary) || dir.exists() {
                break;
            }
            topmost_new = dir.to_path_buf();
        }

        match init(location) {
            Ok(index) => Ok(index),
            Err(e) => {
                if let Err(cleanup) = remove_path(location) {
                    warn!(name, error = %cleanup, "failed to remove partial index");
                }
                // Only empty parents go; anything written there meanwhile stays.
                for dir in location.ancestors().skip(1) {
                    if !dir.starts_with(&topmost_new) || fs::remove_dir(dir).is_err() {
                        break;
                    }
                }
                Err(e)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
