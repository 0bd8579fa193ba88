//! Repository handle providing the main gitstore API.

use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::index::{SearchHit, SearchIndex};
use crate::index_manager::{IndexManager, INDEXES_DIR};
use crate::resolve::{resolve, Layout, Resolved};
use crate::storage::{validate_name, LocalStorage};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Default name of the private directory inside the git metadata directory.
pub const DEFAULT_NAMESPACE: &str = "gitstore";

/// Options for [`Repository::open_with`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenOptions {
    /// Name of the private directory under the metadata directory.
    pub namespace: String,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

/// Open handle to a git-backed storage root.
///
/// Acquire once per unit of work and call [`Repository::close`] when done so
/// index files are flushed and released. Dropping the handle closes it too,
/// logging any failure instead of returning it.
///
/// # Examples
///
/// ```no_run
/// use gitstore_core::Repository;
///
/// # fn main() -> gitstore_core::Result<()> {
/// let repo = Repository::open(".")?;
/// let index = repo.get_index("bugs")?;
/// index.index_document("b1", "crash on startup")?;
/// repo.close()?;
/// # Ok(())
/// # }
/// ```
pub struct Repository {
    resolved: Resolved,
    namespace: String,
    config: Config,
    indexes: IndexManager,
}

impl Repository {
    /// Opens the repository enclosing `path` with default options.
    ///
    /// # Errors
    ///
    /// Returns `PathNotFound` if no repository encloses `path`, and
    /// `PermissionDenied` if the metadata directory is not readable and writable.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, OpenOptions::default())
    }

    /// Opens the repository enclosing `path`.
    pub fn open_with(path: impl AsRef<Path>, options: OpenOptions) -> Result<Self> {
        validate_name(&options.namespace)?;

        let resolved = resolve(path.as_ref())?;
        check_access(&resolved.git_dir)?;

        let storage_root = resolved.git_dir.join(&options.namespace);
        let config = Config::load(&storage_root)?;
        let indexes = IndexManager::new(storage_root.join(INDEXES_DIR), config.index.clone());

        debug!(
            git_dir = %resolved.git_dir.display(),
            bare = resolved.is_bare(),
            namespace = %options.namespace,
            "opened repository"
        );

        Ok(Self {
            resolved,
            namespace: options.namespace,
            config,
            indexes,
        })
    }

    /// Returns the working-tree root, or the metadata directory of a bare repository.
    pub fn root(&self) -> Result<&Path> {
        self.ensure_open()?;
        Ok(self.resolved.root())
    }

    /// Returns the canonical metadata directory.
    pub fn git_dir(&self) -> Result<&Path> {
        self.ensure_open()?;
        Ok(&self.resolved.git_dir)
    }

    /// Returns whether the repository has a working tree.
    pub fn layout(&self) -> Result<&Layout> {
        self.ensure_open()?;
        Ok(&self.resolved.layout)
    }

    /// Returns the private namespace name.
    pub fn namespace(&self) -> Result<&str> {
        self.ensure_open()?;
        Ok(&self.namespace)
    }

    /// Returns the configuration loaded at open time.
    pub fn config(&self) -> Result<&Config> {
        self.ensure_open()?;
        Ok(&self.config)
    }

    /// Returns the private storage area, creating it on first use.
    pub fn local_storage(&self) -> Result<LocalStorage> {
        self.ensure_open()?;
        LocalStorage::open(self.storage_root())
    }

    /// Returns the index `name`, opening or creating it on first use.
    ///
    /// See [`IndexManager::get_index`].
    pub fn get_index(&self, name: &str) -> Result<Arc<SearchIndex>> {
        self.indexes.get_index(name)
    }

    /// Closes and deletes the index `name`. See [`IndexManager::clear_index`].
    pub fn clear_index(&self, name: &str) -> Result<()> {
        self.indexes.clear_index(name)
    }

    /// Replaces the content of `name` with `documents`.
    ///
    /// Indices are never updated implicitly; call this after the underlying
    /// data changed.
    pub fn rebuild_index<I, D, T>(&self, name: &str, documents: I) -> Result<(Arc<SearchIndex>, usize)>
    where
        I: IntoIterator<Item = (D, T)>,
        D: AsRef<str>,
        T: AsRef<str>,
    {
        self.indexes.rebuild_index(name, documents)
    }

    /// Lists the indices present on disk.
    pub fn list_indices(&self) -> Result<Vec<String>> {
        self.indexes.list_indices()
    }

    /// Searches the index `name` with the configured result limits.
    pub fn search(&self, name: &str, query: &str) -> Result<Vec<SearchHit>> {
        let index = self.get_index(name)?;
        index.search(query, &self.config.search)
    }

    /// Returns true once the handle has been closed.
    pub fn is_closed(&self) -> bool {
        self.indexes.is_closed()
    }

    /// Closes every open index and makes the handle unusable.
    ///
    /// Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let result = self.indexes.close();
        debug!(git_dir = %self.resolved.git_dir.display(), "closed repository");
        result
    }

    fn storage_root(&self) -> PathBuf {
        self.resolved.git_dir.join(&self.namespace)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(StoreError::UseAfterClose);
        }
        Ok(())
    }
}

impl Drop for Repository {
    fn drop(&mut self) {
        if self.is_closed() {
            return;
        }
        if let Err(e) = self.close() {
            warn!(error = %e, "failed to close repository on drop");
        }
    }
}

/// Verifies this process can list the metadata directory and create files in it.
///
/// The write check creates an anonymous temp file, which vanishes on drop.
fn check_access(git_dir: &Path) -> Result<()> {
    fs::read_dir(git_dir).map_err(|e| StoreError::from_io(e, git_dir))?;
    tempfile::tempfile_in(git_dir).map_err(|e| StoreError::from_io(e, git_dir))?;
    Ok(())
}
