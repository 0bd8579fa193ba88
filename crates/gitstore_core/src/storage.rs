//! Private, untracked file tree under `<git_dir>/<namespace>`.

use crate::error::{Result, StoreError};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Namespaced file tree for data that is not versioned by git.
///
/// All paths handed to this type are relative, `/`-separated and validated so
/// they cannot escape the namespace directory. The empty path denotes the root.
///
/// # Examples
///
/// ```
/// use gitstore_core::LocalStorage;
/// use tempfile::TempDir;
///
/// let tmp = TempDir::new().unwrap();
/// let storage = LocalStorage::open(tmp.path().join("gitstore")).unwrap();
///
/// storage.write("excerpts/bug-1", b"crash on start").unwrap();
/// assert_eq!(storage.read("excerpts/bug-1").unwrap(), b"crash on start");
/// assert_eq!(storage.list("excerpts").unwrap(), vec!["bug-1".to_string()]);
/// ```
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Opens the storage rooted at `root`, creating the directory if needed.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| StoreError::from_io(e, &root))?;
        Ok(Self { root })
    }

    /// Returns the namespace directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a validated relative path to its absolute location.
    pub fn path(&self, rel: &str) -> Result<PathBuf> {
        let mut path = self.root.clone();
        if rel.is_empty() {
            return Ok(path);
        }
        for segment in rel.split('/') {
            validate_name(segment)?;
            path.push(segment);
        }
        Ok(path)
    }

    /// Returns true if a file or directory exists at `rel`.
    pub fn exists(&self, rel: &str) -> Result<bool> {
        Ok(self.path(rel)?.exists())
    }

    /// Reads a whole file.
    pub fn read(&self, rel: &str) -> Result<Vec<u8>> {
        let path = self.path(rel)?;
        fs::read(&path).map_err(|e| StoreError::from_io(e, path))
    }

    /// Reads a whole file as UTF-8.
    pub fn read_to_string(&self, rel: &str) -> Result<String> {
        let path = self.path(rel)?;
        fs::read_to_string(&path).map_err(|e| StoreError::from_io(e, path))
    }

    /// Writes a file atomically, creating parent directories as needed.
    pub fn write(&self, rel: &str, data: &[u8]) -> Result<()> {
        let path = self.path(rel)?;
        if path == self.root {
            return Err(StoreError::InvalidName {
                name: rel.to_string(),
                reason: "cannot write to the storage root",
            });
        }
        write_atomic(&path, data)
    }

    /// Creates a directory and its parents, returning its absolute path.
    pub fn create_dir_all(&self, rel: &str) -> Result<PathBuf> {
        let path = self.path(rel)?;
        fs::create_dir_all(&path).map_err(|e| StoreError::from_io(e, &path))?;
        Ok(path)
    }

    /// Lists the entry names of a directory, sorted.
    ///
    /// A missing directory lists as empty.
    pub fn list(&self, rel: &str) -> Result<Vec<String>> {
        let path = self.path(rel)?;
        let entries = match fs::read_dir(&path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::from_io(e, path)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::from_io(e, &path))?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Removes a file or a whole directory tree. Missing entries are not an error.
    pub fn remove(&self, rel: &str) -> Result<()> {
        let path = self.path(rel)?;
        if path == self.root {
            return Err(StoreError::InvalidName {
                name: rel.to_string(),
                reason: "cannot remove the storage root",
            });
        }
        remove_path(&path)
    }
}

/// Validates a single path segment or index name.
///
/// Rejects empty names, `.` and `..`, separators and NUL bytes.
pub fn validate_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name == "." || name == ".." {
        Some("name is a relative directory reference")
    } else if name.contains(['/', '\\']) {
        Some("name contains a path separator")
    } else if name.contains('\0') {
        Some("name contains a NUL byte")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(StoreError::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Removes a file or directory tree; a missing path succeeds.
pub(crate) fn remove_path(path: &Path) -> Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(StoreError::from_io(e, path)),
    };

    let removed = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    match removed {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::from_io(e, path)),
    }
}

/// Writes `data` to `path` through a uniquely named temp file and rename.
///
/// Concurrent writers to the same path never share a temp file; the last
/// rename wins.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(parent).map_err(|e| StoreError::from_io(e, parent))?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| StoreError::from_io(e, parent))?;
    tmp.write_all(data)
        .map_err(|e| StoreError::from_io(e, tmp.path()))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| StoreError::from_io(e, tmp.path()))?;
    tmp.persist(path)
        .map_err(|e| StoreError::from_io(e.error, path))?;

    #[cfg(unix)]
    {
        if let Ok(dir_file) = File::open(parent) {
            let _ = dir_file.sync_all();
        }
    }

    Ok(())
}
