//! Locating the git metadata directory from an arbitrary starting path.
//!
//! Resolution walks upward from the start path. At each level it first looks
//! for a `.git` child (working-tree layout), then checks whether the directory
//! itself carries the metadata markers (bare layout, or a path nested inside a
//! `.git` directory). The first match wins. A `.git` directory without the
//! markers does not count and the walk continues above it.

use crate::error::{Result, StoreError};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the metadata directory inside a working tree.
pub const GIT_DIR_NAME: &str = ".git";

/// Entries every git metadata directory contains.
const GIT_DIR_MARKERS: [&str; 3] = ["HEAD", "objects", "refs"];

/// Prefix of a `.git` pointer file (linked worktrees, submodules).
const GITDIR_PREFIX: &str = "gitdir:";

/// Shape of a resolved repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    /// Metadata lives in a `.git` directory beside a checked-out tree.
    WorkTree {
        /// Root of the working tree.
        work_tree: PathBuf,
    },
    /// Metadata-only repository; the metadata directory is the root.
    Bare,
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Canonical path to the metadata directory.
    pub git_dir: PathBuf,
    /// Working-tree or bare layout.
    pub layout: Layout,
}

impl Resolved {
    /// Returns the working-tree root when one exists, the metadata directory otherwise.
    pub fn root(&self) -> &Path {
        match &self.layout {
            Layout::WorkTree { work_tree } => work_tree,
            Layout::Bare => &self.git_dir,
        }
    }

    /// Returns true for a metadata-only repository.
    pub fn is_bare(&self) -> bool {
        matches!(self.layout, Layout::Bare)
    }
}

/// Resolves `start` to the canonical metadata directory of the enclosing repository.
///
/// # Errors
///
/// - `PathNotFound` if `start` does not exist or no ancestor is a repository.
///   The filesystem root itself is never a match.
/// - `PermissionDenied` if a directory on the way cannot be inspected.
/// - `NotADirectory` if a `.git` entry is neither a directory nor a valid pointer file.
///
/// # Examples
///
/// ```no_run
/// use gitstore_core::resolve;
///
/// let resolved = resolve(".").unwrap();
/// println!("{}", resolved.git_dir.display());
/// ```
pub fn resolve(start: impl AsRef<Path>) -> Result<Resolved> {
    let start = start.as_ref();
    let mut current = dunce::canonicalize(start).map_err(|e| match e.kind() {
        ErrorKind::NotFound => StoreError::PathNotFound {
            path: start.to_path_buf(),
        },
        _ => StoreError::from_io(e, start),
    })?;

    if !current.is_dir() {
        if let Some(parent) = current.parent() {
            current = parent.to_path_buf();
        }
    }

    loop {
        // The filesystem root never matches.
        let Some(parent) = current.parent().map(Path::to_path_buf) else {
            debug!(start = %start.display(), "reached filesystem root");
            return Err(StoreError::PathNotFound {
                path: start.to_path_buf(),
            });
        };

        debug!(dir = %current.display(), "probing for git metadata");

        let candidate = current.join(GIT_DIR_NAME);
        match fs::metadata(&candidate) {
            Ok(meta) if meta.is_dir() && is_git_dir(&candidate)? => {
                return Ok(Resolved {
                    git_dir: candidate,
                    layout: Layout::WorkTree { work_tree: current },
                });
            }
            Ok(meta) if meta.is_dir() => {
                debug!(dir = %candidate.display(), "skipping .git without metadata markers");
            }
            Ok(meta) if meta.is_file() => {
                let git_dir = follow_gitdir_file(&candidate, &current)?;
                return Ok(Resolved {
                    git_dir,
                    layout: Layout::WorkTree { work_tree: current },
                });
            }
            Ok(_) => return Err(StoreError::NotADirectory { path: candidate }),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::from_io(e, candidate)),
        }

        if is_git_dir(&current)? {
            let layout = layout_of(&current);
            return Ok(Resolved {
                git_dir: current,
                layout,
            });
        }

        current = parent;
    }
}

/// Returns true if `dir` carries every metadata marker.
///
/// # Errors
///
/// Fails on anything other than a missing marker, e.g. permission errors.
pub fn is_git_dir(dir: &Path) -> Result<bool> {
    for marker in GIT_DIR_MARKERS {
        let path = dir.join(marker);
        match fs::metadata(&path) {
            Ok(_) => continue,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(StoreError::from_io(e, path)),
        }
    }
    Ok(true)
}

/// Decides the layout of a directory matched by its markers.
///
/// A metadata directory named `.git` belongs to the working tree above it,
/// unless its config declares it bare.
fn layout_of(git_dir: &Path) -> Layout {
    let named_git = git_dir.file_name().is_some_and(|n| n == GIT_DIR_NAME);
    match git_dir.parent() {
        Some(work_tree) if named_git && !config_declares_bare(git_dir) => Layout::WorkTree {
            work_tree: work_tree.to_path_buf(),
        },
        _ => Layout::Bare,
    }
}

/// Reads `core.bare` from the repository config, treating any failure as "not bare".
fn config_declares_bare(git_dir: &Path) -> bool {
    let Ok(config) = fs::read_to_string(git_dir.join("config")) else {
        return false;
    };

    let mut in_core = false;
    for line in config.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_core = line.eq_ignore_ascii_case("[core]");
            continue;
        }
        if !in_core {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            if key.trim().eq_ignore_ascii_case("bare") {
                return value.trim().eq_ignore_ascii_case("true");
            }
        }
    }
    false
}

/// Follows a `gitdir: <path>` pointer file to the metadata directory it names.
fn follow_gitdir_file(file: &Path, work_tree: &Path) -> Result<PathBuf> {
    let content = fs::read_to_string(file).map_err(|e| StoreError::from_io(e, file))?;
    let target = content
        .lines()
        .next()
        .and_then(|line| line.strip_prefix(GITDIR_PREFIX))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| StoreError::NotADirectory {
            path: file.to_path_buf(),
        })?;

    let target = work_tree.join(target);
    let git_dir = dunce::canonicalize(&target).map_err(|e| match e.kind() {
        ErrorKind::NotFound => StoreError::NotADirectory {
            path: file.to_path_buf(),
        },
        _ => StoreError::from_io(e, &target),
    })?;

    // Linked worktree dirs share objects and refs through `commondir`; HEAD is always local.
    if !git_dir.is_dir() || !git_dir.join("HEAD").is_file() {
        return Err(StoreError::NotADirectory {
            path: file.to_path_buf(),
        });
    }

    debug!(pointer = %file.display(), git_dir = %git_dir.display(), "followed gitdir file");
    Ok(git_dir)
}
