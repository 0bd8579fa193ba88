//! CLI commands.

pub mod index;
pub mod where_;

use anyhow::{Context, Result};
use gitstore_core::Repository;
use std::path::Path;

/// Opens the repository, runs `f`, and always closes the handle afterwards.
///
/// An error from `f` takes precedence over a close error.
pub fn with_repo<T>(path: &Path, f: impl FnOnce(&Repository) -> Result<T>) -> Result<T> {
    let repo = Repository::open(path)
        .with_context(|| format!("failed to open repository at {}", path.display()))?;

    let result = f(&repo);
    let closed = repo.close().context("failed to close repository");

    let value = result?;
    closed?;
    Ok(value)
}
