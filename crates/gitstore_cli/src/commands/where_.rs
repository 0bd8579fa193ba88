//! Show the resolved repository locations.

use super::with_repo;
use crate::Format;
use anyhow::Result;
use gitstore_core::Layout;
use serde_json::json;
use std::path::Path;

/// Print layout, metadata directory, root and private storage path.
pub fn run(path: &Path, format: Format) -> Result<()> {
    with_repo(path, |repo| {
        let git_dir = repo.git_dir()?;
        let root = repo.root()?;
        let bare = matches!(repo.layout()?, Layout::Bare);
        let storage = git_dir.join(repo.namespace()?);

        match format {
            Format::Json => {
                let value = json!({
                    "layout": if bare { "bare" } else { "worktree" },
                    "git_dir": git_dir.display().to_string(),
                    "root": root.display().to_string(),
                    "storage": storage.display().to_string(),
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            }
            Format::Text => {
                println!("layout:   {}", if bare { "bare" } else { "worktree" });
                println!("git dir:  {}", git_dir.display());
                println!("root:     {}", root.display());
                println!("storage:  {}", storage.display());
            }
        }
        Ok(())
    })
}
