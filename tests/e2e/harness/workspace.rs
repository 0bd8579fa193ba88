use anyhow::{Context, Result};
use gitstore_core::{Repository, DEFAULT_NAMESPACE, INDEXES_DIR};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Manages isolated repository layouts with tempfile
pub struct TestWorkspace {
    dir: TempDir,
    git_dir: PathBuf,
    bare: bool,
}

impl TestWorkspace {
    /// Create a working-tree repository at `<tmp>/repo` with its `.git` directory
    pub fn worktree() -> Result<Self> {
        let dir = TempDir::new().context("Failed to create temp directory")?;
        let git_dir = dir.path().join("repo").join(".git");
        init_git_dir(&git_dir, false)?;
        Ok(Self {
            dir,
            git_dir,
            bare: false,
        })
    }

    /// Create a bare repository at `<tmp>/repo.git`
    pub fn bare() -> Result<Self> {
        let dir = TempDir::new().context("Failed to create temp directory")?;
        let git_dir = dir.path().join("repo.git");
        init_git_dir(&git_dir, true)?;
        Ok(Self {
            dir,
            git_dir,
            bare: true,
        })
    }

    /// Directory containing the repository
    pub fn parent(&self) -> &Path {
        self.dir.path()
    }

    /// Working-tree root, or the bare directory
    pub fn root(&self) -> PathBuf {
        if self.bare {
            self.git_dir.clone()
        } else {
            self.dir.path().join("repo")
        }
    }

    /// Metadata directory as created (not canonicalized)
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// Canonical metadata directory, as resolution reports it
    pub fn canonical_git_dir(&self) -> Result<PathBuf> {
        dunce::canonicalize(&self.git_dir).context("Failed to canonicalize git dir")
    }

    /// Directory of the index `name` in the default namespace
    pub fn index_dir(&self, name: &str) -> PathBuf {
        self.git_dir
            .join(DEFAULT_NAMESPACE)
            .join(INDEXES_DIR)
            .join(name)
    }

    /// Open the repository from `rel` below the root
    pub fn open_at(&self, rel: &str) -> Result<Repository> {
        let path = if rel.is_empty() {
            self.root()
        } else {
            self.root().join(rel)
        };
        Ok(Repository::open(path)?)
    }

    /// Open the repository from its root
    pub fn open(&self) -> Result<Repository> {
        self.open_at("")
    }

    /// Write file below the root
    pub fn write_file(&self, path: &str, content: &[u8]) -> Result<()> {
        let full_path = self.root().join(path);

        // Create parent directories
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directories for {}", path))?;
        }

        fs::write(&full_path, content)
            .with_context(|| format!("Failed to write file: {}", path))?;

        Ok(())
    }

    /// Count the entries of a directory
    pub fn entry_count(&self, dir: &Path) -> Result<usize> {
        Ok(fs::read_dir(dir)
            .with_context(|| format!("Failed to read {}", dir.display()))?
            .count())
    }
}

/// Lay out the entries git creates for a new repository
fn init_git_dir(git_dir: &Path, bare: bool) -> Result<()> {
    for sub in ["objects/info", "objects/pack", "objects/de", "refs/heads", "refs/tags", "hooks"] {
        fs::create_dir_all(git_dir.join(sub))
            .with_context(|| format!("Failed to create {}", sub))?;
    }
    fs::write(git_dir.join("HEAD"), "ref: refs/heads/main\n")?;
    fs::write(
        git_dir.join("config"),
        format!(
            "[core]\n\trepositoryformatversion = 0\n\tfilemode = true\n\tbare = {}\n",
            bare
        ),
    )?;
    Ok(())
}
