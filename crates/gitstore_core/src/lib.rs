//! gitstore Core Library
//!
//! Keeps application state next to a git repository instead of on a separate
//! server, providing:
//! - Resolution of the git metadata directory from any path inside a repository
//! - A private, untracked storage area under that directory
//! - Named, persisted full-text indices with a strict open/clear lifecycle
//!
//! # Quick Start
//!
//! ```
//! use gitstore_core::Repository;
//! use std::fs;
//! use tempfile::TempDir;
//!
//! let tmp = TempDir::new().unwrap();
//! let git = tmp.path().join(".git");
//! fs::create_dir_all(git.join("objects")).unwrap();
//! fs::create_dir_all(git.join("refs")).unwrap();
//! fs::write(git.join("HEAD"), "ref: refs/heads/main\n").unwrap();
//!
//! let repo = Repository::open(tmp.path()).unwrap();
//! let bugs = repo.get_index("bugs").unwrap();
//! bugs.index_document("b1", "Crash when the config file is empty").unwrap();
//!
//! let hits = repo.search("bugs", "crash").unwrap();
//! assert_eq!(hits[0].doc_id, "b1");
//!
//! repo.close().unwrap();
//! ```
//!
//! # On-disk layout
//!
//! ```text
//! <git_dir>/<namespace>/config.toml                  optional configuration
//! <git_dir>/<namespace>/indexes/<name>/index_meta.json
//! <git_dir>/<namespace>/indexes/<name>/store
//! ```

mod config;
mod error;
mod index;
mod index_manager;
mod repo;
mod resolve;
mod storage;

pub use config::{Config, IndexConfig, SearchConfig, CONFIG_FILE};
pub use error::{ErrorKind, Result, StoreError};
pub use index::{
    tokenize, IndexMeta, SearchHit, SearchIndex, ENGINE_NAME, ENGINE_VERSION, META_FILE,
    STORE_FILE,
};
pub use index_manager::{IndexManager, INDEXES_DIR};
pub use repo::{OpenOptions, Repository, DEFAULT_NAMESPACE};
pub use resolve::{is_git_dir, resolve, Layout, Resolved, GIT_DIR_NAME};
pub use storage::{validate_name, LocalStorage};
