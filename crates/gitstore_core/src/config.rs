//! Configuration types for the private storage area.

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// File name of the configuration inside the namespace directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Configuration stored in `<git_dir>/<namespace>/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Search result configuration.
    #[serde(default)]
    pub search: SearchConfig,

    /// Tokenizer settings applied to newly created indices.
    #[serde(default)]
    pub index: IndexConfig,
}

impl Config {
    /// Load configuration from a namespace directory.
    ///
    /// Returns the defaults if no config file exists.
    pub fn load(storage_root: &Path) -> Result<Self> {
        let path = storage_root.join(CONFIG_FILE);
        if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
                std::io::ErrorKind::PermissionDenied => StoreError::from_io(e, &path),
                _ => StoreError::Config(format!("failed to read config: {}", e)),
            })?;
            let config: Config = toml::from_str(&content)
                .map_err(|e| StoreError::Config(format!("failed to parse config: {}", e)))?;
            config.index.validate()?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to a namespace directory.
    pub fn save(&self, storage_root: &Path) -> Result<()> {
        self.index.validate()?;
        let path = storage_root.join(CONFIG_FILE);
        let content = toml::to_string_pretty(self)
            .map_err(|e| StoreError::Config(format!("failed to serialize config: {}", e)))?;
        fs::create_dir_all(storage_root).map_err(|e| StoreError::from_io(e, storage_root))?;
        fs::write(&path, content)
            .map_err(|e| StoreError::Config(format!("failed to write config: {}", e)))?;
        Ok(())
    }
}

/// Search result configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchConfig {
    /// Maximum search results to return (default: 20).
    pub max_results: usize,

    /// Snippet length for search results in characters (default: 150).
    pub snippet_length: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: 20,
            snippet_length: 150,
        }
    }
}

/// Tokenizer settings.
///
/// Captured in an index's descriptor when the index is created, so an index
/// is always queried with the tokenizer that built it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexConfig {
    /// Shortest token kept (default: 2).
    pub min_token_len: usize,

    /// Longest token kept (default: 64).
    pub max_token_len: usize,

    /// Lowercase words dropped at tokenization time.
    #[serde(default)]
    pub stop_words: Vec<String>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            min_token_len: 2,
            max_token_len: 64,
            stop_words: Vec::new(),
        }
    }
}

impl IndexConfig {
    /// Checks that the token length bounds are usable.
    pub fn validate(&self) -> Result<()> {
        if self.min_token_len == 0 || self.min_token_len > self.max_token_len {
            return Err(StoreError::Config(format!(
                "invalid token length bounds: min {} max {}",
                self.min_token_len, self.max_token_len
            )));
        }
        Ok(())
    }
}
