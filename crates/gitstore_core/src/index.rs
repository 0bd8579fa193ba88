//! Persisted full-text index.
//!
//! An index lives in its own directory holding two entries: `index_meta.json`,
//! a small descriptor naming the engine, its version and the tokenizer
//! settings, and `store`, a redb database with the inverted index. Both are
//! always present together; either one missing means the index is corrupt.

use crate::config::{IndexConfig, SearchConfig};
use crate::error::{Result, StoreError};
use crate::storage::write_atomic;
use redb::{Database, DatabaseError, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Engine identifier written to the descriptor.
pub const ENGINE_NAME: &str = "gitstore-fulltext";

/// Engine version; a descriptor or store with another version is rejected.
pub const ENGINE_VERSION: u32 = 1;

/// Descriptor file name inside an index directory.
pub const META_FILE: &str = "index_meta.json";

/// Backing database file name inside an index directory.
pub const STORE_FILE: &str = "store";

const STORAGE_KIND: &str = "redb";
const SCHEMA_ID: &str = "gitstore.fulltext.v1";

// Table definitions
const METADATA_TABLE: TableDefinition<&str, u32> = TableDefinition::new("metadata");
const DOCS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("docs");
const DOC_TERMS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("doc_terms");
const POSTINGS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("postings");

/// Contents of `index_meta.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexMeta {
    /// Engine identifier.
    pub engine: String,
    /// Engine version.
    pub version: u32,
    /// Backing storage kind.
    pub storage: String,
    /// Schema identifier of the store tables.
    pub schema: String,
    /// Tokenizer the index was built with.
    pub tokenizer: IndexConfig,
}

impl IndexMeta {
    fn new(tokenizer: IndexConfig) -> Self {
        Self {
            engine: ENGINE_NAME.to_string(),
            version: ENGINE_VERSION,
            storage: STORAGE_KIND.to_string(),
            schema: SCHEMA_ID.to_string(),
            tokenizer,
        }
    }

    fn check(&self, name: &str) -> Result<()> {
        if self.engine != ENGINE_NAME || self.storage != STORAGE_KIND {
            return Err(open_err(
                name,
                format!("unsupported engine {}/{}", self.engine, self.storage),
            ));
        }
        if self.version != ENGINE_VERSION {
            return Err(open_err(
                name,
                format!(
                    "engine version mismatch: found {}, expected {}",
                    self.version, ENGINE_VERSION
                ),
            ));
        }
        if self.schema != SCHEMA_ID {
            return Err(open_err(name, format!("unknown schema {}", self.schema)));
        }
        self.tokenizer
            .validate()
            .map_err(|e| open_err(name, e.to_string()))
    }
}

/// A ranked search result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Identifier the document was indexed under.
    pub doc_id: String,
    /// TF-IDF score, higher is better.
    pub score: f64,
    /// Excerpt of the document around the first matching term.
    pub snippet: String,
}

/// Handle to one open full-text index.
///
/// The handle owns the open database file. [`SearchIndex::close`] releases it;
/// afterwards every operation fails with `IndexClosed`.
pub struct SearchIndex {
    name: String,
    dir: PathBuf,
    tokenizer: IndexConfig,
    db: RwLock<Option<Database>>,
}

impl fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchIndex")
            .field("name", &self.name)
            .field("dir", &self.dir)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl SearchIndex {
    /// Creates a fresh, empty index in `dir`.
    ///
    /// The store is written first and the descriptor last, so an interrupted
    /// creation is detected as corrupt on the next open.
    pub(crate) fn create(name: &str, dir: &Path, tokenizer: IndexConfig) -> Result<Self> {
        tokenizer.validate()?;
        fs::create_dir_all(dir).map_err(|e| StoreError::from_io(e, dir))?;

        let db = Database::create(dir.join(STORE_FILE))
            .map_err(|e| open_err(name, format!("failed to create store: {}", e)))?;

        let write_txn = db
            .begin_write()
            .map_err(|e| open_err(name, format!("failed to begin write transaction: {}", e)))?;
        {
            let mut table = write_txn
                .open_table(METADATA_TABLE)
                .map_err(|e| open_err(name, format!("failed to open metadata table: {}", e)))?;
            table
                .insert("version", ENGINE_VERSION)
                .map_err(|e| open_err(name, format!("failed to insert version: {}", e)))?;

            // Create the remaining tables so read transactions find them.
            write_txn
                .open_table(DOCS_TABLE)
                .map_err(|e| open_err(name, format!("failed to create docs table: {}", e)))?;
            write_txn
                .open_table(DOC_TERMS_TABLE)
                .map_err(|e| open_err(name, format!("failed to create terms table: {}", e)))?;
            write_txn
                .open_table(POSTINGS_TABLE)
                .map_err(|e| open_err(name, format!("failed to create postings table: {}", e)))?;
        }
        write_txn
            .commit()
            .map_err(|e| open_err(name, format!("failed to commit: {}", e)))?;

        let meta = IndexMeta::new(tokenizer.clone());
        let json = serde_json::to_vec_pretty(&meta)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        write_atomic(&dir.join(META_FILE), &json)?;

        Ok(Self {
            name: name.to_string(),
            dir: dir.to_path_buf(),
            tokenizer,
            db: RwLock::new(Some(db)),
        })
    }

    /// Opens an index previously created in `dir`.
    ///
    /// # Errors
    ///
    /// Returns `IndexOpen` if the descriptor or store is missing, unreadable,
    /// or written by an incompatible engine version, and `IndexBusy` if the
    /// store is already open elsewhere.
    pub(crate) fn open(name: &str, dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(open_err(name, format!("{} is not a directory", dir.display())));
        }

        let meta_path = dir.join(META_FILE);
        let store_path = dir.join(STORE_FILE);
        match (meta_path.is_file(), store_path.is_file()) {
            (true, true) => {}
            (false, false) => return Err(open_err(name, "descriptor and store are missing")),
            (false, true) => return Err(open_err(name, "descriptor is missing")),
            (true, false) => return Err(open_err(name, "store is missing")),
        }

        let raw = fs::read(&meta_path).map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => StoreError::from_io(e, &meta_path),
            _ => open_err(name, format!("failed to read descriptor: {}", e)),
        })?;
        let meta: IndexMeta = serde_json::from_slice(&raw)
            .map_err(|e| open_err(name, format!("invalid descriptor: {}", e)))?;
        meta.check(name)?;

        let db = Database::open(&store_path).map_err(|e| match e {
            DatabaseError::DatabaseAlreadyOpen => StoreError::IndexBusy {
                name: name.to_string(),
            },
            e => open_err(name, format!("failed to open store: {}", e)),
        })?;

        // Verify schema version
        let read_txn = db
            .begin_read()
            .map_err(|e| open_err(name, format!("failed to begin read transaction: {}", e)))?;
        let table = read_txn
            .open_table(METADATA_TABLE)
            .map_err(|e| open_err(name, format!("failed to open metadata table: {}", e)))?;
        let version = table
            .get("version")
            .map_err(|e| open_err(name, format!("failed to read version: {}", e)))?
            .map(|v| v.value());
        if version != Some(ENGINE_VERSION) {
            return Err(open_err(
                name,
                format!(
                    "store version mismatch: found {:?}, expected {}",
                    version, ENGINE_VERSION
                ),
            ));
        }
        drop(table);
        drop(read_txn);

        Ok(Self {
            name: name.to_string(),
            dir: dir.to_path_buf(),
            tokenizer: meta.tokenizer,
            db: RwLock::new(Some(db)),
        })
    }

    /// Returns the index name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the index directory.
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Returns the tokenizer settings the index was built with.
    pub fn tokenizer(&self) -> &IndexConfig {
        &self.tokenizer
    }

    /// Returns true once the index has been closed.
    pub fn is_closed(&self) -> bool {
        match self.db.read() {
            Ok(guard) => guard.is_none(),
            Err(_) => true,
        }
    }

    /// Releases the underlying database file. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let mut guard = self
            .db
            .write()
            .map_err(|_| self.search_err("close", "lock poisoned"))?;
        // Dropping the database flushes and releases the file.
        guard.take();
        Ok(())
    }

    /// Adds or replaces a single document.
    pub fn index_document(&self, doc_id: &str, text: &str) -> Result<()> {
        self.index_documents([(doc_id, text)]).map(|_| ())
    }

    /// Adds or replaces a batch of documents in a single transaction.
    ///
    /// Returns the number of documents written.
    pub fn index_documents<I, D, T>(&self, documents: I) -> Result<usize>
    where
        I: IntoIterator<Item = (D, T)>,
        D: AsRef<str>,
        T: AsRef<str>,
    {
        self.with_db(|db| {
            let write_txn = db
                .begin_write()
                .map_err(|e| self.search_err("begin write", e))?;
            let mut written = 0;
            {
                let mut docs = write_txn
                    .open_table(DOCS_TABLE)
                    .map_err(|e| self.search_err("open docs table", e))?;
                let mut doc_terms = write_txn
                    .open_table(DOC_TERMS_TABLE)
                    .map_err(|e| self.search_err("open terms table", e))?;
                let mut postings = write_txn
                    .open_table(POSTINGS_TABLE)
                    .map_err(|e| self.search_err("open postings table", e))?;

                for (doc_id, text) in documents {
                    let (doc_id, text) = (doc_id.as_ref(), text.as_ref());
                    if doc_id.is_empty() {
                        return Err(StoreError::InvalidName {
                            name: doc_id.to_string(),
                            reason: "document id is empty",
                        });
                    }

                    // Unlink the previous version of the document
                    let old_terms = self.load_terms(&doc_terms, doc_id)?;
                    for term in &old_terms {
                        let mut entry = self.load_postings(&postings, term)?;
                        entry.remove(doc_id);
                        if entry.is_empty() {
                            postings
                                .remove(term.as_str())
                                .map_err(|e| self.search_err("remove posting", e))?;
                        } else {
                            let bytes = self.encode(&entry)?;
                            postings
                                .insert(term.as_str(), bytes.as_slice())
                                .map_err(|e| self.search_err("insert posting", e))?;
                        }
                    }

                    let frequencies = term_frequencies(text, &self.tokenizer);
                    for (term, tf) in &frequencies {
                        let mut entry = self.load_postings(&postings, term)?;
                        entry.insert(doc_id.to_string(), *tf);
                        let bytes = self.encode(&entry)?;
                        postings
                            .insert(term.as_str(), bytes.as_slice())
                            .map_err(|e| self.search_err("insert posting", e))?;
                    }

                    let terms: Vec<&String> = frequencies.keys().collect();
                    let bytes = self.encode(&terms)?;
                    doc_terms
                        .insert(doc_id, bytes.as_slice())
                        .map_err(|e| self.search_err("insert terms", e))?;
                    docs.insert(doc_id, text)
                        .map_err(|e| self.search_err("insert document", e))?;
                    written += 1;
                }
            }
            write_txn
                .commit()
                .map_err(|e| self.search_err("commit", e))?;
            Ok(written)
        })
    }

    /// Removes a document. Returns false if it was not indexed.
    pub fn delete_document(&self, doc_id: &str) -> Result<bool> {
        self.with_db(|db| {
            let write_txn = db
                .begin_write()
                .map_err(|e| self.search_err("begin write", e))?;
            let existed;
            {
                let mut docs = write_txn
                    .open_table(DOCS_TABLE)
                    .map_err(|e| self.search_err("open docs table", e))?;
                let mut doc_terms = write_txn
                    .open_table(DOC_TERMS_TABLE)
                    .map_err(|e| self.search_err("open terms table", e))?;
                let mut postings = write_txn
                    .open_table(POSTINGS_TABLE)
                    .map_err(|e| self.search_err("open postings table", e))?;

                let old_terms = self.load_terms(&doc_terms, doc_id)?;
                for term in &old_terms {
                    let mut entry = self.load_postings(&postings, term)?;
                    entry.remove(doc_id);
                    if entry.is_empty() {
                        postings
                            .remove(term.as_str())
                            .map_err(|e| self.search_err("remove posting", e))?;
                    } else {
                        let bytes = self.encode(&entry)?;
                        postings
                            .insert(term.as_str(), bytes.as_slice())
                            .map_err(|e| self.search_err("insert posting", e))?;
                    }
                }
                doc_terms
                    .remove(doc_id)
                    .map_err(|e| self.search_err("remove terms", e))?;
                existed = docs
                    .remove(doc_id)
                    .map_err(|e| self.search_err("remove document", e))?
                    .is_some();
            }
            write_txn
                .commit()
                .map_err(|e| self.search_err("commit", e))?;
            Ok(existed)
        })
    }

    /// Returns the stored text of a document.
    pub fn document(&self, doc_id: &str) -> Result<Option<String>> {
        self.with_db(|db| {
            let read_txn = db
                .begin_read()
                .map_err(|e| self.search_err("begin read", e))?;
            let docs = read_txn
                .open_table(DOCS_TABLE)
                .map_err(|e| self.search_err("open docs table", e))?;
            let text = docs
                .get(doc_id)
                .map_err(|e| self.search_err("read document", e))?
                .map(|v| v.value().to_string());
            Ok(text)
        })
    }

    /// Returns the number of indexed documents.
    pub fn doc_count(&self) -> Result<usize> {
        self.with_db(|db| {
            let read_txn = db
                .begin_read()
                .map_err(|e| self.search_err("begin read", e))?;
            let docs = read_txn
                .open_table(DOCS_TABLE)
                .map_err(|e| self.search_err("open docs table", e))?;
            let count = docs
                .iter()
                .map_err(|e| self.search_err("iterate documents", e))?
                .count();
            Ok(count)
        })
    }

    /// Runs a free-text query, ranking documents by TF-IDF.
    ///
    /// Any query term may match. Ties are broken by document id.
    pub fn search(&self, query: &str, config: &SearchConfig) -> Result<Vec<SearchHit>> {
        let terms: BTreeSet<String> = tokenize(query, &self.tokenizer)
            .into_iter()
            .map(|(token, _)| token)
            .collect();
        if terms.is_empty() || config.max_results == 0 {
            return Ok(Vec::new());
        }

        self.with_db(|db| {
            let read_txn = db
                .begin_read()
                .map_err(|e| self.search_err("begin read", e))?;
            let docs = read_txn
                .open_table(DOCS_TABLE)
                .map_err(|e| self.search_err("open docs table", e))?;
            let postings = read_txn
                .open_table(POSTINGS_TABLE)
                .map_err(|e| self.search_err("open postings table", e))?;

            let total = docs
                .iter()
                .map_err(|e| self.search_err("iterate documents", e))?
                .count() as f64;

            let mut scores: BTreeMap<String, f64> = BTreeMap::new();
            for term in &terms {
                let entry = self.load_postings(&postings, term)?;
                if entry.is_empty() {
                    continue;
                }
                let idf = (1.0 + total / entry.len() as f64).ln();
                for (doc_id, tf) in entry {
                    *scores.entry(doc_id).or_default() += f64::from(tf) * idf;
                }
            }

            let mut ranked: Vec<(String, f64)> = scores.into_iter().collect();
            ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            ranked.truncate(config.max_results);

            let mut hits = Vec::with_capacity(ranked.len());
            for (doc_id, score) in ranked {
                let text = docs
                    .get(doc_id.as_str())
                    .map_err(|e| self.search_err("read document", e))?
                    .map(|v| v.value().to_string())
                    .unwrap_or_default();
                let snippet = snippet(&text, &terms, &self.tokenizer, config.snippet_length);
                hits.push(SearchHit {
                    doc_id,
                    score,
                    snippet,
                });
            }
            Ok(hits)
        })
    }

    fn with_db<T>(&self, f: impl FnOnce(&Database) -> Result<T>) -> Result<T> {
        let guard = self
            .db
            .read()
            .map_err(|_| self.search_err("access", "lock poisoned"))?;
        match guard.as_ref() {
            Some(db) => f(db),
            None => Err(StoreError::IndexClosed {
                name: self.name.clone(),
            }),
        }
    }

    fn load_terms(
        &self,
        table: &impl ReadableTable<&'static str, &'static [u8]>,
        doc_id: &str,
    ) -> Result<Vec<String>> {
        let bytes = table
            .get(doc_id)
            .map_err(|e| self.search_err("read terms", e))?
            .map(|v| v.value().to_vec());
        match bytes {
            Some(bytes) => postcard::from_bytes(&bytes)
                .map_err(|e| self.search_err("decode terms", e)),
            None => Ok(Vec::new()),
        }
    }

    fn load_postings(
        &self,
        table: &impl ReadableTable<&'static str, &'static [u8]>,
        term: &str,
    ) -> Result<BTreeMap<String, u32>> {
        let bytes = table
            .get(term)
            .map_err(|e| self.search_err("read posting", e))?
            .map(|v| v.value().to_vec());
        match bytes {
            Some(bytes) => postcard::from_bytes(&bytes)
                .map_err(|e| self.search_err("decode posting", e)),
            None => Ok(BTreeMap::new()),
        }
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        postcard::to_allocvec(value).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn search_err(&self, action: &str, err: impl fmt::Display) -> StoreError {
        StoreError::Search {
            name: self.name.clone(),
            reason: format!("{}: {}", action, err),
        }
    }
}

fn open_err(name: &str, reason: impl Into<String>) -> StoreError {
    StoreError::IndexOpen {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Splits text into lowercase alphanumeric tokens with their char offsets.
///
/// Tokens outside the configured length bounds and stop words are dropped.
pub fn tokenize(text: &str, config: &IndexConfig) -> Vec<(String, usize)> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut start = 0;

    let mut push = |token: String, offset: usize| {
        let len = token.chars().count();
        if len < config.min_token_len || len > config.max_token_len {
            return;
        }
        if config.stop_words.iter().any(|w| *w == token) {
            return;
        }
        tokens.push((token, offset));
    };

    for (i, ch) in text.chars().enumerate() {
        if ch.is_alphanumeric() {
            if current.is_empty() {
                start = i;
            }
            current.extend(ch.to_lowercase());
        } else if !current.is_empty() {
            push(std::mem::take(&mut current), start);
        }
    }
    if !current.is_empty() {
        push(current, start);
    }

    tokens
}

fn term_frequencies(text: &str, config: &IndexConfig) -> BTreeMap<String, u32> {
    let mut frequencies = BTreeMap::new();
    for (token, _) in tokenize(text, config) {
        *frequencies.entry(token).or_insert(0) += 1;
    }
    frequencies
}

/// Cuts a window of `length` chars around the first occurrence of any term.
fn snippet(text: &str, terms: &BTreeSet<String>, config: &IndexConfig, length: usize) -> String {
    let first_match = tokenize(text, config)
        .into_iter()
        .find(|(token, _)| terms.contains(token))
        .map(|(_, offset)| offset)
        .unwrap_or(0);
    let start = first_match.saturating_sub(length / 4);
    text.chars().skip(start).take(length).collect()
}
