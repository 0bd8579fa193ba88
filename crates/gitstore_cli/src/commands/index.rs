//! Index management commands.

use super::with_repo;
use crate::Format;
use anyhow::{Context, Result};
use console::style;
use gitstore_core::SearchConfig;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::warn;

/// List indices present on disk.
pub fn list(path: &Path, format: Format) -> Result<()> {
    with_repo(path, |repo| {
        let names = repo.list_indices()?;
        match format {
            Format::Json => println!("{}", serde_json::to_string_pretty(&names)?),
            Format::Text => {
                if names.is_empty() {
                    println!("No indices.");
                }
                for name in names {
                    println!("{}", name);
                }
            }
        }
        Ok(())
    })
}

/// Add or replace one document.
pub fn add(path: &Path, name: &str, doc_id: &str, text: &str) -> Result<()> {
    with_repo(path, |repo| {
        let index = repo.get_index(name)?;
        index
            .index_document(doc_id, text)
            .with_context(|| format!("failed to index document {}", doc_id))?;
        println!("Indexed {} in {}", style(doc_id).cyan(), name);
        Ok(())
    })
}

/// Run a query and print ranked hits.
pub fn search(
    path: &Path,
    name: &str,
    query: &str,
    limit: Option<usize>,
    format: Format,
) -> Result<()> {
    with_repo(path, |repo| {
        let configured = &repo.config()?.search;
        let config = SearchConfig {
            max_results: limit.unwrap_or(configured.max_results),
            snippet_length: configured.snippet_length,
        };

        let index = repo.get_index(name)?;
        let hits = index.search(query, &config)?;

        match format {
            Format::Json => {
                let value: Vec<_> = hits
                    .iter()
                    .map(|h| json!({ "id": h.doc_id, "score": h.score, "snippet": h.snippet }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&value)?);
            }
            Format::Text => {
                if hits.is_empty() {
                    println!("No matches.");
                }
                for hit in hits {
                    println!(
                        "{} {}",
                        style(&hit.doc_id).cyan().bold(),
                        style(format!("({:.3})", hit.score)).dim()
                    );
                    println!("    {}", hit.snippet.replace('\n', " "));
                }
            }
        }
        Ok(())
    })
}

/// Rebuild an index from the files under `dir`.
pub fn rebuild(path: &Path, name: &str, dir: &Path, format: Format) -> Result<()> {
    let start = Instant::now();

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .context("invalid progress template")?,
    );
    spinner.set_message(format!("Reading {}...", dir.display()));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let mut files = Vec::new();
    collect_files(dir, &mut files)
        .with_context(|| format!("failed to read {}", dir.display()))?;

    let mut documents = Vec::with_capacity(files.len());
    for file in files {
        match fs::read_to_string(&file) {
            Ok(text) => {
                let doc_id = file
                    .strip_prefix(dir)
                    .unwrap_or(&file)
                    .to_string_lossy()
                    .replace('\\', "/");
                documents.push((doc_id, text));
            }
            Err(e) => warn!(file = %file.display(), error = %e, "skipping unreadable file"),
        }
    }

    spinner.set_message(format!("Indexing {} documents...", documents.len()));
    let result = with_repo(path, |repo| {
        let (_, written) = repo
            .rebuild_index(name, documents)
            .with_context(|| format!("failed to rebuild index {}", name))?;
        Ok(written)
    });
    spinner.finish_and_clear();
    let written = result?;

    let elapsed = start.elapsed();
    match format {
        Format::Json => {
            let value = json!({ "index": name, "documents": written, "seconds": elapsed.as_secs_f64() });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Format::Text => println!(
            "{} Rebuilt {} with {} documents in {:.2}s",
            style("✓").green(),
            name,
            written,
            elapsed.as_secs_f64()
        ),
    }
    Ok(())
}

/// Delete an index.
pub fn clear(path: &Path, name: &str) -> Result<()> {
    with_repo(path, |repo| {
        repo.clear_index(name)
            .with_context(|| format!("failed to clear index {}", name))?;
        println!("Cleared {}", name);
        Ok(())
    })
}

/// Print document count, location and tokenizer of an index.
pub fn stats(path: &Path, name: &str, format: Format) -> Result<()> {
    with_repo(path, |repo| {
        let index = repo.get_index(name)?;
        let count = index.doc_count()?;
        let tokenizer = index.tokenizer();

        match format {
            Format::Json => {
                let value = json!({
                    "index": index.name(),
                    "path": index.path().display().to_string(),
                    "documents": count,
                    "min_token_len": tokenizer.min_token_len,
                    "max_token_len": tokenizer.max_token_len,
                    "stop_words": tokenizer.stop_words,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            }
            Format::Text => {
                println!("index:      {}", index.name());
                println!("path:       {}", index.path().display());
                println!("documents:  {}", count);
                println!(
                    "tokens:     {}..={} chars, {} stop words",
                    tokenizer.min_token_len,
                    tokenizer.max_token_len,
                    tokenizer.stop_words.len()
                );
            }
        }
        Ok(())
    })
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_files(&entry.path(), files)?;
        } else if file_type.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(())
}
