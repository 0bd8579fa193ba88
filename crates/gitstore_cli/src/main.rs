//! gitstore CLI - Command-line interface for git-backed application storage.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use gitstore_core::StoreError;
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;

#[derive(Parser)]
#[command(name = "gitstore")]
#[command(about = "Application storage and search indices inside a git repository", long_about = None)]
#[command(version)]
struct Cli {
    /// Run as if started in this directory
    #[arg(short = 'C', global = true, default_value = ".")]
    path: PathBuf,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = Format::Text)]
    format: Format,

    #[command(subcommand)]
    command: Commands,
}

/// Output style for command results.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable text
    Text,
    /// Machine-readable JSON
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Show where the repository and its private storage live
    Where,
    /// Manage search indices
    Index {
        #[command(subcommand)]
        command: IndexCommands,
    },
}

#[derive(Subcommand)]
enum IndexCommands {
    /// List indices present on disk
    List,
    /// Add or replace a document in an index
    Add {
        /// Index name
        name: String,
        /// Document identifier
        doc_id: String,
        /// Document text
        text: String,
    },
    /// Search an index
    Search {
        /// Index name
        name: String,
        /// Free-text query
        query: String,
        /// Maximum results (defaults to the configured value)
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Rebuild an index from every file under a directory
    Rebuild {
        /// Index name
        name: String,
        /// Directory to index
        dir: PathBuf,
    },
    /// Delete an index from memory and disk
    Clear {
        /// Index name
        name: String,
    },
    /// Show index statistics
    Stats {
        /// Index name
        name: String,
    },
}

fn main() -> ExitCode {
    // Initialize tracing subscriber
    // Respects RUST_LOG environment variable (e.g., RUST_LOG=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {:#}", style("error:").red().bold(), err);
            let suggestion = err
                .chain()
                .find_map(|e| e.downcast_ref::<StoreError>())
                .and_then(StoreError::recovery_suggestion);
            if let Some(suggestion) = suggestion {
                eprintln!("{} {}", style("hint:").yellow(), suggestion);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let path = cli.path;
    let format = cli.format;

    match cli.command {
        Commands::Where => commands::where_::run(&path, format),
        Commands::Index { command } => match command {
            IndexCommands::List => commands::index::list(&path, format),
            IndexCommands::Add { name, doc_id, text } => {
                commands::index::add(&path, &name, &doc_id, &text)
            }
            IndexCommands::Search { name, query, limit } => {
                commands::index::search(&path, &name, &query, limit, format)
            }
            IndexCommands::Rebuild { name, dir } => {
                commands::index::rebuild(&path, &name, &dir, format)
            }
            IndexCommands::Clear { name } => commands::index::clear(&path, &name),
            IndexCommands::Stats { name } => commands::index::stats(&path, &name, format),
        },
    }
}
