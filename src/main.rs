//! Reindex - live full-text search over watched files
//!
//! Entry point for the interactive `reindex` shell.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::time::Duration;

use clap::Parser;
use reindex::metrics::gather_text;
use reindex::observability::{config_from_env, init_tracing};
use reindex::{Config, Reindexer, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Reindex - live full-text search over watched files
#[derive(Parser, Debug)]
#[command(name = "reindex")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directories to watch and index recursively
    #[arg(short, long = "dir", env = "REINDEX_DIRS", value_delimiter = ',')]
    dirs: Vec<std::path::PathBuf>,

    /// Single files to watch and index
    #[arg(short, long = "file", env = "REINDEX_FILES", value_delimiter = ',')]
    files: Vec<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error) [env: REINDEX_LOG_LEVEL, default: info]
    #[arg(long)]
    log_level: Option<String>,

    /// Enable JSON logging output [env: REINDEX_LOG_JSON]
    #[arg(long)]
    log_json: bool,

    /// Quiet period per path before a change is indexed, in milliseconds
    #[arg(long, default_value = "1000")]
    quiet_period_ms: u64,

    /// Interval between index compactions, in seconds
    #[arg(long, default_value = "30")]
    compaction_period_secs: u64,

    /// Number of indexing worker threads
    #[arg(long)]
    indexing_threads: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let tracing_config = config_from_env().with_overrides(cli.log_level, cli.log_json);
    init_tracing(&tracing_config.level, tracing_config.json)?;

    tracing::info!("Reindex v{} starting...", env!("CARGO_PKG_VERSION"));

    let defaults = Config::default();
    let config = Config {
        quiet_period: Duration::from_millis(cli.quiet_period_ms),
        compaction_period: Duration::from_secs(cli.compaction_period_secs),
        indexing_threads: cli.indexing_threads.unwrap_or(defaults.indexing_threads),
        log_level: tracing_config.level,
        watch_dirs: cli.dirs,
        watch_files: cli.files,
        ..defaults
    };

    tracing::debug!(?config, "Configuration loaded");

    let reindexer = Reindexer::new(config)?;
    tracing::info!(watched = ?reindexer.watched_paths(), "Ready for queries");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        };
        let Some(line) = line else { break };

        match line.trim() {
            "" => {}
            ":quit" => break,
            ":count" => println!("{}", reindexer.indexed_files()),
            ":metrics" => print!("{}", gather_text()?),
            query => match reindexer.search(query) {
                Ok(paths) => {
                    println!("{} match(es)", paths.len());
                    for path in paths {
                        println!("  {path}");
                    }
                }
                Err(e) => eprintln!("{e}"),
            },
        }
    }

    tokio::task::spawn_blocking(move || drop(reindexer))
        .await
        .map_err(|e| reindex::Error::internal(format!("shutdown failed: {e}")))?;
    Ok(())
}
