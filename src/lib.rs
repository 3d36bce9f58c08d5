//! Reindex
//!
//! Live in-memory full-text index over watched files and directories, queried
//! with a small boolean language (`AND`, `OR`, `NOT`).
//!
//! ```no_run
//! use reindex::{Config, Reindexer};
//!
//! # fn main() -> reindex::Result<()> {
//! let reindexer = Reindexer::new(Config::default())?;
//! reindexer.register_directory("/var/log/notes")?;
//! for path in reindexer.search("error AND NOT debug")? {
//!     println!("{path}");
//! }
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod index;
pub mod metrics;
pub mod observability;
pub mod query;
pub mod reindexer;
pub mod segment_tree;
pub mod tokenizer;
pub mod watcher;

pub use config::Config;
pub use error::{Error, Result};
pub use reindexer::Reindexer;
