//! Configuration management for reindex.
//!
//! Supports configuration from:
//! - Command-line arguments (highest priority)
//! - Environment variables
//! - Built-in defaults (lowest priority)

mod settings;

pub use settings::{
    Config, DEFAULT_COMPACTION_PERIOD, DEFAULT_MAX_TOKEN_LENGTH, DEFAULT_QUIET_PERIOD,
    DEFAULT_RESTART_DELAY,
};
