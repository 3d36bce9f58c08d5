//! Configuration settings and validation.

use crate::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Longest token the word tokenizer keeps by default.
pub const DEFAULT_MAX_TOKEN_LENGTH: usize = 64;

/// Interval between background compactions of the index.
pub const DEFAULT_COMPACTION_PERIOD: Duration = Duration::from_secs(30);

/// Quiet window used to coalesce change events for one path.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_secs(1);

/// Delay before a failed watcher start is retried.
pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_secs(5);

/// Main configuration for a reindexer.
#[derive(Debug, Clone)]
pub struct Config {
    /// Longest alphanumeric run kept as a token; longer runs are dropped.
    pub max_token_length: usize,

    /// Interval between compactions of deleted documents.
    pub compaction_period: Duration,

    /// Per-path quiet window of the change stream.
    pub quiet_period: Duration,

    /// Delay between watcher start attempts.
    pub restart_delay: Duration,

    /// Number of indexing worker threads.
    pub indexing_threads: usize,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Directories registered at startup.
    pub watch_dirs: Vec<PathBuf>,

    /// Files registered at startup.
    pub watch_files: Vec<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_token_length: DEFAULT_MAX_TOKEN_LENGTH,
            compaction_period: DEFAULT_COMPACTION_PERIOD,
            quiet_period: DEFAULT_QUIET_PERIOD,
            restart_delay: DEFAULT_RESTART_DELAY,
            indexing_threads: std::thread::available_parallelism()
                .map(|n| n.get().min(4))
                .unwrap_or(4),
            log_level: "info".to_string(),
            watch_dirs: Vec::new(),
            watch_files: Vec::new(),
        }
    }
}

impl Config {
    /// Create a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.max_token_length == 0 || self.max_token_length > 1024 {
            return Err(Error::config(format!(
                "max_token_length must be between 1 and 1024, got {}",
                self.max_token_length
            )));
        }

        if self.compaction_period.is_zero() {
            return Err(Error::config("compaction_period cannot be 0"));
        }

        if self.quiet_period.is_zero() {
            return Err(Error::config("quiet_period cannot be 0"));
        }

        if self.restart_delay.is_zero() {
            return Err(Error::config("restart_delay cannot be 0"));
        }

        if self.indexing_threads == 0 {
            return Err(Error::config("indexing_threads cannot be 0"));
        }

        if self.indexing_threads > 64 {
            return Err(Error::config("indexing_threads cannot exceed 64"));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "invalid log level '{}', must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        Ok(())
    }
}
