//! Structured logging and tracing configuration.
//!
//! Provides setup for observability using the `tracing` crate with:
//! - Structured logging with JSON output option
//! - Configurable log levels, overridable through `RUST_LOG`
//! - Span helpers for watcher actions and file indexing

use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Registry,
};

use crate::{Error, Result};

/// Tracing configuration options.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Enable JSON output format
    pub json: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl TracingConfig {
    /// Apply command-line settings on top of this configuration.
    ///
    /// An explicit level replaces the current one; `json` can only switch
    /// JSON output on.
    #[must_use]
    pub fn with_overrides(self, level: Option<String>, json: bool) -> Self {
        Self {
            level: level.unwrap_or(self.level),
            json: self.json || json,
        }
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `level` when set.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(level: &str, json: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let installed = if json {
        let json_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_thread_names(true)
            .with_current_span(true);

        Registry::default()
            .with(env_filter)
            .with(json_layer)
            .try_init()
    } else {
        let fmt_layer = fmt::layer().with_target(true).with_thread_names(true);

        Registry::default()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
    };
    installed.map_err(|e| Error::internal(format!("failed to install tracing subscriber: {e}")))?;

    tracing::debug!(level, json, "Tracing initialized");
    Ok(())
}

/// Read tracing configuration from the environment.
///
/// Respects these environment variables:
/// - `REINDEX_LOG_LEVEL` - Log level (default: "info")
/// - `REINDEX_LOG_JSON` - Enable JSON output (default: false)
#[must_use]
pub fn config_from_env() -> TracingConfig {
    let level = std::env::var("REINDEX_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let json = std::env::var("REINDEX_LOG_JSON")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false);

    TracingConfig { level, json }
}

/// Span constructors shared by the watcher and indexing threads.
pub mod spans {
    use std::path::Path;

    use tracing::{debug_span, info_span, Span};
    use uuid::Uuid;

    /// Span around one dispatched watcher callback, tagged with a fresh
    /// `action_id` so every log line it produces can be correlated.
    #[must_use]
    pub fn action_span() -> Span {
        info_span!("dispatch", action_id = %Uuid::new_v4())
    }

    /// Span around indexing or removing one file.
    #[must_use]
    pub fn file_span(operation: &'static str, path: &Path) -> Span {
        debug_span!("file", operation, path = %path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_config_default() {
        let config = TracingConfig::default();
        assert_eq!(config.level, "info");
        assert!(!config.json);
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Only asserts the shape; the test environment may set these.
        let config = config_from_env();
        assert!(!config.level.is_empty());
    }

    #[test]
    fn test_overrides_replace_level() {
        let config = TracingConfig::default().with_overrides(Some("debug".to_string()), false);
        assert_eq!(config.level, "debug");
        assert!(!config.json);
    }

    #[test]
    fn test_overrides_keep_environment_values() {
        let from_env = TracingConfig {
            level: "warn".to_string(),
            json: true,
        };
        let config = from_env.with_overrides(None, false);
        assert_eq!(config.level, "warn");
        assert!(config.json);
    }

    #[test]
    fn test_json_flag_enables_json() {
        let config = TracingConfig::default().with_overrides(None, true);
        assert!(config.json);
    }

    #[test]
    fn test_action_span() {
        let span = spans::action_span();
        let _guard = span.enter();
    }

    #[test]
    fn test_file_span() {
        let span = spans::file_span("index", std::path::Path::new("/tmp/a.txt"));
        let _guard = span.enter();
    }
}
