//! File system watching.
//!
//! This module provides:
//! - A serial dispatcher that runs all watcher bookkeeping on one thread
//! - Single-file and recursive directory watchers built on notify-rs
//! - A resilient wrapper that retries watchers whose path is not there yet
//! - A watch service that reconciles registrations into a minimal set of
//!   watchers and debounces their events per path

mod directory;
mod dispatcher;
mod events;
pub(crate) mod notifier;
mod path;
mod reconciler;
mod resilient;
mod service;
mod single_file;

pub use directory::DirectoryWatcher;
pub use dispatcher::WatchDispatcher;
pub use events::{EventSink, FileChangeKind, FileChangedEvent};
pub use notifier::{FsNotifier, NotifyBackend, RawEvent, RawHandler, Subscription};
pub use path::normalize_path;
pub use reconciler::{reconcile, WatchSetDiff};
pub use resilient::{ResilientWatcher, WatcherBuilder};
pub use service::{NotifyWatcherFactory, WatchKind, WatchService, WatcherFactory};
pub use single_file::SingleFileWatcher;

use crate::Result;

/// A started watcher reports changes until it is dropped.
pub trait Watcher: Send + Sync {
    /// Begin watching.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying subscription cannot be created or
    /// the initial scan cannot be scheduled.
    fn start(&self) -> Result<()>;
}
