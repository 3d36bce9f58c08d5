//! Registration of watched paths and the merged, debounced event stream.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{at, never, select, Receiver, Sender};
use parking_lot::Mutex;

use super::directory::DirectoryWatcher;
use super::dispatcher::WatchDispatcher;
use super::events::{EventSink, FileChangedEvent};
use super::notifier::FsNotifier;
use super::path::{normalize_path, path_key};
use super::reconciler::reconcile;
use super::resilient::{ResilientWatcher, WatcherBuilder};
use super::single_file::SingleFileWatcher;
use super::Watcher;
use crate::error::WatcherError;
use crate::Result;

/// What a registered path refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchKind {
    /// A single file.
    File,
    /// A directory and everything below it.
    Directory,
}

/// Creates the watcher for one root.
pub trait WatcherFactory: Send + Sync {
    /// Build an unstarted watcher for `path` that reports to `sink`.
    ///
    /// # Errors
    ///
    /// Returns an error if the watcher cannot be built for `path`.
    fn create(&self, path: &Path, kind: WatchKind, sink: EventSink) -> Result<Box<dyn Watcher>>;
}

/// Factory producing [`SingleFileWatcher`]s and [`DirectoryWatcher`]s that
/// share one notifier and one dispatcher.
pub struct NotifyWatcherFactory {
    notifier: Arc<dyn FsNotifier>,
    dispatcher: Arc<WatchDispatcher>,
}

impl NotifyWatcherFactory {
    /// Create a factory.
    pub fn new(notifier: Arc<dyn FsNotifier>, dispatcher: Arc<WatchDispatcher>) -> Self {
        Self {
            notifier,
            dispatcher,
        }
    }
}

impl WatcherFactory for NotifyWatcherFactory {
    fn create(&self, path: &Path, kind: WatchKind, sink: EventSink) -> Result<Box<dyn Watcher>> {
        let notifier = Arc::clone(&self.notifier);
        let dispatcher = Arc::clone(&self.dispatcher);
        let watcher: Box<dyn Watcher> = match kind {
            WatchKind::File => Box::new(SingleFileWatcher::new(path, notifier, dispatcher, sink)?),
            WatchKind::Directory => Box::new(DirectoryWatcher::new(path, notifier, dispatcher, sink)),
        };
        Ok(watcher)
    }
}

/// Keeps one resilient watcher per effective root and merges their events.
///
/// Events are grouped by path; within each group at most one event, the
/// latest, is published per quiet period.
pub struct WatchService {
    registry: Mutex<Registry>,
    factory: Arc<dyn WatcherFactory>,
    restart_delay: Duration,
    sink: EventSink,
    subscribers: Arc<Mutex<Vec<Sender<FileChangedEvent>>>>,
    shutdown: Option<Sender<()>>,
    debouncer: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Registry {
    directories: BTreeMap<String, String>,
    files: BTreeMap<String, String>,
    active: BTreeMap<String, ResilientWatcher>,
}

impl WatchService {
    /// Create a service with no registrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the debounce thread cannot be spawned.
    pub fn new(
        factory: Arc<dyn WatcherFactory>,
        quiet_period: Duration,
        restart_delay: Duration,
    ) -> Result<Self> {
        let (raw_tx, raw_rx) = crossbeam_channel::unbounded::<FileChangedEvent>();
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
        let subscribers = Arc::new(Mutex::new(Vec::new()));

        let debouncer = {
            let subscribers = Arc::clone(&subscribers);
            std::thread::Builder::new()
                .name("watch-debounce".to_string())
                .spawn(move || debounce(&raw_rx, &shutdown_rx, &subscribers, quiet_period))?
        };

        let sink: EventSink = Arc::new(move |event| {
            let _ = raw_tx.send(event);
        });

        Ok(Self {
            registry: Mutex::new(Registry::default()),
            factory,
            restart_delay,
            sink,
            subscribers,
            shutdown: Some(shutdown_tx),
            debouncer: Some(debouncer),
        })
    }

    /// Watch a single file.
    ///
    /// # Errors
    ///
    /// Returns [`WatcherError::DuplicateRegistration`] if the path is already
    /// registered, or [`WatcherError::InvalidPath`] if it cannot be normalized.
    pub fn register_file(&self, path: impl AsRef<Path>) -> Result<()> {
        self.register(path.as_ref(), WatchKind::File)
    }

    /// Watch a directory recursively.
    ///
    /// # Errors
    ///
    /// Returns [`WatcherError::DuplicateRegistration`] if the path is already
    /// registered, or [`WatcherError::InvalidPath`] if it cannot be normalized.
    pub fn register_directory(&self, path: impl AsRef<Path>) -> Result<()> {
        self.register(path.as_ref(), WatchKind::Directory)
    }

    fn register(&self, path: &Path, kind: WatchKind) -> Result<()> {
        let normalized = normalize_path(path)?;
        let key = path_key(&normalized);

        let stale = {
            let mut registry = self.registry.lock();
            if registry.directories.contains_key(&key) || registry.files.contains_key(&key) {
                return Err(WatcherError::DuplicateRegistration { path: normalized }.into());
            }
            match kind {
                WatchKind::File => registry.files.insert(key, normalized.clone()),
                WatchKind::Directory => registry.directories.insert(key, normalized.clone()),
            };
            tracing::debug!(path = %normalized, ?kind, "Registered path");
            self.reconcile(&mut registry)?
        };

        // Stopping a watcher may wait on its starter thread; keep that out of
        // the registration lock.
        drop(stale);
        Ok(())
    }

    fn reconcile(&self, registry: &mut Registry) -> Result<Vec<ResilientWatcher>> {
        let diff = reconcile(
            registry.directories.values(),
            registry.files.values(),
            registry
                .active
                .values()
                .map(|watcher| watcher.path().to_string_lossy().into_owned()),
        );

        let mut stale = Vec::with_capacity(diff.stale.len());
        for path in &diff.stale {
            if let Some(watcher) = registry.active.remove(&path_key(path)) {
                tracing::info!(path = %path, "Stopped watching");
                stale.push(watcher);
            }
        }

        for path in diff.missing {
            let key = path_key(&path);
            let kind = if registry.directories.contains_key(&key) {
                WatchKind::Directory
            } else {
                WatchKind::File
            };

            let watcher = ResilientWatcher::new(&path, self.builder(&path, kind), self.restart_delay);
            watcher.start()?;
            tracing::info!(path = %path, ?kind, "Watching path");
            registry.active.insert(key, watcher);
        }

        Ok(stale)
    }

    fn builder(&self, path: &str, kind: WatchKind) -> WatcherBuilder {
        let factory = Arc::clone(&self.factory);
        let sink = Arc::clone(&self.sink);
        let path = PathBuf::from(path);
        Box::new(move || factory.create(&path, kind, Arc::clone(&sink)))
    }

    /// Receive the merged, debounced stream of changes.
    ///
    /// Every subscriber sees every published event.
    #[must_use]
    pub fn subscribe(&self) -> Receiver<FileChangedEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Roots that currently have a watcher.
    #[must_use]
    pub fn watched_paths(&self) -> Vec<String> {
        self.registry
            .lock()
            .active
            .values()
            .map(|watcher| watcher.path().to_string_lossy().into_owned())
            .collect()
    }

    /// Roots whose watcher is up and delivering events.
    #[cfg(test)]
    #[must_use]
    pub fn running_paths(&self) -> Vec<String> {
        self.registry
            .lock()
            .active
            .values()
            .filter(|watcher| watcher.is_running())
            .map(|watcher| watcher.path().to_string_lossy().into_owned())
            .collect()
    }
}

impl Drop for WatchService {
    fn drop(&mut self) {
        let watchers = std::mem::take(&mut self.registry.lock().active);
        drop(watchers);

        drop(self.shutdown.take());
        if let Some(debouncer) = self.debouncer.take() {
            if debouncer.join().is_err() {
                tracing::error!("Debounce thread panicked");
            }
        }
        tracing::debug!("Watch service stopped");
    }
}

/// Sampling window of one path.
struct Window {
    latest: Option<FileChangedEvent>,
    next_tick: Instant,
}

fn debounce(
    raw: &Receiver<FileChangedEvent>,
    shutdown: &Receiver<()>,
    subscribers: &Mutex<Vec<Sender<FileChangedEvent>>>,
    quiet_period: Duration,
) {
    let mut windows: HashMap<String, Window> = HashMap::new();

    loop {
        let timer = windows
            .values()
            .map(|window| window.next_tick)
            .min()
            .map_or_else(never, at);

        select! {
            recv(raw) -> event => match event {
                Ok(event) => {
                    let key = event.path_key();
                    let next_tick = Instant::now() + quiet_period;
                    windows
                        .entry(key)
                        .or_insert_with(|| Window { latest: None, next_tick })
                        .latest = Some(event);
                }
                Err(_) => break,
            },
            recv(shutdown) -> _ => break,
            recv(timer) -> _ => {}
        }

        let now = Instant::now();
        windows.retain(|_, window| {
            if window.next_tick > now {
                return true;
            }
            let Some(event) = window.latest.take() else {
                // A whole period without events closes the window.
                return false;
            };
            publish(subscribers, &event);
            window.next_tick += quiet_period;
            if window.next_tick <= now {
                window.next_tick = now + quiet_period;
            }
            true
        });
    }

    tracing::debug!("Debounce thread stopped");
}

fn publish(subscribers: &Mutex<Vec<Sender<FileChangedEvent>>>, event: &FileChangedEvent) {
    tracing::trace!(path = %event.path().display(), kind = ?event.kind(), "Publishing change");
    subscribers
        .lock()
        .retain(|subscriber| subscriber.send(event.clone()).is_ok());
}
