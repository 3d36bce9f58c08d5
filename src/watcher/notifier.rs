//! Raw filesystem notifications.
//!
//! [`FsNotifier`] is the seam between the watchers and the operating system.
//! [`NotifyBackend`] implements it with `notify`'s recommended watcher.

use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher as _};

use crate::error::WatcherError;
use crate::Result;

/// Notification delivered by an [`FsNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEvent {
    /// Path appeared.
    Created(PathBuf),
    /// Path content or metadata changed.
    Changed(PathBuf),
    /// Path disappeared.
    Deleted(PathBuf),
    /// Path moved, both ends known.
    Renamed { from: PathBuf, to: PathBuf },
    /// Notifications may have been lost.
    Error(String),
}

/// Callback invoked on the notifier's own thread.
pub type RawHandler = Box<dyn Fn(RawEvent) + Send + Sync>;

/// Keeps an OS watch alive; dropping it releases the watch.
pub struct Subscription {
    _guard: Box<dyn Send>,
}

impl Subscription {
    /// Wrap whatever keeps the watch alive.
    pub fn new(guard: impl Send + 'static) -> Self {
        Self {
            _guard: Box::new(guard),
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// Source of raw filesystem notifications.
pub trait FsNotifier: Send + Sync {
    /// Watch `path`, delivering notifications to `handler` until the
    /// returned subscription is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`WatcherError::WatchFailed`] if the path cannot be watched.
    fn subscribe(&self, path: &Path, recursive: bool, handler: RawHandler)
        -> Result<Subscription>;
}

/// [`FsNotifier`] backed by `notify::RecommendedWatcher`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifyBackend;

impl NotifyBackend {
    /// Create the backend.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl FsNotifier for NotifyBackend {
    fn subscribe(
        &self,
        path: &Path,
        recursive: bool,
        handler: RawHandler,
    ) -> Result<Subscription> {
        let mut watcher =
            notify::recommended_watcher(move |result: notify::Result<Event>| match result {
                Ok(event) => {
                    for raw in translate(event) {
                        handler(raw);
                    }
                }
                Err(e) => handler(RawEvent::Error(e.to_string())),
            })
            .map_err(|e| WatcherError::watch_failed(path.display().to_string(), e))?;

        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher
            .watch(path, mode)
            .map_err(|e| WatcherError::watch_failed(path.display().to_string(), e))?;

        tracing::debug!(path = %path.display(), recursive, "Subscribed to filesystem notifications");
        Ok(Subscription::new(watcher))
    }
}

/// Map one `notify` event onto zero or more raw events.
fn translate(event: Event) -> Vec<RawEvent> {
    if event.need_rescan() {
        return vec![RawEvent::Error("backend requested a rescan".to_string())];
    }

    let mut paths = event.paths.into_iter();
    match event.kind {
        EventKind::Access(_) => Vec::new(),
        EventKind::Create(_) => paths.map(RawEvent::Created).collect(),
        EventKind::Remove(_) => paths.map(RawEvent::Deleted).collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            paths.map(RawEvent::Deleted).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            paths.map(RawEvent::Created).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            match (paths.next(), paths.next()) {
                (Some(from), Some(to)) => vec![RawEvent::Renamed { from, to }],
                (Some(only), None) => vec![presence(only)],
                _ => Vec::new(),
            }
        }
        // Backends that cannot tell which end of a rename they saw.
        EventKind::Modify(ModifyKind::Name(_)) => paths.map(presence).collect(),
        EventKind::Modify(_) | EventKind::Any | EventKind::Other => {
            paths.map(RawEvent::Changed).collect()
        }
    }
}

fn presence(path: PathBuf) -> RawEvent {
    if path.exists() {
        RawEvent::Created(path)
    } else {
        RawEvent::Deleted(path)
    }
}

/// In-process notifier driven by tests.
#[cfg(test)]
pub(crate) mod manual {
    use std::sync::{Arc, Weak};

    use parking_lot::Mutex;

    use super::{FsNotifier, RawEvent, RawHandler, Subscription};
    use crate::error::WatcherError;
    use crate::Result;
    use std::path::{Path, PathBuf};

    struct Registration {
        path: PathBuf,
        handler: RawHandler,
    }

    /// Records subscriptions and lets a test push events into them.
    #[derive(Default)]
    pub(crate) struct ManualNotifier {
        registrations: Mutex<Vec<Weak<Registration>>>,
        failures_left: Mutex<usize>,
    }

    impl ManualNotifier {
        pub(crate) fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Make the next `count` subscriptions fail.
        pub(crate) fn fail_next(&self, count: usize) {
            *self.failures_left.lock() = count;
        }

        /// Deliver `event` to every live subscription on `path`.
        pub(crate) fn emit(&self, path: &Path, event: &RawEvent) {
            let live: Vec<Arc<Registration>> = {
                let mut registrations = self.registrations.lock();
                registrations.retain(|weak| weak.strong_count() > 0);
                registrations.iter().filter_map(Weak::upgrade).collect()
            };
            for registration in live.iter().filter(|r| r.path == path) {
                (registration.handler)(event.clone());
            }
        }

        /// Number of live subscriptions.
        pub(crate) fn active(&self) -> usize {
            self.registrations
                .lock()
                .iter()
                .filter(|weak| weak.strong_count() > 0)
                .count()
        }
    }

    impl FsNotifier for ManualNotifier {
        fn subscribe(
            &self,
            path: &Path,
            _recursive: bool,
            handler: RawHandler,
        ) -> Result<Subscription> {
            {
                let mut failures = self.failures_left.lock();
                if *failures > 0 {
                    *failures -= 1;
                    return Err(WatcherError::watch_failed(
                        path.display().to_string(),
                        "injected failure",
                    )
                    .into());
                }
            }

            let registration = Arc::new(Registration {
                path: path.to_path_buf(),
                handler,
            });
            self.registrations.lock().push(Arc::downgrade(&registration));
            Ok(Subscription::new(registration))
        }
    }
}
