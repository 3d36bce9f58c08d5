//! Watcher for one file.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::dispatcher::WatchDispatcher;
use super::events::{EventSink, FileChangedEvent};
use super::notifier::{FsNotifier, RawEvent, Subscription};
use super::Watcher;
use crate::error::WatcherError;
use crate::Result;

/// Watches a single file through a non-recursive subscription on its parent
/// directory.
pub struct SingleFileWatcher {
    shared: Arc<Shared>,
    notifier: Arc<dyn FsNotifier>,
    subscription: Mutex<Option<Subscription>>,
}

struct Shared {
    path: PathBuf,
    file_name: String,
    sink: EventSink,
    dispatcher: Arc<WatchDispatcher>,
    disposed: AtomicBool,
}

impl SingleFileWatcher {
    /// Create a watcher for `path`. Nothing is watched until [`Watcher::start`].
    ///
    /// # Errors
    ///
    /// Returns [`WatcherError::InvalidPath`] if `path` has no file name or no
    /// parent directory.
    pub fn new(
        path: impl Into<PathBuf>,
        notifier: Arc<dyn FsNotifier>,
        dispatcher: Arc<WatchDispatcher>,
        sink: EventSink,
    ) -> Result<Self> {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_lowercase())
            .ok_or_else(|| WatcherError::InvalidPath {
                path: path.display().to_string(),
                reason: "path has no file name".to_string(),
            })?;
        if path.parent().is_none() {
            return Err(WatcherError::InvalidPath {
                path: path.display().to_string(),
                reason: "path has no parent directory".to_string(),
            }
            .into());
        }

        Ok(Self {
            shared: Arc::new(Shared {
                path,
                file_name,
                sink,
                dispatcher,
                disposed: AtomicBool::new(false),
            }),
            notifier,
            subscription: Mutex::new(None),
        })
    }

    /// The watched file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.shared.path
    }
}

impl Watcher for SingleFileWatcher {
    fn start(&self) -> Result<()> {
        let mut subscription = self.subscription.lock();
        if subscription.is_some() {
            return Ok(());
        }

        let parent = self.shared.path.parent().unwrap_or_else(|| Path::new("/"));
        let weak = Arc::downgrade(&self.shared);
        *subscription = Some(self.notifier.subscribe(
            parent,
            false,
            Box::new(move |event| forward(&weak, event)),
        )?);

        let shared = Arc::clone(&self.shared);
        self.shared.dispatcher.dispatch(move || {
            if shared.path.is_file() {
                shared.emit(FileChangedEvent::created_or_updated(&shared.path));
            }
            Ok(())
        })?;

        tracing::debug!(path = %self.shared.path.display(), "Watching file");
        Ok(())
    }
}

impl Drop for SingleFileWatcher {
    fn drop(&mut self) {
        self.shared.disposed.store(true, Ordering::Release);
        drop(self.subscription.lock().take());
    }
}

/// Runs on the notifier thread: keep only events about the watched file and
/// hand them to the dispatcher.
fn forward(weak: &Weak<Shared>, event: RawEvent) {
    let Some(shared) = weak.upgrade() else {
        return;
    };
    if !shared.concerns(&event) {
        return;
    }

    let weak = Weak::clone(weak);
    let dispatched = shared.dispatcher.dispatch(move || {
        if let Some(shared) = weak.upgrade() {
            shared.handle(&event);
        }
        Ok(())
    });
    if let Err(e) = dispatched {
        tracing::trace!(error = %e, "Dropped file notification");
    }
}

impl Shared {
    fn is_target(&self, path: &Path) -> bool {
        path.file_name()
            .is_some_and(|name| name.to_string_lossy().to_lowercase() == self.file_name)
    }

    fn concerns(&self, event: &RawEvent) -> bool {
        match event {
            RawEvent::Created(path) | RawEvent::Changed(path) | RawEvent::Deleted(path) => {
                self.is_target(path)
            }
            RawEvent::Renamed { from, to } => self.is_target(from) || self.is_target(to),
            RawEvent::Error(_) => true,
        }
    }

    fn handle(&self, event: &RawEvent) {
        let change = match event {
            RawEvent::Created(_) | RawEvent::Changed(_) => {
                FileChangedEvent::created_or_updated(&self.path)
            }
            RawEvent::Deleted(_) => FileChangedEvent::deleted(&self.path),
            RawEvent::Renamed { to, .. } if self.is_target(to) => {
                FileChangedEvent::created_or_updated(&self.path)
            }
            RawEvent::Renamed { .. } => FileChangedEvent::deleted(&self.path),
            RawEvent::Error(reason) => {
                tracing::debug!(path = %self.path.display(), reason = %reason, "Notifier error, rechecking file");
                if self.path.is_file() {
                    FileChangedEvent::created_or_updated(&self.path)
                } else {
                    FileChangedEvent::deleted(&self.path)
                }
            }
        };
        self.emit(change);
    }

    fn emit(&self, event: FileChangedEvent) {
        if self.disposed.load(Ordering::Acquire) {
            return;
        }
        tracing::trace!(path = %event.path().display(), kind = ?event.kind(), "File changed");
        (self.sink)(event);
    }
}
