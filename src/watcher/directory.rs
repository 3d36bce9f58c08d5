//! Recursive watcher for a directory tree.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::SystemTime;

use parking_lot::Mutex;
use walkdir::WalkDir;

use super::dispatcher::WatchDispatcher;
use super::events::{EventSink, FileChangedEvent};
use super::notifier::{FsNotifier, RawEvent, Subscription};
use super::path::{join_segments, relative_segments};
use super::Watcher;
use crate::error::WatcherError;
use crate::segment_tree::{CaseSensitivity, SegmentTree};
use crate::Result;

/// What is remembered about a file to tell real changes from noise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
}

impl FileStamp {
    fn of(metadata: &std::fs::Metadata) -> Self {
        Self {
            modified: metadata.modified().ok(),
            len: metadata.len(),
        }
    }
}

/// Watches every file below a directory.
///
/// Known files and their stamps are kept in a [`SegmentTree`]; a change
/// notification only produces an event when the file is new or its stamp
/// differs. Notifier errors trigger a full rescan of the tree.
pub struct DirectoryWatcher {
    shared: Arc<Shared>,
    notifier: Arc<dyn FsNotifier>,
    subscription: Mutex<Option<Subscription>>,
}

struct Shared {
    root: PathBuf,
    known: Mutex<SegmentTree<FileStamp>>,
    sink: EventSink,
    dispatcher: Arc<WatchDispatcher>,
    disposed: AtomicBool,
}

impl DirectoryWatcher {
    /// Create a watcher for the tree below `root`. Nothing is watched until
    /// [`Watcher::start`].
    pub fn new(
        root: impl Into<PathBuf>,
        notifier: Arc<dyn FsNotifier>,
        dispatcher: Arc<WatchDispatcher>,
        sink: EventSink,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                root: root.into(),
                known: Mutex::new(SegmentTree::new(CaseSensitivity::Insensitive)),
                sink,
                dispatcher,
                disposed: AtomicBool::new(false),
            }),
            notifier,
            subscription: Mutex::new(None),
        }
    }

    /// The watched directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.shared.root
    }

    /// Number of files currently tracked.
    #[must_use]
    pub fn known_files(&self) -> usize {
        self.shared.known.lock().len()
    }
}

impl Watcher for DirectoryWatcher {
    /// Subscribe and scan the whole tree, returning once the scan has run on
    /// the dispatcher.
    fn start(&self) -> Result<()> {
        let mut subscription = self.subscription.lock();
        if subscription.is_some() {
            return Ok(());
        }

        let root = &self.shared.root;
        if !root.is_dir() {
            return Err(WatcherError::watch_failed(
                root.display().to_string(),
                "not an existing directory",
            )
            .into());
        }

        let weak = Arc::downgrade(&self.shared);
        *subscription = Some(self.notifier.subscribe(
            root,
            true,
            Box::new(move |event| forward(&weak, event)),
        )?);

        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);
        let shared = Arc::clone(&self.shared);
        self.shared.dispatcher.dispatch(move || {
            shared.rescan();
            let _ = done_tx.send(());
            Ok(())
        })?;
        done_rx
            .recv()
            .map_err(|_| WatcherError::DispatcherClosed)?;

        tracing::info!(
            path = %root.display(),
            files = self.known_files(),
            "Watching directory"
        );
        Ok(())
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        self.shared.disposed.store(true, Ordering::Release);
        drop(self.subscription.lock().take());
    }
}

fn forward(weak: &Weak<Shared>, event: RawEvent) {
    let Some(shared) = weak.upgrade() else {
        return;
    };

    let weak = Weak::clone(weak);
    let dispatched = shared.dispatcher.dispatch(move || {
        if let Some(shared) = weak.upgrade() {
            shared.handle(event);
        }
        Ok(())
    });
    if let Err(e) = dispatched {
        tracing::trace!(error = %e, "Dropped directory notification");
    }
}

impl Shared {
    fn handle(&self, event: RawEvent) {
        tracing::trace!(root = %self.root.display(), event = ?event, "Directory notification");
        self.apply(|scan| match event {
            RawEvent::Created(path) | RawEvent::Changed(path) => scan.create_or_update(&path),
            RawEvent::Deleted(path) => scan.delete(&path),
            RawEvent::Renamed { from, to } => {
                scan.delete(&from);
                scan.create_or_update(&to);
            }
            RawEvent::Error(reason) => {
                tracing::warn!(
                    path = %scan.root.display(),
                    reason = %reason,
                    "Notifier reported an error, rescanning"
                );
                scan.resync(&[]);
            }
        });
    }

    fn rescan(&self) {
        self.apply(|scan| scan.resync(&[]));
    }

    fn apply(&self, action: impl FnOnce(&mut Scan<'_>)) {
        let changes = {
            let mut known = self.known.lock();
            let mut scan = Scan {
                root: &self.root,
                known: &mut *known,
                changes: Vec::new(),
            };
            action(&mut scan);
            scan.changes
        };

        if self.disposed.load(Ordering::Acquire) {
            return;
        }
        for change in changes {
            tracing::trace!(path = %change.path().display(), kind = ?change.kind(), "File changed");
            (self.sink)(change);
        }
    }
}

/// One pass over the tracked tree, collecting the changes it detects.
struct Scan<'a> {
    root: &'a Path,
    known: &'a mut SegmentTree<FileStamp>,
    changes: Vec<FileChangedEvent>,
}

impl Scan<'_> {
    fn create_or_update(&mut self, path: &Path) {
        let Some(segments) = relative_segments(self.root, path) else {
            return;
        };

        match std::fs::metadata(path) {
            Ok(metadata) if metadata.is_dir() => self.resync(&segments),
            Ok(metadata) if metadata.is_file() => self.track(&segments, FileStamp::of(&metadata)),
            Ok(_) => {}
            // Gone again before we looked; its deletion may not be reported.
            Err(_) => self.forget(&segments),
        }
    }

    fn delete(&mut self, path: &Path) {
        if let Some(segments) = relative_segments(self.root, path) {
            self.forget(&segments);
        }
    }

    /// Record a file, reporting it when new or changed.
    fn track(&mut self, segments: &[String], stamp: FileStamp) {
        if segments.is_empty() {
            return;
        }

        // A file may replace a tracked directory, or sit below a path that
        // used to be a file.
        if self.known.get(segments).is_none() {
            self.forget(segments);
        }
        for depth in 1..segments.len() {
            if self.known.get(&segments[..depth]).is_some() {
                self.forget(&segments[..depth]);
            }
        }

        match self.known.insert(segments, stamp) {
            Ok(Some(previous)) if previous == stamp => {}
            Ok(_) => self.changes.push(FileChangedEvent::created_or_updated(
                join_segments(self.root, segments),
            )),
            Err(e) => tracing::debug!(error = %e, "Could not track file"),
        }
    }

    /// Drop every tracked file at or below `segments`, reporting each.
    fn forget(&mut self, segments: &[String]) {
        for (stored, _) in self.known.search(segments) {
            if self.known.delete(&stored) {
                self.changes
                    .push(FileChangedEvent::deleted(join_segments(self.root, &stored)));
            }
        }
    }

    /// Bring the subtree at `segments` in line with the filesystem.
    fn resync(&mut self, segments: &[String]) {
        let directory = join_segments(self.root, segments);
        let mut seen = HashSet::new();

        for entry in WalkDir::new(&directory).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            let Some(entry_segments) = relative_segments(self.root, entry.path()) else {
                continue;
            };

            if entry.file_type().is_dir() {
                if !entry_segments.is_empty() && self.known.get(&entry_segments).is_some() {
                    self.forget(&entry_segments);
                }
                continue;
            }

            match std::fs::metadata(entry.path()) {
                Ok(metadata) if metadata.is_file() => {
                    seen.insert(fold(&entry_segments));
                    self.track(&entry_segments, FileStamp::of(&metadata));
                }
                _ => {}
            }
        }

        let vanished: Vec<Vec<String>> = self
            .known
            .search(segments)
            .into_iter()
            .map(|(stored, _)| stored)
            .filter(|stored| !seen.contains(&fold(stored)))
            .collect();
        for stored in vanished {
            self.forget(&stored);
        }
    }
}

fn fold(segments: &[String]) -> String {
    segments.join("/").to_lowercase()
}
