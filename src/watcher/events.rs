//! File change events emitted by the watchers.

use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::path::loose_key;

/// What happened to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileChangeKind {
    /// File appeared or its content may have changed.
    CreatedOrUpdated,
    /// File is gone.
    Deleted,
}

/// A change to one file.
///
/// Two events are equal when their kinds match and their paths match
/// ignoring case and separator style.
#[derive(Debug, Clone)]
pub struct FileChangedEvent {
    path: PathBuf,
    kind: FileChangeKind,
}

impl FileChangedEvent {
    /// File was created or modified.
    #[must_use]
    pub fn created_or_updated(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: FileChangeKind::CreatedOrUpdated,
        }
    }

    /// File was deleted.
    #[must_use]
    pub fn deleted(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: FileChangeKind::Deleted,
        }
    }

    /// Path of the changed file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Kind of change.
    #[must_use]
    pub fn kind(&self) -> FileChangeKind {
        self.kind
    }

    /// Case-folded path used to group events of the same file.
    #[must_use]
    pub fn path_key(&self) -> String {
        loose_key(&self.path)
    }
}

impl PartialEq for FileChangedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.path_key() == other.path_key()
    }
}

impl Eq for FileChangedEvent {}

impl Hash for FileChangedEvent {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.path_key().hash(state);
    }
}

/// Destination of the events produced by a watcher.
pub type EventSink = Arc<dyn Fn(FileChangedEvent) + Send + Sync>;
