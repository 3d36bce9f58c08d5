//! Bidirectional file path ↔ document id map.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::DocumentId;

/// One path per id and one id per path, kept consistent under a single lock.
///
/// Paths compare case-insensitively; the stored spelling is the one last
/// inserted.
#[derive(Debug, Default)]
pub struct PathIdMap {
    maps: Mutex<Maps>,
}

#[derive(Debug, Default)]
struct Maps {
    by_id: HashMap<DocumentId, String>,
    by_path: HashMap<String, DocumentId>,
}

impl PathIdMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `id` to `path`, dropping any previous mapping of either side.
    ///
    /// Returns the id `path` was mapped to before, if any.
    pub fn insert(&self, id: DocumentId, path: &str) -> Option<DocumentId> {
        let key = fold(path);
        let mut maps = self.maps.lock();

        if let Some(old_path) = maps.by_id.remove(&id) {
            maps.by_path.remove(&fold(&old_path));
        }
        let previous = maps.by_path.insert(key, id);
        if let Some(previous) = previous {
            maps.by_id.remove(&previous);
        }
        maps.by_id.insert(id, path.to_string());

        previous.filter(|previous| *previous != id)
    }

    /// Id currently mapped to `path`.
    #[cfg(test)]
    #[must_use]
    pub fn id_of(&self, path: &str) -> Option<DocumentId> {
        self.maps.lock().by_path.get(&fold(path)).copied()
    }

    /// Path currently mapped to `id`.
    #[must_use]
    pub fn path_of(&self, id: DocumentId) -> Option<String> {
        self.maps.lock().by_id.get(&id).cloned()
    }

    /// Remove the mapping of `path`, returning its id.
    pub fn remove_by_path(&self, path: &str) -> Option<DocumentId> {
        let mut maps = self.maps.lock();
        let id = maps.by_path.remove(&fold(path))?;
        maps.by_id.remove(&id);
        Some(id)
    }

    /// Remove the mapping of `id`, returning its path.
    #[cfg(test)]
    pub fn remove_by_id(&self, id: DocumentId) -> Option<String> {
        let mut maps = self.maps.lock();
        let path = maps.by_id.remove(&id)?;
        maps.by_path.remove(&fold(&path));
        Some(path)
    }

    /// Number of mapped paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.maps.lock().by_id.len()
    }

    /// Whether nothing is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn fold(path: &str) -> String {
    path.to_lowercase()
}
