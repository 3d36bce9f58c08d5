//! Difference between the paths that should be watched and those that are.

use std::collections::HashSet;

/// Watch roots to add and to remove.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchSetDiff {
    /// Desired roots without a watcher, in their registered spelling.
    pub missing: Vec<String>,
    /// Active roots no longer desired, in their active spelling.
    pub stale: Vec<String>,
}

impl WatchSetDiff {
    /// Whether nothing needs to change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.stale.is_empty()
    }
}

/// Compute which watchers to create and which to drop.
///
/// Directories nested in another desired directory are covered by it, as are
/// files below a desired directory. Paths compare case-insensitively with `\`
/// and `/` treated alike and trailing separators ignored.
pub fn reconcile<D, F, A>(directories: D, files: F, active: A) -> WatchSetDiff
where
    D: IntoIterator,
    D::Item: AsRef<str>,
    F: IntoIterator,
    F::Item: AsRef<str>,
    A: IntoIterator,
    A::Item: AsRef<str>,
{
    let mut directories: Vec<Root> = directories.into_iter().map(Root::new).collect();
    directories.sort_by(|a, b| a.prefix.cmp(&b.prefix));

    let mut roots: Vec<Root> = Vec::new();
    for directory in directories {
        let covered = roots
            .last()
            .is_some_and(|last| directory.prefix.starts_with(&last.prefix));
        if !covered {
            roots.push(directory);
        }
    }

    let directory_count = roots.len();
    for file in files.into_iter().map(Root::new) {
        let covered = roots[..directory_count]
            .iter()
            .any(|directory| file.prefix.starts_with(&directory.prefix));
        if !covered {
            roots.push(file);
        }
    }

    let mut desired = HashSet::new();
    roots.retain(|root| desired.insert(root.key.clone()));

    let active: Vec<Root> = active.into_iter().map(Root::new).collect();
    let active_keys: HashSet<String> = active.iter().map(|root| root.key.clone()).collect();

    WatchSetDiff {
        missing: roots
            .iter()
            .filter(|root| !active_keys.contains(&root.key))
            .map(|root| root.path.clone())
            .collect(),
        stale: active
            .into_iter()
            .filter(|root| !desired.contains(&root.key))
            .map(|root| root.path)
            .collect(),
    }
}

struct Root {
    /// Separator-normalized path without trailing separator.
    path: String,
    /// Case-folded `path`.
    key: String,
    /// `key` with a trailing separator, for containment checks.
    prefix: String,
}

impl Root {
    fn new(path: impl AsRef<str>) -> Self {
        let unified = path.as_ref().replace('\\', "/");
        let trimmed = unified.trim_end_matches('/');
        let path = if trimmed.is_empty() && unified.starts_with('/') {
            "/".to_string()
        } else {
            trimmed.to_string()
        };
        let key = path.to_lowercase();
        let prefix = if key.ends_with('/') {
            key.clone()
        } else {
            format!("{key}/")
        };
        Self { path, key, prefix }
    }
}
