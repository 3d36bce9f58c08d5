//! Path normalization shared by the watchers and the watch service.

use std::path::{Component, Path, PathBuf};

use crate::error::WatcherError;
use crate::Result;

/// Absolute, lexically cleaned, `/`-separated form of `path` without a
/// trailing separator.
///
/// Relative paths are resolved against the current directory. `..` is
/// resolved lexically; symlinks are not followed.
///
/// # Errors
///
/// Returns [`WatcherError::InvalidPath`] for an empty or non-UTF-8 path, or
/// when the current directory cannot be read.
pub fn normalize_path(path: &Path) -> Result<String> {
    if path.as_os_str().is_empty() {
        return Err(invalid(path, "path is empty"));
    }

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| invalid(path, format!("cannot resolve current directory: {e}")))?
            .join(path)
    };

    let mut prefix = String::new();
    let mut parts: Vec<&str> = Vec::new();
    for component in absolute.components() {
        match component {
            Component::Prefix(drive) => {
                prefix = drive
                    .as_os_str()
                    .to_str()
                    .ok_or_else(|| invalid(path, "path is not valid UTF-8"))?
                    .to_string();
            }
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir => {
                parts.pop();
            }
            Component::Normal(part) => {
                parts.push(
                    part.to_str()
                        .ok_or_else(|| invalid(path, "path is not valid UTF-8"))?,
                );
            }
        }
    }

    Ok(format!("{prefix}/{}", parts.join("/")))
}

/// Case-folded comparison key of a normalized path.
#[must_use]
pub fn path_key(normalized: &str) -> String {
    normalized.to_lowercase()
}

/// Case-folded key of any path, with `\` separators turned into `/` and any
/// trailing separator removed.
#[must_use]
pub fn loose_key(path: &Path) -> String {
    let text = path.to_string_lossy().replace('\\', "/");
    let trimmed = text.trim_end_matches('/');
    if trimmed.is_empty() && text.starts_with('/') {
        return "/".to_string();
    }
    path_key(trimmed)
}

/// Segments of `path` below `root`, or `None` if `path` is not inside it.
///
/// The root prefix matches case-insensitively; the returned segments keep the
/// spelling found in `path`.
#[must_use]
pub fn relative_segments(root: &Path, path: &Path) -> Option<Vec<String>> {
    let mut components = path.components();
    for expected in root.components() {
        let actual = components.next()?;
        if actual.as_os_str().to_string_lossy().to_lowercase()
            != expected.as_os_str().to_string_lossy().to_lowercase()
        {
            return None;
        }
    }

    components
        .map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

/// Join `segments` below `root`.
#[must_use]
pub fn join_segments<S: AsRef<str>>(root: &Path, segments: &[S]) -> PathBuf {
    let mut path = root.to_path_buf();
    for segment in segments {
        path.push(segment.as_ref());
    }
    path
}

fn invalid(path: &Path, reason: impl Into<String>) -> crate::Error {
    WatcherError::InvalidPath {
        path: path.display().to_string(),
        reason: reason.into(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_normalize_absolute() {
        assert_eq!(normalize_path(Path::new("/a/b/")).unwrap(), "/a/b");
        assert_eq!(normalize_path(Path::new("/a/./b/../c")).unwrap(), "/a/c");
        assert_eq!(normalize_path(Path::new("/")).unwrap(), "/");
        assert_eq!(normalize_path(Path::new("/..")).unwrap(), "/");
    }

    #[test]
    fn test_normalize_relative_is_absolute() {
        let normalized = normalize_path(Path::new("some/dir")).unwrap();
        assert!(normalized.ends_with("/some/dir"));
        assert!(Path::new(&normalized).is_absolute() || cfg!(windows));
    }

    #[test]
    fn test_normalize_empty_rejected() {
        let err = normalize_path(Path::new("")).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Watcher(WatcherError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_loose_key() {
        assert_eq!(loose_key(Path::new("/A/B/")), "/a/b");
        assert_eq!(loose_key(Path::new("C:\\Data\\x")), "c:/data/x");
        assert_eq!(loose_key(Path::new("/")), "/");
    }

    #[test]
    fn test_relative_segments() {
        let root = Path::new("/data/root");
        assert_eq!(
            relative_segments(root, Path::new("/data/root/a/b.txt")),
            Some(vec!["a".to_string(), "b.txt".to_string()])
        );
        assert_eq!(relative_segments(root, Path::new("/data/root")), Some(vec![]));
        assert_eq!(relative_segments(root, Path::new("/data/other/a")), None);
        assert_eq!(relative_segments(root, Path::new("/data/rootx/a")), None);
        assert_eq!(relative_segments(root, Path::new("/data")), None);
    }

    #[test]
    fn test_relative_segments_ignore_root_case() {
        let root = Path::new("/Data/Root");
        assert_eq!(
            relative_segments(root, Path::new("/data/ROOT/Sub/File.txt")),
            Some(vec!["Sub".to_string(), "File.txt".to_string()])
        );
        assert_eq!(relative_segments(root, Path::new("/DATA/root")), Some(vec![]));
    }

    #[test]
    fn test_join_segments() {
        let root = Path::new("/data");
        assert_eq!(
            join_segments(root, &["a", "b.txt"]),
            PathBuf::from("/data/a/b.txt")
        );
    }
}
