//! Hierarchical store keyed by path segments.
//!
//! Every node is either a leaf carrying a payload or a directory holding
//! further nodes; a name is never both within one parent.

use std::collections::HashMap;

use crate::{Error, Result};

/// How segment names are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaseSensitivity {
    /// Byte-for-byte comparison.
    Sensitive,
    /// Comparison after Unicode lowercasing.
    #[default]
    Insensitive,
}

impl CaseSensitivity {
    fn key(self, segment: &str) -> String {
        match self {
            Self::Sensitive => segment.to_string(),
            Self::Insensitive => segment.to_lowercase(),
        }
    }
}

/// A leaf found by [`SegmentTree::search`]: its segments, in the casing first
/// stored, and a copy of its payload.
pub type SegmentEntry<T> = (Vec<String>, T);

/// Tree of path segments with payloads at the leaves.
#[derive(Debug)]
pub struct SegmentTree<T> {
    root: Node<T>,
    case: CaseSensitivity,
    len: usize,
}

#[derive(Debug)]
struct Node<T> {
    slots: HashMap<String, Slot<T>>,
}

#[derive(Debug)]
enum Slot<T> {
    Leaf { name: String, data: T },
    Directory { name: String, node: Node<T> },
}

enum Placement<T> {
    Added,
    Replaced(T),
    Occupied,
}

impl<T> Default for Node<T> {
    fn default() -> Self {
        Self {
            slots: HashMap::new(),
        }
    }
}

impl<T> SegmentTree<T> {
    /// Create an empty tree.
    #[must_use]
    pub fn new(case: CaseSensitivity) -> Self {
        Self {
            root: Node::default(),
            case,
            len: 0,
        }
    }

    /// Store `data` at `segments` unless that path is already occupied.
    ///
    /// Returns `Ok(false)` when a leaf or directory already sits at the exact
    /// path; the existing node is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PathConflict`] if one of the leading segments names
    /// an existing leaf.
    pub fn add<S: AsRef<str>>(&mut self, segments: &[S], data: T) -> Result<bool> {
        Ok(matches!(
            self.place(segments, data, false)?,
            Placement::Added
        ))
    }

    /// Store `data` at `segments`, replacing an existing leaf's payload.
    ///
    /// Returns the replaced payload. A directory at the exact path is left
    /// untouched and `data` is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PathConflict`] if one of the leading segments names
    /// an existing leaf.
    pub fn insert<S: AsRef<str>>(&mut self, segments: &[S], data: T) -> Result<Option<T>> {
        Ok(match self.place(segments, data, true)? {
            Placement::Replaced(old) => Some(old),
            Placement::Added | Placement::Occupied => None,
        })
    }

    fn place<S: AsRef<str>>(
        &mut self,
        segments: &[S],
        data: T,
        overwrite: bool,
    ) -> Result<Placement<T>> {
        let Some((last, parents)) = segments.split_last() else {
            return Ok(Placement::Occupied);
        };
        let case = self.case;

        let mut node = &mut self.root;
        for (depth, segment) in parents.iter().enumerate() {
            let segment = segment.as_ref();
            let slot = node
                .slots
                .entry(case.key(segment))
                .or_insert_with(|| Slot::Directory {
                    name: segment.to_string(),
                    node: Node::default(),
                });
            node = match slot {
                Slot::Directory { node, .. } => node,
                Slot::Leaf { .. } => {
                    return Err(Error::PathConflict {
                        path: join(&segments[..=depth]),
                    })
                }
            };
        }

        let last = last.as_ref();
        match node.slots.get_mut(&case.key(last)) {
            Some(Slot::Directory { .. }) => Ok(Placement::Occupied),
            Some(Slot::Leaf { data: existing, .. }) if overwrite => {
                Ok(Placement::Replaced(std::mem::replace(existing, data)))
            }
            Some(Slot::Leaf { .. }) => Ok(Placement::Occupied),
            None => {
                node.slots.insert(
                    case.key(last),
                    Slot::Leaf {
                        name: last.to_string(),
                        data,
                    },
                );
                self.len += 1;
                Ok(Placement::Added)
            }
        }
    }

    /// Payload of the leaf at `segments`.
    #[must_use]
    pub fn get<S: AsRef<str>>(&self, segments: &[S]) -> Option<&T> {
        let (last, parents) = segments.split_last()?;
        let node = self.directory(parents)?;
        match node.slots.get(&self.case.key(last.as_ref()))? {
            Slot::Leaf { data, .. } => Some(data),
            Slot::Directory { .. } => None,
        }
    }

    /// Leaves at or below `segments`.
    ///
    /// A leaf path yields that leaf, a directory path every leaf beneath it,
    /// an empty slice every leaf in the tree, and an unknown path nothing.
    #[must_use]
    pub fn search<S: AsRef<str>>(&self, segments: &[S]) -> Vec<SegmentEntry<T>>
    where
        T: Clone,
    {
        let mut found = Vec::new();
        let mut prefix = Vec::with_capacity(segments.len());
        let mut node = &self.root;

        for (depth, segment) in segments.iter().enumerate() {
            match node.slots.get(&self.case.key(segment.as_ref())) {
                Some(Slot::Directory { name, node: child }) => {
                    prefix.push(name.clone());
                    node = child;
                }
                Some(Slot::Leaf { name, data }) if depth + 1 == segments.len() => {
                    prefix.push(name.clone());
                    found.push((prefix, data.clone()));
                    return found;
                }
                Some(Slot::Leaf { .. }) | None => return found,
            }
        }

        node.collect(&mut prefix, &mut found);
        found
    }

    /// Remove the leaf at `segments`, pruning directories left empty.
    pub fn remove<S: AsRef<str>>(&mut self, segments: &[S]) -> Option<T> {
        let removed = self.root.remove(segments, self.case);
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    /// Whether a leaf was removed from `segments`.
    pub fn delete<S: AsRef<str>>(&mut self, segments: &[S]) -> bool {
        self.remove(segments).is_some()
    }

    /// Number of leaves.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the tree holds no leaves.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn directory<S: AsRef<str>>(&self, segments: &[S]) -> Option<&Node<T>> {
        let mut node = &self.root;
        for segment in segments {
            match node.slots.get(&self.case.key(segment.as_ref()))? {
                Slot::Directory { node: child, .. } => node = child,
                Slot::Leaf { .. } => return None,
            }
        }
        Some(node)
    }
}

impl<T> Default for SegmentTree<T> {
    fn default() -> Self {
        Self::new(CaseSensitivity::default())
    }
}

impl<T> Node<T> {
    fn collect(&self, prefix: &mut Vec<String>, found: &mut Vec<SegmentEntry<T>>)
    where
        T: Clone,
    {
        for slot in self.slots.values() {
            match slot {
                Slot::Leaf { name, data } => {
                    let mut segments = prefix.clone();
                    segments.push(name.clone());
                    found.push((segments, data.clone()));
                }
                Slot::Directory { name, node } => {
                    prefix.push(name.clone());
                    node.collect(prefix, found);
                    prefix.pop();
                }
            }
        }
    }

    fn remove<S: AsRef<str>>(&mut self, segments: &[S], case: CaseSensitivity) -> Option<T> {
        let (first, rest) = segments.split_first()?;
        let key = case.key(first.as_ref());

        if rest.is_empty() {
            if !matches!(self.slots.get(&key), Some(Slot::Leaf { .. })) {
                return None;
            }
            return match self.slots.remove(&key)? {
                Slot::Leaf { data, .. } => Some(data),
                Slot::Directory { .. } => None,
            };
        }

        let Some(Slot::Directory { node: child, .. }) = self.slots.get_mut(&key) else {
            return None;
        };
        let removed = child.remove(rest, case);
        if child.slots.is_empty() {
            self.slots.remove(&key);
        }
        removed
    }
}

fn join<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut entries: Vec<SegmentEntry<i32>>) -> Vec<SegmentEntry<i32>> {
        entries.sort();
        entries
    }

    fn entry(segments: &[&str], data: i32) -> SegmentEntry<i32> {
        (segments.iter().map(ToString::to_string).collect(), data)
    }

    #[test]
    fn test_add_search_delete_roundtrip() {
        let mut tree = SegmentTree::new(CaseSensitivity::Insensitive);

        assert!(tree.search(&["a"]).is_empty());
        assert!(tree.add(&["a", "b", "c"], 42).unwrap());
        assert_eq!(tree.search(&["a"]), vec![entry(&["a", "b", "c"], 42)]);
        assert_eq!(tree.search(&["a", "b"]), vec![entry(&["a", "b", "c"], 42)]);
        assert_eq!(tree.search(&["a", "b", "c"]), vec![entry(&["a", "b", "c"], 42)]);
        assert!(tree.search(&["a", "b", "c", "d"]).is_empty());
        assert!(!tree.add(&["a", "b"], 42).unwrap());
        assert!(tree.delete(&["a", "b", "c"]));
        assert!(tree.search(&["a"]).is_empty());
        assert!(tree.is_empty());
    }

    #[test]
    fn test_add_does_not_overwrite_leaf() {
        let mut tree = SegmentTree::new(CaseSensitivity::Sensitive);
        assert!(tree.add(&["x"], 1).unwrap());
        assert!(!tree.add(&["x"], 2).unwrap());
        assert_eq!(tree.get(&["x"]), Some(&1));
    }

    #[test]
    fn test_insert_replaces_leaf() {
        let mut tree = SegmentTree::new(CaseSensitivity::Sensitive);
        assert_eq!(tree.insert(&["x", "y"], 1).unwrap(), None);
        assert_eq!(tree.insert(&["x", "y"], 2).unwrap(), Some(1));
        assert_eq!(tree.get(&["x", "y"]), Some(&2));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_leaf_in_the_middle_conflicts() {
        let mut tree = SegmentTree::new(CaseSensitivity::Sensitive);
        tree.add(&["dir", "file"], 1).unwrap();

        let err = tree.add(&["dir", "file", "deeper"], 2).unwrap_err();
        assert!(matches!(err, Error::PathConflict { ref path } if path == "dir/file"));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_case_insensitive_keeps_first_casing() {
        let mut tree = SegmentTree::new(CaseSensitivity::Insensitive);
        tree.add(&["Home", "Notes.TXT"], 7).unwrap();

        assert_eq!(tree.get(&["home", "notes.txt"]), Some(&7));
        assert!(!tree.add(&["HOME", "NOTES.txt"], 8).unwrap());
        assert_eq!(tree.search(&["home"]), vec![entry(&["Home", "Notes.TXT"], 7)]);
    }

    #[test]
    fn test_case_sensitive_distinguishes() {
        let mut tree = SegmentTree::new(CaseSensitivity::Sensitive);
        tree.add(&["a"], 1).unwrap();
        tree.add(&["A"], 2).unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.get(&["A"]), Some(&2));
    }

    #[test]
    fn test_search_directory_lists_all_descendants() {
        let mut tree = SegmentTree::new(CaseSensitivity::Sensitive);
        tree.add(&["r", "a"], 1).unwrap();
        tree.add(&["r", "d", "b"], 2).unwrap();
        tree.add(&["r", "d", "e", "c"], 3).unwrap();
        tree.add(&["other"], 4).unwrap();

        assert_eq!(
            sorted(tree.search(&["r"])),
            vec![
                entry(&["r", "a"], 1),
                entry(&["r", "d", "b"], 2),
                entry(&["r", "d", "e", "c"], 3),
            ]
        );
        assert_eq!(tree.search::<&str>(&[]).len(), 4);
    }

    #[test]
    fn test_get_directory_is_none() {
        let mut tree = SegmentTree::new(CaseSensitivity::Sensitive);
        tree.add(&["a", "b"], 1).unwrap();
        assert_eq!(tree.get(&["a"]), None);
        assert_eq!(tree.get::<&str>(&[]), None);
    }

    #[test]
    fn test_delete_prunes_only_empty_directories() {
        let mut tree = SegmentTree::new(CaseSensitivity::Sensitive);
        tree.add(&["a", "b", "c"], 1).unwrap();
        tree.add(&["a", "x"], 2).unwrap();

        assert_eq!(tree.remove(&["a", "b", "c"]), Some(1));
        assert!(tree.search(&["a", "b"]).is_empty());
        assert_eq!(tree.search(&["a"]), vec![entry(&["a", "x"], 2)]);

        // "a/b" was pruned, so it can now hold a leaf
        assert!(tree.add(&["a", "b"], 3).unwrap());
    }

    #[test]
    fn test_delete_directory_or_missing_is_noop() {
        let mut tree = SegmentTree::new(CaseSensitivity::Sensitive);
        tree.add(&["a", "b"], 1).unwrap();
        assert!(!tree.delete(&["a"]));
        assert!(!tree.delete(&["nope", "b"]));
        assert!(!tree.delete::<&str>(&[]));
        assert_eq!(tree.len(), 1);
    }
}
