//! In-memory inverted index.
//!
//! This module provides:
//! - `FullTextIndex`: term postings with tombstoned deletes and background compaction
//! - `PathIdMap`: the bidirectional path ↔ document id map
//! - `SearchIndex`: the read seam queries execute against

mod full_text;
mod path_map;

use std::collections::HashSet;

pub use full_text::{CompactionOutcome, FullTextIndex};
pub use path_map::PathIdMap;

/// Identifier of an indexed document. Allocated monotonically, never reused.
pub type DocumentId = u64;

/// Read access needed to evaluate a query.
pub trait SearchIndex {
    /// Live documents containing `term`.
    fn matching_documents(&self, term: &str) -> HashSet<DocumentId>;

    /// Every live document.
    fn indexed_documents(&self) -> HashSet<DocumentId>;
}
