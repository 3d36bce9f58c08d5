//! Term → document postings with deferred deletion.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{select, tick, Sender};
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;

use super::{DocumentId, SearchIndex};
use crate::metrics;
use crate::Result;

/// Result of a compaction request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionOutcome {
    /// Tombstones were purged from every posting set.
    Completed { purged: usize },
    /// Another compaction was running; nothing was done.
    Skipped,
}

/// Concurrent inverted index.
///
/// Deleted documents are tombstoned and disappear from query results at once;
/// their ids are purged from the postings by [`FullTextIndex::compact`], which
/// also runs periodically when the index is built with
/// [`FullTextIndex::with_compaction`].
pub struct FullTextIndex {
    state: Arc<IndexState>,
    compactor: Option<Compactor>,
}

#[derive(Default)]
struct IndexState {
    last_document_id: AtomicU64,
    postings: DashMap<String, DashSet<DocumentId>>,
    live: DashSet<DocumentId>,
    tombstones: DashSet<DocumentId>,
    compaction: Mutex<()>,
}

impl FullTextIndex {
    /// Create an index without background compaction.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(IndexState::default()),
            compactor: None,
        }
    }

    /// Create an index compacting itself every `period`.
    ///
    /// # Errors
    ///
    /// Returns an error if the compaction thread cannot be spawned.
    pub fn with_compaction(period: Duration) -> Result<Self> {
        let state = Arc::new(IndexState::default());
        let compactor = Compactor::spawn(Arc::clone(&state), period)?;
        Ok(Self {
            state,
            compactor: Some(compactor),
        })
    }

    /// Index a document made of `terms`, returning its new id.
    pub fn index_terms<I, S>(&self, terms: I) -> DocumentId
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let id = self.state.last_document_id.fetch_add(1, Ordering::SeqCst) + 1;
        for term in terms {
            self.state
                .postings
                .entry(fold(term.as_ref()))
                .or_default()
                .insert(id);
        }
        self.state.live.insert(id);
        id
    }

    /// Remove a document from query results.
    pub fn delete_document(&self, id: DocumentId) {
        self.state.tombstones.insert(id);
        self.state.live.remove(&id);
        metrics::DOCUMENTS_TOMBSTONED.set(metrics::gauge_value(self.state.tombstones.len()));
    }

    /// Number of live documents.
    #[must_use]
    pub fn indexed_documents_count(&self) -> usize {
        self.state.live.len()
    }

    /// Every term ever indexed.
    #[must_use]
    pub fn indexed_terms(&self) -> Vec<String> {
        self.state
            .postings
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Number of deleted documents still present in the postings.
    #[must_use]
    pub fn pending_tombstones(&self) -> usize {
        self.state.tombstones.len()
    }

    /// Purge tombstoned ids from the postings.
    ///
    /// Never waits: if a compaction is already running this returns
    /// [`CompactionOutcome::Skipped`].
    pub fn compact(&self) -> CompactionOutcome {
        self.state.compact()
    }

    /// Whether a background compaction thread is attached.
    #[must_use]
    pub fn has_background_compaction(&self) -> bool {
        self.compactor.is_some()
    }
}

impl Default for FullTextIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchIndex for FullTextIndex {
    fn matching_documents(&self, term: &str) -> HashSet<DocumentId> {
        let Some(documents) = self.state.postings.get(&fold(term)) else {
            return HashSet::new();
        };

        documents
            .iter()
            .map(|id| *id)
            .filter(|id| !self.state.tombstones.contains(id))
            .collect()
    }

    fn indexed_documents(&self) -> HashSet<DocumentId> {
        self.state.live.iter().map(|id| *id).collect()
    }
}

impl IndexState {
    fn compact(&self) -> CompactionOutcome {
        let Some(_guard) = self.compaction.try_lock() else {
            tracing::debug!("Compaction already running, skipping");
            return CompactionOutcome::Skipped;
        };

        let started = Instant::now();
        let deleted: Vec<DocumentId> = self.tombstones.iter().map(|id| *id).collect();
        if deleted.is_empty() {
            return CompactionOutcome::Completed { purged: 0 };
        }

        for documents in &self.postings {
            for id in &deleted {
                documents.remove(id);
            }
        }
        self.postings.retain(|_, documents| !documents.is_empty());
        for id in &deleted {
            self.tombstones.remove(id);
        }

        metrics::COMPACTIONS_TOTAL.inc();
        metrics::DOCUMENTS_TOMBSTONED.set(metrics::gauge_value(self.tombstones.len()));
        tracing::debug!(
            purged = deleted.len(),
            elapsed = ?started.elapsed(),
            "Compacted index"
        );

        CompactionOutcome::Completed {
            purged: deleted.len(),
        }
    }
}

/// Periodic compaction thread, stopped and joined on drop.
struct Compactor {
    shutdown_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Compactor {
    fn spawn(state: Arc<IndexState>, period: Duration) -> Result<Self> {
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);

        let handle = std::thread::Builder::new()
            .name("index-compactor".to_string())
            .spawn(move || {
                let ticker = tick(period);
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            state.compact();
                        }
                        recv(shutdown_rx) -> _ => break,
                    }
                }
                tracing::debug!("Index compactor stopped");
            })?;

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }
}

impl Drop for Compactor {
    fn drop(&mut self) {
        drop(self.shutdown_tx.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn fold(term: &str) -> String {
    term.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[DocumentId]) -> HashSet<DocumentId> {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_ids_are_monotonic() {
        let index = FullTextIndex::new();
        let first = index.index_terms(["a"]);
        let second = index.index_terms(["b"]);
        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[test]
    fn test_index_and_match() {
        let index = FullTextIndex::new();
        let id = index.index_terms(["term", "other"]);

        assert_eq!(index.matching_documents("term"), set(&[id]));
        assert_eq!(index.matching_documents("other"), set(&[id]));
        assert!(index.matching_documents("missing").is_empty());
        assert_eq!(index.indexed_documents(), set(&[id]));
    }

    #[test]
    fn test_terms_are_case_insensitive() {
        let index = FullTextIndex::new();
        let id = index.index_terms(["Dracula"]);
        assert_eq!(index.matching_documents("DRACULA"), set(&[id]));
        assert_eq!(index.indexed_terms(), vec!["dracula".to_string()]);
    }

    #[test]
    fn test_document_without_terms_is_live() {
        let index = FullTextIndex::new();
        let id = index.index_terms(Vec::<String>::new());
        assert_eq!(index.indexed_documents(), set(&[id]));
        assert_eq!(index.indexed_documents_count(), 1);
    }

    #[test]
    fn test_delete_is_visible_before_compaction() {
        let index = FullTextIndex::new();
        let id = index.index_terms(["term"]);

        index.delete_document(id);

        assert!(!index.indexed_documents().contains(&id));
        assert!(index.matching_documents("term").is_empty());
        assert_eq!(index.pending_tombstones(), 1);
    }

    #[test]
    fn test_compaction_purges_tombstones() {
        let index = FullTextIndex::new();
        let kept = index.index_terms(["term"]);
        let deleted = index.index_terms(["term"]);
        index.delete_document(deleted);

        assert_eq!(index.compact(), CompactionOutcome::Completed { purged: 1 });
        assert_eq!(index.pending_tombstones(), 0);
        assert_eq!(index.matching_documents("term"), set(&[kept]));
        assert_eq!(index.compact(), CompactionOutcome::Completed { purged: 0 });
    }

    #[test]
    fn test_compaction_drops_empty_postings() {
        let index = FullTextIndex::new();
        let kept = index.index_terms(["shared"]);
        let deleted = index.index_terms(["shared", "orphan"]);
        index.delete_document(deleted);
        index.compact();

        assert_eq!(index.indexed_terms(), vec!["shared".to_string()]);
        assert_eq!(index.matching_documents("shared"), set(&[kept]));
    }

    #[test]
    fn test_compaction_skips_when_running() {
        let index = FullTextIndex::new();
        let _guard = index.state.compaction.lock();
        assert_eq!(index.compact(), CompactionOutcome::Skipped);
    }

    #[test]
    fn test_background_compaction() {
        let index = FullTextIndex::with_compaction(Duration::from_millis(20)).unwrap();
        assert!(index.has_background_compaction());

        let id = index.index_terms(["term"]);
        index.delete_document(id);

        let deadline = Instant::now() + Duration::from_secs(5);
        while index.pending_tombstones() > 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(index.pending_tombstones(), 0);
    }

    #[test]
    fn test_concurrent_indexing_and_compaction() {
        let index = Arc::new(FullTextIndex::new());
        let writers: Vec<_> = (0..4)
            .map(|_| {
                let index = Arc::clone(&index);
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        let id = index.index_terms(["shared", "word"]);
                        index.delete_document(id);
                        index.compact();
                    }
                })
            })
            .collect();

        for writer in writers {
            writer.join().unwrap();
        }
        index.compact();

        assert_eq!(index.indexed_documents_count(), 0);
        assert!(index.matching_documents("shared").is_empty());
        assert_eq!(index.pending_tombstones(), 0);
    }
}
