//! The live index: watched files in, query results out.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::fs::File;
use std::hash::{Hash, Hasher};
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::{select, Receiver, Sender};

use crate::config::Config;
use crate::index::{FullTextIndex, PathIdMap};
use crate::metrics;
use crate::observability::spans;
use crate::query::QueryPipeline;
use crate::tokenizer::{collect_terms, standard_tokenizer, Tokenizer};
use crate::watcher::{
    FileChangeKind, FileChangedEvent, NotifyBackend, NotifyWatcherFactory, WatchDispatcher,
    WatchService,
};
use crate::Result;

/// Keeps a full-text index in sync with a set of watched files and
/// directories.
///
/// Changes are picked up in the background; [`Reindexer::search`] always sees
/// the latest indexed state.
pub struct Reindexer {
    core: Arc<Core>,
    service: Option<WatchService>,
    dispatcher: Arc<WatchDispatcher>,
    stop: Option<Sender<()>>,
    router: Option<JoinHandle<()>>,
    workers: Vec<JoinHandle<()>>,
}

/// State shared by the indexing workers and the query side.
struct Core {
    index: FullTextIndex,
    tokenizer: Box<dyn Tokenizer>,
    queries: QueryPipeline,
    paths: PathIdMap,
}

impl Reindexer {
    /// Start a reindexer and register the paths listed in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, a thread cannot be
    /// spawned, or a configured path is registered twice.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        metrics::init_metrics();

        let core = Arc::new(Core {
            index: FullTextIndex::with_compaction(config.compaction_period)?,
            tokenizer: Box::new(standard_tokenizer(config.max_token_length)),
            queries: QueryPipeline::standard(),
            paths: PathIdMap::new(),
        });

        let dispatcher = Arc::new(WatchDispatcher::new()?);
        let factory = Arc::new(NotifyWatcherFactory::new(
            Arc::new(NotifyBackend::new()),
            Arc::clone(&dispatcher),
        ));
        let service = WatchService::new(factory, config.quiet_period, config.restart_delay)?;
        let events = service.subscribe();

        let mut worker_txs = Vec::with_capacity(config.indexing_threads);
        let mut workers = Vec::with_capacity(config.indexing_threads);
        for i in 0..config.indexing_threads {
            let (tx, rx) = crossbeam_channel::unbounded::<FileChangedEvent>();
            let core = Arc::clone(&core);
            let handle = std::thread::Builder::new()
                .name(format!("indexing-worker-{i}"))
                .spawn(move || worker_loop(&core, &rx))?;
            worker_txs.push(tx);
            workers.push(handle);
        }

        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let router = std::thread::Builder::new()
            .name("indexing-router".to_string())
            .spawn(move || route(&events, &stop_rx, &worker_txs))?;

        tracing::info!(
            indexing_threads = config.indexing_threads,
            quiet_period = ?config.quiet_period,
            compaction_period = ?config.compaction_period,
            "Reindexer started"
        );

        let reindexer = Self {
            core,
            service: Some(service),
            dispatcher,
            stop: Some(stop_tx),
            router: Some(router),
            workers,
        };

        for dir in &config.watch_dirs {
            reindexer.register_directory(dir)?;
        }
        for file in &config.watch_files {
            reindexer.register_file(file)?;
        }

        Ok(reindexer)
    }

    /// Watch and index a single file.
    ///
    /// The file does not have to exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is already registered or invalid.
    pub fn register_file(&self, path: impl AsRef<Path>) -> Result<()> {
        self.service()?.register_file(path)
    }

    /// Watch and index every file below a directory.
    ///
    /// The directory does not have to exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is already registered or invalid.
    pub fn register_directory(&self, path: impl AsRef<Path>) -> Result<()> {
        self.service()?.register_directory(path)
    }

    /// Paths of the indexed files matching `text`.
    ///
    /// # Errors
    ///
    /// Returns a query error if `text` does not parse.
    pub fn search(&self, text: &str) -> Result<BTreeSet<String>> {
        self.core.search(text)
    }

    /// Number of files currently indexed.
    #[must_use]
    pub fn indexed_files(&self) -> usize {
        self.core.index.indexed_documents_count()
    }

    /// Roots currently being watched.
    #[must_use]
    pub fn watched_paths(&self) -> Vec<String> {
        self.service
            .as_ref()
            .map(WatchService::watched_paths)
            .unwrap_or_default()
    }

    fn service(&self) -> Result<&WatchService> {
        self.service
            .as_ref()
            .ok_or_else(|| crate::Error::internal("watch service already stopped"))
    }
}

impl Drop for Reindexer {
    fn drop(&mut self) {
        drop(self.stop.take());
        if let Some(router) = self.router.take() {
            if router.join().is_err() {
                tracing::error!("Indexing router panicked");
            }
        }
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::error!("Indexing worker panicked");
            }
        }

        drop(self.service.take());
        self.dispatcher.shutdown();
        tracing::info!("Reindexer stopped");
    }
}

impl std::fmt::Debug for Reindexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reindexer")
            .field("indexed_files", &self.indexed_files())
            .field("workers", &self.workers.len())
            .finish_non_exhaustive()
    }
}

impl Core {
    fn search(&self, text: &str) -> Result<BTreeSet<String>> {
        let query = self.queries.parse(text)?;
        tracing::debug!(query = %query, "Executing query");
        Ok(query
            .execute(&self.index)
            .into_iter()
            .filter_map(|id| self.paths.path_of(id))
            .collect())
    }

    fn handle(&self, event: &FileChangedEvent) {
        match event.kind() {
            FileChangeKind::CreatedOrUpdated => {
                if let Err(e) = self.index_file(event.path()) {
                    metrics::FILES_FAILED.inc();
                    tracing::error!(path = %event.path().display(), error = %e, "Failed to index file");
                }
            }
            FileChangeKind::Deleted => self.remove_file(event.path()),
        }
    }

    /// Tokenize `path` and swap it in for any previous version.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if the file cannot be opened or
    /// read; the index is left untouched.
    fn index_file(&self, path: &Path) -> Result<()> {
        let _span = spans::file_span("index", path).entered();
        let started = Instant::now();

        let file = File::open(path)?;
        let terms = collect_terms(&*self.tokenizer, BufReader::new(file))?;

        let term_count = terms.len();
        let id = self.index.index_terms(terms);
        if let Some(previous) = self.paths.insert(id, &path.to_string_lossy()) {
            self.index.delete_document(previous);
        }

        let elapsed = started.elapsed();
        metrics::FILES_INDEXED.inc();
        metrics::INDEXING_DURATION.observe(elapsed.as_secs_f64());
        self.update_document_gauge();
        tracing::info!(
            path = %path.display(),
            document_id = id,
            terms = term_count,
            elapsed = ?elapsed,
            "Indexed file"
        );
        Ok(())
    }

    fn remove_file(&self, path: &Path) {
        let _span = spans::file_span("remove", path).entered();
        let started = Instant::now();

        let Some(id) = self.paths.remove_by_path(&path.to_string_lossy()) else {
            tracing::trace!(path = %path.display(), "Deleted file was not indexed");
            return;
        };
        self.index.delete_document(id);

        let elapsed = started.elapsed();
        metrics::FILES_REMOVED.inc();
        self.update_document_gauge();
        tracing::info!(
            path = %path.display(),
            document_id = id,
            elapsed = ?elapsed,
            "Removed file from index"
        );
    }

    fn update_document_gauge(&self) {
        metrics::INDEXED_DOCUMENTS.set(metrics::gauge_value(self.index.indexed_documents_count()));
    }
}

/// Forward each event to the worker owning its path until stopped.
fn route(events: &Receiver<FileChangedEvent>, stop: &Receiver<()>, workers: &[Sender<FileChangedEvent>]) {
    loop {
        select! {
            recv(events) -> event => {
                let Ok(event) = event else { break };
                let shard = shard_of(&event, workers.len());
                if workers[shard].send(event).is_err() {
                    tracing::warn!(shard, "Indexing worker gone, dropping event");
                }
            }
            recv(stop) -> _ => break,
        }
    }
    tracing::debug!("Indexing router stopped");
}

/// Same path, same shard, so events for one file are applied in order.
fn shard_of(event: &FileChangedEvent, shards: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    event.path_key().hash(&mut hasher);
    #[allow(clippy::cast_possible_truncation)]
    let hash = hasher.finish() as usize;
    hash % shards.max(1)
}

fn worker_loop(core: &Core, events: &Receiver<FileChangedEvent>) {
    for event in events {
        core.handle(&event);
    }
    tracing::debug!("Indexing worker shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tempfile::TempDir;

    use crate::error::QueryError;
    use crate::Error;

    fn core() -> Core {
        Core {
            index: FullTextIndex::new(),
            tokenizer: Box::new(standard_tokenizer(64)),
            queries: QueryPipeline::standard(),
            paths: PathIdMap::new(),
        }
    }

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn names(paths: &BTreeSet<String>) -> Vec<String> {
        paths
            .iter()
            .map(|p| Path::new(p).file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_index_and_search() {
        let dir = TempDir::new().unwrap();
        let core = core();
        let cats = write(&dir, "cats.txt", "The cats sat on the mat");
        let dogs = write(&dir, "dogs.txt", "Dogs chase cats");

        core.handle(&FileChangedEvent::created_or_updated(&cats));
        core.handle(&FileChangedEvent::created_or_updated(&dogs));

        assert_eq!(core.index.indexed_documents_count(), 2);
        assert_eq!(names(&core.search("cat").unwrap()), vec!["cats.txt", "dogs.txt"]);
        assert_eq!(names(&core.search("dogs AND cats").unwrap()), vec!["dogs.txt"]);
        assert_eq!(names(&core.search("NOT dog").unwrap()), vec!["cats.txt"]);
        assert_eq!(names(&core.search("mat OR chase").unwrap()).len(), 2);
    }

    #[test]
    fn test_reindex_replaces_old_document() {
        let dir = TempDir::new().unwrap();
        let core = core();
        let path = write(&dir, "note.txt", "alpha");
        core.handle(&FileChangedEvent::created_or_updated(&path));

        std::fs::write(&path, "beta").unwrap();
        core.handle(&FileChangedEvent::created_or_updated(&path));

        assert_eq!(core.index.indexed_documents_count(), 1);
        assert!(core.search("alpha").unwrap().is_empty());
        assert_eq!(core.search("beta").unwrap().len(), 1);
    }

    #[test]
    fn test_delete_removes_document() {
        let dir = TempDir::new().unwrap();
        let core = core();
        let path = write(&dir, "gone.txt", "ephemeral words");
        core.handle(&FileChangedEvent::created_or_updated(&path));

        core.handle(&FileChangedEvent::deleted(&path));

        assert_eq!(core.index.indexed_documents_count(), 0);
        assert!(core.search("ephemeral").unwrap().is_empty());
        assert!(core.paths.is_empty());
    }

    #[test]
    fn test_delete_of_unknown_path_is_ignored() {
        let core = core();
        core.handle(&FileChangedEvent::deleted("/never/indexed.txt"));
        assert_eq!(core.index.indexed_documents_count(), 0);
    }

    #[test]
    fn test_unreadable_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        let core = core();
        core.handle(&FileChangedEvent::created_or_updated(dir.path().join("missing.txt")));
        assert_eq!(core.index.indexed_documents_count(), 0);
        assert!(core.paths.is_empty());
    }

    #[test]
    fn test_unreadable_file_reports_io_error() {
        let dir = TempDir::new().unwrap();
        let core = core();
        let err = core.index_file(&dir.path().join("missing.txt")).unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == std::io::ErrorKind::NotFound));
    }

    #[test]
    fn test_failed_reindex_keeps_previous_document() {
        let dir = TempDir::new().unwrap();
        let core = core();
        let path = write(&dir, "kept.txt", "original words");
        core.index_file(&path).unwrap();

        std::fs::remove_file(&path).unwrap();
        assert!(core.index_file(&path).is_err());

        assert_eq!(core.index.indexed_documents_count(), 1);
        assert_eq!(core.search("original").unwrap().len(), 1);
    }

    #[test]
    fn test_empty_file_is_indexed() {
        let dir = TempDir::new().unwrap();
        let core = core();
        let path = write(&dir, "empty.txt", "");
        core.handle(&FileChangedEvent::created_or_updated(&path));

        assert_eq!(core.index.indexed_documents_count(), 1);
        assert_eq!(core.search("NOT anything").unwrap().len(), 1);
    }

    #[test]
    fn test_search_reports_parse_errors() {
        let core = core();
        let err = core.search("a AND").unwrap_err();
        assert!(matches!(err, Error::Query(QueryError::Parse { .. })));
    }

    #[test]
    fn test_stopword_only_query_matches_nothing() {
        let dir = TempDir::new().unwrap();
        let core = core();
        let path = write(&dir, "the.txt", "the and of");
        core.handle(&FileChangedEvent::created_or_updated(&path));

        assert!(core.search("the").unwrap().is_empty());
    }

    #[test]
    fn test_shard_is_stable_per_path() {
        let a = FileChangedEvent::created_or_updated("/data/File.txt");
        let b = FileChangedEvent::deleted("/data/file.txt");
        assert_eq!(shard_of(&a, 7), shard_of(&b, 7));
        assert!(shard_of(&a, 7) < 7);
    }

    #[test]
    fn test_reindexer_rejects_invalid_config() {
        let config = Config {
            indexing_threads: 0,
            ..Config::default()
        };
        assert!(Reindexer::new(config).is_err());
    }

    #[test]
    fn test_reindexer_indexes_registered_file() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "watched.txt", "watched content");
        let config = Config {
            quiet_period: Duration::from_millis(50),
            restart_delay: Duration::from_millis(50),
            ..Config::default()
        };
        let reindexer = Reindexer::new(config).unwrap();
        reindexer.register_file(&path).unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        while reindexer.indexed_files() == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(reindexer.indexed_files(), 1);
        assert_eq!(reindexer.search("content").unwrap().len(), 1);
        assert!(reindexer.register_file(&path).is_err());
    }
}
