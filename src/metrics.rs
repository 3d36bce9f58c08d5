//! Prometheus metrics definitions.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Encoder, Histogram,
    IntCounter, IntGauge, TextEncoder,
};

use crate::{Error, Result};

/// Live documents in the index.
pub static INDEXED_DOCUMENTS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "reindex_indexed_documents",
        "Number of live documents in the index"
    )
    .expect("indexed documents gauge registers once")
});

/// Deleted documents not yet purged by compaction.
pub static DOCUMENTS_TOMBSTONED: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "reindex_documents_tombstoned",
        "Number of deleted documents awaiting compaction"
    )
    .expect("tombstone gauge registers once")
});

/// Files (re)indexed.
pub static FILES_INDEXED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("reindex_files_indexed_total", "Total number of files indexed")
        .expect("files indexed counter registers once")
});

/// Files removed from the index.
pub static FILES_REMOVED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "reindex_files_removed_total",
        "Total number of files removed from the index"
    )
    .expect("files removed counter registers once")
});

/// Files that could not be read or tokenized.
pub static FILES_FAILED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "reindex_files_failed_total",
        "Total number of files that failed to index"
    )
    .expect("files failed counter registers once")
});

/// Time spent tokenizing and indexing one file.
pub static INDEXING_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "reindex_indexing_duration_seconds",
        "Time to index a single file in seconds",
        vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
    )
    .expect("indexing duration histogram registers once")
});

/// Completed compactions that purged at least one document.
pub static COMPACTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "reindex_compactions_total",
        "Total number of index compactions"
    )
    .expect("compactions counter registers once")
});

/// Initialize all metrics (call once at startup).
pub fn init_metrics() {
    // Access lazy statics to register them
    let _ = &*INDEXED_DOCUMENTS;
    let _ = &*DOCUMENTS_TOMBSTONED;
    let _ = &*FILES_INDEXED;
    let _ = &*FILES_REMOVED;
    let _ = &*FILES_FAILED;
    let _ = &*INDEXING_DURATION;
    let _ = &*COMPACTIONS_TOTAL;

    tracing::debug!("Prometheus metrics initialized");
}

/// Render every registered metric in the Prometheus text format.
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn gather_text() -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| Error::internal(format!("failed to encode metrics: {e}")))?;
    String::from_utf8(buffer).map_err(|e| Error::internal(format!("metrics not UTF-8: {e}")))
}

#[allow(clippy::cast_possible_wrap)]
pub(crate) fn gauge_value(count: usize) -> i64 {
    count as i64
}
