//! Batched, count-verified submission of documents to the search backend.

use tracing::debug;

use crate::{IndexError, SearchBackend};
use gitterlog_archive::IndexedDocument;

/// Split a slice into groups of at most `max` items.
///
/// The last group carries the remainder; an empty slice yields no groups.
pub fn chunked<T>(items: &[T], max: usize) -> impl Iterator<Item = &[T]> {
    assert!(max > 0, "chunk size must be positive");
    items.chunks(max)
}

/// Pushes projected documents to the backend in bounded batches and
/// verifies every one was acknowledged.
pub struct IndexingPipeline<'a> {
    backend: &'a dyn SearchBackend,
    batch_size: usize,
}

impl<'a> IndexingPipeline<'a> {
    pub fn new(backend: &'a dyn SearchBackend, batch_size: usize) -> Self {
        Self {
            backend,
            batch_size,
        }
    }

    pub async fn ensure_index(&self) -> Result<(), IndexError> {
        self.backend.ensure_index().await
    }

    /// Submit `docs` in chunks and return the total acknowledged count.
    ///
    /// A shortfall raises [`IndexError::CountMismatch`], which callers must
    /// treat as fatal to the run: the archive would otherwise record more
    /// messages than the index holds.
    pub async fn index(&self, docs: &[IndexedDocument]) -> Result<usize, IndexError> {
        let mut acked = 0usize;
        for chunk in chunked(docs, self.batch_size) {
            acked += self.backend.submit(chunk).await?;
            debug!(acked, submitted = docs.len(), "indexed chunk");
        }
        if acked != docs.len() {
            return Err(IndexError::CountMismatch {
                submitted: docs.len(),
                acked,
            });
        }
        Ok(acked)
    }
}
