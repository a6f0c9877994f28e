//! Ingestion pipeline module.
//!
//! This module handles the offline side of the system: it takes extracted
//! paper records, embeds their titles and abstracts, drops repeated titles
//! and writes the result to a document store.
//!
//! ```ignore
//! use paper_rag::ingestion::IngestionPipeline;
//! use paper_rag::provider::json::ExtractedJsonProvider;
//!
//! let store = connector.connect().await?;
//! let pipeline = IngestionPipeline::new(FastEmbedProvider::new(None, None)?, store, None);
//!
//! let source = ExtractedJsonProvider::from_file("extracted_papers.json").await?;
//! let stats = pipeline.ingest_from_source(&source).await?;
//! println!("Inserted: {}, Duplicates: {}", stats.inserted, stats.duplicates_skipped);
//! ```
//!
//! Blank titles and abstracts are not embedded; their vectors stay empty and
//! the store records them as NULL.

use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::embedding::{normalize_text, EmbeddingProvider};
use crate::models::{DocumentRecord, EmbeddedDocument};
use crate::provider::{PaperSource, ProviderError};
use crate::storage::DocumentStore;

/// Default number of records embedded and upserted together.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Errors that can occur during ingestion.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    /// Provider operation failed
    #[error("Provider error: {0}")]
    ProviderError(#[from] ProviderError),
}

/// Result type for ingestion operations.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Statistics from an ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestionStats {
    /// Total number of input records processed
    pub total_processed: usize,

    /// Number of records successfully written
    pub inserted: usize,

    /// Number of records skipped because their title was already seen
    pub duplicates_skipped: usize,

    /// Number of records whose batch could not be written
    pub failed: usize,
}

impl IngestionStats {
    /// Create new empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_inserted(&mut self, count: usize) {
        self.total_processed += count;
        self.inserted += count;
    }

    pub fn record_duplicate(&mut self) {
        self.total_processed += 1;
        self.duplicates_skipped += 1;
    }

    pub fn record_failed(&mut self, count: usize) {
        self.total_processed += count;
        self.failed += count;
    }
}

/// Ingestion pipeline coordinator.
///
/// Coordinates embedding generation and store writes, one batch at a time.
pub struct IngestionPipeline<E, S>
where
    E: EmbeddingProvider,
    S: DocumentStore,
{
    /// Embedding provider for title and abstract vectors
    embedding_provider: E,

    /// Store receiving the embedded records
    store: S,

    /// Records per embedding call and upsert
    batch_size: usize,
}

impl<E, S> IngestionPipeline<E, S>
where
    E: EmbeddingProvider,
    S: DocumentStore,
{
    /// Create a pipeline writing to `store`.
    ///
    /// # Arguments
    /// * `embedding_provider` - Provider used for title and abstract vectors
    /// * `store` - Destination store session
    /// * `batch_size` - Records per batch (default: 100, zero is treated as one)
    pub fn new(embedding_provider: E, store: S, batch_size: Option<usize>) -> Self {
        Self {
            embedding_provider,
            store,
            batch_size: batch_size.unwrap_or(DEFAULT_BATCH_SIZE).max(1),
        }
    }

    /// Normalized title used as the deduplication key.
    pub fn normalize_title(title: &str) -> String {
        normalize_text(title)
    }

    /// Ingest a slice of records.
    ///
    /// # Errors
    /// Returns `IngestionError::EmbeddingError` if embedding generation fails
    pub async fn ingest_batch(&self, documents: &[DocumentRecord]) -> IngestionResult<IngestionStats> {
        self.ingest_with_progress(documents, |_| {}).await
    }

    /// Ingest a slice of records, reporting cumulative stats after each batch.
    ///
    /// Records are processed in batches of `batch_size`:
    /// 1. Titles already seen in this run are skipped
    /// 2. Non-blank titles and abstracts of the rest are embedded in one call
    /// 3. The batch is upserted; a rejected batch counts as failed and the
    ///    run continues
    ///
    /// # Arguments
    /// * `documents` - Records to ingest (without vectors)
    /// * `on_batch` - Called with the running totals after every batch
    ///
    /// # Errors
    /// Returns `IngestionError::EmbeddingError` if embedding generation fails
    pub async fn ingest_with_progress<F>(
        &self,
        documents: &[DocumentRecord],
        mut on_batch: F,
    ) -> IngestionResult<IngestionStats>
    where
        F: FnMut(&IngestionStats),
    {
        let mut stats = IngestionStats::new();
        let mut seen: HashSet<String> = HashSet::new();

        for chunk in documents.chunks(self.batch_size) {
            let mut to_process: Vec<&DocumentRecord> = Vec::new();
            for document in chunk {
                if seen.insert(Self::normalize_title(&document.title)) {
                    to_process.push(document);
                } else {
                    debug!(title = %document.title, "Skipping duplicate title");
                    stats.record_duplicate();
                }
            }

            if !to_process.is_empty() {
                let embedded = self.embed_documents(&to_process).await?;
                match self.store.upsert(&embedded).await {
                    Ok(written) => stats.record_inserted(written),
                    Err(e) => {
                        warn!(
                            store = self.store.name(),
                            batch = embedded.len(),
                            error = %e,
                            "Failed to write batch"
                        );
                        stats.record_failed(embedded.len());
                    }
                }
            }

            on_batch(&stats);
        }

        info!(
            processed = stats.total_processed,
            inserted = stats.inserted,
            duplicates = stats.duplicates_skipped,
            failed = stats.failed,
            "Ingestion finished"
        );
        Ok(stats)
    }

    /// Fetch every record from `source` and ingest it.
    ///
    /// # Errors
    /// Returns `IngestionError::ProviderError` if the source cannot be read,
    /// or `IngestionError::EmbeddingError` if embedding generation fails
    pub async fn ingest_from_source<P>(&self, source: &P) -> IngestionResult<IngestionStats>
    where
        P: PaperSource,
    {
        let documents = source.fetch_documents().await?;
        info!(source = source.name(), documents = documents.len(), "Fetched papers");
        self.ingest_batch(&documents).await
    }

    async fn embed_documents(
        &self,
        documents: &[&DocumentRecord],
    ) -> IngestionResult<Vec<EmbeddedDocument>> {
        // (document index, is_title) for every text sent to the model
        let mut slots: Vec<(usize, bool)> = Vec::new();
        let mut texts: Vec<String> = Vec::new();
        for (i, document) in documents.iter().enumerate() {
            for (is_title, text) in [(true, &document.title), (false, &document.abstract_text)] {
                if !text.trim().is_empty() {
                    slots.push((i, is_title));
                    texts.push(normalize_text(text));
                }
            }
        }

        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
            self.embedding_provider
                .embed_batch(&refs)
                .await
                .map_err(|e| IngestionError::EmbeddingError(e.to_string()))?
        };
        if vectors.len() != texts.len() {
            return Err(IngestionError::EmbeddingError(format!(
                "Expected {} vectors, got {}",
                texts.len(),
                vectors.len()
            )));
        }

        let mut embedded: Vec<EmbeddedDocument> = documents
            .iter()
            .map(|d| EmbeddedDocument {
                record: (*d).clone(),
                title_vector: None,
                abstract_vector: None,
            })
            .collect();
        for ((i, is_title), vector) in slots.into_iter().zip(vectors) {
            if is_title {
                embedded[i].title_vector = Some(vector);
            } else {
                embedded[i].abstract_vector = Some(vector);
            }
        }
        Ok(embedded)
    }
}
