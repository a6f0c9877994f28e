//! Paper source module.
//!
//! This module defines the interface for reading extracted paper text into
//! the ingestion pipeline, and the implementation for the extractor's JSON
//! output.
//!
//! The `PaperSource` trait keeps ingestion independent of where records come
//! from: the extractor's JSON dump today, a database export or an API
//! tomorrow.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::DocumentRecord;

pub mod json;

/// Errors that can occur when reading papers from a source.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Failed to read from the data source
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse the data format
    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Trait for sources of extracted paper records.
///
/// # Design Notes
///
/// - Sources return records without vectors (embeddings are generated by the
///   ingestion pipeline)
/// - Records need not be deduplicated; the ingestion pipeline drops repeated
///   titles
#[async_trait]
pub trait PaperSource: Send + Sync {
    /// Fetch every record available from this source.
    ///
    /// # Errors
    /// Returns `ProviderError` if records cannot be read or parsed
    async fn fetch_documents(&self) -> ProviderResult<Vec<DocumentRecord>>;

    /// Fetch at most `limit` records, useful for trial runs.
    ///
    /// # Arguments
    /// * `limit` - Maximum number of records to fetch
    ///
    /// # Errors
    /// Returns `ProviderError` if records cannot be read or parsed
    async fn fetch_documents_limit(&self, limit: usize) -> ProviderResult<Vec<DocumentRecord>> {
        let all = self.fetch_documents().await?;
        Ok(all.into_iter().take(limit).collect())
    }

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}
