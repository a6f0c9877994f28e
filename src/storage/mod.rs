//! Document store abstraction and implementations.
//!
//! The pipeline never owns the paper corpus: it asks a vector-search-capable
//! store for the records most similar to a query and, during ingestion, hands
//! it embedded records to upsert. Two backends are provided:
//!
//! - `cortex`: Snowflake Cortex Search (managed service, the production store)
//! - `local`: a JSON file searched by brute-force cosine similarity
//!
//! Opening a store is a separate step (`StoreConnector::connect`) so a
//! session failure can be told apart from a failed search.

pub mod backend;
pub mod cortex;
pub mod local;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{DocumentRecord, EmbeddedDocument};

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Session could not be established
    #[error("Store connection failed: {0}")]
    ConnectionError(String),

    /// Search or insert request failed
    #[error("Store request failed: {0}")]
    RequestError(String),

    /// Response or file contents could not be decoded
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Embedding the query or a record failed
    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    /// Required settings are missing or invalid
    #[error("Store configuration error: {0}")]
    ConfigError(String),

    /// Local file I/O failed
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Trait for vector-search-capable document stores.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Return up to `limit` records ranked by similarity to `query`.
    ///
    /// Only the named `columns` need to be populated; the rest may be empty.
    /// Order is the store's relevance order and is not changed by callers.
    ///
    /// # Errors
    /// Returns `StoreError` if the search cannot be executed
    async fn search(
        &self,
        query: &str,
        columns: &[&str],
        limit: usize,
    ) -> StoreResult<Vec<DocumentRecord>>;

    /// Insert or replace embedded records, matched by title.
    ///
    /// A call is all-or-nothing: when it returns an error, none of
    /// `documents` has been written.
    ///
    /// # Returns
    /// Number of records written
    async fn upsert(&self, documents: &[EmbeddedDocument]) -> StoreResult<usize>;

    /// Human-readable name of the backend, for logging.
    fn name(&self) -> &str;
}

/// Opens a session with a document store.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    type Store: DocumentStore;

    /// Establish a session. Called once per query or ingestion run.
    async fn connect(&self) -> StoreResult<Self::Store>;
}
