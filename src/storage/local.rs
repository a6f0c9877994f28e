//! Local JSON-file store.
//!
//! Keeps embedded records in a single JSON file and answers searches by
//! brute force: embed the normalized query, score every record by cosine
//! similarity against its title and abstract vectors (whichever is higher),
//! and return the top `limit`. Suitable for small corpora and offline use.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{DocumentStore, StoreConnector, StoreError, StoreResult};
use crate::embedding::{cosine_similarity, normalize_text, EmbeddingProvider};
use crate::models::{DocumentRecord, EmbeddedDocument};

/// Opens a [`LocalStore`] backed by a corpus file.
#[derive(Clone)]
pub struct LocalConnector<E> {
    path: PathBuf,
    embedder: E,
}

impl<E> LocalConnector<E>
where
    E: EmbeddingProvider + Clone,
{
    pub fn new(path: impl Into<PathBuf>, embedder: E) -> Self {
        Self {
            path: path.into(),
            embedder,
        }
    }
}

#[async_trait]
impl<E> StoreConnector for LocalConnector<E>
where
    E: EmbeddingProvider + Clone,
{
    type Store = LocalStore<E>;

    async fn connect(&self) -> StoreResult<LocalStore<E>> {
        LocalStore::open(&self.path, self.embedder.clone()).await
    }
}

/// In-memory corpus persisted to a JSON file.
pub struct LocalStore<E> {
    path: Option<PathBuf>,
    embedder: E,
    documents: RwLock<Vec<EmbeddedDocument>>,
}

impl<E> LocalStore<E>
where
    E: EmbeddingProvider,
{
    /// Load the corpus at `path`; a missing file starts an empty corpus.
    ///
    /// # Errors
    /// Returns `StoreError` if the file exists but cannot be read or decoded
    pub async fn open(path: &Path, embedder: E) -> StoreResult<Self> {
        let documents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                StoreError::SerializationError(format!("{}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        info!(path = %path.display(), documents = documents.len(), "Opened local corpus");
        Ok(Self {
            path: Some(path.to_path_buf()),
            embedder,
            documents: RwLock::new(documents),
        })
    }

    /// A store that is never written to disk.
    pub fn in_memory(embedder: E, documents: Vec<EmbeddedDocument>) -> Self {
        Self {
            path: None,
            embedder,
            documents: RwLock::new(documents),
        }
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    async fn persist(&self, documents: &[EmbeddedDocument]) -> StoreResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string(documents)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

/// Best similarity between the query and either of the document's vectors.
fn score(query: &[f32], document: &EmbeddedDocument) -> Option<f32> {
    [&document.title_vector, &document.abstract_vector]
        .into_iter()
        .flatten()
        .filter_map(|v| cosine_similarity(query, v))
        .reduce(f32::max)
}

#[async_trait]
impl<E> DocumentStore for LocalStore<E>
where
    E: EmbeddingProvider,
{
    async fn search(
        &self,
        query: &str,
        columns: &[&str],
        limit: usize,
    ) -> StoreResult<Vec<DocumentRecord>> {
        let query_vector = self
            .embedder
            .embed(&normalize_text(query))
            .await
            .map_err(|e| StoreError::EmbeddingError(e.to_string()))?;

        let documents = self.documents.read().await;
        let mut scored: Vec<(f32, &EmbeddedDocument)> = documents
            .iter()
            .filter_map(|d| score(&query_vector, d).map(|s| (s, d)))
            .collect();

        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        scored.truncate(limit);

        debug!(candidates = documents.len(), returned = scored.len(), "Ranked local corpus");
        Ok(scored
            .into_iter()
            .map(|(_, d)| d.record.project(columns))
            .collect())
    }

    async fn upsert(&self, incoming: &[EmbeddedDocument]) -> StoreResult<usize> {
        let mut documents = self.documents.write().await;
        let mut updated = documents.clone();
        for document in incoming {
            let key = normalize_text(&document.record.title);
            match updated
                .iter_mut()
                .find(|d| normalize_text(&d.record.title) == key)
            {
                Some(existing) => *existing = document.clone(),
                None => updated.push(document.clone()),
            }
        }
        // Memory only changes once the file write has succeeded
        self.persist(&updated).await?;
        *documents = updated;
        Ok(incoming.len())
    }

    fn name(&self) -> &str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SEARCH_COLUMNS;
    use crate::testing::{embedded, KeywordEmbedder};

    #[tokio::test]
    async fn test_search_ranks_by_similarity_and_truncates() {
        let store = LocalStore::in_memory(
            KeywordEmbedder,
            vec![
                embedded("Protein folding", "structure prediction"),
                embedded("Battery recycling review", "battery cathode recovery"),
                embedded("Battery cost", "grid storage economics"),
            ],
        );

        let results = store.search("battery recycling", &SEARCH_COLUMNS, 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Battery recycling review");
        assert_eq!(results[1].title, "Battery cost");
    }

    #[tokio::test]
    async fn test_search_projects_requested_columns() {
        let mut doc = embedded("Battery recycling", "battery");
        doc.record.keywords = "hydrometallurgy".to_string();
        let store = LocalStore::in_memory(KeywordEmbedder, vec![doc]);

        let results = store.search("battery", &["title"], 5).await.unwrap();
        assert_eq!(results[0].title, "Battery recycling");
        assert_eq!(results[0].keywords, "");
    }

    #[tokio::test]
    async fn test_documents_without_vectors_are_skipped() {
        let mut doc = embedded("Unindexed", "battery");
        doc.title_vector = None;
        doc.abstract_vector = None;
        let store = LocalStore::in_memory(KeywordEmbedder, vec![doc]);

        assert!(store.search("battery", &SEARCH_COLUMNS, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_title_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus").join("papers.json");

        let store = LocalStore::open(&path, KeywordEmbedder).await.unwrap();
        assert!(store.is_empty().await);

        store
            .upsert(&[embedded("Battery Recycling", "first"), embedded("Solar", "pv")])
            .await
            .unwrap();
        let mut updated = embedded("battery   recycling", "second");
        updated.record.conclusion = "revised".to_string();
        store.upsert(&[updated]).await.unwrap();
        assert_eq!(store.len().await, 2);

        let reopened = LocalStore::open(&path, KeywordEmbedder).await.unwrap();
        assert_eq!(reopened.len().await, 2);
        let docs = reopened.documents.read().await;
        assert_eq!(docs[0].record.conclusion, "revised");
    }

    #[tokio::test]
    async fn test_failed_write_leaves_corpus_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("papers.json");

        let store = LocalStore::open(&path, KeywordEmbedder).await.unwrap();
        store.upsert(&[embedded("Solar", "pv")]).await.unwrap();

        // A directory in place of the corpus file makes the next write fail
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        let result = store
            .upsert(&[embedded("Battery recycling", "battery"), embedded("Solar", "revised")])
            .await;
        assert!(result.is_err());
        assert_eq!(store.len().await, 1);
        assert_eq!(store.documents.read().await[0].record.abstract_text, "pv");
    }

    #[tokio::test]
    async fn test_open_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("papers.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            LocalStore::open(&path, KeywordEmbedder).await,
            Err(StoreError::SerializationError(_))
        ));
    }
}
