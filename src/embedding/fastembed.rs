//! FastEmbed embedding provider implementation.
//!
//! Runs sentence-transformer models locally through the fastembed library.
//! The default model, all-MiniLM-L6-v2, is the one the paper corpus is
//! indexed with.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::debug;

use super::{EmbeddingError, EmbeddingProvider, EmbeddingResult};

/// Local embedding provider backed by fastembed.
///
/// Inference is CPU-bound, so it runs on tokio's blocking pool.
#[derive(Clone)]
pub struct FastEmbedProvider {
    model: Arc<Mutex<TextEmbedding>>,
    model_name: String,
    embedding_dimension: usize,
}

/// Output dimension of the models we expect to be configured with.
pub fn model_dimension(model: &EmbeddingModel) -> usize {
    match model {
        EmbeddingModel::BGEBaseENV15 | EmbeddingModel::NomicEmbedTextV15 => 768,
        EmbeddingModel::BGELargeENV15 => 1024,
        _ => 384,
    }
}

impl FastEmbedProvider {
    /// Load a model, downloading it into `cache_dir` on first use.
    ///
    /// # Arguments
    /// * `model` - Model to use (defaults to AllMiniLML6V2)
    /// * `cache_dir` - Where model files are cached
    ///
    /// # Errors
    /// Returns `EmbeddingError::ConfigError` if the model cannot be loaded
    pub fn new(model: Option<EmbeddingModel>, cache_dir: Option<PathBuf>) -> EmbeddingResult<Self> {
        let model_type = model.unwrap_or(EmbeddingModel::AllMiniLML6V2);
        let model_name = format!("{:?}", model_type);
        let embedding_dimension = model_dimension(&model_type);

        let mut options = InitOptions::new(model_type);
        if let Some(dir) = cache_dir {
            debug!(cache_dir = %dir.display(), "Using FastEmbed cache directory");
            options = options.with_cache_dir(dir);
        }

        let text_embedding = TextEmbedding::try_new(options).map_err(|e| {
            EmbeddingError::ConfigError(format!("Failed to initialize FastEmbed model: {e}"))
        })?;

        Ok(Self {
            model: Arc::new(Mutex::new(text_embedding)),
            model_name,
            embedding_dimension,
        })
    }

    async fn run(&self, texts: Vec<String>) -> EmbeddingResult<Vec<Vec<f32>>> {
        let model = Arc::clone(&self.model);
        tokio::task::spawn_blocking(move || {
            let model = model
                .lock()
                .map_err(|_| EmbeddingError::Inference("Embedding model lock poisoned".to_string()))?;
            model
                .embed(texts, None)
                .map_err(|e| EmbeddingError::Inference(e.to_string()))
        })
        .await
        .map_err(|e| EmbeddingError::Inference(format!("Embedding task failed: {e}")))?
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("Text cannot be empty".to_string()));
        }

        self.run(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::Inference("No embedding generated".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(EmbeddingError::InvalidInput("All texts must be non-empty".to_string()));
        }

        self.run(texts.iter().map(|t| t.to_string()).collect()).await
    }

    fn dimension(&self) -> usize {
        self.embedding_dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("model_name", &self.model_name)
            .field("embedding_dimension", &self.embedding_dimension)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_dimension_table() {
        assert_eq!(model_dimension(&EmbeddingModel::AllMiniLML6V2), 384);
        assert_eq!(model_dimension(&EmbeddingModel::BGEBaseENV15), 768);
        assert_eq!(model_dimension(&EmbeddingModel::BGELargeENV15), 1024);
    }

    #[tokio::test]
    #[ignore = "downloads the embedding model"]
    async fn test_embed_single_text() {
        let provider = FastEmbedProvider::new(None, None).unwrap();
        let embedding = provider
            .embed("Hydrometallurgical recovery of lithium from spent cells.")
            .await
            .unwrap();

        assert_eq!(embedding.len(), provider.dimension());
        assert!(embedding.iter().all(|x| x.is_finite()));
    }

    #[tokio::test]
    #[ignore = "downloads the embedding model"]
    async fn test_embed_rejects_blank_text() {
        let provider = FastEmbedProvider::new(None, None).unwrap();
        assert!(matches!(
            provider.embed("  \n ").await,
            Err(EmbeddingError::InvalidInput(_))
        ));
        assert!(provider.embed_batch(&["ok", ""]).await.is_err());
    }

    #[tokio::test]
    #[ignore = "downloads the embedding model"]
    async fn test_embed_batch_preserves_order() {
        let provider = FastEmbedProvider::new(None, None).unwrap();
        let texts = ["battery recycling", "protein folding"];

        let batch = provider.embed_batch(&texts).await.unwrap();
        let first = provider.embed(texts[0]).await.unwrap();

        assert_eq!(batch.len(), 2);
        for (a, b) in batch[0].iter().zip(&first) {
            assert!((a - b).abs() < 1e-4);
        }
    }
}
