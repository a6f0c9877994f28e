//! Deterministic test doubles shared by the unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::embedding::{EmbeddingError, EmbeddingProvider, EmbeddingResult};
use crate::llm::{CompletionRequest, LanguageModel, LlmError, LlmResult, Role};
use crate::models::{DocumentRecord, EmbeddedDocument};
use crate::storage::{DocumentStore, StoreConnector, StoreError, StoreResult};

// ===== Embeddings =====

const VOCABULARY: [&str; 12] = [
    "battery", "recycling", "cathode", "recovery", "protein", "folding", "structure", "solar",
    "grid", "storage", "cost", "economics",
];

/// Bag-of-words vector over a fixed vocabulary plus one bucket for other words.
pub fn keyword_vector(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; VOCABULARY.len() + 1];
    for word in text.split_whitespace().map(str::to_lowercase) {
        let slot = VOCABULARY
            .iter()
            .position(|v| *v == word)
            .unwrap_or(VOCABULARY.len());
        vector[slot] += 1.0;
    }
    vector
}

/// Embedder whose vectors are [`keyword_vector`]s.
#[derive(Debug, Clone, Copy)]
pub struct KeywordEmbedder;

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("Text cannot be empty".to_string()));
        }
        Ok(keyword_vector(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn dimension(&self) -> usize {
        VOCABULARY.len() + 1
    }

    fn model_name(&self) -> &str {
        "keyword"
    }
}

/// Embedded document with keyword vectors for non-blank title and abstract.
pub fn embedded(title: &str, abstract_text: &str) -> EmbeddedDocument {
    let vector = |text: &str| (!text.trim().is_empty()).then(|| keyword_vector(text));
    EmbeddedDocument {
        record: DocumentRecord {
            title: title.to_string(),
            abstract_text: abstract_text.to_string(),
            ..Default::default()
        },
        title_vector: vector(title),
        abstract_vector: vector(abstract_text),
    }
}

/// Record with every field filled from `tag`.
pub fn paper(tag: &str) -> DocumentRecord {
    DocumentRecord {
        title: format!("{tag} title"),
        abstract_text: format!("{tag} abstract"),
        introduction: format!("{tag} introduction"),
        methods: format!("{tag} methods"),
        results: format!("{tag} results"),
        conclusion: format!("{tag} conclusion"),
        keywords: format!("{tag} keywords"),
        limitations: format!("{tag} limitations"),
        future_work: format!("{tag} future work"),
    }
}

// ===== Language model =====

type Responder = dyn Fn(usize, &CompletionRequest) -> LlmResult<String> + Send + Sync;

/// Language model that answers from a closure and records every request.
#[derive(Clone)]
pub struct ScriptedModel {
    responder: Arc<Responder>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedModel {
    /// `responder` receives the zero-based call index and the request.
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(usize, &CompletionRequest) -> LlmResult<String> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Always returns the same text.
    pub fn constant(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_, _| Ok(text.clone()))
    }

    /// Output is a pure function of the request, like a temperature-0 model.
    pub fn deterministic() -> Self {
        Self::new(|_, request| {
            let user = request.content_of(Role::User).unwrap_or_default();
            let system = request.content_of(Role::System).unwrap_or_default();
            Ok(format!(
                "digest[{}:{}:{}]",
                system.len(),
                user.len(),
                user.lines().next().unwrap_or_default()
            ))
        })
    }

    /// Succeeds with `text` except on call `fail_at`.
    pub fn failing_at(fail_at: usize, text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |index, _| {
            if index == fail_at {
                Err(LlmError::ApiError("scripted failure".to_string()))
            } else {
                Ok(text.clone())
            }
        })
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: &CompletionRequest) -> LlmResult<String> {
        let index = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len() - 1
        };
        (self.responder)(index, request)
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

// ===== Store =====

/// Arguments of one `search` call.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchCall {
    pub query: String,
    pub columns: Vec<String>,
    pub limit: usize,
}

/// Store returning a fixed result list (in order, up to `limit`).
#[derive(Clone, Default)]
pub struct MockStore {
    results: Vec<DocumentRecord>,
    ignore_limit: bool,
    fail_search: bool,
    fail_upsert_title: Option<String>,
    searches: Arc<Mutex<Vec<SearchCall>>>,
    upserted: Arc<Mutex<Vec<EmbeddedDocument>>>,
}

impl MockStore {
    pub fn with_results(results: Vec<DocumentRecord>) -> Self {
        Self {
            results,
            ..Default::default()
        }
    }

    /// Returns every result whatever `limit` is asked for.
    pub fn ignoring_limit(results: Vec<DocumentRecord>) -> Self {
        Self {
            results,
            ignore_limit: true,
            ..Default::default()
        }
    }

    pub fn failing_search() -> Self {
        Self {
            fail_search: true,
            ..Default::default()
        }
    }

    /// Fail any upsert batch containing a title with this substring.
    pub fn failing_upsert_on(title: &str) -> Self {
        Self {
            fail_upsert_title: Some(title.to_string()),
            ..Default::default()
        }
    }

    pub fn searches(&self) -> Vec<SearchCall> {
        self.searches.lock().unwrap().clone()
    }

    pub fn upserted(&self) -> Vec<EmbeddedDocument> {
        self.upserted.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentStore for MockStore {
    async fn search(
        &self,
        query: &str,
        columns: &[&str],
        limit: usize,
    ) -> StoreResult<Vec<DocumentRecord>> {
        self.searches.lock().unwrap().push(SearchCall {
            query: query.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            limit,
        });
        if self.fail_search {
            return Err(StoreError::RequestError("mock search failure".to_string()));
        }
        if self.ignore_limit {
            return Ok(self.results.clone());
        }
        Ok(self.results.iter().take(limit).cloned().collect())
    }

    async fn upsert(&self, documents: &[EmbeddedDocument]) -> StoreResult<usize> {
        if let Some(bad) = &self.fail_upsert_title {
            if documents.iter().any(|d| d.record.title.contains(bad.as_str())) {
                return Err(StoreError::RequestError(format!("mock upsert failure on '{bad}'")));
            }
        }
        self.upserted.lock().unwrap().extend_from_slice(documents);
        Ok(documents.len())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Connector handing out clones of one [`MockStore`].
#[derive(Clone, Default)]
pub struct MockConnector {
    pub store: MockStore,
    pub refuse: bool,
}

#[async_trait]
impl StoreConnector for MockConnector {
    type Store = MockStore;

    async fn connect(&self) -> StoreResult<MockStore> {
        if self.refuse {
            return Err(StoreError::ConnectionError("mock connection refused".to_string()));
        }
        Ok(self.store.clone())
    }
}
