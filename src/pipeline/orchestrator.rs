//! End-to-end query orchestration.
//!
//! `process` runs one query through every stage and reports which stage
//! failed; `process_or_log` is the fire-and-forget variant that logs the
//! failure and returns nothing.

use std::fmt;

use thiserror::Error;
use tracing::{error, info, instrument};

use super::classifier::{ClassifierError, IntentClassifier};
use super::generator::PaperGenerator;
use super::retriever::ContextRetriever;
use super::synthesizer::ConciseSynthesizer;
use super::GenerationError;
use crate::config::RagConfig;
use crate::llm::LanguageModel;
use crate::models::{QueryResponse, TaskType};
use crate::storage::{StoreConnector, StoreError};

/// Pipeline stage a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Session,
    Classification,
    Retrieval,
    Generation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Session => "session",
            Stage::Classification => "classification",
            Stage::Retrieval => "retrieval",
            Stage::Generation => "generation",
        };
        f.write_str(name)
    }
}

/// A failed query, tagged with the stage that failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Could not open a store session: {0}")]
    Session(#[source] StoreError),

    #[error("Query classification failed: {0}")]
    Classification(#[from] ClassifierError),

    #[error("Retrieval failed: {0}")]
    Retrieval(#[source] StoreError),

    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationError),
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Session(_) => Stage::Session,
            PipelineError::Classification(_) => Stage::Classification,
            PipelineError::Retrieval(_) => Stage::Retrieval,
            PipelineError::Generation(_) => Stage::Generation,
        }
    }
}

/// Runs queries against one store connector and one language model.
pub struct Orchestrator<C, L> {
    connector: C,
    model: L,
    classifier: IntentClassifier,
    retriever: ContextRetriever,
    synthesizer: ConciseSynthesizer,
    generator: PaperGenerator,
}

impl<C, L> Orchestrator<C, L>
where
    C: StoreConnector,
    L: LanguageModel,
{
    /// Build every stage from `config`.
    pub fn new(connector: C, model: L, config: &RagConfig) -> Self {
        let llm = &config.llm;
        let pipeline = &config.pipeline;
        Self {
            connector,
            model,
            classifier: IntentClassifier::new(llm.temperature, llm.classifier_max_tokens),
            retriever: ContextRetriever::new(pipeline.retrieval_limit),
            synthesizer: ConciseSynthesizer::from_settings(llm, pipeline),
            generator: PaperGenerator::from_settings(llm, pipeline),
        }
    }

    /// Answer `query` with a concise answer or a drafted paper.
    ///
    /// Opens a store session, classifies the query, retrieves context using
    /// the classified needs, then branches on the task type.
    ///
    /// # Errors
    /// `PipelineError` naming the stage that failed
    #[instrument(skip(self), fields(model = self.model.model_name()))]
    pub async fn process(&self, query: &str) -> Result<QueryResponse, PipelineError> {
        let store = self.connector.connect().await.map_err(PipelineError::Session)?;

        let analysis = self.classifier.classify(&self.model, query).await?;

        let documents = self
            .retriever
            .retrieve(&store, &analysis.needs)
            .await
            .map_err(PipelineError::Retrieval)?;

        let response = match analysis.task_type {
            TaskType::FullPaper => {
                info!(documents = documents.len(), "Generating a full research paper");
                let paper = self
                    .generator
                    .generate(&self.model, &analysis.needs, &analysis.details_provided, &documents)
                    .await?;
                QueryResponse::Paper(paper)
            }
            TaskType::ConciseAnswer => {
                info!(documents = documents.len(), "Generating a concise answer");
                let answer = self
                    .synthesizer
                    .synthesize(&self.model, &analysis.needs, &analysis.details_provided, &documents)
                    .await?;
                QueryResponse::Answer(answer)
            }
        };
        Ok(response)
    }

    /// Like [`process`](Self::process), but logs any failure and returns `None`.
    pub async fn process_or_log(&self, query: &str) -> Option<QueryResponse> {
        match self.process(query).await {
            Ok(response) => Some(response),
            Err(e) => {
                error!(stage = %e.stage(), error = %e, "Query failed");
                None
            }
        }
    }
}
