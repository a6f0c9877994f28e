//! Query pipeline.
//!
//! A query flows classifier → retriever → (synthesizer | generator). Every
//! stage is a small struct holding only its settings; models and stores are
//! passed in per call, so nothing outlives one query.

pub mod classifier;
pub mod generator;
pub mod knowledge;
pub mod orchestrator;
pub mod prompts;
pub mod retriever;
pub mod synthesizer;

use thiserror::Error;

use crate::llm::LlmError;
use crate::models::PaperSection;

pub use classifier::{ClassifierError, IntentClassifier};
pub use generator::PaperGenerator;
pub use knowledge::Knowledge;
pub use orchestrator::{Orchestrator, PipelineError, Stage};
pub use retriever::ContextRetriever;
pub use synthesizer::ConciseSynthesizer;

/// Errors from answer synthesis and paper generation.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// An accumulation call over one batch of papers failed
    #[error("Reading batch {batch} failed: {source}")]
    Batch {
        batch: usize,
        #[source]
        source: LlmError,
    },

    #[error("Final synthesis failed: {0}")]
    Synthesis(#[source] LlmError),

    #[error("Generating section '{section}' failed: {source}")]
    Section {
        section: PaperSection,
        #[source]
        source: LlmError,
    },
}

pub type GenerationResult<T> = Result<T, GenerationError>;
