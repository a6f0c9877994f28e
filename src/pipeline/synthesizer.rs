//! Concise answer synthesis.
//!
//! Retrieved papers rarely fit in one prompt, so they are read in small
//! batches. Each batch's reply is folded into a [`Knowledge`] buffer, and a
//! final call turns the whole buffer into the answer.

use tracing::{debug, info};

use super::knowledge::{batches, format_batch, Knowledge};
use super::{prompts, GenerationError, GenerationResult};
use crate::config::{LlmSettings, PipelineSettings};
use crate::llm::{CompletionRequest, LanguageModel};
use crate::models::DocumentRecord;

/// Chunked read-then-answer synthesizer.
#[derive(Debug, Clone)]
pub struct ConciseSynthesizer {
    chunk_size: usize,
    temperature: f32,
    chunk_max_tokens: u32,
    answer_max_tokens: u32,
}

impl ConciseSynthesizer {
    /// # Arguments
    /// * `chunk_size` - Documents per accumulation call (zero acts as one)
    pub fn new(chunk_size: usize, temperature: f32, chunk_max_tokens: u32, answer_max_tokens: u32) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            temperature,
            chunk_max_tokens,
            answer_max_tokens,
        }
    }

    pub fn from_settings(llm: &LlmSettings, pipeline: &PipelineSettings) -> Self {
        Self::new(
            pipeline.answer_chunk_size,
            llm.temperature,
            llm.chunk_max_tokens,
            llm.answer_max_tokens,
        )
    }

    /// Read one batch and fold the reply into `knowledge`.
    ///
    /// Batch 0 carries the query; later batches carry only what has been
    /// learned so far.
    ///
    /// # Errors
    /// `GenerationError::Batch` if the model call fails
    pub async fn step<L>(
        &self,
        model: &L,
        knowledge: &Knowledge,
        index: usize,
        batch: &[DocumentRecord],
        needs: &str,
        details: &str,
    ) -> GenerationResult<Knowledge>
    where
        L: LanguageModel + ?Sized,
    {
        let papers = format_batch(batch);
        let request = if index == 0 {
            CompletionRequest::new(
                prompts::ANSWER_FIRST_SYSTEM,
                prompts::answer_first_user(needs, details, &papers),
                self.temperature,
                self.chunk_max_tokens,
            )
        } else {
            CompletionRequest::new(
                prompts::answer_next_system(knowledge.as_str()),
                prompts::additional_papers_user(&papers),
                self.temperature,
                self.chunk_max_tokens,
            )
        };

        debug!(batch = index, documents = batch.len(), prompt_chars = request.prompt_chars(), "Reading batch");
        let output = model
            .complete(&request)
            .await
            .map_err(|source| GenerationError::Batch { batch: index, source })?;
        Ok(knowledge.absorb(&output))
    }

    /// Fold every batch of `documents` into a knowledge buffer.
    ///
    /// # Errors
    /// `GenerationError::Batch` for the first failing batch
    pub async fn accumulate<L>(
        &self,
        model: &L,
        needs: &str,
        details: &str,
        documents: &[DocumentRecord],
    ) -> GenerationResult<Knowledge>
    where
        L: LanguageModel + ?Sized,
    {
        let mut knowledge = Knowledge::empty();
        for (index, batch) in batches(documents, self.chunk_size).enumerate() {
            knowledge = self.step(model, &knowledge, index, batch, needs, details).await?;
        }
        Ok(knowledge)
    }

    /// Produce the final answer.
    ///
    /// The synthesis call is made even when `documents` is empty, with an
    /// empty knowledge buffer.
    ///
    /// # Errors
    /// `GenerationError::Batch` or `GenerationError::Synthesis`
    pub async fn synthesize<L>(
        &self,
        model: &L,
        needs: &str,
        details: &str,
        documents: &[DocumentRecord],
    ) -> GenerationResult<String>
    where
        L: LanguageModel + ?Sized,
    {
        let knowledge = self.accumulate(model, needs, details, documents).await?;

        let request = CompletionRequest::new(
            prompts::ANSWER_FINAL_SYSTEM,
            prompts::answer_final_user(needs, details, knowledge.as_str()),
            self.temperature,
            self.answer_max_tokens,
        );
        let answer = model
            .complete(&request)
            .await
            .map_err(GenerationError::Synthesis)?;

        info!(documents = documents.len(), knowledge_chars = knowledge.as_str().len(), "Synthesized answer");
        Ok(answer)
    }
}
