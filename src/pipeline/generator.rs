//! Research paper drafting.
//!
//! Two phases. Notes are accumulated over the retrieved papers the same way
//! the concise synthesizer reads them, starting from the golden rules. Then
//! each of the seven sections is written from the full notes in its own call.

use futures::future::try_join_all;
use tracing::{debug, info};

use super::knowledge::{batches, format_batch, Knowledge};
use super::{prompts, GenerationError, GenerationResult};
use crate::config::{LlmSettings, PipelineSettings};
use crate::llm::{CompletionRequest, LanguageModel};
use crate::models::{DocumentRecord, PaperContent, PaperSection};

/// Notes-then-sections paper generator.
#[derive(Debug, Clone)]
pub struct PaperGenerator {
    chunk_size: usize,
    temperature: f32,
    chunk_max_tokens: u32,
    section_max_tokens: u32,
    parallel_sections: bool,
}

impl PaperGenerator {
    pub fn new(chunk_size: usize, temperature: f32, chunk_max_tokens: u32, section_max_tokens: u32) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            temperature,
            chunk_max_tokens,
            section_max_tokens,
            parallel_sections: false,
        }
    }

    pub fn from_settings(llm: &LlmSettings, pipeline: &PipelineSettings) -> Self {
        Self::new(
            pipeline.paper_chunk_size,
            llm.temperature,
            llm.chunk_max_tokens,
            llm.section_max_tokens,
        )
        .with_parallel_sections(pipeline.parallel_sections)
    }

    /// Issue the seven section calls concurrently instead of one by one.
    pub fn with_parallel_sections(mut self, parallel: bool) -> Self {
        self.parallel_sections = parallel;
        self
    }

    /// Fold every batch into notes seeded with the golden rules.
    ///
    /// # Errors
    /// `GenerationError::Batch` for the first failing batch
    pub async fn accumulate_notes<L>(
        &self,
        model: &L,
        needs: &str,
        details: &str,
        documents: &[DocumentRecord],
    ) -> GenerationResult<Knowledge>
    where
        L: LanguageModel + ?Sized,
    {
        let mut notes = Knowledge::seeded(prompts::GOLDEN_RULES);
        for (index, batch) in batches(documents, self.chunk_size).enumerate() {
            let papers = format_batch(batch);
            let request = if index == 0 {
                CompletionRequest::new(
                    prompts::NOTES_FIRST_SYSTEM,
                    prompts::notes_first_user(needs, details, &papers),
                    self.temperature,
                    self.chunk_max_tokens,
                )
            } else {
                CompletionRequest::new(
                    prompts::notes_next_system(notes.as_str()),
                    prompts::additional_papers_user(&papers),
                    self.temperature,
                    self.chunk_max_tokens,
                )
            };

            debug!(batch = index, prompt_chars = request.prompt_chars(), "Taking notes");
            let output = model
                .complete(&request)
                .await
                .map_err(|source| GenerationError::Batch { batch: index, source })?;
            notes = notes.absorb(&output);
        }
        Ok(notes)
    }

    /// Write one section from the accumulated notes.
    ///
    /// # Errors
    /// `GenerationError::Section` if the model call fails
    pub async fn generate_section<L>(
        &self,
        model: &L,
        notes: &Knowledge,
        section: PaperSection,
        details: &str,
    ) -> GenerationResult<(PaperSection, String)>
    where
        L: LanguageModel + ?Sized,
    {
        let request = CompletionRequest::new(
            prompts::SECTION_SYSTEM,
            prompts::section_user(notes.as_str(), section, details),
            self.temperature,
            self.section_max_tokens,
        );
        let text = model
            .complete(&request)
            .await
            .map_err(|source| GenerationError::Section { section, source })?;
        debug!(section = %section, chars = text.len(), "Generated section");
        Ok((section, text))
    }

    /// Draft the whole paper. Any failed section fails the draft.
    ///
    /// # Errors
    /// `GenerationError::Batch` or `GenerationError::Section`
    pub async fn generate<L>(
        &self,
        model: &L,
        needs: &str,
        details: &str,
        documents: &[DocumentRecord],
    ) -> GenerationResult<PaperContent>
    where
        L: LanguageModel + ?Sized,
    {
        let notes = self.accumulate_notes(model, needs, details, documents).await?;

        let sections = if self.parallel_sections {
            try_join_all(
                PaperSection::ALL
                    .into_iter()
                    .map(|section| self.generate_section(model, &notes, section, details)),
            )
            .await?
        } else {
            let mut sections = Vec::with_capacity(PaperSection::ALL.len());
            for section in PaperSection::ALL {
                sections.push(self.generate_section(model, &notes, section, details).await?);
            }
            sections
        };

        info!(documents = documents.len(), sections = sections.len(), "Generated paper");
        Ok(PaperContent::from_sections(sections))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;
    use crate::testing::{paper, ScriptedModel};

    fn generator() -> PaperGenerator {
        PaperGenerator::new(1, 0.3, 500, 1000)
    }

    fn section_of(request: &CompletionRequest) -> Option<PaperSection> {
        let user = request.content_of(Role::User)?;
        PaperSection::ALL
            .into_iter()
            .find(|s| user.contains(&format!("Write the {s} of")))
    }

    #[tokio::test]
    async fn test_seven_sections_in_canonical_order() {
        let model = ScriptedModel::new(|_, request| {
            Ok(section_of(request).map_or("notes".to_string(), |s| format!("body of {s}")))
        });
        let docs: Vec<_> = ["a", "b", "c", "d", "e"].iter().map(|t| paper(t)).collect();

        let content = generator().generate(&model, "paper", "LFP", &docs).await.unwrap();

        assert_eq!(
            content.section_titles(),
            vec![
                "Title & Abstract",
                "Introduction",
                "Literature Review",
                "Methods",
                "Results",
                "Discussion",
                "Conclusion"
            ]
        );
        assert_eq!(content.get(PaperSection::Discussion), Some("body of Discussion"));
        // five note batches plus seven sections
        assert_eq!(model.calls(), 12);
    }

    #[tokio::test]
    async fn test_every_document_reaches_the_model() {
        let model = ScriptedModel::constant("noted");
        let docs = vec![paper("first"), paper("middle"), paper("last")];

        generator().accumulate_notes(&model, "n", "d", &docs).await.unwrap();

        let requests = model.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[2].content_of(Role::User).unwrap().contains("last title"));
    }

    #[tokio::test]
    async fn test_notes_start_from_golden_rules() {
        let model = ScriptedModel::new(|i, _| Ok(format!("note{i}")));
        let notes = generator()
            .accumulate_notes(&model, "n", "d", &[paper("a"), paper("b")])
            .await
            .unwrap();

        assert!(notes.as_str().starts_with("Golden rules:\n1) "));
        assert!(notes.as_str().ends_with("note0\nnote1\n"));

        let second_system = model.requests()[1].content_of(Role::System).unwrap().to_string();
        assert!(second_system.contains("Golden rules:"));
        assert!(second_system.contains("note0"));
    }

    #[tokio::test]
    async fn test_section_prompts_carry_notes_and_details() {
        let model = ScriptedModel::constant("text");
        generator().generate(&model, "n", "solid-state cells", &[]).await.unwrap();

        let requests = model.requests();
        assert_eq!(requests.len(), 7);
        for request in &requests {
            assert_eq!(request.max_tokens, 1000);
            let user = request.content_of(Role::User).unwrap();
            assert!(user.contains("Golden rules:"));
            assert!(user.contains("details: solid-state cells"));
        }
    }

    #[tokio::test]
    async fn test_parallel_sections_keep_order() {
        let model = ScriptedModel::new(|_, request| {
            Ok(section_of(request).map_or("notes".to_string(), |s| s.title().to_lowercase()))
        });

        let content = generator()
            .with_parallel_sections(true)
            .generate(&model, "n", "d", &[paper("a")])
            .await
            .unwrap();

        let texts: Vec<_> = content.sections().map(|(_, t)| t.to_string()).collect();
        assert_eq!(texts[0], "title & abstract");
        assert_eq!(texts[6], "conclusion");
    }

    #[tokio::test]
    async fn test_section_failure_fails_generation() {
        // call 0 is the single note batch, call 3 is the third section
        let model = ScriptedModel::failing_at(3, "ok");
        let err = generator().generate(&model, "n", "d", &[paper("a")]).await.unwrap_err();
        assert!(matches!(
            err,
            GenerationError::Section {
                section: PaperSection::LiteratureReview,
                ..
            }
        ));
    }
}
