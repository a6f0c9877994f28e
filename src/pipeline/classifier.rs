//! Intent classification.
//!
//! One model call turns the raw query into an [`Analysis`]. The reply must
//! contain a JSON object; anything else is a hard failure. There is no
//! fallback task type and no retry.

use thiserror::Error;
use tracing::{debug, info};

use super::prompts;
use crate::llm::{CompletionRequest, LanguageModel, LlmError};
use crate::models::Analysis;

/// Errors from the intent classifier.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Language model call failed: {0}")]
    Llm(#[from] LlmError),

    /// The reply held no brace-delimited block
    #[error("No JSON object in classifier reply: {0:?}")]
    MissingJson(String),

    /// The block was not a valid analysis
    #[error("Invalid analysis JSON: {0}")]
    InvalidJson(String),
}

pub type ClassifierResult<T> = Result<T, ClassifierError>;

/// Classifies a query's needs, supplied details and task type.
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    temperature: f32,
    max_tokens: u32,
}

impl IntentClassifier {
    pub fn new(temperature: f32, max_tokens: u32) -> Self {
        Self {
            temperature,
            max_tokens,
        }
    }

    /// Ask `model` to analyze `query`.
    ///
    /// # Errors
    /// `ClassifierError::Llm` if the call fails, `MissingJson` if the reply
    /// has no JSON object, `InvalidJson` if the object is not an analysis
    pub async fn classify<L>(&self, model: &L, query: &str) -> ClassifierResult<Analysis>
    where
        L: LanguageModel + ?Sized,
    {
        let request = CompletionRequest::new(
            prompts::CLASSIFIER_SYSTEM,
            prompts::classifier_user(query),
            self.temperature,
            self.max_tokens,
        );
        let reply = model.complete(&request).await?;
        debug!(reply = %reply, "Classifier reply");

        let analysis = parse_analysis(&reply)?;
        info!(task_type = %analysis.task_type, needs = %analysis.needs, "Classified query");
        Ok(analysis)
    }
}

fn parse_analysis(reply: &str) -> ClassifierResult<Analysis> {
    let block =
        extract_json_object(reply).ok_or_else(|| ClassifierError::MissingJson(reply.to_string()))?;
    serde_json::from_str(block).map_err(|e| ClassifierError::InvalidJson(e.to_string()))
}

/// First balanced `{...}` block in `text`, skipping braces inside strings.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape = false;

    for (i, ch) in text[start..].char_indices() {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + i]);
                }
            }
            _ => {}
        }
    }
    None
}
