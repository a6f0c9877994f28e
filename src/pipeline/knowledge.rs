//! Accumulated knowledge and document formatting.
//!
//! Both the synthesizer and the generator fold model outputs into a growing
//! text buffer, one batch at a time. [`Knowledge`] is that buffer as an
//! immutable value: each step produces a new one, so a fold over batches is
//! just `batches.fold(seed, absorb)`.

use std::fmt;

use crate::models::DocumentRecord;

/// Model outputs gathered so far, newline-separated, in batch order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Knowledge(String);

impl Knowledge {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Start from fixed text, e.g. standing instructions.
    pub fn seeded(seed: impl Into<String>) -> Self {
        Self(seed.into())
    }

    /// New buffer with `output` and a trailing newline appended.
    #[must_use]
    pub fn absorb(&self, output: &str) -> Self {
        let mut text = String::with_capacity(self.0.len() + output.len() + 1);
        text.push_str(&self.0);
        text.push_str(output);
        text.push('\n');
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Knowledge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Prompt text for one document.
pub fn format_document(document: &DocumentRecord) -> String {
    format!(
        "title: {}\nabstract: {}\nconclusion: {}\nintroduction: {}\nmethodology: {}\nresult: {}\nlimitation: {}\n",
        document.title,
        document.abstract_text,
        document.conclusion,
        document.introduction,
        document.methods,
        document.results,
        document.limitations,
    )
}

/// Prompt text for a batch: every document, in order.
pub fn format_batch(batch: &[DocumentRecord]) -> String {
    batch.iter().map(format_document).collect()
}

/// Split `documents` into contiguous batches of `chunk_size` (zero acts as one).
pub fn batches(
    documents: &[DocumentRecord],
    chunk_size: usize,
) -> impl Iterator<Item = &[DocumentRecord]> {
    documents.chunks(chunk_size.max(1))
}
