//! Reader for the extractor's JSON output.
//!
//! The file is one JSON object keyed by source filename. Each value maps
//! section names to text:
//!
//! ```json
//! {
//!   "2401.01234.pdf": {
//!     "title": "Direct recycling of LFP cathodes",
//!     "abstract": "...",
//!     "methodology": "...",
//!     "results": "..."
//!   }
//! }
//! ```
//!
//! `methodology` and `methods` both fill the methods field; unknown keys are
//! ignored. Entries come back sorted by filename.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{PaperSource, ProviderError, ProviderResult};
use crate::models::DocumentRecord;

/// Paper source backed by an extracted-papers JSON file.
#[derive(Debug, Clone)]
pub struct ExtractedJsonProvider {
    name: String,
    documents: Vec<DocumentRecord>,
}

impl ExtractedJsonProvider {
    /// Read and parse the file at `path`.
    ///
    /// # Errors
    /// Returns `ProviderError::IoError` if the file cannot be read and
    /// `ProviderError::ParseError` if it is not an object of section maps
    pub async fn from_file(path: impl AsRef<Path>) -> ProviderResult<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path).await?;
        let documents = parse_extracted(&contents)?;
        debug!(path = %path.display(), documents = documents.len(), "Loaded extracted papers");
        Ok(Self {
            name: format!("json:{}", path.display()),
            documents,
        })
    }

    /// Parse already-loaded JSON text.
    pub fn from_json(name: impl Into<String>, contents: &str) -> ProviderResult<Self> {
        Ok(Self {
            name: name.into(),
            documents: parse_extracted(contents)?,
        })
    }
}

#[async_trait]
impl PaperSource for ExtractedJsonProvider {
    async fn fetch_documents(&self) -> ProviderResult<Vec<DocumentRecord>> {
        Ok(self.documents.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn parse_extracted(contents: &str) -> ProviderResult<Vec<DocumentRecord>> {
    let root: Value = serde_json::from_str(contents)
        .map_err(|e| ProviderError::ParseError(format!("Invalid JSON: {e}")))?;
    let files = root.as_object().ok_or_else(|| {
        ProviderError::ParseError("Expected an object keyed by filename".to_string())
    })?;

    files
        .iter()
        .map(|(filename, sections)| {
            let sections = sections.as_object().ok_or_else(|| {
                ProviderError::ParseError(format!("Entry '{filename}' is not an object"))
            })?;
            Ok(to_record(filename, sections))
        })
        .collect()
}

fn to_record(filename: &str, sections: &Map<String, Value>) -> DocumentRecord {
    let text = |key: &str| -> String {
        match sections.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => {
                warn!(file = %filename, key, "Non-string section value, keeping its JSON text");
                other.to_string()
            }
        }
    };

    let mut methods = text("methodology");
    if methods.trim().is_empty() {
        methods = text("methods");
    }

    let mut title = text("title");
    if title.trim().is_empty() {
        title = file_stem(filename);
    }

    DocumentRecord {
        title,
        abstract_text: text("abstract"),
        introduction: text("introduction"),
        methods,
        results: text("results"),
        conclusion: text("conclusion"),
        keywords: text("keywords"),
        limitations: text("limitations"),
        future_work: text("future_work"),
    }
}

fn file_stem(filename: &str) -> String {
    PathBuf::from(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string())
}
