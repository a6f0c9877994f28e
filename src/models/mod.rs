//! Core data models for the paper RAG pipeline.
//!
//! This module contains the data structures passed between pipeline stages:
//! document records returned by the store, the classifier's analysis of a
//! query, and the two response shapes (concise answer or drafted paper).

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Column names requested from the store for every search, in record order.
pub const SEARCH_COLUMNS: [&str; 9] = [
    "title",
    "abstract",
    "introduction",
    "methods",
    "results",
    "conclusion",
    "keywords",
    "limitations",
    "future_work",
];

/// Deserialize a string field, mapping `null` to the empty string.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// One ingested paper as a flat record of named text fields.
///
/// Records are owned by the external store; the pipeline only reads copies
/// returned by search. Every field is always present: missing or `null`
/// values from the store become empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Paper title
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,

    /// Abstract text
    #[serde(rename = "abstract", default, deserialize_with = "null_as_empty")]
    pub abstract_text: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub introduction: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub methods: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub results: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub conclusion: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub keywords: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub limitations: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub future_work: String,
}

impl DocumentRecord {
    /// Look up a field by its column name.
    pub fn field(&self, column: &str) -> Option<&str> {
        let value = match column {
            "title" => &self.title,
            "abstract" => &self.abstract_text,
            "introduction" => &self.introduction,
            "methods" => &self.methods,
            "results" => &self.results,
            "conclusion" => &self.conclusion,
            "keywords" => &self.keywords,
            "limitations" => &self.limitations,
            "future_work" => &self.future_work,
            _ => return None,
        };
        Some(value.as_str())
    }

    /// Copy of this record keeping only the named columns; the rest are blanked.
    pub fn project(&self, columns: &[&str]) -> Self {
        let keep = |column: &str| {
            columns
                .contains(&column)
                .then(|| self.field(column))
                .flatten()
                .unwrap_or_default()
                .to_string()
        };
        Self {
            title: keep("title"),
            abstract_text: keep("abstract"),
            introduction: keep("introduction"),
            methods: keep("methods"),
            results: keep("results"),
            conclusion: keep("conclusion"),
            keywords: keep("keywords"),
            limitations: keep("limitations"),
            future_work: keep("future_work"),
        }
    }
}

/// A document record together with the vectors the store indexes it by.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedDocument {
    #[serde(flatten)]
    pub record: DocumentRecord,

    /// Embedding of the title, `None` when the title is blank
    #[serde(default)]
    pub title_vector: Option<Vec<f32>>,

    /// Embedding of the abstract, `None` when the abstract is blank
    #[serde(default)]
    pub abstract_vector: Option<Vec<f32>>,
}

/// What kind of output the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Draft a complete research paper, section by section
    FullPaper,
    /// Produce a single synthesized answer
    ConciseAnswer,
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskType::FullPaper => f.write_str("full_paper"),
            TaskType::ConciseAnswer => f.write_str("concise_answer"),
        }
    }
}

/// Structured judgment about a raw query, produced by the intent classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    /// What the user is requesting
    pub needs: String,

    /// Context the user supplied explicitly
    pub details_provided: String,

    pub task_type: TaskType,
}

/// The fixed sections of a generated paper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PaperSection {
    TitleAndAbstract,
    Introduction,
    LiteratureReview,
    Methods,
    Results,
    Discussion,
    Conclusion,
}

impl PaperSection {
    /// Every section in canonical paper order.
    pub const ALL: [PaperSection; 7] = [
        PaperSection::TitleAndAbstract,
        PaperSection::Introduction,
        PaperSection::LiteratureReview,
        PaperSection::Methods,
        PaperSection::Results,
        PaperSection::Discussion,
        PaperSection::Conclusion,
    ];

    /// Heading used in prompts and as the output key.
    pub fn title(self) -> &'static str {
        match self {
            PaperSection::TitleAndAbstract => "Title & Abstract",
            PaperSection::Introduction => "Introduction",
            PaperSection::LiteratureReview => "Literature Review",
            PaperSection::Methods => "Methods",
            PaperSection::Results => "Results",
            PaperSection::Discussion => "Discussion",
            PaperSection::Conclusion => "Conclusion",
        }
    }
}

impl fmt::Display for PaperSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Generated paper text, one entry per section in canonical order.
///
/// Serializes as a JSON object keyed by section title, preserving order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaperContent {
    sections: Vec<(PaperSection, String)>,
}

impl PaperContent {
    /// Build from generated sections, sorting them into canonical order.
    pub fn from_sections(mut sections: Vec<(PaperSection, String)>) -> Self {
        sections.sort_by_key(|(section, _)| *section);
        Self { sections }
    }

    /// Text of one section, if it was generated.
    pub fn get(&self, section: PaperSection) -> Option<&str> {
        self.sections
            .iter()
            .find(|(s, _)| *s == section)
            .map(|(_, text)| text.as_str())
    }

    pub fn sections(&self) -> impl Iterator<Item = (PaperSection, &str)> {
        self.sections.iter().map(|(s, text)| (*s, text.as_str()))
    }

    pub fn section_titles(&self) -> Vec<&'static str> {
        self.sections.iter().map(|(s, _)| s.title()).collect()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

impl Serialize for PaperContent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.sections.len()))?;
        for (section, text) in &self.sections {
            map.serialize_entry(section.title(), text)?;
        }
        map.end()
    }
}

/// Final output of one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "content", rename_all = "snake_case")]
pub enum QueryResponse {
    /// Concise synthesized answer
    Answer(String),
    /// Drafted research paper
    Paper(PaperContent),
}

impl QueryResponse {
    pub fn task_type(&self) -> TaskType {
        match self {
            QueryResponse::Answer(_) => TaskType::ConciseAnswer,
            QueryResponse::Paper(_) => TaskType::FullPaper,
        }
    }
}
