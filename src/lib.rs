//! Paper RAG - retrieval-augmented answering over a corpus of research papers.
//!
//! This library answers free-text research queries from an indexed corpus of
//! papers, either with a concise synthesized answer or with a drafted
//! seven-section research paper.
//!
//! # Architecture
//!
//! - **models**: Core data structures (DocumentRecord, Analysis, PaperContent, etc.)
//! - **config**: Layered configuration (defaults, TOML, environment)
//! - **input**: Query validation at the user-facing boundary
//! - **llm**: Language model trait and the Mistral client
//! - **embedding**: Text embedding generation and normalization
//! - **storage**: Document stores (Snowflake Cortex Search, local JSON file)
//! - **provider**: Sources of extracted paper text
//! - **ingestion**: Offline ingestion pipeline
//! - **pipeline**: Classifier, retriever, synthesizer, generator, orchestrator
//!
//! # Workflow
//!
//! ## Offline Ingestion
//!
//! 1. Load extracted paper sections from a JSON file
//! 2. Drop repeated titles
//! 3. Embed titles and abstracts
//! 4. Write records and vectors to the store
//!
//! ## Online Query
//!
//! 1. Classify the query into needs, details and task type
//! 2. Retrieve the top-K papers for the needs
//! 3. Read the papers in batches, accumulating knowledge
//! 4. Synthesize one answer, or write each paper section
//!
//! # Example
//!
//! ```ignore
//! use paper_rag::{
//!     config::load_config,
//!     llm::mistral::MistralClient,
//!     pipeline::Orchestrator,
//!     storage::cortex::CortexConnector,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config(None)?;
//!     let model = MistralClient::new(api_key, None)?;
//!     let connector = CortexConnector::new(config.store.clone());
//!     let orchestrator = Orchestrator::new(connector, model, &config);
//!
//!     match orchestrator.process("Summarize advances in battery recycling").await? {
//!         QueryResponse::Answer(text) => println!("{text}"),
//!         QueryResponse::Paper(paper) => {
//!             for (section, text) in paper.sections() {
//!                 println!("## {section}\n\n{text}\n");
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//! ```

// Public modules
pub mod config;
pub mod embedding;
pub mod ingestion;
pub mod input;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod provider;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types at the crate root
pub use config::{load_config, RagConfig};
pub use embedding::EmbeddingProvider;
pub use llm::LanguageModel;
pub use models::{Analysis, DocumentRecord, PaperContent, PaperSection, QueryResponse, TaskType};
pub use pipeline::{Orchestrator, PipelineError};
pub use storage::{DocumentStore, StoreConnector};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
