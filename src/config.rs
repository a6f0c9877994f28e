//! Configuration for the pipeline, the language model and the document store.
//!
//! Uses `figment` for layered configuration. Priority, highest first:
//!
//! 1. Well-known environment variables (`MISTRAL_API_KEY`, `SNOWFLAKE_TOKEN`,
//!    `SNOWFLAKE_ACCOUNT_URL`, `DB`, `SCHEMA`, `SERVICE`)
//! 2. Prefixed environment variables (`PAPER_RAG_LLM__MODEL`, ...)
//! 3. An explicit TOML file
//! 4. `~/.config/paper-rag/config.toml`
//! 5. Built-in defaults
//!
//! Binaries load `.env` with `dotenvy` before calling [`load_config`].

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::input::DEFAULT_MAX_QUERY_WORDS;
use crate::llm::mistral;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub llm: LlmSettings,
    pub store: StoreSettings,
    pub pipeline: PipelineSettings,
}

/// Language model connection and per-call budgets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    /// Output budget for the intent classifier
    pub classifier_max_tokens: u32,
    /// Output budget for each chunk-accumulation step
    pub chunk_max_tokens: u32,
    /// Output budget for the final concise answer
    pub answer_max_tokens: u32,
    /// Output budget for each paper section
    pub section_max_tokens: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: mistral::DEFAULT_BASE_URL.to_string(),
            model: mistral::DEFAULT_MODEL.to_string(),
            temperature: 0.3,
            classifier_max_tokens: 500,
            chunk_max_tokens: 500,
            answer_max_tokens: 1000,
            section_max_tokens: 1000,
        }
    }
}

/// Document store location and credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// e.g. `https://<account>.snowflakecomputing.com`
    pub account_url: String,
    pub token: Option<String>,
    pub token_type: String,
    pub database: String,
    pub schema: String,
    /// Cortex Search service name
    pub service: String,
    pub warehouse: String,
    /// Table that ingestion inserts into
    pub table: String,
    /// Corpus file for the local backend
    pub local_corpus: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            account_url: String::new(),
            token: None,
            token_type: "PROGRAMMATIC_ACCESS_TOKEN".to_string(),
            database: "RAG_SYSTEM".to_string(),
            schema: "PUBLIC".to_string(),
            service: String::new(),
            warehouse: "COMPUTE_WH".to_string(),
            table: "detailed_research_papers".to_string(),
            local_corpus: PathBuf::from("corpus.json"),
        }
    }
}

/// Knobs for the query pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Number of documents retrieved per query
    pub retrieval_limit: usize,
    /// Documents per accumulation step for concise answers
    pub answer_chunk_size: usize,
    /// Documents per accumulation step for paper notes
    pub paper_chunk_size: usize,
    pub max_query_words: usize,
    /// Generate paper sections concurrently
    pub parallel_sections: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            retrieval_limit: 5,
            answer_chunk_size: 2,
            paper_chunk_size: 1,
            max_query_words: DEFAULT_MAX_QUERY_WORDS,
            parallel_sections: false,
        }
    }
}

/// Path of the user-level config file, if a config directory exists.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("paper-rag").join("config.toml"))
}

/// Load configuration from layered sources.
///
/// # Errors
/// Returns the figment error if a source is malformed or a value has the
/// wrong type
pub fn load_config(explicit: Option<&Path>) -> Result<RagConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(RagConfig::default()));

    if let Some(user_config) = user_config_path().filter(|p| p.exists()) {
        figment = figment.merge(Toml::file(user_config));
    }

    if let Some(path) = explicit {
        figment = figment.merge(Toml::file(path));
    }

    figment = figment
        .merge(Env::prefixed("PAPER_RAG_").split("__"))
        .merge(well_known_env());

    figment.extract().map_err(Box::new)
}

/// Environment variable names used by existing deployments.
fn well_known_env() -> Env {
    Env::raw()
        .only(&[
            "MISTRAL_API_KEY",
            "SNOWFLAKE_ACCOUNT_URL",
            "SNOWFLAKE_TOKEN",
            "DB",
            "SCHEMA",
            "SERVICE",
        ])
        .map(|key| {
            let target = match key.as_str().to_ascii_uppercase().as_str() {
                "MISTRAL_API_KEY" => "llm.api_key",
                "SNOWFLAKE_ACCOUNT_URL" => "store.account_url",
                "SNOWFLAKE_TOKEN" => "store.token",
                "DB" => "store.database",
                "SCHEMA" => "store.schema",
                _ => "store.service",
            };
            target.into()
        })
}
