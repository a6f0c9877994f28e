//! Query binary entry point.
//!
//! This binary answers research questions from the indexed paper corpus. It
//! supports single-query and interactive REPL modes, text or JSON output, and
//! a retrieval-only mode that lists the papers a query would draw on.
//!
//! # Examples
//!
//! Concise answer or paper draft, decided from the query:
//! ```bash
//! ask --query "Summarize advances in battery recycling"
//! ```
//!
//! Against a local corpus, JSON output:
//! ```bash
//! ask --store local --corpus corpus.json --query "Write a full research paper on battery recycling" --format json
//! ```
//!
//! Show the retrieved papers only:
//! ```bash
//! ask --query "battery recycling" --sources
//! ```
//!
//! Interactive mode:
//! ```bash
//! ask --interactive
//! ```

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, ContentArrangement, Table};
use paper_rag::{
    config::{load_config, RagConfig},
    embedding::fastembed::FastEmbedProvider,
    input::validate_query,
    llm::mistral::MistralClient,
    models::{DocumentRecord, QueryResponse},
    pipeline::{ContextRetriever, Orchestrator},
    storage::{backend::AnyConnector, StoreConnector},
};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Output format for answers and sources
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Plain text; papers are printed section by section
    Text,
    /// Machine-readable JSON format
    Json,
}

/// Which document store to query
#[derive(Debug, Clone, Copy, ValueEnum)]
enum StoreBackend {
    /// Snowflake Cortex Search service
    Cortex,
    /// Local JSON corpus built by the ingest binary
    Local,
}

/// Query binary CLI for the paper RAG pipeline
#[derive(Parser, Debug)]
#[command(
    name = "ask",
    version,
    about = "Answer research questions or draft papers from an indexed paper corpus",
    long_about = "Classify a query, retrieve related papers, and either synthesize a concise \
                  answer or draft a seven-section research paper.

EXAMPLES:
  Single query:
    ask --query \"Summarize advances in battery recycling\"

  Local corpus with JSON output:
    ask --store local --corpus corpus.json --query \"...\" --format json

  Retrieved papers only:
    ask --query \"battery recycling\" --sources

  Interactive mode:
    ask --interactive"
)]
struct Args {
    /// Query text (required for single-query mode, omitted in interactive mode)
    #[arg(long, value_name = "TEXT", conflicts_with = "interactive")]
    query: Option<String>,

    /// Enable interactive REPL mode
    #[arg(long, short = 'i')]
    interactive: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Document store backend
    #[arg(long, value_enum, default_value = "cortex")]
    store: StoreBackend,

    /// Corpus file for the local backend (overrides the configured path)
    #[arg(long, value_name = "PATH")]
    corpus: Option<PathBuf>,

    /// List the retrieved papers instead of generating an answer
    #[arg(long)]
    sources: bool,

    /// Configuration file (TOML)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Logging verbosity level
    #[arg(long, default_value = "warn", value_name = "LEVEL")]
    log_level: String,

    /// FastEmbed model cache directory (only used with the local backend)
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,
}

/// Setup logging with the specified level
fn setup_logging(log_level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .init();
}

fn create_connector(args: &Args, config: &RagConfig) -> Result<AnyConnector> {
    match args.store {
        StoreBackend::Cortex => Ok(AnyConnector::cortex(config.store.clone())),
        StoreBackend::Local => {
            let corpus = args
                .corpus
                .clone()
                .unwrap_or_else(|| config.store.local_corpus.clone());
            if !corpus.exists() {
                anyhow::bail!(
                    "Corpus file not found: {}\n\
                     Please run the ingest binary with --store local first.",
                    corpus.display()
                );
            }
            let embedder = FastEmbedProvider::new(None, args.cache_dir.clone())
                .context("Failed to create FastEmbed provider")?;
            Ok(AnyConnector::local(corpus, embedder))
        }
    }
}

fn create_model(config: &RagConfig) -> Result<MistralClient> {
    let api_key = config.llm.api_key.clone().ok_or_else(|| {
        anyhow::anyhow!(
            "MISTRAL_API_KEY is not set.\n\
             Set it in the environment, in a .env file, or as llm.api_key in the config file."
        )
    })?;
    let client = MistralClient::new(api_key, Some(config.llm.model.clone()))
        .context("Failed to create Mistral client")?
        .with_base_url(config.llm.base_url.clone());
    Ok(client)
}

/// Truncate to at most `max` characters, marking the cut
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

/// Retrieve the papers for `query` without calling the language model
async fn list_sources(
    connector: &AnyConnector,
    config: &RagConfig,
    query: &str,
) -> Result<Vec<DocumentRecord>> {
    let store = connector.connect().await.context("Failed to open store session")?;
    ContextRetriever::new(config.pipeline.retrieval_limit)
        .retrieve(&store, query)
        .await
        .context("Retrieval failed")
}

/// Format a response for display
fn format_response(response: &QueryResponse, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(response).context("Failed to serialize response to JSON")
        }
        OutputFormat::Text => Ok(match response {
            QueryResponse::Answer(text) => text.clone(),
            QueryResponse::Paper(paper) => paper
                .sections()
                .map(|(section, text)| format!("## {section}\n\n{}\n", text.trim()))
                .collect::<Vec<_>>()
                .join("\n"),
        }),
    }
}

/// Format retrieved papers as a table or JSON
fn format_sources(documents: &[DocumentRecord], format: OutputFormat) -> Result<String> {
    if let OutputFormat::Json = format {
        return serde_json::to_string_pretty(documents)
            .context("Failed to serialize sources to JSON");
    }
    if documents.is_empty() {
        return Ok("No papers found.".to_string());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Rank").add_attribute(Attribute::Bold),
        Cell::new("Title").add_attribute(Attribute::Bold),
        Cell::new("Keywords").add_attribute(Attribute::Bold),
        Cell::new("Abstract").add_attribute(Attribute::Bold),
    ]);

    for (idx, document) in documents.iter().enumerate() {
        table.add_row(vec![
            Cell::new(idx + 1),
            Cell::new(truncate(&document.title, 60)),
            Cell::new(truncate(&document.keywords, 30)),
            Cell::new(truncate(&document.abstract_text, 80)),
        ]);
    }

    Ok(table.to_string())
}

fn print_help() {
    println!("Commands:");
    println!("  <query>          - Answer the query or draft a paper");
    println!("  /sources         - Toggle listing retrieved papers instead of answering");
    println!("  /format text     - Use text output format");
    println!("  /format json     - Use JSON output format");
    println!("  /help            - Show this help");
    println!("  Ctrl+D or Ctrl+C - Exit");
}

/// Run interactive REPL mode
///
/// The language model client is created on the first non-sources query, so
/// browsing sources works without an API key.
async fn run_interactive(
    connector: AnyConnector,
    config: RagConfig,
    mut format: OutputFormat,
    mut sources_only: bool,
) -> Result<()> {
    let max_words = config.pipeline.max_query_words;
    let mut orchestrator: Option<Orchestrator<AnyConnector, MistralClient>> = None;

    println!("Interactive Paper Assistant");
    print_help();
    println!();

    let mut rl = DefaultEditor::new().context("Failed to create readline editor")?;

    loop {
        match rl.readline("Ask> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                rl.add_history_entry(line).ok();

                if line.starts_with('/') {
                    let parts: Vec<&str> = line.split_whitespace().collect();
                    match parts[0] {
                        "/help" => print_help(),
                        "/sources" => {
                            sources_only = !sources_only;
                            println!(
                                "Sources mode {}",
                                if sources_only { "on" } else { "off" }
                            );
                        }
                        "/format" => match parts.get(1).copied() {
                            Some("text") => {
                                format = OutputFormat::Text;
                                println!("Set output format to text");
                            }
                            Some("json") => {
                                format = OutputFormat::Json;
                                println!("Set output format to JSON");
                            }
                            _ => eprintln!("Usage: /format [text|json]"),
                        },
                        other => {
                            eprintln!("Unknown command: {other}. Type /help for available commands.")
                        }
                    }
                    continue;
                }

                if let Err(e) = validate_query(line, max_words) {
                    eprintln!("{e}");
                    continue;
                }

                let start = Instant::now();
                let output = if sources_only {
                    list_sources(&connector, &config, line)
                        .await
                        .and_then(|documents| format_sources(&documents, format))
                } else {
                    if orchestrator.is_none() {
                        match create_model(&config) {
                            Ok(model) => {
                                orchestrator =
                                    Some(Orchestrator::new(connector.clone(), model, &config))
                            }
                            Err(e) => {
                                eprintln!("{e:#}");
                                continue;
                            }
                        }
                    }
                    let Some(orchestrator) = orchestrator.as_ref() else {
                        continue;
                    };
                    // failures are logged with their stage
                    let Some(response) = orchestrator.process_or_log(line).await else {
                        continue;
                    };
                    info!(task = %response.task_type(), "Query answered");
                    format_response(&response, format)
                };

                match output {
                    Ok(text) => {
                        println!("{text}");
                        if let OutputFormat::Text = format {
                            println!("\nDone in {:.2}s", start.elapsed().as_secs_f64());
                        }
                    }
                    Err(e) => eprintln!("Query failed: {e:#}"),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                error!("Error reading input: {}", err);
                break;
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    setup_logging(&args.log_level);

    if !args.interactive && args.query.is_none() {
        anyhow::bail!(
            "Either --query or --interactive must be specified.\n\
             Use --help for usage information."
        );
    }

    let config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    let connector = create_connector(&args, &config)?;
    info!(store = connector.name(), "Using document store");

    let max_words = config.pipeline.max_query_words;

    if let Some(query) = args.query.as_deref() {
        let query = validate_query(query, max_words)?;
        let start = Instant::now();

        if args.sources {
            let documents = list_sources(&connector, &config, query).await?;
            println!("{}", format_sources(&documents, args.format)?);
        } else {
            let orchestrator = Orchestrator::new(connector, create_model(&config)?, &config);
            let response = orchestrator.process(query).await?;
            info!(task = %response.task_type(), "Query answered");
            println!("{}", format_response(&response, args.format)?);
        }

        if let OutputFormat::Text = args.format {
            eprintln!("\nDone in {:.2}s", start.elapsed().as_secs_f64());
        }
        return Ok(());
    }

    run_interactive(connector, config, args.format, args.sources).await
}
