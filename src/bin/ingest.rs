//! Ingestion binary entry point.
//!
//! This binary reads the extractor's JSON output, embeds paper titles and
//! abstracts, and writes the records to a document store.
//!
//! # Examples
//!
//! Insert into the Snowflake papers table:
//! ```bash
//! ingest --input extracted_papers.json
//! ```
//!
//! Build a local corpus:
//! ```bash
//! ingest --input extracted_papers.json --store local --corpus corpus.json
//! ```

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use paper_rag::{
    config::load_config,
    embedding::{fastembed::FastEmbedProvider, EmbeddingProvider},
    ingestion::{IngestionPipeline, DEFAULT_BATCH_SIZE},
    provider::{json::ExtractedJsonProvider, PaperSource},
    storage::{backend::AnyConnector, StoreConnector},
};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Which document store to write to
#[derive(Debug, Clone, Copy, ValueEnum)]
enum StoreBackend {
    /// Snowflake table behind the Cortex Search service
    Cortex,
    /// Local JSON corpus file
    Local,
}

/// Ingestion CLI for loading extracted papers into a document store
#[derive(Parser, Debug)]
#[command(
    name = "ingest",
    version,
    about = "Embed extracted papers and load them into the document store",
    long_about = "Read extracted paper sections from JSON, embed titles and abstracts, and \
                  write the records to Snowflake or a local corpus file.

EXAMPLES:
  Snowflake (credentials from .env or the environment):
    ingest --input extracted_papers.json

  Local corpus:
    ingest --input extracted_papers.json --store local --corpus corpus.json

  Trial run on the first 10 papers with debug logging:
    ingest --input extracted_papers.json --limit 10 --log-level debug"
)]
struct IngestArgs {
    /// Extracted papers JSON file
    #[arg(short, long, value_name = "FILE", default_value = "extracted_papers.json")]
    input: PathBuf,

    /// Document store backend
    #[arg(long, value_enum, default_value = "cortex")]
    store: StoreBackend,

    /// Corpus file for the local backend (overrides the configured path)
    #[arg(long, value_name = "PATH")]
    corpus: Option<PathBuf>,

    /// Number of papers embedded and written per batch
    #[arg(long, value_name = "N", default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Only ingest the first N papers
    #[arg(long, value_name = "N")]
    limit: Option<usize>,

    /// Configuration file (TOML)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Logging verbosity level
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,

    /// FastEmbed model cache directory
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,
}

/// Initialize logging subsystem with the specified level
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn create_embedding_provider(args: &IngestArgs) -> Result<FastEmbedProvider> {
    let cache_dir = args
        .cache_dir
        .clone()
        .or_else(|| dirs::cache_dir().map(|p| p.join("fastembed")));
    if let Some(dir) = &cache_dir {
        debug!("Using cache directory: {}", dir.display());
    }

    let provider =
        FastEmbedProvider::new(None, cache_dir).context("Failed to initialize FastEmbed provider")?;
    info!(
        "FastEmbed provider initialized: model={}, dimension={}",
        provider.model_name(),
        provider.dimension()
    );
    Ok(provider)
}

/// Create a progress bar for tracking ingestion
fn create_progress_bar(total: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} papers | Inserted: {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("##-"),
    );
    Ok(pb)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = IngestArgs::parse();

    init_logging(&args.log_level);

    info!("Starting paper ingestion");
    debug!("CLI arguments: {:?}", args);

    let start_time = Instant::now();

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let config = load_config(args.config.as_deref()).context("Failed to load configuration")?;

    let source = ExtractedJsonProvider::from_file(&args.input)
        .await
        .with_context(|| format!("Failed to load papers from {}", args.input.display()))?;
    let documents = match args.limit {
        Some(limit) => source.fetch_documents_limit(limit).await?,
        None => source.fetch_documents().await?,
    };
    info!("Found {} papers from {}", documents.len(), source.name());

    if documents.is_empty() {
        warn!("No papers found in input file");
        return Ok(());
    }

    let embedder = create_embedding_provider(&args)?;
    let connector = match args.store {
        StoreBackend::Cortex => AnyConnector::cortex(config.store.clone()),
        StoreBackend::Local => {
            let corpus = args
                .corpus
                .clone()
                .unwrap_or_else(|| config.store.local_corpus.clone());
            info!("Corpus file: {}", corpus.display());
            AnyConnector::local(corpus, embedder.clone())
        }
    };
    let store = connector
        .connect()
        .await
        .with_context(|| format!("Failed to open {} store", connector.name()))?;

    let pipeline = IngestionPipeline::new(embedder, store, Some(args.batch_size));

    let progress = create_progress_bar(documents.len())?;
    progress.set_message("0");

    let stats = pipeline
        .ingest_with_progress(&documents, |stats| {
            progress.set_position(stats.total_processed as u64);
            progress.set_message(stats.inserted.to_string());
        })
        .await
        .context("Failed to ingest papers")?;

    progress.finish_with_message(stats.inserted.to_string());

    let elapsed = start_time.elapsed();
    println!("\n╔════════════════════════════════════════╗");
    println!("║      Ingestion Completed               ║");
    println!("╠════════════════════════════════════════╣");
    println!("║ Total processed:      {:>16} ║", stats.total_processed);
    println!("║ Inserted:             {:>16} ║", stats.inserted);
    println!("║ Duplicates skipped:   {:>16} ║", stats.duplicates_skipped);
    println!("║ Failed:               {:>16} ║", stats.failed);
    println!("║ Elapsed time:         {:>13.2?} ║", elapsed);
    println!("╚════════════════════════════════════════╝");

    if stats.failed > 0 {
        warn!("{} papers failed to write - check logs for details", stats.failed);
    }

    Ok(())
}
