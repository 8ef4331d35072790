//! `sopqa`: ask questions about the team's QA SOP from the terminal.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use sopqa_brain::settings::{DEFAULT_DOCS_DIR, DEFAULT_INDEX_PATH, DEFAULT_PROVIDER};
use sopqa_brain::{BrainError, Provider, QaBrain, Settings, console, telemetry};
use sopqa_rag::{
    DEFAULT_OLLAMA_URL, FileVectorStore, InMemoryVectorStore, IngestOptions, IngestionPipeline,
    RagConfig, RecursiveChunker, Retriever, VectorStore,
};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "sopqa", version)]
#[command(about = "QA assistant grounded in your SOP documents")]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Settings shared by every subcommand.
#[derive(Args)]
struct ConfigArgs {
    /// Backend for embeddings and generation: `ollama`, or `gemini[-<model>]`
    #[arg(long, env = "LLM_PROVIDER", default_value = DEFAULT_PROVIDER, global = true)]
    provider: String,

    /// Ollama server address
    #[arg(long, env = "OLLAMA_BASE_URL", default_value = DEFAULT_OLLAMA_URL, global = true)]
    ollama_base_url: String,

    /// Gemini API key, required when the provider is Gemini
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true, global = true)]
    google_api_key: Option<String>,

    /// Directory of the persisted vector index
    #[arg(long, env = "SOPQA_INDEX_PATH", default_value = DEFAULT_INDEX_PATH, global = true)]
    index_path: PathBuf,

    /// Directory of SOP markdown files
    #[arg(long, env = "SOPQA_DOCS_DIR", default_value = DEFAULT_DOCS_DIR, global = true)]
    docs_dir: PathBuf,

    /// Abort a generation or embedding request that runs longer than this many seconds
    #[arg(long, env = "SOPQA_GENERATION_TIMEOUT_SECS", global = true)]
    generation_timeout_secs: Option<u64>,

    /// Chunks retrieved per question
    #[arg(long, default_value_t = 3, global = true)]
    top_k: usize,

    /// Answer from an in-memory index of the docs directory built at startup (chat, ask)
    #[arg(long, global = true)]
    ephemeral: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive question loop (default)
    Chat,

    /// Load, chunk and embed the SOP documents into the index
    Ingest {
        /// Directory to ingest instead of --docs-dir
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Remove existing records before writing
        #[arg(long)]
        clear: bool,
    },

    /// Answer a single question and exit
    Ask {
        /// The question
        prompt: String,
    },

    /// Show what the index holds
    Status,
}

impl ConfigArgs {
    fn settings(&self) -> sopqa_brain::Result<Settings> {
        let provider = Provider::resolve(
            &self.provider,
            &self.ollama_base_url,
            self.google_api_key.as_deref(),
        )?;
        let rag = RagConfig::builder().top_k(self.top_k).build()?;

        let mut settings = Settings::new(provider)
            .with_index_path(&self.index_path)
            .with_docs_dir(&self.docs_dir)
            .with_rag_config(rag);
        if let Some(secs) = self.generation_timeout_secs {
            settings = settings.with_generation_timeout(Duration::from_secs(secs));
        }
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    telemetry::init_logging();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "fatal");
            eprintln!("[ERROR] {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = cli.config.settings()?;
    info!(provider = settings.provider.label(), index = %settings.index_path.display(), "starting");

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            let brain = build_brain(&settings, cli.config.ephemeral).await?;
            console::run(&brain).await
        }
        Commands::Ask { prompt } => {
            let brain = build_brain(&settings, cli.config.ephemeral).await?;
            println!("\n{}\n", console::OUTPUT_HEADER);
            let mut answer = brain.answer(&prompt);
            console::write_answer(&mut answer, &mut std::io::stdout()).await?;
            println!();
            Ok(())
        }
        Commands::Ingest { dir, clear } => {
            let dir = dir.unwrap_or_else(|| settings.docs_dir.clone());
            let store = settings.open_store().await?;
            ingest(&settings, &dir, store, IngestOptions { clear_before_ingest: clear }).await
        }
        Commands::Status => status(&settings).await,
    }
}

/// Wire retriever and model together. A persisted index that fails to open
/// is logged and answers continue ungrounded.
async fn build_brain(settings: &Settings, ephemeral: bool) -> Result<QaBrain, BrainError> {
    let embedder = settings.embedding_provider()?;
    let llm = settings.llm()?;

    let store = if ephemeral {
        let store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
        let pipeline = IngestionPipeline::builder()
            .chunker(Arc::new(RecursiveChunker::from_config(&settings.rag)))
            .embedding_provider(embedder.clone())
            .vector_store(store.clone())
            .build()?;
        if let Err(e) = pipeline.ingest(&settings.docs_dir).await {
            warn!(error = %e, dir = %settings.docs_dir.display(), "in-memory ingestion failed");
        }
        Ok(store)
    } else {
        settings.open_store().await
    };

    let retriever = Retriever::new(embedder, store);
    Ok(QaBrain::new(retriever, llm).with_top_k(settings.rag.top_k))
}

async fn ingest(
    settings: &Settings,
    dir: &std::path::Path,
    store: Arc<dyn VectorStore>,
    options: IngestOptions,
) -> anyhow::Result<()> {
    let pipeline = IngestionPipeline::builder()
        .chunker(Arc::new(RecursiveChunker::from_config(&settings.rag)))
        .embedding_provider(settings.embedding_provider()?)
        .vector_store(store)
        .options(options)
        .build()?;

    let report = pipeline
        .ingest(dir)
        .await
        .with_context(|| format!("ingesting {}", dir.display()))?;

    println!(
        "Ingested {} document(s) into {} chunk(s); {} record(s) written to {}",
        report.documents_loaded,
        report.chunks_created,
        report.records_written,
        settings.index_path.display()
    );
    for skipped in &report.skipped {
        println!("  skipped {}: {}", skipped.path.display(), skipped.reason);
    }
    Ok(())
}

async fn status(settings: &Settings) -> anyhow::Result<()> {
    let store = FileVectorStore::open(&settings.index_path)
        .await
        .with_context(|| format!("opening {}", settings.index_path.display()))?;

    println!("Index:      {}", store.path().display());
    match store.manifest().await {
        Some(manifest) => {
            println!("Records:    {}", manifest.record_count);
            match manifest.dimensions {
                Some(dimensions) => println!("Dimensions: {dimensions}"),
                None => println!("Dimensions: -"),
            }
            println!("Updated:    {}", manifest.updated_at.to_rfc3339());
        }
        None => println!("Records:    0 (nothing ingested yet)"),
    }
    Ok(())
}
