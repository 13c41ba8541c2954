use abiacs_assistant::config::Config;
use abiacs_assistant::db::Db;
use abiacs_assistant::embedder::Embedder;
use abiacs_assistant::embedder::download::{all_files_present, download_model_files};
use abiacs_assistant::embedder::mock::MockEmbedder;
use abiacs_assistant::embedder::onnx::OnnxEmbedder;
use abiacs_assistant::ingest::splitter::RecursiveSplitter;
use abiacs_assistant::ingest::{IngestOutcome, Ingestor};
use abiacs_assistant::llm::AnthropicClient;
use abiacs_assistant::server::{self, AppState};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex as TokioMutex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "abiacs-assistant", version, about)]
struct Cli {
    /// Path to the JSON config file
    #[arg(short, long, global = true, default_value = "config.json")]
    config: String,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API (default)
    Serve(RunArgs),
    /// Rebuild the vector index from the documents directory and exit
    Ingest(RunArgs),
}

#[derive(Args, Default)]
struct RunArgs {
    /// Use the hash-based embedder instead of the ONNX model
    #[arg(long)]
    mock_embedder: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: &str) -> Result<Config> {
    let mut config = Config::load(path)?;
    config.apply_env();
    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn load_embedder(config: &Config, mock: bool) -> Result<Arc<dyn Embedder>> {
    let dimensions = config.model.dimensions;
    if mock {
        warn!("Using the mock embedder; search quality will be poor");
        return Ok(Arc::new(MockEmbedder::new(dimensions)));
    }

    let model_dir = PathBuf::from(&config.model.dir);
    if !all_files_present(&model_dir) {
        info!("Downloading {} into {}", config.model.name, model_dir.display());
        let dir = model_dir.clone();
        tokio::task::spawn_blocking(move || download_model_files(&dir))
            .await
            .context("model download task panicked")??;
    }

    let embedder = OnnxEmbedder::new(&model_dir, dimensions)
        .with_context(|| format!("failed to load model from {}", model_dir.display()))?;
    info!("Loaded embedding model {}", config.model.name);
    Ok(Arc::new(embedder))
}

fn open_db(config: &Config) -> Result<Db> {
    Db::open(&config.db_path, config.model.dimensions)
        .with_context(|| format!("failed to open database {}", config.db_path))
}

async fn serve(config: Config, args: RunArgs) -> Result<()> {
    info!("Starting AbiaCS Assistant API...");

    if config.anthropic_api_key.is_empty() {
        warn!("ANTHROPIC_API_KEY is not set; chat requests will fail");
    }

    let embedder = load_embedder(&config, args.mock_embedder).await?;
    let db = open_db(&config)?;

    let chunk_count = db.chunk_count()?;
    if chunk_count == 0 {
        warn!("No documents indexed. Run `abiacs-assistant ingest` or POST /api/ingest first.");
    } else {
        info!("Loaded {chunk_count} document chunks into vector store");
    }

    let llm = Arc::new(AnthropicClient::from_config(&config)?);
    let state = AppState::new(config, db, embedder, llm)?;
    server::serve(state).await
}

async fn ingest(config: Config, args: RunArgs) -> Result<()> {
    let embedder = load_embedder(&config, args.mock_embedder).await?;
    let db = TokioMutex::new(open_db(&config)?);
    let ingestor = Ingestor::new(
        config.documents_path(),
        RecursiveSplitter::new(config.chunk_size, config.chunk_overlap),
        embedder,
    );

    match ingestor.run(&db).await? {
        IngestOutcome::NoDocumentsDir => println!(
            "Created {}. Add your civil service PDF documents there and run ingest again.",
            config.documents_dir
        ),
        IngestOutcome::NoPdfs => println!("No PDF files found in {}", config.documents_dir),
        IngestOutcome::Ingested(report) => {
            println!(
                "Ingested {} chunks from {} pages across {} PDF files into {}",
                report.chunks, report.pages, report.files, config.db_path
            );
            if report.failed > 0 {
                println!("{} file(s) could not be read and were skipped", report.failed);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli.config)?;

    match cli.command {
        None => serve(config, RunArgs::default()).await,
        Some(Command::Serve(args)) => serve(config, args).await,
        Some(Command::Ingest(args)) => ingest(config, args).await,
    }
}
