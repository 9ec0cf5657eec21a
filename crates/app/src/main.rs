mod routes;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use pdf_chat_core::{
    CharacterNgramEmbedder, Embedder, IngestionOptions, LopdfExtractor, OllamaEmbedder,
    OllamaGenerator, Pipeline, PipelineConfig, S3Client, DEFAULT_EMBEDDING_MODEL,
    DEFAULT_GENERATION_MODEL, DEFAULT_NUM_CTX, DEFAULT_OLLAMA_URL, DEFAULT_TOP_K,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-chat-server", version)]
struct Cli {
    /// Address to serve HTTP on
    #[arg(long, env = "PDF_CHAT_LISTEN", default_value = "127.0.0.1:5000")]
    listen: SocketAddr,

    /// Bucket holding the PDF collection
    #[arg(long, env = "PDF_CHAT_BUCKET", default_value = "pdf-chatbot")]
    bucket: String,

    /// S3-compatible endpoint (path-style); AWS is used when unset
    #[arg(long, env = "PDF_CHAT_S3_ENDPOINT")]
    s3_endpoint: Option<String>,

    /// Local mirror of the bucket
    #[arg(long, env = "PDF_CHAT_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Where the vector index is persisted
    #[arg(long, env = "PDF_CHAT_INDEX_PATH", default_value = "vector_index.json")]
    index_path: PathBuf,

    /// Ollama base URL
    #[arg(long, env = "OLLAMA_URL", default_value = DEFAULT_OLLAMA_URL)]
    ollama_url: String,

    #[arg(long, env = "PDF_CHAT_EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    #[arg(long, env = "PDF_CHAT_GENERATION_MODEL", default_value = DEFAULT_GENERATION_MODEL)]
    generation_model: String,

    /// Context window passed to the generation model
    #[arg(long, env = "PDF_CHAT_NUM_CTX", default_value_t = DEFAULT_NUM_CTX)]
    num_ctx: u32,

    /// Number of chunks retrieved per question
    #[arg(long, env = "PDF_CHAT_TOP_K", default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    #[arg(long, default_value_t = 1000)]
    chunk_size: usize,

    #[arg(long, default_value_t = 200)]
    chunk_overlap: usize,

    /// Timeout for object store and model requests, in seconds
    #[arg(long, env = "PDF_CHAT_REQUEST_TIMEOUT", default_value_t = 120)]
    request_timeout: u64,

    /// Use the built-in trigram embedder instead of Ollama embeddings
    #[arg(long, default_value_t = false)]
    offline_embeddings: bool,

    /// Skip building the index before accepting requests
    #[arg(long, default_value_t = false)]
    no_warmup: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let timeout = Duration::from_secs(cli.request_timeout);

    let store = S3Client::from_env(&cli.bucket, cli.s3_endpoint.as_deref(), timeout)
        .context("configuring object store client")?;

    let embedder: Arc<dyn Embedder> = if cli.offline_embeddings {
        Arc::new(CharacterNgramEmbedder::default())
    } else {
        Arc::new(
            OllamaEmbedder::new(&cli.ollama_url, &cli.embedding_model, timeout)
                .context("configuring embedding client")?,
        )
    };
    let generator = OllamaGenerator::new(&cli.ollama_url, &cli.generation_model, cli.num_ctx, timeout)
        .context("configuring generation client")?;

    let config = PipelineConfig {
        data_dir: cli.data_dir,
        index_path: cli.index_path,
        top_k: cli.top_k,
        ingestion: IngestionOptions {
            chunk_max_chars: cli.chunk_size,
            chunk_overlap_chars: cli.chunk_overlap,
        },
    };
    config
        .ingestion
        .validate()
        .context("invalid --chunk-size/--chunk-overlap")?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        bucket = %cli.bucket,
        embedding_model = embedder.model_name(),
        generation_model = generator.model(),
        "pdf-chat-server boot"
    );

    let pipeline = Arc::new(Pipeline::new(
        config,
        Arc::new(store),
        Arc::new(LopdfExtractor),
        embedder,
        Arc::new(generator),
    ));

    if !cli.no_warmup {
        match pipeline.warmup().await {
            Ok(outcome) => info!(?outcome, "index ready"),
            Err(error) => warn!(%error, "initial warmup failed, retrying on first request"),
        }
    }

    let listener = TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("binding {}", cli.listen))?;
    info!(addr = %cli.listen, "listening");

    axum::serve(listener, routes::router(pipeline))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for shutdown signal");
    }
}
