use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use log::info;
use std::path::PathBuf;
use std::time::Duration;

use folder_rag::config::{
    default_api_key_file, RagConfig, RetrySettings, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE,
    DEFAULT_MAX_CONTEXT_CHARS, DEFAULT_SIMILARITY_THRESHOLD, DEFAULT_TOP_K,
};
use folder_rag::gemini::{GeminiClient, GeminiConfig};
use folder_rag::index::Metric;
use folder_rag::rag::{render_outcome, RagEngine};

/// Answer questions about a folder of PDF and text documents using Gemini embeddings
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Question to answer; starts an interactive session when omitted
    #[arg(short, long)]
    query: Option<String>,

    /// Folder holding the documents to index
    #[arg(long, env = "RAG_SOURCE_DIR", default_value = "source_documents")]
    source_dir: PathBuf,

    /// Number of chunks retrieved per question
    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    /// Minimum cosine similarity for a chunk to be used as context
    #[arg(long, default_value_t = DEFAULT_SIMILARITY_THRESHOLD)]
    similarity_threshold: f32,

    /// Chunk length in characters
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Characters shared between consecutive chunks
    #[arg(long, default_value_t = DEFAULT_CHUNK_OVERLAP)]
    chunk_overlap: usize,

    /// Prompt size limit in characters
    #[arg(long, default_value_t = DEFAULT_MAX_CONTEXT_CHARS)]
    max_context_chars: usize,

    /// Deadline for each remote call
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Retries for rate-limited or unavailable remote calls
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Index similarity metric (cosine or euclidean)
    #[arg(long, default_value_t = Metric::Cosine)]
    metric: Metric,

    /// File holding the Gemini API key [default: ~/.gemini_api_key]
    #[arg(long, env = "GEMINI_API_KEY_FILE")]
    api_key_file: Option<PathBuf>,
}

impl Args {
    fn rag_config(&self) -> RagConfig {
        RagConfig {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            top_k: self.top_k,
            similarity_threshold: self.similarity_threshold,
            metric: self.metric,
            max_context_chars: self.max_context_chars,
            retry: RetrySettings {
                max_retries: self.max_retries,
                request_timeout: Duration::from_secs(self.timeout_secs),
                ..RetrySettings::default()
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let config = args.rag_config();
    config.validate().context("Invalid settings")?;

    // The credential is read exactly once, before any document work
    let key_file = args.api_key_file.clone().unwrap_or_else(default_api_key_file);
    let gemini_config = GeminiConfig::from_key_file(&key_file)
        .with_context(|| format!("Failed to load Gemini API key from {}", key_file.display()))?;
    let gemini = GeminiClient::new(gemini_config);

    info!("Indexing documents in {}", args.source_dir.display());

    let rag_engine = RagEngine::from_folder(&config, gemini.clone(), gemini, &args.source_dir)
        .await
        .context("Failed to build the document index")?;

    match args.query {
        Some(question) => {
            let outcome = rag_engine
                .query(&question)
                .await
                .context("Failed to answer the question")?;
            println!("{}", render_outcome(&outcome));
        }
        None => rag_engine
            .run_query_loop()
            .await
            .context("Error in query loop")?,
    }

    Ok(())
}
