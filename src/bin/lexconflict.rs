//! CLI entry point: runs the pipeline against a pages file and a bills file,
//! printing the resulting `BillImpact` list as JSON to stdout.
//!
//! Not a wire surface — the minimal process entry point a library needs to
//! be runnable, analogous to a single-subcommand admin tool.

use clap::{Parser, Subcommand};
use lexconflict::{
    EmbeddingCache, EmbeddingService, JsonFileBillStore, LlmMap, OpenAiEmbeddingProvider,
    OpenAiLlmProvider, PipelineConfig, PipelineDriver,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "lexconflict", about = "Detects conflicts between a corporate document and legislative bills")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and print the resulting BillImpact list as JSON.
    Analyze {
        /// Path to a text file with one document page per line.
        #[arg(long)]
        pages_file: PathBuf,

        /// Path to a JSON file containing the array of Bill to compare against.
        #[arg(long)]
        bills_file: PathBuf,

        /// Path to the persistent embedding cache's SQLite database.
        #[arg(long, default_value = "embedding_cache.sqlite")]
        embedding_cache_path: PathBuf,

        /// Model name used for both embedding requests and cache lookups.
        #[arg(long, default_value = lexconflict::config::EMBEDDING_MODEL)]
        embedding_model: String,

        /// Chat-completions model used for extraction and consolidation.
        #[arg(long, default_value = "gpt-4o-mini")]
        llm_model: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            pages_file,
            bills_file,
            embedding_cache_path,
            embedding_model,
            llm_model,
        } => {
            let api_key = std::env::var("OPENAI_API_KEY")
                .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY must be set"))?;

            let pages_text = tokio::fs::read_to_string(&pages_file).await?;
            let pages: Vec<lexconflict::DocumentPage> = pages_text
                .lines()
                .enumerate()
                .map(|(index, text)| lexconflict::DocumentPage {
                    index,
                    text: text.to_string(),
                })
                .collect();

            let bill_store = Arc::new(JsonFileBillStore::new(&bills_file));

            let cache = Arc::new(EmbeddingCache::open(&embedding_cache_path.to_string_lossy())?);
            let embedding_provider = Arc::new(OpenAiEmbeddingProvider::new(api_key.clone()));
            let config = PipelineConfig::new()
                .with_embedding_cache_path(embedding_cache_path.to_string_lossy().into_owned());
            let embedding_service = Arc::new(EmbeddingService::new(
                cache,
                embedding_provider,
                embedding_model,
                config.embedding_batch_size,
            ));

            let llm_provider = Arc::new(OpenAiLlmProvider::new(api_key, llm_model));
            let llm_map = Arc::new(LlmMap::new(llm_provider));

            let driver = PipelineDriver::new(bill_store, embedding_service, llm_map, config);
            let impacts = driver.run(&pages, None).await?;

            println!("{}", serde_json::to_string_pretty(&impacts)?);
        }
    }

    Ok(())
}
