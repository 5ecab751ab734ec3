use ragdex::cli::{Cli, Commands, ConfigAction};
use ragdex::completion::OpenAiCompatClient;
use ragdex::config::{Config, SearchMode};
use ragdex::conversation::ConversationTurn;
use ragdex::embedding::{EmbeddingProvider, FastEmbedProvider};
use ragdex::error::{RagdexError, Result};
use ragdex::index::{LexicalIndex, VectorIndex};
use ragdex::ingest::{Chunker, IngestPipeline, ProcessedManifest};
use ragdex::retrieval::{
    HybridRetriever, QueryRefiner, RetrievalRequest, RetrievalResponse, RetrievalResult,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Ingest { documents, force } => {
            cmd_ingest(cli.config, documents, force).await?;
        }
        Commands::Query {
            question,
            limit,
            semantic,
            history,
            json,
        } => {
            cmd_query(cli.config, &question, limit, semantic, history, json).await?;
        }
        Commands::Status => {
            cmd_status(cli.config)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "ragdex=debug" } else { "ragdex=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt().with_env_filter(filter).with_target(false).init();
}

async fn cmd_ingest(
    config_path: Option<PathBuf>,
    documents: Option<PathBuf>,
    force: bool,
) -> Result<()> {
    let config = Config::load_or_default(config_path)?;

    let documents_dir = match documents {
        Some(dir) => dir,
        None => expand_path(&config.storage.documents_dir)?,
    };
    let data_dir = expand_path(&config.storage.data_dir)?;
    std::fs::create_dir_all(&data_dir).map_err(|e| RagdexError::Io {
        source: e,
        context: format!("Failed to create data directory: {}", data_dir.display()),
    })?;

    let provider = build_provider(&config)?;
    let vector_index = Arc::new(open_vector_index(&config, &data_dir, provider.as_ref())?);
    let lexical_index = Arc::new(tokio::sync::Mutex::new(open_lexical_index(&data_dir)?));

    let pipeline = IngestPipeline::new(
        provider,
        vector_index,
        lexical_index,
        Chunker::from_config(&config.chunking),
        config.retrieval.ingest_batch_size,
        config.retrieval.ingest_workers,
    );

    let manifest_path = data_dir.join("manifest.json");
    let report = pipeline.run(&documents_dir, &manifest_path, force).await?;

    println!("✓ Ingestion complete");
    println!("  Files seen:      {}", report.files_seen);
    println!("  Files processed: {}", report.files_processed);
    println!("  Files skipped:   {}", report.files_skipped);
    println!("  Files failed:    {}", report.files_failed);
    println!("  Chunks added:    {}", report.chunks_added);

    Ok(())
}

async fn cmd_query(
    config_path: Option<PathBuf>,
    question: &str,
    limit: Option<usize>,
    semantic: bool,
    history: Option<String>,
    json: bool,
) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    let data_dir = expand_path(&config.storage.data_dir)?;

    let mut retrieval_config = config.retrieval.clone();
    if semantic {
        retrieval_config.mode = SearchMode::Semantic;
    }
    let k = limit.unwrap_or(retrieval_config.top_k);

    let history: Vec<ConversationTurn> = match history {
        Some(raw) => serde_json::from_str(&raw).map_err(|e| RagdexError::Json {
            source: e,
            context: "Failed to parse --history (expected a JSON array of turns)".to_string(),
        })?,
        None => Vec::new(),
    };
    let request = RetrievalRequest {
        question: question.to_string(),
        history,
    };

    let provider = build_provider(&config)?;
    let vector_index = Arc::new(open_vector_index(&config, &data_dir, provider.as_ref())?);
    let lexical_index = Arc::new(open_lexical_index(&data_dir)?);
    let refiner = build_refiner(&config)?;

    let retriever = HybridRetriever::new(
        provider,
        vector_index,
        lexical_index,
        refiner,
        &retrieval_config,
        config.index.hnsw_ef_search,
    );

    let results = retriever.search(&request, k).await?;

    if json {
        let response = RetrievalResponse::from(results);
        let rendered =
            serde_json::to_string_pretty(&response).map_err(|e| RagdexError::Json {
                source: e,
                context: "Failed to serialize results".to_string(),
            })?;
        println!("{}", rendered);
    } else {
        print_results(&results);
    }

    Ok(())
}

fn print_results(results: &[RetrievalResult]) {
    if results.is_empty() {
        println!("No results. The index may be empty; run 'ragdex ingest' first.");
        return;
    }

    for (rank, result) in results.iter().enumerate() {
        println!(
            "{}. [{:.4}] {}",
            rank + 1,
            result.score,
            result.source
        );
        println!("   {}", result.text);
        println!();
    }
}

fn cmd_status(config_path: Option<PathBuf>) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    let data_dir = expand_path(&config.storage.data_dir)?;
    let documents_dir = expand_path(&config.storage.documents_dir)?;

    println!("Ragdex Status");
    println!("=============");
    println!("\nData dir:      {}", data_dir.display());
    println!("Documents dir: {}", documents_dir.display());
    println!("Model:         {}", config.embedding.model);

    let manifest = ProcessedManifest::load(&data_dir.join("manifest.json"))?;
    println!("\nIngested files: {}", manifest.len());

    // The lexical index carries the chunk corpus and opens without the
    // embedding model
    let lexical_path = data_dir.join("lexical_index.json");
    if lexical_path.exists() {
        let lexical = open_lexical_index(&data_dir)?;
        println!("Indexed chunks: {}", lexical.len());
    } else {
        println!("Indexed chunks: 0 (no index built yet)");
    }

    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = Config::load_or_default(config_path)?;
            let rendered = toml::to_string_pretty(&config)?;
            println!("{}", rendered);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(p) => p,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            let config = Config::default();
            config.save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn build_provider(config: &Config) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider = FastEmbedProvider::new(&config.embedding.model)
        .map_err(|e| RagdexError::EmbeddingUnavailable(e.to_string()))?;
    Ok(Arc::new(provider))
}

/// Refiner is built only when enabled; a missing API key then fails at
/// startup rather than at query time
fn build_refiner(config: &Config) -> Result<Option<QueryRefiner>> {
    if !config.llm.enabled {
        return Ok(None);
    }

    let api_key = config.llm_api_key()?;
    let client = Arc::new(OpenAiCompatClient::new(
        config.llm.api_url.clone(),
        api_key,
        config.llm.model.clone(),
    ));
    Ok(Some(QueryRefiner::new(
        client,
        Duration::from_secs(config.llm.timeout_secs),
    )))
}

fn open_vector_index(
    config: &Config,
    data_dir: &std::path::Path,
    provider: &dyn EmbeddingProvider,
) -> Result<VectorIndex> {
    VectorIndex::open(
        data_dir.join("vector_index.json"),
        provider.dimension(),
        provider.model_name(),
        config.index.hnsw_ef_construction,
        config.index.hnsw_m,
    )
    .map_err(|e| anyhow::anyhow!("Failed to open vector index: {}", e).into())
}

fn open_lexical_index(data_dir: &std::path::Path) -> Result<LexicalIndex> {
    LexicalIndex::open(data_dir.join("lexical_index.json"))
        .map_err(|e| anyhow::anyhow!("Failed to open lexical index: {}", e).into())
}

fn expand_path(path: &std::path::Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| RagdexError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| RagdexError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}
