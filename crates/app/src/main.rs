use anyhow::Context as _;
use chrono::Utc;
use clap::{Parser, Subcommand};
use funso_core::{
    detect_language, ingest_folder_best_effort, AssistantConfig, AssistantPipeline,
    ChatCompletionsClient, ChunkingConfig, CorpusIndex, IntentClassifier, ProductCatalog,
    QaResponse, QueryTypeRouter, SkippedFile,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "funso", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// TOML configuration file; flags below override it.
    #[arg(long, env = "FUNSO_CONFIG")]
    config: Option<PathBuf>,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "OPENAI_BASE_URL")]
    endpoint: Option<String>,

    /// Model used for translation and generation
    #[arg(long, env = "OPENAI_MODEL")]
    model: Option<String>,

    /// API key for the completion backend
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Passages retrieved per query
    #[arg(long)]
    top_k: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a document folder and report what the index would hold.
    Ingest {
        /// Folder that contains pdf, txt or md files recursively.
        #[arg(long)]
        folder: PathBuf,
    },
    /// Offline routing: language, query type, intent and product.
    Classify {
        #[arg(long)]
        query: String,
        /// Folder used to learn product names.
        #[arg(long)]
        folder: Option<PathBuf>,
    },
    /// Answer one question with the full pipeline.
    Ask {
        #[arg(long)]
        folder: PathBuf,
        #[arg(long)]
        query: String,
    },
    /// Answer one question per line of a file, concurrently.
    Batch {
        #[arg(long)]
        folder: PathBuf,
        #[arg(long)]
        file: PathBuf,
    },
}

impl Cli {
    fn assistant_config(&self) -> anyhow::Result<AssistantConfig> {
        let mut config = match &self.config {
            Some(path) => AssistantConfig::load(path)?,
            None => AssistantConfig::default(),
        };
        if let Some(endpoint) = &self.endpoint {
            config.backend.endpoint = endpoint.clone();
        }
        if let Some(model) = &self.model {
            config.backend.model = model.clone();
        }
        if self.api_key.is_some() {
            config.backend.api_key = self.api_key.clone();
        }
        if let Some(top_k) = self.top_k {
            config.retrieval.top_k = top_k;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Ingests `folder` plus the contact directory; skipped files are logged
/// and returned.
fn build_index(
    folder: &Path,
    config: &AssistantConfig,
) -> anyhow::Result<(Arc<CorpusIndex>, Vec<SkippedFile>)> {
    let report = ingest_folder_best_effort(folder)
        .with_context(|| format!("ingesting {}", folder.display()))?;

    for skipped in &report.skipped_files {
        warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped document");
    }

    let index = CorpusIndex::builder()
        .chunking(ChunkingConfig::from(&config.chunking))
        .documents(report.documents)
        .with_contacts()
        .build()?;
    Ok((Arc::new(index), report.skipped_files))
}

fn print_response(query: &str, response: &QaResponse) {
    println!("query: {query}");
    println!(
        "language={} type={} intent={} product={} state={:?}{}",
        response.source_language,
        response.query_type,
        response.intent,
        response
            .product_id
            .as_ref()
            .map(|id| id.as_str())
            .unwrap_or("-"),
        response.final_state,
        if response.degraded { " degraded" } else { "" }
    );
    println!("{}", response.answer_text);
    for source in &response.source_list {
        println!("  source={source}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = cli.assistant_config()?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "funso boot"
    );

    match cli.command {
        Command::Ingest { folder } => {
            let (index, skipped) = build_index(&folder, &config)?;

            let labelled = index
                .passages()
                .iter()
                .filter(|passage| passage.section.is_some())
                .count();
            println!(
                "{} documents, {} passages ({} with a section label), {} products",
                index.documents().len(),
                index.passages().len(),
                labelled,
                index.catalog().len()
            );
            for product in index.catalog().products() {
                println!(
                    "  product={} category={} passages={}",
                    product.id,
                    product.category.as_str(),
                    product.passage_ids.len()
                );
            }
            for file in skipped {
                println!("  skipped={} reason={}", file.path.display(), file.reason);
            }
        }
        Command::Classify { query, folder } => {
            let catalog = match folder {
                Some(folder) => build_index(&folder, &config)?.0.catalog().clone(),
                None => ProductCatalog::new(),
            };
            let names: Vec<&str> = catalog.ids().map(|id| id.as_str()).collect();
            let language = detect_language(&query);
            let query_type = QueryTypeRouter::with_product_names(&names).route(&query, &query);
            let intent = IntentClassifier::default().classify_query(&query, language, &query);
            let product = catalog.resolve_text(&query);

            println!("query: {query}");
            println!(
                "language={language} type={query_type} intent={intent} product={}",
                product.as_ref().map(|id| id.as_str()).unwrap_or("-")
            );
        }
        Command::Ask { folder, query } => {
            let (index, _) = build_index(&folder, &config)?;
            let pipeline = build_pipeline(index, &config)?;
            let response = pipeline.answer(&query).await;
            print_response(&query, &response);
        }
        Command::Batch { folder, file } => {
            let raw = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let queries: Vec<String> = raw
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_string)
                .collect();

            let (index, _) = build_index(&folder, &config)?;
            let pipeline = Arc::new(build_pipeline(index, &config)?);

            let mut tasks = tokio::task::JoinSet::new();
            for (position, query) in queries.into_iter().enumerate() {
                let pipeline = Arc::clone(&pipeline);
                tasks.spawn(async move {
                    let response = pipeline.answer(&query).await;
                    (position, query, response)
                });
            }

            let mut answered = Vec::new();
            while let Some(joined) = tasks.join_next().await {
                answered.push(joined?);
            }
            answered.sort_by_key(|(position, _, _)| *position);
            for (_, query, response) in &answered {
                print_response(query, response);
                println!();
            }
        }
    }

    Ok(())
}

type CliPipeline = AssistantPipeline<Arc<CorpusIndex>, ChatCompletionsClient, ChatCompletionsClient>;

fn build_pipeline(index: Arc<CorpusIndex>, config: &AssistantConfig) -> anyhow::Result<CliPipeline> {
    if config.backend.api_key.is_none() {
        warn!("no API key configured; backend calls will likely be rejected");
    }
    let translator = ChatCompletionsClient::from_config(&config.backend)?;
    let generation = ChatCompletionsClient::from_config(&config.backend)?;
    Ok(AssistantPipeline::from_index(index, translator, generation, config)?)
}
