use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use quarry_core::config::{expand_path, Config, Settings};
use quarry_core::corpus::JsonCorpus;
use quarry_core::types::{QueryContext, SearchMethod, SearchOptions, SearchResult};
use quarry_embed::get_default_embedder;
use quarry_hybrid::{select_reranker, HybridSearchEngine};

/// Hybrid BM25 + vector retrieval over a JSON chunk corpus
#[derive(Parser, Debug)]
#[command(name = "quarry", version, about)]
struct Cli {
    /// Config file (default: config.toml + config.<RUST_ENV>.toml + APP_* env)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Corpus file or directory (overrides data.corpus_path)
    #[arg(long, global = true, env = "QUARRY_CORPUS")]
    corpus: Option<String>,

    /// Ignore embeddings stored in the corpus and embed every chunk
    #[arg(long, global = true)]
    reembed: bool,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one query
    Search {
        query: String,
        /// lexical | semantic | hybrid
        #[arg(long, default_value = "hybrid")]
        method: SearchMethod,
        #[arg(long, short = 'k')]
        limit: Option<usize>,
        /// Semantic weight
        #[arg(long)]
        alpha: Option<f32>,
        /// Lexical weight
        #[arg(long)]
        beta: Option<f32>,
        #[arg(long)]
        rerank: bool,
        /// Intent label to favour for this query
        #[arg(long)]
        context: Option<String>,
    },
    /// Print index statistics
    Stats,
    /// Compare semantic-focused, keyword-focused and balanced weights
    Demo {
        /// Queries to run (defaults to a built-in set)
        queries: Vec<String>,
    },
}

const DEMO_QUERIES: &[&str] = &[
    "How to create a Discord account?",
    "Discord server permissions setup",
    "What are Discord webhooks?",
    "How to create Discord bot?",
    "Discord channel management",
];

const DEMO_WEIGHTS: &[(&str, f32, f32)] = &[("Semantic-focused", 0.7, 0.3), ("Keyword-focused", 0.3, 0.7), ("Balanced", 0.5, 0.5)];

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry().with(filter).with(fmt::layer().with_writer(std::io::stderr)).init();
}

fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    config.settings()
}

async fn build_engine(cli: &Cli, settings: Settings) -> anyhow::Result<HybridSearchEngine> {
    let raw_path = cli
        .corpus
        .clone()
        .or_else(|| settings.data.corpus_path.clone())
        .context("no corpus given: pass --corpus or set data.corpus_path")?;
    let path = expand_path(raw_path);
    let mut records = JsonCorpus::new(&path).load_records().with_context(|| format!("loading corpus {}", path.display()))?;
    if cli.reembed {
        for r in &mut records {
            r.embedding = None;
        }
    }

    let embedder = get_default_embedder(&settings.embedding);
    let reranker = select_reranker(None, &settings.rerank).await;
    let labels = settings.intent.labels.clone();
    let mut engine = HybridSearchEngine::new(settings, embedder, reranker);
    engine.index_embedded(records).await.context("indexing corpus")?;
    engine.init_intents(&labels).await?;
    Ok(engine)
}

fn print_results(results: &[SearchResult]) {
    if results.is_empty() {
        println!("   (no results)");
    }
    for (i, r) in results.iter().enumerate() {
        println!(
            "{:>3}. {:.4}  [{}] lexical={:.3} semantic={:.3} boost={:.2}  {} ({})",
            i + 1,
            r.score,
            r.source,
            r.lexical_score,
            r.semantic_score,
            r.intent_boost,
            r.id,
            r.metadata.category
        );
        let preview: String = r.content.chars().take(100).collect();
        println!("      {preview}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let settings = load_settings(&cli)?;
    let engine = build_engine(&cli, settings).await?;

    match &cli.command {
        Command::Search { query, method, limit, alpha, beta, rerank, context } => {
            let options = SearchOptions {
                method: *method,
                limit: *limit,
                alpha: *alpha,
                beta: *beta,
                enable_reranking: rerank.then_some(true),
                normalization: None,
            };
            let context = context.clone().map(QueryContext::domain);
            let results = engine.search(query, &options, context.as_ref()).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print_results(&results);
            }
        }
        Command::Stats => {
            let stats = engine.stats();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("state:         {:?}", stats.state);
                println!("documents:     {}", stats.documents);
                println!("avg doc len:   {:.2}", stats.avg_doc_len);
                println!("unique terms:  {}", stats.unique_terms);
                println!("vectors:       {} x {}", stats.vectors, stats.dim);
                println!("intent labels: {}", stats.intent_labels);
                println!("reranker:      {}", stats.reranker);
            }
        }
        Command::Demo { queries } => {
            let queries: Vec<String> =
                if queries.is_empty() { DEMO_QUERIES.iter().map(|q| (*q).to_string()).collect() } else { queries.clone() };
            info!(queries = queries.len(), "running weight comparison");
            for query in &queries {
                println!("\nQuery: \"{query}\"");
                for (name, alpha, beta) in DEMO_WEIGHTS {
                    println!("  {name} (alpha={alpha}, beta={beta})");
                    let options = SearchOptions::new(SearchMethod::Hybrid, 3).weights(*alpha, *beta);
                    match engine.search(query, &options, None).await {
                        Ok(results) => print_results(&results),
                        Err(e) => println!("   error: {e}"),
                    }
                }
            }
        }
    }
    Ok(())
}
