//! Scrybe CLI
//!
//! Read-only command-line interface for querying captured history: lexical
//! and semantic search, the recent-activity timeline, store statistics,
//! entity lookups, and natural-language questions answered over retrieved
//! context (spec §6, §7). Opens storage directly; no capture daemon is
//! started here.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use scrybe_core::model::{EntityKind, SourceKind};
use scrybe_core::retrieval::RetrievalEngine;
use scrybe_core::{Config, Storage};
use scrybe_rag::{build_backend, ModelRouter, ModelTier, RagOrchestrator};

#[cfg(feature = "embeddings")]
use scrybe_core::embeddings::Embedder;

/// Scrybe - Personal Knowledge Capture CLI
#[derive(Parser)]
#[command(name = "scrybe")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Query the scrybe personal knowledge store")]
struct Cli {
    /// Override the data directory (defaults to `<home>/.unified-ai`).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lexical search over captured content
    Search {
        /// Search terms
        query: String,
        /// Restrict to one content source
        #[arg(long)]
        r#type: Option<String>,
        /// Maximum number of hits
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Semantic (embedding) search, falling back to lexical if unavailable
    SemanticSearch {
        query: String,
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Recent activity timeline
    Recent {
        /// Look back this many days
        #[arg(long, default_value = "7")]
        days: u32,
        #[arg(long)]
        r#type: Option<String>,
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Store-wide summary statistics
    Stats,

    /// Extracted named entities
    Entities {
        #[arg(long)]
        kind: Option<String>,
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Shorthand for `entities --kind person`
    People {
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Shorthand for `entities --kind org`
    Organizations {
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Entity co-occurrence graph
    Relationships {
        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// Ask a natural-language question, answered from retrieved context
    Ask {
        question: String,
        /// Use the multi-step planner instead of the linear retrieve-then-generate path
        #[arg(long)]
        plan: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let data_dir = cli.data_dir.unwrap_or_else(Config::default_data_dir);

    match cli.command {
        Commands::Search { query, r#type, limit } => run_search(&data_dir, &query, r#type, limit),
        Commands::SemanticSearch { query, limit } => run_semantic_search(&data_dir, &query, limit),
        Commands::Recent { days, r#type, limit } => run_recent(&data_dir, days, r#type, limit),
        Commands::Stats => run_stats(&data_dir),
        Commands::Entities { kind, limit } => run_entities(&data_dir, kind, limit),
        Commands::People { limit } => run_entities(&data_dir, Some("person".to_string()), limit),
        Commands::Organizations { limit } => run_entities(&data_dir, Some("org".to_string()), limit),
        Commands::Relationships { limit } => run_relationships(&data_dir, limit),
        Commands::Ask { question, plan } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_ask(&data_dir, &question, plan))
        }
    }
}

fn open_storage(data_dir: &std::path::Path) -> anyhow::Result<Storage> {
    Ok(Storage::new(Some(data_dir.join("capture.db")))?)
}

fn parse_source(kind: Option<String>) -> anyhow::Result<Option<SourceKind>> {
    kind.map(|s| s.parse::<SourceKind>()).transpose().map_err(anyhow::Error::msg)
}

fn parse_entity_kind(kind: Option<String>) -> anyhow::Result<Option<EntityKind>> {
    kind.map(|s| s.parse::<EntityKind>()).transpose().map_err(anyhow::Error::msg)
}

fn run_search(data_dir: &std::path::Path, query: &str, kind: Option<String>, limit: usize) -> anyhow::Result<()> {
    let storage = open_storage(data_dir)?;
    let source = parse_source(kind)?;

    #[cfg(feature = "embeddings")]
    let engine = RetrievalEngine::new(&storage, None);
    #[cfg(not(feature = "embeddings"))]
    let engine = RetrievalEngine::new(&storage);

    let hits = engine.search(query, source, limit)?;
    print_hits(&hits.into_iter().map(|h| (h.record, Some(h.score))).collect::<Vec<_>>());
    Ok(())
}

fn run_semantic_search(data_dir: &std::path::Path, query: &str, limit: usize) -> anyhow::Result<()> {
    let storage = open_storage(data_dir)?;

    #[cfg(feature = "embeddings")]
    let embedder = Embedder::load().ok();
    #[cfg(feature = "embeddings")]
    let engine = RetrievalEngine::new(&storage, embedder.as_ref());
    #[cfg(not(feature = "embeddings"))]
    let engine = RetrievalEngine::new(&storage);

    let hits = engine.semantic_search(query, limit)?;
    print_hits(&hits.into_iter().map(|h| (h.record, Some(h.score))).collect::<Vec<_>>());
    Ok(())
}

fn run_recent(data_dir: &std::path::Path, days: u32, kind: Option<String>, limit: usize) -> anyhow::Result<()> {
    let storage = open_storage(data_dir)?;
    let source = parse_source(kind)?;

    #[cfg(feature = "embeddings")]
    let engine = RetrievalEngine::new(&storage, None);
    #[cfg(not(feature = "embeddings"))]
    let engine = RetrievalEngine::new(&storage);

    let records = engine.timeline(days, source, limit)?;
    print_hits(&records.into_iter().map(|r| (r, None)).collect::<Vec<_>>());
    Ok(())
}

fn run_stats(data_dir: &std::path::Path) -> anyhow::Result<()> {
    let storage = open_storage(data_dir)?;
    let stats = storage.stats()?;

    println!("{}", "=== Scrybe Store Statistics ===".cyan().bold());
    println!();
    println!("{}: {}", "Total Content".white().bold(), stats.total_content);
    println!("{}: {}", "Total Entities".white().bold(), stats.total_entities);
    println!("{}: {}", "Vector Index Available".white().bold(), stats.vector_index_available);
    println!("{}: {}", "Entity Extraction Available".white().bold(), stats.entity_extraction_available);
    println!("{}: {}", "Embedder Available".white().bold(), stats.embedder_available);

    if !stats.by_source.is_empty() {
        println!();
        println!("{}", "=== By Source ===".yellow().bold());
        let total = stats.total_content.max(1);
        for (source, count) in sorted_by_count(&stats.by_source) {
            print_distribution_bar(&source, count as usize, total as usize);
        }
    }

    if !stats.by_entity_kind.is_empty() {
        println!();
        println!("{}", "=== By Entity Kind ===".magenta().bold());
        let total = stats.total_entities.max(1);
        for (kind, count) in sorted_by_count(&stats.by_entity_kind) {
            print_distribution_bar(&kind, count as usize, total as usize);
        }
    }

    Ok(())
}

fn sorted_by_count(map: &std::collections::HashMap<String, i64>) -> Vec<(String, i64)> {
    let mut pairs: Vec<(String, i64)> = map.iter().map(|(k, v)| (k.clone(), *v)).collect();
    pairs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    pairs
}

fn print_distribution_bar(label: &str, count: usize, total: usize) {
    let percentage = if total > 0 { (count as f64 / total as f64) * 100.0 } else { 0.0 };
    let filled = (percentage / 5.0).round() as usize;
    let bar: String = "#".repeat(filled.min(20)) + &" ".repeat(20 - filled.min(20));
    println!("  {:<16} [{}] {:>5.1}% ({})", label, bar.green(), percentage, count);
}

fn run_entities(data_dir: &std::path::Path, kind: Option<String>, limit: usize) -> anyhow::Result<()> {
    let storage = open_storage(data_dir)?;
    let kind = parse_entity_kind(kind)?;

    #[cfg(feature = "embeddings")]
    let engine = RetrievalEngine::new(&storage, None);
    #[cfg(not(feature = "embeddings"))]
    let engine = RetrievalEngine::new(&storage);

    let entities = engine.entities(kind, limit)?;
    if entities.is_empty() {
        println!("{}", "No entities found.".dimmed());
        return Ok(());
    }

    for entity in entities {
        println!(
            "{} {} - {} mention(s)",
            entity.text.white().bold(),
            format!("({})", entity.kind).dimmed(),
            entity.mention_count
        );
        for context in entity.recent_contexts.iter().take(3) {
            println!("    {}", context.dimmed());
        }
    }
    Ok(())
}

fn run_relationships(data_dir: &std::path::Path, limit: usize) -> anyhow::Result<()> {
    let storage = open_storage(data_dir)?;

    #[cfg(feature = "embeddings")]
    let engine = RetrievalEngine::new(&storage, None);
    #[cfg(not(feature = "embeddings"))]
    let engine = RetrievalEngine::new(&storage);

    let graph = engine.relationships(limit)?;
    if graph.edges.is_empty() {
        println!("{}", "No co-occurring entities found.".dimmed());
        return Ok(());
    }

    println!("{}", "=== Entity Relationships ===".cyan().bold());
    for edge in &graph.edges {
        println!("  {} -- {} (weight {})", edge.source.white().bold(), edge.target.white().bold(), edge.weight);
    }
    Ok(())
}

async fn run_ask(data_dir: &std::path::Path, question: &str, use_plan: bool) -> anyhow::Result<()> {
    let config = Config::load(data_dir)?;
    let storage = open_storage(data_dir)?;

    #[cfg(feature = "embeddings")]
    let embedder = Embedder::load().ok();
    #[cfg(feature = "embeddings")]
    let retrieval = RetrievalEngine::new(&storage, embedder.as_ref());
    #[cfg(not(feature = "embeddings"))]
    let retrieval = RetrievalEngine::new(&storage);

    let router = ModelRouter::new(&config.llm);
    let tier = if use_plan { ModelTier::Powerful } else { ModelTier::Balanced };
    let route = router.route(tier);
    let backend = build_backend(&config.llm.provider, &route);

    let orchestrator = RagOrchestrator::new(&retrieval, backend.as_ref(), ModelRouter::new(&config.llm));
    let response = if use_plan {
        orchestrator.plan_and_execute(question).await?
    } else {
        orchestrator.answer(question).await?
    };

    println!("{}", response.answer);
    if !response.context.is_empty() {
        println!();
        println!("{}", format!("=== Context ({} item(s), model: {}) ===", response.context.len(), response.model_used).dimmed());
        for record in &response.context {
            println!("  [{}] {}", record.source, truncate_line(&record.text));
        }
    }
    Ok(())
}

fn print_hits(rows: &[(scrybe_core::ContentRecord, Option<f32>)]) {
    if rows.is_empty() {
        println!("{}", "No results.".dimmed());
        return;
    }
    for (record, score) in rows {
        let header = match score {
            Some(score) => format!("[{}] {} (score {:.3})", record.source, record.captured_at.format("%Y-%m-%d %H:%M"), score),
            None => format!("[{}] {}", record.source, record.captured_at.format("%Y-%m-%d %H:%M")),
        };
        println!("{}", header.white().bold());
        println!("  {}", truncate_line(&record.text));
    }
}

fn truncate_line(text: &str) -> String {
    let single_line: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= 160 {
        return single_line;
    }
    let truncated: String = single_line.chars().take(160).collect();
    format!("{truncated}...")
}
