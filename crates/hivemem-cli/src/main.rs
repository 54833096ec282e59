//! Hivemem CLI
//!
//! Command-line interface for running and inspecting memory consolidation
//! against a JSON-file store.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use hivemem_core::{
    ConsolidationConfig, ConsolidationPlan, Consolidator, EntryMetadata, JsonFileStore,
    MemoryCategory, MemoryEntry, MemoryService, MemoryStore, MemoryValue,
};

/// Hivemem - Memory Consolidation CLI
#[derive(Parser)]
#[command(name = "hivemem")]
#[command(author = "Hivemem Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Consolidate namespaced agent memory: TTL expiry, deduplication, size bounding")]
struct Cli {
    /// Store directory (defaults to the platform data directory)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a consolidation cycle over one namespace
    Consolidate {
        /// Namespace to consolidate
        #[arg(long)]
        namespace: String,
        /// Consolidation config JSON file (camelCase keys)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Show what would be removed without touching the store
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the last recorded consolidation for a namespace
    Verify {
        /// Namespace to check
        #[arg(long)]
        namespace: String,
    },

    /// Show namespace statistics
    Stats {
        /// Namespace to inspect
        #[arg(long)]
        namespace: String,
    },

    /// Store a memory entry
    Store {
        /// Target namespace
        #[arg(long)]
        namespace: String,
        /// Entry key
        key: String,
        /// Entry value (parsed as JSON when possible, else stored as text)
        value: String,
        /// Retention category (context, task, knowledge, or any name)
        #[arg(long)]
        category: Option<String>,
    },

    /// List entries in a namespace
    List {
        /// Namespace to list
        #[arg(long)]
        namespace: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let store = Arc::new(JsonFileStore::new(cli.data_dir)?);

    match cli.command {
        Commands::Consolidate {
            namespace,
            config,
            dry_run,
        } => run_consolidate(store, namespace, config, dry_run).await,
        Commands::Verify { namespace } => run_verify(store, namespace).await,
        Commands::Stats { namespace } => run_stats(store, namespace).await,
        Commands::Store {
            namespace,
            key,
            value,
            category,
        } => run_store(store, namespace, key, value, category).await,
        Commands::List { namespace } => run_list(store, namespace).await,
    }
}

/// Load a config file, or the defaults when none is given
fn load_config(path: Option<&Path>) -> anyhow::Result<ConsolidationConfig> {
    let config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            serde_json::from_str::<ConsolidationConfig>(&raw)?
        }
        None => ConsolidationConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Value text: JSON when it parses as a non-string JSON value, else plain text
fn parse_value(raw: &str) -> MemoryValue {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::String(text)) => MemoryValue::Text(text),
        Ok(value) if value.is_object() || value.is_array() => MemoryValue::Structured(value),
        _ => MemoryValue::Text(raw.to_string()),
    }
}

fn format_timestamp(ms: Option<i64>) -> String {
    match ms.and_then(|ms| Utc.timestamp_millis_opt(ms).single()) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "-".dimmed().to_string(),
    }
}

/// Run consolidate command
async fn run_consolidate(
    store: Arc<JsonFileStore>,
    namespace: String,
    config_path: Option<PathBuf>,
    dry_run: bool,
) -> anyhow::Result<()> {
    println!("{}", "=== Hivemem Consolidation ===".cyan().bold());
    println!();

    let config = load_config(config_path.as_deref())?;

    if dry_run {
        let entries = store.list(&namespace).await?;
        let mut consolidator = Consolidator::new(config)?;
        let plan = consolidator.prepare(entries);
        print_plan(&plan);
        println!();
        println!("{}", "Dry run: store left unchanged".yellow());
        return Ok(());
    }

    let service = MemoryService::new(store, namespace.as_str(), config)?;
    let report = service.run_consolidation().await?;

    println!("{}: {}", "Namespace".white().bold(), namespace);
    println!("{}: {}", "Processed".white().bold(), report.processed);
    println!("{}: {}", "Evicted".white().bold(), report.evicted);
    println!("{}: {}", "Deduplicated".white().bold(), report.deduplicated);
    println!("{}: {}", "Archived".white().bold(), report.archived);
    println!("{}: {}ms", "Duration".white().bold(), report.duration_ms);

    println!();
    if report.is_noop() {
        println!("{}", "Nothing to remove".green());
    } else {
        println!(
            "{}",
            format!(
                "Consolidation complete: {} of {} entries retained",
                report.retained(),
                report.processed
            )
            .green()
        );
    }

    Ok(())
}

fn print_plan(plan: &ConsolidationPlan) {
    let sections: [(&str, &[MemoryEntry]); 3] = [
        ("Expired", plan.expired.as_slice()),
        ("Duplicates", plan.duplicates.as_slice()),
        ("Size Evicted", plan.size_evicted.as_slice()),
    ];

    for (title, entries) in sections {
        println!("{} ({})", title.yellow().bold(), entries.len());
        for entry in entries {
            println!("  {} {}", "-".red(), entry.key);
        }
    }

    for group in &plan.groups {
        println!(
            "  {} {} survives over {}",
            "~".cyan(),
            group.survivor,
            group.removed.join(", ")
        );
    }

    println!();
    println!("{}: {}", "Would Keep".white().bold(), plan.kept.len());
    if let Some(archive) = &plan.archive_namespace {
        println!(
            "{}: {} into '{}'",
            "Would Archive".white().bold(),
            plan.report.archived,
            archive
        );
    }
}

/// Run verify command
async fn run_verify(store: Arc<JsonFileStore>, namespace: String) -> anyhow::Result<()> {
    let service = MemoryService::new(store, namespace.as_str(), ConsolidationConfig::default())?;

    match service.verify_consolidation().await? {
        Some(status) => {
            println!("{}", "=== Last Consolidation ===".cyan().bold());
            println!();
            println!("{}: {}", "Status".white().bold(), status.status.to_string().green());
            println!("{}: {}", "Run ID".white().bold(), status.run_id);
            println!("{}: {}", "Count".white().bold(), status.consolidation_count);
            println!(
                "{}: {}",
                "Last Run".white().bold(),
                status.last_run_at.format("%Y-%m-%d %H:%M:%S")
            );
            println!(
                "{}: processed {}, evicted {}, deduplicated {}, archived {}",
                "Last Report".white().bold(),
                status.last_report.processed,
                status.last_report.evicted,
                status.last_report.deduplicated,
                status.last_report.archived
            );
        }
        None => {
            println!(
                "{}",
                format!("No consolidation recorded for '{namespace}'").yellow()
            );
        }
    }
    Ok(())
}

/// Run stats command
async fn run_stats(store: Arc<JsonFileStore>, namespace: String) -> anyhow::Result<()> {
    let entries = store.list(&namespace).await?;

    println!("{}", "=== Hivemem Namespace Statistics ===".cyan().bold());
    println!();
    println!("{}: {}", "Namespace".white().bold(), namespace);
    println!("{}: {}", "Total Entries".white().bold(), entries.len());
    println!("{}: {}", "Store".white().bold(), store.data_dir().display());

    if entries.is_empty() {
        println!("{}", "No memories found.".dimmed());
        return Ok(());
    }

    let missing = entries.iter().filter(|e| e.timestamp().is_none()).count();
    let oldest = entries.iter().filter_map(MemoryEntry::timestamp).min();
    let newest = entries.iter().filter_map(MemoryEntry::timestamp).max();
    println!("{}: {}", "Oldest".white().bold(), format_timestamp(oldest));
    println!("{}: {}", "Newest".white().bold(), format_timestamp(newest));
    if missing > 0 {
        println!("{}: {}", "Missing Timestamp".yellow().bold(), missing);
    }

    let mut by_category: BTreeMap<String, usize> = BTreeMap::new();
    for entry in &entries {
        let name = entry
            .resolved_category()
            .map_or_else(|| "(none)".to_string(), |c| c.to_string());
        *by_category.entry(name).or_default() += 1;
    }

    println!();
    println!("{}", "=== By Category ===".yellow().bold());
    for (name, count) in &by_category {
        let pct = *count as f64 / entries.len() as f64 * 100.0;
        println!("  {:<16} {:>6} ({:.1}%)", name, count, pct);
    }

    Ok(())
}

/// Run store command
async fn run_store(
    store: Arc<JsonFileStore>,
    namespace: String,
    key: String,
    value: String,
    category: Option<String>,
) -> anyhow::Result<()> {
    let mut metadata = EntryMetadata::now();
    if let Some(category) = category {
        let category: MemoryCategory = category.parse().map_err(anyhow::Error::msg)?;
        metadata = metadata.with_category(category);
    }

    let created = store
        .store(&namespace, &key, parse_value(&value), metadata)
        .await?;
    let verb = if created { "Stored" } else { "Updated" };
    println!("{} {}/{}", verb.green(), namespace, key);
    Ok(())
}

/// Run list command
async fn run_list(store: Arc<JsonFileStore>, namespace: String) -> anyhow::Result<()> {
    let entries = store.list(&namespace).await?;
    if entries.is_empty() {
        println!("{}", "No memories found.".dimmed());
        return Ok(());
    }

    for entry in entries {
        let text = entry.text();
        let preview: String = text.chars().take(60).collect();
        println!(
            "{}  {}  {}",
            format_timestamp(entry.timestamp()),
            entry.key.white().bold(),
            preview.dimmed()
        );
    }
    Ok(())
}
