//! Engagement query CLI
//!
//! Seeds an in-memory engagement collection from a JSON array file and runs
//! a query, a subdomain check or a participant rollup against it.
//!
//! Usage:
//!   lodestar-query --data engagements.json query --search "state=active" --page 1 --per-page 10
//!   lodestar-query --data engagements.json subdomain env-one --exclude-uuid 1234
//!   lodestar-query --data engagements.json participants --search "customerName like acme"

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};

use lodestar::db::pipeline::SortOrder;
use lodestar::db::search::FilterSpec;
use lodestar::db::{EngagementRepository, MemoryDocumentStore};
use lodestar::services::EngagementService;
use lodestar::{config::Config, logging};

#[derive(Parser, Debug)]
#[clap(name = "lodestar-query")]
#[clap(about = "Query engagement documents with the Lodestar search grammar")]
struct Args {
    /// JSON file holding an array of engagement documents
    #[clap(short, long)]
    data: PathBuf,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a paged, filtered query
    Query(QueryArgs),
    /// Check whether a hosting subdomain is free
    Subdomain {
        subdomain: String,
        /// Engagement allowed to own the subdomain already
        #[clap(long)]
        exclude_uuid: Option<String>,
    },
    /// Count Red Hat and other participants
    Participants {
        #[clap(short, long)]
        search: Option<String>,
    },
}

#[derive(clap::Args, Debug)]
struct QueryArgs {
    #[clap(short, long)]
    search: Option<String>,

    #[clap(long)]
    page: Option<u32>,

    #[clap(long)]
    per_page: Option<u32>,

    /// Comma-separated sort fields
    #[clap(long)]
    sort_fields: Option<String>,

    /// ASC or DESC
    #[clap(long, default_value = "ASC")]
    sort_order: SortOrder,

    /// Comma-separated fields to include
    #[clap(long, conflicts_with = "exclude")]
    include: Option<String>,

    /// Comma-separated fields to exclude
    #[clap(long)]
    exclude: Option<String>,

    #[clap(long)]
    unwind: Option<String>,

    /// Comma-separated nested fields to flatten after unwinding
    #[clap(long, requires = "unwind")]
    unwind_project: Option<String>,

    #[clap(long)]
    group_by: Option<String>,
}

impl QueryArgs {
    fn into_filter(self) -> FilterSpec {
        FilterSpec {
            page: self.page,
            per_page: self.per_page,
            sort_fields: self.sort_fields,
            sort_order: self.sort_order,
            include: self.include.as_deref().map(split_set),
            exclude: self.exclude.as_deref().map(split_set),
            search: self.search,
            unwind_field_name: self.unwind,
            unwind_project_field_names: self.unwind_project,
            group_by_field_name: self.group_by,
        }
    }
}

fn split_set(raw: &str) -> std::collections::BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn load_documents(path: &Path) -> Result<Vec<serde_json::Map<String, JsonValue>>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: JsonValue = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    let JsonValue::Array(items) = value else {
        anyhow::bail!("{} must contain a JSON array", path.display());
    };
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            JsonValue::Object(map) => Ok(map),
            _ => anyhow::bail!("element {} of {} is not an object", i, path.display()),
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().context("Failed to load configuration")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;

    let _logging_guard =
        logging::init_logging(&config.logging).context("Failed to initialize logging")?;

    let documents = load_documents(&args.data)?;
    tracing::info!(
        documents = documents.len(),
        data = %args.data.display(),
        "Loaded engagement data"
    );

    let store = MemoryDocumentStore::with_documents(documents);
    let service = EngagementService::new(EngagementRepository::from_config(store, &config));

    let output = match args.command {
        Command::Query(query) => {
            let page = service
                .search(&query.into_filter())
                .await
                .context("Query failed")?;
            serde_json::to_value(page)?
        }
        Command::Subdomain {
            subdomain,
            exclude_uuid,
        } => {
            let available = service
                .is_subdomain_available(&subdomain, exclude_uuid.as_deref())
                .await
                .context("Subdomain check failed")?;
            serde_json::json!({ "subdomain": subdomain, "available": available })
        }
        Command::Participants { search } => {
            let spec = FilterSpec {
                search,
                ..Default::default()
            };
            let counts = service
                .participant_counts(&spec)
                .await
                .context("Participant rollup failed")?;
            serde_json::to_value(counts)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
