//! # Stock Lookup CLI (`stockbot`)
//!
//! ## Usage
//!
//! ```bash
//! stockbot --config ./config/stockbot.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `stockbot check` | Read the spreadsheet and print catalog counts |
//! | `stockbot search "<query>"` | One-shot lookup, prints one page of results |
//! | `stockbot serve` | Start the HTTP front end |
//!
//! Log verbosity follows `RUST_LOG` (default `info`). Logs go to stderr;
//! command output goes to stdout.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use stock_lookup::bot::page_reply;
use stock_lookup::config::{self, Config};
use stock_lookup::{ingest, server};
use stock_lookup_core::paginate::total_pages;
use stock_lookup_core::{render_page, search_with_mode, Catalog, CatalogHandle, SearchMode};

/// Warehouse stock lookup over an exported spreadsheet.
#[derive(Parser)]
#[command(name = "stockbot", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/stockbot.toml`.
    #[arg(long, global = true, default_value = "./config/stockbot.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the spreadsheet and serve the HTTP API.
    Serve,

    /// Search the spreadsheet once and print a page of results.
    Search {
        /// Codes and/or words, separated by spaces, commas or semicolons.
        query: String,

        /// Matching mode: `combined`, `code` or `name`.
        #[arg(long, default_value = "combined")]
        mode: String,

        /// One-based page number.
        #[arg(long, default_value_t = 1)]
        page: usize,
    },

    /// Read the spreadsheet and report what would be served.
    Check,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Search { query, mode, page } => {
            let mode: SearchMode = mode.parse().map_err(|e: String| anyhow::anyhow!(e))?;
            run_search(&cfg, &query, mode, page)?;
        }
        Commands::Check => {
            run_check(&cfg)?;
        }
    }

    Ok(())
}

fn load(cfg: &Config) -> anyhow::Result<Arc<Catalog>> {
    let normalizer = cfg.normalizer()?;
    let handle = CatalogHandle::new();
    let catalog = ingest::load_catalog(cfg, &handle, &normalizer)?;
    Ok(catalog)
}

fn run_search(cfg: &Config, query: &str, mode: SearchMode, page: usize) -> anyhow::Result<()> {
    if query.trim().is_empty() {
        anyhow::bail!("query must not be empty");
    }
    let catalog = load(cfg)?;
    let normalizer = cfg.normalizer()?;
    let results = search_with_mode(query, &catalog, &normalizer, mode);

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    let page_size = cfg.pagination.page_size;
    let pages = total_pages(results.len(), page_size);
    let index = page.clamp(1, pages) - 1;
    let rendered = render_page(results.records(), index, page_size)?;

    println!("{} result(s), page {}", results.len(), rendered.label);
    println!();
    println!("{}", page_reply(&rendered).text);
    Ok(())
}

fn run_check(cfg: &Config) -> anyhow::Result<()> {
    let catalog = load(cfg)?;
    let normalizer = cfg.normalizer()?;
    println!("Catalog: {}", cfg.catalog.path.display());
    println!("  records:      {}", catalog.len());
    println!("  in stock:     {}", catalog.in_stock_count());
    println!("  skipped rows: {}", catalog.skipped_rows());
    println!("  lemmatizer:   {}", normalizer.lemmatizer_name());
    println!("  page size:    {}", cfg.pagination.page_size);
    Ok(())
}
