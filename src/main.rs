//! Safarnama main entry point
//!
//! This is the command-line interface for the Safarnama site crawler.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use safarnama::config::{load_config, write_default_config, Config};
use safarnama::crawler::{HttpFetcher, SiteCrawler};
use safarnama::output::{load_statistics, print_statistics, write_sitemap};
use safarnama::storage::{open_storage, Storage};
use safarnama::{LlmClient, SafarnamaError, SearchClient};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Safarnama: a site crawler with content cleaning and LLM enrichment
///
/// Safarnama walks a site breadth-first, keeps a plain-text digest of every
/// page, and can ask a chat-completion endpoint for a summary and tags.
#[derive(Parser, Debug)]
#[command(name = "safarnama")]
#[command(version)]
#[command(about = "A breadth-first site crawler with LLM enrichment", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG", default_value = "safarnama.toml", global = true)]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Crawl from the seed URL, resuming pending URLs in the store
    Start {
        /// Seed URL (defaults to `base-url` from the config)
        #[arg(long)]
        seed: Option<String>,

        /// Maximum depth (defaults to `max-depth` from the config)
        #[arg(long)]
        max_depth: Option<u32>,

        /// Clear the store before crawling
        #[arg(long)]
        fresh: bool,
    },

    /// Check that the LLM endpoint answers
    TestLlm,

    /// Query the search pool
    Search {
        query: String,

        /// Crawl the returned URLs as depth-0 roots
        #[arg(long)]
        crawl: bool,
    },

    /// Show statistics from the database
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match cli.command {
        Command::Init { force } => {
            write_default_config(&cli.config, force)
                .with_context(|| format!("Cannot write {}", cli.config.display()))?;
            println!("✓ Default configuration written to {}", cli.config.display());
            Ok(())
        }
        Command::Start {
            seed,
            max_depth,
            fresh,
        } => handle_start(load(&cli.config)?, seed, max_depth, fresh).await,
        Command::TestLlm => handle_test_llm(&load(&cli.config)?).await,
        Command::Search { query, crawl } => handle_search(load(&cli.config)?, &query, crawl).await,
        Command::Stats => handle_stats(&load(&cli.config)?),
    }
}

/// Loads and validates the configuration file
fn load(path: &Path) -> anyhow::Result<Config> {
    tracing::info!("Loading configuration from: {}", path.display());
    load_config(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("safarnama=info,warn"),
            1 => EnvFilter::new("safarnama=debug,info"),
            2 => EnvFilter::new("safarnama=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Builds a crawler over the configured store, with enrichment when enabled
fn build_crawler(
    config: Config,
    fresh: bool,
) -> anyhow::Result<SiteCrawler<HttpFetcher, safarnama::SqliteStorage>> {
    let mut storage = open_storage(Path::new(&config.output.database_path))?;
    if fresh {
        tracing::info!("Starting fresh crawl (clearing previous state)");
        storage.clear()?;
    }

    let fetcher = HttpFetcher::new(&config.user_agent)?;
    let llm = if config.llm.enabled {
        Some(LlmClient::new(&config.llm, &config.user_agent.header_value())?)
    } else {
        None
    };

    let mut crawler = SiteCrawler::new(config, fetcher, storage)?;
    if let Some(llm) = llm {
        crawler = crawler.with_llm(llm);
    }

    let cancel = crawler.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current URL");
            cancel.cancel();
        }
    });

    Ok(crawler)
}

/// Runs the crawl, prints the summary and writes the sitemap
async fn handle_start(
    config: Config,
    seed: Option<String>,
    max_depth: Option<u32>,
    fresh: bool,
) -> anyhow::Result<()> {
    let seed = seed.unwrap_or_else(|| config.crawler.base_url.clone());
    let max_depth = max_depth.unwrap_or(config.crawler.max_depth);
    let output = config.output.clone();

    let mut crawler = build_crawler(config, fresh)?;
    let visited = match crawler.crawl(&seed, max_depth).await {
        Ok(visited) => visited,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            return Err(e.into());
        }
    };

    let counts = crawler.stats();
    crawler.close()?;

    println!(
        "✓ Crawl finished: {} fetched, {} failed, {} skipped ({} visited in total)",
        counts.fetched,
        counts.failed,
        counts.skipped,
        visited.len()
    );

    if output.generate_sitemap {
        write_sitemap(&visited, Path::new(&output.sitemap_path))
            .with_context(|| format!("Cannot write sitemap {}", output.sitemap_path))?;
        println!("✓ Sitemap written to {}", output.sitemap_path);
    }

    Ok(())
}

/// Reports LLM reachability and latency, or the failure kind
async fn handle_test_llm(config: &Config) -> anyhow::Result<()> {
    let client = LlmClient::new(&config.llm, &config.user_agent.header_value())?;
    println!("Testing LLM endpoint {} (model {})", client.endpoint(), config.llm.model);

    match client.ping().await {
        Ok(report) => {
            println!("✓ Reachable, answered in {:?}", report.latency);
            if let Some(reply) = report.reply {
                println!("  Reply: {}", reply.trim());
            }
            Ok(())
        }
        Err(e) => {
            println!("✗ {} failure: {}", e.kind(), e);
            bail!("LLM endpoint check failed")
        }
    }
}

/// Prints the serving instance and hits, optionally crawling them
async fn handle_search(config: Config, query: &str, crawl: bool) -> anyhow::Result<()> {
    let mut client = SearchClient::new(&config.search, &config.user_agent.header_value())?;

    let result = match client.search(query).await {
        Ok(result) => result,
        Err(e) => match SafarnamaError::from(e) {
            SafarnamaError::NoHealthyInstance { tried } => {
                println!("No search instance answered (tried {})", tried);
                return Ok(());
            }
            other => return Err(other.into()),
        },
    };

    println!("Served by {} ({} results)\n", result.instance, result.hits.len());
    for (i, hit) in result.hits.iter().enumerate() {
        println!("{:>3}. {}", i + 1, hit.title);
        println!("     {}", hit.url);
    }

    if !crawl || result.hits.is_empty() {
        return Ok(());
    }

    let max_depth = config.crawler.max_depth;
    let mut crawler = build_crawler(config, false)?;
    for url in result.urls() {
        match crawler.add_search_result(url) {
            Ok(_) => {}
            Err(SafarnamaError::Url(e)) => {
                tracing::warn!("Ignoring search result {}: {}", url, e);
            }
            Err(e) => return Err(e.into()),
        }
    }
    let visited = crawler.crawl_frontier(max_depth).await?;
    let counts = crawler.stats();
    crawler.close()?;

    println!(
        "\n✓ Crawl finished: {} fetched, {} failed, {} skipped ({} visited in total)",
        counts.fetched,
        counts.failed,
        counts.skipped,
        visited.len()
    );
    Ok(())
}

/// Shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);
    storage.close()?;

    Ok(())
}
