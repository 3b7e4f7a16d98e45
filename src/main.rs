//! Shelf-Tracker main entry point
//!
//! This is the command-line interface for the Shelf-Tracker price monitor.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shelf_tracker::api::{self, AppState, CrawlLauncher, ProcessLauncher, TaskLauncher};
use shelf_tracker::config::{compute_config_hash, load_config_with_hash, parse_config, Config};
use shelf_tracker::crawler::{run_crawl, CrawlOptions};
use shelf_tracker::output::{load_statistics, print_crawl_summary, print_products, print_statistics};
use shelf_tracker::storage::{SqliteStorage, Storage};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Shelf-Tracker: a multi-retailer price monitor
///
/// Shelf-Tracker walks retailer search and category listings, visits product pages,
/// extracts prices and stores the results for the query API.
#[derive(Parser, Debug)]
#[command(name = "shelf-tracker")]
#[command(version)]
#[command(about = "A multi-retailer price monitor", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (built-in defaults when omitted)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one crawl session
    Crawl {
        /// Retailer identifier (heb, soriana, walmart, or a configured row)
        #[arg(long)]
        store: String,

        /// Search terms, comma separated
        #[arg(long, allow_hyphen_values = true)]
        query: Option<String>,

        /// Listing page to start from (repeatable)
        #[arg(long = "category-url", value_name = "URL")]
        category_urls: Vec<Url>,

        /// Product page to extract directly, bypassing listings (repeatable)
        #[arg(long = "product-url", value_name = "URL")]
        product_urls: Vec<Url>,

        /// Maximum records to emit; 0 is unbounded
        #[arg(long)]
        max_products: Option<usize>,

        /// Maximum listing pages to fetch
        #[arg(long)]
        max_pages: Option<usize>,
    },

    /// Serve the query API and crawl trigger
    Serve {
        /// Address to listen on (overrides the configuration)
        #[arg(long)]
        bind: Option<SocketAddr>,

        /// Run triggered crawls as tasks in this process instead of child processes
        #[arg(long)]
        in_process: bool,
    },

    /// Print stored products, newest first
    Products {
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show statistics from the database
    Stats,

    /// Validate the configuration and print the retailer table
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (config, config_hash) = load(cli.config.as_deref())?;

    match cli.command {
        Command::Crawl {
            store,
            query,
            category_urls,
            product_urls,
            max_products,
            max_pages,
        } => {
            let options = CrawlOptions {
                store,
                query,
                category_urls,
                product_urls,
                max_products,
                max_pages,
            };
            handle_crawl(&config, &config_hash, options).await
        }
        Command::Serve { bind, in_process } => {
            handle_serve(config, config_hash, cli.config, bind, in_process).await
        }
        Command::Products { limit } => handle_products(&config, limit),
        Command::Stats => handle_stats(&config),
        Command::CheckConfig => handle_check_config(&config, &config_hash),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("shelf_tracker=info,warn"),
            1 => EnvFilter::new("shelf_tracker=debug,info"),
            2 => EnvFilter::new("shelf_tracker=trace,debug"),
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

/// Loads the configuration file, or the validated defaults when none is given
fn load(path: Option<&Path>) -> Result<(Config, String)> {
    match path {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            Ok((config, hash))
        }
        None => {
            tracing::debug!("No configuration file given, using defaults");
            let config = parse_config("").context("Invalid default configuration")?;
            Ok((config, compute_config_hash("")))
        }
    }
}

fn open_storage(config: &Config) -> Result<SqliteStorage> {
    SqliteStorage::new(Path::new(&config.output.database_path))
        .with_context(|| format!("Failed to open database {}", config.output.database_path))
}

/// Handles the crawl command
async fn handle_crawl(config: &Config, config_hash: &str, options: CrawlOptions) -> Result<()> {
    let store = options.store.clone();

    match run_crawl(config, config_hash, options).await {
        Ok(summary) => {
            tracing::info!("Crawl completed ({} records emitted)", summary.report.emitted);
            print_crawl_summary(&summary);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e).with_context(|| format!("Crawl of {} failed", store))
        }
    }
}

/// Handles the serve command
async fn handle_serve(
    config: Config,
    config_hash: String,
    config_path: Option<PathBuf>,
    bind: Option<SocketAddr>,
    in_process: bool,
) -> Result<()> {
    let addr = match bind {
        Some(addr) => addr,
        None => config
            .api
            .bind
            .parse()
            .with_context(|| format!("Invalid bind address {}", config.api.bind))?,
    };

    let storage = Arc::new(Mutex::new(open_storage(&config)?));
    let retailers = Arc::new(config.retailer_table()?);
    let default_max_products = config.crawler.default_max_products;

    let launcher: Arc<dyn CrawlLauncher> = if in_process {
        tracing::info!("Triggered crawls run in-process");
        Arc::new(TaskLauncher::new(
            Arc::new(config),
            config_hash,
            Arc::clone(&storage),
        ))
    } else {
        Arc::new(ProcessLauncher::current_exe(config_path)?)
    };

    let state = AppState {
        storage,
        retailers,
        launcher,
        default_max_products,
    };

    api::bind_and_serve(addr, state)
        .await
        .context("Query API server failed")
}

/// Handles the products command
fn handle_products(config: &Config, limit: Option<usize>) -> Result<()> {
    let storage = open_storage(config)?;
    let products = match limit {
        Some(limit) => storage.list_products_limited(limit)?,
        None => storage.list_products()?,
    };

    print_products(&products);
    Ok(())
}

/// Handles the stats command
fn handle_stats(config: &Config) -> Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(config)?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the check-config command: validates the configuration and shows the retailers
fn handle_check_config(config: &Config, config_hash: &str) -> Result<()> {
    let table = config.retailer_table()?;

    println!("=== Shelf-Tracker Configuration ===\n");

    println!("Crawler:");
    println!("  Global concurrency: {}", config.crawler.global_concurrency);
    println!(
        "  Per-domain concurrency: {}",
        config.crawler.per_domain_concurrency
    );
    println!("  Download delay: {}ms", config.crawler.download_delay_ms);
    println!(
        "  Default max products: {}",
        config.crawler.default_max_products
    );

    println!("\nFetch:");
    println!("  User agent: {}", config.fetch.user_agent);
    println!("  Timeout: {}s", config.fetch.timeout_secs);
    println!("  Retries: {}", config.fetch.retry_times);
    println!("  Obey robots.txt: {}", config.fetch.obey_robots);
    println!(
        "  Render endpoint: {}",
        config.fetch.render_endpoint.as_deref().unwrap_or("(none)")
    );

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  API bind: {}", config.api.bind);

    println!("\nRetailers ({}):", table.ids().len());
    for retailer in table.iter() {
        let row = retailer.config();
        println!(
            "  - {}{}: {} link selectors, {} price selectors, {} category URLs",
            row.id,
            if row.requires_rendering {
                " (rendered)"
            } else {
                ""
            },
            row.link_selectors.len(),
            row.price_selectors.len(),
            row.category_urls.len()
        );
        if let Some(template) = &row.base_search_url_template {
            println!("    search: {}", template);
        }
    }

    println!("\n✓ Configuration is valid (hash: {})", config_hash);

    Ok(())
}
