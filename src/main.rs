//! Catscrape main entry point
//!
//! This is the command-line interface for the Catscrape category image scraper.

use catscrape::config::{read_config_with_hash, validate, Config};
use catscrape::crawler::Coordinator;
use catscrape::output::print_report;
use catscrape::ConfigError;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit code for invalid arguments or configuration
const EXIT_INVALID_CONFIG: u8 = 2;

/// Exit code when nothing usable was collected or the results could not be written
const EXIT_FAILURE: u8 = 1;

/// Catscrape: a polite category-page image scraper
///
/// Catscrape walks the paginated listing pages of one or more storefront categories,
/// collects every image URL (lazy-loaded and responsive variants included),
/// deduplicates them and writes one URL per line to the output file.
#[derive(Parser, Debug)]
#[command(name = "catscrape")]
#[command(version)]
#[command(about = "A polite category-page image scraper", long_about = None)]
struct Cli {
    /// Category page URLs to start from (replace any seeds in the config file)
    #[arg(value_name = "SEEDS")]
    seeds: Vec<String>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Maximum number of pages fetched across all seeds [default: 500]
    #[arg(long, value_name = "N")]
    max_pages: Option<u32>,

    /// Maximum number of concurrent page fetches, 1-64 [default: 4]
    #[arg(long, value_name = "N")]
    concurrency: Option<u32>,

    /// Result file, one image URL per line [default: images.txt]
    #[arg(short, long, value_name = "PATH")]
    output: Option<String>,

    /// Total attempts per request, including the first [default: 3]
    #[arg(long, value_name = "N")]
    retries: Option<u32>,

    /// Per-attempt request timeout in milliseconds [default: 15000]
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Minimum delay between fetch starts in milliseconds [default: 0]
    #[arg(long, value_name = "MS")]
    delay_ms: Option<u64>,

    /// Abort the crawl after this many seconds, keeping partial results
    #[arg(long, value_name = "SECS")]
    deadline_secs: Option<u64>,

    /// Also download every image into this directory
    #[arg(long, value_name = "DIR")]
    download_dir: Option<String>,

    /// Do not fetch or honor robots.txt
    #[arg(long)]
    ignore_robots: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            eprintln!("error: {}", e);
            return ExitCode::from(EXIT_INVALID_CONFIG);
        }
    };

    if cli.dry_run {
        handle_dry_run(&config);
        return ExitCode::SUCCESS;
    }

    handle_crawl(config, cli.quiet).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catscrape=info,warn"),
            1 => EnvFilter::new("catscrape=debug,info"),
            2 => EnvFilter::new("catscrape=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads the config file (if any), applies command-line overrides and validates
fn build_config(cli: &Cli) -> Result<Config, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = read_config_with_hash(path)?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    if !cli.seeds.is_empty() {
        config.seeds = cli.seeds.clone();
    }
    if let Some(max_pages) = cli.max_pages {
        config.crawler.max_pages = max_pages;
    }
    if let Some(concurrency) = cli.concurrency {
        config.crawler.max_concurrency = concurrency;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.crawler.timeout_ms = timeout_ms;
    }
    if let Some(delay_ms) = cli.delay_ms {
        config.crawler.request_delay_ms = delay_ms;
    }
    if cli.deadline_secs.is_some() {
        config.crawler.deadline_secs = cli.deadline_secs;
    }
    if cli.ignore_robots {
        config.crawler.respect_robots = false;
    }
    if let Some(retries) = cli.retries {
        config.retry.max_attempts = retries;
    }
    if let Some(output) = &cli.output {
        config.output.path = output.clone();
    }
    if cli.download_dir.is_some() {
        config.output.download_dir = cli.download_dir.clone();
    }

    validate(&config)?;
    Ok(config)
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Catscrape Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max pages: {}", config.crawler.max_pages);
    println!("  Max concurrency: {}", config.crawler.max_concurrency);
    println!("  Request delay: {}ms", config.crawler.request_delay_ms);
    println!("  Timeout: {}ms", config.crawler.timeout_ms);
    match config.crawler.deadline_secs {
        Some(secs) => println!("  Deadline: {}s", secs),
        None => println!("  Deadline: none"),
    }
    println!("  Respect robots.txt: {}", config.crawler.respect_robots);

    println!("\nRetry Policy:");
    println!("  Max attempts: {}", config.retry.max_attempts);
    println!(
        "  Backoff: {}ms x {} (max {}ms)",
        config.retry.base_delay_ms, config.retry.backoff_factor, config.retry.max_delay_ms
    );

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Results: {}", config.output.path);
    if let Some(dir) = &config.output.download_dir {
        println!("  Downloads: {}", dir);
    }

    println!("\nSeeds ({}):", config.seeds.len());
    for seed in &config.seeds {
        println!("  - {}", seed);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, quiet: bool) -> ExitCode {
    let coordinator = match Coordinator::new(config) {
        Ok(coordinator) => coordinator,
        Err(e) => {
            tracing::error!("Failed to start crawl: {}", e);
            return ExitCode::from(EXIT_INVALID_CONFIG);
        }
    };

    let stop = coordinator.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight pages");
            stop.stop();
        }
    });

    match coordinator.run().await {
        Ok(report) => {
            if !quiet {
                print_report(&report);
            }
            if report.is_success() {
                ExitCode::SUCCESS
            } else {
                tracing::error!("Crawl finished without collecting any images");
                ExitCode::from(EXIT_FAILURE)
            }
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}
