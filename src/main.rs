//! Listing-Trawl main entry point
//!
//! This is the command-line interface for the Listing-Trawl harvester.

use anyhow::Context;
use clap::Parser;
use listing_trawl::config::{load_config_with_hash, validate, Config};
use listing_trawl::crawler::Pipeline;
use listing_trawl::output::{load_statistics, print_run_report, print_statistics};
use listing_trawl::storage::SqliteStore;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Config file used when none is given and it exists
const DEFAULT_CONFIG: &str = "trawl.toml";

/// Listing-Trawl: a concurrent job listing harvester
///
/// Discovers detail pages across paginated search results, scrapes them into
/// CSV, JSON and SQLite, and archives a bounded sample of raw pages.
#[derive(Parser, Debug)]
#[command(name = "listing-trawl")]
#[command(version = "1.0.0")]
#[command(about = "A concurrent job listing harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults to ./trawl.toml, then built-in defaults)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the harvest plan without fetching anything
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = load(cli.config.as_deref());
    let log_file = loaded
        .as_ref()
        .ok()
        .and_then(|(config, _)| config.logging.file.clone());
    setup_logging(cli.verbose, cli.quiet, log_file.as_deref());

    let outcome = match loaded {
        Ok((config, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            run(&cli, config, hash).await
        }
        Err(e) => Err(e),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Unexpected error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Loads the configuration and its hash
fn load(path: Option<&Path>) -> anyhow::Result<(Config, String)> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None if Path::new(DEFAULT_CONFIG).exists() => PathBuf::from(DEFAULT_CONFIG),
        None => {
            let config = Config::default();
            validate(&config).context("built-in defaults are invalid")?;
            return Ok((config, "defaults".to_string()));
        }
    };

    load_config_with_hash(&path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

async fn run(cli: &Cli, config: Config, hash: String) -> anyhow::Result<()> {
    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }
    if cli.stats {
        return handle_stats(&config);
    }

    tracing::info!(
        "Harvesting up to {} listings across {} search terms",
        config.pipeline.target_jobs,
        config.site.search_terms.len()
    );

    let summary = Pipeline::new(config, hash)
        .run()
        .await
        .context("Harvest run failed")?;
    print_run_report(&summary);
    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// With a log file configured, records go to the file instead of stderr.
fn setup_logging(verbose: u8, quiet: bool, file: Option<&Path>) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("listing_trawl=info,warn"),
            1 => EnvFilter::new("listing_trawl=debug,info"),
            2 => EnvFilter::new("listing_trawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);

    let opened = file.map(|path| OpenOptions::new().create(true).append(true).open(path));
    match opened {
        Some(Ok(handle)) => builder.with_ansi(false).with_writer(Mutex::new(handle)).init(),
        Some(Err(e)) => {
            builder.with_writer(std::io::stderr).init();
            tracing::warn!("Could not open log file, logging to stderr: {}", e);
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
}

/// Handles the --dry-run mode: validates config and shows the harvest plan
fn handle_dry_run(config: &Config) {
    println!("=== Listing-Trawl Dry Run ===\n");

    let pipeline = &config.pipeline;
    println!("Pipeline:");
    println!("  Target jobs: {}", pipeline.target_jobs);
    println!("  Archive cap: {}", pipeline.archive_cap);
    println!(
        "  Workers: {} discoverers, {} scrapers, {} archivers",
        pipeline.discoverer_workers, pipeline.scraper_workers, pipeline.archiver_workers
    );
    println!(
        "  Batch size: {} (idle flush after {}ms)",
        pipeline.batch_size, pipeline.idle_flush_ms
    );

    let fetch = &config.fetch;
    println!("\nFetching:");
    println!(
        "  Attempts: {}, backoff base {}ms",
        fetch.max_retries, fetch.backoff_base_ms
    );
    println!(
        "  Delay between search pages: {}-{}ms",
        fetch.min_delay_ms, fetch.max_delay_ms
    );
    println!("  User agents: {}", fetch.user_agents.len());
    if let Some(proxy) = &fetch.render_proxy {
        println!(
            "  Render proxy: {} (key from ${})",
            proxy.endpoint, proxy.api_key_env
        );
    }

    println!("\nSite:");
    println!("  Search URL: {}", config.site.search_url);
    println!("  Detail links: {}", config.site.detail_link_selector);
    println!("\nSearch Terms ({}):", config.site.search_terms.len());
    for term in &config.site.search_terms {
        println!("  - {}", term);
    }

    let output = &config.output;
    println!("\nOutput:");
    println!("  CSV: {}", output.csv_path().display());
    println!("  JSON: {}", output.json_path().display());
    println!("  Database: {}", output.database_path().display());
    println!("  Raw pages: {}", output.html_path().display());
    println!("  Archive: {}", output.archive_path().display());

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let path = config.output.database_path();
    println!("Database: {}\n", path.display());

    if !path.exists() {
        println!("No harvest has been recorded yet.");
        return Ok(());
    }

    let store = SqliteStore::open(&path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let stats = load_statistics(&store)?;
    print_statistics(&stats);

    Ok(())
}
