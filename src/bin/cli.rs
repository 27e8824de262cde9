//! Sitemap Digest CLI
//!
//! Local execution entry point: one-off digests, the scheduler, and
//! inspection of the sitemap and snapshot.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use sitemap_digest::{
    config,
    delivery::{ConsoleNotifier, Notifier},
    error::Result,
    models::Config,
    pipeline::DigestPipeline,
    scheduler::DigestScheduler,
    services::SitemapResolver,
    storage::{LocalSnapshotStore, MemorySnapshotStore, SnapshotStore},
    utils::http::{Fetcher, HttpFetcher},
};

/// Pages listed before `resolve` summarizes the rest.
const RESOLVE_PREVIEW: usize = 10;

/// Sitemap Digest - new and changed pages from a website sitemap
#[derive(Parser, Debug)]
#[command(
    name = "sitemap-digest",
    version,
    about = "Compiles digests of new and changed pages from a website sitemap"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build one digest now and print it
    Run {
        /// Do not write the snapshot
        #[arg(long)]
        dry_run: bool,

        /// Also deliver the digest to this channel
        #[arg(long)]
        channel: Option<String>,
    },

    /// Run the scheduler until interrupted
    Serve,

    /// List the pages a sitemap resolves to
    Resolve {
        /// Sitemap URL (default: source.sitemap_url from the config)
        url: Option<String>,
    },

    /// Validate the configuration
    Validate,

    /// Show current snapshot info
    Info,
}

/// Initialize logging based on verbosity flag and configured level.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn http_fetcher(config: &Config) -> Result<Arc<dyn Fetcher>> {
    Ok(Arc::new(HttpFetcher::from_config(&config.crawler)?))
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load_config(&cli.config);
    init_logging(cli.verbose, &config.logging.level);

    log::info!("Sitemap digest starting...");

    match cli.command {
        Command::Run { dry_run, channel } => {
            config.validate()?;
            let disk = LocalSnapshotStore::new(&config.storage.snapshot_path);
            let store: Arc<dyn SnapshotStore> = if dry_run {
                log::info!("Dry run: snapshot will not be written");
                Arc::new(MemorySnapshotStore::with_snapshot(disk.load().await).read_only())
            } else {
                Arc::new(disk)
            };

            let pipeline = DigestPipeline::new(&config, http_fetcher(&config)?, store)?;
            let outcome = pipeline.run().await?;
            let chunks = outcome.message.chunks(&config.delivery);

            match channel {
                Some(channel) if outcome.has_new_content() => {
                    ConsoleNotifier.deliver(&channel, &chunks).await?;
                }
                _ => {
                    for chunk in &chunks {
                        println!("{}\n", chunk);
                    }
                }
            }
        }

        Command::Serve => {
            config.validate()?;
            let store = Arc::new(LocalSnapshotStore::new(&config.storage.snapshot_path));
            let pipeline = Arc::new(DigestPipeline::new(&config, http_fetcher(&config)?, store)?);

            let scheduler = DigestScheduler::start(
                pipeline,
                Arc::new(ConsoleNotifier),
                config.digest.clone(),
                config.delivery.clone(),
            );

            tokio::signal::ctrl_c().await?;
            log::info!("Interrupted");

            let status = scheduler.handle().status().await;
            log::info!("Completed {} run(s)", status.runs_completed);
            scheduler.shutdown().await;
        }

        Command::Resolve { url } => {
            let url = url.unwrap_or_else(|| config.source.sitemap_url.clone());
            if url.trim().is_empty() {
                return Err(sitemap_digest::error::AppError::config(
                    "No sitemap URL given and source.sitemap_url is not set",
                ));
            }

            let resolver = SitemapResolver::new(http_fetcher(&config)?, &config.crawler);
            let pages = resolver.resolve(url.trim()).await?;

            println!("Found {} pages in {}", pages.len(), url.trim());
            for page in pages.iter().take(RESOLVE_PREVIEW) {
                println!("  {}  [{}]", page.url, page.fingerprint);
            }
            if pages.len() > RESOLVE_PREVIEW {
                println!("  ... and {} more", pages.len() - RESOLVE_PREVIEW);
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK (sitemap: {})", config.source.sitemap_url);
        }

        Command::Info => {
            let store = LocalSnapshotStore::new(&config.storage.snapshot_path);
            log::info!("Snapshot: {}", store.location());

            match store.last_updated().await {
                Some(updated) => {
                    log::info!("Pages tracked: {}", store.load().await.len());
                    log::info!("Last updated: {}", updated);
                }
                None if store.path().exists() => {
                    log::info!("Pages tracked: {}", store.load().await.len());
                    log::info!("Last updated: unknown");
                }
                None => log::info!("No snapshot found yet."),
            }
        }
    }

    Ok(())
}
