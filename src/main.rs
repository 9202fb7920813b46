//! Driftwatch main entry point
//!
//! Command-line interface for the driftwatch change-tracking crawler.

use anyhow::Context;
use clap::Parser;
use driftwatch::config::{
    load_config_with_hash, Config, ScraperEntry, VersioningConfig, DEFAULT_SCRAPER_ID,
};
use driftwatch::engine::{EngineState, HttpFetcher, PageExtractor, ScraperEngine};
use driftwatch::limiter::AdaptiveRateLimiter;
use driftwatch::scoring::UrlPrioritizer;
use driftwatch::storage::{open_storage, RunStatus, SqliteArchive, Storage};
use driftwatch::versioning::{ChangeType, ContentVersionStore, ScraperContentSettings};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// Driftwatch: an adaptive change-tracking crawler
///
/// Driftwatch revisits configured sites, prioritizes the URLs most worth
/// fetching, adapts its request rate to how each domain responds, and keeps
/// a version history of every page so content changes are classified and
/// surfaced.
#[derive(Parser, Debug)]
#[command(name = "driftwatch")]
#[command(version = "1.0.0")]
#[command(about = "An adaptive change-tracking crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "history"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "history"])]
    stats: bool,

    /// Show the stored version history for a URL and exit
    #[arg(long, value_name = "URL", conflicts_with_all = ["dry_run", "stats"])]
    history: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if let Some(url) = cli.history.as_deref() {
        handle_history(&config, url)?;
    } else {
        handle_crawl(config, config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("driftwatch=info,warn"),
            1 => EnvFilter::new("driftwatch=debug,info"),
            2 => EnvFilter::new("driftwatch=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Driftwatch Dry Run ===\n");

    println!("Crawl:");
    println!(
        "  Max concurrent fetches: {}",
        config.crawl.max_concurrent_fetches
    );
    println!("  Max pages per run: {}", config.crawl.max_pages_per_run);
    println!("  Batch size: {}", config.crawl.batch_size);

    println!("\nRate limiting:");
    println!(
        "  Delay bounds: {}ms .. {}ms",
        config.limiter.min_delay_ms, config.limiter.max_delay_ms
    );
    println!("  Default delay: {}ms", config.limiter.default_delay_ms);
    println!(
        "  Sensitive-domain floor: {}ms",
        config.limiter.sensitive_delay_ms
    );
    match config.limiter.requests_per_minute {
        Some(rpm) => println!("  Global rate: {} requests/minute", rpm),
        None => println!("  Global rate: adaptive (no fixed cap)"),
    }

    println!("\nVersioning defaults:");
    println!(
        "  Versions kept per page: {}",
        config.versioning.max_versions_to_keep
    );
    println!(
        "  History persistence: {}",
        if config.versioning.track_changes_history {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!(
        "  Change notifications: {}",
        if config.versioning.notify_on_changes {
            "enabled"
        } else {
            "disabled"
        }
    );

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\nScrapers ({}):", config.scraper.len());
    for entry in &config.scraper {
        println!("  - {} ({} seeds)", entry.display_name(), entry.seeds.len());
        for seed in &entry.seeds {
            println!("    * {}", seed);
        }
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would crawl {} seed URLs",
        config.seed_urls().len()
    );
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))
        .context("Failed to open database")?;

    println!("Tracked pages:    {}", storage.count_tracked_pages()?);
    println!("Unique domains:   {}", storage.count_unique_domains()?);
    println!("Domain visits:    {}", storage.total_domain_visits()?);
    println!("Stored versions:  {}", storage.count_versions()?);
    println!("Versioned pages:  {}", storage.count_versioned_pages()?);

    if let Some(run) = storage.get_latest_run()? {
        println!("\nLatest run (id {}):", run.id);
        println!("  Started:  {}", run.started_at);
        println!(
            "  Finished: {}",
            run.finished_at.as_deref().unwrap_or("-")
        );
        println!("  Status:   {}", run.status.to_db_string());
    }

    Ok(())
}

/// Handles the --history mode: prints the stored version history of a URL
fn handle_history(config: &Config, url: &str) -> anyhow::Result<()> {
    let storage = open_storage(Path::new(&config.output.database_path))
        .context("Failed to open database")?;

    let versions = storage.version_history_for_url(url)?;
    if versions.is_empty() {
        println!("No stored versions for {}", url);
        return Ok(());
    }

    println!("{} stored version(s) for {}\n", versions.len(), url);
    for version in &versions {
        let change = match version.change_from_previous {
            ChangeType::None => "First".to_string(),
            other => other.to_string(),
        };
        let hash = version.content_hash.get(..12).unwrap_or(&version.content_hash);
        println!(
            "  {}  {:<8}  hash {}",
            version.version_date.format("%Y-%m-%d %H:%M:%S"),
            change,
            hash
        );
        if let Some(sections) = &version.changed_sections {
            if let Some(added) = &sections.added {
                println!("      added: {} byte(s)", added.len());
            }
            if let Some(removed) = &sections.removed {
                println!("      removed: {} byte(s)", removed.len());
            }
        }
    }

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: String) -> anyhow::Result<()> {
    let storage = open_storage(Path::new(&config.output.database_path))
        .context("Failed to open database")?;
    let storage = Arc::new(Mutex::new(storage));

    // Restore prioritizer state from previous runs
    let prioritizer = Arc::new(UrlPrioritizer::new());
    {
        let store = storage.lock().unwrap();
        let pages = store.load_page_metadata()?;
        let visits = store.load_domain_visits()?;
        if !pages.is_empty() || !visits.is_empty() {
            tracing::info!(
                "Restoring {} page(s) and {} domain(s) from previous runs",
                pages.len(),
                visits.len()
            );
        }
        prioritizer.load_metadata(pages);
        prioritizer.load_domain_visits(visits);
    }

    // Restore rate limiter profiles
    let limiter = Arc::new(AdaptiveRateLimiter::new(config.limiter.clone()));
    {
        let profiles = storage.lock().unwrap().load_site_profiles()?;
        if !profiles.is_empty() {
            tracing::info!("Restoring {} site profile(s)", profiles.len());
        }
        limiter.load_profiles(profiles);
    }
    if let Some(rpm) = config.limiter.requests_per_minute {
        limiter.set_global_rate(rpm).await;
    }

    // Version store persists through the same database
    let archive = Arc::new(SqliteArchive::new(storage.clone()));
    let versions = Arc::new(ContentVersionStore::with_archive(archive));

    // Register every configured scraper identity plus the fallback
    for entry in &config.scraper {
        let settings = scraper_settings_from(entry, &config.versioning);
        storage.lock().unwrap().save_scraper_settings(&settings)?;
        versions.register_scraper(settings);
    }
    let fallback = default_scraper_settings(&config.versioning);
    storage.lock().unwrap().save_scraper_settings(&fallback)?;
    versions.register_scraper(fallback);

    // Assemble the engine around the restored services
    let engine = Arc::new(ScraperEngine::with_services(
        Arc::new(config),
        prioritizer.clone(),
        limiter.clone(),
        versions.clone(),
    ));
    engine.register(Arc::new(PageExtractor::new()))?;
    engine.register(Arc::new(HttpFetcher::new()))?;

    let run_id = storage.lock().unwrap().create_run(&config_hash)?;
    tracing::info!("Run {} started", run_id);

    // Ctrl-C becomes a cooperative cancel
    let signal_engine = engine.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping run");
            signal_engine.cancel().await;
        }
    });

    let run_result = engine.run().await;
    let final_state = engine.state();

    // Surface recorded change notifications
    let notifications = versions.pending_notifications();
    if !notifications.is_empty() {
        tracing::info!("{} change notification(s) this run", notifications.len());
        for notification in &notifications {
            tracing::info!("[{}] {}", notification.scraper_name, notification.summary);
        }
    }

    // Persist service state even when the run was cancelled
    let snapshot = prioritizer.snapshot();
    let profiles = limiter.export_profiles().await;
    {
        let mut store = storage.lock().unwrap();
        store.save_page_metadata(&snapshot.pages)?;
        store.save_domain_visits(&snapshot.domain_visits)?;
        store.save_site_profiles(&profiles)?;
    }
    tracing::info!(
        "Persisted {} page(s), {} domain(s), {} site profile(s)",
        snapshot.pages.len(),
        snapshot.domain_visits.len(),
        profiles.len()
    );

    let outcome = match &run_result {
        Ok(()) if final_state == EngineState::Stopped => {
            storage
                .lock()
                .unwrap()
                .update_run_status(run_id, RunStatus::Interrupted)?;
            tracing::warn!("Run {} interrupted", run_id);
            Ok(())
        }
        Ok(()) => {
            storage.lock().unwrap().complete_run(run_id)?;
            tracing::info!("Run {} completed", run_id);
            Ok(())
        }
        Err(e) => {
            storage
                .lock()
                .unwrap()
                .update_run_status(run_id, RunStatus::Failed)?;
            tracing::error!("Run {} failed: {}", run_id, e);
            Err(anyhow::anyhow!("Run failed: {}", e))
        }
    };

    engine.dispose().await;
    outcome
}

/// Merges per-scraper overrides over the global versioning defaults
fn scraper_settings_from(
    entry: &ScraperEntry,
    defaults: &VersioningConfig,
) -> ScraperContentSettings {
    ScraperContentSettings {
        scraper_id: entry.id.clone(),
        scraper_name: entry.display_name().to_string(),
        max_versions_to_keep: entry
            .max_versions_to_keep
            .unwrap_or(defaults.max_versions_to_keep) as usize,
        track_changes_history: entry
            .track_changes_history
            .unwrap_or(defaults.track_changes_history),
        notify_on_changes: entry
            .notify_on_changes
            .unwrap_or(defaults.notify_on_changes),
        notification_email: entry
            .notification_email
            .clone()
            .or_else(|| defaults.notification_email.clone()),
    }
}

/// Settings for URLs no configured scraper claims
fn default_scraper_settings(defaults: &VersioningConfig) -> ScraperContentSettings {
    ScraperContentSettings {
        scraper_id: DEFAULT_SCRAPER_ID.to_string(),
        scraper_name: DEFAULT_SCRAPER_ID.to_string(),
        max_versions_to_keep: defaults.max_versions_to_keep as usize,
        track_changes_history: defaults.track_changes_history,
        notify_on_changes: defaults.notify_on_changes,
        notification_email: defaults.notification_email.clone(),
    }
}
