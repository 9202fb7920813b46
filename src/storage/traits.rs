//! Storage traits and error types
//!
//! Defines the trait interface for storage backends and the associated
//! error types.

use crate::limiter::ProfileRecord;
use crate::scoring::PageMetadata;
use crate::storage::{RunRecord, RunStatus};
use crate::versioning::{PageVersion, ScraperContentSettings};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Covers everything the engine persists between runs: run bookkeeping,
/// prioritizer metadata, rate limiter profiles, scraper settings, and page
/// version history.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new run in the Running state
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Updates the status of a run
    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Marks a run as completed with a finish timestamp
    fn complete_run(&mut self, run_id: i64) -> StorageResult<()>;

    // ===== Prioritizer State =====

    /// Replaces all stored page metadata with the given snapshot
    fn save_page_metadata(&mut self, pages: &[PageMetadata]) -> StorageResult<()>;

    /// Loads all stored page metadata
    fn load_page_metadata(&self) -> StorageResult<Vec<PageMetadata>>;

    /// Replaces all stored domain visit counts
    fn save_domain_visits(&mut self, visits: &HashMap<String, u32>) -> StorageResult<()>;

    /// Loads all stored domain visit counts
    fn load_domain_visits(&self) -> StorageResult<HashMap<String, u32>>;

    // ===== Rate Limiter State =====

    /// Replaces all stored site profiles
    fn save_site_profiles(&mut self, profiles: &[ProfileRecord]) -> StorageResult<()>;

    /// Loads all stored site profiles
    fn load_site_profiles(&self) -> StorageResult<Vec<ProfileRecord>>;

    // ===== Scraper Settings =====

    /// Inserts or replaces the settings for one scraper
    fn save_scraper_settings(&mut self, settings: &ScraperContentSettings) -> StorageResult<()>;

    /// Loads the settings for all scrapers
    fn load_scraper_settings(&self) -> StorageResult<Vec<ScraperContentSettings>>;

    // ===== Version History =====

    /// Replaces the stored history for one page
    ///
    /// # Arguments
    ///
    /// * `scraper_id` - The scraper owning the history
    /// * `url` - The page URL
    /// * `versions` - Complete history for the page, newest first
    fn replace_page_history(
        &mut self,
        scraper_id: &str,
        url: &str,
        versions: &[PageVersion],
    ) -> StorageResult<()>;

    /// Loads every stored version belonging to a scraper
    fn load_version_history(&self, scraper_id: &str) -> StorageResult<Vec<PageVersion>>;

    /// Loads all stored versions of a URL across scrapers, newest first
    fn version_history_for_url(&self, url: &str) -> StorageResult<Vec<PageVersion>>;

    // ===== Statistics =====

    /// Counts pages with stored metadata
    fn count_tracked_pages(&self) -> StorageResult<u64>;

    /// Counts domains with recorded visits
    fn count_unique_domains(&self) -> StorageResult<u64>;

    /// Sums visit counts across all domains
    fn total_domain_visits(&self) -> StorageResult<u64>;

    /// Counts stored page versions
    fn count_versions(&self) -> StorageResult<u64>;

    /// Counts pages with at least one stored version
    fn count_versioned_pages(&self) -> StorageResult<u64>;
}
