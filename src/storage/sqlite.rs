//! SQLite storage implementation
//!
//! Provides the SQLite-based implementation of the Storage trait, plus the
//! archive adapter that lets the version store persist through it.

use crate::limiter::ProfileRecord;
use crate::scoring::PageMetadata;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus};
use crate::versioning::{
    ArchiveError, ChangeType, ChangedSections, PageVersion, ScraperContentSettings, VersionArchive,
};
use crate::DriftError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(DriftError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, DriftError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, DriftError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let mut stmt = self.conn.prepare(
            "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
        )?;

        let run = stmt
            .query_row(params![run_id], |row| {
                Ok(RunRecord {
                    id: row.get(0)?,
                    started_at: row.get(1)?,
                    finished_at: row.get(2)?,
                    config_hash: row.get(3)?,
                    status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
                        .unwrap_or(RunStatus::Running),
                })
            })
            .map_err(|_| StorageError::RunNotFound(run_id))?;

        Ok(run)
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
        )?;

        let run = stmt
            .query_row([], |row| {
                Ok(RunRecord {
                    id: row.get(0)?,
                    started_at: row.get(1)?,
                    finished_at: row.get(2)?,
                    config_hash: row.get(3)?,
                    status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
                        .unwrap_or(RunStatus::Running),
                })
            })
            .optional()?;

        Ok(run)
    }

    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE runs SET status = ?1 WHERE id = ?2",
            params![status.to_db_string(), run_id],
        )?;
        Ok(())
    }

    fn complete_run(&mut self, run_id: i64) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![RunStatus::Completed.to_db_string(), now, run_id],
        )?;
        Ok(())
    }

    // ===== Prioritizer State =====

    fn save_page_metadata(&mut self, pages: &[PageMetadata]) -> StorageResult<()> {
        // Clear existing metadata, insert the current snapshot in one transaction
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM page_metadata", [])?;

        for page in pages {
            tx.execute(
                "INSERT INTO page_metadata
                 (url, content_length, links_count, last_visited_at, importance_score, keywords)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    page.url,
                    page.content_length as i64,
                    page.links_count as i64,
                    page.last_visited_at.to_rfc3339(),
                    page.importance_score,
                    page.keywords.join(","),
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn load_page_metadata(&self) -> StorageResult<Vec<PageMetadata>> {
        let mut stmt = self.conn.prepare(
            "SELECT url, content_length, links_count, last_visited_at, importance_score, keywords
             FROM page_metadata",
        )?;

        let pages = stmt
            .query_map([], |row| {
                let visited_str: String = row.get(3)?;
                let last_visited_at = visited_str.parse::<DateTime<Utc>>().map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        3,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                let keywords_str: String = row.get(5)?;
                let keywords = if keywords_str.is_empty() {
                    Vec::new()
                } else {
                    keywords_str.split(',').map(str::to_string).collect()
                };

                Ok(PageMetadata {
                    url: row.get(0)?,
                    content_length: row.get::<_, i64>(1)? as usize,
                    links_count: row.get::<_, i64>(2)? as usize,
                    last_visited_at,
                    importance_score: row.get(4)?,
                    keywords,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(pages)
    }

    fn save_domain_visits(&mut self, visits: &HashMap<String, u32>) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM domain_visits", [])?;

        for (domain, count) in visits {
            tx.execute(
                "INSERT INTO domain_visits (domain, visit_count) VALUES (?1, ?2)",
                params![domain, count],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn load_domain_visits(&self) -> StorageResult<HashMap<String, u32>> {
        let mut stmt = self
            .conn
            .prepare("SELECT domain, visit_count FROM domain_visits")?;

        let mut visits = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
        })?;

        for row in rows {
            let (domain, count) = row?;
            visits.insert(domain, count);
        }

        Ok(visits)
    }

    // ===== Rate Limiter State =====

    fn save_site_profiles(&mut self, profiles: &[ProfileRecord]) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM site_profiles", [])?;

        for profile in profiles {
            let is_sensitive_int = if profile.is_sensitive { 1 } else { 0 };
            tx.execute(
                "INSERT INTO site_profiles
                 (domain, requests_made, average_response_time_ms, current_delay_ms,
                  error_count, success_count, is_sensitive)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    profile.domain,
                    profile.requests_made,
                    profile.average_response_time_ms as i64,
                    profile.current_delay_ms as i64,
                    profile.error_count,
                    profile.success_count,
                    is_sensitive_int,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn load_site_profiles(&self) -> StorageResult<Vec<ProfileRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT domain, requests_made, average_response_time_ms, current_delay_ms,
             error_count, success_count, is_sensitive
             FROM site_profiles",
        )?;

        let profiles = stmt
            .query_map([], |row| {
                Ok(ProfileRecord {
                    domain: row.get(0)?,
                    requests_made: row.get(1)?,
                    average_response_time_ms: row.get::<_, i64>(2)? as u64,
                    current_delay_ms: row.get::<_, i64>(3)? as u64,
                    error_count: row.get(4)?,
                    success_count: row.get(5)?,
                    is_sensitive: row.get::<_, i32>(6)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(profiles)
    }

    // ===== Scraper Settings =====

    fn save_scraper_settings(&mut self, settings: &ScraperContentSettings) -> StorageResult<()> {
        let track_int = if settings.track_changes_history { 1 } else { 0 };
        let notify_int = if settings.notify_on_changes { 1 } else { 0 };

        self.conn.execute(
            "INSERT OR REPLACE INTO scraper_settings
             (scraper_id, scraper_name, max_versions_to_keep, track_changes_history,
              notify_on_changes, notification_email)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                settings.scraper_id,
                settings.scraper_name,
                settings.max_versions_to_keep as i64,
                track_int,
                notify_int,
                settings.notification_email,
            ],
        )?;

        Ok(())
    }

    fn load_scraper_settings(&self) -> StorageResult<Vec<ScraperContentSettings>> {
        let mut stmt = self.conn.prepare(
            "SELECT scraper_id, scraper_name, max_versions_to_keep, track_changes_history,
             notify_on_changes, notification_email
             FROM scraper_settings",
        )?;

        let settings = stmt
            .query_map([], |row| {
                Ok(ScraperContentSettings {
                    scraper_id: row.get(0)?,
                    scraper_name: row.get(1)?,
                    max_versions_to_keep: row.get::<_, i64>(2)? as usize,
                    track_changes_history: row.get::<_, i32>(3)? != 0,
                    notify_on_changes: row.get::<_, i32>(4)? != 0,
                    notification_email: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(settings)
    }

    // ===== Version History =====

    fn replace_page_history(
        &mut self,
        scraper_id: &str,
        url: &str,
        versions: &[PageVersion],
    ) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM page_versions WHERE scraper_id = ?1 AND url = ?2",
            params![scraper_id, url],
        )?;

        for version in versions {
            let (added, removed) = match &version.changed_sections {
                Some(sections) => (sections.added.clone(), sections.removed.clone()),
                None => (None, None),
            };

            tx.execute(
                "INSERT INTO page_versions
                 (scraper_id, url, content, text_content, content_hash, version_date,
                  change_from_previous, sections_added, sections_removed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    version.scraper_id,
                    version.url,
                    version.content,
                    version.text_content,
                    version.content_hash,
                    version.version_date.to_rfc3339(),
                    version.change_from_previous.to_db_string(),
                    added,
                    removed,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn load_version_history(&self, scraper_id: &str) -> StorageResult<Vec<PageVersion>> {
        let mut stmt = self.conn.prepare(
            "SELECT scraper_id, url, content, text_content, content_hash, version_date,
             change_from_previous, sections_added, sections_removed
             FROM page_versions WHERE scraper_id = ?1
             ORDER BY version_date DESC",
        )?;

        let versions = stmt
            .query_map(params![scraper_id], |row| {
                let date_str: String = row.get(5)?;
                let version_date = date_str.parse::<DateTime<Utc>>().map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        5,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                let added: Option<String> = row.get(7)?;
                let removed: Option<String> = row.get(8)?;
                let changed_sections = if added.is_some() || removed.is_some() {
                    Some(ChangedSections { added, removed })
                } else {
                    None
                };

                Ok(PageVersion {
                    scraper_id: row.get(0)?,
                    url: row.get(1)?,
                    content: row.get(2)?,
                    text_content: row.get(3)?,
                    content_hash: row.get(4)?,
                    version_date,
                    change_from_previous: ChangeType::from_db_string(&row.get::<_, String>(6)?)
                        .unwrap_or(ChangeType::None),
                    changed_sections,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(versions)
    }

    fn version_history_for_url(&self, url: &str) -> StorageResult<Vec<PageVersion>> {
        let mut stmt = self.conn.prepare(
            "SELECT scraper_id, url, content, text_content, content_hash, version_date,
             change_from_previous, sections_added, sections_removed
             FROM page_versions WHERE url = ?1
             ORDER BY version_date DESC",
        )?;

        let versions = stmt
            .query_map(params![url], |row| {
                let date_str: String = row.get(5)?;
                let version_date = date_str.parse::<DateTime<Utc>>().map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        5,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                let added: Option<String> = row.get(7)?;
                let removed: Option<String> = row.get(8)?;
                let changed_sections = if added.is_some() || removed.is_some() {
                    Some(ChangedSections { added, removed })
                } else {
                    None
                };

                Ok(PageVersion {
                    scraper_id: row.get(0)?,
                    url: row.get(1)?,
                    content: row.get(2)?,
                    text_content: row.get(3)?,
                    content_hash: row.get(4)?,
                    version_date,
                    change_from_previous: ChangeType::from_db_string(&row.get::<_, String>(6)?)
                        .unwrap_or(ChangeType::None),
                    changed_sections,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(versions)
    }

    // ===== Statistics =====

    fn count_tracked_pages(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM page_metadata", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_unique_domains(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM domain_visits", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn total_domain_visits(&self) -> StorageResult<u64> {
        // SUM is NULL on an empty table
        let total: Option<i64> =
            self.conn
                .query_row("SELECT SUM(visit_count) FROM domain_visits", [], |row| {
                    row.get(0)
                })?;
        Ok(total.unwrap_or(0) as u64)
    }

    fn count_versions(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM page_versions", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_versioned_pages(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM (SELECT DISTINCT scraper_id, url FROM page_versions)",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

/// Version archive backed by a shared SQLite storage handle
///
/// Bridges the version store's archive trait onto the Storage trait so page
/// histories survive restarts.
pub struct SqliteArchive {
    storage: Arc<Mutex<SqliteStorage>>,
}

impl SqliteArchive {
    /// Creates an archive over the given storage handle
    pub fn new(storage: Arc<Mutex<SqliteStorage>>) -> Self {
        Self { storage }
    }
}

impl VersionArchive for SqliteArchive {
    fn save_history(
        &self,
        scraper_id: &str,
        url: &str,
        versions: &[PageVersion],
    ) -> Result<(), ArchiveError> {
        self.storage
            .lock()
            .unwrap()
            .replace_page_history(scraper_id, url, versions)
            .map_err(|e| ArchiveError(e.to_string()))
    }

    fn load_history(&self, scraper_id: &str) -> Result<Vec<PageVersion>, ArchiveError> {
        self.storage
            .lock()
            .unwrap()
            .load_version_history(scraper_id)
            .map_err(|e| ArchiveError(e.to_string()))
    }
}
