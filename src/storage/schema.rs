//! Database schema definitions
//!
//! All SQL schema definitions for the driftwatch database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- Prioritizer metadata for visited pages
CREATE TABLE IF NOT EXISTS page_metadata (
    url TEXT PRIMARY KEY,
    content_length INTEGER NOT NULL DEFAULT 0,
    links_count INTEGER NOT NULL DEFAULT 0,
    last_visited_at TEXT NOT NULL,
    importance_score REAL NOT NULL DEFAULT 0,
    keywords TEXT NOT NULL DEFAULT ''
);

-- Visit counts per domain
CREATE TABLE IF NOT EXISTS domain_visits (
    domain TEXT PRIMARY KEY,
    visit_count INTEGER NOT NULL DEFAULT 0
);

-- Adaptive rate limiter profiles
CREATE TABLE IF NOT EXISTS site_profiles (
    domain TEXT PRIMARY KEY,
    requests_made INTEGER NOT NULL DEFAULT 0,
    average_response_time_ms INTEGER NOT NULL DEFAULT 0,
    current_delay_ms INTEGER NOT NULL,
    error_count INTEGER NOT NULL DEFAULT 0,
    success_count INTEGER NOT NULL DEFAULT 0,
    is_sensitive INTEGER NOT NULL DEFAULT 0
);

-- Per-scraper content tracking settings
CREATE TABLE IF NOT EXISTS scraper_settings (
    scraper_id TEXT PRIMARY KEY,
    scraper_name TEXT NOT NULL,
    max_versions_to_keep INTEGER NOT NULL,
    track_changes_history INTEGER NOT NULL DEFAULT 1,
    notify_on_changes INTEGER NOT NULL DEFAULT 0,
    notification_email TEXT
);

-- Stored page versions
CREATE TABLE IF NOT EXISTS page_versions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    scraper_id TEXT NOT NULL,
    url TEXT NOT NULL,
    content TEXT NOT NULL,
    text_content TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    version_date TEXT NOT NULL,
    change_from_previous TEXT NOT NULL,
    sections_added TEXT,
    sections_removed TEXT
);

CREATE INDEX IF NOT EXISTS idx_page_versions_page ON page_versions(scraper_id, url);
CREATE INDEX IF NOT EXISTS idx_page_versions_url ON page_versions(url);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_initializes() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        initialize_schema(&conn).unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        let tables = vec![
            "runs",
            "page_metadata",
            "domain_visits",
            "site_profiles",
            "scraper_settings",
            "page_versions",
        ];

        for table in tables {
            let count: i64 = conn
                .query_row(
                    &format!(
                        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='{}'",
                        table
                    ),
                    [],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }
}
