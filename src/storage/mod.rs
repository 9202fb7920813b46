//! Storage module for persisting crawl state
//!
//! This module handles all database operations for the engine, including:
//! - SQLite database initialization and schema management
//! - Prioritizer metadata and domain visit persistence
//! - Rate limiter profile persistence
//! - Scraper settings and page version history
//! - Run tracking

mod schema;
mod sqlite;
mod traits;

pub use sqlite::{SqliteArchive, SqliteStorage};
pub use traits::{Storage, StorageError, StorageResult};

use crate::DriftError;

use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(DriftError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, DriftError> {
    SqliteStorage::new(path)
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
