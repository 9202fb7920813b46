//! Driftwatch: adaptive crawl control with content change tracking
//!
//! This crate implements the control core of a polite-but-persistent scraper:
//! URL prioritization, per-domain adaptive rate limiting, content versioning
//! with change classification, and an orchestration engine that sequences
//! pluggable components through crawl runs.

pub mod config;
pub mod engine;
pub mod limiter;
pub mod robots;
pub mod scoring;
pub mod storage;
pub mod url;
pub mod versioning;

use thiserror::Error;

/// Main error type for Driftwatch operations
#[derive(Debug, Error)]
pub enum DriftError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Engine error: {0}")]
    Engine(#[from] engine::EngineError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for Driftwatch operations
pub type Result<T> = std::result::Result<T, DriftError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use engine::{Capability, Component, EngineContext, EngineError, ScraperEngine};
pub use limiter::AdaptiveRateLimiter;
pub use scoring::{UrlPrioritizer, UrlScore};
pub use url::{domain_of, extract_domain};
pub use versioning::{ChangeType, ContentVersionStore};
