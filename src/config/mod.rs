//! Configuration module for Driftwatch
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use driftwatch::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Crawler will fetch up to {} pages", config.crawl.max_pages_per_run);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlConfig, LimiterConfig, OutputConfig, ScraperEntry, UserAgentConfig,
    VersioningConfig, DEFAULT_SCRAPER_ID,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
