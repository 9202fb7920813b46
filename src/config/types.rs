use serde::Deserialize;
use std::time::Duration;

/// Scraper identity used for seeds that no `[[scraper]]` entry claims
pub const DEFAULT_SCRAPER_ID: &str = "default";

/// Main configuration structure for Driftwatch
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub limiter: LimiterConfig,
    #[serde(default)]
    pub versioning: VersioningConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub scraper: Vec<ScraperEntry>,
}

/// Crawl loop behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Maximum number of concurrent page fetches
    #[serde(rename = "max-concurrent-fetches")]
    pub max_concurrent_fetches: u32,

    /// Maximum number of pages fetched in a single run
    #[serde(rename = "max-pages-per-run")]
    pub max_pages_per_run: u32,

    /// How many URLs the prioritizer hands out per batch
    #[serde(rename = "batch-size")]
    pub batch_size: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: 4,
            max_pages_per_run: 50,
            batch_size: 10,
        }
    }
}

/// Adaptive rate limiter bounds
///
/// All values are in milliseconds. Delays for every domain are clamped to
/// `[min-delay-ms, max-delay-ms]` no matter what the adaptive feedback does.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
    /// Lower bound for any per-domain delay
    #[serde(rename = "min-delay-ms")]
    pub min_delay_ms: u64,

    /// Upper bound for any per-domain delay
    #[serde(rename = "max-delay-ms")]
    pub max_delay_ms: u64,

    /// Starting delay for a domain that has no history yet
    #[serde(rename = "default-delay-ms")]
    pub default_delay_ms: u64,

    /// Floor applied to domains marked sensitive
    #[serde(rename = "sensitive-delay-ms")]
    pub sensitive_delay_ms: u64,

    /// Optional global request budget applied at startup
    #[serde(rename = "requests-per-minute")]
    pub requests_per_minute: Option<u32>,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 500,
            max_delay_ms: 10_000,
            default_delay_ms: 1_000,
            sensitive_delay_ms: 2_000,
            requests_per_minute: None,
        }
    }
}

impl LimiterConfig {
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn default_delay(&self) -> Duration {
        Duration::from_millis(self.default_delay_ms)
    }

    pub fn sensitive_delay(&self) -> Duration {
        Duration::from_millis(self.sensitive_delay_ms)
    }
}

/// Version tracking defaults
///
/// These apply to every scraper identity that does not override them in its
/// own `[[scraper]]` entry, including the fallback `default` identity.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VersioningConfig {
    /// How many versions to retain per (scraper, URL) pair
    #[serde(rename = "max-versions-to-keep")]
    pub max_versions_to_keep: u32,

    /// Whether version history is persisted to the database
    #[serde(rename = "track-changes-history")]
    pub track_changes_history: bool,

    /// Whether Moderate/Major changes enqueue a notification
    #[serde(rename = "notify-on-changes")]
    pub notify_on_changes: bool,

    /// Destination address for change notifications
    #[serde(rename = "notification-email")]
    pub notification_email: Option<String>,
}

impl Default for VersioningConfig {
    fn default() -> Self {
        Self {
            max_versions_to_keep: 5,
            track_changes_history: true,
            notify_on_changes: false,
            notification_email: None,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Scraper identity with its seed URLs and optional versioning overrides
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperEntry {
    /// Stable identifier for this scraper (alphanumeric, hyphens, underscores)
    pub id: String,

    /// Human-readable name; defaults to the id
    #[serde(default)]
    pub name: Option<String>,

    /// List of seed URLs this scraper starts from
    pub seeds: Vec<String>,

    /// Override for `[versioning] max-versions-to-keep`
    #[serde(rename = "max-versions-to-keep")]
    pub max_versions_to_keep: Option<u32>,

    /// Override for `[versioning] track-changes-history`
    #[serde(rename = "track-changes-history")]
    pub track_changes_history: Option<bool>,

    /// Override for `[versioning] notify-on-changes`
    #[serde(rename = "notify-on-changes")]
    pub notify_on_changes: Option<bool>,

    /// Override for `[versioning] notification-email`
    #[serde(rename = "notification-email")]
    pub notification_email: Option<String>,
}

impl ScraperEntry {
    /// Returns the human-readable name, falling back to the id
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

impl Config {
    /// Resolves the scraper identity that owns a seed URL
    ///
    /// Returns the id of the first `[[scraper]]` entry listing the URL among
    /// its seeds, or [`DEFAULT_SCRAPER_ID`] when no entry claims it.
    pub fn scraper_for_seed(&self, url: &str) -> &str {
        self.scraper
            .iter()
            .find(|entry| entry.seeds.iter().any(|seed| seed == url))
            .map(|entry| entry.id.as_str())
            .unwrap_or(DEFAULT_SCRAPER_ID)
    }

    /// Returns all configured seed URLs across every scraper entry, in order
    pub fn seed_urls(&self) -> Vec<&str> {
        self.scraper
            .iter()
            .flat_map(|entry| entry.seeds.iter().map(String::as_str))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scraper_entry(id: &str, seeds: &[&str]) -> ScraperEntry {
        ScraperEntry {
            id: id.to_string(),
            name: None,
            seeds: seeds.iter().map(|s| s.to_string()).collect(),
            max_versions_to_keep: None,
            track_changes_history: None,
            notify_on_changes: None,
            notification_email: None,
        }
    }

    fn config_with_scrapers(scrapers: Vec<ScraperEntry>) -> Config {
        Config {
            crawl: CrawlConfig::default(),
            limiter: LimiterConfig::default(),
            versioning: VersioningConfig::default(),
            user_agent: UserAgentConfig {
                crawler_name: "test".to_string(),
                crawler_version: "0.1".to_string(),
                contact_url: "https://example.com/bot".to_string(),
                contact_email: "bot@example.com".to_string(),
            },
            output: OutputConfig {
                database_path: "./test.db".to_string(),
            },
            scraper: scrapers,
        }
    }

    #[test]
    fn test_limiter_defaults() {
        let limiter = LimiterConfig::default();
        assert_eq!(limiter.min_delay(), Duration::from_millis(500));
        assert_eq!(limiter.max_delay(), Duration::from_secs(10));
        assert_eq!(limiter.default_delay(), Duration::from_secs(1));
        assert_eq!(limiter.sensitive_delay(), Duration::from_secs(2));
        assert!(limiter.requests_per_minute.is_none());
    }

    #[test]
    fn test_versioning_defaults() {
        let versioning = VersioningConfig::default();
        assert_eq!(versioning.max_versions_to_keep, 5);
        assert!(versioning.track_changes_history);
        assert!(!versioning.notify_on_changes);
    }

    #[test]
    fn test_scraper_for_seed_matches_entry() {
        let config = config_with_scrapers(vec![
            scraper_entry("docs", &["https://docs.example.com/"]),
            scraper_entry("news", &["https://news.example.com/"]),
        ]);

        assert_eq!(
            config.scraper_for_seed("https://news.example.com/"),
            "news"
        );
    }

    #[test]
    fn test_scraper_for_seed_falls_back_to_default() {
        let config = config_with_scrapers(vec![scraper_entry(
            "docs",
            &["https://docs.example.com/"],
        )]);

        assert_eq!(
            config.scraper_for_seed("https://other.example.com/"),
            DEFAULT_SCRAPER_ID
        );
    }

    #[test]
    fn test_seed_urls_preserves_order() {
        let config = config_with_scrapers(vec![
            scraper_entry("a", &["https://a.example.com/", "https://a.example.com/x"]),
            scraper_entry("b", &["https://b.example.com/"]),
        ]);

        assert_eq!(
            config.seed_urls(),
            vec![
                "https://a.example.com/",
                "https://a.example.com/x",
                "https://b.example.com/"
            ]
        );
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        let mut entry = scraper_entry("docs", &["https://docs.example.com/"]);
        assert_eq!(entry.display_name(), "docs");

        entry.name = Some("Docs watcher".to_string());
        assert_eq!(entry.display_name(), "Docs watcher");
    }
}
