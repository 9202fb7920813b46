//! Per-origin robots.txt caching and retrieval

use crate::robots::ParsedRobots;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;
use url::Url;

/// A cached rules entry along with its fetch time
struct CacheEntry {
    rules: Arc<ParsedRobots>,
    fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    fn new(rules: Arc<ParsedRobots>) -> Self {
        Self {
            rules,
            fetched_at: Utc::now(),
        }
    }

    /// Entries older than 24 hours are refetched
    fn is_stale(&self) -> bool {
        Utc::now() - self.fetched_at > Duration::hours(24)
    }
}

/// Fetches and caches robots.txt rules per origin
///
/// Rules are fetched at most once per origin per 24 hours. Any fetch
/// problem, including a missing file, degrades to permissive rules so an
/// unreachable robots.txt never blocks a crawl.
pub struct RobotsCache {
    client: Client,
    user_agent: String,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl RobotsCache {
    /// Creates a cache that fetches through the given client
    ///
    /// # Arguments
    ///
    /// * `client` - Shared HTTP client
    /// * `user_agent` - Product token matched against robots.txt groups
    pub fn new(client: Client, user_agent: impl Into<String>) -> Self {
        Self {
            client,
            user_agent: user_agent.into(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The product token used for rule matching
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Returns the rules governing the given URL, fetching them if needed
    pub async fn rules_for(&self, url: &Url) -> Arc<ParsedRobots> {
        if url.scheme() != "http" && url.scheme() != "https" {
            return Arc::new(ParsedRobots::permissive());
        }
        let origin = url.origin().ascii_serialization();

        {
            let entries = self.entries.read().unwrap();
            if let Some(entry) = entries.get(&origin) {
                if !entry.is_stale() {
                    return entry.rules.clone();
                }
            }
        }

        // Concurrent fetches for the same origin may race; last write wins
        let rules = Arc::new(self.fetch_rules(&origin).await);
        self.entries
            .write()
            .unwrap()
            .insert(origin, CacheEntry::new(rules.clone()));
        rules
    }

    /// Number of origins with cached rules
    pub fn origin_count(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    async fn fetch_rules(&self, origin: &str) -> ParsedRobots {
        let robots_url = format!("{}/robots.txt", origin);
        match self.client.get(&robots_url).send().await {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(body) => {
                    debug!("Fetched robots.txt for {} ({} bytes)", origin, body.len());
                    ParsedRobots::parse(&body)
                }
                Err(e) => {
                    debug!("Could not read robots.txt body for {}: {}", origin, e);
                    ParsedRobots::permissive()
                }
            },
            Ok(response) => {
                debug!(
                    "No usable robots.txt for {} (status {}), allowing all",
                    origin,
                    response.status()
                );
                ParsedRobots::permissive()
            }
            Err(e) => {
                debug!("Could not fetch robots.txt for {}: {}", origin, e);
                ParsedRobots::permissive()
            }
        }
    }
}
