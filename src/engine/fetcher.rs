//! HTTP fetch component
//!
//! The default url-processor. Drives the batch crawl loop for each seed:
//! pulls prioritized candidates, fetches them under per-domain admission
//! control and robots rules, reports every outcome back to the rate
//! limiter, and feeds extracted content into version tracking and the
//! metadata map.

use crate::config::UserAgentConfig;
use crate::engine::extractor::{extract_content, PageExtractor};
use crate::engine::{Capability, Component, EngineContext, EngineError};
use crate::robots::RobotsCache;
use crate::url::domain_of;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::any::Any;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

/// Crawl-delay length at which a domain is treated as rate-sensitive
const SENSITIVE_CRAWL_DELAY: Duration = Duration::from_secs(2);

/// Builds the shared HTTP client used by the fetch pipeline
///
/// The user agent string identifies the crawler and its operator so site
/// owners can reach out, following the common
/// `name/version (+url; email)` convention.
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// URL-processing component backed by reqwest
///
/// Holds per-run crawl state: the set of URLs already fetched and the page
/// budget counter. The HTTP client and robots cache are created during
/// engine initialization.
pub struct HttpFetcher {
    client: OnceLock<Client>,
    robots: OnceLock<Arc<RobotsCache>>,
    extractor: OnceLock<Option<Arc<PageExtractor>>>,
    visited: Mutex<HashSet<String>>,
    pages_fetched: Mutex<usize>,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: OnceLock::new(),
            robots: OnceLock::new(),
            extractor: OnceLock::new(),
            visited: Mutex::new(HashSet::new()),
            pages_fetched: Mutex::new(0),
        }
    }

    /// Number of pages fetched in the current run
    pub fn pages_fetched(&self) -> usize {
        *self.pages_fetched.lock().unwrap()
    }

    /// Records a URL as visited; false when it was already seen this run
    fn mark_visited(&self, url: &str) -> bool {
        self.visited.lock().unwrap().insert(url.to_string())
    }

    /// Claims one page of the run budget; false when the budget is spent
    fn try_claim_page(&self, budget: usize) -> bool {
        let mut fetched = self.pages_fetched.lock().unwrap();
        if *fetched >= budget {
            return false;
        }
        *fetched += 1;
        true
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Component for HttpFetcher {
    fn name(&self) -> &str {
        "http-fetcher"
    }

    fn capability(&self) -> Capability {
        Capability::UrlProcessor
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    async fn initialize(&self, ctx: &EngineContext) -> Result<(), EngineError> {
        let client = build_http_client(&ctx.config.user_agent).map_err(|e| {
            EngineError::ComponentInit {
                component: self.name().to_string(),
                reason: e.to_string(),
            }
        })?;

        let robots = RobotsCache::new(client.clone(), ctx.config.user_agent.crawler_name.clone());

        let extractor = ctx
            .component(Capability::ContentExtractor)
            .and_then(|component| component.as_any().downcast::<PageExtractor>().ok());
        if extractor.is_none() {
            debug!("No content-extractor component registered, using built-in extraction");
        }

        let _ = self.client.set(client);
        let _ = self.robots.set(Arc::new(robots));
        let _ = self.extractor.set(extractor);

        info!("HTTP fetcher initialized");
        Ok(())
    }

    async fn run_started(&self, _ctx: &EngineContext) -> Result<(), EngineError> {
        self.visited.lock().unwrap().clear();
        *self.pages_fetched.lock().unwrap() = 0;
        Ok(())
    }

    /// Crawls outward from one seed URL
    ///
    /// Batches are pulled from the prioritizer and fetched concurrently up
    /// to the configured limit. The loop ends when the candidate queue
    /// drains, the page budget is spent, or the run is cancelled.
    async fn process_url(&self, ctx: &EngineContext, url: &str) -> Result<(), EngineError> {
        let client = match self.client.get() {
            Some(client) => client.clone(),
            None => return Err(EngineError::NotInitialized(self.name().to_string())),
        };
        let robots = match self.robots.get() {
            Some(robots) => robots.clone(),
            None => return Err(EngineError::NotInitialized(self.name().to_string())),
        };
        let extractor = self.extractor.get().cloned().flatten();
        let scraper_id = ctx.config.scraper_for_seed(url).to_string();

        let budget = ctx.config.crawl.max_pages_per_run as usize;
        let batch_size = ctx.config.crawl.batch_size;
        let semaphore = Arc::new(Semaphore::new(
            ctx.config.crawl.max_concurrent_fetches as usize,
        ));

        ctx.prioritizer.enqueue(vec![url.to_string()]);

        loop {
            if ctx.is_cancelled() {
                info!("Cancellation requested, stopping crawl for seed {}", url);
                break;
            }
            if self.pages_fetched() >= budget {
                info!("Page budget of {} reached", budget);
                break;
            }

            let batch = ctx.prioritizer.next_batch(batch_size);
            if batch.is_empty() {
                debug!("Candidate queue drained for seed {}", url);
                break;
            }

            let mut handles = Vec::new();
            for candidate in batch {
                if !self.mark_visited(&candidate) {
                    continue;
                }
                if !self.try_claim_page(budget) {
                    break;
                }

                let task_semaphore = semaphore.clone();
                let task_ctx = ctx.clone();
                let task_client = client.clone();
                let task_robots = robots.clone();
                let task_extractor = extractor.clone();
                let task_scraper = scraper_id.clone();
                handles.push(tokio::spawn(async move {
                    let _permit = match task_semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => return Vec::new(),
                    };
                    fetch_one(
                        &task_ctx,
                        &task_client,
                        &task_robots,
                        task_extractor.as_deref(),
                        &task_scraper,
                        &candidate,
                    )
                    .await
                }));
            }

            for handle in handles {
                match handle.await {
                    Ok(links) => {
                        let fresh: Vec<String> = {
                            let visited = self.visited.lock().unwrap();
                            links
                                .into_iter()
                                .filter(|link| !visited.contains(link))
                                .collect()
                        };
                        if !fresh.is_empty() {
                            ctx.prioritizer.enqueue(fresh);
                        }
                    }
                    Err(e) => warn!("Fetch task panicked: {}", e),
                }
            }
        }

        Ok(())
    }

    async fn run_finished(&self, _ctx: &EngineContext) -> Result<(), EngineError> {
        info!("Fetched {} page(s) this run", self.pages_fetched());
        Ok(())
    }
}

/// Fetches a single URL and reports the outcome to the rate limiter
///
/// # Returns
/// The links discovered on the page; empty when the page was skipped or
/// the fetch failed.
async fn fetch_one(
    ctx: &EngineContext,
    client: &Client,
    robots: &RobotsCache,
    extractor: Option<&PageExtractor>,
    scraper_id: &str,
    url: &str,
) -> Vec<String> {
    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Skipping malformed URL {}: {}", url, e);
            return Vec::new();
        }
    };

    if !ctx.limiter.permit(url, ctx.cancellation()).await {
        debug!("Admission denied for {}, run is stopping", url);
        return Vec::new();
    }

    // Check robots.txt
    let rules = robots.rules_for(&parsed).await;
    let agent = robots.user_agent();
    if !rules.is_allowed(url, agent) {
        info!("URL {} disallowed by robots.txt", url);
        return Vec::new();
    }
    if let Some(delay) = rules.crawl_delay(agent) {
        if delay >= SENSITIVE_CRAWL_DELAY {
            if let Ok(domain) = domain_of(url) {
                ctx.limiter.mark_sensitive(&domain, true).await;
            }
        }
    }

    let started = Instant::now();
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => {
            warn!("Network error fetching {}: {}", url, e);
            ctx.limiter.report_server_error(url).await;
            return Vec::new();
        }
    };
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        warn!("Rate limited by {} (HTTP 429)", url);
        ctx.limiter.report_rate_limited(url).await;
        return Vec::new();
    }
    if status.is_server_error() {
        warn!("Server error {} for {}", status, url);
        ctx.limiter.report_server_error(url).await;
        return Vec::new();
    }
    if status.is_client_error() {
        debug!("Client error {} for {}", status, url);
        ctx.limiter.report_client_error(url).await;
        return Vec::new();
    }

    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            warn!("Failed to read body for {}: {}", url, e);
            ctx.limiter.report_server_error(url).await;
            return Vec::new();
        }
    };
    let elapsed = started.elapsed();

    let extracted = match extractor {
        Some(extractor) => extractor.extract(&body, &parsed),
        None => extract_content(&body, &parsed),
    };

    ctx.versions.track_version(url, &body, &extracted.text, scraper_id);
    ctx.prioritizer.record_visit(url, extracted.links.len(), &extracted.text);
    ctx.limiter.report_success(url, Some(elapsed)).await;

    debug!(
        "Fetched {} ({} bytes, {} links) in {:?}",
        url,
        body.len(),
        extracted.links.len(),
        elapsed
    );

    extracted.links
}
