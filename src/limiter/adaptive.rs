use crate::config::LimiterConfig;
use crate::limiter::profile::{ProfileRecord, SiteProfile};
use crate::url::domain_of;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Gates outbound requests against per-domain adaptive delays
///
/// Each domain gets a lazily created [`SiteProfile`] behind its own async
/// lock. [`permit`](AdaptiveRateLimiter::permit) holds that lock across the
/// admission wait, so same-domain callers are admitted strictly one at a
/// time while unrelated domains never wait on each other.
///
/// All public methods degrade instead of failing: a malformed URL is logged
/// and answered with a safe default, and a cancelled wait reports "not
/// granted". Rate limiting is never the reason a crawl run aborts.
pub struct AdaptiveRateLimiter {
    config: LimiterConfig,
    profiles: StdMutex<HashMap<String, Arc<Mutex<SiteProfile>>>>,
}

impl Default for AdaptiveRateLimiter {
    fn default() -> Self {
        Self::new(LimiterConfig::default())
    }
}

impl AdaptiveRateLimiter {
    /// Creates a limiter with the given delay bounds
    pub fn new(config: LimiterConfig) -> Self {
        Self {
            config,
            profiles: StdMutex::new(HashMap::new()),
        }
    }

    /// Asks permission to send a request to the URL's domain
    ///
    /// Suspends until the domain's delay has elapsed since its previous
    /// request. The very first request to a domain is never delayed.
    ///
    /// # Returns
    ///
    /// * `true` - The request may proceed
    /// * `false` - The wait was cancelled
    ///
    /// A URL whose domain cannot be resolved is logged and admitted
    /// immediately; scoring out bad URLs is not this component's job.
    pub async fn permit(&self, url: &str, cancel: &CancellationToken) -> bool {
        let domain = match domain_of(url) {
            Ok(domain) => domain,
            Err(e) => {
                tracing::warn!("Rate limiter admitting unresolvable URL '{}': {}", url, e);
                return true;
            }
        };

        if cancel.is_cancelled() {
            return false;
        }

        let profile = self.profile_handle(&domain);
        // Held across the wait: same-domain admissions are strictly ordered
        let mut profile = profile.lock().await;

        let wait = profile.wait_required(Instant::now());
        if !wait.is_zero() {
            tracing::trace!("Delaying request to {} by {:?}", domain, wait);
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = cancel.cancelled() => {
                    tracing::debug!("Admission wait for {} cancelled", domain);
                    return false;
                }
            }
        }

        profile.record_request(Instant::now());
        true
    }

    /// Reports a successful response, with its latency when measured
    pub async fn report_success(&self, url: &str, response_time: Option<Duration>) {
        let domain = match domain_of(url) {
            Ok(domain) => domain,
            Err(e) => {
                tracing::warn!("Ignoring success report for '{}': {}", url, e);
                return;
            }
        };

        let profile = self.profile_handle(&domain);
        let mut profile = profile.lock().await;
        profile.record_success(response_time, &self.config);
    }

    /// Reports an HTTP 429 from the URL's domain
    pub async fn report_rate_limited(&self, url: &str) {
        let domain = match domain_of(url) {
            Ok(domain) => domain,
            Err(e) => {
                tracing::warn!("Ignoring rate-limit report for '{}': {}", url, e);
                return;
            }
        };

        let profile = self.profile_handle(&domain);
        let mut profile = profile.lock().await;
        profile.record_rate_limited(&self.config);
        tracing::info!(
            "Rate limited by {}, delay raised to {:?}",
            domain,
            profile.current_delay
        );
    }

    /// Reports a server error (5xx or network failure) from the URL's domain
    pub async fn report_server_error(&self, url: &str) {
        let domain = match domain_of(url) {
            Ok(domain) => domain,
            Err(e) => {
                tracing::warn!("Ignoring server-error report for '{}': {}", url, e);
                return;
            }
        };

        let profile = self.profile_handle(&domain);
        let mut profile = profile.lock().await;
        profile.record_server_error(&self.config);
        tracing::debug!(
            "Server error from {}, delay raised to {:?}",
            domain,
            profile.current_delay
        );
    }

    /// Reports a client error (4xx other than 429) from the URL's domain
    pub async fn report_client_error(&self, url: &str) {
        let domain = match domain_of(url) {
            Ok(domain) => domain,
            Err(e) => {
                tracing::warn!("Ignoring client-error report for '{}': {}", url, e);
                return;
            }
        };

        let profile = self.profile_handle(&domain);
        let mut profile = profile.lock().await;
        profile.record_client_error(&self.config);
    }

    /// Marks a domain as sensitive, forcing the sensitive delay floor
    ///
    /// Creates the profile if the domain has not been seen yet, so a
    /// robots.txt crawl delay can take effect before the first request.
    pub async fn mark_sensitive(&self, domain: &str, sensitive: bool) {
        let profile = self.profile_handle(domain);
        let mut profile = profile.lock().await;
        profile.set_sensitive(sensitive, &self.config);

        if sensitive {
            tracing::debug!(
                "Domain {} marked sensitive, delay now {:?}",
                domain,
                profile.current_delay
            );
        }
    }

    /// Applies a global request budget to every known domain
    ///
    /// Each existing profile's delay becomes `60000 / requests_per_minute`
    /// milliseconds, clamped to the configured bounds and to the sensitive
    /// floor where it applies. A rate of zero is logged and ignored.
    pub async fn set_global_rate(&self, requests_per_minute: u32) {
        if requests_per_minute == 0 {
            tracing::warn!("Ignoring global rate of 0 requests per minute");
            return;
        }

        let per_request = Duration::from_millis(60_000 / requests_per_minute as u64);
        let handles: Vec<Arc<Mutex<SiteProfile>>> = {
            let profiles = self.profiles.lock().unwrap();
            profiles.values().cloned().collect()
        };

        let domain_count = handles.len();
        for handle in handles {
            let mut profile = handle.lock().await;
            profile.apply_global_rate(per_request, &self.config);
        }

        tracing::info!(
            "Applied global rate of {} requests/minute across {} domains",
            requests_per_minute,
            domain_count
        );
    }

    /// Returns the current delay for a domain, if a profile exists
    pub async fn current_delay(&self, domain: &str) -> Option<Duration> {
        let handle = {
            let profiles = self.profiles.lock().unwrap();
            profiles.get(domain).cloned()
        };

        match handle {
            Some(handle) => Some(handle.lock().await.current_delay),
            None => None,
        }
    }

    /// Returns a copy of a domain's profile, if one exists
    pub async fn profile(&self, domain: &str) -> Option<SiteProfile> {
        let handle = {
            let profiles = self.profiles.lock().unwrap();
            profiles.get(domain).cloned()
        };

        match handle {
            Some(handle) => Some(handle.lock().await.clone()),
            None => None,
        }
    }

    /// Exports every profile for persistence
    pub async fn export_profiles(&self) -> Vec<ProfileRecord> {
        let handles: Vec<Arc<Mutex<SiteProfile>>> = {
            let profiles = self.profiles.lock().unwrap();
            profiles.values().cloned().collect()
        };

        let mut records = Vec::with_capacity(handles.len());
        for handle in handles {
            records.push(handle.lock().await.to_record());
        }
        records
    }

    /// Restores profiles from persisted records, replacing by domain
    pub fn load_profiles(&self, records: Vec<ProfileRecord>) {
        let mut profiles = self.profiles.lock().unwrap();
        for record in records {
            let profile = SiteProfile::from_record(record, &self.config);
            profiles.insert(
                profile.domain.clone(),
                Arc::new(Mutex::new(profile)),
            );
        }
    }

    /// Number of domains with a profile
    pub fn domain_count(&self) -> usize {
        self.profiles.lock().unwrap().len()
    }

    fn profile_handle(&self, domain: &str) -> Arc<Mutex<SiteProfile>> {
        let mut profiles = self.profiles.lock().unwrap();
        profiles
            .entry(domain.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(SiteProfile::new(domain, &self.config))))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_permit_is_immediate() {
        let limiter = AdaptiveRateLimiter::default();
        let cancel = CancellationToken::new();

        let start = Instant::now();
        assert!(limiter.permit("http://a.example/x", &cancel).await);
        assert!(start.elapsed() < Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_permit_waits_current_delay() {
        let limiter = AdaptiveRateLimiter::default();
        let cancel = CancellationToken::new();

        let start = Instant::now();
        assert!(limiter.permit("http://a.example/x", &cancel).await);
        assert!(limiter.permit("http://a.example/x", &cancel).await);

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(990));
        assert!(elapsed <= Duration::from_millis(1100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_domains_do_not_wait_on_each_other() {
        let limiter = AdaptiveRateLimiter::default();
        let cancel = CancellationToken::new();

        let start = Instant::now();
        assert!(limiter.permit("http://a.example/x", &cancel).await);
        assert!(limiter.permit("http://b.example/y", &cancel).await);

        assert!(start.elapsed() < Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_domain_callers_are_serialized() {
        let limiter = Arc::new(AdaptiveRateLimiter::default());
        let cancel = CancellationToken::new();

        let start = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..3 {
            let limiter = Arc::clone(&limiter);
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                limiter.permit("http://a.example/x", &cancel).await
            }));
        }

        for handle in handles {
            assert!(handle.await.unwrap());
        }

        // First caller is free, the other two wait one delay each
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1990));
        assert!(elapsed <= Duration::from_millis(2200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permit_malformed_url_is_admitted() {
        let limiter = AdaptiveRateLimiter::default();
        let cancel = CancellationToken::new();

        assert!(limiter.permit("not a url", &cancel).await);
        assert_eq!(limiter.domain_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permit_cancelled_before_wait() {
        let limiter = AdaptiveRateLimiter::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(!limiter.permit("http://a.example/x", &cancel).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permit_cancelled_during_wait() {
        let limiter = Arc::new(AdaptiveRateLimiter::default());
        let cancel = CancellationToken::new();

        assert!(limiter.permit("http://a.example/x", &cancel).await);

        let waiting = {
            let limiter = Arc::clone(&limiter);
            let cancel = cancel.clone();
            tokio::spawn(async move { limiter.permit("http://a.example/x", &cancel).await })
        };

        // Let the second caller reach its admission wait, then cancel
        tokio::task::yield_now().await;
        cancel.cancel();

        assert!(!waiting.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_rate_limited_doubles_delay() {
        let limiter = AdaptiveRateLimiter::default();

        limiter.report_rate_limited("http://a.example/x").await;
        assert_eq!(
            limiter.current_delay("a.example").await,
            Some(Duration::from_secs(2))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reports_for_malformed_urls_are_ignored() {
        let limiter = AdaptiveRateLimiter::default();

        limiter.report_success("not a url", None).await;
        limiter.report_rate_limited("not a url").await;
        limiter.report_server_error("not a url").await;
        limiter.report_client_error("not a url").await;

        assert_eq!(limiter.domain_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mark_sensitive_creates_profile() {
        let limiter = AdaptiveRateLimiter::default();

        limiter.mark_sensitive("slow.example", true).await;
        assert_eq!(
            limiter.current_delay("slow.example").await,
            Some(Duration::from_secs(2))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_global_rate_applies_to_existing_domains() {
        let limiter = AdaptiveRateLimiter::default();
        let cancel = CancellationToken::new();

        assert!(limiter.permit("http://a.example/x", &cancel).await);
        assert!(limiter.permit("http://b.example/y", &cancel).await);

        // 30 requests/minute = 2000ms between requests
        limiter.set_global_rate(30).await;
        assert_eq!(
            limiter.current_delay("a.example").await,
            Some(Duration::from_secs(2))
        );
        assert_eq!(
            limiter.current_delay("b.example").await,
            Some(Duration::from_secs(2))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_global_rate_respects_sensitive_floor() {
        let limiter = AdaptiveRateLimiter::default();
        let cancel = CancellationToken::new();

        assert!(limiter.permit("http://fast.example/x", &cancel).await);
        limiter.mark_sensitive("slow.example", true).await;

        // 600 requests/minute = 100ms, below every floor
        limiter.set_global_rate(600).await;

        assert_eq!(
            limiter.current_delay("fast.example").await,
            Some(Duration::from_millis(500))
        );
        assert_eq!(
            limiter.current_delay("slow.example").await,
            Some(Duration::from_secs(2))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_global_rate_zero_is_ignored() {
        let limiter = AdaptiveRateLimiter::default();
        let cancel = CancellationToken::new();

        assert!(limiter.permit("http://a.example/x", &cancel).await);
        limiter.set_global_rate(0).await;

        assert_eq!(
            limiter.current_delay("a.example").await,
            Some(Duration::from_secs(1))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_export_and_load_profiles() {
        let limiter = AdaptiveRateLimiter::default();
        let cancel = CancellationToken::new();

        assert!(limiter.permit("http://a.example/x", &cancel).await);
        limiter
            .report_success("http://a.example/x", Some(Duration::from_millis(120)))
            .await;

        let records = limiter.export_profiles().await;
        assert_eq!(records.len(), 1);

        let restored = AdaptiveRateLimiter::default();
        restored.load_profiles(records);

        let profile = restored.profile("a.example").await.unwrap();
        assert_eq!(profile.requests_made, 1);
        assert_eq!(profile.success_count, 1);
        assert!(profile.last_request_at.is_none());
    }
}
