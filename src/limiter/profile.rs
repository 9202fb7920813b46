use crate::config::LimiterConfig;
use std::time::Duration;
use tokio::time::Instant;

/// Adaptive state for a single domain
///
/// The profile tracks how the domain has responded so far and derives the
/// delay enforced between requests to it. The delay always stays within the
/// configured `[min_delay, max_delay]` bounds, with an extra floor for
/// domains marked sensitive.
#[derive(Debug, Clone)]
pub struct SiteProfile {
    /// Domain this profile belongs to
    pub domain: String,

    /// Number of admitted requests
    pub requests_made: u32,

    /// When the last admitted request went out; `None` until the first one,
    /// so a fresh domain is never delayed
    pub last_request_at: Option<Instant>,

    /// Exponentially weighted average response time (zero until the first
    /// measurement)
    pub average_response_time: Duration,

    /// Current delay enforced between requests
    pub current_delay: Duration,

    /// Errors observed (any class)
    pub error_count: u32,

    /// Successful responses observed
    pub success_count: u32,

    /// Whether this domain demands the sensitive-site delay floor
    pub is_sensitive: bool,
}

/// Plain persistence form of a [`SiteProfile`]
///
/// The monotonic last-request instant is deliberately absent; it resets on
/// load so a freshly started process never delays its first request.
#[derive(Debug, Clone)]
pub struct ProfileRecord {
    pub domain: String,
    pub requests_made: u32,
    pub average_response_time_ms: u64,
    pub current_delay_ms: u64,
    pub error_count: u32,
    pub success_count: u32,
    pub is_sensitive: bool,
}

impl SiteProfile {
    /// Creates a fresh profile with the configured default delay
    pub fn new(domain: &str, config: &LimiterConfig) -> Self {
        Self {
            domain: domain.to_string(),
            requests_made: 0,
            last_request_at: None,
            average_response_time: Duration::ZERO,
            current_delay: config.default_delay(),
            error_count: 0,
            success_count: 0,
            is_sensitive: false,
        }
    }

    /// Restores a profile from its persisted record
    pub fn from_record(record: ProfileRecord, config: &LimiterConfig) -> Self {
        let mut profile = Self::new(&record.domain, config);
        profile.requests_made = record.requests_made;
        profile.average_response_time = Duration::from_millis(record.average_response_time_ms);
        profile.error_count = record.error_count;
        profile.success_count = record.success_count;
        profile.is_sensitive = record.is_sensitive;
        // Re-clamp in case bounds changed since the record was written
        profile.current_delay =
            profile.clamp_delay(Duration::from_millis(record.current_delay_ms), config);
        profile
    }

    /// Exports the profile for persistence
    pub fn to_record(&self) -> ProfileRecord {
        ProfileRecord {
            domain: self.domain.clone(),
            requests_made: self.requests_made,
            average_response_time_ms: self.average_response_time.as_millis() as u64,
            current_delay_ms: self.current_delay.as_millis() as u64,
            error_count: self.error_count,
            success_count: self.success_count,
            is_sensitive: self.is_sensitive,
        }
    }

    /// How long a caller must still wait before the next request may go out
    pub fn wait_required(&self, now: Instant) -> Duration {
        match self.last_request_at {
            Some(last) => self.current_delay.saturating_sub(now.duration_since(last)),
            None => Duration::ZERO,
        }
    }

    /// Records an admitted request
    pub fn record_request(&mut self, now: Instant) {
        self.requests_made += 1;
        self.last_request_at = Some(now);
    }

    /// Records a successful response
    ///
    /// Updates the averaged response time when a measurement is present. A
    /// streak of at least five successes with no errors on record decays the
    /// delay by 5%. When a measurement is present the delay is then
    /// recomputed from the observed error rates.
    pub fn record_success(&mut self, response_time: Option<Duration>, config: &LimiterConfig) {
        self.success_count += 1;

        if let Some(response_time) = response_time {
            self.update_average_response_time(response_time);
        }

        if self.success_count >= 5 && self.error_count == 0 {
            self.current_delay = self.clamp_delay(self.current_delay.mul_f64(0.95), config);
        }

        if response_time.is_some() {
            self.recompute_delay(config);
        }
    }

    /// Records an HTTP 429 and doubles the delay
    pub fn record_rate_limited(&mut self, config: &LimiterConfig) {
        self.error_count += 1;
        self.apply_backoff(2.0, config);
    }

    /// Records a server error (5xx) and multiplies the delay by 1.5
    pub fn record_server_error(&mut self, config: &LimiterConfig) {
        self.error_count += 1;
        self.apply_backoff(1.5, config);
    }

    /// Records a client error (4xx other than 429) and multiplies the delay by 1.1
    pub fn record_client_error(&mut self, config: &LimiterConfig) {
        self.error_count += 1;
        self.apply_backoff(1.1, config);
    }

    /// Sets or clears the sensitive flag
    ///
    /// Marking a domain sensitive immediately raises its delay to the
    /// sensitive floor; the flag keeps later delay updates from dropping
    /// below it.
    pub fn set_sensitive(&mut self, sensitive: bool, config: &LimiterConfig) {
        self.is_sensitive = sensitive;
        if sensitive {
            self.current_delay = self.clamp_delay(self.current_delay, config);
        }
    }

    /// Applies a globally configured per-request delay
    pub fn apply_global_rate(&mut self, per_request_delay: Duration, config: &LimiterConfig) {
        self.current_delay = self.clamp_delay(per_request_delay, config);
    }

    /// Recomputes the delay from scratch using the observed error rate
    ///
    /// Starts from the default delay: an error rate above 20% scales it by
    /// 1.5, a rate in (5%, 20%] by 1.2, and a proven-healthy domain (more
    /// than ten successes, error rate under 1%) by 0.95. Domains whose
    /// average response time exceeds 2s additionally floor the delay at half
    /// that average.
    pub fn recompute_delay(&mut self, config: &LimiterConfig) {
        let mut delay = config.default_delay();

        if self.requests_made > 0 {
            let error_rate = self.error_count as f64 / self.requests_made as f64;

            if error_rate > 0.2 {
                delay = delay.mul_f64(1.5);
            } else if error_rate > 0.05 {
                delay = delay.mul_f64(1.2);
            }

            if self.success_count > 10 && error_rate < 0.01 {
                delay = delay.mul_f64(0.95);
            }
        }

        // Slow servers earn extra headroom
        if self.average_response_time > Duration::from_secs(2) {
            let latency_floor = self.average_response_time.mul_f64(0.5);
            if delay < latency_floor {
                delay = latency_floor;
            }
        }

        self.current_delay = self.clamp_delay(delay, config);
    }

    fn update_average_response_time(&mut self, response_time: Duration) {
        if self.average_response_time.is_zero() {
            // First measurement sets the average directly
            self.average_response_time = response_time;
        } else {
            self.average_response_time =
                self.average_response_time.mul_f64(0.7) + response_time.mul_f64(0.3);
        }
    }

    fn apply_backoff(&mut self, factor: f64, config: &LimiterConfig) {
        self.current_delay = self.clamp_delay(self.current_delay.mul_f64(factor), config);
    }

    fn clamp_delay(&self, delay: Duration, config: &LimiterConfig) -> Duration {
        let floor = if self.is_sensitive {
            config.min_delay().max(config.sensitive_delay())
        } else {
            config.min_delay()
        };
        delay.max(floor).min(config.max_delay())
    }
}
