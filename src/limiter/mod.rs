//! Adaptive per-domain rate limiting
//!
//! This module decides "how fast it is safe to go" for each domain:
//!
//! - `SiteProfile`: per-domain delay, error/success counters, and measured
//!   latency, with the delay-adjustment math
//! - `AdaptiveRateLimiter`: admission gating with cancellation-aware waits,
//!   outcome reporting, sensitive-domain floors, and global rate changes
//!
//! Admission for a given domain is strictly serialized: the domain's profile
//! sits behind an async lock that is held across the admission wait, so
//! concurrent same-domain callers observe ordered last-request times while
//! distinct domains proceed independently.

mod adaptive;
mod profile;

// Re-export main types
pub use adaptive::AdaptiveRateLimiter;
pub use profile::{ProfileRecord, SiteProfile};
