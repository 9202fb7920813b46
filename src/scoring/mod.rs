//! URL scoring and prioritization
//!
//! This module decides "where to look next" for the crawl loop:
//!
//! - `MetadataStore`: per-URL page metadata and per-domain visit counts
//! - keyword extraction and the page importance score
//! - `UrlPrioritizer`: scores candidate URLs and manages the candidate queue

mod keywords;
mod metadata;
mod prioritizer;

// Re-export main types
pub use keywords::{extract_keywords, importance_score};
pub use metadata::{MetadataSnapshot, MetadataStore, PageMetadata};
pub use prioritizer::{UrlPrioritizer, UrlScore};
