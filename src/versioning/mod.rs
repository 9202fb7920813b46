//! Content versioning and change classification
//!
//! This module decides "what to keep and report" about fetched content:
//!
//! - content hashing and paragraph-level change classification
//! - `ContentVersionStore`: per-(scraper, URL) version history with pruning,
//!   change notifications, and best-effort persistence through the
//!   [`VersionArchive`] seam
//! - `detect_significant_changes`: a stateless comparison usable without
//!   prior tracking

mod classify;
mod store;
mod types;

// Re-export main types
pub use classify::{
    classify_change, content_hash, detect_significant_changes, extract_changed_sections,
};
pub use store::{ArchiveError, ContentVersionStore, VersionArchive};
pub use types::{
    ChangeNotification, ChangeType, ChangedSections, PageVersion, ScraperContentSettings,
    Significance, SignificantChange,
};
