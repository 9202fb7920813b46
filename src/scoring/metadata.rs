use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

/// Metadata recorded for a visited page
///
/// One entry exists per URL; each visit overwrites the previous entry rather
/// than merging into it.
#[derive(Debug, Clone)]
pub struct PageMetadata {
    /// The page URL
    pub url: String,

    /// Length of the extracted text in bytes
    pub content_length: usize,

    /// Number of links extracted from the page
    pub links_count: usize,

    /// When the page was last visited
    pub last_visited_at: DateTime<Utc>,

    /// Importance score in [0, 3]
    pub importance_score: f64,

    /// Up to 10 keywords, most frequent first
    pub keywords: Vec<String>,
}

/// Exported copy of the store contents, used for persistence
#[derive(Debug, Clone)]
pub struct MetadataSnapshot {
    pub pages: Vec<PageMetadata>,
    pub domain_visits: HashMap<String, u32>,
}

/// In-memory store of page metadata and domain visit counts
///
/// All methods take `&self`; the maps are lock-protected so the store can be
/// shared across concurrent fetch tasks.
#[derive(Debug, Default)]
pub struct MetadataStore {
    pages: RwLock<HashMap<String, PageMetadata>>,
    domain_visits: RwLock<HashMap<String, u32>>,
}

impl MetadataStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the metadata for a URL, if any
    pub fn get(&self, url: &str) -> Option<PageMetadata> {
        self.pages.read().unwrap().get(url).cloned()
    }

    /// Returns whether metadata exists for a URL
    pub fn contains(&self, url: &str) -> bool {
        self.pages.read().unwrap().contains_key(url)
    }

    /// Stores metadata for a URL, replacing any previous entry
    pub fn upsert(&self, metadata: PageMetadata) {
        self.pages
            .write()
            .unwrap()
            .insert(metadata.url.clone(), metadata);
    }

    /// Returns the visit count for a domain (0 if never visited)
    pub fn domain_visit_count(&self, domain: &str) -> u32 {
        self.domain_visits
            .read()
            .unwrap()
            .get(domain)
            .copied()
            .unwrap_or(0)
    }

    /// Increments the visit count for a domain
    pub fn increment_domain_visits(&self, domain: &str) {
        let mut visits = self.domain_visits.write().unwrap();
        *visits.entry(domain.to_string()).or_insert(0) += 1;
    }

    /// Bulk-imports page metadata, merging by URL with last write winning
    pub fn load_pages(&self, entries: Vec<PageMetadata>) {
        let mut pages = self.pages.write().unwrap();
        for entry in entries {
            pages.insert(entry.url.clone(), entry);
        }
    }

    /// Bulk-imports domain visit counts, merging by domain
    pub fn load_domain_visits(&self, counts: HashMap<String, u32>) {
        let mut visits = self.domain_visits.write().unwrap();
        for (domain, count) in counts {
            visits.insert(domain, count);
        }
    }

    /// Number of pages with stored metadata
    pub fn page_count(&self) -> usize {
        self.pages.read().unwrap().len()
    }

    /// Exports the store contents for persistence
    pub fn snapshot(&self) -> MetadataSnapshot {
        let pages = self.pages.read().unwrap().values().cloned().collect();
        let domain_visits = self.domain_visits.read().unwrap().clone();
        MetadataSnapshot {
            pages,
            domain_visits,
        }
    }
}
