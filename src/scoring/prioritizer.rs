use crate::scoring::keywords::{extract_keywords, importance_score};
use crate::scoring::metadata::{MetadataSnapshot, MetadataStore, PageMetadata};
use crate::url::{domain_of, extract_domain, path_segment_count};
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use url::Url;

/// Maximum number of keywords stored per page
const MAX_KEYWORDS: usize = 10;

/// URL terms that suggest a page worth visiting
const INTERESTING_TERMS: &[&str] = &["about", "faq", "help", "guide", "news", "contact"];

/// File extensions that are rarely worth fetching
const AVOID_EXTENSIONS: &[&str] = &[".pdf", ".jpg", ".png", ".gif", ".mp3", ".mp4", ".zip"];

/// Outcome of scoring a single URL
///
/// A malformed URL is `Unscorable` rather than silently low, so callers can
/// tell "legitimately uninteresting" apart from "could not be scored".
/// Inside ranking, unscorable URLs count as 0.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UrlScore {
    /// The URL was scored
    Scored(f64),
    /// The URL could not be parsed well enough to score
    Unscorable,
}

impl UrlScore {
    /// The numeric value used for ranking
    pub fn value(&self) -> f64 {
        match self {
            UrlScore::Scored(score) => *score,
            UrlScore::Unscorable => 0.0,
        }
    }
}

/// Scores and ranks candidate URLs using visit history and URL shape
///
/// The prioritizer owns the [`MetadataStore`] and a queue of candidate URLs.
/// Scoring starts from a base of 1.0 and adds a novelty bonus, a capped
/// domain-diversity penalty, a path-depth penalty, bonuses for interesting
/// URL terms, and a heavy penalty for binary/media file extensions.
#[derive(Debug, Default)]
pub struct UrlPrioritizer {
    metadata: MetadataStore,
    queue: Mutex<VecDeque<String>>,
}

impl UrlPrioritizer {
    /// Creates a prioritizer with no history and an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Scores a single URL
    ///
    /// Never fails: a URL that cannot be parsed yields
    /// [`UrlScore::Unscorable`].
    pub fn score(&self, url: &str) -> UrlScore {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!("Cannot score malformed URL '{}': {}", url, e);
                return UrlScore::Unscorable;
            }
        };

        let domain = match extract_domain(&parsed) {
            Some(domain) => domain,
            None => {
                tracing::debug!("Cannot score URL without a host: {}", url);
                return UrlScore::Unscorable;
            }
        };

        let mut score = 1.0;

        // Novelty bonus for URLs we have no metadata for yet
        if !self.metadata.contains(url) {
            score += 2.0;
        }

        // Domain-diversity penalty, capped at 0.5
        let visits = self.metadata.domain_visit_count(&domain);
        score -= (visits as f64 * 0.1).min(0.5);

        // Shallower paths are preferred; the root counts as one segment
        score -= 0.2 * (path_segment_count(&parsed) as f64 - 1.0);

        // Interesting-term bonus, stacking across terms and occurrences
        let lowered = url.to_lowercase();
        for term in INTERESTING_TERMS {
            score += 0.5 * lowered.matches(term).count() as f64;
        }

        // Binary and media files are rarely worth a fetch
        for extension in AVOID_EXTENSIONS {
            if lowered.ends_with(extension) {
                score -= 5.0;
            }
        }

        UrlScore::Scored(score)
    }

    /// Ranks candidate URLs and returns the best `max_count` of them
    ///
    /// The result is ordered by descending score; equal scores keep their
    /// input order. Empty input yields an empty result. Unscorable URLs rank
    /// as 0.0 but are never dropped outright.
    pub fn prioritize(&self, urls: &[String], max_count: usize) -> Vec<String> {
        if urls.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(String, f64)> = urls
            .iter()
            .map(|url| (url.clone(), self.score(url).value()))
            .collect();

        // Stable sort keeps input order for equal scores
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(max_count);

        scored.into_iter().map(|(url, _)| url).collect()
    }

    /// Records a completed page visit
    ///
    /// Computes content length, keywords, and the importance score, stores
    /// them as the page's metadata (replacing any previous entry), and
    /// increments the owning domain's visit count. A malformed URL is logged
    /// and skipped; one bad URL must not halt the batch.
    pub fn record_visit(&self, url: &str, link_count: usize, text: &str) {
        let domain = match domain_of(url) {
            Ok(domain) => domain,
            Err(e) => {
                tracing::warn!("Skipping visit record for '{}': {}", url, e);
                return;
            }
        };

        let keywords = extract_keywords(text, MAX_KEYWORDS);
        let importance = importance_score(text.len(), link_count, keywords.len());

        self.metadata.upsert(PageMetadata {
            url: url.to_string(),
            content_length: text.len(),
            links_count: link_count,
            last_visited_at: Utc::now(),
            importance_score: importance,
            keywords,
        });
        self.metadata.increment_domain_visits(&domain);
    }

    /// Returns a copy of the stored metadata for a URL, if any
    pub fn metadata_for(&self, url: &str) -> Option<PageMetadata> {
        self.metadata.get(url)
    }

    /// Number of pages with stored metadata
    pub fn page_count(&self) -> usize {
        self.metadata.page_count()
    }

    /// Bulk-imports page metadata, merging by URL with last write winning
    pub fn load_metadata(&self, entries: Vec<PageMetadata>) {
        self.metadata.load_pages(entries);
    }

    /// Bulk-imports domain visit counts
    pub fn load_domain_visits(&self, counts: HashMap<String, u32>) {
        self.metadata.load_domain_visits(counts);
    }

    /// Exports pages and domain visit counts for persistence
    pub fn snapshot(&self) -> MetadataSnapshot {
        self.metadata.snapshot()
    }

    // ===== Candidate queue =====

    /// Replaces the candidate queue with the given seed URLs
    pub fn initialize_queue(&self, seed_urls: Vec<String>) {
        let mut queue = self.queue.lock().unwrap();
        queue.clear();
        queue.extend(seed_urls);
    }

    /// Appends candidates that are not already queued
    pub fn enqueue(&self, urls: Vec<String>) {
        let mut queue = self.queue.lock().unwrap();
        for url in urls {
            if !queue.contains(&url) {
                queue.push_back(url);
            }
        }
    }

    /// Removes and returns the best `max` queued candidates
    ///
    /// The rest of the queue is left in place, in its original order.
    pub fn next_batch(&self, max: usize) -> Vec<String> {
        let mut queue = self.queue.lock().unwrap();
        if queue.is_empty() {
            return Vec::new();
        }

        let candidates: Vec<String> = queue.iter().cloned().collect();
        let batch = self.prioritize(&candidates, max);
        queue.retain(|url| !batch.contains(url));

        batch
    }

    /// Number of queued candidate URLs
    pub fn queue_len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_novel_root() {
        let prioritizer = UrlPrioritizer::new();
        // base 1.0 + novelty 2.0, no penalties
        assert_eq!(
            prioritizer.score("https://example.com/"),
            UrlScore::Scored(3.0)
        );
    }

    #[test]
    fn test_score_malformed_url_is_unscorable() {
        let prioritizer = UrlPrioritizer::new();
        let score = prioritizer.score("not a url");
        assert_eq!(score, UrlScore::Unscorable);
        assert_eq!(score.value(), 0.0);
    }

    #[test]
    fn test_score_novelty_disappears_after_visit() {
        let prioritizer = UrlPrioritizer::new();
        let url = "https://example.com/";

        let before = prioritizer.score(url).value();
        prioritizer.record_visit(url, 0, "");
        let after = prioritizer.score(url).value();

        assert_eq!(before, 3.0);
        // novelty bonus gone, one domain visit recorded
        assert!((after - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_score_domain_penalty_is_capped() {
        let prioritizer = UrlPrioritizer::new();
        for _ in 0..20 {
            prioritizer.record_visit("https://example.com/seen", 0, "");
        }

        // 20 visits would be a 2.0 penalty uncapped; the cap holds it at 0.5
        let score = prioritizer.score("https://example.com/fresh").value();
        assert!((score - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_score_path_depth_penalty() {
        let prioritizer = UrlPrioritizer::new();
        let shallow = prioritizer.score("https://example.com/a").value();
        let deep = prioritizer.score("https://example.com/a/b/c").value();

        assert!((shallow - deep - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_score_interesting_terms_stack() {
        let prioritizer = UrlPrioritizer::new();
        let one = prioritizer.score("https://example.com/faq").value();
        let two = prioritizer.score("https://example.com/help-faq").value();

        assert!((one - 3.5).abs() < 1e-9);
        assert!((two - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_avoid_extension_penalty() {
        let prioritizer = UrlPrioritizer::new();
        let score = prioritizer.score("https://example.com/report.pdf").value();
        // base 1.0 + novelty 2.0 - 5.0
        assert!((score - (-2.0)).abs() < 1e-9);
    }

    #[test]
    fn test_prioritize_empty_input() {
        let prioritizer = UrlPrioritizer::new();
        assert!(prioritizer.prioritize(&[], 10).is_empty());
    }

    #[test]
    fn test_prioritize_respects_max_count() {
        let prioritizer = UrlPrioritizer::new();
        let urls: Vec<String> = (0..20)
            .map(|i| format!("https://example.com/page{}", i))
            .collect();

        let ranked = prioritizer.prioritize(&urls, 10);
        assert_eq!(ranked.len(), 10);
        for url in &ranked {
            assert!(urls.contains(url));
        }
    }

    #[test]
    fn test_prioritize_scores_non_increasing() {
        let prioritizer = UrlPrioritizer::new();
        let urls = vec![
            "https://example.com/a/b/c".to_string(),
            "https://example.com/about".to_string(),
            "https://example.com/file.zip".to_string(),
            "https://example.com/".to_string(),
        ];

        let ranked = prioritizer.prioritize(&urls, 10);
        let scores: Vec<f64> = ranked.iter().map(|u| prioritizer.score(u).value()).collect();
        for pair in scores.windows(2) {
            assert!(pair[0] >= pair[1]);
        }
    }

    #[test]
    fn test_prioritize_ties_keep_input_order() {
        let prioritizer = UrlPrioritizer::new();
        let urls = vec![
            "https://b.example.com/".to_string(),
            "https://a.example.com/".to_string(),
        ];

        // Equal scores: both novel roots with no visit history
        let ranked = prioritizer.prioritize(&urls, 10);
        assert_eq!(ranked, urls);
    }

    #[test]
    fn test_prioritize_keeps_unscorable_last() {
        let prioritizer = UrlPrioritizer::new();
        let urls = vec![
            "::not-a-url::".to_string(),
            "https://example.com/".to_string(),
        ];

        let ranked = prioritizer.prioritize(&urls, 10);
        assert_eq!(ranked[0], "https://example.com/");
        assert_eq!(ranked[1], "::not-a-url::");
    }

    #[test]
    fn test_prioritize_about_over_root_over_pdf() {
        let prioritizer = UrlPrioritizer::new();
        let urls = vec![
            "http://x/about".to_string(),
            "http://x/file.pdf".to_string(),
            "http://x/".to_string(),
        ];

        let ranked = prioritizer.prioritize(&urls, 10);
        assert_eq!(
            ranked,
            vec![
                "http://x/about".to_string(),
                "http://x/".to_string(),
                "http://x/file.pdf".to_string()
            ]
        );
    }

    #[test]
    fn test_record_visit_stores_metadata() {
        let prioritizer = UrlPrioritizer::new();
        prioritizer.record_visit(
            "https://example.com/article",
            12,
            "crawler design notes crawler design crawler",
        );

        let metadata = prioritizer.metadata_for("https://example.com/article").unwrap();
        assert_eq!(metadata.links_count, 12);
        assert_eq!(metadata.keywords[0], "crawler");
        assert!(metadata.importance_score > 0.0);
        assert!(metadata.importance_score <= 3.0);
    }

    #[test]
    fn test_record_visit_malformed_url_is_skipped() {
        let prioritizer = UrlPrioritizer::new();
        prioritizer.record_visit("not a url", 3, "some text");

        assert_eq!(prioritizer.page_count(), 0);
    }

    #[test]
    fn test_initialize_queue_replaces() {
        let prioritizer = UrlPrioritizer::new();
        prioritizer.initialize_queue(vec!["https://a.example.com/".to_string()]);
        prioritizer.initialize_queue(vec![
            "https://b.example.com/".to_string(),
            "https://c.example.com/".to_string(),
        ]);

        assert_eq!(prioritizer.queue_len(), 2);
    }

    #[test]
    fn test_enqueue_skips_duplicates() {
        let prioritizer = UrlPrioritizer::new();
        prioritizer.initialize_queue(vec!["https://a.example.com/".to_string()]);
        prioritizer.enqueue(vec![
            "https://a.example.com/".to_string(),
            "https://b.example.com/".to_string(),
        ]);

        assert_eq!(prioritizer.queue_len(), 2);
    }

    #[test]
    fn test_next_batch_drains_best_first() {
        let prioritizer = UrlPrioritizer::new();
        prioritizer.initialize_queue(vec![
            "https://example.com/report.pdf".to_string(),
            "https://example.com/about".to_string(),
            "https://example.com/a/b/c".to_string(),
        ]);

        let batch = prioritizer.next_batch(2);
        assert_eq!(batch[0], "https://example.com/about");
        assert_eq!(batch.len(), 2);
        assert_eq!(prioritizer.queue_len(), 1);

        let rest = prioritizer.next_batch(10);
        assert_eq!(rest.len(), 1);
        assert_eq!(prioritizer.queue_len(), 0);
        assert!(prioritizer.next_batch(10).is_empty());
    }
}
