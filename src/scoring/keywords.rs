use std::collections::HashMap;

/// Common words that carry no signal as page keywords
///
/// Only words longer than three characters reach the stop-word check, so
/// short fillers like "the" and "and" need no entry here.
const STOP_WORDS: &[&str] = &[
    "about",
    "after",
    "again",
    "against",
    "also",
    "because",
    "been",
    "before",
    "being",
    "between",
    "both",
    "could",
    "does",
    "down",
    "during",
    "each",
    "from",
    "have",
    "here",
    "into",
    "just",
    "like",
    "many",
    "more",
    "most",
    "much",
    "only",
    "other",
    "over",
    "same",
    "should",
    "some",
    "still",
    "such",
    "than",
    "that",
    "their",
    "them",
    "then",
    "there",
    "these",
    "they",
    "this",
    "those",
    "through",
    "under",
    "upon",
    "very",
    "well",
    "were",
    "what",
    "when",
    "where",
    "which",
    "while",
    "will",
    "with",
    "would",
    "your",
];

/// Extracts the most frequent keywords from a page's text
///
/// Words are split on non-alphanumeric boundaries, case-folded, and kept only
/// when longer than three characters and not in the stop-word list. The
/// result is ordered by descending frequency, with ties broken
/// alphabetically so repeated extraction is deterministic.
///
/// # Arguments
///
/// * `text` - The extracted page text
/// * `max_count` - Maximum number of keywords to return
pub fn extract_keywords(text: &str, max_count: usize) -> Vec<String> {
    let mut frequencies: HashMap<String, usize> = HashMap::new();

    for word in text.split(|c: char| !c.is_alphanumeric()) {
        if word.chars().count() <= 3 {
            continue;
        }

        let folded = word.to_lowercase();
        if STOP_WORDS.contains(&folded.as_str()) {
            continue;
        }

        *frequencies.entry(folded).or_insert(0) += 1;
    }

    let mut ranked: Vec<(String, usize)> = frequencies.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(max_count);

    ranked.into_iter().map(|(word, _)| word).collect()
}

/// Computes the importance score for a page
///
/// Three equally weighted terms, each capped at 1.0: content length against a
/// 5000-byte ceiling, link count against 30, and keyword count against 5.
/// The result is always in [0, 3].
pub fn importance_score(content_length: usize, link_count: usize, keyword_count: usize) -> f64 {
    let length_term = (content_length as f64 / 5000.0).min(1.0);
    let link_term = (link_count as f64 / 30.0).min(1.0);
    let keyword_term = (keyword_count as f64 / 5.0).min(1.0);

    length_term + link_term + keyword_term
}
