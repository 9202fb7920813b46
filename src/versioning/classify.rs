use crate::versioning::types::{ChangeType, ChangedSections, Significance, SignificantChange};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Computes the content-addressing hash for a page's content
///
/// # Returns
///
/// Hex-encoded SHA-256 of the content bytes (64 lowercase characters)
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Splits text into paragraphs on blank-line boundaries
///
/// Each paragraph is trimmed; empty paragraphs are dropped.
fn split_paragraphs(text: &str) -> Vec<String> {
    text.replace("\r\n", "\n")
        .split("\n\n")
        .map(|paragraph| paragraph.trim().to_string())
        .filter(|paragraph| !paragraph.is_empty())
        .collect()
}

/// Classifies how much the text changed between two versions
///
/// Paragraphs are compared by case-insensitive exact match. With
/// `similarity = common / max(|old|, |new|)`: above 0.9 is Minor, above 0.7
/// is Moderate, anything else is Major. An empty side cannot be meaningfully
/// compared and is always Major.
pub fn classify_change(old_text: &str, new_text: &str) -> ChangeType {
    let old_paragraphs = split_paragraphs(old_text);
    let new_paragraphs = split_paragraphs(new_text);

    if old_paragraphs.is_empty() || new_paragraphs.is_empty() {
        return ChangeType::Major;
    }

    let new_lowered: HashSet<String> = new_paragraphs
        .iter()
        .map(|paragraph| paragraph.to_lowercase())
        .collect();

    let common = old_paragraphs
        .iter()
        .filter(|paragraph| new_lowered.contains(&paragraph.to_lowercase()))
        .count();

    let similarity = common as f64 / old_paragraphs.len().max(new_paragraphs.len()) as f64;

    if similarity > 0.9 {
        ChangeType::Minor
    } else if similarity > 0.7 {
        ChangeType::Moderate
    } else {
        ChangeType::Major
    }
}

/// Collects the paragraphs that differ between two versions
///
/// Paragraphs present only in the new text are joined as `added`; paragraphs
/// present only in the old text are joined as `removed`. A side with no
/// differences stays `None`.
pub fn extract_changed_sections(old_text: &str, new_text: &str) -> ChangedSections {
    let old_paragraphs = split_paragraphs(old_text);
    let new_paragraphs = split_paragraphs(new_text);

    let old_lowered: HashSet<String> = old_paragraphs
        .iter()
        .map(|paragraph| paragraph.to_lowercase())
        .collect();
    let new_lowered: HashSet<String> = new_paragraphs
        .iter()
        .map(|paragraph| paragraph.to_lowercase())
        .collect();

    let added: Vec<String> = new_paragraphs
        .into_iter()
        .filter(|paragraph| !old_lowered.contains(&paragraph.to_lowercase()))
        .collect();
    let removed: Vec<String> = old_paragraphs
        .into_iter()
        .filter(|paragraph| !new_lowered.contains(&paragraph.to_lowercase()))
        .collect();

    ChangedSections {
        added: if added.is_empty() {
            None
        } else {
            Some(added.join("\n\n"))
        },
        removed: if removed.is_empty() {
            None
        } else {
            Some(removed.join("\n\n"))
        },
    }
}

/// Compares two pieces of content without any prior tracking state
///
/// Unchanged content short-circuits to a no-change result; sections and the
/// changed-word percentage are not computed in that case. For changed
/// content the percentage is added-plus-removed words over the new content's
/// words, defined as 100 when the new content has no words at all.
///
/// # Arguments
///
/// * `old_content` - The previously seen content
/// * `new_content` - The freshly fetched content
/// * `url` - Optional URL used in the generated summary
pub fn detect_significant_changes(
    old_content: &str,
    new_content: &str,
    url: Option<&str>,
) -> SignificantChange {
    if content_hash(old_content) == content_hash(new_content) {
        let summary = match url {
            Some(url) => format!("No change detected for {}", url),
            None => "No change detected".to_string(),
        };
        return SignificantChange {
            content_changed: false,
            change_type: ChangeType::None,
            changed_sections: None,
            changed_word_percentage: 0.0,
            significance: Significance::Low,
            summary,
        };
    }

    let change_type = classify_change(old_content, new_content);
    let sections = extract_changed_sections(old_content, new_content);

    let added_words = sections.added.as_deref().map(word_count).unwrap_or(0);
    let removed_words = sections.removed.as_deref().map(word_count).unwrap_or(0);
    let new_words = word_count(new_content);

    let changed_word_percentage = if new_words == 0 {
        // An emptied page is a total change
        100.0
    } else {
        (added_words + removed_words) as f64 / new_words as f64 * 100.0
    };

    let significance = match change_type {
        ChangeType::Major => Significance::High,
        ChangeType::Moderate => Significance::Medium,
        _ => Significance::Low,
    };

    let summary = match url {
        Some(url) => format!(
            "{} change detected for {}: {:.1}% of words affected",
            change_type, url, changed_word_percentage
        ),
        None => format!(
            "{} change detected: {:.1}% of words affected",
            change_type, changed_word_percentage
        ),
    };

    SignificantChange {
        content_changed: true,
        change_type,
        changed_sections: if sections.is_empty() {
            None
        } else {
            Some(sections)
        },
        changed_word_percentage,
        significance,
        summary,
    }
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
