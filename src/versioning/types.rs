use chrono::{DateTime, Utc};
use std::fmt;

/// How much the tracked content changed since the previous version
///
/// The variants form a total order (`None < Minor < Moderate < Major`), so
/// "at least Moderate" is an ordinary comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChangeType {
    None,
    Minor,
    Moderate,
    Major,
}

impl ChangeType {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Minor => "minor",
            Self::Moderate => "moderate",
            Self::Major => "major",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "none" => Some(Self::None),
            "minor" => Some(Self::Minor),
            "moderate" => Some(Self::Moderate),
            "major" => Some(Self::Major),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "None",
            Self::Minor => "Minor",
            Self::Moderate => "Moderate",
            Self::Major => "Major",
        };
        write!(f, "{}", name)
    }
}

/// Paragraphs that differ between two versions of a page
///
/// A side that has no content stays `None` rather than holding an empty
/// string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedSections {
    /// Paragraphs present in the new text but not the old
    pub added: Option<String>,

    /// Paragraphs present in the old text but not the new
    pub removed: Option<String>,
}

impl ChangedSections {
    pub fn is_empty(&self) -> bool {
        self.added.is_none() && self.removed.is_none()
    }
}

/// A stored snapshot of a URL's content at a point in time
#[derive(Debug, Clone)]
pub struct PageVersion {
    /// The page URL
    pub url: String,

    /// Raw fetched content (the hashed bytes)
    pub content: String,

    /// Extracted text used for change classification
    pub text_content: String,

    /// SHA-256 of the raw content, lowercase hex
    pub content_hash: String,

    /// When this version was recorded
    pub version_date: DateTime<Utc>,

    /// Classified change relative to the previous version
    pub change_from_previous: ChangeType,

    /// Changed paragraphs, attached for Moderate and Major changes
    pub changed_sections: Option<ChangedSections>,

    /// Scraper identity that tracked this version
    pub scraper_id: String,
}

/// Version-tracking settings for one scraper identity
#[derive(Debug, Clone)]
pub struct ScraperContentSettings {
    /// Stable identifier for the scraper
    pub scraper_id: String,

    /// Human-readable name used in notifications
    pub scraper_name: String,

    /// How many versions to retain per URL
    pub max_versions_to_keep: usize,

    /// Whether version history is persisted through the archive
    pub track_changes_history: bool,

    /// Whether Moderate/Major changes enqueue a notification
    pub notify_on_changes: bool,

    /// Notification destination; notifications need a non-empty address
    pub notification_email: Option<String>,
}

impl ScraperContentSettings {
    /// Creates settings with the defaults: keep 5 versions, track history,
    /// no notifications
    pub fn new(scraper_id: &str, scraper_name: &str) -> Self {
        Self {
            scraper_id: scraper_id.to_string(),
            scraper_name: scraper_name.to_string(),
            max_versions_to_keep: 5,
            track_changes_history: true,
            notify_on_changes: false,
            notification_email: None,
        }
    }
}

/// A queued change notification awaiting a drain
#[derive(Debug, Clone)]
pub struct ChangeNotification {
    pub url: String,
    pub scraper_id: String,
    pub scraper_name: String,
    pub change_type: ChangeType,
    pub detected_at: DateTime<Utc>,
    pub changed_sections: Option<ChangedSections>,
    pub summary: String,
}

/// Importance tier of a detected change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Significance {
    Low,
    Medium,
    High,
}

/// Result of a stateless change comparison
#[derive(Debug, Clone)]
pub struct SignificantChange {
    /// Whether the content hash changed at all
    pub content_changed: bool,

    /// Classified magnitude of the change
    pub change_type: ChangeType,

    /// Changed paragraphs, when any differ
    pub changed_sections: Option<ChangedSections>,

    /// Added plus removed words as a percentage of the new content's words
    pub changed_word_percentage: f64,

    /// Importance tier derived from the change type
    pub significance: Significance,

    /// Human-readable description of the comparison
    pub summary: String,
}
