use crate::versioning::classify::{classify_change, content_hash, extract_changed_sections};
use crate::versioning::types::{
    ChangeNotification, ChangeType, PageVersion, ScraperContentSettings,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Error from a version history backend
#[derive(Debug, Error)]
#[error("Version archive error: {0}")]
pub struct ArchiveError(pub String);

/// Persistence backend for page version history
///
/// The store works entirely in memory; an archive, when attached, receives
/// the full history of a page after each tracked change and supplies prior
/// history when a scraper is first registered.
pub trait VersionArchive: Send + Sync {
    /// Persists the current history for a single page
    fn save_history(
        &self,
        scraper_id: &str,
        url: &str,
        versions: &[PageVersion],
    ) -> Result<(), ArchiveError>;

    /// Loads all stored versions for a scraper, any order
    fn load_history(&self, scraper_id: &str) -> Result<Vec<PageVersion>, ArchiveError>;
}

/// Tracks content versions per scraper and page
///
/// Each `(scraper_id, url)` pair owns an independent history ordered newest
/// first. Tracking a page whose content hash matches the latest version is a
/// no-op that returns the existing version; otherwise the change is
/// classified against the previous text, the history is pruned to the
/// scraper's retention limit, and a notification is queued when the scraper
/// opted in and the change is Moderate or worse.
///
/// # Example
///
/// ```
/// use driftwatch::versioning::ContentVersionStore;
///
/// let store = ContentVersionStore::new();
/// let version = store.track_version(
///     "https://example.com/",
///     "<p>Hello</p>",
///     "Hello",
///     "default",
/// );
/// assert_eq!(version.content_hash.len(), 64);
/// ```
pub struct ContentVersionStore {
    settings: RwLock<HashMap<String, ScraperContentSettings>>,
    versions: RwLock<HashMap<(String, String), Vec<PageVersion>>>,
    notifications: Mutex<Vec<ChangeNotification>>,
    archive: Option<Arc<dyn VersionArchive>>,
}

impl ContentVersionStore {
    /// Creates an in-memory store with no persistence backend
    pub fn new() -> Self {
        ContentVersionStore {
            settings: RwLock::new(HashMap::new()),
            versions: RwLock::new(HashMap::new()),
            notifications: Mutex::new(Vec::new()),
            archive: None,
        }
    }

    /// Creates a store that persists history through the given archive
    pub fn with_archive(archive: Arc<dyn VersionArchive>) -> Self {
        ContentVersionStore {
            settings: RwLock::new(HashMap::new()),
            versions: RwLock::new(HashMap::new()),
            notifications: Mutex::new(Vec::new()),
            archive: Some(archive),
        }
    }

    /// Registers a scraper's content settings
    ///
    /// Registering an id again replaces its settings. The first registration
    /// of an id also pulls that scraper's stored history out of the archive,
    /// so previously seen pages classify against their real prior text
    /// instead of looking new.
    pub fn register_scraper(&self, settings: ScraperContentSettings) {
        let scraper_id = settings.scraper_id.clone();
        let first_registration = {
            let mut stored = self.settings.write().unwrap();
            let first = !stored.contains_key(&scraper_id);
            stored.insert(scraper_id.clone(), settings);
            first
        };

        if first_registration {
            self.load_archived_history(&scraper_id);
        }
    }

    fn load_archived_history(&self, scraper_id: &str) {
        let Some(archive) = &self.archive else {
            return;
        };

        match archive.load_history(scraper_id) {
            Ok(stored) => {
                if stored.is_empty() {
                    return;
                }
                let mut grouped: HashMap<(String, String), Vec<PageVersion>> = HashMap::new();
                for version in stored {
                    grouped
                        .entry((version.scraper_id.clone(), version.url.clone()))
                        .or_default()
                        .push(version);
                }
                let mut versions = self.versions.write().unwrap();
                let mut loaded = 0;
                for (key, mut history) in grouped {
                    history.sort_by(|a, b| b.version_date.cmp(&a.version_date));
                    loaded += history.len();
                    versions.insert(key, history);
                }
                info!(
                    "Loaded {} archived versions for scraper {}",
                    loaded, scraper_id
                );
            }
            Err(e) => {
                warn!(
                    "Could not load version history for scraper {}: {}",
                    scraper_id, e
                );
            }
        }
    }

    /// Records a new version of a page's content
    ///
    /// # Arguments
    ///
    /// * `url` - The page's URL, stored as given
    /// * `content` - Raw content used for change detection hashing
    /// * `text_content` - Extracted text used for change classification
    /// * `scraper_id` - The owning scraper; unregistered ids get defaults
    ///
    /// # Returns
    ///
    /// The stored version. When the content hash matches the latest version
    /// the existing version is returned unmodified and nothing is written.
    pub fn track_version(
        &self,
        url: &str,
        content: &str,
        text_content: &str,
        scraper_id: &str,
    ) -> PageVersion {
        let settings = self
            .scraper_settings(scraper_id)
            .unwrap_or_else(|| ScraperContentSettings::new(scraper_id, scraper_id));

        let hash = content_hash(content);
        let key = (scraper_id.to_string(), url.to_string());

        let (version, history_snapshot) = {
            let mut versions = self.versions.write().unwrap();
            let history = versions.entry(key).or_default();

            if let Some(latest) = history.first() {
                if latest.content_hash == hash {
                    debug!("Content unchanged for {}, keeping latest version", url);
                    return latest.clone();
                }
            }

            let previous_text = history.first().map(|v| v.text_content.clone());

            let change_type = match &previous_text {
                Some(previous) => classify_change(previous, text_content),
                None => ChangeType::None,
            };

            let changed_sections = match &previous_text {
                Some(previous) if change_type >= ChangeType::Moderate => {
                    let sections = extract_changed_sections(previous, text_content);
                    if sections.is_empty() {
                        None
                    } else {
                        Some(sections)
                    }
                }
                _ => None,
            };

            let version = PageVersion {
                url: url.to_string(),
                content: content.to_string(),
                text_content: text_content.to_string(),
                content_hash: hash,
                version_date: Utc::now(),
                change_from_previous: change_type,
                changed_sections: changed_sections.clone(),
                scraper_id: scraper_id.to_string(),
            };

            if change_type >= ChangeType::Moderate
                && settings.notify_on_changes
                && settings
                    .notification_email
                    .as_deref()
                    .is_some_and(|email| !email.is_empty())
            {
                let notification = ChangeNotification {
                    url: url.to_string(),
                    scraper_id: settings.scraper_id.clone(),
                    scraper_name: settings.scraper_name.clone(),
                    change_type,
                    detected_at: version.version_date,
                    changed_sections,
                    summary: format!("{} change detected for {}", change_type, url),
                };
                self.notifications.lock().unwrap().push(notification);
            }

            history.insert(0, version.clone());
            history.sort_by(|a, b| b.version_date.cmp(&a.version_date));
            history.truncate(settings.max_versions_to_keep);

            (version, history.clone())
        };

        if settings.track_changes_history {
            self.persist_history(scraper_id, url, &history_snapshot);
        }

        version
    }

    fn persist_history(&self, scraper_id: &str, url: &str, history: &[PageVersion]) {
        let Some(archive) = &self.archive else {
            return;
        };
        if let Err(e) = archive.save_history(scraper_id, url, history) {
            warn!("Could not persist version history for {}: {}", url, e);
        }
    }

    /// Drains and returns all queued change notifications
    pub fn pending_notifications(&self) -> Vec<ChangeNotification> {
        std::mem::take(&mut *self.notifications.lock().unwrap())
    }

    /// Returns the stored history for a page, newest first
    pub fn versions_for(&self, scraper_id: &str, url: &str) -> Vec<PageVersion> {
        self.versions
            .read()
            .unwrap()
            .get(&(scraper_id.to_string(), url.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the most recent version of a page, if any
    pub fn latest_version(&self, scraper_id: &str, url: &str) -> Option<PageVersion> {
        self.versions
            .read()
            .unwrap()
            .get(&(scraper_id.to_string(), url.to_string()))
            .and_then(|history| history.first().cloned())
    }

    /// Returns the registered settings for a scraper, if any
    pub fn scraper_settings(&self, scraper_id: &str) -> Option<ScraperContentSettings> {
        self.settings.read().unwrap().get(scraper_id).cloned()
    }

    /// Total number of versions held across all pages
    pub fn version_count(&self) -> usize {
        self.versions
            .read()
            .unwrap()
            .values()
            .map(|history| history.len())
            .sum()
    }
}

impl Default for ContentVersionStore {
    fn default() -> Self {
        ContentVersionStore::new()
    }
}
