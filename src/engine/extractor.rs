//! Content extraction component
//!
//! Turns fetched HTML into the pieces the control services need: readable
//! block text for change classification, absolute links for the candidate
//! queue, and the page title.

use crate::engine::{Capability, Component, EngineContext, EngineError};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::any::Any;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Extracted information from an HTML page
#[derive(Debug, Clone)]
pub struct ExtractedContent {
    /// Readable text joined from block-level elements with blank lines
    pub text: String,
    /// Absolute http(s) links found on the page
    pub links: Vec<String>,
    /// The page title, if present
    pub title: Option<String>,
}

/// Parses an HTML document into text, links, and title
///
/// # Arguments
/// * `html` - Raw HTML content
/// * `base_url` - The URL the document was fetched from, used to resolve
///   relative links
pub fn extract_content(html: &str, base_url: &Url) -> ExtractedContent {
    let document = Html::parse_document(html);
    ExtractedContent {
        text: extract_text(&document),
        links: extract_links(&document, base_url),
        title: extract_title(&document),
    }
}

/// Extracts the readable text of a page
///
/// Block-level elements become paragraphs separated by blank lines, which is
/// the shape the change classifier compares. Pages without block structure
/// fall back to the whole body text.
fn extract_text(document: &Html) -> String {
    let blocks = match Selector::parse("p, h1, h2, h3, h4, h5, h6, li, blockquote, pre") {
        Ok(selector) => selector,
        Err(_) => return String::new(),
    };

    let paragraphs: Vec<String> = document
        .select(&blocks)
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .filter(|text| !text.is_empty())
        .collect();

    if !paragraphs.is_empty() {
        return paragraphs.join("\n\n");
    }

    match Selector::parse("body") {
        Ok(selector) => document
            .select(&selector)
            .next()
            .map(|body| collapse_whitespace(&body.text().collect::<String>()))
            .unwrap_or_default(),
        Err(_) => String::new(),
    }
}

/// Extracts all followable links from a document
fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let anchors = match Selector::parse("a[href]") {
        Ok(selector) => selector,
        Err(_) => return Vec::new(),
    };

    document
        .select(&anchors)
        .filter_map(|element| {
            let href = element.value().attr("href")?;
            // Anchors with a download attribute point at files, not pages
            if element.value().attr("download").is_some() {
                return None;
            }
            resolve_link(href, base_url)
        })
        .collect()
}

/// Extracts the page title
fn extract_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    let title = document
        .select(&selector)
        .next()
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))?;

    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

/// Resolves an href into an absolute http(s) URL, or None if it should be
/// skipped
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    for scheme in ["javascript:", "mailto:", "tel:", "data:"] {
        if href.to_lowercase().starts_with(scheme) {
            return None;
        }
    }

    match base_url.join(href) {
        Ok(resolved) => {
            if resolved.scheme() == "http" || resolved.scheme() == "https" {
                Some(resolved.to_string())
            } else {
                None
            }
        }
        Err(e) => {
            debug!("Could not resolve link {}: {}", href, e);
            None
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Content extraction component
///
/// Registers under the content-extractor capability so the fetch component
/// can discover it; the extraction itself is exposed through
/// [`PageExtractor::extract`].
pub struct PageExtractor;

impl PageExtractor {
    pub fn new() -> Self {
        PageExtractor
    }

    /// Extracts text, links, and title from an HTML document
    pub fn extract(&self, html: &str, base_url: &Url) -> ExtractedContent {
        extract_content(html, base_url)
    }
}

impl Default for PageExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Component for PageExtractor {
    fn name(&self) -> &str {
        "page-extractor"
    }

    fn capability(&self) -> Capability {
        Capability::ContentExtractor
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    async fn initialize(&self, _ctx: &EngineContext) -> Result<(), EngineError> {
        debug!("Page extractor ready");
        Ok(())
    }
}
