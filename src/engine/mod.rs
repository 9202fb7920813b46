//! Engine orchestration module
//!
//! Wires the control services and pluggable components into cancellable
//! crawl runs. [`ScraperEngine`] owns the lifecycle, [`Component`] is the
//! plug-in seam, and [`HttpFetcher`] plus [`PageExtractor`] are the stock
//! components that make a run actually crawl.

mod component;
mod core;
mod extractor;
mod fetcher;

pub use component::{Capability, Component, EngineContext};
pub use core::{EngineError, EngineState, ScraperEngine};
pub use extractor::{extract_content, ExtractedContent, PageExtractor};
pub use fetcher::{build_http_client, HttpFetcher};
