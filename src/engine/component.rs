//! Component trait and engine context
//!
//! Components are the pluggable units the engine sequences through a run.
//! Each one registers under a capability tag and receives an explicit
//! context handle in every callback; there is no ambient registry to reach
//! into.

use crate::config::Config;
use crate::engine::EngineError;
use crate::limiter::AdaptiveRateLimiter;
use crate::scoring::UrlPrioritizer;
use crate::versioning::ContentVersionStore;
use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Functional capability a component provides
///
/// Each capability can be registered at most once per engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Drives the crawl for a seed URL
    UrlProcessor,
    /// Turns fetched HTML into text, links, and a title
    ContentExtractor,
    /// Renders pages that need a browser
    BrowserHandler,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::UrlProcessor => "url-processor",
            Capability::ContentExtractor => "content-extractor",
            Capability::BrowserHandler => "browser-handler",
        };
        write!(f, "{}", name)
    }
}

/// A pluggable engine component
///
/// Lifecycle callbacks arrive in a fixed order: `initialize` once, then per
/// run `run_started`, zero or more `process_url` calls (for the
/// url-processor), and `run_finished`; `run_stopping` fires on cancellation
/// and `dispose` once at shutdown. Hook defaults are no-ops so components
/// implement only what they need.
#[async_trait]
pub trait Component: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// The capability this component provides
    fn capability(&self) -> Capability;

    /// Upcasts the component so siblings can downcast to the concrete type
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    /// Called once while the engine initializes, in registration order
    async fn initialize(&self, ctx: &EngineContext) -> Result<(), EngineError>;

    /// Called when a run starts
    async fn run_started(&self, _ctx: &EngineContext) -> Result<(), EngineError> {
        Ok(())
    }

    /// Processes one seed URL
    ///
    /// Only meaningful for the url-processor capability; the default refuses
    /// the operation.
    async fn process_url(&self, _ctx: &EngineContext, _url: &str) -> Result<(), EngineError> {
        Err(EngineError::UnsupportedOperation {
            component: self.name().to_string(),
            operation: "process_url".to_string(),
        })
    }

    /// Called when a run finishes
    async fn run_finished(&self, _ctx: &EngineContext) -> Result<(), EngineError> {
        Ok(())
    }

    /// Called when the current run is being cancelled
    async fn run_stopping(&self, _ctx: &EngineContext) -> Result<(), EngineError> {
        Ok(())
    }

    /// Called once when the engine shuts down
    async fn dispose(&self) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Shared handle passed to every component callback
///
/// Carries the configuration, the three core services, sibling lookup by
/// capability, and the cancellation token scoped to the current run.
/// Cloning is cheap; everything inside is reference-counted.
#[derive(Clone)]
pub struct EngineContext {
    /// Loaded configuration
    pub config: Arc<Config>,
    /// URL scoring and queueing service
    pub prioritizer: Arc<UrlPrioritizer>,
    /// Per-domain admission control service
    pub limiter: Arc<AdaptiveRateLimiter>,
    /// Content version tracking service
    pub versions: Arc<ContentVersionStore>,
    registry: Arc<HashMap<Capability, Arc<dyn Component>>>,
    cancel: CancellationToken,
}

impl EngineContext {
    pub(crate) fn new(
        config: Arc<Config>,
        prioritizer: Arc<UrlPrioritizer>,
        limiter: Arc<AdaptiveRateLimiter>,
        versions: Arc<ContentVersionStore>,
        registry: Arc<HashMap<Capability, Arc<dyn Component>>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            prioritizer,
            limiter,
            versions,
            registry,
            cancel,
        }
    }

    /// Looks up the component registered for a capability
    pub fn component(&self, capability: Capability) -> Option<Arc<dyn Component>> {
        self.registry.get(&capability).cloned()
    }

    /// True once the current run has been asked to stop
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The cancellation token scoped to the current run
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        Config, CrawlConfig, LimiterConfig, OutputConfig, UserAgentConfig, VersioningConfig,
    };

    struct NullComponent;

    #[async_trait]
    impl Component for NullComponent {
        fn name(&self) -> &str {
            "null"
        }

        fn capability(&self) -> Capability {
            Capability::BrowserHandler
        }

        fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }

        async fn initialize(&self, _ctx: &EngineContext) -> Result<(), EngineError> {
            Ok(())
        }
    }

    fn test_config() -> Config {
        Config {
            crawl: CrawlConfig::default(),
            limiter: LimiterConfig::default(),
            versioning: VersioningConfig::default(),
            user_agent: UserAgentConfig {
                crawler_name: "TestCrawler".to_string(),
                crawler_version: "1.0".to_string(),
                contact_url: "https://example.com/about".to_string(),
                contact_email: "admin@example.com".to_string(),
            },
            output: OutputConfig {
                database_path: "./test.db".to_string(),
            },
            scraper: vec![],
        }
    }

    fn test_context(
        registry: HashMap<Capability, Arc<dyn Component>>,
        cancel: CancellationToken,
    ) -> EngineContext {
        EngineContext::new(
            Arc::new(test_config()),
            Arc::new(UrlPrioritizer::new()),
            Arc::new(AdaptiveRateLimiter::default()),
            Arc::new(ContentVersionStore::new()),
            Arc::new(registry),
            cancel,
        )
    }

    #[test]
    fn test_capability_display() {
        assert_eq!(Capability::UrlProcessor.to_string(), "url-processor");
        assert_eq!(Capability::ContentExtractor.to_string(), "content-extractor");
        assert_eq!(Capability::BrowserHandler.to_string(), "browser-handler");
    }

    #[tokio::test]
    async fn test_default_process_url_is_unsupported() {
        let ctx = test_context(HashMap::new(), CancellationToken::new());
        let component = NullComponent;

        let result = component.process_url(&ctx, "https://example.com/").await;
        assert!(matches!(
            result,
            Err(EngineError::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn test_component_lookup() {
        let mut registry: HashMap<Capability, Arc<dyn Component>> = HashMap::new();
        registry.insert(Capability::BrowserHandler, Arc::new(NullComponent));
        let ctx = test_context(registry, CancellationToken::new());

        assert!(ctx.component(Capability::BrowserHandler).is_some());
        assert!(ctx.component(Capability::UrlProcessor).is_none());
    }

    #[test]
    fn test_cancellation_visibility() {
        let cancel = CancellationToken::new();
        let ctx = test_context(HashMap::new(), cancel.clone());

        assert!(!ctx.is_cancelled());
        cancel.cancel();
        assert!(ctx.is_cancelled());
    }
}
