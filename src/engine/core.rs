//! Engine lifecycle and component registry
//!
//! The engine owns the three control services and sequences registered
//! components through a crawl run. Runs are cancellable at two levels: a
//! root token for the whole engine and a child token scoped to the current
//! run.

use crate::config::Config;
use crate::engine::{Capability, Component, EngineContext};
use crate::limiter::AdaptiveRateLimiter;
use crate::scoring::UrlPrioritizer;
use crate::versioning::ContentVersionStore;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Errors from engine lifecycle and component operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Components cannot be registered after initialization")]
    RegistrationAfterInit,

    #[error("Capability {capability} is already provided by component {component}")]
    DuplicateCapability {
        capability: Capability,
        component: String,
    },

    #[error("Component {component} failed to initialize: {reason}")]
    ComponentInit { component: String, reason: String },

    #[error("Operation {operation} is not valid in state {state}")]
    InvalidState {
        operation: String,
        state: EngineState,
    },

    #[error("Component {0} used before initialization")]
    NotInitialized(String),

    #[error("Component {component} does not support {operation}")]
    UnsupportedOperation {
        component: String,
        operation: String,
    },
}

/// Lifecycle state of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Components may still be registered
    Unconfigured,
    /// All components initialized, ready to run
    Initialized,
    /// A run is in flight
    Running,
    /// The last run was cancelled before finishing
    Stopped,
    /// The last run finished on its own
    Completed,
    /// The engine has been shut down
    Disposed,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Unconfigured => "unconfigured",
            EngineState::Initialized => "initialized",
            EngineState::Running => "running",
            EngineState::Stopped => "stopped",
            EngineState::Completed => "completed",
            EngineState::Disposed => "disposed",
        };
        write!(f, "{}", name)
    }
}

struct EngineInner {
    state: EngineState,
    /// Components in registration order
    components: Vec<Arc<dyn Component>>,
    by_capability: HashMap<Capability, Arc<dyn Component>>,
    run_cancel: Option<CancellationToken>,
}

/// Orchestrates components through crawl runs
///
/// The engine owns the prioritizer, rate limiter, and version store and
/// hands them to components through an [`EngineContext`]. Registration is
/// only allowed before initialization; each capability can be provided by
/// at most one component.
///
/// # Example
/// ```no_run
/// use driftwatch::config::Config;
/// use driftwatch::engine::{HttpFetcher, PageExtractor, ScraperEngine};
/// use std::sync::Arc;
///
/// # async fn example(config: Config) -> Result<(), driftwatch::engine::EngineError> {
/// let engine = ScraperEngine::new(config);
/// engine.register(Arc::new(PageExtractor::new()))?;
/// engine.register(Arc::new(HttpFetcher::new()))?;
/// engine.run().await?;
/// # Ok(())
/// # }
/// ```
pub struct ScraperEngine {
    config: Arc<Config>,
    prioritizer: Arc<UrlPrioritizer>,
    limiter: Arc<AdaptiveRateLimiter>,
    versions: Arc<ContentVersionStore>,
    root_cancel: CancellationToken,
    inner: Mutex<EngineInner>,
}

impl ScraperEngine {
    /// Creates an engine with fresh service state
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let limiter = Arc::new(AdaptiveRateLimiter::new(config.limiter.clone()));
        Self::with_services(
            config,
            Arc::new(UrlPrioritizer::new()),
            limiter,
            Arc::new(ContentVersionStore::new()),
        )
    }

    /// Creates an engine around pre-built services
    ///
    /// Used when service state is loaded from storage before the engine
    /// starts, so the caller can keep handles to the same services.
    pub fn with_services(
        config: Arc<Config>,
        prioritizer: Arc<UrlPrioritizer>,
        limiter: Arc<AdaptiveRateLimiter>,
        versions: Arc<ContentVersionStore>,
    ) -> Self {
        Self {
            config,
            prioritizer,
            limiter,
            versions,
            root_cancel: CancellationToken::new(),
            inner: Mutex::new(EngineInner {
                state: EngineState::Unconfigured,
                components: Vec::new(),
                by_capability: HashMap::new(),
                run_cancel: None,
            }),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> EngineState {
        self.inner.lock().unwrap().state
    }

    // ===== Registration =====

    /// Registers a component under its capability
    ///
    /// # Returns
    /// An error when the engine has already been initialized or when
    /// another component already provides the same capability.
    pub fn register(&self, component: Arc<dyn Component>) -> Result<(), EngineError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.state != EngineState::Unconfigured {
            return Err(EngineError::RegistrationAfterInit);
        }

        let capability = component.capability();
        if let Some(existing) = inner.by_capability.get(&capability) {
            return Err(EngineError::DuplicateCapability {
                capability,
                component: existing.name().to_string(),
            });
        }

        debug!(
            "Registered component {} for capability {}",
            component.name(),
            capability
        );
        inner.by_capability.insert(capability, component.clone());
        inner.components.push(component);
        Ok(())
    }

    // ===== Lifecycle =====

    /// Initializes all registered components in registration order
    ///
    /// The first component failure propagates and leaves the engine
    /// unconfigured; components initialized before the failure are not
    /// rolled back. Calling again on an already-initialized engine is a
    /// no-op.
    pub async fn initialize(&self) -> Result<(), EngineError> {
        let components = {
            let inner = self.inner.lock().unwrap();
            match inner.state {
                EngineState::Unconfigured => inner.components.clone(),
                EngineState::Disposed => {
                    return Err(EngineError::InvalidState {
                        operation: "initialize".to_string(),
                        state: inner.state,
                    })
                }
                _ => return Ok(()),
            }
        };

        let ctx = self.context_with(self.root_cancel.clone());
        for component in &components {
            debug!("Initializing component {}", component.name());
            component.initialize(&ctx).await?;
        }

        let mut inner = self.inner.lock().unwrap();
        inner.state = EngineState::Initialized;
        info!("Engine initialized with {} component(s)", components.len());
        Ok(())
    }

    /// Executes one crawl run over the configured seed URLs
    ///
    /// Initializes the engine first if needed. Every seed is handed to the
    /// url-processor component; per-seed failures are logged and the run
    /// moves on to the next seed.
    ///
    /// # Returns
    /// `Ok` when the run reached a terminal state, even if it was cancelled
    /// partway; check [`ScraperEngine::state`] to tell `Stopped` from
    /// `Completed`.
    pub async fn run(&self) -> Result<(), EngineError> {
        self.initialize().await?;

        let (components, run_cancel) = {
            let mut inner = self.inner.lock().unwrap();
            if inner.state != EngineState::Initialized {
                return Err(EngineError::InvalidState {
                    operation: "run".to_string(),
                    state: inner.state,
                });
            }
            let run_cancel = self.root_cancel.child_token();
            inner.run_cancel = Some(run_cancel.clone());
            inner.state = EngineState::Running;
            (inner.components.clone(), run_cancel)
        };

        let ctx = self.context_with(run_cancel.clone());

        info!("Run starting with {} component(s)", components.len());
        for component in &components {
            if let Err(e) = component.run_started(&ctx).await {
                warn!("Component {} run-started hook failed: {}", component.name(), e);
            }
        }

        match ctx.component(Capability::UrlProcessor) {
            Some(processor) => {
                let seeds: Vec<String> = self
                    .config
                    .seed_urls()
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                if seeds.is_empty() {
                    warn!("No seed URLs configured, nothing to process");
                }
                for seed in seeds {
                    if run_cancel.is_cancelled() {
                        info!("Run cancelled, skipping remaining seeds");
                        break;
                    }
                    info!("Processing seed {}", seed);
                    if let Err(e) = processor.process_url(&ctx, &seed).await {
                        error!("Seed {} failed: {}", seed, e);
                    }
                }
            }
            None => {
                warn!("No url-processor component registered, run has nothing to do");
            }
        }

        for component in &components {
            if let Err(e) = component.run_finished(&ctx).await {
                warn!("Component {} run-finished hook failed: {}", component.name(), e);
            }
        }

        let mut inner = self.inner.lock().unwrap();
        inner.run_cancel = None;
        // Dispose may have won the race while the run was draining
        if inner.state == EngineState::Running {
            inner.state = if run_cancel.is_cancelled() {
                EngineState::Stopped
            } else {
                EngineState::Completed
            };
        }
        info!("Run finished in state {}", inner.state);
        Ok(())
    }

    /// Asks the current run to stop
    ///
    /// Signals the run's cancellation token and gives every component its
    /// run-stopping callback. Does nothing when no run is in flight.
    pub async fn cancel(&self) {
        let (components, token) = {
            let inner = self.inner.lock().unwrap();
            (inner.components.clone(), inner.run_cancel.clone())
        };
        let token = match token {
            Some(token) => token,
            None => {
                debug!("Cancel requested with no run in flight");
                return;
            }
        };

        info!("Cancelling current run");
        token.cancel();

        let ctx = self.context_with(token);
        for component in &components {
            if let Err(e) = component.run_stopping(&ctx).await {
                warn!("Component {} run-stopping hook failed: {}", component.name(), e);
            }
        }
    }

    /// Shuts the engine down
    ///
    /// Cancels any in-flight work through the root token and disposes every
    /// component, logging failures instead of propagating them. Safe to call
    /// more than once.
    pub async fn dispose(&self) {
        let components = {
            let mut inner = self.inner.lock().unwrap();
            if inner.state == EngineState::Disposed {
                return;
            }
            inner.state = EngineState::Disposed;
            inner.run_cancel = None;
            inner.by_capability.clear();
            std::mem::take(&mut inner.components)
        };

        self.root_cancel.cancel();

        for component in &components {
            if let Err(e) = component.dispose().await {
                warn!("Component {} dispose failed: {}", component.name(), e);
            }
        }
        info!("Engine disposed");
    }

    /// Builds a context snapshot with the given cancellation token
    fn context_with(&self, cancel: CancellationToken) -> EngineContext {
        let registry = {
            let inner = self.inner.lock().unwrap();
            Arc::new(inner.by_capability.clone())
        };
        EngineContext::new(
            self.config.clone(),
            self.prioritizer.clone(),
            self.limiter.clone(),
            self.versions.clone(),
            registry,
            cancel,
        )
    }
}
