//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use tower_sessions::Session;
use tracing::{debug, info};
use uuid::Uuid;

use crate::client::{ConsoleApi, HttpConsoleApi};
use crate::config::Config;
use crate::console::{self, CLIENT_ID_KEY, ConsoleHub, RefreshOutcome, SharedContext};
use crate::error::AppResult;
use crate::metrics::Metrics;
use crate::registry::ComponentRegistry;
use crate::theme::ThemeEngine;

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,

    /// Upstream account, platform, and file services.
    api: Arc<dyn ConsoleApi>,

    /// Screens the console can mount. Read-only after startup.
    registry: ComponentRegistry,

    /// Per-browser console contexts.
    hub: ConsoleHub,

    /// Theme engine for template rendering.
    theme: ThemeEngine,

    /// Prometheus metrics.
    metrics: Metrics,
}

impl AppState {
    /// Create state talking to the configured upstream services.
    pub fn new(config: Config) -> Result<Self> {
        let api = HttpConsoleApi::new(&config).context("failed to build upstream client")?;
        Self::with_api(config, Arc::new(api))
    }

    /// Create state around any [`ConsoleApi`] implementation.
    pub fn with_api(config: Config, api: Arc<dyn ConsoleApi>) -> Result<Self> {
        let theme = match &config.template_dir {
            Some(dir) => ThemeEngine::new(dir)?,
            None => ThemeEngine::builtin()?,
        };
        let registry = ComponentRegistry::builtin();
        let hub = ConsoleHub::new(
            config.context_idle(),
            config.upload_max_files,
            config.upload_max_total_bytes(),
        );

        info!(
            screens = registry.len(),
            acc = %config.acc_api_url,
            "application state initialized"
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                api,
                registry,
                hub,
                theme,
                metrics: Metrics::new(),
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn api(&self) -> &dyn ConsoleApi {
        self.inner.api.as_ref()
    }

    /// Owned handle for spawned tasks.
    pub fn api_handle(&self) -> Arc<dyn ConsoleApi> {
        Arc::clone(&self.inner.api)
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.inner.registry
    }

    pub fn hub(&self) -> &ConsoleHub {
        &self.inner.hub
    }

    pub fn theme(&self) -> &ThemeEngine {
        &self.inner.theme
    }

    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    /// The console context for this browser.
    ///
    /// A guest context with a persisted token marker is restored and its
    /// navigation refreshed before it is returned.
    pub async fn console(&self, session: &Session) -> AppResult<SharedContext> {
        let client = console::client_id(session).await?;
        let context = self.hub().context(client);
        self.metrics().set_console_contexts(self.hub().len());

        if let Some(outcome) =
            console::rehydrate(self.api(), self.registry(), &context, session).await
        {
            self.record_refresh(outcome);
        }
        Ok(context)
    }

    /// Forget this browser's console context, e.g. after logout.
    pub async fn discard_console(&self, session: &Session) -> AppResult<()> {
        if let Some(client) = session.get::<Uuid>(CLIENT_ID_KEY).await?
            && self.hub().discard(client)
        {
            debug!(%client, "console context discarded");
        }
        self.metrics().set_console_contexts(self.hub().len());
        Ok(())
    }

    /// Drop console contexts idle past the session expiry.
    pub fn evict_idle_contexts(&self) -> usize {
        let evicted = self.hub().evict_idle();
        if evicted > 0 {
            info!(evicted, remaining = self.hub().len(), "evicted idle console contexts");
        }
        self.metrics().set_console_contexts(self.hub().len());
        evicted
    }

    /// Refetch the permission tree for a context.
    pub async fn refresh(&self, context: &SharedContext, session: &Session) -> RefreshOutcome {
        let outcome =
            console::refresh_navigation(self.api(), self.registry(), context, session).await;
        self.record_refresh(outcome);
        outcome
    }

    pub(crate) fn record_refresh(&self, outcome: RefreshOutcome) {
        let dropped = match outcome {
            RefreshOutcome::Applied { dropped } => dropped,
            _ => 0,
        };
        self.metrics().record_refresh(outcome.as_str(), dropped);
    }
}
