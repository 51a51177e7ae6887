//! Render service façade: the single per-request entry point.
//!
//! Composes the registry, orchestrator, engine pool, and render cache.
//! `get_bundle` resolves a view, reads the last published manifest, and for
//! server-renderable views runs (or reuses) a sandboxed render keyed by the
//! view's artifact fingerprint.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::instrument;

use viewsmith_build::{BuildState, Orchestrator};
use viewsmith_bundler::{Bundler, CommandBundler, Transform};
use viewsmith_core::config::{BuildConfig, RenderConfig};
use viewsmith_core::fingerprint::Fingerprint;
use viewsmith_core::view::{View, ViewRegistry};
use viewsmith_engine::{EngineLimits, EnginePool};

use crate::cache::RenderCache;
use crate::error::Error;

/// Artifact references plus optional server-rendered HTML for one view.
#[derive(Debug, Clone)]
pub struct ViewBundle {
    pub view_id: String,
    pub client_script: PathBuf,
    pub stylesheet: Option<PathBuf>,
    pub rendered_html: Option<String>,
}

pub struct RenderService {
    registry: Arc<ViewRegistry>,
    orchestrator: Orchestrator,
    engines: Arc<EnginePool>,
    cache: RenderCache,
}

impl RenderService {
    pub fn new(bundler: Arc<dyn Bundler>, build: BuildConfig, render: RenderConfig) -> Self {
        Self::with_transforms(bundler, build, render, Vec::new())
    }

    pub fn with_transforms(
        bundler: Arc<dyn Bundler>,
        build: BuildConfig,
        render: RenderConfig,
        transforms: Vec<Arc<dyn Transform>>,
    ) -> Self {
        let registry = Arc::new(ViewRegistry::new(&build.source_root));
        let limits = EngineLimits {
            budget: Duration::from_millis(render.budget_ms),
            job_budget: render.job_budget,
            max_memory_bytes: (render.max_memory_mb as usize) * 1024 * 1024,
        };
        Self {
            orchestrator: Orchestrator::with_transforms(
                Arc::clone(&registry),
                bundler,
                build,
                transforms,
            ),
            engines: Arc::new(EnginePool::new(limits, render.max_engines as usize)),
            cache: RenderCache::new(render.cache_enabled),
            registry,
        }
    }

    /// Construct from `VIEWSMITH_*` environment variables with the external
    /// command bundler.
    pub fn from_env() -> Self {
        let build = BuildConfig::from_env();
        let render = RenderConfig::from_env();
        let bundler = Arc::new(CommandBundler::new(&build.bundler_program));
        Self::new(bundler, build, render)
    }

    pub fn registry(&self) -> &ViewRegistry {
        &self.registry
    }

    pub fn register(
        &self,
        id: &str,
        client_only: bool,
        server_renderable: bool,
    ) -> Result<Arc<View>, Error> {
        Ok(self.registry.register(id, client_only, server_renderable)?)
    }

    /// Blocking one-shot production build.
    pub async fn build_production(&self) -> Result<(), Error> {
        Ok(self.orchestrator.build_production().await?)
    }

    /// First development build, then background watch-and-rebuild.
    pub async fn begin_dev_session(&self) -> Result<(), Error> {
        Ok(self.orchestrator.begin_dev_session().await?)
    }

    pub fn build_state(&self) -> BuildState {
        self.orchestrator.state()
    }

    /// Error text of the last failed (re)build, for host-layer polling.
    pub fn last_build_error(&self) -> Option<String> {
        self.orchestrator.last_build_error()
    }

    /// Renders that actually reached a sandbox; cache hits never count.
    pub fn renders_started(&self) -> u64 {
        self.engines.renders_started()
    }

    pub async fn shutdown(&self) {
        self.orchestrator.shutdown().await;
    }

    /// Resolve one view against the current manifest and return artifact
    /// references plus server-rendered HTML where it applies.
    #[instrument(skip(self))]
    pub async fn get_bundle(&self, view_id: &str) -> Result<ViewBundle, Error> {
        let view = self
            .registry
            .get(view_id)
            .ok_or_else(|| Error::NotRegistered(view_id.to_string()))?;
        let manifest = self
            .orchestrator
            .manifest()
            .ok_or_else(|| Error::NotBuilt(view_id.to_string()))?;
        let artifacts = manifest
            .get(view_id)
            .ok_or_else(|| Error::NotBuilt(view_id.to_string()))?;

        let mut rendered_html = None;
        if view.server_renderable {
            if let Some(server) = &artifacts.server {
                let fingerprint = Fingerprint::of(artifacts);
                let server_path = server.path.clone();
                let engines = Arc::clone(&self.engines);
                let html = self
                    .cache
                    .get_or_render(view_id, &fingerprint, || async move {
                        let code = tokio::fs::read_to_string(&server_path).await?;
                        Ok(engines.render(code).await?)
                    })
                    .await?;
                rendered_html = Some(html);
            }
        }

        Ok(ViewBundle {
            view_id: view.id.clone(),
            client_script: artifacts.client.path.clone(),
            stylesheet: artifacts.stylesheet.as_ref().map(|s| s.path.clone()),
            rendered_html,
        })
    }
}
