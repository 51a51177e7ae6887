//! Build lifecycle state machine.
//!
//! Production: one blocking bundle pass, minified, transforms applied after
//! success. Development: a first awaited pass, then a background worker that
//! watches the source root, coalesces change bursts, rebuilds, and publishes
//! each successful manifest atomically through a watch channel. Readers only
//! ever see the last fully successful manifest.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use viewsmith_bundler::{BuildError, BundleRequest, Bundler, Transform};
use viewsmith_core::config::BuildConfig;
use viewsmith_core::manifest::BuildManifest;
use viewsmith_core::view::ViewRegistry;

use crate::watch::ChangeWatcher;

/// Lifecycle states. `Failed` is terminal for the production path only; the
/// development loop returns to `WatchingIdle` after a failed rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Idle,
    Building,
    WatchingIdle,
    WatchingBuilding,
    Failed,
}

struct Shared {
    registry: Arc<ViewRegistry>,
    bundler: Arc<dyn Bundler>,
    transforms: Vec<Arc<dyn Transform>>,
    config: BuildConfig,
    state: StdMutex<BuildState>,
    manifest_tx: watch::Sender<Option<Arc<BuildManifest>>>,
    last_error: StdMutex<Option<String>>,
    // Serializes bundle passes; at most one rebuild is ever in flight.
    build_guard: AsyncMutex<()>,
}

impl Shared {
    fn set_state(&self, next: BuildState) {
        *self.state.lock().expect("state lock poisoned") = next;
    }

    fn record_failure(&self, err: &BuildError) {
        *self.last_error.lock().expect("error lock poisoned") = Some(err.to_string());
    }

    fn clear_failure(&self) {
        *self.last_error.lock().expect("error lock poisoned") = None;
    }

    async fn bundle_pass(&self, dev: bool, minify: bool) -> Result<BuildManifest, BuildError> {
        let request = BundleRequest {
            views: self.registry.list(),
            dev,
            minify,
            output_root: self.config.output_root.clone(),
            source_root: self.config.source_root.clone(),
        };
        debug!(views = request.views.len(), dev, minify, "starting bundle pass");
        self.bundler.bundle(&request).await
    }

    async fn apply_transforms(&self) -> Result<(), BuildError> {
        for transform in &self.transforms {
            transform
                .apply(&self.config.source_root, &self.config.output_root)
                .await
                .map_err(|err| BuildError::Transform {
                    name: transform.name().to_string(),
                    message: format!("{err:#}"),
                })?;
        }
        Ok(())
    }

    fn publish(&self, manifest: BuildManifest) {
        let views = manifest.len();
        self.manifest_tx.send_replace(Some(Arc::new(manifest)));
        self.clear_failure();
        info!(views, "published build manifest");
    }

    /// One development rebuild: build, publish on success, retain the prior
    /// manifest and record the error on failure. Never propagates.
    async fn dev_rebuild(&self) {
        let _pass = self.build_guard.lock().await;
        self.set_state(BuildState::WatchingBuilding);
        match self.bundle_pass(true, false).await {
            Ok(manifest) => self.publish(manifest),
            Err(err) => {
                warn!(error = %err, "rebuild failed; serving previous manifest");
                self.record_failure(&err);
            }
        }
        self.set_state(BuildState::WatchingIdle);
    }
}

pub struct Orchestrator {
    shared: Arc<Shared>,
    stop_tx: watch::Sender<bool>,
    worker: StdMutex<Option<JoinHandle<()>>>,
}

impl Orchestrator {
    pub fn new(registry: Arc<ViewRegistry>, bundler: Arc<dyn Bundler>, config: BuildConfig) -> Self {
        Self::with_transforms(registry, bundler, config, Vec::new())
    }

    pub fn with_transforms(
        registry: Arc<ViewRegistry>,
        bundler: Arc<dyn Bundler>,
        config: BuildConfig,
        transforms: Vec<Arc<dyn Transform>>,
    ) -> Self {
        let (manifest_tx, _) = watch::channel(None);
        let (stop_tx, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                registry,
                bundler,
                transforms,
                config,
                state: StdMutex::new(BuildState::Idle),
                manifest_tx,
                last_error: StdMutex::new(None),
                build_guard: AsyncMutex::new(()),
            }),
            stop_tx,
            worker: StdMutex::new(None),
        }
    }

    pub fn state(&self) -> BuildState {
        *self.shared.state.lock().expect("state lock poisoned")
    }

    /// The last atomically published manifest, if any build has succeeded.
    pub fn manifest(&self) -> Option<Arc<BuildManifest>> {
        self.shared.manifest_tx.borrow().clone()
    }

    /// Error text of the most recent failed build, cleared by the next
    /// successful one. Dev-mode failures surface here rather than to a caller.
    pub fn last_build_error(&self) -> Option<String> {
        self.shared
            .last_error
            .lock()
            .expect("error lock poisoned")
            .clone()
    }

    /// One blocking production pass: minified, no dev affordances. Success
    /// publishes atomically; failure leaves any prior manifest authoritative.
    pub async fn build_production(&self) -> Result<(), BuildError> {
        let _pass = self.shared.build_guard.lock().await;
        self.shared.set_state(BuildState::Building);
        let built = self.shared.bundle_pass(false, true).await;
        let manifest = match built {
            Ok(manifest) => manifest,
            Err(err) => {
                error!(error = %err, "production build failed");
                self.shared.record_failure(&err);
                self.shared.set_state(BuildState::Failed);
                return Err(err);
            }
        };
        if let Err(err) = self.shared.apply_transforms().await {
            error!(error = %err, "post-build transform failed");
            self.shared.record_failure(&err);
            self.shared.set_state(BuildState::Failed);
            return Err(err);
        }
        self.shared.publish(manifest);
        self.shared.set_state(BuildState::Idle);
        Ok(())
    }

    /// Run the first development build, then hand the source tree to a
    /// background watch worker. Returns once the first manifest is published.
    pub async fn begin_dev_session(&self) -> Result<(), BuildError> {
        {
            let worker = self.worker.lock().expect("worker lock poisoned");
            if worker.is_some() {
                return Err(BuildError::Watch(
                    "development session already running".to_string(),
                ));
            }
        }

        {
            let _pass = self.shared.build_guard.lock().await;
            self.shared.set_state(BuildState::Building);
            match self.shared.bundle_pass(true, false).await {
                Ok(manifest) => self.shared.publish(manifest),
                Err(err) => {
                    error!(error = %err, "initial development build failed");
                    self.shared.record_failure(&err);
                    self.shared.set_state(BuildState::Failed);
                    return Err(err);
                }
            }
        }
        self.shared.set_state(BuildState::WatchingIdle);

        let watcher = ChangeWatcher::start(
            &self.shared.config.source_root,
            &self.shared.config.output_root,
        )?;
        let shared = Arc::clone(&self.shared);
        let mut stop_rx = self.stop_tx.subscribe();
        let handle = tokio::spawn(async move {
            watch_loop(shared, watcher, &mut stop_rx).await;
        });
        *self.worker.lock().expect("worker lock poisoned") = Some(handle);
        info!("development watch session started");
        Ok(())
    }

    /// Stop the watch worker and wait for it to exit. Safe to call without
    /// an active session.
    pub async fn shutdown(&self) {
        let _ = self.stop_tx.send(true);
        let handle = self.worker.lock().expect("worker lock poisoned").take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(error = %err, "watch worker exited abnormally");
            }
        }
        self.shared.set_state(BuildState::Idle);
    }
}

async fn watch_loop(
    shared: Arc<Shared>,
    mut watcher: ChangeWatcher,
    stop_rx: &mut watch::Receiver<bool>,
) {
    let window = Duration::from_millis(shared.config.watch_debounce_ms);
    loop {
        tokio::select! {
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
            event = watcher.recv() => {
                if event.is_none() {
                    warn!("watch channel closed; ending development session");
                    break;
                }
                watcher.debounce(window).await;
                shared.dev_rebuild().await;
                // Changes that land mid-build coalesce into one follow-up
                // pass per build in flight; none are ever dropped.
                while watcher.drain_pending() {
                    shared.dev_rebuild().await;
                }
            }
        }
    }
    debug!("watch worker stopped");
}
