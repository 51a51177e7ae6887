//! Bounded admission over the blocking sandbox.
//!
//! The pool does not keep warm engines; each admitted render provisions a
//! fresh sandbox on a blocking thread. The semaphore only caps how many of
//! those threads run at once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::debug;

use crate::sandbox::{render_blocking, EngineError, EngineLimits};

pub struct EnginePool {
    limits: EngineLimits,
    permits: Arc<Semaphore>,
    renders_started: AtomicU64,
}

impl EnginePool {
    pub fn new(limits: EngineLimits, max_engines: usize) -> Self {
        Self {
            limits,
            permits: Arc::new(Semaphore::new(max_engines.max(1))),
            renders_started: AtomicU64::new(0),
        }
    }

    /// Render one server script in a fresh sandbox, waiting for a free slot
    /// when all engines are busy.
    pub async fn render(&self, code: String) -> Result<String, EngineError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| EngineError::Provision {
                message: "engine pool is shut down".to_string(),
            })?;

        self.renders_started.fetch_add(1, Ordering::SeqCst);
        debug!(bytes = code.len(), "starting sandbox render");

        let limits = self.limits.clone();
        tokio::task::spawn_blocking(move || render_blocking(&code, &limits))
            .await
            .map_err(|err| EngineError::Provision {
                message: format!("sandbox worker aborted: {err}"),
            })?
    }

    /// Number of renders that reached a sandbox since the pool was created.
    /// Cache hits and coalesced waiters never increment this.
    pub fn renders_started(&self) -> u64 {
        self.renders_started.load(Ordering::SeqCst)
    }

    pub fn limits(&self) -> &EngineLimits {
        &self.limits
    }
}
