//! Post-build transform hook: the invoke contract for optional output
//! post-processing. Transform internals are external; the orchestrator only
//! calls `apply` once per successful production build.

use std::path::Path;

use async_trait::async_trait;

#[async_trait]
pub trait Transform: Send + Sync {
    /// Stable name used in error reports and logs.
    fn name(&self) -> &str;

    /// Run one non-blocking transform pass over the finished output tree.
    async fn apply(&self, source_root: &Path, output_root: &Path) -> anyhow::Result<()>;
}
