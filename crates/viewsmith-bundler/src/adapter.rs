//! Bundler contract: the external compiler is a capability with a fixed
//! input/output shape, never something this workspace reimplements.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use viewsmith_core::manifest::BuildManifest;
use viewsmith_core::view::View;

/// One bundle pass over the full registered view set.
#[derive(Debug, Clone)]
pub struct BundleRequest {
    /// Views in deterministic (id-sorted) order.
    pub views: Vec<Arc<View>>,
    /// Development pass: unminified, incremental-friendly output.
    pub dev: bool,
    pub minify: bool,
    pub output_root: PathBuf,
    pub source_root: PathBuf,
}

/// Errors surfaced by a bundle pass. A failed pass must not partially apply
/// its output; the previous manifest stays authoritative.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("no views registered; nothing to bundle")]
    NoViews,

    #[error("failed to launch bundler '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("bundler reported a compile failure:\n{diagnostics}")]
    Compiler { diagnostics: String },

    #[error("bundler manifest is malformed: {reason}")]
    MalformedManifest { reason: String },

    #[error("bundler produced no {kind} artifact for view '{view}' at {path}")]
    MissingArtifact {
        view: String,
        kind: &'static str,
        path: PathBuf,
    },

    #[error("post-build transform '{name}' failed: {message}")]
    Transform { name: String, message: String },

    #[error("failed to start source watcher: {0}")]
    Watch(String),

    #[error("build i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

/// External bundling capability. Given views plus mode flags it writes the
/// per-view artifact layout under the output root and returns a manifest.
#[async_trait]
pub trait Bundler: Send + Sync {
    async fn bundle(&self, request: &BundleRequest) -> Result<BuildManifest, BuildError>;
}
