//! Viewsmith: on-demand UI bundling and server rendering.
//!
//! A host layer registers view entry points, triggers a production build or
//! a development watch session, and serves each request through
//! [`RenderService::get_bundle`]. Server-renderable views execute their
//! bundled server script inside a disposable QuickJS sandbox; rendered HTML
//! is cached per view keyed by the artifact fingerprint of the last build.

pub mod cache;
pub mod error;
pub mod page;
pub mod service;

pub use cache::RenderCache;
pub use error::Error;
pub use page::render_page;
pub use service::{RenderService, ViewBundle};

pub use viewsmith_build::{BuildState, Orchestrator};
pub use viewsmith_bundler::{BuildError, BundleRequest, Bundler, CommandBundler, Transform};
pub use viewsmith_core::config::{BuildConfig, ObservabilityConfig, RenderConfig};
pub use viewsmith_core::fingerprint::Fingerprint;
pub use viewsmith_core::manifest::{ArtifactDescriptor, BuildManifest, ViewArtifacts};
pub use viewsmith_core::metadata::{merge_metadata, resolve_metadata_url, Metadata};
pub use viewsmith_core::observability::init_tracing;
pub use viewsmith_core::view::{ValidationError, View, ViewRegistry};
pub use viewsmith_engine::{EngineError, EngineLimits, EnginePool};
