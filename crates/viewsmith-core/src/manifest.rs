//! Build manifest: the authoritative mapping of view ids to artifact sets.
//!
//! A manifest is produced wholesale by one bundle pass and replaced
//! atomically by the orchestrator. Readers never observe a manifest that
//! references a half-written artifact set.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Size and mtime of one on-disk artifact, as stat'ed after a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    pub path: PathBuf,
    pub len: u64,
    /// Modification time in milliseconds since the Unix epoch.
    pub mtime_ms: u64,
}

impl ArtifactDescriptor {
    /// Stat `path` into a descriptor. Fails if the artifact is missing.
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        let mtime_ms = meta
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Ok(Self {
            path: path.to_path_buf(),
            len: meta.len(),
            mtime_ms,
        })
    }
}

/// Artifact set for one view: client script always, stylesheet when the view
/// produces styles, server script iff the view is server-renderable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewArtifacts {
    pub client: ArtifactDescriptor,
    pub stylesheet: Option<ArtifactDescriptor>,
    pub server: Option<ArtifactDescriptor>,
}

/// Mapping from view id to its current artifacts, plus the build instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildManifest {
    views: HashMap<String, ViewArtifacts>,
    pub built_at: DateTime<Utc>,
}

impl BuildManifest {
    pub fn new(views: HashMap<String, ViewArtifacts>) -> Self {
        Self {
            views,
            built_at: Utc::now(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&ViewArtifacts> {
        self.views.get(id)
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn view_ids(&self) -> impl Iterator<Item = &str> {
        self.views.keys().map(String::as_str)
    }
}
