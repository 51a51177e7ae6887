//! View registry: logical view ids, entry resolution, capability flags.
//!
//! A view id is a relative, traversal-free path such as `get-time` or
//! `tools/clock`. Entry sources live under the reserved `apps/` tier of the
//! source root (`apps/<id>/page.tsx` or `page.jsx`, `.tsx` winning when both
//! exist) so that ids themselves never carry structural prefixes. Views are
//! immutable for the process lifetime; capability changes require a restart.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};

use thiserror::Error;

/// Reserved first segment of the source tree; ids must not begin with it.
pub const RESERVED_PREFIX: &str = "apps";

/// Entry file names tried in order; the first that exists wins.
pub const ENTRY_CANDIDATES: &[&str] = &["page.tsx", "page.jsx"];

/// Fixed artifact file names inside each view's output subdirectory.
pub const CLIENT_FILE: &str = "client.js";
pub const STYLESHEET_FILE: &str = "client.css";
pub const SERVER_FILE: &str = "server.js";

/// Errors raised while registering a view. Each variant names the exact
/// rule broken so callers can surface an actionable message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("view id '{id}' must be a relative path")]
    NotRelative { id: String },

    #[error("view id '{id}' must not contain traversal segment '{segment}'")]
    Traversal { id: String, segment: String },

    #[error("view id '{id}' must not begin with reserved prefix '{RESERVED_PREFIX}/'")]
    ReservedPrefix { id: String },

    #[error("no entry found for view '{id}': tried {tried}")]
    EntryNotFound { id: String, tried: String },

    #[error("view '{id}' cannot be both client-only and server-renderable")]
    ConflictingFlags { id: String },

    #[error("view '{id}' is already registered; capability changes require a restart")]
    AlreadyRegistered { id: String },
}

/// One registered UI entry point. Created once at registration and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    /// Logical id, relative and traversal-free (e.g. `tools/clock`).
    pub id: String,
    /// Resolved entry source, relative to the source root.
    pub entry: PathBuf,
    pub client_only: bool,
    pub server_renderable: bool,
    /// Derived output locations, relative to the output root.
    pub client_path: PathBuf,
    pub stylesheet_path: PathBuf,
    pub server_path: Option<PathBuf>,
}

impl View {
    fn derive(id: &str, entry: PathBuf, client_only: bool, server_renderable: bool) -> Self {
        let dir = PathBuf::from(id);
        Self {
            id: id.to_string(),
            entry,
            client_only,
            server_renderable,
            client_path: dir.join(CLIENT_FILE),
            stylesheet_path: dir.join(STYLESHEET_FILE),
            server_path: server_renderable.then(|| dir.join(SERVER_FILE)),
        }
    }
}

/// Process-wide registry mapping view ids to validated entry files.
#[derive(Debug)]
pub struct ViewRegistry {
    source_root: PathBuf,
    views: RwLock<HashMap<String, Arc<View>>>,
}

impl ViewRegistry {
    pub fn new(source_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            views: RwLock::new(HashMap::new()),
        }
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Register `id` and resolve its entry against the two-tier convention.
    pub fn register(
        &self,
        id: &str,
        client_only: bool,
        server_renderable: bool,
    ) -> Result<Arc<View>, ValidationError> {
        validate_id(id)?;
        if client_only && server_renderable {
            return Err(ValidationError::ConflictingFlags { id: id.to_string() });
        }

        let entry = self.resolve_entry(id)?;
        let mut views = self.views.write().expect("view registry lock poisoned");
        if views.contains_key(id) {
            return Err(ValidationError::AlreadyRegistered { id: id.to_string() });
        }

        let view = Arc::new(View::derive(id, entry, client_only, server_renderable));
        tracing::debug!(
            id,
            entry = %view.entry.display(),
            server_renderable,
            "registered view"
        );
        views.insert(id.to_string(), Arc::clone(&view));
        Ok(view)
    }

    pub fn get(&self, id: &str) -> Option<Arc<View>> {
        self.views
            .read()
            .expect("view registry lock poisoned")
            .get(id)
            .cloned()
    }

    /// All registered views, sorted by id for a deterministic build input order.
    pub fn list(&self) -> Vec<Arc<View>> {
        let mut views: Vec<Arc<View>> = self
            .views
            .read()
            .expect("view registry lock poisoned")
            .values()
            .cloned()
            .collect();
        views.sort_by(|a, b| a.id.cmp(&b.id));
        views
    }

    pub fn is_empty(&self) -> bool {
        self.views.read().expect("view registry lock poisoned").is_empty()
    }

    fn resolve_entry(&self, id: &str) -> Result<PathBuf, ValidationError> {
        let view_dir = Path::new(RESERVED_PREFIX).join(id);
        for candidate in ENTRY_CANDIDATES {
            let relative = view_dir.join(candidate);
            if self.source_root.join(&relative).is_file() {
                return Ok(relative);
            }
        }
        let tried = ENTRY_CANDIDATES
            .iter()
            .map(|candidate| view_dir.join(candidate).display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Err(ValidationError::EntryNotFound {
            id: id.to_string(),
            tried,
        })
    }
}

fn validate_id(id: &str) -> Result<(), ValidationError> {
    let path = Path::new(id);
    if id.is_empty() || path.is_absolute() || id.starts_with('/') || id.starts_with('\\') {
        return Err(ValidationError::NotRelative { id: id.to_string() });
    }

    let mut first = true;
    for component in path.components() {
        match component {
            Component::Normal(segment) => {
                if first && segment == RESERVED_PREFIX {
                    return Err(ValidationError::ReservedPrefix { id: id.to_string() });
                }
                first = false;
            }
            Component::CurDir | Component::ParentDir => {
                return Err(ValidationError::Traversal {
                    id: id.to_string(),
                    segment: component.as_os_str().to_string_lossy().into_owned(),
                });
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(ValidationError::NotRelative { id: id.to_string() });
            }
        }
    }
    // Catch "a//b" and trailing slashes, which Path normalizes away.
    if id.split('/').any(|segment| segment.is_empty()) {
        return Err(ValidationError::Traversal {
            id: id.to_string(),
            segment: String::new(),
        });
    }
    Ok(())
}
