//! External-command bundler adapter.
//!
//! The compiler is invoked as a subprocess: it receives one `--entry`
//! (and `--server-entry`) per artifact, writes the per-view layout into a
//! staging directory, and prints a JSON manifest on stdout. That manifest is
//! loosely typed; it is validated strictly at this boundary before anything
//! is promoted into the live output root, so a failed pass never partially
//! applies its output.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use viewsmith_core::manifest::{ArtifactDescriptor, BuildManifest, ViewArtifacts};
use viewsmith_core::view::View;

use crate::adapter::{BuildError, BundleRequest, Bundler};

/// Artifact paths declared by the compiler, validated against the fixed
/// per-view layout before use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DeclaredArtifacts {
    pub client: PathBuf,
    pub stylesheet: Option<PathBuf>,
    pub server: Option<PathBuf>,
}

/// Invokes the configured external bundler executable per bundle pass.
#[derive(Debug, Clone)]
pub struct CommandBundler {
    program: String,
}

impl CommandBundler {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl Bundler for CommandBundler {
    async fn bundle(&self, request: &BundleRequest) -> Result<BuildManifest, BuildError> {
        if request.views.is_empty() {
            return Err(BuildError::NoViews);
        }

        tokio::fs::create_dir_all(&request.output_root).await?;
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&request.output_root)?;

        let mut command = Command::new(&self.program);
        command
            .arg("--cwd")
            .arg(&request.source_root)
            .arg("--out-dir")
            .arg(staging.path())
            .current_dir(&request.source_root);
        if request.dev {
            command.arg("--dev");
        }
        if request.minify {
            command.arg("--minify");
        }
        for view in &request.views {
            command
                .arg("--entry")
                .arg(format!("{}={}", view.client_path.display(), view.entry.display()));
            if let Some(server_path) = &view.server_path {
                command
                    .arg("--server-entry")
                    .arg(format!("{}={}", server_path.display(), view.entry.display()));
            }
        }

        tracing::debug!(
            program = %self.program,
            views = request.views.len(),
            dev = request.dev,
            minify = request.minify,
            "invoking bundler"
        );
        let output = command.output().await.map_err(|source| BuildError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let diagnostics = if stderr.trim().is_empty() {
                String::from_utf8_lossy(&output.stdout).into_owned()
            } else {
                stderr.into_owned()
            };
            return Err(BuildError::Compiler { diagnostics });
        }

        let raw: Value =
            serde_json::from_slice(&output.stdout).map_err(|err| BuildError::MalformedManifest {
                reason: format!("stdout is not valid JSON: {err}"),
            })?;
        let declared = validate_manifest(&raw, &request.views)?;

        promote(staging.path(), &request.output_root, &request.views).await?;
        let manifest = describe_outputs(&request.output_root, &request.views, &declared)?;
        tracing::info!(views = manifest.len(), "bundle pass complete");
        Ok(manifest)
    }
}

fn manifest_str(entry: &Value, key: &str, id: &str) -> Result<Option<PathBuf>, BuildError> {
    match entry.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(path)) => Ok(Some(PathBuf::from(path))),
        Some(other) => Err(BuildError::MalformedManifest {
            reason: format!("view '{id}' field '{key}' must be a string, got {other}"),
        }),
    }
}

/// Validate the compiler's loosely-typed manifest against the registered
/// views and the fixed per-view artifact layout.
pub(crate) fn validate_manifest(
    raw: &Value,
    views: &[std::sync::Arc<View>],
) -> Result<HashMap<String, DeclaredArtifacts>, BuildError> {
    let entries = raw
        .get("views")
        .and_then(Value::as_object)
        .ok_or_else(|| BuildError::MalformedManifest {
            reason: "missing top-level 'views' object".to_string(),
        })?;

    let known: HashMap<&str, &std::sync::Arc<View>> =
        views.iter().map(|view| (view.id.as_str(), view)).collect();
    for id in entries.keys() {
        if !known.contains_key(id.as_str()) {
            return Err(BuildError::MalformedManifest {
                reason: format!("manifest names unregistered view '{id}'"),
            });
        }
    }

    let mut declared = HashMap::new();
    for view in views {
        let id = view.id.as_str();
        let entry = entries.get(id).ok_or_else(|| BuildError::MalformedManifest {
            reason: format!("manifest is missing view '{id}'"),
        })?;
        if !entry.is_object() {
            return Err(BuildError::MalformedManifest {
                reason: format!("view '{id}' entry must be an object"),
            });
        }

        let client = manifest_str(entry, "client", id)?.ok_or_else(|| {
            BuildError::MalformedManifest {
                reason: format!("view '{id}' declares no client artifact"),
            }
        })?;
        if client != view.client_path {
            return Err(BuildError::MalformedManifest {
                reason: format!(
                    "view '{id}' client artifact must be '{}', got '{}'",
                    view.client_path.display(),
                    client.display()
                ),
            });
        }

        let stylesheet = manifest_str(entry, "css", id)?;
        if let Some(css) = &stylesheet {
            if *css != view.stylesheet_path {
                return Err(BuildError::MalformedManifest {
                    reason: format!(
                        "view '{id}' stylesheet must be '{}', got '{}'",
                        view.stylesheet_path.display(),
                        css.display()
                    ),
                });
            }
        }

        let server = manifest_str(entry, "server", id)?;
        match (&view.server_path, &server) {
            (Some(expected), Some(actual)) if expected == actual => {}
            (Some(expected), Some(actual)) => {
                return Err(BuildError::MalformedManifest {
                    reason: format!(
                        "view '{id}' server artifact must be '{}', got '{}'",
                        expected.display(),
                        actual.display()
                    ),
                });
            }
            (Some(_), None) => {
                return Err(BuildError::MalformedManifest {
                    reason: format!("view '{id}' is server-renderable but declares no server artifact"),
                });
            }
            (None, Some(_)) => {
                return Err(BuildError::MalformedManifest {
                    reason: format!("view '{id}' is not server-renderable yet declares a server artifact"),
                });
            }
            (None, None) => {}
        }

        declared.insert(
            view.id.clone(),
            DeclaredArtifacts {
                client,
                stylesheet,
                server,
            },
        );
    }
    Ok(declared)
}

/// Move each staged per-view directory into the live output root. The
/// manifest swap governs readers; on-disk promotion is per view-directory.
/// An existing directory is retired into the staging area rather than
/// deleted in place, so the swap is two renames and readers holding open
/// handles to the old artifacts keep them; the retired copy goes away when
/// the staging directory is cleaned up.
async fn promote(
    staging: &Path,
    output_root: &Path,
    views: &[std::sync::Arc<View>],
) -> Result<(), BuildError> {
    for view in views {
        let staged = staging.join(&view.id);
        let target = output_root.join(&view.id);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        if tokio::fs::metadata(&target).await.is_ok() {
            let retired = staging.join(format!(".retired-{}", view.id.replace('/', "_")));
            tokio::fs::rename(&target, &retired).await?;
        }
        tokio::fs::rename(&staged, &target).await?;
    }
    Ok(())
}

/// Stat the promoted artifacts into a manifest, using the validated
/// declarations to decide which optional artifacts must exist.
pub(crate) fn describe_outputs(
    output_root: &Path,
    views: &[std::sync::Arc<View>],
    declared: &HashMap<String, DeclaredArtifacts>,
) -> Result<BuildManifest, BuildError> {
    let mut entries = HashMap::new();
    for view in views {
        let decl = declared
            .get(&view.id)
            .ok_or_else(|| BuildError::MalformedManifest {
                reason: format!("view '{}' missing from validated declarations", view.id),
            })?;

        let stat = |relative: &Path, kind: &'static str| -> Result<ArtifactDescriptor, BuildError> {
            let path = output_root.join(relative);
            ArtifactDescriptor::from_path(&path).map_err(|_| BuildError::MissingArtifact {
                view: view.id.clone(),
                kind,
                path,
            })
        };

        let client = stat(&decl.client, "client")?;
        let stylesheet = decl
            .stylesheet
            .as_deref()
            .map(|css| stat(css, "stylesheet"))
            .transpose()?;
        let server = decl
            .server
            .as_deref()
            .map(|server| stat(server, "server"))
            .transpose()?;

        entries.insert(
            view.id.clone(),
            ViewArtifacts {
                client,
                stylesheet,
                server,
            },
        );
    }
    Ok(BuildManifest::new(entries))
}
