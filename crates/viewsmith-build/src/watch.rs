//! Source tree watching for the development loop.
//!
//! Raw notify events are filtered down to source-relevant paths, forwarded
//! over an unbounded channel, and coalesced by the caller through a sliding
//! debounce window so an editor save burst triggers one rebuild.

use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use viewsmith_bundler::BuildError;

/// Source file extensions that can affect a bundle.
const SOURCE_EXTENSIONS: &[&str] = &["tsx", "jsx", "ts", "js", "css", "json"];

/// A live watch session over the source root. Dropping it stops the
/// underlying filesystem watcher.
pub struct ChangeWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::UnboundedReceiver<()>,
}

impl ChangeWatcher {
    /// Watch `source_root` recursively, ignoring anything under
    /// `output_root` so the orchestrator's own writes never retrigger it.
    pub fn start(source_root: &Path, output_root: &Path) -> Result<Self, BuildError> {
        let (tx, rx) = mpsc::unbounded_channel::<()>();
        let output_root = output_root.to_path_buf();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    if event_is_relevant(&event, &output_root) {
                        let _ = tx.send(());
                    }
                }
                // Watcher errors are treated as a possible change; a spurious
                // rebuild is cheaper than a missed one.
                Err(_) => {
                    let _ = tx.send(());
                }
            }
        })
        .map_err(|e| BuildError::Watch(format!("failed to initialize watcher: {e}")))?;

        watcher
            .watch(source_root, RecursiveMode::Recursive)
            .map_err(|e| {
                BuildError::Watch(format!("failed to watch {}: {e}", source_root.display()))
            })?;

        Ok(Self {
            _watcher: watcher,
            rx,
        })
    }

    /// Wait for the next relevant change. `None` means the watcher callback
    /// was dropped and the session is over.
    pub async fn recv(&mut self) -> Option<()> {
        self.rx.recv().await
    }

    /// Absorb a burst: keep resetting the deadline while notifications keep
    /// arriving, return once `window` passes quietly.
    pub async fn debounce(&mut self, window: Duration) {
        let mut deadline = Instant::now() + window;
        let sleep = tokio::time::sleep_until(deadline.into());
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => break,
                maybe = self.rx.recv() => {
                    if maybe.is_none() {
                        break;
                    }
                    deadline = Instant::now() + window;
                    sleep.as_mut().reset(deadline.into());
                }
            }
        }
    }

    /// Discard notifications queued during a rebuild. Returns true when at
    /// least one was pending, meaning sources changed mid-build.
    pub fn drain_pending(&mut self) -> bool {
        let mut any = false;
        while self.rx.try_recv().is_ok() {
            any = true;
        }
        any
    }
}

fn event_is_relevant(event: &Event, output_root: &Path) -> bool {
    event
        .paths
        .iter()
        .any(|path| path_is_relevant(path, output_root))
}

fn path_is_relevant(path: &Path, output_root: &Path) -> bool {
    if path.starts_with(output_root) || has_ignored_segment(path) {
        return false;
    }
    if path.is_dir() {
        return true;
    }
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => SOURCE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
        None => false,
    }
}

fn has_ignored_segment(path: &Path) -> bool {
    path.components().any(|component| match component {
        Component::Normal(segment) => {
            let segment = segment.to_string_lossy();
            matches!(segment.as_ref(), ".git" | "node_modules" | ".viewsmith")
                || segment.starts_with(".staging-")
        }
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_files_are_relevant_outside_the_output_root() {
        let out = PathBuf::from("/srv/pages/.viewsmith-out");
        assert!(path_is_relevant(
            Path::new("/srv/pages/apps/hello/page.tsx"),
            &out
        ));
        assert!(path_is_relevant(
            Path::new("/srv/pages/apps/hello/styles.css"),
            &out
        ));
    }

    #[test]
    fn output_root_writes_are_filtered_out() {
        let out = PathBuf::from("/srv/pages/.viewsmith-out");
        assert!(!path_is_relevant(
            Path::new("/srv/pages/.viewsmith-out/hello/client.js"),
            &out
        ));
    }

    #[test]
    fn ignored_segments_and_foreign_extensions_are_filtered() {
        let out = PathBuf::from("/srv/out");
        assert!(!path_is_relevant(
            Path::new("/srv/pages/node_modules/react/index.js"),
            &out
        ));
        assert!(!path_is_relevant(Path::new("/srv/pages/.git/HEAD"), &out));
        assert!(!path_is_relevant(Path::new("/srv/pages/notes.md"), &out));
        assert!(!path_is_relevant(
            Path::new("/srv/pages/.staging-abc123/hello/client.js"),
            &out
        ));
    }

    #[tokio::test]
    async fn watcher_reports_source_changes() {
        let dir = tempfile::tempdir().unwrap();
        let source_root = dir.path().to_path_buf();
        let output_root = source_root.join(".viewsmith");
        std::fs::create_dir_all(source_root.join("apps/hello")).unwrap();

        let mut watcher = ChangeWatcher::start(&source_root, &output_root).unwrap();
        std::fs::write(source_root.join("apps/hello/page.tsx"), b"export {};").unwrap();

        let seen = tokio::time::timeout(Duration::from_secs(5), watcher.recv()).await;
        assert!(seen.is_ok(), "expected a change notification");
        watcher.debounce(Duration::from_millis(50)).await;
    }
}
