//! Per-view render cache keyed by artifact fingerprint.
//!
//! Each view id owns one slot behind an async mutex. Concurrent misses for
//! the same view queue on that slot, so one render runs and late arrivals
//! find the fresh entry already stored. A fingerprint mismatch replaces the
//! entry wholesale. With caching disabled nothing is stored and every call
//! renders fresh.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

use viewsmith_core::fingerprint::Fingerprint;

use crate::error::Error;

struct CacheEntry {
    fingerprint: Fingerprint,
    html: String,
    #[allow(dead_code)]
    created_at: DateTime<Utc>,
}

pub struct RenderCache {
    enabled: bool,
    slots: StdMutex<HashMap<String, Arc<AsyncMutex<Option<CacheEntry>>>>>,
}

impl RenderCache {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            slots: StdMutex::new(HashMap::new()),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Return cached HTML when the stored fingerprint matches, otherwise run
    /// `render` inside the view's slot and store the result.
    pub async fn get_or_render<F, Fut>(
        &self,
        view_id: &str,
        fingerprint: &Fingerprint,
        render: F,
    ) -> Result<String, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, Error>>,
    {
        if !self.enabled {
            return render().await;
        }

        let slot = {
            let mut slots = self.slots.lock().expect("cache lock poisoned");
            Arc::clone(slots.entry(view_id.to_string()).or_default())
        };

        let mut guard = slot.lock().await;
        if let Some(entry) = guard.as_ref() {
            if entry.fingerprint == *fingerprint {
                debug!(view_id, fingerprint = %fingerprint.digest(), "render cache hit");
                return Ok(entry.html.clone());
            }
        }

        debug!(view_id, fingerprint = %fingerprint.digest(), "render cache miss");
        let html = render().await?;
        *guard = Some(CacheEntry {
            fingerprint: fingerprint.clone(),
            html: html.clone(),
            created_at: Utc::now(),
        });
        Ok(html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    use viewsmith_core::manifest::{ArtifactDescriptor, ViewArtifacts};

    fn fingerprint(len: u64) -> Fingerprint {
        Fingerprint::of(&ViewArtifacts {
            client: ArtifactDescriptor {
                path: PathBuf::from("hello/client.js"),
                len,
                mtime_ms: 1_000,
            },
            stylesheet: None,
            server: None,
        })
    }

    #[tokio::test]
    async fn matching_fingerprint_returns_cached_html_without_rendering() {
        let cache = RenderCache::new(true);
        let renders = AtomicU64::new(0);
        let fp = fingerprint(10);

        for _ in 0..3 {
            let html = cache
                .get_or_render("hello", &fp, || async {
                    renders.fetch_add(1, Ordering::SeqCst);
                    Ok("<div>once</div>".to_string())
                })
                .await
                .unwrap();
            assert_eq!(html, "<div>once</div>");
        }
        assert_eq!(renders.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fingerprint_change_replaces_the_entry() {
        let cache = RenderCache::new(true);
        let renders = AtomicU64::new(0);

        for len in [10, 10, 11] {
            cache
                .get_or_render("hello", &fingerprint(len), || async {
                    renders.fetch_add(1, Ordering::SeqCst);
                    Ok(format!("<div>{len}</div>"))
                })
                .await
                .unwrap();
        }
        assert_eq!(renders.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn disabled_cache_renders_fresh_every_call() {
        let cache = RenderCache::new(false);
        let renders = AtomicU64::new(0);
        let fp = fingerprint(10);

        for _ in 0..2 {
            cache
                .get_or_render("hello", &fp, || async {
                    renders.fetch_add(1, Ordering::SeqCst);
                    Ok("<div>fresh</div>".to_string())
                })
                .await
                .unwrap();
        }
        assert_eq!(renders.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_render_stores_nothing() {
        let cache = RenderCache::new(true);
        let fp = fingerprint(10);

        let err = cache
            .get_or_render("hello", &fp, || async {
                Err(Error::Render("boom".to_string()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Render(_)));

        let renders = AtomicU64::new(0);
        cache
            .get_or_render("hello", &fp, || async {
                renders.fetch_add(1, Ordering::SeqCst);
                Ok("<div>retry</div>".to_string())
            })
            .await
            .unwrap();
        assert_eq!(renders.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_misses_coalesce_into_one_render() {
        let cache = Arc::new(RenderCache::new(true));
        let renders = Arc::new(AtomicU64::new(0));
        let fp = fingerprint(10);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let renders = Arc::clone(&renders);
            let fp = fp.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_render("hello", &fp, || async move {
                        renders.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok("<div>shared</div>".to_string())
                    })
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "<div>shared</div>");
        }
        assert_eq!(renders.load(Ordering::SeqCst), 1);
    }
}
