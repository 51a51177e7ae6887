//! Environment-driven configuration, grouped by concern.
//!
//! All knobs are read once through the `env_*` helpers so fallback logic
//! lives in one place instead of being repeated at call sites.

use std::env;
use std::path::PathBuf;

/// Read `key`, falling back to `default()` when unset or empty.
pub fn env_or(key: &str, default: impl FnOnce() -> String) -> String {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => default(),
    }
}

/// Read `key` as an optional value; empty strings count as unset.
pub fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Read `key` as a boolean. Accepts 1/true/yes (case-insensitive).
pub fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => default,
    }
}

/// Read `key` as a u64, falling back to `default` on parse failure.
pub fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

/// Build pipeline paths and the external bundler program.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Directory holding view sources (`apps/<id>/page.tsx` underneath).
    pub source_root: PathBuf,
    /// Directory receiving bundled artifacts, one subdirectory per view id.
    pub output_root: PathBuf,
    /// External bundler executable invoked per build pass.
    pub bundler_program: String,
    /// Debounce window for coalescing change notifications, in milliseconds.
    pub watch_debounce_ms: u64,
}

impl BuildConfig {
    pub fn from_env() -> Self {
        let source_root = PathBuf::from(env_or("VIEWSMITH_SOURCE_ROOT", || ".".to_string()));
        let output_root = env_optional("VIEWSMITH_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| source_root.join(".viewsmith"));
        Self {
            source_root,
            output_root,
            bundler_program: env_or("VIEWSMITH_BUNDLER", || "rolldown".to_string()),
            watch_debounce_ms: env_u64("VIEWSMITH_WATCH_DEBOUNCE_MS", 120),
        }
    }

    /// Construct for a fixed root pair; used by embedders and tests.
    pub fn for_roots(source_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            output_root: output_root.into(),
            bundler_program: env_or("VIEWSMITH_BUNDLER", || "rolldown".to_string()),
            watch_debounce_ms: 120,
        }
    }
}

/// Server-render execution limits and cache policy.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Whether rendered HTML is cached per view fingerprint.
    pub cache_enabled: bool,
    /// Wall-clock budget for one sandboxed render, in milliseconds.
    pub budget_ms: u64,
    /// Maximum number of microtasks executed while settling one render.
    pub job_budget: u64,
    /// Maximum number of sandbox instances alive at once.
    pub max_engines: u64,
    /// Per-sandbox heap ceiling in MB.
    pub max_memory_mb: u64,
}

impl RenderConfig {
    pub fn from_env() -> Self {
        Self {
            cache_enabled: env_bool("VIEWSMITH_RENDER_CACHE", true),
            budget_ms: env_u64("VIEWSMITH_RENDER_BUDGET_MS", 5_000),
            job_budget: env_u64("VIEWSMITH_RENDER_JOB_BUDGET", 10_000),
            max_engines: env_u64("VIEWSMITH_MAX_ENGINES", 8).max(1),
            max_memory_mb: env_u64("VIEWSMITH_MAX_MEMORY_MB", 128),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            budget_ms: 5_000,
            job_budget: 10_000,
            max_engines: 8,
            max_memory_mb: 128,
        }
    }
}

/// Logging knobs consumed by `observability::init_tracing`.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub quiet: bool,
    pub log_level: String,
    pub log_json: bool,
}

impl ObservabilityConfig {
    pub fn from_env() -> Self {
        Self {
            quiet: env_bool("VIEWSMITH_QUIET", false),
            log_level: env_or("VIEWSMITH_LOG_LEVEL", || "viewsmith=info".to_string()),
            log_json: env_bool("VIEWSMITH_LOG_JSON", false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_bool_accepts_common_truthy_values() {
        std::env::set_var("VIEWSMITH_TEST_BOOL_A", "1");
        std::env::set_var("VIEWSMITH_TEST_BOOL_B", "TRUE");
        std::env::set_var("VIEWSMITH_TEST_BOOL_C", "no");
        assert!(env_bool("VIEWSMITH_TEST_BOOL_A", false));
        assert!(env_bool("VIEWSMITH_TEST_BOOL_B", false));
        assert!(!env_bool("VIEWSMITH_TEST_BOOL_C", true));
        assert!(env_bool("VIEWSMITH_TEST_BOOL_MISSING", true));
    }

    #[test]
    fn env_u64_falls_back_on_garbage() {
        std::env::set_var("VIEWSMITH_TEST_U64", "not-a-number");
        assert_eq!(env_u64("VIEWSMITH_TEST_U64", 42), 42);
        std::env::set_var("VIEWSMITH_TEST_U64_OK", "7");
        assert_eq!(env_u64("VIEWSMITH_TEST_U64_OK", 42), 7);
    }

    #[test]
    fn output_root_defaults_under_source_root() {
        let cfg = BuildConfig::for_roots("/srv/pages", "/srv/pages/.viewsmith");
        assert_eq!(cfg.output_root, PathBuf::from("/srv/pages/.viewsmith"));
    }
}
