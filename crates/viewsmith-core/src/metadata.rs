//! Page metadata: a fixed recognized-key set with shallow merge semantics.
//!
//! Merging replaces whole top-level values; it is deliberately not a
//! recursive merge. An override's `openGraph` object completely replaces the
//! base's `openGraph`, nested keys and all.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Recognized top-level metadata keys. Unrecognized keys are not carried.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_base: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme_color: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_scheme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub robots: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternates: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icons: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_graph: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apple_web_app: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_detection: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub itunes: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facebook: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pinterest: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#abstract: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_links: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archives: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bookmarks: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other: Option<Value>,
}

macro_rules! take_over {
    ($merged:ident, $base:ident, $over:ident, $($field:ident),+ $(,)?) => {
        $(
            $merged.$field = $over.$field.clone().or_else(|| $base.$field.clone());
        )+
    };
}

/// Shallow merge over the recognized key set; `override_` wins per key.
pub fn merge_metadata(base: Option<&Metadata>, override_: Option<&Metadata>) -> Option<Metadata> {
    match (base, override_) {
        (None, None) => None,
        (Some(base), None) => Some(base.clone()),
        (None, Some(over)) => Some(over.clone()),
        (Some(base), Some(over)) => {
            let mut merged = Metadata::default();
            take_over!(
                merged, base, over, metadata_base, title, description, application_name,
                authors, generator, keywords, referrer, theme_color, color_scheme, viewport,
                creator, publisher, robots, alternates, icons, open_graph, twitter,
                verification, apple_web_app, format_detection, itunes, facebook, pinterest,
                manifest, r#abstract, app_links, archives, assets, bookmarks, category,
                classification, other,
            );
            Some(merged)
        }
    }
}

/// Join a relative metadata URL value against `metadataBase`.
///
/// Absolute values (scheme or network-path) pass through untouched, as do
/// values when the base is missing or itself not absolute.
pub fn resolve_metadata_url(value: &str, metadata_base: Option<&str>) -> String {
    if value.contains("://") || value.starts_with("//") {
        return value.to_string();
    }
    let Some(base) = metadata_base else {
        return value.to_string();
    };
    let Some(scheme_end) = base.find("://") else {
        return value.to_string();
    };
    let after_scheme = &base[scheme_end + 3..];
    if after_scheme.is_empty() || after_scheme.starts_with('/') {
        return value.to_string();
    }

    let (origin, base_path) = match after_scheme.find('/') {
        Some(slash) => (
            &base[..scheme_end + 3 + slash],
            after_scheme[slash..].to_string(),
        ),
        None => (base, "/".to_string()),
    };

    if let Some(rooted) = value.strip_prefix('/') {
        return format!("{origin}/{rooted}");
    }
    let mut path = base_path;
    if !path.ends_with('/') {
        path.push('/');
    }
    format!("{origin}{path}{value}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_is_shallow_replace_not_recursive() {
        let base = Metadata {
            title: Some(json!("Base")),
            open_graph: Some(json!({"title": "base", "siteName": "base-site"})),
            ..Default::default()
        };
        let over = Metadata {
            open_graph: Some(json!({"title": "override"})),
            ..Default::default()
        };
        let merged = merge_metadata(Some(&base), Some(&over)).unwrap();
        // Top-level value replaced wholesale; base's siteName must be gone.
        assert_eq!(merged.open_graph, Some(json!({"title": "override"})));
        assert_eq!(merged.title, Some(json!("Base")));
    }

    #[test]
    fn merge_with_one_side_missing_clones_the_other() {
        let base = Metadata {
            description: Some("hello".to_string()),
            ..Default::default()
        };
        assert_eq!(merge_metadata(Some(&base), None), Some(base.clone()));
        assert_eq!(merge_metadata(None, Some(&base)), Some(base));
        assert_eq!(merge_metadata(None, None), None);
    }

    #[test]
    fn metadata_round_trips_camel_case_keys() {
        let metadata: Metadata = serde_json::from_value(json!({
            "applicationName": "clock",
            "themeColor": "#fff",
            "metadataBase": "https://example.com/app"
        }))
        .unwrap();
        assert_eq!(metadata.application_name.as_deref(), Some("clock"));
        let round = serde_json::to_value(&metadata).unwrap();
        assert_eq!(round["applicationName"], json!("clock"));
        assert_eq!(round["themeColor"], json!("#fff"));
    }

    #[test]
    fn recognizes_the_full_top_level_key_set() {
        let metadata: Metadata = serde_json::from_value(json!({
            "authors": [{"name": "Ada"}],
            "creator": "Ada",
            "publisher": "Lovelace Press",
            "alternates": {"canonical": "https://example.com"},
            "verification": {"google": "token"},
            "appleWebApp": {"capable": true},
            "formatDetection": {"telephone": false},
            "itunes": {"appId": "123"},
            "facebook": {"appId": "456"},
            "pinterest": {"richPin": true},
            "abstract": "summary",
            "appLinks": {"web": {"url": "https://example.com"}},
            "archives": ["https://example.com/2025"],
            "assets": "https://example.com/assets",
            "bookmarks": ["https://example.com/start"],
            "category": "tools",
            "classification": "utility"
        }))
        .unwrap();
        assert_eq!(metadata.creator.as_deref(), Some("Ada"));
        assert_eq!(metadata.r#abstract.as_deref(), Some("summary"));
        assert_eq!(metadata.itunes, Some(json!({"appId": "123"})));

        let round = serde_json::to_value(&metadata).unwrap();
        assert_eq!(round["appleWebApp"], json!({"capable": true}));
        assert_eq!(round["appLinks"], json!({"web": {"url": "https://example.com"}}));
        assert_eq!(round["abstract"], json!("summary"));
    }

    #[test]
    fn merge_covers_the_supplemental_keys() {
        let base = Metadata {
            creator: Some("Ada".to_string()),
            alternates: Some(json!({"canonical": "https://a.example"})),
            ..Default::default()
        };
        let over = Metadata {
            alternates: Some(json!({"canonical": "https://b.example"})),
            category: Some("tools".to_string()),
            ..Default::default()
        };
        let merged = merge_metadata(Some(&base), Some(&over)).unwrap();
        assert_eq!(merged.creator.as_deref(), Some("Ada"));
        assert_eq!(merged.alternates, Some(json!({"canonical": "https://b.example"})));
        assert_eq!(merged.category.as_deref(), Some("tools"));
    }

    #[test]
    fn resolve_url_passes_absolute_values_through() {
        assert_eq!(
            resolve_metadata_url("https://cdn.example.com/a.png", Some("https://example.com")),
            "https://cdn.example.com/a.png"
        );
        assert_eq!(
            resolve_metadata_url("//cdn.example.com/a.png", Some("https://example.com")),
            "//cdn.example.com/a.png"
        );
    }

    #[test]
    fn resolve_url_joins_relative_values_against_base() {
        assert_eq!(
            resolve_metadata_url("icon.png", Some("https://example.com/app")),
            "https://example.com/app/icon.png"
        );
        assert_eq!(
            resolve_metadata_url("/icon.png", Some("https://example.com/app")),
            "https://example.com/icon.png"
        );
        assert_eq!(
            resolve_metadata_url("icon.png", Some("https://example.com")),
            "https://example.com/icon.png"
        );
    }

    #[test]
    fn resolve_url_ignores_invalid_base() {
        assert_eq!(resolve_metadata_url("icon.png", None), "icon.png");
        assert_eq!(resolve_metadata_url("icon.png", Some("not-a-url")), "icon.png");
    }
}
