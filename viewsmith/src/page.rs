//! HTML shell assembly for a served view.
//!
//! The shell inlines the client script and stylesheet, seeds the root
//! element with server-rendered markup when present, and emits head tags
//! from the recognized metadata key set. Relative icon and manifest URLs
//! resolve against `metadataBase`.

use serde_json::Value;

use viewsmith_core::metadata::{resolve_metadata_url, Metadata};

/// Escape text placed inside an element body.
fn escape_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escape text placed inside a double-quoted attribute value.
fn escape_attr(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

fn meta_tag(out: &mut String, name: &str, content: &str) {
    out.push_str(&format!(
        "<meta name=\"{}\" content=\"{}\">\n",
        escape_attr(name),
        escape_attr(content)
    ));
}

fn property_tag(out: &mut String, property: &str, content: &str) {
    out.push_str(&format!(
        "<meta property=\"{}\" content=\"{}\">\n",
        escape_attr(property),
        escape_attr(content)
    ));
}

fn link_tag(out: &mut String, rel: &str, href: &str) {
    out.push_str(&format!(
        "<link rel=\"{}\" href=\"{}\">\n",
        escape_attr(rel),
        escape_attr(href)
    ));
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(value_as_text).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        _ => None,
    }
}

fn title_text(title: &Value) -> Option<String> {
    match title {
        Value::String(text) => Some(text.clone()),
        Value::Object(fields) => fields
            .get("absolute")
            .or_else(|| fields.get("default"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

fn icon_links(out: &mut String, icons: &Value, base: Option<&str>) {
    let mut emit = |rel: &str, value: &Value| {
        if let Some(href) = value.as_str() {
            link_tag(out, rel, &resolve_metadata_url(href, base));
        }
    };
    match icons {
        Value::String(_) => emit("icon", icons),
        Value::Array(items) => {
            for item in items {
                emit("icon", item);
            }
        }
        Value::Object(fields) => {
            for (key, rel) in [("icon", "icon"), ("shortcut", "shortcut icon"), ("apple", "apple-touch-icon")] {
                if let Some(value) = fields.get(key) {
                    match value {
                        Value::Array(items) => {
                            for item in items {
                                emit(rel, item);
                            }
                        }
                        other => emit(rel, other),
                    }
                }
            }
        }
        _ => {}
    }
}

fn nested_meta(out: &mut String, prefix: &str, value: &Value, as_property: bool) {
    if let Value::Object(fields) = value {
        for (key, field) in fields {
            if let Some(content) = value_as_text(field) {
                let name = format!("{prefix}:{key}");
                if as_property {
                    property_tag(out, &name, &content);
                } else {
                    meta_tag(out, &name, &content);
                }
            }
        }
    }
}

fn head_tags(metadata: &Metadata) -> String {
    let base = metadata.metadata_base.as_deref();
    let mut out = String::new();

    if let Some(title) = metadata.title.as_ref().and_then(title_text) {
        out.push_str(&format!("<title>{}</title>\n", escape_text(&title)));
    }
    if let Some(description) = &metadata.description {
        meta_tag(&mut out, "description", description);
    }
    if let Some(name) = &metadata.application_name {
        meta_tag(&mut out, "application-name", name);
    }
    if let Some(generator) = &metadata.generator {
        meta_tag(&mut out, "generator", generator);
    }
    if let Some(keywords) = metadata.keywords.as_ref().and_then(value_as_text) {
        meta_tag(&mut out, "keywords", &keywords);
    }
    if let Some(referrer) = &metadata.referrer {
        meta_tag(&mut out, "referrer", referrer);
    }
    if let Some(theme) = metadata.theme_color.as_ref().and_then(value_as_text) {
        meta_tag(&mut out, "theme-color", &theme);
    }
    if let Some(robots) = metadata.robots.as_ref().and_then(value_as_text) {
        meta_tag(&mut out, "robots", &robots);
    }
    if let Some(icons) = &metadata.icons {
        icon_links(&mut out, icons, base);
    }
    if let Some(manifest) = &metadata.manifest {
        link_tag(&mut out, "manifest", &resolve_metadata_url(manifest, base));
    }
    if let Some(open_graph) = &metadata.open_graph {
        nested_meta(&mut out, "og", open_graph, true);
    }
    if let Some(twitter) = &metadata.twitter {
        nested_meta(&mut out, "twitter", twitter, false);
    }
    if let Some(Value::Object(fields)) = &metadata.other {
        for (key, field) in fields {
            if let Some(content) = value_as_text(field) {
                meta_tag(&mut out, key, &content);
            }
        }
    }
    out
}

/// Assemble the full page shell served for one view.
pub fn render_page(
    client_js: &str,
    stylesheet: Option<&str>,
    server_html: Option<&str>,
    metadata: Option<&Metadata>,
) -> String {
    let viewport = metadata
        .and_then(|m| m.viewport.as_ref())
        .and_then(value_as_text)
        .unwrap_or_else(|| "width=device-width, initial-scale=1.0".to_string());
    let color_scheme = metadata
        .and_then(|m| m.color_scheme.clone())
        .unwrap_or_else(|| "light dark".to_string());

    let mut head = String::new();
    head.push_str("<meta charset=\"UTF-8\">\n");
    meta_tag(&mut head, "viewport", &viewport);
    meta_tag(&mut head, "color-scheme", &color_scheme);
    if let Some(metadata) = metadata {
        head.push_str(&head_tags(metadata));
    }
    if let Some(css) = stylesheet {
        head.push_str(&format!("<style>\n{css}\n</style>\n"));
    }

    // Server markup is trusted sandbox output and inlined verbatim; the
    // client script hydrates it in place.
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n{head}</head>\n<body>\n<div id=\"root\">{root}</div>\n<script type=\"module\">\n{client_js}\n</script>\n</body>\n</html>",
        root = server_html.unwrap_or("")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_shell_has_charset_viewport_and_color_scheme() {
        let html = render_page("console.log(1);", None, None, None);
        assert!(html.contains("<meta charset=\"UTF-8\">"));
        assert!(html.contains("width=device-width, initial-scale=1.0"));
        assert!(html.contains("light dark"));
        assert!(html.contains("<div id=\"root\"></div>"));
        assert!(html.contains("console.log(1);"));
    }

    #[test]
    fn server_markup_seeds_the_root_element() {
        let html = render_page("x;", None, Some("<main>hi</main>"), None);
        assert!(html.contains("<div id=\"root\"><main>hi</main></div>"));
    }

    #[test]
    fn stylesheet_is_inlined_in_the_head() {
        let html = render_page("x;", Some("body { margin: 0; }"), None, None);
        assert!(html.contains("<style>\nbody { margin: 0; }\n</style>"));
    }

    #[test]
    fn metadata_text_is_escaped() {
        let metadata: Metadata = serde_json::from_value(json!({
            "title": "a < b & \"c\"",
            "description": "x \"quoted\" <tag>"
        }))
        .unwrap();
        let html = render_page("x;", None, None, Some(&metadata));
        assert!(html.contains("<title>a &lt; b &amp; \"c\"</title>"));
        assert!(html.contains("content=\"x &quot;quoted&quot; &lt;tag&gt;\""));
    }

    #[test]
    fn relative_icon_and_manifest_resolve_against_metadata_base() {
        let metadata: Metadata = serde_json::from_value(json!({
            "metadataBase": "https://example.com/app",
            "icons": "icon.png",
            "manifest": "/site.webmanifest"
        }))
        .unwrap();
        let html = render_page("x;", None, None, Some(&metadata));
        assert!(html.contains("href=\"https://example.com/app/icon.png\""));
        assert!(html.contains("href=\"https://example.com/site.webmanifest\""));
    }

    #[test]
    fn open_graph_and_twitter_emit_nested_keys() {
        let metadata: Metadata = serde_json::from_value(json!({
            "openGraph": {"title": "og title", "siteName": "clock"},
            "twitter": {"card": "summary"}
        }))
        .unwrap();
        let html = render_page("x;", None, None, Some(&metadata));
        assert!(html.contains("property=\"og:title\" content=\"og title\""));
        assert!(html.contains("property=\"og:siteName\" content=\"clock\""));
        assert!(html.contains("name=\"twitter:card\" content=\"summary\""));
    }

    #[test]
    fn keyword_arrays_join_with_commas() {
        let metadata: Metadata = serde_json::from_value(json!({
            "keywords": ["time", "clock"]
        }))
        .unwrap();
        let html = render_page("x;", None, None, Some(&metadata));
        assert!(html.contains("name=\"keywords\" content=\"time, clock\""));
    }

    #[test]
    fn object_title_prefers_absolute_over_default() {
        let metadata: Metadata = serde_json::from_value(json!({
            "title": {"default": "fallback", "absolute": "exact"}
        }))
        .unwrap();
        let html = render_page("x;", None, None, Some(&metadata));
        assert!(html.contains("<title>exact</title>"));
    }
}
