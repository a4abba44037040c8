//! Core data models for the Confluence agent.
//!
//! These types represent the normalized records that flow from the
//! Confluence REST API through search aggregation to tool output. Both are
//! value objects: every retrieval produces an independent copy, nothing is
//! cached or mutated after construction.

use serde::Serialize;
use serde_json::Value;

/// One document surfaced by a search, normalized from a raw API item.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub id: String,
    pub title: String,
    /// Absolute link, built from the site base URL and the item's webui path.
    pub url: String,
    /// Space name, `"Unknown"` when the API omits the space expansion.
    pub space: String,
    /// Content type, `"page"` when absent.
    pub content_type: String,
    /// Search excerpt; may be empty.
    pub excerpt: String,
    /// Raw storage-format markup; may be empty.
    pub body: String,
}

impl SearchResult {
    /// Normalize a raw `content/search` item. Missing optional fields get
    /// the documented defaults; returns `None` when the item has no id.
    pub fn from_api(item: &Value, base_url: &str) -> Option<Self> {
        let id = item.get("id").and_then(Value::as_str)?;
        if id.is_empty() {
            return None;
        }

        Some(Self {
            id: id.to_string(),
            title: str_field(item, &["title"]),
            url: webui_url(item, base_url),
            space: item
                .pointer("/space/name")
                .and_then(Value::as_str)
                .unwrap_or("Unknown")
                .to_string(),
            content_type: item
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("page")
                .to_string(),
            excerpt: str_field(item, &["excerpt"]),
            body: str_field(item, &["body", "storage", "value"]),
        })
    }
}

/// A full document fetched by id: everything a [`SearchResult`] carries plus
/// version metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub url: String,
    pub space: String,
    pub content_type: String,
    pub body: String,
    /// Version number, `1` when the version expansion is absent.
    pub version: i64,
    /// ISO8601 timestamp of the last modification; may be empty.
    pub last_modified: String,
}

impl Document {
    /// Normalize a raw `content/{id}` response. Returns `None` when the
    /// payload has no id.
    pub fn from_api(item: &Value, base_url: &str) -> Option<Self> {
        let id = item.get("id").and_then(Value::as_str)?;
        if id.is_empty() {
            return None;
        }

        Some(Self {
            id: id.to_string(),
            title: str_field(item, &["title"]),
            url: webui_url(item, base_url),
            space: item
                .pointer("/space/name")
                .and_then(Value::as_str)
                .unwrap_or("Unknown")
                .to_string(),
            content_type: item
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("page")
                .to_string(),
            body: str_field(item, &["body", "storage", "value"]),
            version: item
                .pointer("/version/number")
                .and_then(Value::as_i64)
                .unwrap_or(1),
            last_modified: item
                .pointer("/version/when")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
        })
    }

    /// Last-modified timestamp reformatted for display, falling back to the
    /// raw string when it does not parse as RFC3339.
    pub fn last_modified_display(&self) -> String {
        chrono::DateTime::parse_from_rfc3339(&self.last_modified)
            .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|_| self.last_modified.clone())
    }
}

fn str_field(item: &Value, path: &[&str]) -> String {
    let mut current = item;
    for key in path {
        match current.get(key) {
            Some(v) => current = v,
            None => return String::new(),
        }
    }
    current.as_str().unwrap_or("").to_string()
}

fn webui_url(item: &Value, base_url: &str) -> String {
    let webui = item
        .pointer("/_links/webui")
        .and_then(Value::as_str)
        .unwrap_or("");
    format!("{}{}", base_url, webui)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn search_result_full_item() {
        let item = json!({
            "id": "12345",
            "title": "Deploy Runbook",
            "type": "page",
            "space": { "name": "Platform" },
            "excerpt": "How to deploy",
            "body": { "storage": { "value": "<p>Steps</p>" } },
            "_links": { "webui": "/spaces/PLAT/pages/12345" }
        });

        let result = SearchResult::from_api(&item, "https://example.atlassian.net").unwrap();
        assert_eq!(result.id, "12345");
        assert_eq!(result.title, "Deploy Runbook");
        assert_eq!(result.space, "Platform");
        assert_eq!(result.content_type, "page");
        assert_eq!(result.excerpt, "How to deploy");
        assert_eq!(result.body, "<p>Steps</p>");
        assert_eq!(
            result.url,
            "https://example.atlassian.net/spaces/PLAT/pages/12345"
        );
    }

    #[test]
    fn search_result_missing_optional_fields() {
        // space, excerpt, body, type, and _links all absent
        let item = json!({ "id": "9", "title": "Bare" });

        let result = SearchResult::from_api(&item, "https://example.atlassian.net").unwrap();
        assert_eq!(result.space, "Unknown");
        assert_eq!(result.content_type, "page");
        assert_eq!(result.excerpt, "");
        assert_eq!(result.body, "");
        assert_eq!(result.url, "https://example.atlassian.net");
    }

    #[test]
    fn search_result_rejects_missing_or_empty_id() {
        assert!(SearchResult::from_api(&json!({ "title": "no id" }), "x").is_none());
        assert!(SearchResult::from_api(&json!({ "id": "", "title": "t" }), "x").is_none());
    }

    #[test]
    fn document_defaults() {
        let item = json!({ "id": "42", "title": "Doc" });
        let doc = Document::from_api(&item, "https://example.atlassian.net").unwrap();
        assert_eq!(doc.version, 1);
        assert_eq!(doc.last_modified, "");
        assert_eq!(doc.space, "Unknown");
    }

    #[test]
    fn document_version_fields() {
        let item = json!({
            "id": "42",
            "title": "Doc",
            "version": { "number": 7, "when": "2024-03-01T10:30:00.000Z" }
        });
        let doc = Document::from_api(&item, "https://example.atlassian.net").unwrap();
        assert_eq!(doc.version, 7);
        assert_eq!(doc.last_modified, "2024-03-01T10:30:00.000Z");
        assert_eq!(doc.last_modified_display(), "2024-03-01 10:30 UTC");
    }

    #[test]
    fn last_modified_display_falls_back_on_unparseable() {
        let item = json!({
            "id": "42",
            "version": { "number": 1, "when": "yesterday" }
        });
        let doc = Document::from_api(&item, "x").unwrap();
        assert_eq!(doc.last_modified_display(), "yesterday");
    }
}
