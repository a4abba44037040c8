//! Confluence REST client.
//!
//! Wraps the `wiki/rest/api` endpoints behind a small typed surface. Search
//! strategies are expected to fail independently, so every remote failure —
//! transport errors, HTTP error statuses (including 400 for an invalid CQL
//! expression), malformed payloads — degrades to an empty result or `None`
//! at this boundary. Failures are still recorded as structured log events
//! for diagnostics; nothing here panics or propagates an error upward.
//!
//! The client is explicitly constructed and explicitly passed. Its only
//! state is the connection configuration fixed at construction; every call
//! produces fresh value objects.

use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ConfluenceConfig;
use crate::models::{Document, SearchResult};

const SEARCH_EXPAND: &str = "space,version,body.storage";
const GET_EXPAND: &str = "space,version,body.storage,ancestors";

pub struct ConfluenceClient {
    base_url: String,
    username: String,
    api_token: String,
    http: reqwest::Client,
}

impl ConfluenceClient {
    /// Build a client from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error only if the underlying HTTP client cannot be
    /// constructed; remote failures never surface through this type.
    pub fn new(config: &ConfluenceConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: config.base_url.clone(),
            username: config.username.clone(),
            api_token: config.api_token.clone(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/wiki/rest/api/{}", self.base_url, path)
    }

    /// Run one CQL query against `content/search`.
    ///
    /// Returns normalized results, or an empty vec on any failure.
    pub async fn search_cql(&self, cql: &str, limit: u32) -> Vec<SearchResult> {
        let url = self.api_url("content/search");
        let limit_param = limit.to_string();
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.username, Some(&self.api_token))
            .query(&[
                ("cql", cql),
                ("limit", limit_param.as_str()),
                ("expand", SEARCH_EXPAND),
            ])
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                warn!(endpoint = "content/search", cql, error = %e, "search request failed");
                return Vec::new();
            }
        };

        let status = response.status();
        if !status.is_success() {
            // 400 means the CQL expression itself was rejected; either way
            // the strategy contributes nothing and the caller moves on.
            warn!(endpoint = "content/search", cql, status = status.as_u16(), "search returned error status");
            return Vec::new();
        }

        match response.json::<Value>().await {
            Ok(json) => self.collect_results(&json),
            Err(e) => {
                warn!(endpoint = "content/search", cql, error = %e, "search response was not valid JSON");
                Vec::new()
            }
        }
    }

    /// List content in a space via the `content` collection endpoint.
    pub async fn space_content(&self, space_key: &str, limit: u32) -> Vec<SearchResult> {
        let url = self.api_url("content");
        let limit_param = limit.to_string();
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.username, Some(&self.api_token))
            .query(&[
                ("spaceKey", space_key),
                ("limit", limit_param.as_str()),
                ("expand", SEARCH_EXPAND),
            ])
            .send()
            .await;

        match response {
            Ok(r) if r.status().is_success() => match r.json::<Value>().await {
                Ok(json) => self.collect_results(&json),
                Err(e) => {
                    warn!(endpoint = "content", space_key, error = %e, "space listing response was not valid JSON");
                    Vec::new()
                }
            },
            Ok(r) => {
                warn!(endpoint = "content", space_key, status = r.status().as_u16(), "space listing returned error status");
                Vec::new()
            }
            Err(e) => {
                warn!(endpoint = "content", space_key, error = %e, "space listing request failed");
                Vec::new()
            }
        }
    }

    /// Fetch one document by id with full expansion.
    ///
    /// Returns `None` when the remote call fails for any reason (network
    /// error, 404, auth failure).
    pub async fn get_content_by_id(&self, id: &str) -> Option<Document> {
        let url = self.api_url(&format!("content/{}", id));
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.username, Some(&self.api_token))
            .query(&[("expand", GET_EXPAND)])
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                warn!(endpoint = "content/{id}", id, error = %e, "get request failed");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(endpoint = "content/{id}", id, status = status.as_u16(), "get returned error status");
            return None;
        }

        match response.json::<Value>().await {
            Ok(json) => Document::from_api(&json, &self.base_url),
            Err(e) => {
                warn!(endpoint = "content/{id}", id, error = %e, "get response was not valid JSON");
                None
            }
        }
    }

    /// Verify credentials and connectivity with a current-user check.
    pub async fn test_connection(&self) -> bool {
        let url = self.api_url("user/current");
        match self
            .http
            .get(&url)
            .basic_auth(&self.username, Some(&self.api_token))
            .send()
            .await
        {
            Ok(r) if r.status().is_success() => true,
            Ok(r) => {
                warn!(status = r.status().as_u16(), "connection test failed");
                false
            }
            Err(e) => {
                warn!(error = %e, "connection test failed");
                false
            }
        }
    }

    fn collect_results(&self, json: &Value) -> Vec<SearchResult> {
        let items = json
            .get("results")
            .and_then(Value::as_array)
            .map(|a| a.as_slice())
            .unwrap_or_default();

        let results: Vec<SearchResult> = items
            .iter()
            .filter_map(|item| SearchResult::from_api(item, &self.base_url))
            .collect();

        debug!(count = results.len(), "normalized search results");
        results
    }
}

/// Escape user text for interpolation into a quoted CQL string literal.
///
/// Backslashes and double quotes would otherwise terminate the literal and
/// break (or redirect) the query expression.
pub fn cql_quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cql_quote_plain_text_unchanged() {
        assert_eq!(cql_quote("deploy runbook"), "deploy runbook");
    }

    #[test]
    fn cql_quote_escapes_quotes() {
        assert_eq!(cql_quote(r#"the "big" launch"#), r#"the \"big\" launch"#);
    }

    #[test]
    fn cql_quote_escapes_backslashes_first() {
        assert_eq!(cql_quote(r#"a\"b"#), r#"a\\\"b"#);
    }

    #[test]
    fn cql_quote_leaves_parens_alone() {
        // Parentheses are only meaningful outside string literals.
        assert_eq!(cql_quote("scaling (2024)"), "scaling (2024)");
    }
}
