//! Multi-strategy search aggregation.
//!
//! A single free-text query rarely matches a wiki page the way its author
//! titled it, so [`search_content`] tries several query formulations in
//! priority order and merges the hits: exact title, per-keyword title, exact
//! phrase in text, title again, keyword disjunction in text, and a generic
//! fallback. Results keep first-seen order, ids are deduplicated, and
//! remaining strategies are skipped once the accumulated unique count
//! reaches the limit.
//!
//! A failing strategy (invalid CQL, network error) contributes zero results
//! and the next strategy still runs; the aggregator itself never errors.

use std::collections::HashSet;

use crate::connector::{cql_quote, ConfluenceClient};
use crate::models::SearchResult;

/// Keywords shorter than this are too generic to search on.
const MIN_KEYWORD_CHARS: usize = 3;
/// At most this many keywords are used by the keyword strategies.
const MAX_KEYWORDS: usize = 3;

/// Search the store with every strategy, up to `limit` unique results.
///
/// The returned list is ordered by strategy priority, then by each
/// strategy's own return order, and contains no duplicate ids. A
/// non-positive limit yields an empty list without issuing any request.
pub async fn search_content(
    client: &ConfluenceClient,
    query: &str,
    limit: usize,
) -> Vec<SearchResult> {
    if limit == 0 {
        return Vec::new();
    }

    let per_call_limit = limit as u32;
    let quoted = cql_quote(query);
    let mut merged: Vec<SearchResult> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    // Strategy 1: exact title match (most specific).
    let batch = client
        .search_cql(&format!("title ~ \"{}\"", quoted), per_call_limit)
        .await;
    merge(&mut merged, &mut seen, batch);

    // Strategy 2: per-keyword title match, for queries longer than a title.
    if merged.len() < limit {
        let kws = keywords(query);
        if kws.len() > 1 {
            for kw in kws.iter().take(MAX_KEYWORDS) {
                let batch = client
                    .search_cql(&format!("title ~ \"{}\"", cql_quote(kw)), per_call_limit)
                    .await;
                merge(&mut merged, &mut seen, batch);
            }
        }
    }

    // Strategy 3: exact phrase in document text.
    if merged.len() < limit {
        let batch = client
            .search_cql(&format!("text ~ \"{}\"", quoted), per_call_limit)
            .await;
        merge(&mut merged, &mut seen, batch);
    }

    // Strategy 4: title match again. Redundant with strategy 1 on purpose;
    // kept for coverage when the first pass was restricted differently.
    if merged.len() < limit {
        let batch = client
            .search_cql(&format!("title ~ \"{}\"", quoted), per_call_limit)
            .await;
        merge(&mut merged, &mut seen, batch);
    }

    // Strategy 5: any-keyword text match, one disjunctive query.
    if merged.len() < limit {
        let kws = keywords(query);
        if !kws.is_empty() {
            let disjunction = kws
                .iter()
                .take(MAX_KEYWORDS)
                .map(|kw| format!("text ~ \"{}\"", cql_quote(kw)))
                .collect::<Vec<_>>()
                .join(" OR ");
            let batch = client
                .search_cql(&format!("({})", disjunction), per_call_limit)
                .await;
            merge(&mut merged, &mut seen, batch);
        }
    }

    // Strategy 6: generic fallback over text and title.
    if merged.len() < limit {
        let batch = client
            .search_cql(
                &format!("text ~ \"{}\" OR title ~ \"{}\"", quoted, quoted),
                per_call_limit,
            )
            .await;
        merge(&mut merged, &mut seen, batch);
    }

    merged.truncate(limit);
    merged
}

/// Append results whose id has not been seen, preserving batch order.
fn merge(merged: &mut Vec<SearchResult>, seen: &mut HashSet<String>, batch: Vec<SearchResult>) {
    for result in batch {
        if seen.insert(result.id.clone()) {
            merged.push(result);
        }
    }
}

/// Whitespace-delimited tokens longer than two characters.
pub fn keywords(query: &str) -> Vec<&str> {
    query
        .split_whitespace()
        .filter(|w| w.chars().count() >= MIN_KEYWORD_CHARS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str) -> SearchResult {
        SearchResult {
            id: id.to_string(),
            title: format!("Result {}", id),
            url: format!("https://example/{}", id),
            space: "Unknown".to_string(),
            content_type: "page".to_string(),
            excerpt: String::new(),
            body: String::new(),
        }
    }

    #[test]
    fn keywords_drop_short_tokens() {
        assert_eq!(keywords("how to fix the CI"), vec!["how", "fix", "the"]);
        assert_eq!(keywords("a bb ccc dddd"), vec!["ccc", "dddd"]);
    }

    #[test]
    fn keywords_empty_and_all_short() {
        assert!(keywords("").is_empty());
        assert!(keywords("a b c").is_empty());
    }

    #[test]
    fn keywords_count_chars_not_bytes() {
        // Two-char multibyte tokens are still too short.
        assert_eq!(keywords("éé ééé"), vec!["ééé"]);
    }

    #[test]
    fn merge_dedups_and_preserves_order() {
        let mut merged = vec![result("1"), result("2")];
        let mut seen: HashSet<String> =
            merged.iter().map(|r| r.id.clone()).collect();

        merge(
            &mut merged,
            &mut seen,
            vec![result("2"), result("3"), result("1"), result("4")],
        );

        let ids: Vec<&str> = merged.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4"]);
    }

    #[tokio::test]
    async fn zero_limit_returns_empty_without_network() {
        // The base URL points nowhere; with limit 0 no request is made so
        // this must return immediately.
        let config = crate::config::ConfluenceConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            username: "u".to_string(),
            api_token: "t".to_string(),
            timeout_secs: 1,
        };
        let client = ConfluenceClient::new(&config).unwrap();

        let results = search_content(&client, "anything", 0).await;
        assert!(results.is_empty());
    }
}
