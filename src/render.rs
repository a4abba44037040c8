//! Rendering of Confluence storage-format bodies into plain text.
//!
//! This is a deliberate non-parser: tags are stripped by bracket scanning,
//! a fixed set of named entities is decoded, and whitespace runs collapse to
//! a single space. Malformed markup may leave stray characters but never
//! fails.

use crate::models::SearchResult;

/// Strip markup from a storage-format body and normalize it for display.
///
/// Empty input produces an empty string.
pub fn clean(markup: &str) -> String {
    if markup.is_empty() {
        return String::new();
    }

    let stripped = strip_tags(markup);
    let decoded = decode_entities(&stripped);

    // split_whitespace collapses runs (including newlines) and trims.
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop everything between `<` and `>`, inclusive. Not a parser: nested or
/// unterminated tags are not specially handled.
fn strip_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;

    for c in input.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }

    out
}

/// Decode the named entities Confluence storage bodies commonly carry.
/// `&amp;` is decoded after `&lt;`/`&gt;` so that `&amp;lt;` stays `&lt;`.
fn decode_entities(input: &str) -> String {
    input
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Derive a short excerpt for a search result: the API excerpt when
/// present, otherwise the cleaned body prefix with an ellipsis.
pub fn excerpt_of(result: &SearchResult, max_chars: usize) -> String {
    if !result.excerpt.is_empty() {
        return truncate_chars(&result.excerpt, max_chars);
    }

    let body_text = clean(&result.body);
    if body_text.is_empty() {
        return "No excerpt available".to_string();
    }

    let mut excerpt = truncate_chars(&body_text, max_chars);
    if body_text.chars().count() > max_chars {
        excerpt.push_str("...");
    }
    excerpt
}

/// Truncate at a character boundary (byte slicing would panic mid-codepoint).
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
