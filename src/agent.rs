//! Capability registry and the tool-calling agent loop.
//!
//! Capabilities are modeled as an explicit registry — name, JSON-Schema
//! parameters, handler — rather than anything implicit: the model is shown
//! the registry's function specs, decides which capability fits the user's
//! utterance, and the [`Agent`] executes the requested calls and feeds the
//! results back until the model produces a final text answer.
//!
//! Every capability converts its own failures into a human-readable message
//! string, so one failing tool never ends the conversation.
//!
//! # Capabilities
//!
//! | Tool | Purpose |
//! |------|---------|
//! | `search_confluence` | Multi-strategy search with excerpts and ids |
//! | `search_by_title` | Precise title-only lookup |
//! | `get_document` | Full page content with citation |
//! | `summarize_document` | Model-written summary of a long page |
//! | `answer_with_citations` | Search, read, and answer with sources |
//! | `suggest_actions` | Actionable next steps from matching pages |

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::connector::{cql_quote, ConfluenceClient};
use crate::llm::{system_message, tool_message, user_message, LlmClient, ToolCall};
use crate::models::{Document, SearchResult};
use crate::render;
use crate::search::search_content;

/// Ceiling on model → tool → model rounds for a single question.
const MAX_TOOL_ROUNDS: usize = 8;

const SEARCH_LIMIT: usize = 10;
const ANSWER_CONTEXT_DOCS: usize = 5;
const SUGGEST_CONTEXT_DOCS: usize = 3;
const EXCERPT_CHARS: usize = 200;
const DEFAULT_SUMMARY_CHARS: usize = 500;

const SYSTEM_PROMPT: &str = "\
You are a knowledge assistant for internal documentation. Your role is to \
help users find information in Confluence and answer their questions.

Always:
- Provide citations when referencing documents
- When the user mentions a specific document title, use search_by_title first
- Use search_confluence for general searches
- Use answer_with_citations for comprehensive answers
- Use summarize_document for long documents
- Use suggest_actions to help users with next steps
- Be helpful, accurate, and cite your sources
- If an initial search fails, try different search strategies or keywords

When answering:
- Be concise but thorough
- Always include document URLs as citations, formatted as [1], [2], etc.
- If you don't know something, say so and suggest searching Confluence
- When the user asks for a summary of a document, first find it, then \
retrieve and summarize it";

// ═══════════════════════════════════════════════════════════════════════
// Tool Trait and Registry
// ═══════════════════════════════════════════════════════════════════════

/// A capability the model can discover and call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Lowercase identifier with underscores, used as the function name.
    fn name(&self) -> &str;

    /// One-line description the model uses to decide whether to call it.
    fn description(&self) -> &str;

    /// JSON Schema for the parameters object.
    fn parameters_schema(&self) -> Value;

    /// Execute with validated parameters.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

/// Bridge the tools use to reach the store and the model.
pub struct ToolContext {
    pub confluence: Arc<ConfluenceClient>,
    pub llm: Arc<LlmClient>,
}

/// Ordered collection of registered capabilities.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Registry pre-populated with the six built-in capabilities.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SearchConfluenceTool));
        registry.register(Box::new(SearchByTitleTool));
        registry.register(Box::new(GetDocumentTool));
        registry.register(Box::new(SummarizeDocumentTool));
        registry.register(Box::new(AnswerWithCitationsTool));
        registry.register(Box::new(SuggestActionsTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Function-calling specs in the chat-completions `tools` shape.
    pub fn function_specs(&self) -> Value {
        let specs: Vec<Value> = self
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name(),
                        "description": t.description(),
                        "parameters": t.parameters_schema(),
                    }
                })
            })
            .collect();
        Value::Array(specs)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Agent Loop
// ═══════════════════════════════════════════════════════════════════════

/// The conversational agent: a registry plus the loop that lets the model
/// drive it.
pub struct Agent {
    ctx: ToolContext,
    registry: ToolRegistry,
}

impl Agent {
    pub fn new(confluence: Arc<ConfluenceClient>, llm: Arc<LlmClient>) -> Self {
        Self {
            ctx: ToolContext { confluence, llm },
            registry: ToolRegistry::with_builtins(),
        }
    }

    /// Answer one user question, running tool calls as the model requests
    /// them.
    pub async fn ask(&self, question: &str) -> Result<String> {
        let specs = self.registry.function_specs();
        let mut transcript = vec![system_message(SYSTEM_PROMPT), user_message(question)];

        for round in 0..MAX_TOOL_ROUNDS {
            let response = self.ctx.llm.chat(&transcript, Some(&specs)).await?;

            if response.tool_calls.is_empty() {
                return Ok(response.text.unwrap_or_default());
            }

            transcript.push(response.message.clone());
            for call in &response.tool_calls {
                info!(round, tool = %call.name, "executing tool call");
                let rendered = self.dispatch(call).await;
                transcript.push(tool_message(&call.id, &rendered));
            }
        }

        anyhow::bail!(
            "The model did not reach an answer within {} tool rounds",
            MAX_TOOL_ROUNDS
        )
    }

    /// Run one tool call, converting every failure into a message string.
    async fn dispatch(&self, call: &ToolCall) -> String {
        let Some(tool) = self.registry.get(&call.name) else {
            warn!(tool = %call.name, "model requested unknown tool");
            return format!("Unknown tool: {}", call.name);
        };

        match tool.execute(call.arguments.clone(), &self.ctx).await {
            Ok(Value::String(text)) => text,
            Ok(other) => other.to_string(),
            Err(e) => {
                warn!(tool = %call.name, error = %e, "tool execution failed");
                format!("Error running {}: {}", call.name, e)
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Built-in Capabilities
// ═══════════════════════════════════════════════════════════════════════

struct SearchConfluenceTool;

#[async_trait]
impl Tool for SearchConfluenceTool {
    fn name(&self) -> &str {
        "search_confluence"
    }

    fn description(&self) -> &str {
        "Search Confluence with multiple strategies; returns matching pages with excerpts, URLs, and content ids"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query: a title, keywords, or full text" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let query = required_str(&params, "query")?;
        let results = search_content(&ctx.confluence, query, SEARCH_LIMIT).await;

        if results.is_empty() {
            return Ok(json!(no_results_message(query)));
        }

        Ok(json!(format_search_results(query, &results)))
    }
}

struct SearchByTitleTool;

#[async_trait]
impl Tool for SearchByTitleTool {
    fn name(&self) -> &str {
        "search_by_title"
    }

    fn description(&self) -> &str {
        "Find Confluence pages by exact or partial title; more precise than general search"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title_query": { "type": "string", "description": "The title or part of the title to search for" }
            },
            "required": ["title_query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let title_query = required_str(&params, "title_query")?;
        let cql = format!("title ~ \"{}\"", cql_quote(title_query));
        let results = ctx
            .confluence
            .search_cql(&cql, SEARCH_LIMIT as u32)
            .await;

        if results.is_empty() {
            return Ok(json!(format!(
                "No pages found with title matching: '{}'",
                title_query
            )));
        }

        Ok(json!(format_title_results(title_query, &results)))
    }
}

struct GetDocumentTool;

#[async_trait]
impl Tool for GetDocumentTool {
    fn name(&self) -> &str {
        "get_document"
    }

    fn description(&self) -> &str {
        "Retrieve the complete content of a Confluence page by its content id"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "content_id": { "type": "string", "description": "The Confluence content id, found in URLs or search results" }
            },
            "required": ["content_id"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let content_id = required_str(&params, "content_id")?;

        match ctx.confluence.get_content_by_id(content_id).await {
            Some(doc) => Ok(json!(format_document(&doc))),
            None => Ok(json!(format!("Document with ID {} not found.", content_id))),
        }
    }
}

struct SummarizeDocumentTool;

#[async_trait]
impl Tool for SummarizeDocumentTool {
    fn name(&self) -> &str {
        "summarize_document"
    }

    fn description(&self) -> &str {
        "Summarize a long Confluence page; use when a document is too long to quote"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "content_id": { "type": "string", "description": "The Confluence content id" },
                "max_length": { "type": "integer", "description": "Maximum summary length in characters", "default": 500 }
            },
            "required": ["content_id"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let content_id = required_str(&params, "content_id")?;
        let max_length = params
            .get("max_length")
            .and_then(Value::as_u64)
            .map(|v| v as usize)
            .unwrap_or(DEFAULT_SUMMARY_CHARS);

        let Some(doc) = ctx.confluence.get_content_by_id(content_id).await else {
            return Ok(json!(format!("Document with ID {} not found.", content_id)));
        };

        let body_text = render::clean(&doc.body);

        let summary = if body_text.chars().count() > max_length {
            // Cap the model input so a huge page doesn't blow the context.
            let prompt = format!(
                "Please provide a concise summary of the following document in {} characters or less:\n\n\
                 Title: {}\n\
                 Content: {}\n\n\
                 Summary:",
                max_length,
                doc.title,
                render::truncate_chars(&body_text, 3000),
            );
            ctx.llm.complete(&prompt).await?
        } else {
            render::truncate_chars(&body_text, max_length)
        };

        Ok(json!(format!(
            "Summary of: {}\nSpace: {}\nURL: {}\n\n{}\n\nCitation: {}",
            doc.title, doc.space, doc.url, summary, doc.url
        )))
    }
}

struct AnswerWithCitationsTool;

#[async_trait]
impl Tool for AnswerWithCitationsTool {
    fn name(&self) -> &str {
        "answer_with_citations"
    }

    fn description(&self) -> &str {
        "Answer a question by searching Confluence, reading the top documents, and citing sources"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The user's question" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let query = required_str(&params, "query")?;
        let results = search_content(&ctx.confluence, query, ANSWER_CONTEXT_DOCS).await;

        if results.is_empty() {
            return Ok(json!(format!(
                "I couldn't find any relevant information for: '{}'",
                query
            )));
        }

        let mut contexts = Vec::new();
        let mut citations = Vec::new();

        for result in &results {
            if let Some(doc) = ctx.confluence.get_content_by_id(&result.id).await {
                let body_text = render::truncate_chars(&render::clean(&doc.body), 2000);
                contexts.push(format!("Title: {}\nContent: {}", doc.title, body_text));
                citations.push((doc.title.clone(), doc.url.clone()));
            }
        }

        if contexts.is_empty() {
            return Ok(json!(format!(
                "I couldn't retrieve the documents matching: '{}'",
                query
            )));
        }

        let documents = contexts
            .iter()
            .enumerate()
            .map(|(i, ctx_text)| format!("Document {}: {}", i + 1, ctx_text))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "Based on the following Confluence documents, answer the user's question.\n\
             Provide a clear, accurate answer and cite the sources.\n\n\
             User Question: {}\n\n\
             Documents:\n{}\n\n\
             Answer the question using information from these documents. At the end, \
             list all citations in the format:\n[1] Title - URL\n[2] Title - URL\n\n\
             Answer:",
            query, documents
        );

        let mut answer = ctx.llm.complete(&prompt).await?;

        // Make sure citations survive even when the model drops them.
        if !citations.iter().any(|(_, url)| answer.contains(url)) {
            let citation_text = citations
                .iter()
                .enumerate()
                .map(|(i, (title, url))| format!("[{}] {} - {}", i + 1, title, url))
                .collect::<Vec<_>>()
                .join("\n");
            answer.push_str("\n\nCitations:\n");
            answer.push_str(&citation_text);
        }

        Ok(json!(answer))
    }
}

struct SuggestActionsTool;

#[async_trait]
impl Tool for SuggestActionsTool {
    fn name(&self) -> &str {
        "suggest_actions"
    }

    fn description(&self) -> &str {
        "Suggest actionable next steps for a query, grounded in matching documents"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The user's query or question" },
                "context": { "type": "string", "description": "Optional context from documents already read" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let query = required_str(&params, "query")?;
        let extra_context = params
            .get("context")
            .and_then(Value::as_str)
            .unwrap_or("");

        let results = search_content(&ctx.confluence, query, SUGGEST_CONTEXT_DOCS).await;

        let mut context_text = extra_context.to_string();
        for result in &results {
            if let Some(doc) = ctx.confluence.get_content_by_id(&result.id).await {
                let body_text = render::truncate_chars(&render::clean(&doc.body), 1500);
                context_text.push_str(&format!("\n\nDocument: {}\n{}", doc.title, body_text));
            }
        }

        let prompt = format!(
            "Based on the following query and context, suggest 3-5 actionable next steps for the user.\n\n\
             Query: {}\n\n\
             Context: {}\n\n\
             Provide suggestions in a numbered list format. Each suggestion should be:\n\
             - Specific and actionable\n\
             - Relevant to the query\n\
             - Based on the context provided\n\n\
             Suggestions:",
            query, context_text
        );

        let suggestions = ctx.llm.complete(&prompt).await?;
        Ok(json!(suggestions))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Formatting
// ═══════════════════════════════════════════════════════════════════════

fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    let value = params.get(key).and_then(Value::as_str).unwrap_or("");
    if value.trim().is_empty() {
        anyhow::bail!("{} must not be empty", key);
    }
    Ok(value)
}

pub fn no_results_message(query: &str) -> String {
    format!(
        "No results found for query: '{}'\n\n\
         Suggestions:\n\
         - Try using keywords instead of the full title\n\
         - Check spelling\n\
         - Try searching for a specific part of the title\n\
         - Ensure you have access to the Confluence space",
        query
    )
}

pub fn format_search_results(query: &str, results: &[SearchResult]) -> String {
    let entries = results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            format!(
                "[{}] {}\n   Space: {}\n   URL: {}\n   Content ID: {}\n   Excerpt: {}\n",
                i + 1,
                result.title,
                result.space,
                result.url,
                result.id,
                render::excerpt_of(result, EXCERPT_CHARS),
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Found {} results for '{}':\n\n{}",
        results.len(),
        query,
        entries
    )
}

pub fn format_title_results(query: &str, results: &[SearchResult]) -> String {
    let entries = results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            format!(
                "[{}] {}\n   Space: {}\n   URL: {}\n   Content ID: {}\n",
                i + 1,
                result.title,
                result.space,
                result.url,
                result.id,
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Found {} pages with title matching '{}':\n\n{}",
        results.len(),
        query,
        entries
    )
}

pub fn format_document(doc: &Document) -> String {
    let body_text = render::clean(&doc.body);
    format!(
        "Document: {}\nSpace: {}\nURL: {}\nVersion: {}\nLast Modified: {}\n\n\
         Content:\n{}\n\nCitation: {}",
        doc.title,
        doc.space,
        doc.url,
        doc.version,
        if doc.last_modified.is_empty() {
            "N/A".to_string()
        } else {
            doc.last_modified.clone()
        },
        body_text,
        doc.url
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result(id: &str, title: &str) -> SearchResult {
        SearchResult {
            id: id.to_string(),
            title: title.to_string(),
            url: format!("https://example.atlassian.net/spaces/X/pages/{}", id),
            space: "Platform".to_string(),
            content_type: "page".to_string(),
            excerpt: "an excerpt".to_string(),
            body: String::new(),
        }
    }

    #[test]
    fn registry_has_six_builtins_in_order() {
        let registry = ToolRegistry::with_builtins();
        assert_eq!(
            registry.names(),
            vec![
                "search_confluence",
                "search_by_title",
                "get_document",
                "summarize_document",
                "answer_with_citations",
                "suggest_actions",
            ]
        );
    }

    #[test]
    fn registry_lookup_by_name() {
        let registry = ToolRegistry::with_builtins();
        assert!(registry.get("get_document").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn function_specs_shape() {
        let registry = ToolRegistry::with_builtins();
        let specs = registry.function_specs();
        let array = specs.as_array().unwrap();
        assert_eq!(array.len(), 6);

        for spec in array {
            assert_eq!(spec["type"], "function");
            assert!(spec["function"]["name"].is_string());
            assert!(spec["function"]["description"].is_string());
            assert_eq!(spec["function"]["parameters"]["type"], "object");
        }
    }

    #[test]
    fn search_results_formatting() {
        let results = vec![
            sample_result("1", "First Page"),
            sample_result("2", "Second Page"),
        ];
        let text = format_search_results("deploy", &results);

        assert!(text.starts_with("Found 2 results for 'deploy':"));
        assert!(text.contains("[1] First Page"));
        assert!(text.contains("[2] Second Page"));
        assert!(text.contains("Content ID: 1"));
        assert!(text.contains("Space: Platform"));
        assert!(text.contains("Excerpt: an excerpt"));
    }

    #[test]
    fn title_results_omit_excerpts() {
        let results = vec![sample_result("1", "First Page")];
        let text = format_title_results("First", &results);
        assert!(text.contains("[1] First Page"));
        assert!(!text.contains("Excerpt:"));
    }

    #[test]
    fn no_results_message_carries_query() {
        let text = no_results_message("missing thing");
        assert!(text.contains("'missing thing'"));
        assert!(text.contains("Suggestions:"));
    }

    #[test]
    fn document_formatting_handles_empty_last_modified() {
        let doc = Document {
            id: "9".to_string(),
            title: "Doc".to_string(),
            url: "https://example/9".to_string(),
            space: "Eng".to_string(),
            content_type: "page".to_string(),
            body: "<p>Body &amp; text</p>".to_string(),
            version: 3,
            last_modified: String::new(),
        };

        let text = format_document(&doc);
        assert!(text.contains("Last Modified: N/A"));
        assert!(text.contains("Content:\nBody & text"));
        assert!(text.contains("Citation: https://example/9"));
    }
}
