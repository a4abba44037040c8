//! Chat-completions client for an OpenAI-compatible API.
//!
//! Calls `POST {base}/v1/chat/completions` with optional function-calling
//! tools. Transient failures retry with exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! Unlike the Confluence client, errors here do propagate: a model failure
//! means the caller has no answer to give, not a degraded search.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::LlmConfig;

pub struct LlmClient {
    config: LlmConfig,
    http: reqwest::Client,
}

/// One tool invocation requested by the model.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Parsed JSON arguments; `{}` when the model emitted malformed JSON.
    pub arguments: Value,
}

/// Parsed assistant turn: the raw message (for transcript replay) plus the
/// text or tool calls it carried.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub message: Value,
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            config: config.clone(),
            http,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Send a conversation to the model, optionally advertising tools.
    pub async fn chat(&self, messages: &[Value], tools: Option<&Value>) -> Result<ChatResponse> {
        let mut body = json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": 0,
        });
        if let Some(tools) = tools {
            body["tools"] = tools.clone();
        }

        let url = format!("{}/v1/chat/completions", self.config.base_url);
        let mut last_err = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .http
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.config.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: Value = response.json().await?;
                        return parse_chat_response(&json);
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err =
                            Some(anyhow::anyhow!("Model API error {}: {}", status, body_text));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Model API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Model request failed after retries")))
    }

    /// Single-turn completion without tools; returns the assistant text.
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let messages = vec![user_message(prompt)];
        let response = self.chat(&messages, None).await?;
        response
            .text
            .ok_or_else(|| anyhow::anyhow!("Model returned no text content"))
    }
}

/// Extract the assistant message from a chat-completions response.
fn parse_chat_response(json: &Value) -> Result<ChatResponse> {
    let message = json
        .pointer("/choices/0/message")
        .ok_or_else(|| anyhow::anyhow!("Invalid model response: missing choices[0].message"))?
        .clone();

    let text = message
        .get("content")
        .and_then(Value::as_str)
        .map(str::to_string);

    let tool_calls: Vec<ToolCall> = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|calls| calls.iter().filter_map(parse_tool_call).collect())
        .unwrap_or_default();

    debug!(
        has_text = text.is_some(),
        tool_calls = tool_calls.len(),
        "parsed assistant turn"
    );

    Ok(ChatResponse {
        message,
        text,
        tool_calls,
    })
}

fn parse_tool_call(call: &Value) -> Option<ToolCall> {
    let id = call.get("id").and_then(Value::as_str)?.to_string();
    let name = call.pointer("/function/name").and_then(Value::as_str)?.to_string();

    // Arguments arrive as a JSON-encoded string; malformed output from the
    // model becomes an empty object rather than a failed turn.
    let arguments = call
        .pointer("/function/arguments")
        .and_then(Value::as_str)
        .and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or_else(|| json!({}));

    Some(ToolCall {
        id,
        name,
        arguments,
    })
}

// ============ Message constructors ============

pub fn system_message(content: &str) -> Value {
    json!({ "role": "system", "content": content })
}

pub fn user_message(content: &str) -> Value {
    json!({ "role": "user", "content": content })
}

/// A tool result message answering the given tool call id.
pub fn tool_message(call_id: &str, content: &str) -> Value {
    json!({ "role": "tool", "tool_call_id": call_id, "content": content })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_text_response() {
        let json = json!({
            "choices": [{
                "message": { "role": "assistant", "content": "Hello there" }
            }]
        });

        let response = parse_chat_response(&json).unwrap();
        assert_eq!(response.text.as_deref(), Some("Hello there"));
        assert!(response.tool_calls.is_empty());
    }

    #[test]
    fn parse_tool_call_response() {
        let json = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "search_confluence",
                            "arguments": "{\"query\": \"deploy runbook\"}"
                        }
                    }]
                }
            }]
        });

        let response = parse_chat_response(&json).unwrap();
        assert_eq!(response.text, None);
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].id, "call_1");
        assert_eq!(response.tool_calls[0].name, "search_confluence");
        assert_eq!(response.tool_calls[0].arguments["query"], "deploy runbook");
    }

    #[test]
    fn parse_malformed_arguments_become_empty_object() {
        let json = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "tool_calls": [{
                        "id": "call_1",
                        "function": { "name": "get_document", "arguments": "{not json" }
                    }]
                }
            }]
        });

        let response = parse_chat_response(&json).unwrap();
        assert_eq!(response.tool_calls[0].arguments, json!({}));
    }

    #[test]
    fn parse_missing_choices_is_error() {
        assert!(parse_chat_response(&json!({ "error": "boom" })).is_err());
    }

    #[test]
    fn message_constructors_shape() {
        let msg = tool_message("call_9", "result text");
        assert_eq!(msg["role"], "tool");
        assert_eq!(msg["tool_call_id"], "call_9");
        assert_eq!(msg["content"], "result text");
    }
}
