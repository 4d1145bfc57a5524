//! OpenAI-compatible chat completions backend
//!
//! Talks to any endpoint implementing `POST {base}/chat/completions`
//! (OpenAI, OpenRouter, Heurist, vLLM, ...). Unlike the Ollama backend this
//! one forwards tool schemas and decodes tool calls into
//! [`LlmResponse::ToolCall`].

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{CompletionRequest, LanguageModel, LlmResponse, ToolSchema};
use crate::error::LlmError;

/// Default timeout for a completion request
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Output token cap per completion
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct OpenAiCompatibleModel {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    timeout: Duration,
}

impl OpenAiCompatibleModel {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Set the output token cap
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set custom timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn build_body<'a>(&'a self, request: &'a CompletionRequest) -> ChatRequest<'a> {
        let tools: Vec<ChatTool<'a>> = request
            .tools
            .iter()
            .map(|tool| ChatTool {
                kind: "function",
                function: tool,
            })
            .collect();

        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            temperature: request.temperature,
            max_tokens: self.max_tokens,
            tool_choice: if tools.is_empty() { None } else { Some("auto") },
            tools,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ChatTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a ToolSchema,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCallPayload>,
}

#[derive(Debug, Deserialize)]
struct ToolCallPayload {
    function: FunctionPayload,
}

#[derive(Debug, Deserialize)]
struct FunctionPayload {
    name: String,
    /// JSON-encoded arguments object
    #[serde(default)]
    arguments: String,
}

/// Decode the first choice of a chat completion into the tagged union.
///
/// A tool call wins over text, mirroring how tool-enabled callers consume it.
fn decode_response(response: ChatResponse) -> Result<LlmResponse, LlmError> {
    let Some(choice) = response.choices.into_iter().next() else {
        return Ok(LlmResponse::Empty);
    };

    if let Some(call) = choice.message.tool_calls.into_iter().next() {
        let arguments = if call.function.arguments.trim().is_empty() {
            serde_json::Value::Object(Default::default())
        } else {
            serde_json::from_str(&call.function.arguments).map_err(|e| {
                LlmError::Decode(format!(
                    "tool call `{}` has invalid arguments: {}",
                    call.function.name, e
                ))
            })?
        };
        return Ok(LlmResponse::ToolCall {
            name: call.function.name,
            arguments,
        });
    }

    Ok(choice
        .message
        .content
        .map(LlmResponse::from_text)
        .unwrap_or(LlmResponse::Empty))
}

#[async_trait]
impl LanguageModel for OpenAiCompatibleModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(url = %url, model = %self.model, tools = request.tools.len(), "Calling chat completions");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&self.build_body(request))
            .send()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let payload: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;

        decode_response(payload)
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }
}
