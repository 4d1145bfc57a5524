//! LLM boundary
//!
//! The research core talks to language models through the [`LanguageModel`]
//! trait. Every backend decodes its provider-specific reply exactly once into
//! the tagged [`LlmResponse`] union, so the rest of the crate never inspects
//! raw provider payloads.
//!
//! Retry and backoff for the model call itself belong to the backend; callers
//! treat `complete` as a black box that either answers or fails.

mod ollama;
mod openai;

pub use ollama::OllamaModel;
pub use openai::OpenAiCompatibleModel;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// A function schema offered to a tool-enabled completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: serde_json::Value,
}

/// One system + user prompt completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f64,
    /// Empty for plain-text completions.
    pub tools: Vec<ToolSchema>,
}

impl CompletionRequest {
    pub fn new(
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
        temperature: f64,
    ) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            temperature,
            tools: Vec::new(),
        }
    }

    /// Offer a tool to the model.
    pub fn with_tool(mut self, tool: ToolSchema) -> Self {
        self.tools.push(tool);
        self
    }
}

/// Decoded model reply.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmResponse {
    /// Plain assistant text.
    Text(String),
    /// The model chose to call a tool.
    ToolCall {
        name: String,
        arguments: serde_json::Value,
    },
    /// Nothing usable came back.
    Empty,
}

impl LlmResponse {
    /// Build a response from assistant text, mapping blank text to `Empty`.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.trim().is_empty() {
            LlmResponse::Empty
        } else {
            LlmResponse::Text(text)
        }
    }

    /// Consume the response as text. The research core only uses this form.
    pub fn into_text(self) -> Result<String, LlmError> {
        match self {
            LlmResponse::Text(text) => Ok(text),
            LlmResponse::ToolCall { name, .. } => Err(LlmError::UnexpectedToolCall(name)),
            LlmResponse::Empty => Err(LlmError::Empty),
        }
    }
}

/// Provider-agnostic completion interface.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Run one completion.
    async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse, LlmError>;

    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Convenience wrapper: plain-text completion.
    async fn complete_text(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f64,
    ) -> Result<String, LlmError> {
        let request = CompletionRequest::new(system_prompt, user_prompt, temperature);
        self.complete(&request).await?.into_text()
    }
}
