//! Ollama backend through rig-core.

use async_trait::async_trait;
use rig::client::{CompletionClient, ProviderClient};
use rig::completion::Prompt;
use rig::providers::ollama;
use tracing::debug;

use super::{CompletionRequest, LanguageModel, LlmResponse};
use crate::error::LlmError;

/// Local model served by Ollama.
///
/// Tool schemas on the request are ignored: rig's simple prompt interface
/// only yields text, so this backend always answers `Text` or `Empty`.
pub struct OllamaModel {
    client: ollama::Client,
    model: String,
}

impl OllamaModel {
    /// Connect to the Ollama server at `host` (e.g. `http://localhost:11434`).
    pub fn new(host: &str, model: impl Into<String>) -> Self {
        // rig's Ollama client reads its base URL from the environment.
        std::env::set_var("OLLAMA_API_BASE_URL", host);
        let client = ollama::Client::from_env();

        Self {
            client,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LanguageModel for OllamaModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse, LlmError> {
        let agent = self
            .client
            .agent(&self.model)
            .preamble(&request.system_prompt)
            .temperature(request.temperature)
            .build();

        debug!(model = %self.model, prompt_chars = request.user_prompt.len(), "Calling Ollama");

        let text = agent
            .prompt(request.user_prompt.as_str())
            .await
            .map_err(|e| LlmError::Request(format!("Ollama completion failed: {}", e)))?;

        Ok(LlmResponse::from_text(text))
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
