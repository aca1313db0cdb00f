//! HTTP-backed [`LanguageModel`] over OpenAI-compatible chat completions.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{LanguageModel, LlmError};
use crate::models::ModelConfig;

/// Production generation capability speaking the chat-completions protocol.
pub struct HttpLlm {
    config: ModelConfig,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

impl HttpLlm {
    /// Build a client, loading the provider's API key from the environment.
    pub fn from_env(config: ModelConfig) -> anyhow::Result<Self> {
        let env = config.provider.api_key_env();
        let api_key = std::env::var(env)
            .map_err(|_| anyhow::anyhow!("{env} is not set ({} provider)", config.provider.display_name()))?;
        Ok(Self {
            config,
            api_key,
            client: reqwest::Client::new(),
        })
    }

    async fn chat(&self, body: serde_json::Value) -> Result<String, LlmError> {
        debug!(model = %self.config.model, endpoint = %self.config.endpoint(), "chat completion request");
        let response = self
            .client
            .post(self.config.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Generation(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::Generation(format!("{status}: {text}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Generation(format!("malformed chat response: {e}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::Generation("chat response had no choices".into()))
    }
}

#[async_trait]
impl LanguageModel for HttpLlm {
    async fn generate_text(&self, system: &str, user: &str) -> Result<String, LlmError> {
        self.chat(json!({
            "model": self.config.model,
            "temperature": 0,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        }))
        .await
    }

    async fn generate_json(
        &self,
        system: &str,
        user: &str,
        schema: &serde_json::Value,
    ) -> Result<serde_json::Value, LlmError> {
        // The json_object response format guarantees syntactically valid
        // JSON; schema conformance is enforced by the caller's retry loop.
        let system = format!(
            "{system}\n\nRespond with a single JSON object matching this JSON Schema:\n{schema}"
        );
        let content = self
            .chat(json!({
                "model": self.config.model,
                "temperature": 0,
                "response_format": {"type": "json_object"},
                "messages": [
                    {"role": "system", "content": system},
                    {"role": "user", "content": user},
                ],
            }))
            .await?;
        serde_json::from_str(&content)
            .map_err(|e| LlmError::StructuredOutput(format!("reply was not JSON: {e}")))
    }
}
