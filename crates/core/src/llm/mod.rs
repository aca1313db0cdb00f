//! # Generation Capability
//!
//! The external generative service modeled as an injected trait, so every
//! agent step can be exercised in tests with a scripted fake. The production
//! implementation lives in [`http`].

pub mod http;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::warn;

pub use http::HttpLlm;

/// How many times a non-conforming structured reply is retried with a
/// correction hint before the step fails.
const STRUCTURED_RETRIES: usize = 2;

/// Errors from the generation capability.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The service failed outright (network/service fault).
    #[error("generation request failed: {0}")]
    Generation(String),
    /// The service could not produce a record conforming to the requested
    /// shape, even after retries.
    #[error("structured output did not conform: {0}")]
    StructuredOutput(String),
}

/// Opaque text/completion capability injected into every agent step.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Free-text generation.
    async fn generate_text(&self, system: &str, user: &str) -> Result<String, LlmError>;

    /// Generation constrained to return JSON matching `schema`.
    ///
    /// The returned value is syntactically valid JSON but is not guaranteed
    /// to conform to the schema; [`generate_structured`] layers typed
    /// validation and retry on top.
    async fn generate_json(
        &self,
        system: &str,
        user: &str,
        schema: &serde_json::Value,
    ) -> Result<serde_json::Value, LlmError>;
}

/// Typed structured generation: derives the JSON Schema for `T`, invokes the
/// capability, and deserializes. A non-conforming reply is retried with a
/// correction hint appended to the user content.
pub async fn generate_structured<T>(
    llm: &dyn LanguageModel,
    system: &str,
    user: &str,
) -> Result<T, LlmError>
where
    T: DeserializeOwned + JsonSchema,
{
    let schema = serde_json::to_value(schemars::schema_for!(T))
        .map_err(|e| LlmError::StructuredOutput(format!("schema serialization: {e}")))?;

    let mut prompt = user.to_string();
    let mut last_err = String::new();
    for attempt in 0..=STRUCTURED_RETRIES {
        let value = llm.generate_json(system, &prompt, &schema).await?;
        match serde_json::from_value::<T>(value) {
            Ok(parsed) => return Ok(parsed),
            Err(e) => {
                warn!(attempt, error = %e, "structured reply did not match schema");
                last_err = e.to_string();
                prompt = format!(
                    "{user}\n\nYour previous reply did not match the required schema \
                     ({last_err}). Reply again with JSON that matches the schema exactly."
                );
            }
        }
    }
    Err(LlmError::StructuredOutput(last_err))
}
