//! # Architect Step
//!
//! Turns the user's request into a blueprint: files to generate, stack,
//! template variables, and a logic summary. The architecture is a trust
//! anchor for every downstream step, so a non-conforming reply aborts the
//! run rather than being patched up.

use tracing::info;

use super::prompts;
use crate::llm::{generate_structured, LanguageModel, LlmError};
use crate::state::{Architecture, StateUpdate, WorkflowState, DEFAULT_TEMPLATE};

/// Run the architect against the user prompt.
///
/// Sets `architecture`, defaults `template_name` if unset, and resets
/// `revision_count` to 0.
pub async fn run(
    llm: &dyn LanguageModel,
    state: &WorkflowState,
) -> Result<StateUpdate, LlmError> {
    info!("agent: architect");

    let user = format!("User Request: {}", state.user_prompt);
    let mut architecture: Architecture =
        generate_structured(llm, prompts::ARCHITECT, &user).await?;

    if architecture.template_variables.is_empty() {
        architecture.template_variables = default_template_variables();
    }

    let template_name = if state.template_name.is_empty() {
        Some(DEFAULT_TEMPLATE.to_string())
    } else {
        None
    };

    Ok(StateUpdate {
        architecture: Some(architecture),
        template_name,
        revision_count: Some(0),
        ..Default::default()
    })
}

fn default_template_variables() -> std::collections::BTreeMap<String, serde_json::Value> {
    [
        ("project_name", serde_json::json!("My Appforge Project")),
        ("primary_color", serde_json::json!("#3b82f6")),
        ("secondary_color", serde_json::json!("#10b981")),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}
