//! # Implementor Step
//!
//! Generates the content of every file the architecture lists, one
//! generation call per file. Per-file calls bound a single reply's size and
//! let the skeleton context be supplied precisely for the target file; the
//! trade-off is N external calls instead of one.

use std::collections::BTreeMap;

use tracing::info;

use super::prompts;
use crate::codec;
use crate::llm::{LanguageModel, LlmError};
use crate::state::{StateUpdate, WorkflowState};

/// Run the implementor over `architecture.files` in listed order.
///
/// Order is significant for reproducibility, not correctness. A failed
/// per-file call gets one local retry before the step fails; no retry state
/// crosses step boundaries.
pub async fn run(
    llm: &dyn LanguageModel,
    state: &WorkflowState,
) -> Result<StateUpdate, LlmError> {
    let architecture = state
        .architecture
        .as_ref()
        .ok_or_else(|| LlmError::Generation("implementor ran without an architecture".into()))?;

    info!(files = architecture.files.len(), "agent: implementor");

    let skeleton_context = codec::encode(&state.rendered_templates);
    let mut code = BTreeMap::new();

    for path in &architecture.files {
        let user = format!(
            "Target file: {path}\n\n\
             All project files: {files}\n\n\
             Logic summary:\n{summary}\n\n\
             Skeleton files already present (do not recreate these):\n{skeleton}",
            files = architecture.files.join(", "),
            summary = architecture.logic_summary,
            skeleton = skeleton_context,
        );

        let raw = match llm.generate_text(prompts::IMPLEMENTOR, &user).await {
            Ok(raw) => raw,
            // One bounded retry, local to this call.
            Err(LlmError::Generation(_)) => llm.generate_text(prompts::IMPLEMENTOR, &user).await?,
            Err(e) => return Err(e),
        };
        code.insert(path.clone(), codec::strip_fences(&raw));
    }

    Ok(StateUpdate {
        code: Some(code),
        ..Default::default()
    })
}
