//! # Skeleton Templates
//!
//! The template-rendering collaborator behind a capability trait, plus the
//! shipped implementation that renders a template directory from disk.
//!
//! A template is a directory of `*.tmpl` files; rendering substitutes
//! `{{ variable }}` placeholders and strips the `.tmpl` suffix, producing a
//! mapping of relative paths to file content.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

/// Suffix marking a file as a renderable template.
const TEMPLATE_SUFFIX: &str = ".tmpl";

static VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").expect("valid variable regex"));

/// Errors from skeleton rendering. Advisory during materialization: the
/// caller logs and proceeds with generated code only.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template '{0}' not found")]
    NotFound(String),
    #[error("failed to render template file {0}: {1}")]
    Render(String, String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// External template-rendering capability.
#[async_trait]
pub trait TemplateRenderer: Send + Sync {
    /// Render the named skeleton with the given variables into a mapping of
    /// relative paths to file content.
    async fn render(
        &self,
        name: &str,
        variables: &BTreeMap<String, serde_json::Value>,
    ) -> Result<BTreeMap<String, String>, TemplateError>;
}

/// Renders templates from a directory tree on disk (`<root>/<name>/...`).
pub struct DirTemplateRenderer {
    root: PathBuf,
}

impl DirTemplateRenderer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl TemplateRenderer for DirTemplateRenderer {
    async fn render(
        &self,
        name: &str,
        variables: &BTreeMap<String, serde_json::Value>,
    ) -> Result<BTreeMap<String, String>, TemplateError> {
        let template_dir = self.root.join(name);
        if !template_dir.is_dir() {
            return Err(TemplateError::NotFound(name.to_string()));
        }

        let mut rendered = BTreeMap::new();
        for entry in WalkDir::new(&template_dir) {
            let entry = entry.map_err(|e| {
                TemplateError::Render(name.to_string(), e.to_string())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(rel_path) = template_rel_path(entry.path(), &template_dir) else {
                continue;
            };
            let raw = tokio::fs::read_to_string(entry.path()).await?;
            rendered.insert(rel_path, substitute(&raw, variables));
        }
        Ok(rendered)
    }
}

/// Relative output path for a template file, or `None` for non-template files.
fn template_rel_path(path: &Path, template_dir: &Path) -> Option<String> {
    let rel = path.strip_prefix(template_dir).ok()?;
    let rel = rel.to_string_lossy().replace('\\', "/");
    rel.strip_suffix(TEMPLATE_SUFFIX).map(|s| s.to_string())
}

/// Substitute `{{ var }}` placeholders from the variable map. A missing
/// variable renders as the empty string.
fn substitute(content: &str, variables: &BTreeMap<String, serde_json::Value>) -> String {
    VAR_RE
        .replace_all(content, |caps: &regex::Captures| {
            let key = &caps[1];
            match variables.get(key) {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(serde_json::Value::Null) | None => {
                    debug!(variable = key, "template variable unset; rendering empty");
                    String::new()
                }
                Some(other) => other.to_string(),
            }
        })
        .into_owned()
}
