//! # Project Materializer
//!
//! Writes the final workflow state to disk: allocates a fresh output
//! directory, renders the skeleton template, merges the generated code on
//! top under the protected-file policy, and optionally asks the package
//! manager whether the result builds.
//!
//! Ownership of an output directory belongs exclusively to the run that
//! created it. The directory-allocation probe is a read-then-create
//! sequence and is not safe against two runs racing on the same base name;
//! concurrent runs should target distinct base folders.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::process::Command;
use tracing::{info, warn};

use crate::codec;
use crate::state::WorkflowState;
use crate::template::TemplateRenderer;

/// Skeleton-owned paths that generated code must never overwrite. Template
/// writes are exempt - the skeleton is allowed to create these once.
pub const PROTECTED_FILES: &[&str] = &[
    "package.json",
    "vite.config.ts",
    "tsconfig.json",
    "tsconfig.node.json",
    "index.html",
    "tailwind.config.js",
    "postcss.config.js",
    "src/main.tsx",
    "src/index.css",
];

/// Options for a materialization.
#[derive(Debug, Clone)]
pub struct MaterializeOptions {
    /// Base output folder; suffixed `_1`, `_2`, ... if taken
    pub base_folder: PathBuf,
    /// Run `npm install` + `npm run build` afterwards (advisory)
    pub run_build_check: bool,
}

impl MaterializeOptions {
    pub fn new(base_folder: impl Into<PathBuf>) -> Self {
        Self {
            base_folder: base_folder.into(),
            run_build_check: false,
        }
    }

    pub fn with_build_check(mut self, enabled: bool) -> Self {
        self.run_build_check = enabled;
        self
    }
}

/// Outcome of the advisory build check.
#[derive(Debug, Clone, Serialize)]
pub struct BuildCheck {
    pub passed: bool,
    /// Combined install/build stdout+stderr when the check failed
    pub diagnostics: Option<String>,
}

/// What the materializer did, for the caller to report.
#[derive(Debug, Clone, Serialize)]
pub struct MaterializeReport {
    /// The allocated output directory
    pub root: PathBuf,
    /// Relative paths written (skeleton and generated)
    pub written: Vec<String>,
    /// Generated paths skipped because the skeleton owns them
    pub skipped_protected: Vec<String>,
    /// Per-file failures: (path, reason); these abort the file, not the run
    pub failed: Vec<(String, String)>,
    /// `None` when the check was not requested
    pub build_check: Option<BuildCheck>,
}

/// Render the skeleton, merge the generated code on top, and write the
/// result to a freshly allocated directory.
pub async fn materialize(
    state: &WorkflowState,
    renderer: &dyn TemplateRenderer,
    options: &MaterializeOptions,
) -> Result<MaterializeReport> {
    let root = allocate_output_dir(&options.base_folder).await?;
    info!(root = %root.display(), "created project folder");

    let mut report = MaterializeReport {
        root: root.clone(),
        written: Vec::new(),
        skipped_protected: Vec::new(),
        failed: Vec::new(),
        build_check: None,
    };

    // Skeleton first, unconditionally. A render failure degrades to
    // generated-code-only output; it never aborts materialization.
    match renderer
        .render(&state.template_name, &state.template_variables())
        .await
    {
        Ok(skeleton) => write_files(&root, &skeleton, None, &mut report).await,
        Err(e) => {
            warn!(template = %state.template_name, error = %e, "skeleton render failed; writing generated code only");
        }
    }

    // Generated code on top, with skeleton-owned paths protected.
    write_files(&root, &state.code, Some(PROTECTED_FILES), &mut report).await;

    if options.run_build_check {
        report.build_check = Some(run_build_check(&root).await);
    }

    Ok(report)
}

/// Probe `base`, `base_1`, `base_2`, ... until an unused name is found, and
/// create it.
async fn allocate_output_dir(base: &Path) -> Result<PathBuf> {
    let mut candidate = base.to_path_buf();
    let mut counter = 1;
    while tokio::fs::metadata(&candidate).await.is_ok() {
        candidate = append_suffix(base, counter);
        counter += 1;
    }
    tokio::fs::create_dir_all(&candidate)
        .await
        .with_context(|| format!("failed to create output directory {:?}", candidate))?;
    Ok(candidate)
}

fn append_suffix(base: &Path, counter: u32) -> PathBuf {
    let name = base
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "generated_app".to_string());
    base.with_file_name(format!("{name}_{counter}"))
}

async fn write_files(
    root: &Path,
    files: &BTreeMap<String, String>,
    protected: Option<&[&str]>,
    report: &mut MaterializeReport,
) {
    for (raw_path, content) in files {
        let Some(path) = codec::sanitize_path(raw_path) else {
            report
                .failed
                .push((raw_path.clone(), "unsafe path rejected".to_string()));
            continue;
        };
        if let Some(protected) = protected {
            if protected.contains(&path.as_str()) {
                info!(path = %path, "skipping protected file");
                report.skipped_protected.push(path);
                continue;
            }
        }
        match write_one(root, &path, content).await {
            Ok(()) => report.written.push(path),
            Err(e) => {
                warn!(path = %path, error = %e, "file write failed");
                report.failed.push((path, e.to_string()));
            }
        }
    }
}

async fn write_one(root: &Path, rel_path: &str, content: &str) -> Result<()> {
    let full_path = root.join(rel_path);
    if let Some(parent) = full_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&full_path, content)
        .await
        .with_context(|| format!("failed to write {:?}", full_path))?;
    Ok(())
}

/// Install dependencies and build, capturing combined output. Advisory only:
/// the result informs the caller, it never unwinds the materialization.
async fn run_build_check(root: &Path) -> BuildCheck {
    for args in [["install"].as_slice(), ["run", "build"].as_slice()] {
        match Command::new("npm").args(args).current_dir(root).output().await {
            Ok(output) if output.status.success() => {}
            Ok(output) => {
                let combined = format!(
                    "npm {} failed:\n{}\n{}",
                    args.join(" "),
                    String::from_utf8_lossy(&output.stdout),
                    String::from_utf8_lossy(&output.stderr),
                );
                return BuildCheck {
                    passed: false,
                    diagnostics: Some(combined),
                };
            }
            Err(e) => {
                return BuildCheck {
                    passed: false,
                    diagnostics: Some(format!("failed to run npm {}: {e}", args.join(" "))),
                };
            }
        }
    }
    BuildCheck {
        passed: true,
        diagnostics: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::template::TemplateError;

    /// Renderer returning a fixed skeleton.
    struct FixedRenderer {
        files: BTreeMap<String, String>,
        fail: bool,
    }

    #[async_trait]
    impl TemplateRenderer for FixedRenderer {
        async fn render(
            &self,
            name: &str,
            _variables: &BTreeMap<String, serde_json::Value>,
        ) -> Result<BTreeMap<String, String>, TemplateError> {
            if self.fail {
                return Err(TemplateError::NotFound(name.to_string()));
            }
            Ok(self.files.clone())
        }
    }

    fn skeleton() -> BTreeMap<String, String> {
        [
            ("package.json", "{\"name\": \"skeleton\"}"),
            ("src/main.tsx", "skeleton entry"),
            ("src/index.css", "@tailwind base;"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn state_with_code(code: &[(&str, &str)]) -> WorkflowState {
        let mut state = WorkflowState::new("test");
        state.code = code
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        state
    }

    #[tokio::test]
    async fn test_protected_files_keep_skeleton_content() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with_code(&[
            ("package.json", "{\"name\": \"EVIL\"}"),
            ("src/main.tsx", "evil entry"),
            ("src/index.css", "evil css"),
            ("src/App.tsx", "generated app"),
        ]);
        let renderer = FixedRenderer {
            files: skeleton(),
            fail: false,
        };
        let options = MaterializeOptions::new(dir.path().join("app"));
        let report = materialize(&state, &renderer, &options).await.unwrap();

        for path in ["package.json", "src/main.tsx", "src/index.css"] {
            let on_disk = std::fs::read_to_string(report.root.join(path)).unwrap();
            assert_eq!(on_disk, skeleton()[path], "protected {path}");
        }
        assert_eq!(
            std::fs::read_to_string(report.root.join("src/App.tsx")).unwrap(),
            "generated app"
        );
        assert_eq!(report.skipped_protected.len(), 3);
        assert!(report.build_check.is_none());
    }

    #[tokio::test]
    async fn test_unique_output_directories() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with_code(&[("src/App.tsx", "v1")]);
        let renderer = FixedRenderer {
            files: skeleton(),
            fail: false,
        };
        let options = MaterializeOptions::new(dir.path().join("app"));

        let first = materialize(&state, &renderer, &options).await.unwrap();
        let second = materialize(&state, &renderer, &options).await.unwrap();

        assert_eq!(first.root, dir.path().join("app"));
        assert_eq!(second.root, dir.path().join("app_1"));
        for report in [&first, &second] {
            assert!(report.root.join("src/App.tsx").is_file());
            assert!(report.root.join("package.json").is_file());
        }
    }

    #[tokio::test]
    async fn test_render_failure_degrades_to_generated_only() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with_code(&[("src/App.tsx", "generated app")]);
        let renderer = FixedRenderer {
            files: BTreeMap::new(),
            fail: true,
        };
        let options = MaterializeOptions::new(dir.path().join("app"));
        let report = materialize(&state, &renderer, &options).await.unwrap();

        assert!(report.root.join("src/App.tsx").is_file());
        assert!(!report.root.join("package.json").exists());
    }

    #[tokio::test]
    async fn test_unsafe_generated_path_is_reported_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with_code(&[("../escape.txt", "nope"), ("src/ok.tsx", "ok")]);
        let renderer = FixedRenderer {
            files: BTreeMap::new(),
            fail: false,
        };
        let options = MaterializeOptions::new(dir.path().join("app"));
        let report = materialize(&state, &renderer, &options).await.unwrap();

        assert!(!dir.path().join("escape.txt").exists());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.written, vec!["src/ok.tsx".to_string()]);
    }
}
