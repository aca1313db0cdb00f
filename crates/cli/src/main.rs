//! Appforge CLI
//!
//! Drives one workflow run end to end: feature request in, generated
//! project folder out.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use appforge_core::llm::HttpLlm;
use appforge_core::materializer::{self, MaterializeOptions};
use appforge_core::models::{LlmProvider, ModelConfig};
use appforge_core::state::DEFAULT_TEMPLATE;
use appforge_core::template::DirTemplateRenderer;
use appforge_core::workflow::{WorkflowConfig, WorkflowRunner};

#[derive(Parser)]
#[command(name = "appforge", about = "Generate a front-end project from a feature request")]
struct Cli {
    /// The feature request, e.g. "a todo app with drag and drop"
    task: String,

    /// Skeleton template to merge the generated code into
    #[arg(long, default_value = DEFAULT_TEMPLATE)]
    template: String,

    /// Directory containing skeleton templates
    #[arg(long, default_value = "templates")]
    templates_dir: PathBuf,

    /// Base output folder; suffixed _1, _2, ... if taken
    #[arg(long, default_value = "generated_app")]
    output: PathBuf,

    /// LLM provider (groq, openai, openrouter)
    #[arg(long, default_value = "groq")]
    provider: LlmProvider,

    /// Model name; defaults to the provider's default
    #[arg(long)]
    model: Option<String>,

    /// Endpoint override for OpenAI-compatible gateways
    #[arg(long)]
    base_url: Option<String>,

    /// Review score needed to accept (inclusive)
    #[arg(long, default_value_t = appforge_core::workflow::config::DEFAULT_THRESHOLD)]
    threshold: f64,

    /// Fixer invocations allowed before shipping best-effort
    #[arg(long, default_value_t = appforge_core::workflow::config::DEFAULT_MAX_REVISIONS)]
    max_revisions: u32,

    /// Per-agent-step deadline in seconds
    #[arg(long)]
    step_timeout: Option<u64>,

    /// Run npm install + npm run build on the result (advisory)
    #[arg(long)]
    check: bool,

    /// Print the materialization report as JSON instead of a summary
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut model_config = match cli.model {
        Some(model) => ModelConfig::with_provider(cli.provider, model),
        None => ModelConfig {
            provider: cli.provider,
            ..ModelConfig::default()
        },
    };
    if let Some(base_url) = cli.base_url {
        model_config = model_config.with_base_url(base_url);
    }

    let llm = Arc::new(HttpLlm::from_env(model_config).context("LLM provider setup failed")?);
    let renderer = Arc::new(DirTemplateRenderer::new(cli.templates_dir));

    let mut workflow_config = WorkflowConfig {
        threshold: cli.threshold,
        max_revisions: cli.max_revisions,
        template: cli.template,
        ..WorkflowConfig::default()
    };
    if let Some(secs) = cli.step_timeout {
        workflow_config = workflow_config.with_step_timeout(Duration::from_secs(secs));
    }

    info!(task = %cli.task, template = %workflow_config.template, "starting workflow");

    let mut runner =
        WorkflowRunner::new(llm, workflow_config).with_renderer(renderer.clone());
    let state = runner
        .run(&cli.task)
        .await
        .context("workflow run failed")?;

    let options = MaterializeOptions::new(cli.output).with_build_check(cli.check);
    let report = materializer::materialize(&state, renderer.as_ref(), &options)
        .await
        .context("materialization failed")?;

    if cli.json {
        let out = serde_json::json!({
            "report": report,
            "score": state.review_score,
            "revisions": state.revision_count,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("\nProject generated in {}", report.root.display());
    println!(
        "  score: {:.2}  revisions: {}  files written: {}",
        state.review_score.unwrap_or(0.0),
        state.revision_count,
        report.written.len(),
    );
    for path in &report.skipped_protected {
        println!("  protected (skeleton kept): {path}");
    }
    for (path, reason) in &report.failed {
        println!("  failed: {path} ({reason})");
    }
    if let Some(check) = &report.build_check {
        if check.passed {
            println!("  build check: passed");
        } else {
            println!("  build check: FAILED");
            if let Some(diagnostics) = &check.diagnostics {
                println!("{diagnostics}");
            }
        }
    }

    Ok(())
}
