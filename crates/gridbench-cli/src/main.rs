use clap::Parser;
use gridbench_core::{LoadedWorkflow, PipelineEngine, ProvenanceTracker, RuntimeContext};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod exit_codes;
mod handlers;

/// Experiment orchestrator for the GridBench security-research workbench.
#[derive(Parser, Debug)]
#[command(name = "gridbench", version, about)]
struct Cli {
    /// Workflow description document (JSON, or YAML by extension)
    workflow: PathBuf,

    /// Provenance trail directory
    #[arg(long, default_value = "target/tracking")]
    tracking_dir: PathBuf,

    /// Keep materialised step configs on disk for debugging
    #[arg(long)]
    keep_temp_configs: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help/--version exit 0; anything else is a malformed
            // command line
            if e.use_stderr() {
                e.print().ok();
                std::process::exit(exit_codes::EXIT_USAGE);
            }
            e.exit();
        }
    };

    let code = match run(cli).await {
        Ok(()) => exit_codes::EXIT_SUCCESS,
        Err(e) => {
            tracing::error!(kind = exit_codes::kind(&e), error = %e, "workflow failed");
            exit_codes::for_error(&e)
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> gridbench_core::Result<()> {
    let workflow = LoadedWorkflow::load(&cli.workflow)?;
    let tracker = Arc::new(ProvenanceTracker::open(&cli.tracking_dir));
    let ctx = Arc::new(
        RuntimeContext::new(tracker)
            .with_seed(workflow.description.common_config.random_seed)
            .with_output_format(workflow.description.common_config.output_format.clone())
            .with_retain_temp_configs(cli.keep_temp_configs)
            .with_headless(true),
    );
    let engine = PipelineEngine::new(ctx, handlers::default_registry());
    engine.run(&workflow).await
}
