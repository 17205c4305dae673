//! Subprocess-backed action handlers.
//!
//! Each external action is executed by spawning the corresponding workbench
//! tool with the materialised config path as its single argument. The
//! command for action `X` comes from `GRIDBENCH_TOOL_<X>` (upper-case
//! normalised name, whitespace-split) when set, otherwise from the
//! conventional tool binary on PATH. Stdio is inherited so collaborator
//! output reaches the operator; a non-zero exit status is an action
//! failure.

use anyhow::Context;
use async_trait::async_trait;
use gridbench_core::{Action, ActionHandler, ActionRegistry};
use std::path::Path;
use std::sync::Arc;
use tokio::process::Command;
use tracing::debug;

pub struct ToolHandler {
    program: String,
    args: Vec<String>,
}

impl ToolHandler {
    fn resolve(action: Action) -> ToolHandler {
        let env_key = format!(
            "GRIDBENCH_TOOL_{}",
            action.canonical().to_ascii_uppercase()
        );
        if let Ok(spec) = std::env::var(&env_key) {
            let mut parts = spec.split_whitespace().map(str::to_string);
            if let Some(program) = parts.next() {
                return ToolHandler {
                    program,
                    args: parts.collect(),
                };
            }
        }
        ToolHandler {
            program: default_tool(action).to_string(),
            args: Vec::new(),
        }
    }
}

fn default_tool(action: Action) -> &'static str {
    match action {
        Action::CreateBenign => "gridbench-simulate",
        Action::CreateAttackDataset => "gridbench-attack-gen",
        Action::TrainModel => "gridbench-train",
        Action::Evaluate => "gridbench-evaluate",
        Action::ComprehensiveEvaluate => "gridbench-comprehensive-evaluate",
        Action::Compare => "gridbench-compare",
        // never registered; dispatch keeps pipeline inside the engine
        Action::Pipeline => "gridbench",
    }
}

#[async_trait]
impl ActionHandler for ToolHandler {
    async fn execute(&self, config_path: &Path) -> anyhow::Result<()> {
        debug!(program = %self.program, config = %config_path.display(), "spawning tool");
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(config_path)
            .status()
            .await
            .with_context(|| format!("could not launch `{}`", self.program))?;
        if !status.success() {
            anyhow::bail!("`{}` exited with {}", self.program, status);
        }
        Ok(())
    }
}

/// Registry with a subprocess-backed handler for every external action.
pub fn default_registry() -> ActionRegistry {
    let mut registry = ActionRegistry::new();
    for action in Action::external() {
        registry.register(action, Arc::new(ToolHandler::resolve(action)));
    }
    registry
}
