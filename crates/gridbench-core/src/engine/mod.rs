//! Pipeline engine: executes single actions, linear pipelines and
//! parametric loops.
//!
//! Execution is strictly sequential: steps run in declaration order, loop
//! iterations one after another, and no step starts before the previous one
//! returned. Per loop step the engine loads the base config, applies the
//! variation override and the step overrides, substitutes variables, writes
//! a materialised temp config and hands its path to the dispatched handler.
//! On any failure the remaining steps are skipped and the owning experiment
//! is marked `failed`.

pub mod dual;
pub mod overrides;
pub mod substitute;
pub mod temp;

use crate::actions::{Action, ActionRegistry};
use crate::config::{self, LoadedWorkflow};
use crate::context::RuntimeContext;
use crate::errors::{OrchestratorError, Result};
use crate::model::{LoopSpec, PipelineStep, VariationType};
use crate::progress::ProgressTracker;
use dual::DualIteration;
use serde_json::Value;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use substitute::{substitute, Bindings};
use temp::MaterializedConfig;
use tracing::{info, warn};

pub struct PipelineEngine {
    ctx: Arc<RuntimeContext>,
    registry: ActionRegistry,
}

impl PipelineEngine {
    pub fn new(ctx: Arc<RuntimeContext>, registry: ActionRegistry) -> Self {
        Self { ctx, registry }
    }

    pub fn context(&self) -> &Arc<RuntimeContext> {
        &self.ctx
    }

    /// Run a loaded workflow under a fresh experiment row. The experiment
    /// ends `completed` on normal termination and `failed` on any error.
    pub async fn run(&self, workflow: &LoadedWorkflow) -> Result<()> {
        let workflow_path = workflow.path.display().to_string();
        let notes = workflow
            .description
            .loop_spec
            .as_ref()
            .map(|spec| {
                format!(
                    "variation={} iterations={}",
                    spec.variation_type,
                    spec.values.len()
                )
            })
            .unwrap_or_default();
        let experiment_id = self.ctx.tracker().start_experiment(
            workflow.action.canonical(),
            &format!("workflow {workflow_path}"),
            &workflow_path,
            &notes,
        );
        info!(experiment = %experiment_id, action = %workflow.action, "workflow started");

        match self.run_inner(workflow).await {
            Ok(()) => {
                self.ctx.tracker().complete_experiment(&experiment_id);
                info!(experiment = %experiment_id, "workflow completed");
                Ok(())
            }
            Err(e) => {
                self.ctx
                    .tracker()
                    .fail_experiment(&experiment_id, &e.to_string());
                Err(e)
            }
        }
    }

    async fn run_inner(&self, workflow: &LoadedWorkflow) -> Result<()> {
        if workflow.action != Action::Pipeline {
            // Single action: the referenced config document goes to the
            // handler unmodified.
            let path = workflow
                .description
                .action_config_file
                .as_deref()
                .ok_or_else(|| {
                    OrchestratorError::invalid_workflow(
                        "actionConfigFile is required for single-action workflows",
                    )
                })?;
            return self.registry.dispatch(workflow.action, path).await;
        }

        let total = workflow.description.pipeline.as_ref().map_or(0, Vec::len)
            + usize::from(workflow.description.loop_spec.is_some());
        let mut progress = ProgressTracker::new("pipeline", total);
        progress.start();
        if let Some(steps) = &workflow.description.pipeline {
            self.run_steps(steps, &workflow.raw, &mut progress).await?;
        }
        if let Some(spec) = &workflow.description.loop_spec {
            progress.increment_step(Some("parametric loop"));
            self.run_loop(spec, &workflow.raw, &progress).await?;
            progress.complete_current_step(None);
        }
        progress.complete();
        Ok(())
    }

    /// Linear pipeline: steps in declaration order, abort on first failure.
    async fn run_steps(
        &self,
        steps: &[PipelineStep],
        raw: &Value,
        progress: &mut ProgressTracker,
    ) -> Result<()> {
        for step in steps {
            progress.increment_step(Some(&step.label()));
            if let Some(spec) = &step.loop_spec {
                self.run_loop(spec, raw, progress).await?;
            } else {
                self.run_direct_step(step).await?;
            }
            progress.complete_current_step(None);
        }
        Ok(())
    }

    /// A pipeline step outside any loop. Without inline config or
    /// overrides, the step's config file goes to the handler unmodified;
    /// otherwise the config is materialised first.
    async fn run_direct_step(&self, step: &PipelineStep) -> Result<()> {
        let action = Action::parse(step.action.as_deref().unwrap_or_default())?;
        if action == Action::Pipeline {
            return Err(OrchestratorError::invalid_workflow(
                "`pipeline` cannot be used as a step action",
            ));
        }
        if step.inline.is_none() && step.parameter_overrides.is_none() {
            let path = step.action_config_file.as_deref().ok_or_else(|| {
                OrchestratorError::invalid_workflow(format!(
                    "step `{}` has neither actionConfigFile nor inline",
                    step.label()
                ))
            })?;
            return self.dispatch(action, step, None, path).await;
        }
        let mut cfg = self.load_base_config(step)?;
        overrides::apply_step_overrides(&mut cfg, step, action, None, None)?;
        self.dispatch_materialised(action, step, None, &cfg).await
    }

    /// Parametric loop: one iteration per resolved value, `steps` in order
    /// within each iteration.
    ///
    /// Returns an explicitly boxed future (rather than being an `async fn`)
    /// because this function and `run_loop_step` recurse into each other;
    /// an opaque `async fn` return type here would make the `Send`-ness of
    /// the pair mutually dependent in a way the compiler cannot resolve.
    fn run_loop<'a>(
        &'a self,
        spec: &'a LoopSpec,
        raw: &'a Value,
        parent: &'a ProgressTracker,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let values = config::resolve_loop_values(spec, raw)?;
            if spec.variation_type == VariationType::DualAttackCombinations {
                return self.run_dual_loop(spec, &values, raw, parent).await;
            }

            let mut progress = parent.create_sub_tracker(
                &format!("{} loop", spec.variation_type),
                values.len() * spec.steps.len(),
            );
            progress.start();
            for (index, value) in values.iter().enumerate() {
                let iteration = index + 1;
                let mut bindings = Bindings::new();
                bindings.insert("iteration".to_string(), iteration.to_string());
                if spec.variation_type == VariationType::SingleAttacks {
                    let name = value.as_str().ok_or_else(|| {
                        OrchestratorError::invalid_workflow(
                            "singleAttacks values must be attack-name strings",
                        )
                    })?;
                    bindings.insert("attackName".to_string(), name.to_string());
                }
                for step in &spec.steps {
                    progress.increment_step(Some(&step.label()));
                    self.run_loop_step(
                        spec, step, value, iteration, &bindings, raw, None, &progress,
                    )
                    .await?;
                    progress.complete_current_step(None);
                }
            }
            progress.complete();
            Ok(())
        })
    }

    /// Dual-factor expansion: attack pairs × dataset patterns, with a
    /// 1-based global iteration counter across the whole product.
    async fn run_dual_loop(
        &self,
        spec: &LoopSpec,
        values: &[Value],
        raw: &Value,
        parent: &ProgressTracker,
    ) -> Result<()> {
        let iterations = dual::expand(spec, values)?;
        let mut progress = parent.create_sub_tracker(
            "dualAttackCombinations loop",
            iterations.len() * spec.steps.len(),
        );
        progress.start();
        let placeholder_value = Value::Null;
        for (index, combo) in iterations.iter().enumerate() {
            let iteration = index + 1;
            let mut bindings = Bindings::new();
            bindings.insert("iteration".to_string(), iteration.to_string());
            bindings.insert("attack1".to_string(), combo.attack1.clone());
            bindings.insert("attack2".to_string(), combo.attack2.clone());
            bindings.insert("patternName".to_string(), combo.pattern_name.clone());
            for step in &spec.steps {
                progress.increment_step(Some(&step.label()));
                self.run_loop_step(
                    spec,
                    step,
                    &placeholder_value,
                    iteration,
                    &bindings,
                    raw,
                    Some(combo),
                    &progress,
                )
                .await?;
                progress.complete_current_step(None);
            }
        }
        progress.complete();
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_loop_step(
        &self,
        spec: &LoopSpec,
        step: &PipelineStep,
        value: &Value,
        iteration: usize,
        bindings: &Bindings,
        raw: &Value,
        combo: Option<&DualIteration>,
        progress: &ProgressTracker,
    ) -> Result<()> {
        if let Some(nested) = &step.loop_spec {
            // nested loops recurse; run_loop already returns a boxed future
            return self.run_loop(nested, raw, progress).await;
        }
        let action = Action::parse(step.action.as_deref().unwrap_or_default())?;
        if action == Action::Pipeline {
            return Err(OrchestratorError::invalid_workflow(
                "`pipeline` cannot be used as a step action",
            ));
        }

        let mut cfg = self.load_base_config(step)?;
        match combo {
            Some(combo) => {
                overrides::replace_placeholder(&mut cfg, "attackSegmentsConfig", &combo.segments);
            }
            None => {
                overrides::apply_variation(&mut cfg, spec.variation_type, value, &self.ctx)?;
            }
        }
        overrides::apply_step_overrides(&mut cfg, step, action, Some(iteration), Some(spec))?;
        let cfg = substitute(&cfg, bindings);
        self.dispatch_materialised(action, step, Some(iteration), &cfg)
            .await
    }

    fn load_base_config(&self, step: &PipelineStep) -> Result<Value> {
        if let Some(inline) = &step.inline {
            return Ok(inline.clone());
        }
        let path = step.action_config_file.as_deref().ok_or_else(|| {
            OrchestratorError::invalid_workflow(format!(
                "step `{}` has neither actionConfigFile nor inline",
                step.label()
            ))
        })?;
        config::load_document(path)
    }

    /// Write the materialised config, dispatch, and release the temp file.
    /// A failed step keeps its config on disk for inspection.
    async fn dispatch_materialised(
        &self,
        action: Action,
        step: &PipelineStep,
        iteration: Option<usize>,
        cfg: &Value,
    ) -> Result<()> {
        let mut materialised =
            MaterializedConfig::write(action, iteration, cfg, self.ctx.retain_temp_configs())?;
        match self.dispatch(action, step, iteration, materialised.path()).await {
            Ok(()) => Ok(()),
            Err(e) => {
                if let Some(kept) = materialised.retain() {
                    warn!(
                        config = %kept.display(),
                        "step failed; materialised config kept for inspection"
                    );
                }
                Err(e)
            }
        }
    }

    async fn dispatch(
        &self,
        action: Action,
        step: &PipelineStep,
        iteration: Option<usize>,
        config_path: &Path,
    ) -> Result<()> {
        let handler = self.registry.get(action)?;
        handler.execute(config_path).await.map_err(|e| {
            OrchestratorError::action_failed(
                action.canonical(),
                step.description.as_deref(),
                iteration,
                e,
            )
        })
    }
}
