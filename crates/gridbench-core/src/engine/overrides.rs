//! Structured overrides onto opaque base configs.
//!
//! Two layers, applied in order per step: the loop's variation override
//! (projection of the current variation value), then the step's own
//! `parameterOverrides` plus the path-derivation rules that let campaign
//! authors avoid wiring every step's output into the next step's input by
//! hand. All writes go through the dotted-path helpers, which create
//! missing intermediates and preserve JSON primitive types.

use crate::actions::Action;
use crate::config::{flatten_leaves, get_dotted, set_dotted};
use crate::context::RuntimeContext;
use crate::errors::{OrchestratorError, Result};
use crate::model::{LoopSpec, PipelineStep, VariationType};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Value};

lazy_static! {
    /// Iteration-numbered directory component directly under a
    /// `models_variations` segment, e.g. `models_variations/model_3`.
    static ref MODELS_VARIATION_DIR: Regex =
        Regex::new(r"(models_variations/[^/]*?)(\d+)").expect("static regex");
}

/// Canonical directory token pair of the variation convention: a
/// `models_variations` output has its training inputs in the parallel
/// `training_variations` tree.
const MODELS_DIR_TOKEN: &str = "models_variations";
const TRAINING_DIR_TOKEN: &str = "training_variations";

/// Project one variation value onto the base config. `singleAttacks` and
/// `dualAttackCombinations` contribute substitution bindings (and, for
/// dual, a segment expansion) instead of structural overrides and are
/// handled by the engine.
pub fn apply_variation(
    cfg: &mut Value,
    variation: VariationType,
    value: &Value,
    ctx: &RuntimeContext,
) -> Result<()> {
    match variation {
        VariationType::RandomSeed => {
            let seed = seed_from_value(value)?;
            set_dotted(cfg, "randomSeed", json!(seed));
            ctx.reseed(seed);
        }
        VariationType::AttackSegments => {
            let names = attack_names_from_value(value)?;
            apply_attack_segments(cfg, &names);
        }
        VariationType::Parameters => {
            let map = value.as_object().ok_or_else(|| {
                OrchestratorError::invalid_workflow(
                    "parameters variation values must be objects of dotted keys",
                )
            })?;
            for (path, leaf) in map {
                set_dotted(cfg, path, leaf.clone());
            }
        }
        VariationType::SingleAttacks | VariationType::DualAttackCombinations => {}
    }
    Ok(())
}

/// Integer or numeric string.
pub fn seed_from_value(value: &Value) -> Result<i64> {
    if let Some(n) = value.as_i64() {
        return Ok(n);
    }
    if let Some(s) = value.as_str() {
        if let Ok(n) = s.trim().parse::<i64>() {
            return Ok(n);
        }
    }
    Err(OrchestratorError::invalid_workflow(format!(
        "randomSeed variation value `{value}` is not an integer"
    )))
}

/// Sequence of attack names (a bare string counts as a one-element
/// sequence).
pub fn attack_names_from_value(value: &Value) -> Result<Vec<String>> {
    match value {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|v| {
                v.as_str().map(str::to_string).ok_or_else(|| {
                    OrchestratorError::invalid_workflow(format!(
                        "attackSegments variation value `{v}` is not a string"
                    ))
                })
            })
            .collect(),
        other => Err(OrchestratorError::invalid_workflow(format!(
            "attackSegments variation value `{other}` is not a sequence of names"
        ))),
    }
}

/// Disable every entry of the config's `attackSegments` array, then enable
/// those whose `name` contains one of the supplied names as a substring.
pub fn apply_attack_segments(cfg: &mut Value, enabled_names: &[String]) {
    let segments = match cfg.get_mut("attackSegments").and_then(Value::as_array_mut) {
        Some(segments) => segments,
        None => return,
    };
    for segment in segments {
        let matched = segment
            .get("name")
            .and_then(Value::as_str)
            .map(|name| enabled_names.iter().any(|wanted| name.contains(wanted.as_str())))
            .unwrap_or(false);
        set_dotted(segment, "enabled", json!(matched));
    }
}

/// Replace every string leaf that is exactly `${token}` with `replacement`.
/// Used by the dual-factor expansion to splice the synthesised segment
/// sequence into the base config.
pub fn replace_placeholder(cfg: &mut Value, token: &str, replacement: &Value) {
    let needle = format!("${{{token}}}");
    match cfg {
        Value::String(s) if *s == needle => *cfg = replacement.clone(),
        Value::Array(items) => {
            for item in items {
                replace_placeholder(item, token, replacement);
            }
        }
        Value::Object(map) => {
            for (_, v) in map.iter_mut() {
                replace_placeholder(v, token, replacement);
            }
        }
        _ => {}
    }
}

/// Merge a step's `parameterOverrides` and apply the cross-step derivation
/// rules. `iteration` is the 1-based loop counter; derivations only fire
/// inside loops.
pub fn apply_step_overrides(
    cfg: &mut Value,
    step: &PipelineStep,
    action: Action,
    iteration: Option<usize>,
    loop_spec: Option<&LoopSpec>,
) -> Result<()> {
    if let Some(overrides) = &step.parameter_overrides {
        if !overrides.is_object() {
            return Err(OrchestratorError::invalid_workflow(format!(
                "parameterOverrides of step `{}` must be an object",
                step.label()
            )));
        }
        for (path, leaf) in flatten_leaves(overrides) {
            set_dotted(cfg, &path, leaf);
        }
    }

    if let Some(iteration) = iteration {
        if action == Action::TrainModel {
            derive_training_input(cfg, iteration);
        }
        if matches!(action, Action::Evaluate | Action::ComprehensiveEvaluate) {
            if let Some(baseline) = loop_spec.and_then(|l| l.baseline_dataset.as_deref()) {
                set_dotted(cfg, "input.testDatasetPath", json!(baseline));
            }
            repoint_model_paths(cfg, iteration);
        }
    }
    Ok(())
}

/// `trainModel` convention: an output directory under `models_variations`
/// implies the training dataset lives in the parallel `training_variations`
/// tree, one `dataset_<iteration>.arff` per iteration.
fn derive_training_input(cfg: &mut Value, iteration: usize) {
    let dir = match get_dotted(cfg, "output.directory").and_then(Value::as_str) {
        Some(dir) if dir.contains(MODELS_DIR_TOKEN) => dir.to_string(),
        _ => return,
    };
    let training_dir = dir.replace(MODELS_DIR_TOKEN, TRAINING_DIR_TOKEN);
    let dataset = format!(
        "{}/dataset_{}.arff",
        training_dir.trim_end_matches('/'),
        iteration
    );
    set_dotted(cfg, "input.trainingDatasetPath", json!(dataset));
}

/// `evaluate` convention: model paths under `models_variations` are
/// re-pointed at the current iteration's numbered directory.
fn repoint_model_paths(cfg: &mut Value, iteration: usize) {
    let models = match cfg
        .get_mut("input")
        .and_then(|i| i.get_mut("models"))
        .and_then(Value::as_array_mut)
    {
        Some(models) => models,
        None => return,
    };
    for model in models {
        let path = match model.get("modelPath").and_then(Value::as_str) {
            Some(path) if path.contains(MODELS_DIR_TOKEN) => path.to_string(),
            _ => continue,
        };
        let repointed = MODELS_VARIATION_DIR
            .replace(&path, |caps: &regex::Captures<'_>| {
                format!("{}{}", &caps[1], iteration)
            })
            .into_owned();
        set_dotted(model, "modelPath", json!(repointed));
    }
}
