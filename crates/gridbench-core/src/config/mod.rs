//! Config document loading and structured-document helpers.
//!
//! Per-action configs are opaque hierarchical documents; the core only ever
//! manipulates them through the tagged-variant representation
//! (`serde_json::Value`) and the dotted-path helpers below. Workflow
//! descriptions are parsed into [`crate::model::WorkflowDescription`] and
//! validated here, once, before any action runs.

use crate::actions::Action;
use crate::errors::{OrchestratorError, Result};
use crate::model::{LoopSpec, PipelineStep, VariationType, WorkflowDescription};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Read and parse a hierarchical config document. JSON is the reference
/// format; `.yaml`/`.yml` files are parsed as YAML.
pub fn load_document(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| OrchestratorError::config_io(path, e))?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    if is_yaml {
        serde_yaml::from_str(&text).map_err(|e| OrchestratorError::config_io(path, e))
    } else {
        serde_json::from_str(&text).map_err(|e| OrchestratorError::config_io(path, e))
    }
}

/// Write a materialised config document as pretty JSON.
pub fn write_json(path: &Path, value: &Value) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| OrchestratorError::config_io(path, e))?;
    std::fs::write(path, text).map_err(|e| OrchestratorError::config_io(path, e))
}

/// Set a leaf along a dotted path, creating every missing intermediate as an
/// empty object. Total over the tagged-variant: non-object intermediates are
/// replaced by objects.
pub fn set_dotted(root: &mut Value, path: &str, value: Value) {
    let parts: Vec<&str> = path.split('.').collect();
    let (last, init) = match parts.split_last() {
        Some(split) => split,
        None => return,
    };
    let mut cursor = root;
    for part in init {
        if !cursor.is_object() {
            *cursor = Value::Object(serde_json::Map::new());
        }
        cursor = match cursor.as_object_mut() {
            Some(map) => map.entry((*part).to_string()).or_insert(Value::Null),
            None => return,
        };
    }
    if !cursor.is_object() {
        *cursor = Value::Object(serde_json::Map::new());
    }
    if let Some(map) = cursor.as_object_mut() {
        map.insert((*last).to_string(), value);
    }
}

/// Navigate a dotted path without mutating.
pub fn get_dotted<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut cursor = root;
    for part in path.split('.') {
        cursor = cursor.get(part)?;
    }
    Some(cursor)
}

/// Flatten an override document into `(dotted path, leaf)` pairs. Arrays and
/// primitives are leaves; nested objects contribute path segments. Keys that
/// already contain dots are treated as dotted paths.
pub fn flatten_leaves(overrides: &Value) -> Vec<(String, Value)> {
    fn walk(prefix: &str, value: &Value, out: &mut Vec<(String, Value)>) {
        match value {
            Value::Object(map) => {
                for (k, v) in map {
                    let path = if prefix.is_empty() {
                        k.clone()
                    } else {
                        format!("{prefix}.{k}")
                    };
                    walk(&path, v, out);
                }
            }
            leaf => out.push((prefix.to_string(), leaf.clone())),
        }
    }
    let mut out = Vec::new();
    walk("", overrides, &mut out);
    out
}

/// `"${fieldName}"` → `Some("fieldName")`, anything else → `None`.
pub fn field_reference(value: &Value) -> Option<&str> {
    let s = value.as_str()?;
    let inner = s.strip_prefix("${")?.strip_suffix('}')?;
    if inner.is_empty() || inner.contains(['{', '}', '$']) {
        return None;
    }
    Some(inner)
}

/// Resolve `loop.values` against the enclosing workflow document: a single
/// element of the form `"${fieldName}"` is replaced by the elements of the
/// named array field. Mixed forms were already rejected at validation.
pub fn resolve_loop_values(spec: &LoopSpec, workflow_doc: &Value) -> Result<Vec<Value>> {
    if spec.values.len() == 1 {
        if let Some(field) = field_reference(&spec.values[0]) {
            let resolved = workflow_doc.get(field).ok_or_else(|| {
                OrchestratorError::invalid_workflow(format!(
                    "loop values reference `${{{field}}}` but the workflow has no such field"
                ))
            })?;
            let items = resolved.as_array().ok_or_else(|| {
                OrchestratorError::invalid_workflow(format!(
                    "loop values reference `${{{field}}}` but that field is not an array"
                ))
            })?;
            if items.is_empty() {
                return Err(OrchestratorError::invalid_workflow(format!(
                    "loop values reference `${{{field}}}` but that array is empty"
                )));
            }
            return Ok(items.clone());
        }
    }
    Ok(spec.values.clone())
}

/// A workflow description parsed, validated, and ready for the engine.
#[derive(Debug)]
pub struct LoadedWorkflow {
    pub path: PathBuf,
    /// Raw document, kept for `${fieldName}` loop-value resolution.
    pub raw: Value,
    pub description: WorkflowDescription,
    pub action: Action,
    /// Pre-parsed action config for non-pipeline workflows.
    pub action_config: Option<Value>,
}

impl LoadedWorkflow {
    /// Load, parse and validate a workflow description document.
    pub fn load(path: &Path) -> Result<LoadedWorkflow> {
        let raw = load_document(path)?;
        let description: WorkflowDescription =
            serde_json::from_value(raw.clone()).map_err(|e| {
                OrchestratorError::invalid_workflow(format!(
                    "malformed workflow description: {e}"
                ))
            })?;

        let action_name = match description.action.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => return Err(OrchestratorError::MissingAction),
        };
        let action = Action::parse(action_name)?;

        validate_shape(&description, action)?;
        if let Some(steps) = &description.pipeline {
            validate_steps(steps)?;
        }
        if let Some(spec) = &description.loop_spec {
            validate_loop(spec)?;
        }

        // Non-pipeline workflows reference a self-contained action config;
        // parse it up front so config errors surface before any action runs.
        let action_config = if action == Action::Pipeline {
            None
        } else {
            let file = description.action_config_file.as_ref().ok_or_else(|| {
                OrchestratorError::invalid_workflow(
                    "actionConfigFile is required for single-action workflows",
                )
            })?;
            Some(load_document(file)?)
        };

        Ok(LoadedWorkflow {
            path: path.to_path_buf(),
            raw,
            description,
            action,
            action_config,
        })
    }
}

fn validate_shape(description: &WorkflowDescription, action: Action) -> Result<()> {
    let orchestrated =
        description.pipeline.is_some() || description.loop_spec.is_some();
    if action == Action::Pipeline && !orchestrated {
        return Err(OrchestratorError::invalid_workflow(
            "pipeline workflow carries neither pipeline steps nor a loop",
        ));
    }
    if action != Action::Pipeline && orchestrated {
        return Err(OrchestratorError::invalid_workflow(
            "pipeline steps and loops require action \"pipeline\"",
        ));
    }
    Ok(())
}

fn validate_steps(steps: &[PipelineStep]) -> Result<()> {
    for step in steps {
        match (&step.action, &step.loop_spec) {
            (None, None) => {
                return Err(OrchestratorError::invalid_workflow(
                    "pipeline step carries neither an action nor a loop",
                ))
            }
            (Some(_), Some(_)) => {
                return Err(OrchestratorError::invalid_workflow(format!(
                    "step `{}` carries both an action and a loop",
                    step.label()
                )))
            }
            (Some(name), None) => {
                Action::parse(name)?;
                if step.action_config_file.is_some() && step.inline.is_some() {
                    return Err(OrchestratorError::invalid_workflow(format!(
                        "step `{}` carries both actionConfigFile and inline",
                        step.label()
                    )));
                }
            }
            (None, Some(spec)) => validate_loop(spec)?,
        }
    }
    Ok(())
}

fn validate_loop(spec: &LoopSpec) -> Result<()> {
    if spec.values.is_empty() {
        return Err(OrchestratorError::invalid_workflow("loop has no values"));
    }
    if spec.steps.is_empty() {
        return Err(OrchestratorError::invalid_workflow("loop has no steps"));
    }
    // A field reference must be the sole value; mixing literals and
    // references is undefined in user-facing material and rejected here.
    if spec.values.len() > 1 && spec.values.iter().any(|v| field_reference(v).is_some()) {
        return Err(OrchestratorError::invalid_workflow(
            "loop values mix literals and ${field} references",
        ));
    }
    if spec.dataset_patterns.is_some()
        && spec.variation_type != VariationType::DualAttackCombinations
    {
        return Err(OrchestratorError::invalid_workflow(format!(
            "datasetPatterns are only valid for dualAttackCombinations, not {}",
            spec.variation_type
        )));
    }
    if let Some(patterns) = &spec.dataset_patterns {
        if patterns.is_empty() {
            return Err(OrchestratorError::invalid_workflow(
                "datasetPatterns must not be empty when present",
            ));
        }
        for p in patterns {
            if p.segments.is_empty() {
                return Err(OrchestratorError::invalid_workflow(format!(
                    "pattern `{}` has no segments",
                    p.pattern_name
                )));
            }
        }
    }
    validate_steps(&spec.steps)
}
