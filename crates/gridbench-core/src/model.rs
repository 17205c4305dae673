//! Workflow description model.
//!
//! This is the declarative input of the orchestrator: one action, a linear
//! pipeline, or a parametric loop (optionally nested inside pipeline steps).
//! The reference serialisation is JSON; YAML documents are accepted by file
//! extension. Per-action configs stay opaque (`serde_json::Value`); only
//! the override keys the engine writes are meaningful to the core.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;

/// Top-level workflow description. Extra fields are allowed (and kept in the
/// raw document) because `loop.values` may reference them by name.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDescription {
    pub action: Option<String>,
    pub action_config_file: Option<PathBuf>,
    #[serde(default)]
    pub common_config: CommonConfig,
    pub pipeline: Option<Vec<PipelineStep>>,
    #[serde(rename = "loop")]
    pub loop_spec: Option<LoopSpec>,
}

/// Settings shared by every step of a workflow.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonConfig {
    /// Seed for the process-wide random source. When present, downstream
    /// components that consult [`crate::context::RuntimeContext::next_u64`]
    /// become deterministic.
    pub random_seed: Option<i64>,
    /// Default artifact format token (`arff` when absent).
    pub output_format: Option<String>,
}

/// One step of a pipeline or of a loop body. Carries either an action to
/// dispatch (with a file or inline base config) or a nested loop.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStep {
    pub action: Option<String>,
    pub action_config_file: Option<PathBuf>,
    /// Structured document used directly in place of a file.
    pub inline: Option<Value>,
    /// Free-form, used only for progress reporting and error context.
    pub description: Option<String>,
    #[serde(rename = "loop")]
    pub loop_spec: Option<Box<LoopSpec>>,
    /// Structured overrides merged into the base config (see engine docs).
    pub parameter_overrides: Option<Value>,
}

impl PipelineStep {
    /// Human-readable step identity for progress lines and errors.
    pub fn label(&self) -> String {
        match (&self.description, &self.action) {
            (Some(d), _) => d.clone(),
            (None, Some(a)) => a.clone(),
            (None, None) => "nested loop".to_string(),
        }
    }
}

/// Parametric expansion: one iteration per variation value, each executing
/// `steps` in order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopSpec {
    pub variation_type: VariationType,
    /// Ordered variation values. A single element of the form
    /// `"${fieldName}"` resolves to an array field of the enclosing
    /// workflow document.
    pub values: Vec<Value>,
    pub steps: Vec<PipelineStep>,
    /// Test dataset consumed by evaluation steps of this loop.
    pub baseline_dataset: Option<String>,
    /// Only meaningful for `dualAttackCombinations`.
    pub dataset_patterns: Option<Vec<DatasetPattern>>,
}

/// Rule by which a loop value is projected onto a step's base config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum VariationType {
    RandomSeed,
    AttackSegments,
    Parameters,
    SingleAttacks,
    DualAttackCombinations,
}

impl fmt::Display for VariationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VariationType::RandomSeed => "randomSeed",
            VariationType::AttackSegments => "attackSegments",
            VariationType::Parameters => "parameters",
            VariationType::SingleAttacks => "singleAttacks",
            VariationType::DualAttackCombinations => "dualAttackCombinations",
        };
        write!(f, "{s}")
    }
}

/// Orthogonal dataset-shape factor of a dual-attack expansion.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetPattern {
    pub pattern_name: String,
    pub segments: Vec<SegmentCode>,
}

/// Segment codes of a dataset pattern, translated into attack-segment
/// descriptors during dual-factor expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum SegmentCode {
    #[serde(rename = "A1")]
    First,
    #[serde(rename = "A2")]
    Second,
    #[serde(rename = "A1+A2")]
    FirstThenSecond,
    #[serde(rename = "A2+A1")]
    SecondThenFirst,
}

impl DatasetPattern {
    /// Built-in patterns used when a dual loop does not declare any:
    /// `simple` (each attack as its own segment) and `combined` (one
    /// interleaved segment).
    pub fn defaults() -> Vec<DatasetPattern> {
        vec![
            DatasetPattern {
                pattern_name: "simple".to_string(),
                segments: vec![SegmentCode::First, SegmentCode::Second],
            },
            DatasetPattern {
                pattern_name: "combined".to_string(),
                segments: vec![SegmentCode::FirstThenSecond],
            },
        ]
    }
}
