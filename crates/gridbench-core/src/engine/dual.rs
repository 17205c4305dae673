//! Dual-factor expansion: attack pairs × dataset patterns.
//!
//! Each `(a1, a2)` pair from the loop values is crossed with every dataset
//! pattern; each product is one iteration. Pattern segment codes are
//! translated into attack-segment descriptors that the engine splices over
//! the `${attackSegmentsConfig}` placeholder of each step's base config.

use crate::errors::{OrchestratorError, Result};
use crate::model::{DatasetPattern, LoopSpec, SegmentCode};
use serde_json::{json, Value};

/// One synthesised iteration of a dual-attack expansion.
#[derive(Debug, Clone)]
pub struct DualIteration {
    pub attack1: String,
    pub attack2: String,
    pub pattern_name: String,
    /// Segment-descriptor array for the placeholder splice.
    pub segments: Value,
}

pub fn expand(spec: &LoopSpec, values: &[Value]) -> Result<Vec<DualIteration>> {
    let patterns = spec
        .dataset_patterns
        .clone()
        .unwrap_or_else(DatasetPattern::defaults);
    let mut iterations = Vec::with_capacity(values.len() * patterns.len());
    for value in values {
        let (attack1, attack2) = attack_pair(value)?;
        for pattern in &patterns {
            iterations.push(DualIteration {
                attack1: attack1.clone(),
                attack2: attack2.clone(),
                pattern_name: pattern.pattern_name.clone(),
                segments: segments_for(&attack1, &attack2, pattern),
            });
        }
    }
    Ok(iterations)
}

fn attack_pair(value: &Value) -> Result<(String, String)> {
    let pair = value
        .as_array()
        .filter(|items| items.len() == 2)
        .and_then(|items| {
            Some((
                items[0].as_str()?.to_string(),
                items[1].as_str()?.to_string(),
            ))
        });
    pair.ok_or_else(|| {
        OrchestratorError::invalid_workflow(format!(
            "dualAttackCombinations values must be [attack1, attack2] pairs, got `{value}`"
        ))
    })
}

fn attack_config_path(name: &str) -> String {
    format!("config/attacks/{name}.json")
}

fn segments_for(attack1: &str, attack2: &str, pattern: &DatasetPattern) -> Value {
    let segments: Vec<Value> = pattern
        .segments
        .iter()
        .map(|code| match code {
            SegmentCode::First => json!({
                "name": attack1,
                "configs": [attack_config_path(attack1)],
                "enabled": true,
            }),
            SegmentCode::Second => json!({
                "name": attack2,
                "configs": [attack_config_path(attack2)],
                "enabled": true,
            }),
            SegmentCode::FirstThenSecond => json!({
                "name": format!("{attack1}+{attack2}"),
                "configs": [attack_config_path(attack1), attack_config_path(attack2)],
                "enabled": true,
            }),
            SegmentCode::SecondThenFirst => json!({
                "name": format!("{attack2}+{attack1}"),
                "configs": [attack_config_path(attack2), attack_config_path(attack1)],
                "enabled": true,
            }),
        })
        .collect();
    Value::Array(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(patterns: Option<Value>) -> LoopSpec {
        let mut doc = json!({
            "variationType": "dualAttackCombinations",
            "values": [["uc01", "uc02"], ["uc03", "uc05"]],
            "steps": [{"action": "createAttackDataset", "inline": {}}]
        });
        if let Some(p) = patterns {
            doc["datasetPatterns"] = p;
        }
        serde_json::from_value(doc).expect("spec")
    }

    #[test]
    fn pairs_cross_patterns_in_declaration_order() {
        let spec = spec(Some(json!([
            {"patternName": "simple", "segments": ["A1", "A2"]},
            {"patternName": "combined", "segments": ["A1+A2"]}
        ])));
        let iterations = expand(&spec, &spec.values).expect("expand");
        let shape: Vec<(String, String, String)> = iterations
            .iter()
            .map(|it| {
                (
                    it.attack1.clone(),
                    it.attack2.clone(),
                    it.pattern_name.clone(),
                )
            })
            .collect();
        assert_eq!(
            shape,
            vec![
                ("uc01".into(), "uc02".into(), "simple".into()),
                ("uc01".into(), "uc02".into(), "combined".into()),
                ("uc03".into(), "uc05".into(), "simple".into()),
                ("uc03".into(), "uc05".into(), "combined".into()),
            ]
        );
    }

    #[test]
    fn segment_codes_translate_to_descriptors() {
        let spec = spec(Some(json!([
            {"patternName": "mixed", "segments": ["A1", "A2+A1"]}
        ])));
        let iterations = expand(&spec, &spec.values).expect("expand");
        let segments = iterations[0].segments.as_array().expect("array");
        assert_eq!(segments[0]["name"], json!("uc01"));
        assert_eq!(
            segments[0]["configs"],
            json!(["config/attacks/uc01.json"])
        );
        assert_eq!(segments[1]["name"], json!("uc02+uc01"));
        assert_eq!(
            segments[1]["configs"],
            json!(["config/attacks/uc02.json", "config/attacks/uc01.json"])
        );
    }

    #[test]
    fn missing_patterns_default_to_simple_and_combined() {
        let spec = spec(None);
        let iterations = expand(&spec, &spec.values).expect("expand");
        assert_eq!(iterations.len(), 4);
        assert_eq!(iterations[0].pattern_name, "simple");
        assert_eq!(iterations[1].pattern_name, "combined");
    }

    #[test]
    fn non_pair_values_are_rejected() {
        let spec = spec(None);
        let err = expand(&spec, &[json!(["uc01"])]).unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidWorkflow(_)));
    }
}
