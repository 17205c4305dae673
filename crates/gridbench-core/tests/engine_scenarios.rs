//! End-to-end engine scenarios with recording handlers: workflow documents
//! go in, the exact sequence of handler invocations and materialised
//! configs comes out, and the provenance trail reflects the outcome.

use async_trait::async_trait;
use gridbench_core::actions::{Action, ActionHandler, ActionRegistry};
use gridbench_core::config::LoadedWorkflow;
use gridbench_core::context::RuntimeContext;
use gridbench_core::engine::PipelineEngine;
use gridbench_core::errors::OrchestratorError;
use gridbench_core::tracking::{ProvenanceTracker, TableKind};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

type Calls = Arc<Mutex<Vec<(String, Value)>>>;

struct RecordingHandler {
    action: &'static str,
    calls: Calls,
    fail: bool,
}

#[async_trait]
impl ActionHandler for RecordingHandler {
    async fn execute(&self, config_path: &Path) -> anyhow::Result<()> {
        let text = std::fs::read_to_string(config_path)?;
        let cfg: Value = serde_json::from_str(&text)?;
        self.calls
            .lock()
            .expect("calls lock")
            .push((self.action.to_string(), cfg));
        if self.fail {
            anyhow::bail!("scripted handler failure");
        }
        Ok(())
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    root: PathBuf,
    calls: Calls,
    tracker: Arc<ProvenanceTracker>,
}

impl Harness {
    /// Registry with recorders for every external action; `failing` makes
    /// that one action fail after recording its call.
    fn new(failing: Option<Action>) -> (Harness, PipelineEngine) {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().to_path_buf();
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        let tracker = Arc::new(ProvenanceTracker::open(root.join("tracking")));
        let mut registry = ActionRegistry::new();
        for action in Action::external() {
            registry.register(
                action,
                Arc::new(RecordingHandler {
                    action: action.canonical(),
                    calls: calls.clone(),
                    fail: failing == Some(action),
                }),
            );
        }
        let ctx = Arc::new(RuntimeContext::new(tracker.clone()));
        let engine = PipelineEngine::new(ctx, registry);
        (
            Harness {
                _dir: dir,
                root,
                calls,
                tracker,
            },
            engine,
        )
    }

    fn write_json(&self, name: &str, doc: &Value) -> PathBuf {
        let path = self.root.join(name);
        std::fs::write(&path, serde_json::to_string_pretty(doc).expect("json"))
            .expect("write");
        path
    }

    fn load(&self, name: &str, doc: &Value) -> LoadedWorkflow {
        let path = self.write_json(name, doc);
        LoadedWorkflow::load(&path).expect("load workflow")
    }

    fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn experiment_statuses(&self) -> Vec<String> {
        self.tracker
            .query(TableKind::Experiments, "experiment_type", "pipeline")
            .into_iter()
            .flatten()
            .map(|row| row[5].clone())
            .collect()
    }
}

#[tokio::test]
async fn single_action_workflow_hands_config_file_to_handler() {
    let (harness, engine) = Harness::new(None);
    let cfg_path = harness.write_json("cfgA.json", &json!({"traffic": {"durationS": 60}}));
    let workflow = harness.load(
        "wf.json",
        &json!({"action": "createBenign", "actionConfigFile": cfg_path}),
    );

    engine.run(&workflow).await.expect("run");

    let calls = harness.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "createBenign");
    assert_eq!(calls[0].1["traffic"]["durationS"], json!(60));

    let experiments = harness
        .tracker
        .query(TableKind::Experiments, "experiment_type", "createBenign")
        .expect("query");
    assert_eq!(experiments.len(), 1);
    assert_eq!(experiments[0][5], "completed");
    // the engine itself produces no other provenance rows
    assert!(harness
        .tracker
        .query(TableKind::Datasets, "experiment_id", &experiments[0][0])
        .expect("query")
        .is_empty());
}

#[tokio::test]
async fn linear_pipeline_runs_steps_in_declaration_order() {
    let (harness, engine) = Harness::new(None);
    let benign = harness.write_json("benign.json", &json!({"kind": "benign"}));
    let attack = harness.write_json("attack.json", &json!({"kind": "attack"}));
    let train = harness.write_json("train.json", &json!({"kind": "train"}));
    let workflow = harness.load(
        "wf.json",
        &json!({
            "action": "pipeline",
            "pipeline": [
                {"action": "createBenign", "actionConfigFile": benign},
                {"action": "createAttackDataset", "actionConfigFile": attack},
                {"action": "trainModel", "actionConfigFile": train}
            ]
        }),
    );

    engine.run(&workflow).await.expect("run");

    let order: Vec<String> = harness.calls().iter().map(|(a, _)| a.clone()).collect();
    assert_eq!(order, vec!["createBenign", "createAttackDataset", "trainModel"]);
    assert_eq!(harness.experiment_statuses(), vec!["completed"]);
}

#[tokio::test]
async fn random_seed_loop_threads_seed_and_iteration() {
    let (harness, engine) = Harness::new(None);
    let workflow = harness.load(
        "wf.json",
        &json!({
            "action": "pipeline",
            "loop": {
                "variationType": "randomSeed",
                "values": [42, 100, 200],
                "steps": [
                    {
                        "action": "createAttackDataset",
                        "inline": {"output": {"filename": "dataset_seed_${iteration}.arff"}}
                    },
                    {"action": "trainModel", "inline": {}}
                ]
            }
        }),
    );

    engine.run(&workflow).await.expect("run");

    let calls = harness.calls();
    // loop cardinality: 3 values x 2 steps
    assert_eq!(calls.len(), 6);
    for (i, seed) in [42, 100, 200].iter().enumerate() {
        let (dataset_action, dataset_cfg) = &calls[i * 2];
        assert_eq!(dataset_action, "createAttackDataset");
        assert_eq!(dataset_cfg["randomSeed"], json!(*seed));
        assert_eq!(
            dataset_cfg["output"]["filename"],
            json!(format!("dataset_seed_{}.arff", i + 1))
        );
        let (train_action, train_cfg) = &calls[i * 2 + 1];
        assert_eq!(train_action, "trainModel");
        assert_eq!(train_cfg["randomSeed"], json!(*seed));
    }
}

#[tokio::test]
async fn attack_segments_loop_enables_by_substring_match() {
    let (harness, engine) = Harness::new(None);
    let base = json!({
        "attackSegments": [
            {"name": "uc01_random_replay", "enabled": false},
            {"name": "uc03_masquerade_fault", "enabled": false}
        ]
    });
    let workflow = harness.load(
        "wf.json",
        &json!({
            "action": "pipeline",
            "loop": {
                "variationType": "attackSegments",
                "values": [
                    ["uc01_random_replay"],
                    ["uc03_masquerade_fault"],
                    ["uc01_random_replay", "uc03_masquerade_fault"]
                ],
                "steps": [{"action": "createAttackDataset", "inline": base}]
            }
        }),
    );

    engine.run(&workflow).await.expect("run");

    let calls = harness.calls();
    assert_eq!(calls.len(), 3);
    let enabled_flags = |cfg: &Value| -> Vec<bool> {
        cfg["attackSegments"]
            .as_array()
            .expect("segments")
            .iter()
            .map(|s| s["enabled"].as_bool().expect("flag"))
            .collect()
    };
    assert_eq!(enabled_flags(&calls[0].1), vec![true, false]);
    assert_eq!(enabled_flags(&calls[1].1), vec![false, true]);
    assert_eq!(enabled_flags(&calls[2].1), vec![true, true]);
}

#[tokio::test]
async fn dual_factor_expansion_crosses_pairs_and_patterns() {
    let (harness, engine) = Harness::new(None);
    let base = json!({
        "a1": "${attack1}",
        "a2": "${attack2}",
        "pattern": "${patternName}",
        "iter": "${iteration}",
        "attackSegments": "${attackSegmentsConfig}"
    });
    let workflow = harness.load(
        "wf.json",
        &json!({
            "action": "pipeline",
            "loop": {
                "variationType": "dualAttackCombinations",
                "values": [["uc01", "uc02"], ["uc03", "uc05"]],
                "datasetPatterns": [
                    {"patternName": "simple", "segments": ["A1", "A2"]},
                    {"patternName": "combined", "segments": ["A1+A2"]}
                ],
                "steps": [{"action": "createAttackDataset", "inline": base}]
            }
        }),
    );

    engine.run(&workflow).await.expect("run");

    let calls = harness.calls();
    assert_eq!(calls.len(), 4);
    let bindings: Vec<(String, String, String, String)> = calls
        .iter()
        .map(|(_, cfg)| {
            (
                cfg["a1"].as_str().expect("a1").to_string(),
                cfg["a2"].as_str().expect("a2").to_string(),
                cfg["pattern"].as_str().expect("pattern").to_string(),
                cfg["iter"].as_str().expect("iter").to_string(),
            )
        })
        .collect();
    assert_eq!(
        bindings,
        vec![
            ("uc01".into(), "uc02".into(), "simple".into(), "1".into()),
            ("uc01".into(), "uc02".into(), "combined".into(), "2".into()),
            ("uc03".into(), "uc05".into(), "simple".into(), "3".into()),
            ("uc03".into(), "uc05".into(), "combined".into(), "4".into()),
        ]
    );

    // placeholder replaced by the synthesised segment sequence
    let simple_segments = calls[0].1["attackSegments"].as_array().expect("segments");
    assert_eq!(simple_segments.len(), 2);
    assert_eq!(simple_segments[0]["name"], json!("uc01"));
    let combined_segments = calls[1].1["attackSegments"].as_array().expect("segments");
    assert_eq!(combined_segments[0]["name"], json!("uc01+uc02"));
    assert_eq!(
        combined_segments[0]["configs"],
        json!(["config/attacks/uc01.json", "config/attacks/uc02.json"])
    );
}

#[tokio::test]
async fn loop_values_resolve_workflow_field_references() {
    let (harness, engine) = Harness::new(None);
    let workflow = harness.load(
        "wf.json",
        &json!({
            "action": "pipeline",
            "attackNames": ["uc01", "uc02"],
            "loop": {
                "variationType": "singleAttacks",
                "values": ["${attackNames}"],
                "steps": [{"action": "createAttackDataset", "inline": {"attack": "${attackName}"}}]
            }
        }),
    );

    engine.run(&workflow).await.expect("run");

    let calls = harness.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].1["attack"], json!("uc01"));
    assert_eq!(calls[1].1["attack"], json!("uc02"));
}

#[tokio::test]
async fn nested_loop_inside_pipeline_step_runs_per_iteration() {
    let (harness, engine) = Harness::new(None);
    let benign = harness.write_json("benign.json", &json!({}));
    let workflow = harness.load(
        "wf.json",
        &json!({
            "action": "pipeline",
            "pipeline": [
                {"action": "createBenign", "actionConfigFile": benign},
                {
                    "description": "seed sweep",
                    "loop": {
                        "variationType": "randomSeed",
                        "values": [1, 2],
                        "steps": [{"action": "trainModel", "inline": {}}]
                    }
                }
            ]
        }),
    );

    engine.run(&workflow).await.expect("run");

    let order: Vec<String> = harness.calls().iter().map(|(a, _)| a.clone()).collect();
    assert_eq!(order, vec!["createBenign", "trainModel", "trainModel"]);
}

#[tokio::test]
async fn step_failure_skips_the_rest_and_fails_the_experiment() {
    let (harness, engine) = Harness::new(Some(Action::CreateAttackDataset));
    let benign = harness.write_json("benign.json", &json!({}));
    let attack = harness.write_json("attack.json", &json!({}));
    let train = harness.write_json("train.json", &json!({}));
    let workflow = harness.load(
        "wf.json",
        &json!({
            "action": "pipeline",
            "pipeline": [
                {"action": "createBenign", "actionConfigFile": benign},
                {
                    "action": "createAttackDataset",
                    "actionConfigFile": attack,
                    "description": "inject masquerade faults"
                },
                {"action": "trainModel", "actionConfigFile": train}
            ]
        }),
    );

    let err = engine.run(&workflow).await.unwrap_err();
    match err {
        OrchestratorError::ActionFailed { context, .. } => {
            assert!(context.contains("createAttackDataset"));
            assert!(context.contains("inject masquerade faults"));
        }
        other => panic!("expected ActionFailed, got {other:?}"),
    }

    let order: Vec<String> = harness.calls().iter().map(|(a, _)| a.clone()).collect();
    assert_eq!(order, vec!["createBenign", "createAttackDataset"]);
    assert_eq!(harness.experiment_statuses(), vec!["failed"]);
}

#[tokio::test]
async fn evaluate_loop_steps_consume_the_baseline_dataset() {
    let (harness, engine) = Harness::new(None);
    let workflow = harness.load(
        "wf.json",
        &json!({
            "action": "pipeline",
            "loop": {
                "variationType": "randomSeed",
                "values": [7],
                "baselineDataset": "datasets/baseline_test.arff",
                "steps": [{
                    "action": "evaluate",
                    "inline": {
                        "input": {
                            "models": [{"modelPath": "out/models_variations/model_9/rf.model"}]
                        }
                    }
                }]
            }
        }),
    );

    engine.run(&workflow).await.expect("run");

    let calls = harness.calls();
    assert_eq!(calls.len(), 1);
    let cfg = &calls[0].1;
    assert_eq!(
        cfg["input"]["testDatasetPath"],
        json!("datasets/baseline_test.arff")
    );
    assert_eq!(
        cfg["input"]["models"][0]["modelPath"],
        json!("out/models_variations/model_1/rf.model")
    );
}
