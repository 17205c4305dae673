//! Provenance trail behaviour across the public tracker API: optimizer-best
//! resume, equality-filter queries, and escaping of awkward field values.

use gridbench_core::tracking::{
    DatasetInfo, OptimizerOutcome, ProvenanceTracker, TableKind,
};
use std::path::PathBuf;

fn tracker() -> (tempfile::TempDir, ProvenanceTracker) {
    let dir = tempfile::tempdir().expect("tempdir");
    let tracker = ProvenanceTracker::open(dir.path().join("tracking"));
    (dir, tracker)
}

#[test]
fn optimizer_best_resume_across_independent_runs() {
    let (_dir, tracker) = tracker();

    for f1 in [0.234, 0.198] {
        tracker.save_optimizer_result(&OptimizerOutcome {
            attack_key: "randomReplay".to_string(),
            optimizer_type: "tpe".to_string(),
            num_trials: 30,
            best_f1: f1,
            best_parameters_json: r#"{"depth": 8}"#.to_string(),
            ..Default::default()
        });
    }
    let best = tracker
        .get_best_result_for_attack("randomReplay")
        .expect("query")
        .expect("row");
    assert!((best.best_metric_f1 - 0.198).abs() < 1e-9);

    tracker.save_optimizer_result(&OptimizerOutcome {
        attack_key: "uc01".to_string(),
        attack_combination: vec!["uc01".to_string(), "uc02".to_string()],
        best_f1: 0.31,
        ..Default::default()
    });
    let combo = tracker
        .get_best_result_for_combination(&["uc02", "uc01"])
        .expect("query")
        .expect("row");
    assert!((combo.best_metric_f1 - 0.31).abs() < 1e-9);
}

#[test]
fn awkward_field_values_survive_the_table_files() {
    let (_dir, tracker) = tracker();
    let exp = tracker.start_experiment(
        "pipeline",
        "sweep with \"quotes\", commas,\nand a newline",
        "workflows/seed_sweep.json",
        "",
    );
    let rows = tracker
        .query(TableKind::Experiments, "experiment_id", &exp)
        .expect("query");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][3], "sweep with \"quotes\", commas,\nand a newline");
}

#[test]
fn queries_filter_on_any_column() {
    let (_dir, tracker) = tracker();
    let exp = tracker.start_experiment("pipeline", "", "wf.json", "");
    for (name, kind_notes) in [("a.arff", "first"), ("b.arff", "second")] {
        tracker.track_attack_dataset(
            &exp,
            &DatasetInfo {
                file_path: PathBuf::from(name),
                format: "arff".to_string(),
                notes: kind_notes.to_string(),
                ..Default::default()
            },
        );
    }
    let by_experiment = tracker
        .query(TableKind::Datasets, "experiment_id", &exp)
        .expect("query");
    assert_eq!(by_experiment.len(), 2);
    let by_path = tracker
        .query(TableKind::Datasets, "file_path", "b.arff")
        .expect("query");
    assert_eq!(by_path.len(), 1);
    assert_eq!(by_path[0][13], "second");
}
