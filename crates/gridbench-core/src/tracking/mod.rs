//! Provenance tracker: a small append-only relational trail over five flat
//! tables (experiments, datasets, models, results, optimizer_results).
//!
//! Write operations swallow IO failures at this boundary: they log a warning
//! and still hand the minted id back, so a tracking outage never masks a
//! successful action. The one in-place mutation is the experiment status
//! column, updated exactly once from `running` to `completed` or `failed`.

pub mod arff;
pub mod ids;
pub mod rows;
pub mod table;

pub use rows::{DatasetRow, ExperimentRow, ModelRow, OptimizerRow, ResultRow};
pub use table::{Table, TrackingError};

use ids::IdMinter;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const EXPERIMENT_COLUMNS: &[&str] = &[
    "experiment_id",
    "timestamp",
    "experiment_type",
    "description",
    "pipeline_config_path",
    "status",
    "notes",
];

pub const DATASET_COLUMNS: &[&str] = &[
    "dataset_id",
    "timestamp",
    "experiment_id",
    "dataset_type",
    "file_path",
    "format",
    "num_instances",
    "num_attributes",
    "config_path",
    "attack_types",
    "random_seed",
    "dataset_structure",
    "source_files",
    "notes",
];

pub const MODEL_COLUMNS: &[&str] = &[
    "model_id",
    "timestamp",
    "experiment_id",
    "dataset_id",
    "classifier_name",
    "model_path",
    "training_time_ms",
    "hyperparameters",
    "config_path",
    "notes",
];

pub const RESULT_COLUMNS: &[&str] = &[
    "result_id",
    "timestamp",
    "experiment_id",
    "model_id",
    "test_dataset_id",
    "accuracy",
    "precision",
    "recall",
    "f1_score",
    "true_positives",
    "true_negatives",
    "false_positives",
    "false_negatives",
    "evaluation_time_ms",
    "confusion_matrix",
    "config_path",
    "notes",
];

pub const OPTIMIZER_COLUMNS: &[&str] = &[
    "optimizer_id",
    "timestamp",
    "attack_key",
    "attack_combination",
    "optimizer_type",
    "num_trials",
    "best_metric_f1",
    "best_parameters_json",
    "config_base_path",
    "notes",
];

const STATUS_COLUMN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Experiments,
    Datasets,
    Models,
    Results,
    OptimizerResults,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    Benign,
    Attack,
    Test,
    Training,
}

impl DatasetKind {
    fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Benign => "benign",
            DatasetKind::Attack => "attack",
            DatasetKind::Test => "test",
            DatasetKind::Training => "training",
        }
    }
}

/// Descriptive attributes of a dataset artifact, supplied by the creating
/// action. Instance/attribute counts are read from `file_path` best-effort.
#[derive(Debug, Clone, Default)]
pub struct DatasetInfo {
    pub file_path: PathBuf,
    pub format: String,
    pub config_path: String,
    pub attack_types: String,
    pub random_seed: String,
    pub dataset_structure: String,
    pub source_files: String,
    pub notes: String,
}

/// Evaluation metrics of one classifier run against one test dataset.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvalMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub true_positives: u64,
    pub true_negatives: u64,
    pub false_positives: u64,
    pub false_negatives: u64,
    pub evaluation_time_ms: u64,
}

/// Input of [`ProvenanceTracker::save_optimizer_result`].
#[derive(Debug, Clone, Default)]
pub struct OptimizerOutcome {
    pub attack_key: String,
    pub attack_combination: Vec<String>,
    pub optimizer_type: String,
    pub num_trials: u64,
    pub best_f1: f64,
    pub best_parameters_json: String,
    pub config_base_path: String,
    pub notes: String,
}

#[derive(Debug)]
pub struct ProvenanceTracker {
    dir: PathBuf,
    minter: IdMinter,
    experiments: Table,
    datasets: Table,
    models: Table,
    results: Table,
    optimizer_results: Table,
}

fn timestamp_now() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

impl ProvenanceTracker {
    /// Open (or create) a tracking directory. Creation problems are logged
    /// and deferred: the first append will surface them as warnings too.
    pub fn open(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref().to_path_buf();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            warn!(dir = %dir.display(), error = %e, "could not create tracking directory");
        }
        Self {
            experiments: Table::new(dir.join("experiments.csv"), EXPERIMENT_COLUMNS),
            datasets: Table::new(dir.join("datasets.csv"), DATASET_COLUMNS),
            models: Table::new(dir.join("models.csv"), MODEL_COLUMNS),
            results: Table::new(dir.join("results.csv"), RESULT_COLUMNS),
            optimizer_results: Table::new(dir.join("optimizer_results.csv"), OPTIMIZER_COLUMNS),
            minter: IdMinter::new(),
            dir,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn table(&self, kind: TableKind) -> &Table {
        match kind {
            TableKind::Experiments => &self.experiments,
            TableKind::Datasets => &self.datasets,
            TableKind::Models => &self.models,
            TableKind::Results => &self.results,
            TableKind::OptimizerResults => &self.optimizer_results,
        }
    }

    fn append_logged(&self, table: &Table, fields: &[String]) {
        if let Err(e) = table.append(fields) {
            warn!(table = %table.path().display(), error = %e, "provenance write failed; continuing");
        }
    }

    /// Foreign keys are never forward references: a row referencing an id
    /// that does not exist yet is dropped (with a warning) rather than
    /// appended. Read failures cannot disprove existence and let the
    /// append through.
    fn reference_exists(&self, table: &Table, column: &str, id: &str) -> bool {
        match table.select(column, id) {
            Ok(rows) => !rows.is_empty(),
            Err(e) => {
                warn!(table = %table.path().display(), error = %e, "reference check failed");
                true
            }
        }
    }

    // ------------------------------------------------------------------
    // Experiments
    // ------------------------------------------------------------------

    pub fn start_experiment(
        &self,
        experiment_type: &str,
        description: &str,
        workflow_path: &str,
        notes: &str,
    ) -> String {
        let id = self.minter.mint("EXP");
        let row = ExperimentRow {
            experiment_id: id.clone(),
            timestamp: timestamp_now(),
            experiment_type: experiment_type.to_string(),
            description: description.to_string(),
            pipeline_config_path: workflow_path.to_string(),
            status: "running".to_string(),
            notes: notes.to_string(),
        };
        self.append_logged(&self.experiments, &row.fields());
        id
    }

    pub fn complete_experiment(&self, experiment_id: &str) {
        self.update_experiment_status(experiment_id, "completed");
    }

    pub fn fail_experiment(&self, experiment_id: &str, reason: &str) {
        warn!(experiment = experiment_id, reason, "experiment failed");
        self.update_experiment_status(experiment_id, "failed");
    }

    /// `running → {completed, failed}` exactly once; any other transition is
    /// refused. Holds an exclusive lock over the whole read-modify-write.
    fn update_experiment_status(&self, experiment_id: &str, status: &str) {
        let outcome = self.experiments.rewrite(|rows| {
            let mut changed = 0;
            for row in rows.iter_mut() {
                if row.first().map(String::as_str) == Some(experiment_id)
                    && row.get(STATUS_COLUMN).map(String::as_str) == Some("running")
                {
                    row[STATUS_COLUMN] = status.to_string();
                    changed += 1;
                }
            }
            changed
        });
        match outcome {
            Ok(0) => warn!(
                experiment = experiment_id,
                status, "no running experiment row to update"
            ),
            Ok(_) => {}
            Err(e) => warn!(
                experiment = experiment_id,
                error = %e,
                "experiment status update failed; continuing"
            ),
        }
    }

    // ------------------------------------------------------------------
    // Datasets
    // ------------------------------------------------------------------

    pub fn track_benign_dataset(&self, experiment_id: &str, info: &DatasetInfo) -> String {
        self.track_dataset(experiment_id, DatasetKind::Benign, info)
    }

    pub fn track_attack_dataset(&self, experiment_id: &str, info: &DatasetInfo) -> String {
        self.track_dataset(experiment_id, DatasetKind::Attack, info)
    }

    pub fn track_test_dataset(&self, experiment_id: &str, info: &DatasetInfo) -> String {
        self.track_dataset(experiment_id, DatasetKind::Test, info)
    }

    pub fn track_dataset(
        &self,
        experiment_id: &str,
        kind: DatasetKind,
        info: &DatasetInfo,
    ) -> String {
        let id = self.minter.mint("DS");
        if !self.reference_exists(&self.experiments, "experiment_id", experiment_id) {
            warn!(
                dataset = %id,
                experiment = experiment_id,
                "dataset references unknown experiment; row not recorded"
            );
            return id;
        }
        let (instances, attributes) = arff::dataset_stats(&info.file_path).unwrap_or((-1, -1));
        let row = DatasetRow {
            dataset_id: id.clone(),
            timestamp: timestamp_now(),
            experiment_id: experiment_id.to_string(),
            dataset_type: kind.as_str().to_string(),
            file_path: info.file_path.display().to_string(),
            format: info.format.clone(),
            num_instances: instances,
            num_attributes: attributes,
            config_path: info.config_path.clone(),
            attack_types: info.attack_types.clone(),
            random_seed: info.random_seed.clone(),
            dataset_structure: info.dataset_structure.clone(),
            source_files: info.source_files.clone(),
            notes: info.notes.clone(),
        };
        self.append_logged(&self.datasets, &row.fields());
        id
    }

    // ------------------------------------------------------------------
    // Models and results
    // ------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub fn track_model(
        &self,
        experiment_id: &str,
        training_dataset_id: &str,
        classifier_name: &str,
        model_path: &str,
        training_time_ms: u64,
        hyperparameters: &str,
        config_path: &str,
        notes: &str,
    ) -> String {
        let id = self.minter.mint("MDL");
        if !self.reference_exists(&self.experiments, "experiment_id", experiment_id)
            || (!training_dataset_id.is_empty()
                && !self.reference_exists(&self.datasets, "dataset_id", training_dataset_id))
        {
            warn!(model = %id, "model references unknown ids; row not recorded");
            return id;
        }
        let row = ModelRow {
            model_id: id.clone(),
            timestamp: timestamp_now(),
            experiment_id: experiment_id.to_string(),
            dataset_id: training_dataset_id.to_string(),
            classifier_name: classifier_name.to_string(),
            model_path: model_path.to_string(),
            training_time_ms,
            hyperparameters: hyperparameters.to_string(),
            config_path: config_path.to_string(),
            notes: notes.to_string(),
        };
        self.append_logged(&self.models, &row.fields());
        id
    }

    #[allow(clippy::too_many_arguments)]
    pub fn track_result(
        &self,
        experiment_id: &str,
        model_id: &str,
        test_dataset_id: &str,
        metrics: &EvalMetrics,
        confusion_matrix: &str,
        config_path: &str,
        notes: &str,
    ) -> String {
        let id = self.minter.mint("RES");
        if !self.reference_exists(&self.experiments, "experiment_id", experiment_id)
            || (!model_id.is_empty()
                && !self.reference_exists(&self.models, "model_id", model_id))
            || (!test_dataset_id.is_empty()
                && !self.reference_exists(&self.datasets, "dataset_id", test_dataset_id))
        {
            warn!(result = %id, "result references unknown ids; row not recorded");
            return id;
        }
        let row = ResultRow {
            result_id: id.clone(),
            timestamp: timestamp_now(),
            experiment_id: experiment_id.to_string(),
            model_id: model_id.to_string(),
            test_dataset_id: test_dataset_id.to_string(),
            accuracy: metrics.accuracy,
            precision: metrics.precision,
            recall: metrics.recall,
            f1_score: metrics.f1,
            true_positives: metrics.true_positives,
            true_negatives: metrics.true_negatives,
            false_positives: metrics.false_positives,
            false_negatives: metrics.false_negatives,
            evaluation_time_ms: metrics.evaluation_time_ms,
            confusion_matrix: confusion_matrix.to_string(),
            config_path: config_path.to_string(),
            notes: notes.to_string(),
        };
        self.append_logged(&self.results, &row.fields());
        id
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Linear scan with an equality filter; returns the matched rows in
    /// physical column order.
    pub fn query(
        &self,
        table: TableKind,
        column: &str,
        value: &str,
    ) -> Result<Vec<Vec<String>>, TrackingError> {
        self.table(table).select(column, value)
    }

    pub fn columns(&self, table: TableKind) -> &'static [&'static str] {
        self.table(table).columns()
    }

    // ------------------------------------------------------------------
    // Optimizer-best store
    // ------------------------------------------------------------------

    /// Append the outcome of one optimiser run. Never merges with existing
    /// rows; `get_best_*` picks the minimum-F1 row at query time.
    pub fn save_optimizer_result(&self, outcome: &OptimizerOutcome) -> String {
        let id = self.minter.mint("OPT");
        let row = OptimizerRow {
            optimizer_id: id.clone(),
            timestamp: timestamp_now(),
            attack_key: outcome.attack_key.clone(),
            attack_combination: outcome.attack_combination.join(","),
            optimizer_type: outcome.optimizer_type.clone(),
            num_trials: outcome.num_trials,
            best_metric_f1: outcome.best_f1,
            best_parameters_json: outcome.best_parameters_json.clone(),
            config_base_path: outcome.config_base_path.clone(),
            notes: outcome.notes.clone(),
        };
        self.append_logged(&self.optimizer_results, &row.fields());
        id
    }

    /// Best (minimum-F1) row for a single attack key.
    pub fn get_best_result_for_attack(
        &self,
        attack_key: &str,
    ) -> Result<Option<OptimizerRow>, TrackingError> {
        Ok(self
            .optimizer_rows()?
            .into_iter()
            .filter(|row| row.attack_key == attack_key)
            .min_by(|a, b| a.best_metric_f1.total_cmp(&b.best_metric_f1)))
    }

    /// Best (minimum-F1) row for an attack combination. Matching is
    /// order-insensitive: set equality on the comma-split combination.
    pub fn get_best_result_for_combination(
        &self,
        attack_keys: &[&str],
    ) -> Result<Option<OptimizerRow>, TrackingError> {
        let wanted: BTreeSet<&str> = attack_keys.iter().map(|k| k.trim()).collect();
        Ok(self
            .optimizer_rows()?
            .into_iter()
            .filter(|row| {
                let combo: BTreeSet<&str> = row
                    .attack_combination
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .collect();
                combo == wanted
            })
            .min_by(|a, b| a.best_metric_f1.total_cmp(&b.best_metric_f1)))
    }

    fn optimizer_rows(&self) -> Result<Vec<OptimizerRow>, TrackingError> {
        let rows = self.optimizer_results.read_rows()?;
        Ok(rows
            .iter()
            .filter_map(|fields| {
                let parsed = OptimizerRow::from_fields(fields);
                if parsed.is_none() {
                    warn!(
                        table = %self.optimizer_results.path().display(),
                        "skipping unparseable optimizer row"
                    );
                }
                parsed
            })
            .collect())
    }
}
