//! Typed views of the provenance tables.
//!
//! Field order mirrors the physical column order of each table file; the
//! `fields`/`from_fields` pairs are the only place that order is spelled
//! out for writes and typed reads.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentRow {
    pub experiment_id: String,
    pub timestamp: String,
    pub experiment_type: String,
    pub description: String,
    pub pipeline_config_path: String,
    pub status: String,
    pub notes: String,
}

impl ExperimentRow {
    pub fn fields(&self) -> Vec<String> {
        vec![
            self.experiment_id.clone(),
            self.timestamp.clone(),
            self.experiment_type.clone(),
            self.description.clone(),
            self.pipeline_config_path.clone(),
            self.status.clone(),
            self.notes.clone(),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetRow {
    pub dataset_id: String,
    pub timestamp: String,
    pub experiment_id: String,
    pub dataset_type: String,
    pub file_path: String,
    pub format: String,
    pub num_instances: i64,
    pub num_attributes: i64,
    pub config_path: String,
    pub attack_types: String,
    pub random_seed: String,
    pub dataset_structure: String,
    pub source_files: String,
    pub notes: String,
}

impl DatasetRow {
    pub fn fields(&self) -> Vec<String> {
        vec![
            self.dataset_id.clone(),
            self.timestamp.clone(),
            self.experiment_id.clone(),
            self.dataset_type.clone(),
            self.file_path.clone(),
            self.format.clone(),
            self.num_instances.to_string(),
            self.num_attributes.to_string(),
            self.config_path.clone(),
            self.attack_types.clone(),
            self.random_seed.clone(),
            self.dataset_structure.clone(),
            self.source_files.clone(),
            self.notes.clone(),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRow {
    pub model_id: String,
    pub timestamp: String,
    pub experiment_id: String,
    pub dataset_id: String,
    pub classifier_name: String,
    pub model_path: String,
    pub training_time_ms: u64,
    pub hyperparameters: String,
    pub config_path: String,
    pub notes: String,
}

impl ModelRow {
    pub fn fields(&self) -> Vec<String> {
        vec![
            self.model_id.clone(),
            self.timestamp.clone(),
            self.experiment_id.clone(),
            self.dataset_id.clone(),
            self.classifier_name.clone(),
            self.model_path.clone(),
            self.training_time_ms.to_string(),
            self.hyperparameters.clone(),
            self.config_path.clone(),
            self.notes.clone(),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRow {
    pub result_id: String,
    pub timestamp: String,
    pub experiment_id: String,
    pub model_id: String,
    pub test_dataset_id: String,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub true_positives: u64,
    pub true_negatives: u64,
    pub false_positives: u64,
    pub false_negatives: u64,
    pub evaluation_time_ms: u64,
    pub confusion_matrix: String,
    pub config_path: String,
    pub notes: String,
}

impl ResultRow {
    pub fn fields(&self) -> Vec<String> {
        vec![
            self.result_id.clone(),
            self.timestamp.clone(),
            self.experiment_id.clone(),
            self.model_id.clone(),
            self.test_dataset_id.clone(),
            self.accuracy.to_string(),
            self.precision.to_string(),
            self.recall.to_string(),
            self.f1_score.to_string(),
            self.true_positives.to_string(),
            self.true_negatives.to_string(),
            self.false_positives.to_string(),
            self.false_negatives.to_string(),
            self.evaluation_time_ms.to_string(),
            self.confusion_matrix.clone(),
            self.config_path.clone(),
            self.notes.clone(),
        ]
    }
}

/// One optimiser run's best outcome. Never updated in place; a better result
/// is a new row and queries return the minimum-F1 row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerRow {
    pub optimizer_id: String,
    pub timestamp: String,
    pub attack_key: String,
    /// Comma-joined attack keys; matched order-insensitively.
    pub attack_combination: String,
    pub optimizer_type: String,
    pub num_trials: u64,
    pub best_metric_f1: f64,
    pub best_parameters_json: String,
    pub config_base_path: String,
    pub notes: String,
}

impl OptimizerRow {
    pub fn fields(&self) -> Vec<String> {
        vec![
            self.optimizer_id.clone(),
            self.timestamp.clone(),
            self.attack_key.clone(),
            self.attack_combination.clone(),
            self.optimizer_type.clone(),
            self.num_trials.to_string(),
            self.best_metric_f1.to_string(),
            self.best_parameters_json.clone(),
            self.config_base_path.clone(),
            self.notes.clone(),
        ]
    }

    pub fn from_fields(fields: &[String]) -> Option<OptimizerRow> {
        if fields.len() < 10 {
            return None;
        }
        Some(OptimizerRow {
            optimizer_id: fields[0].clone(),
            timestamp: fields[1].clone(),
            attack_key: fields[2].clone(),
            attack_combination: fields[3].clone(),
            optimizer_type: fields[4].clone(),
            num_trials: fields[5].parse().ok()?,
            best_metric_f1: fields[6].parse().ok()?,
            best_parameters_json: fields[7].clone(),
            config_base_path: fields[8].clone(),
            notes: fields[9].clone(),
        })
    }
}
