//! Process exit codes. Coarse (0/1/2/3) and stable for CI scripting.

use gridbench_core::OrchestratorError;

/// Workflow completed without error.
pub const EXIT_SUCCESS: i32 = 0;

/// Missing or unknown action, or malformed command line.
pub const EXIT_USAGE: i32 = 1;

/// Config error: file not found, malformed document, missing required field.
pub const EXIT_CONFIG_ERROR: i32 = 2;

/// Action execution error (a handler raised).
pub const EXIT_ACTION_ERROR: i32 = 3;

pub fn for_error(err: &OrchestratorError) -> i32 {
    match err {
        OrchestratorError::MissingAction | OrchestratorError::UnknownAction(_) => EXIT_USAGE,
        OrchestratorError::InvalidWorkflow(_) | OrchestratorError::ConfigIo { .. } => {
            EXIT_CONFIG_ERROR
        }
        OrchestratorError::ActionFailed { .. } => EXIT_ACTION_ERROR,
    }
}

/// Machine-readable kind for the final log line.
pub fn kind(err: &OrchestratorError) -> &'static str {
    match err {
        OrchestratorError::MissingAction => "missing-action",
        OrchestratorError::UnknownAction(_) => "unknown-action",
        OrchestratorError::InvalidWorkflow(_) => "invalid-workflow",
        OrchestratorError::ConfigIo { .. } => "config-io",
        OrchestratorError::ActionFailed { .. } => "action-failed",
    }
}
