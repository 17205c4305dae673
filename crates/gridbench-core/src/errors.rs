//! Typed error surface of the orchestrator core.
//!
//! Exit codes are **coarse** (0/1/2/3) for CI compatibility; the CLI maps
//! every variant onto one of them. Provenance IO problems are deliberately
//! *not* part of this enum: they are swallowed at the tracker boundary
//! (see `tracking`) and must never abort a workflow.

use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Workflow description does not name an action at all.
    #[error("workflow does not name an action")]
    MissingAction,

    /// Action token did not resolve to a registered handler.
    #[error("unknown action `{0}`")]
    UnknownAction(String),

    /// Workflow description is structurally unusable: missing required
    /// field, unknown variation type, empty values/steps, unresolved or
    /// mixed field reference.
    #[error("invalid workflow: {0}")]
    InvalidWorkflow(String),

    /// IO or parse failure on a config document, with the offending path.
    #[error("config error ({}): {source}", .path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// A handler raised; the engine adds the step identity before
    /// propagating.
    #[error("{context}: {source}")]
    ActionFailed {
        context: String,
        #[source]
        source: anyhow::Error,
    },
}

impl OrchestratorError {
    pub fn config_io(path: impl AsRef<Path>, source: impl Into<anyhow::Error>) -> Self {
        Self::ConfigIo {
            path: path.as_ref().to_path_buf(),
            source: source.into(),
        }
    }

    pub fn invalid_workflow(reason: impl Into<String>) -> Self {
        Self::InvalidWorkflow(reason.into())
    }

    /// Wrap a handler failure with the step identity the engine knows about.
    pub fn action_failed(
        action: &str,
        description: Option<&str>,
        iteration: Option<usize>,
        source: anyhow::Error,
    ) -> Self {
        let mut context = format!("action `{action}`");
        if let Some(desc) = description {
            context.push_str(&format!(" ({desc})"));
        }
        if let Some(i) = iteration {
            context.push_str(&format!(" [iteration {i}]"));
        }
        context.push_str(" failed");
        Self::ActionFailed { context, source }
    }
}
