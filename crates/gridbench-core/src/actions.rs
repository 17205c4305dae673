//! Action names, the handler capability, and the dispatch registry.
//!
//! Dispatch is a registration: the engine looks a normalised action name up
//! in the registry and invokes whatever capability was registered for it.
//! Adding an action is a `register` call, not a code edit here.

use crate::errors::{OrchestratorError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// One unit of work, identified by its normalised name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    CreateBenign,
    CreateAttackDataset,
    TrainModel,
    Evaluate,
    ComprehensiveEvaluate,
    Compare,
    /// Handled by the engine itself, never by an external handler.
    Pipeline,
}

impl Action {
    /// Resolve an action token. Normalisation is case-insensitive and strips
    /// underscores, so `train_model`, `trainModel` and `TrainModel` are the
    /// same action. `createTraining` is a legacy alias for
    /// `createAttackDataset`.
    pub fn parse(name: &str) -> Result<Action> {
        let normalised: String = name
            .chars()
            .filter(|c| *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalised.as_str() {
            "createbenign" => Ok(Action::CreateBenign),
            "createattackdataset" | "createtraining" => Ok(Action::CreateAttackDataset),
            "trainmodel" => Ok(Action::TrainModel),
            "evaluate" => Ok(Action::Evaluate),
            "comprehensiveevaluate" => Ok(Action::ComprehensiveEvaluate),
            "compare" => Ok(Action::Compare),
            "pipeline" => Ok(Action::Pipeline),
            _ => Err(OrchestratorError::UnknownAction(name.to_string())),
        }
    }

    /// Canonical spelling, as used in workflow documents and logs.
    pub fn canonical(&self) -> &'static str {
        match self {
            Action::CreateBenign => "createBenign",
            Action::CreateAttackDataset => "createAttackDataset",
            Action::TrainModel => "trainModel",
            Action::Evaluate => "evaluate",
            Action::ComprehensiveEvaluate => "comprehensiveEvaluate",
            Action::Compare => "compare",
            Action::Pipeline => "pipeline",
        }
    }

    /// All actions that external handlers may be registered for.
    pub fn external() -> [Action; 6] {
        [
            Action::CreateBenign,
            Action::CreateAttackDataset,
            Action::TrainModel,
            Action::Evaluate,
            Action::ComprehensiveEvaluate,
            Action::Compare,
        ]
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

/// Uniform handler contract: consume a self-contained config document at
/// `config_path`, do the work, return normally or fail. Side effects are
/// limited to artifact files and tracker calls.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn execute(&self, config_path: &Path) -> anyhow::Result<()>;
}

/// Normalised action name → handler capability.
#[derive(Default, Clone)]
pub struct ActionRegistry {
    handlers: HashMap<Action, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, action: Action, handler: Arc<dyn ActionHandler>) {
        self.handlers.insert(action, handler);
    }

    /// Look a handler up; a known token with no registered capability is an
    /// unknown action from the caller's point of view.
    pub fn get(&self, action: Action) -> Result<&Arc<dyn ActionHandler>> {
        self.handlers
            .get(&action)
            .ok_or_else(|| OrchestratorError::UnknownAction(action.canonical().to_string()))
    }

    /// Invoke the handler for `action` with a materialised config path.
    pub async fn dispatch(&self, action: Action, config_path: &Path) -> Result<()> {
        let handler = self.get(action)?;
        handler
            .execute(config_path)
            .await
            .map_err(|e| OrchestratorError::action_failed(action.canonical(), None, None, e))
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.handlers.keys().map(|a| a.canonical()).collect();
        names.sort_unstable();
        f.debug_struct("ActionRegistry")
            .field("handlers", &names)
            .finish()
    }
}
