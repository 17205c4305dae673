//! Scoped handles for materialised step configs.
//!
//! A materialised config is born at the start of a step and dies at its
//! end: the handle deletes the file on drop on every exit path, unless the
//! config was retained (debug toggle, or explicitly after a step failure).

use crate::actions::Action;
use crate::config;
use crate::errors::{OrchestratorError, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::TempPath;
use tracing::warn;

#[derive(Debug)]
pub struct MaterializedConfig {
    /// Deleted on drop while `Some`.
    temp: Option<TempPath>,
    /// Set once the file has been handed over to the filesystem for keeps.
    retained: Option<PathBuf>,
}

impl MaterializedConfig {
    /// Serialise `cfg` to a uniquely named temp file
    /// (`<action>_<iteration>_<ms>_*.json`).
    pub fn write(
        action: Action,
        iteration: Option<usize>,
        cfg: &Value,
        retain: bool,
    ) -> Result<MaterializedConfig> {
        let ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let prefix = format!(
            "{}_{}_{}_",
            action.canonical(),
            iteration.unwrap_or(0),
            ms
        );
        let file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".json")
            .tempfile()
            .map_err(|e| OrchestratorError::config_io(std::env::temp_dir(), e))?;
        let temp = file.into_temp_path();
        config::write_json(&temp, cfg)?;
        let mut materialised = MaterializedConfig {
            temp: Some(temp),
            retained: None,
        };
        if retain {
            materialised.retain();
        }
        Ok(materialised)
    }

    pub fn path(&self) -> &Path {
        match (&self.temp, &self.retained) {
            (Some(temp), _) => temp,
            (None, Some(kept)) => kept,
            (None, None) => Path::new(""),
        }
    }

    /// Keep the file on disk past this handle's lifetime.
    pub fn retain(&mut self) -> Option<PathBuf> {
        if let Some(temp) = self.temp.take() {
            match temp.keep() {
                Ok(path) => {
                    self.retained = Some(path.clone());
                    return Some(path);
                }
                Err(e) => {
                    warn!(error = %e, "could not retain materialised config");
                    return None;
                }
            }
        }
        self.retained.clone()
    }
}
