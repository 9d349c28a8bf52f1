// SPDX-License-Identifier: GPL-3.0-only

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Reconciler tuning, usually embedded in a larger TOML document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Upper bound for a single remote call; `None` waits for the host
    pub operation_timeout_secs: Option<u64>,

    /// Re-read the datastore after applying a plan and fail if it drifted
    pub verify_after_apply: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            operation_timeout_secs: None,
            verify_after_apply: true,
        }
    }
}

impl ReconcilerConfig {
    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|error| ConfigError::Parse {
            reason: error.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|error| ConfigError::Read {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;
        Self::from_toml_str(&raw)
    }
}
