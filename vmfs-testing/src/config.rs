// SPDX-License-Identifier: GPL-3.0-only

//! Acceptance run configuration
//!
//! Every value the scenarios need comes from one TOML document. Missing
//! values do not fail the run; the scenarios that need them are skipped.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use vmfs_reconciler::ReconcilerConfig;

use crate::errors::{Result, TestingError};

/// Host backend the scenarios run against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// In-process `SimulatedHost`, seeded from this config
    #[default]
    Simulated,
    /// `esxcli` and friends on the local ESXi shell
    Esxcli,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceptanceConfig {
    pub datacenter: Option<String>,
    pub esxi_host: Option<String>,

    /// Up to three free disks, in the order the multi-disk scenarios use them
    pub disks: Vec<String>,

    /// Filter for the discovery scenario
    pub vmfs_regexp: Option<String>,

    pub backend: BackendKind,

    /// Filesystem version the esxcli backend formats with (`vmfs6` if unset)
    pub vmfs_version: Option<String>,

    /// Per-scenario timeout
    pub test_timeout_secs: u64,

    pub reconciler: ReconcilerConfig,
}

impl Default for AcceptanceConfig {
    fn default() -> Self {
        Self {
            datacenter: None,
            esxi_host: None,
            disks: Vec::new(),
            vmfs_regexp: None,
            backend: BackendKind::default(),
            vmfs_version: None,
            test_timeout_secs: 300,
            reconciler: ReconcilerConfig::default(),
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

fn skip(what: &str) -> TestingError {
    TestingError::TestSkipped {
        reason: format!("set {what} to run vmfs datastore acceptance tests"),
    }
}

impl AcceptanceConfig {
    /// Hermetic defaults for the simulated backend.
    pub fn simulated() -> Self {
        Self {
            datacenter: Some("dc-01".to_string()),
            esxi_host: Some("esxi-01.lab.local".to_string()),
            disks: vec![
                "naa.6000c29a00000000000000000000000a".to_string(),
                "naa.6000c29a00000000000000000000000b".to_string(),
                "naa.6000c29a00000000000000000000000c".to_string(),
            ],
            vmfs_regexp: Some("^naa\\.6000c29a".to_string()),
            test_timeout_secs: 30,
            ..Self::default()
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|error| TestingError::ConfigInvalid {
            reason: error.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TestingError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        let raw = fs::read_to_string(path).map_err(|error| TestingError::ConfigInvalid {
            reason: format!("{}: {error}", path.display()),
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn datacenter(&self) -> Option<&str> {
        present(&self.datacenter)
    }

    pub fn vmfs_version(&self) -> Option<&str> {
        present(&self.vmfs_version)
    }

    pub fn require_host(&self) -> Result<&str> {
        present(&self.esxi_host).ok_or_else(|| skip("esxi_host"))
    }

    pub fn require_disk(&self, index: usize) -> Result<&str> {
        self.disks
            .get(index)
            .map(|disk| disk.trim())
            .filter(|disk| !disk.is_empty())
            .ok_or_else(|| skip(&format!("disks[{index}]")))
    }

    pub fn require_regexp(&self) -> Result<&str> {
        present(&self.vmfs_regexp).ok_or_else(|| skip("vmfs_regexp"))
    }

    /// Every value any scenario needs.
    pub fn pre_check(&self) -> Result<()> {
        self.require_host()?;
        for index in 0..3 {
            self.require_disk(index)?;
        }
        self.require_regexp()?;
        Ok(())
    }
}
