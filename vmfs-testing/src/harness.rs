// SPDX-License-Identifier: GPL-3.0-only

//! Acceptance harness
//!
//! Scenarios implement [`HarnessTest`] and receive a [`HarnessContext`]
//! holding the run configuration and the selected host backend. Tests of one
//! suite share a backend and run one after another.

pub mod orchestrator;
pub mod support;

use std::sync::Arc;

use async_trait::async_trait;
use vmfs_contracts::{DatastoreOps, DatastoreOracle, HostDiskInventory, HostLookup};
use vmfs_reconciler::{DatastoreReconciler, ReconcilerConfig};
use vmfs_sys::{EsxcliHost, SystemRunner};

use crate::config::{AcceptanceConfig, BackendKind};
use crate::errors::{Result, TestingError};
use crate::sim::SimulatedHost;

pub use orchestrator::{
    CaseStatus, GroupResultRecord, RunConfig, RunSummary, TestResultRecord, run_all, run_tests,
};

/// Host contracts a scenario runs against
#[derive(Clone)]
pub struct HostBackend {
    pub lookup: Arc<dyn HostLookup>,
    pub ops: Arc<dyn DatastoreOps>,
    pub oracle: Arc<dyn DatastoreOracle>,
    pub inventory: Arc<dyn HostDiskInventory>,
}

impl HostBackend {
    pub fn from_host<H>(host: Arc<H>) -> Self
    where
        H: HostLookup + DatastoreOps + HostDiskInventory + 'static,
    {
        Self {
            lookup: host.clone(),
            ops: host.clone(),
            oracle: host.clone(),
            inventory: host,
        }
    }

    /// Build the backend `config` selects.
    pub fn connect(config: &AcceptanceConfig) -> Result<Self> {
        match config.backend {
            BackendKind::Simulated => Ok(Self::from_host(Arc::new(SimulatedHost::from_config(
                config,
            )))),
            BackendKind::Esxcli => {
                SystemRunner::check_tools().map_err(|error| TestingError::BackendUnavailable {
                    reason: error.to_string(),
                })?;
                let mut host = EsxcliHost::new(Arc::new(SystemRunner));
                if let Some(version) = config.vmfs_version() {
                    host = host.with_vmfs_version(version);
                }
                Ok(Self::from_host(Arc::new(host)))
            }
        }
    }

    pub fn reconciler(&self, config: ReconcilerConfig) -> DatastoreReconciler {
        DatastoreReconciler::from_parts(
            self.ops.clone(),
            self.oracle.clone(),
            self.inventory.clone(),
            config,
        )
    }
}

#[derive(Clone)]
pub struct HarnessContext {
    pub config: AcceptanceConfig,
    pub backend: HostBackend,
}

impl HarnessContext {
    pub fn new(config: AcceptanceConfig, backend: HostBackend) -> Self {
        Self { config, backend }
    }

    pub fn reconciler(&self) -> DatastoreReconciler {
        self.backend.reconciler(self.config.reconciler.clone())
    }
}

#[async_trait]
pub trait HarnessTest: Send + Sync {
    fn id(&self) -> &'static str;
    fn suite(&self) -> &'static str;

    async fn execute(&self, ctx: &HarnessContext) -> Result<()>;
}

pub type TestRef = Arc<dyn HarnessTest>;
