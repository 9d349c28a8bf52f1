// SPDX-License-Identifier: GPL-3.0-only

//! Step runner shared by the datastore scenarios
//!
//! A case applies its steps in order against one datastore, runs each
//! step's checks, then deletes the datastore and checks it is gone. The
//! delete and its check run even when a step failed.

use vmfs_reconciler::{DatastoreError, DatastoreReconciler};
use vmfs_types::{
    DatastoreConfig, DatastoreId, DatastoreState, DiscoveryQuery, DiskHandle, DiskSelection,
    Existence, HostRef,
};

use crate::errors::Result;
use crate::harness::HarnessContext;
use crate::harness::support;

pub const DATASTORE_NAME: &str = "terraform-test";
pub const RENAMED_DATASTORE_NAME: &str = "terraform-test-renamed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    /// The datastore is present
    Exists,
    /// The datastore reports this name
    HasName(String),
    /// Every listed disk backs the datastore
    CoversDisks(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct Step {
    pub config: DatastoreConfig,
    pub checks: Vec<Check>,
}

impl Step {
    pub fn new(config: DatastoreConfig) -> Self {
        Self {
            config,
            checks: Vec::new(),
        }
    }

    pub fn check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }
}

pub fn static_config(name: &str, host: &HostRef, disks: &[&str]) -> DatastoreConfig {
    DatastoreConfig {
        name: name.to_string(),
        host: host.clone(),
        disks: DiskSelection::Explicit(disks.iter().map(|disk| disk.to_string()).collect()),
    }
}

pub fn discover_config(name: &str, host: &HostRef, filter: &str) -> DatastoreConfig {
    DatastoreConfig {
        name: name.to_string(),
        host: host.clone(),
        disks: DiskSelection::Discover(DiscoveryQuery {
            host: host.clone(),
            filter: Some(filter.to_string()),
            rescan: true,
        }),
    }
}

fn verify(check: &Check, state: &DatastoreState) -> Result<()> {
    match check {
        Check::Exists => Ok(()),
        Check::HasName(expected) if &state.name != expected => support::failure(format!(
            "expected datastore name to be {expected}, got {}",
            state.name
        )),
        Check::HasName(_) => Ok(()),
        Check::CoversDisks(disks) => {
            let missing: Vec<&String> = disks
                .iter()
                .filter(|disk| DiskHandle::parse(disk).is_none_or(|handle| !state.has_extent(&handle)))
                .collect();
            if missing.is_empty() {
                Ok(())
            } else {
                support::failure(format!(
                    "datastore {} is missing extents {missing:?}",
                    state.id
                ))
            }
        }
    }
}

async fn run_steps(
    reconciler: &DatastoreReconciler,
    steps: &[Step],
    id: &mut Option<DatastoreId>,
) -> Result<()> {
    for (index, step) in steps.iter().enumerate() {
        let applied = reconciler.apply(id.as_ref(), &step.config).await;
        let reconciled = match applied {
            Ok(reconciled) => reconciled,
            Err(error) => {
                if let DatastoreError::Reconcile {
                    id: Some(partial), ..
                } = &error
                {
                    *id = Some(partial.clone());
                }
                return support::datastore_result(Err(error), &format!("step {}", index + 1));
            }
        };
        *id = Some(reconciled.state.id.clone());
        tracing::info!(
            "step {}: datastore {} after {} operations",
            index + 1,
            reconciled.state.id,
            reconciled.applied.len()
        );

        let existence = support::datastore_result(
            reconciler.read(&reconciled.state.id).await,
            "read datastore",
        )?;
        let Existence::Present(state) = existence else {
            return support::failure(format!(
                "expected datastore {} to exist",
                reconciled.state.id
            ));
        };
        for check in &step.checks {
            verify(check, &state)?;
        }
    }
    Ok(())
}

/// Delete the datastore and require the existence query to report it missing.
async fn check_destroy(reconciler: &DatastoreReconciler, id: Option<&DatastoreId>) -> Result<()> {
    let Some(id) = id else {
        return Ok(());
    };

    support::datastore_result(reconciler.delete(id).await, "delete datastore")?;
    match support::datastore_result(reconciler.read(id).await, "read datastore")? {
        Existence::Absent => Ok(()),
        Existence::Present(_) => {
            support::failure(format!("expected datastore {id} to be missing"))
        }
    }
}

/// Apply `steps` in order, then destroy and check the datastore is absent.
pub async fn run_case(ctx: &HarnessContext, steps: Vec<Step>) -> Result<()> {
    let reconciler = ctx.reconciler();
    let mut id = None;

    let outcome = run_steps(&reconciler, &steps, &mut id).await;
    let destroyed = check_destroy(&reconciler, id.as_ref()).await;

    if let (Err(step_error), Err(destroy_error)) = (&outcome, &destroyed) {
        tracing::warn!("cleanup after failed step also failed: {} / {}", step_error, destroy_error);
    }
    outcome?;
    destroyed
}

#[cfg(test)]
mod tests {
    use vmfs_types::DatastoreSummary;

    use super::*;

    fn state(name: &str, extents: &[&str]) -> DatastoreState {
        DatastoreState {
            id: DatastoreId::new("datastore-1"),
            name: name.to_string(),
            host: HostRef::new("esxi-01"),
            extents: extents
                .iter()
                .filter_map(|disk| DiskHandle::parse(disk))
                .collect(),
            summary: DatastoreSummary::default(),
        }
    }

    #[test]
    fn name_check_reports_expected_and_actual() {
        let error = verify(
            &Check::HasName(RENAMED_DATASTORE_NAME.to_string()),
            &state(DATASTORE_NAME, &["naa.1"]),
        )
        .unwrap_err();
        assert!(error.to_string().contains("got terraform-test"));
    }

    #[test]
    fn disk_check_requires_every_disk() {
        let observed = state(DATASTORE_NAME, &["naa.1", "naa.2"]);
        let covered = Check::CoversDisks(vec!["naa.1".to_string(), "naa.2".to_string()]);
        let uncovered = Check::CoversDisks(vec!["naa.3".to_string()]);

        assert!(verify(&covered, &observed).is_ok());
        assert!(verify(&uncovered, &observed).is_err());
    }
}
