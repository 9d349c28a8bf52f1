// SPDX-License-Identifier: GPL-3.0-only

//! Datastore state reconciler
//!
//! Drives a [`DatastoreSpec`] to convergence against the observed
//! [`DatastoreState`]:
//!
//! ```text
//! Absent --create--> Creating --ok--> Present
//! Present --disks grown / name changed--> Updating --ok--> Present
//! Present --delete--> Deleting --ok--> Absent
//! ```
//!
//! Disks are additive. A spec listing fewer disks than the datastore already
//! spans leaves the extra extents in place; removal is unsupported.

use std::sync::Arc;

use vmfs_contracts::{DatastoreOps, DatastoreOracle, HostDiskInventory, HostError, HostErrorKind};
use vmfs_types::{
    DatastoreConfig, DatastoreId, DatastoreSpec, DatastoreState, DiskHandle, Existence,
    ReconcileOp, ReconcilePhase, ReconcilePlan, bytes_to_pretty,
};

use crate::config::ReconcilerConfig;
use crate::error::{DatastoreError, Result};
use crate::executor::RemoteExecutor;
use crate::oracle::Oracle;
use crate::resolver::DiskSetResolver;

/// Result of a successful reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    /// State read back from the host after the last operation
    pub state: DatastoreState,

    /// Operations issued during this pass, in order
    pub applied: Vec<ReconcileOp>,

    /// Extents kept even though the desired disk list no longer names them
    pub retained_extents: Vec<DiskHandle>,
}

#[derive(Debug, Default)]
struct UpdatePlan {
    extend: Vec<DiskHandle>,
    rename: Option<String>,
    retained: Vec<DiskHandle>,
}

impl UpdatePlan {
    // Extend runs before rename: the new extents must back the datastore
    // before its new display name is treated as authoritative. Either order
    // converges; this one is policy.
    fn into_plan(self, current_name: &str) -> ReconcilePlan {
        let mut ops = Vec::new();
        if !self.extend.is_empty() {
            ops.push(ReconcileOp::Extend { disks: self.extend });
        }
        if let Some(to) = self.rename {
            ops.push(ReconcileOp::Rename {
                from: current_name.to_string(),
                to,
            });
        }
        ReconcilePlan {
            ops,
            retained_extents: self.retained,
        }
    }
}

fn plan_update(desired: &DatastoreSpec, observed: &DatastoreState) -> Result<UpdatePlan> {
    if observed.host != desired.host {
        return Err(DatastoreError::HostImmutable {
            id: observed.id.clone(),
            current: observed.host.clone(),
            requested: desired.host.clone(),
        });
    }

    if !observed.is_valid() {
        return Err(DatastoreError::InvalidState {
            id: observed.id.clone(),
        });
    }

    let extend = observed
        .missing_extents(&desired.disks)
        .into_iter()
        .cloned()
        .collect();
    let rename = (observed.name != desired.name).then(|| desired.name.clone());
    let retained = observed
        .extents
        .iter()
        .filter(|extent| !desired.disks.contains(extent))
        .cloned()
        .collect();

    Ok(UpdatePlan {
        extend,
        rename,
        retained,
    })
}

/// Compute the operations that take `observed` to `desired`.
///
/// Pure: nothing is sent to the host.
pub fn plan(desired: &DatastoreSpec, observed: Option<&DatastoreState>) -> Result<ReconcilePlan> {
    desired.validate()?;

    match observed {
        None => Ok(ReconcilePlan {
            ops: vec![ReconcileOp::Create {
                disks: desired.disks.clone(),
            }],
            retained_extents: Vec::new(),
        }),
        Some(observed) => Ok(plan_update(desired, observed)?.into_plan(&observed.name)),
    }
}

/// Wrap a failure raised while `operation` was in flight.
///
/// Host faults become [`DatastoreError::Reconcile`]; `NotFound` and every
/// other typed error pass through untouched.
fn transition_error(
    error: DatastoreError,
    operation: &ReconcileOp,
    id: Option<&DatastoreId>,
    last_known: Option<&DatastoreState>,
) -> DatastoreError {
    match error {
        DatastoreError::Host(source) => DatastoreError::Reconcile {
            phase: operation.phase(),
            operation: operation.clone(),
            id: id.cloned().or_else(|| source.resource.clone()),
            last_known: last_known.cloned().map(Box::new),
            source,
        },
        other => other,
    }
}

pub struct DatastoreReconciler {
    resolver: DiskSetResolver,
    executor: RemoteExecutor,
    oracle: Oracle,
    config: ReconcilerConfig,
}

impl DatastoreReconciler {
    /// Build a reconciler over a single host backend.
    pub fn new<H>(host: Arc<H>, config: ReconcilerConfig) -> Self
    where
        H: DatastoreOps + HostDiskInventory + 'static,
    {
        let ops: Arc<dyn DatastoreOps> = host.clone();
        let oracle: Arc<dyn DatastoreOracle> = host.clone();
        let inventory: Arc<dyn HostDiskInventory> = host;
        Self::from_parts(ops, oracle, inventory, config)
    }

    pub fn from_parts(
        ops: Arc<dyn DatastoreOps>,
        oracle: Arc<dyn DatastoreOracle>,
        inventory: Arc<dyn HostDiskInventory>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            resolver: DiskSetResolver::new(inventory),
            executor: RemoteExecutor::new(ops, &config),
            oracle: Oracle::new(oracle),
            config,
        }
    }

    pub fn executor(&self) -> &RemoteExecutor {
        &self.executor
    }

    pub fn oracle(&self) -> &Oracle {
        &self.oracle
    }

    pub fn resolver(&self) -> &DiskSetResolver {
        &self.resolver
    }

    /// Resolve the disk selection of `config` into a concrete spec.
    pub async fn resolve(
        &self,
        config: &DatastoreConfig,
        owner: Option<&DatastoreId>,
    ) -> Result<DatastoreSpec> {
        let disks = self
            .resolver
            .resolve(&config.host, &config.disks, owner)
            .await?;

        Ok(DatastoreSpec {
            name: config.name.clone(),
            host: config.host.clone(),
            disks,
        })
    }

    /// Resolve `config` and converge the datastore `id` (or a new one) to it.
    pub async fn apply(
        &self,
        id: Option<&DatastoreId>,
        config: &DatastoreConfig,
    ) -> Result<Reconciled> {
        let desired = self.resolve(config, id).await?;
        self.converge(id, &desired).await
    }

    /// Converge datastore `id` to `desired`, creating it when `id` is `None`.
    ///
    /// An `id` the host no longer knows fails with
    /// [`DatastoreError::NotFound`]; callers that want to recreate it pass
    /// `None` on the next pass.
    pub async fn converge(
        &self,
        id: Option<&DatastoreId>,
        desired: &DatastoreSpec,
    ) -> Result<Reconciled> {
        desired.validate()?;

        let mut applied = Vec::new();
        let mut current = match id {
            Some(id) => self.observe(id).await?,
            None => {
                let state = self.create(desired).await?;
                applied.push(ReconcileOp::Create {
                    disks: desired.disks.clone(),
                });
                state
            }
        };

        let update = plan_update(desired, &current)?;
        for retained in &update.retained {
            tracing::warn!(
                "Datastore {} keeps extent {}: disk removal is not supported",
                current.id,
                retained
            );
        }
        let retained_extents = update.retained.clone();
        let plan = update.into_plan(&current.name);

        if plan.is_noop() && applied.is_empty() {
            tracing::debug!("Datastore {} already converged", current.id);
        }

        for operation in plan.ops {
            tracing::info!(
                "Datastore {}: {} -> {}",
                current.id,
                ReconcilePhase::Present,
                operation.phase()
            );
            self.apply_update(&current, &operation).await?;
            current = self.refresh(&current, &operation).await?;
            tracing::info!("Datastore {}: applied {}", current.id, operation);
            applied.push(operation);
        }

        if self.config.verify_after_apply {
            verify_converged(&current, desired)?;
        }

        Ok(Reconciled {
            state: current,
            applied,
            retained_extents,
        })
    }

    /// Existence query for `id`; never fails on a missing datastore.
    pub async fn read(&self, id: &DatastoreId) -> Result<Existence> {
        self.oracle.existence(id).await
    }

    /// Delete datastore `id`. Deleting an absent datastore succeeds.
    pub async fn delete(&self, id: &DatastoreId) -> Result<()> {
        let state = match self.oracle.existence(id).await? {
            Existence::Present(state) => state,
            Existence::Absent => {
                tracing::info!("Datastore {} already absent; nothing to delete", id);
                return Ok(());
            }
        };

        tracing::info!(
            "Datastore {} ({}): {} -> {}",
            id,
            state.name,
            ReconcilePhase::Present,
            ReconcilePhase::Deleting
        );
        match self.executor.delete(id).await {
            Ok(()) => {}
            Err(DatastoreError::NotFound { .. }) => {
                tracing::debug!("Datastore {} disappeared before delete completed", id);
                return Ok(());
            }
            Err(error) => {
                return Err(transition_error(
                    error,
                    &ReconcileOp::Delete,
                    Some(id),
                    Some(&state),
                ));
            }
        }

        if self.config.verify_after_apply && self.oracle.existence(id).await?.is_present() {
            return Err(DatastoreError::NotConverged {
                id: id.clone(),
                reason: "datastore still present after delete".to_string(),
            });
        }

        tracing::info!("Datastore {}: {} -> {}", id, ReconcilePhase::Deleting, ReconcilePhase::Absent);
        Ok(())
    }

    async fn observe(&self, id: &DatastoreId) -> Result<DatastoreState> {
        let state = self.oracle.describe(id).await?;
        if !state.is_valid() {
            return Err(DatastoreError::InvalidState { id: id.clone() });
        }
        Ok(state)
    }

    async fn create(&self, desired: &DatastoreSpec) -> Result<DatastoreState> {
        let operation = ReconcileOp::Create {
            disks: desired.disks.clone(),
        };
        tracing::info!(
            "Datastore '{}' on host {}: {} -> {} ({})",
            desired.name,
            desired.host,
            ReconcilePhase::Absent,
            ReconcilePhase::Creating,
            operation
        );

        let id = self
            .executor
            .create(desired)
            .await
            .map_err(|error| transition_error(error, &operation, None, None))?;

        let state = match self.oracle.describe(&id).await {
            Ok(state) => state,
            Err(DatastoreError::NotFound { .. }) => {
                return Err(DatastoreError::Reconcile {
                    phase: ReconcilePhase::Creating,
                    operation,
                    id: None,
                    last_known: None,
                    source: HostError::not_found(format!(
                        "datastore {id} vanished right after create"
                    )),
                });
            }
            Err(error) => return Err(transition_error(error, &operation, Some(&id), None)),
        };

        if !state.is_valid() {
            return Err(self.discard_partial(state, operation).await);
        }

        tracing::info!(
            "Datastore {} ('{}'): {} -> {} with {} extents ({})",
            state.id,
            state.name,
            ReconcilePhase::Creating,
            ReconcilePhase::Present,
            state.extents.len(),
            bytes_to_pretty(&state.summary.capacity_bytes, false)
        );
        Ok(state)
    }

    /// Remove an object the host created without extents.
    ///
    /// If the removal fails the error keeps the partial state so the caller
    /// can still find and clean it up.
    async fn discard_partial(&self, state: DatastoreState, operation: ReconcileOp) -> DatastoreError {
        let source = HostError::new(
            HostErrorKind::Internal,
            format!("datastore {} was created without extents", state.id),
        );

        match self.executor.delete(&state.id).await {
            Ok(()) | Err(DatastoreError::NotFound { .. }) => DatastoreError::Reconcile {
                phase: ReconcilePhase::Creating,
                operation,
                id: None,
                last_known: None,
                source,
            },
            Err(cleanup) => {
                tracing::warn!(
                    "Failed to remove partial datastore {}: {}",
                    state.id,
                    cleanup
                );
                DatastoreError::Reconcile {
                    phase: ReconcilePhase::Creating,
                    operation,
                    id: Some(state.id.clone()),
                    last_known: Some(Box::new(state)),
                    source,
                }
            }
        }
    }

    async fn apply_update(&self, current: &DatastoreState, operation: &ReconcileOp) -> Result<()> {
        let result = match operation {
            ReconcileOp::Extend { disks } => self.executor.extend(&current.id, disks).await,
            ReconcileOp::Rename { to, .. } => self.executor.rename(&current.id, to).await,
            ReconcileOp::Create { .. } | ReconcileOp::Delete => Ok(()),
        };

        result.map_err(|error| transition_error(error, operation, Some(&current.id), Some(current)))
    }

    /// Re-read after `operation` and check extents did not shrink.
    async fn refresh(&self, previous: &DatastoreState, operation: &ReconcileOp) -> Result<DatastoreState> {
        let state = self
            .oracle
            .describe(&previous.id)
            .await
            .map_err(|error| {
                transition_error(error, operation, Some(&previous.id), Some(previous))
            })?;

        if let Some(lost) = previous.extents.iter().find(|extent| !state.has_extent(extent)) {
            return Err(DatastoreError::NotConverged {
                id: state.id.clone(),
                reason: format!("extent {lost} disappeared after {}", operation.label()),
            });
        }

        Ok(state)
    }
}

fn verify_converged(state: &DatastoreState, desired: &DatastoreSpec) -> Result<()> {
    if state.name != desired.name {
        return Err(DatastoreError::NotConverged {
            id: state.id.clone(),
            reason: format!("name is '{}', expected '{}'", state.name, desired.name),
        });
    }

    let missing = state.missing_extents(&desired.disks);
    if !missing.is_empty() {
        let names: Vec<&str> = missing.into_iter().map(DiskHandle::as_str).collect();
        return Err(DatastoreError::NotConverged {
            id: state.id.clone(),
            reason: format!("disks not backing the datastore: {}", names.join(", ")),
        });
    }

    Ok(())
}
