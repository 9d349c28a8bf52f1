// SPDX-License-Identifier: GPL-3.0-only

//! Remote operation executor
//!
//! Thin wrapper over [`DatastoreOps`] that applies the caller-side timeout,
//! logs each call and keeps an event journal. Host errors come back mapped:
//! `NotFound` as [`DatastoreError::NotFound`], everything else as
//! [`DatastoreError::Host`].

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use vmfs_contracts::{DatastoreOps, HostError, HostErrorKind, OperationEvent, OperationId, OperationKind};
use vmfs_types::{DatastoreId, DatastoreSpec, DatastoreState, DiskHandle};

use crate::config::ReconcilerConfig;
use crate::error::{DatastoreError, Result};

pub struct RemoteExecutor {
    ops: Arc<dyn DatastoreOps>,
    timeout: Option<Duration>,
    journal: Mutex<Vec<OperationEvent>>,
}

impl RemoteExecutor {
    pub fn new(ops: Arc<dyn DatastoreOps>, config: &ReconcilerConfig) -> Self {
        Self {
            ops,
            timeout: config.operation_timeout(),
            journal: Mutex::new(Vec::new()),
        }
    }

    pub async fn create(&self, spec: &DatastoreSpec) -> Result<DatastoreId> {
        self.call(OperationKind::Create, None, self.ops.create(spec))
            .await
            .map_err(DatastoreError::Host)
    }

    pub async fn extend(&self, id: &DatastoreId, disks: &[DiskHandle]) -> Result<()> {
        self.call(OperationKind::Extend, Some(id), self.ops.extend(id, disks))
            .await
            .map_err(|error| DatastoreError::from_host(id, error))
    }

    pub async fn rename(&self, id: &DatastoreId, name: &str) -> Result<()> {
        self.call(OperationKind::Rename, Some(id), self.ops.rename(id, name))
            .await
            .map_err(|error| DatastoreError::from_host(id, error))
    }

    pub async fn delete(&self, id: &DatastoreId) -> Result<()> {
        self.call(OperationKind::Delete, Some(id), self.ops.delete(id))
            .await
            .map_err(|error| DatastoreError::from_host(id, error))
    }

    pub async fn describe(&self, id: &DatastoreId) -> Result<DatastoreState> {
        self.call(OperationKind::Describe, Some(id), self.ops.describe(id))
            .await
            .map_err(|error| DatastoreError::from_host(id, error))
    }

    /// Take every event recorded since the last drain.
    pub fn drain_events(&self) -> Vec<OperationEvent> {
        let mut journal = self
            .journal
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::take(&mut *journal)
    }

    async fn call<T>(
        &self,
        operation: OperationKind,
        target: Option<&DatastoreId>,
        request: impl Future<Output = std::result::Result<T, HostError>>,
    ) -> std::result::Result<T, HostError> {
        let operation_id = OperationId::new();
        let target = target.cloned();
        self.record(OperationEvent::Started {
            operation_id,
            operation,
            target: target.clone(),
        });

        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, request).await {
                Ok(result) => result,
                Err(_) => Err(HostError::new(
                    HostErrorKind::Timeout,
                    format!("{operation:?} did not complete within {}s", limit.as_secs()),
                )),
            },
            None => request.await,
        };

        match &result {
            Ok(_) => {
                tracing::debug!("{:?} {} completed ({:?})", operation, operation_id, target);
                self.record(OperationEvent::Completed {
                    operation_id,
                    operation,
                    target,
                });
            }
            Err(error) => {
                if error.is_not_found() {
                    tracing::debug!("{:?} {} target {:?} not found", operation, operation_id, target);
                } else {
                    tracing::error!("{:?} {} failed ({:?}): {}", operation, operation_id, target, error);
                }
                self.record(OperationEvent::Failed {
                    operation_id,
                    operation,
                    target,
                    error: error.clone(),
                });
            }
        }

        result
    }

    fn record(&self, event: OperationEvent) {
        self.journal
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}
