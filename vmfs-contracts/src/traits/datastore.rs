// SPDX-License-Identifier: GPL-3.0-only

use async_trait::async_trait;

use vmfs_types::{DatastoreId, DatastoreSpec, DatastoreState, DiskHandle};

use crate::HostError;

/// Read-only access to datastore properties.
///
/// Implementations must be free of side effects so callers can query
/// repeatedly and concurrently.
#[async_trait]
pub trait DatastoreOracle: Send + Sync {
    /// Fails with `HostErrorKind::NotFound` when `id` does not exist.
    async fn describe(&self, id: &DatastoreId) -> Result<DatastoreState, HostError>;
}

/// Mutating operations on the host management plane.
///
/// Every call blocks until the host acknowledges completion. There is no
/// compare-and-swap: callers serialize operations per datastore id.
#[async_trait]
pub trait DatastoreOps: DatastoreOracle {
    async fn create(&self, spec: &DatastoreSpec) -> Result<DatastoreId, HostError>;

    async fn extend(&self, id: &DatastoreId, disks: &[DiskHandle]) -> Result<(), HostError>;

    async fn rename(&self, id: &DatastoreId, name: &str) -> Result<(), HostError>;

    async fn delete(&self, id: &DatastoreId) -> Result<(), HostError>;
}
