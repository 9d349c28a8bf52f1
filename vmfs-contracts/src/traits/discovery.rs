// SPDX-License-Identifier: GPL-3.0-only

use async_trait::async_trait;

use vmfs_types::{HostDisk, HostRef};

use crate::HostError;

#[async_trait]
pub trait HostDiskInventory: Send + Sync {
    /// Devices currently visible to the host, claimed or not.
    async fn list_disks(&self, host: &HostRef) -> Result<Vec<HostDisk>, HostError>;

    /// Refresh the host's device inventory. No other state changes.
    async fn rescan(&self, host: &HostRef) -> Result<(), HostError>;
}
