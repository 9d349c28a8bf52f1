// SPDX-License-Identifier: GPL-3.0-only

use async_trait::async_trait;

use vmfs_types::{HostQuery, HostRef};

use crate::HostError;

/// Maps a human-readable host name (and datacenter) to an opaque host reference.
#[async_trait]
pub trait HostLookup: Send + Sync {
    async fn resolve_host(&self, query: &HostQuery) -> Result<HostRef, HostError>;
}
