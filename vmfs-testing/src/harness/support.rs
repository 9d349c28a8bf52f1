// SPDX-License-Identifier: GPL-3.0-only

use vmfs_reconciler::DatastoreError;
use vmfs_types::{HostQuery, HostRef};

use crate::errors::{Result, TestingError};
use crate::harness::HarnessContext;

pub fn skip<T>(reason: impl Into<String>) -> Result<T> {
    Err(TestingError::TestSkipped {
        reason: reason.into(),
    })
}

pub fn failure<T>(reason: impl Into<String>) -> Result<T> {
    Err(TestingError::TestFailed {
        reason: reason.into(),
    })
}

/// Turn a reconciler outcome into a scenario outcome.
pub fn datastore_result<T>(
    result: std::result::Result<T, DatastoreError>,
    context: &str,
) -> Result<T> {
    result.map_err(|error| TestingError::TestFailed {
        reason: format!("{context}: {error}"),
    })
}

/// Resolve the configured ESXi host, skipping when it is not configured.
pub async fn resolve_host(ctx: &HarnessContext) -> Result<HostRef> {
    let name = ctx.config.require_host()?;
    let query = HostQuery::new(ctx.config.datacenter(), name);
    ctx.backend
        .lookup
        .resolve_host(&query)
        .await
        .map_err(|error| TestingError::TestFailed {
            reason: format!("resolve host '{name}': {error}"),
        })
}
