// SPDX-License-Identifier: GPL-3.0-only

//! Datastore models
//!
//! `DatastoreSpec` is what the caller wants, `DatastoreState` is what the
//! host reports. The reconciler only ever mutates a datastore through the
//! difference between the two.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{DiskHandle, DiskSelection, HostRef};

/// Opaque datastore handle assigned by the host on create.
///
/// Stable across renames and disk additions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatastoreId(String);

impl DatastoreId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatastoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Declarative datastore input with the disk set still unresolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatastoreConfig {
    pub name: String,
    pub host: HostRef,
    pub disks: DiskSelection,
}

/// Reason a `DatastoreSpec` cannot be reconciled
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecViolation {
    #[error("datastore name must not be empty")]
    EmptyName,
    #[error("at least one disk is required")]
    NoDisks,
    #[error("disk {0} is listed more than once")]
    DuplicateDisk(DiskHandle),
}

/// Desired datastore state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatastoreSpec {
    /// Display name, mutable through rename
    pub name: String,

    /// Owning host, immutable after creation
    pub host: HostRef,

    /// Disks in aggregation order; the first one carries the head extent
    pub disks: Vec<DiskHandle>,
}

impl DatastoreSpec {
    pub fn validate(&self) -> Result<(), SpecViolation> {
        if self.name.trim().is_empty() {
            return Err(SpecViolation::EmptyName);
        }

        if self.disks.is_empty() {
            return Err(SpecViolation::NoDisks);
        }

        let mut seen = HashSet::new();
        for disk in &self.disks {
            if !seen.insert(disk) {
                return Err(SpecViolation::DuplicateDisk(disk.clone()));
            }
        }

        Ok(())
    }
}

/// Computed datastore properties, as the summary object reports them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatastoreSummary {
    /// Total capacity in bytes
    pub capacity_bytes: u64,

    /// Free space in bytes
    pub free_bytes: u64,

    /// Space promised to thin provisioned files but not yet written
    pub uncommitted_bytes: u64,

    /// Datastore URL (e.g., "ds:///vmfs/volumes/5f1d.../")
    pub url: String,

    /// Whether the host can currently reach the datastore
    pub accessible: bool,

    /// Whether more than one host mounts the datastore
    pub multiple_host_access: bool,

    /// Maintenance mode state ("normal", "enteringMaintenance", "inMaintenance")
    pub maintenance_mode: String,
}

impl DatastoreSummary {
    /// Get used space in bytes
    pub fn used_bytes(&self) -> u64 {
        self.capacity_bytes.saturating_sub(self.free_bytes)
    }

    /// Get usage percentage (0-100)
    pub fn usage_percent(&self) -> u32 {
        if self.capacity_bytes == 0 {
            0
        } else {
            ((self.used_bytes() as f64 / self.capacity_bytes as f64) * 100.0) as u32
        }
    }
}

/// Observed datastore state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatastoreState {
    pub id: DatastoreId,
    pub name: String,
    pub host: HostRef,

    /// Disks actually backing the datastore, head extent first
    pub extents: Vec<DiskHandle>,

    pub summary: DatastoreSummary,
}

impl DatastoreState {
    /// The `DatastoreSpec` this state currently satisfies exactly.
    pub fn spec(&self) -> DatastoreSpec {
        DatastoreSpec {
            name: self.name.clone(),
            host: self.host.clone(),
            disks: self.extents.clone(),
        }
    }

    /// An empty extent list means a failed or partial create.
    pub fn is_valid(&self) -> bool {
        !self.extents.is_empty()
    }

    pub fn has_extent(&self, disk: &DiskHandle) -> bool {
        self.extents.contains(disk)
    }

    /// Requested disks that do not back this datastore yet, in request order.
    pub fn missing_extents<'a>(&self, requested: &'a [DiskHandle]) -> Vec<&'a DiskHandle> {
        requested
            .iter()
            .filter(|disk| !self.has_extent(disk))
            .collect()
    }

    pub fn covers(&self, requested: &[DiskHandle]) -> bool {
        self.missing_extents(requested).is_empty()
    }
}

/// Two-valued answer of an existence query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "state")]
pub enum Existence {
    Present(DatastoreState),
    Absent,
}

impl Existence {
    pub fn is_present(&self) -> bool {
        matches!(self, Existence::Present(_))
    }

    pub fn state(&self) -> Option<&DatastoreState> {
        match self {
            Existence::Present(state) => Some(state),
            Existence::Absent => None,
        }
    }

    pub fn into_state(self) -> Option<DatastoreState> {
        match self {
            Existence::Present(state) => Some(state),
            Existence::Absent => None,
        }
    }
}
