// SPDX-License-Identifier: GPL-3.0-only

//! Canonical domain models for VMFS datastore provisioning
//!
//! This crate defines the single source of truth for the datastore domain.
//! These models are used throughout the stack:
//!
//! - **vmfs-contracts**: host management plane traits take and return these types
//! - **vmfs-reconciler**: plans and drives convergence over them
//! - **vmfs-sys** / **vmfs-testing**: backends build them from host output
//!
//! ## Desired vs observed
//!
//! - `DatastoreConfig` → declarative input, disks still unresolved
//! - `DatastoreSpec` → desired state after disk resolution
//! - `DatastoreState` → observed state as reported by the host

pub mod common;
pub mod datastore;
pub mod disk;
pub mod host;
pub mod reconcile;

pub use common::{bytes_to_pretty, mib_to_bytes};
pub use datastore::{
    DatastoreConfig, DatastoreId, DatastoreSpec, DatastoreState, DatastoreSummary, Existence,
    SpecViolation,
};
pub use disk::{DiscoveryQuery, DiskHandle, DiskSelection, HostDisk};
pub use host::{HostQuery, HostRef};
pub use reconcile::{ReconcileOp, ReconcilePhase, ReconcilePlan};
