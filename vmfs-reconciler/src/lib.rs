// SPDX-License-Identifier: GPL-3.0-only

//! Reconciliation core for VMFS datastores
//!
//! The pieces run in a fixed order for every pass:
//!
//! 1. [`DiskSetResolver`] turns a [`DiskSelection`](vmfs_types::DiskSelection)
//!    into validated disk handles.
//! 2. [`plan`] compares the desired spec with what the [`Oracle`] reports.
//! 3. [`RemoteExecutor`] issues the planned operations one at a time.
//! 4. The oracle is consulted again to confirm convergence.
//!
//! Nothing here retries. A failed transition surfaces as
//! [`DatastoreError::Reconcile`] and the caller decides what happens next.

pub mod config;
pub mod error;
pub mod executor;
pub mod locks;
pub mod oracle;
pub mod reconciler;
pub mod resolver;

pub use config::ReconcilerConfig;
pub use error::{ConfigError, DatastoreError, Result};
pub use executor::RemoteExecutor;
pub use locks::DatastoreLocks;
pub use oracle::Oracle;
pub use reconciler::{DatastoreReconciler, Reconciled, plan};
pub use resolver::DiskSetResolver;
