// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use thiserror::Error;
use vmfs_contracts::HostError;
use vmfs_types::{
    DatastoreId, DatastoreState, DiskHandle, HostRef, ReconcileOp, ReconcilePhase, SpecViolation,
};

/// Errors surfaced to reconciliation callers
#[derive(Debug, Error)]
pub enum DatastoreError {
    #[error("disk '{disk}' not found on host {host}")]
    DiskNotFound { host: HostRef, disk: String },

    #[error("disk {disk} on host {host} already backs datastore {claimed_by}")]
    DiskInUse {
        host: HostRef,
        disk: DiskHandle,
        claimed_by: DatastoreId,
    },

    #[error("no available disks on host {host} match filter {filter:?}")]
    NoMatch {
        host: HostRef,
        filter: Option<String>,
    },

    #[error("invalid disk filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    /// The datastore id does not exist. Also the expected answer after delete.
    #[error("datastore {id} not found")]
    NotFound { id: DatastoreId },

    #[error("invalid datastore spec: {0}")]
    InvalidSpec(#[from] SpecViolation),

    #[error("datastore {id} reports no extents (failed or partial create)")]
    InvalidState { id: DatastoreId },

    #[error("datastore {id} belongs to host {current}; moving it to {requested} is not supported")]
    HostImmutable {
        id: DatastoreId,
        current: HostRef,
        requested: HostRef,
    },

    /// A remote call failed while the datastore was in a transition phase.
    #[error("{phase} failed during {operation}: {source}")]
    Reconcile {
        phase: ReconcilePhase,
        operation: ReconcileOp,
        /// Identifier to recover from, when the host assigned one
        id: Option<DatastoreId>,
        last_known: Option<Box<DatastoreState>>,
        source: HostError,
    },

    #[error("datastore {id} did not converge: {reason}")]
    NotConverged { id: DatastoreId, reason: String },

    #[error("host request failed: {0}")]
    Host(#[source] HostError),
}

impl DatastoreError {
    /// Map a host error for an operation targeting `id`.
    ///
    /// `NotFound` becomes [`DatastoreError::NotFound`] so callers can tell
    /// "absent" apart from a fault.
    pub fn from_host(id: &DatastoreId, error: HostError) -> Self {
        if error.is_not_found() {
            Self::NotFound { id: id.clone() }
        } else {
            Self::Host(error)
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Transition phase that failed, for errors raised mid-transition.
    pub fn phase(&self) -> Option<ReconcilePhase> {
        match self {
            Self::Reconcile { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// Last state observed before a failed transition.
    pub fn last_known(&self) -> Option<&DatastoreState> {
        match self {
            Self::Reconcile { last_known, .. } => last_known.as_deref(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, DatastoreError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {reason}")]
    Read { path: PathBuf, reason: String },
    #[error("failed to parse config: {reason}")]
    Parse { reason: String },
}

#[cfg(test)]
mod tests {
    use vmfs_contracts::HostErrorKind;

    use super::*;

    #[test]
    fn not_found_host_errors_become_datastore_not_found() {
        let id = DatastoreId::new("datastore-9");
        let mapped = DatastoreError::from_host(&id, HostError::not_found("gone"));
        assert!(mapped.is_not_found());

        let busy = DatastoreError::from_host(&id, HostError::new(HostErrorKind::Busy, "locked"));
        assert!(matches!(busy, DatastoreError::Host(_)));
    }

    #[test]
    fn reconcile_error_names_phase_and_operation() {
        let error = DatastoreError::Reconcile {
            phase: ReconcilePhase::Updating,
            operation: ReconcileOp::Rename {
                from: "a".to_string(),
                to: "b".to_string(),
            },
            id: Some(DatastoreId::new("datastore-1")),
            last_known: None,
            source: HostError::new(HostErrorKind::Conflict, "name in use"),
        };

        assert_eq!(error.phase(), Some(ReconcilePhase::Updating));
        assert_eq!(
            error.to_string(),
            "updating failed during rename 'a' -> 'b': Conflict: name in use"
        );
    }
}
