// SPDX-License-Identifier: GPL-3.0-only

//! Reconciliation vocabulary shared by the reconciler and its callers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::DiskHandle;

/// Lifecycle phase of a datastore as seen by the reconciler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilePhase {
    Absent,
    Creating,
    Present,
    Updating,
    Deleting,
}

impl ReconcilePhase {
    /// Phases during which a remote operation is in flight.
    pub fn is_transition(self) -> bool {
        matches!(
            self,
            ReconcilePhase::Creating | ReconcilePhase::Updating | ReconcilePhase::Deleting
        )
    }
}

impl fmt::Display for ReconcilePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReconcilePhase::Absent => "absent",
            ReconcilePhase::Creating => "creating",
            ReconcilePhase::Present => "present",
            ReconcilePhase::Updating => "updating",
            ReconcilePhase::Deleting => "deleting",
        };
        f.write_str(label)
    }
}

/// A single remote operation planned by the reconciler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum ReconcileOp {
    Create { disks: Vec<DiskHandle> },
    Extend { disks: Vec<DiskHandle> },
    Rename { from: String, to: String },
    Delete,
}

impl ReconcileOp {
    /// Phase the datastore is in while this operation runs.
    pub fn phase(&self) -> ReconcilePhase {
        match self {
            ReconcileOp::Create { .. } => ReconcilePhase::Creating,
            ReconcileOp::Extend { .. } | ReconcileOp::Rename { .. } => ReconcilePhase::Updating,
            ReconcileOp::Delete => ReconcilePhase::Deleting,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReconcileOp::Create { .. } => "create",
            ReconcileOp::Extend { .. } => "extend",
            ReconcileOp::Rename { .. } => "rename",
            ReconcileOp::Delete => "delete",
        }
    }
}

impl fmt::Display for ReconcileOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileOp::Create { disks } | ReconcileOp::Extend { disks } => {
                let names: Vec<&str> = disks.iter().map(DiskHandle::as_str).collect();
                write!(f, "{} [{}]", self.label(), names.join(", "))
            }
            ReconcileOp::Rename { from, to } => write!(f, "rename '{from}' -> '{to}'"),
            ReconcileOp::Delete => f.write_str("delete"),
        }
    }
}

/// Ordered operations that converge observed state to the desired spec
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilePlan {
    pub ops: Vec<ReconcileOp>,

    /// Extents no longer requested; kept because disk removal is unsupported
    pub retained_extents: Vec<DiskHandle>,
}

impl ReconcilePlan {
    pub fn is_noop(&self) -> bool {
        self.ops.is_empty()
    }
}
