// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};
use vmfs_types::DatastoreId;

use super::{HostError, OperationId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Extend,
    Rename,
    Delete,
    Describe,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "payload")]
pub enum OperationEvent {
    Started {
        operation_id: OperationId,
        operation: OperationKind,
        target: Option<DatastoreId>,
    },
    Completed {
        operation_id: OperationId,
        operation: OperationKind,
        target: Option<DatastoreId>,
    },
    Failed {
        operation_id: OperationId,
        operation: OperationKind,
        target: Option<DatastoreId>,
        error: HostError,
    },
}

impl OperationEvent {
    pub fn operation_id(&self) -> OperationId {
        match self {
            OperationEvent::Started { operation_id, .. }
            | OperationEvent::Completed { operation_id, .. }
            | OperationEvent::Failed { operation_id, .. } => *operation_id,
        }
    }

    pub fn operation(&self) -> OperationKind {
        match self {
            OperationEvent::Started { operation, .. }
            | OperationEvent::Completed { operation, .. }
            | OperationEvent::Failed { operation, .. } => *operation,
        }
    }
}
