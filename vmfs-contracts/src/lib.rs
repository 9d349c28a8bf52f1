// SPDX-License-Identifier: GPL-3.0-only

pub mod protocol;
pub mod traits;

pub use protocol::{HostError, HostErrorKind, OperationEvent, OperationId, OperationKind};
pub use traits::{DatastoreOps, DatastoreOracle, HostDiskInventory, HostLookup};
