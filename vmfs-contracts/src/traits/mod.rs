// SPDX-License-Identifier: GPL-3.0-only

pub mod datastore;
pub mod discovery;
pub mod host;

pub use datastore::{DatastoreOps, DatastoreOracle};
pub use discovery::HostDiskInventory;
pub use host::HostLookup;
