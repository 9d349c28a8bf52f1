// SPDX-License-Identifier: GPL-3.0-only

//! Built-in acceptance scenarios

pub mod add_disks;
pub mod basic;
pub mod discovery;
pub mod multi_disk;
pub mod rename;
pub mod steps;

use std::sync::Arc;

use crate::harness::TestRef;

pub const DATASTORE_SUITE: &str = "vmfs_datastore";
pub const DISCOVERY_SUITE: &str = "vmfs_disks";

pub fn instantiate_tests() -> Vec<TestRef> {
    vec![
        Arc::new(basic::VmfsDatastoreBasic),
        Arc::new(multi_disk::VmfsDatastoreMultiDisk),
        Arc::new(discovery::VmfsDatastoreDiscovery),
        Arc::new(add_disks::VmfsDatastoreAddDisks),
        Arc::new(rename::VmfsDatastoreRename),
    ]
}
