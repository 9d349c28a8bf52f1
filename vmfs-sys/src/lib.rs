// SPDX-License-Identifier: GPL-3.0-only

//! ESXi shell backend for VMFS datastore provisioning
//!
//! Wraps `esxcli`, `partedUtil`, `vmkfstools` and `vim-cmd` behind the
//! contracts in `vmfs-contracts`. Commands go through a [`CommandRunner`]
//! so the call sequence can be checked without a host.

pub mod error;
pub mod esxcli;
pub mod host;
pub mod runner;

pub use error::{Result, SysError};
pub use host::{EsxcliHost, VMFS_PARTITION_GUID};
pub use runner::{CommandRunner, SystemRunner};
