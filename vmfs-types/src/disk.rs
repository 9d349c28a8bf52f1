// SPDX-License-Identifier: GPL-3.0-only

//! Disk inventory models
//!
//! A `DiskHandle` is the canonical device name the host reports for a disk
//! (e.g. "naa.6000c29f1b8a4e3d9c2e3b0f4a5d6e7f"). Handles are unique within
//! a host and are the only way the rest of the stack refers to disks.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{DatastoreId, HostRef};

/// Canonical device identifier as reported by the host
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiskHandle(String);

impl DiskHandle {
    /// Build a handle from user or host supplied text.
    ///
    /// Surrounding whitespace is dropped; blank input yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DiskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of a host's device inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostDisk {
    /// Canonical device name
    pub handle: DiskHandle,

    /// Display name (e.g., "Local VMware Disk (naa.6000...)")
    pub display_name: String,

    /// Total size in bytes
    pub size_bytes: u64,

    /// Whether the device is local to the host
    pub is_local: bool,

    /// Whether the device reports itself as solid state
    pub is_ssd: bool,

    /// Datastore currently backed by this disk, if any
    pub claimed_by: Option<DatastoreId>,
}

impl HostDisk {
    /// A disk can be handed to a new datastore only while nothing claims it.
    pub fn is_available(&self) -> bool {
        self.claimed_by.is_none()
    }

    /// Whether `owner` may (re)use this disk: unclaimed, or claimed by `owner`.
    pub fn is_usable_by(&self, owner: Option<&DatastoreId>) -> bool {
        match (&self.claimed_by, owner) {
            (None, _) => true,
            (Some(claimed), Some(owner)) => claimed == owner,
            (Some(_), None) => false,
        }
    }
}

/// Disk discovery request, equivalent to the `vmfs_disks` data source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryQuery {
    /// Host whose inventory is searched
    pub host: HostRef,

    /// Regular expression over canonical names; `None` matches every disk
    #[serde(default)]
    pub filter: Option<String>,

    /// Ask the host to rescan its adapters before listing
    #[serde(default)]
    pub rescan: bool,
}

/// How the desired disk set is expressed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "value")]
pub enum DiskSelection {
    /// Ordered list of handles, exactly as configured
    Explicit(Vec<String>),
    /// Handles found by filtering the host inventory
    Discover(DiscoveryQuery),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disk(name: &str, claimed_by: Option<&str>) -> HostDisk {
        HostDisk {
            handle: DiskHandle::parse(name).unwrap(),
            display_name: format!("Local VMware Disk ({name})"),
            size_bytes: 1024,
            is_local: true,
            is_ssd: false,
            claimed_by: claimed_by.map(DatastoreId::new),
        }
    }

    #[test]
    fn parse_trims_and_rejects_blank_handles() {
        assert_eq!(
            DiskHandle::parse("  naa.600a  ").map(|handle| handle.to_string()),
            Some("naa.600a".to_string())
        );
        assert!(DiskHandle::parse("   ").is_none());
    }

    #[test]
    fn claimed_disk_is_usable_only_by_its_owner() {
        let owner = DatastoreId::new("ds-1");
        let other = DatastoreId::new("ds-2");
        let claimed = disk("naa.1", Some("ds-1"));

        assert!(!claimed.is_available());
        assert!(claimed.is_usable_by(Some(&owner)));
        assert!(!claimed.is_usable_by(Some(&other)));
        assert!(!claimed.is_usable_by(None));
        assert!(disk("naa.2", None).is_usable_by(None));
    }

    #[test]
    fn discovery_selection_defaults_missing_fields() {
        let json = r#"{"mode":"discover","value":{"host":"host-10"}}"#;
        let selection: DiskSelection = serde_json::from_str(json).unwrap();
        assert_eq!(
            selection,
            DiskSelection::Discover(DiscoveryQuery {
                host: HostRef::new("host-10"),
                filter: None,
                rescan: false,
            })
        );
    }
}
