// SPDX-License-Identifier: GPL-3.0-only

//! Disk set resolution
//!
//! Turns a configured disk list or a discovery query into canonical handles
//! that are present on the host and free to back the datastore.

use std::collections::HashSet;
use std::sync::Arc;

use regex::Regex;
use vmfs_contracts::HostDiskInventory;
use vmfs_types::{DatastoreId, DiscoveryQuery, DiskHandle, DiskSelection, HostDisk, HostRef};

use crate::error::{DatastoreError, Result};

pub struct DiskSetResolver {
    inventory: Arc<dyn HostDiskInventory>,
}

impl DiskSetResolver {
    pub fn new(inventory: Arc<dyn HostDiskInventory>) -> Self {
        Self { inventory }
    }

    /// Resolve `selection` for a datastore on `host`.
    ///
    /// `owner` is the datastore being reconciled, if it exists already; disks
    /// it owns count as available so an update can restate them.
    pub async fn resolve(
        &self,
        host: &HostRef,
        selection: &DiskSelection,
        owner: Option<&DatastoreId>,
    ) -> Result<Vec<DiskHandle>> {
        match selection {
            DiskSelection::Explicit(disks) => self.resolve_explicit(host, disks, owner).await,
            DiskSelection::Discover(query) => self.discover(query, owner).await,
        }
    }

    /// Validate an explicit list. Order is kept, later duplicates are dropped.
    pub async fn resolve_explicit(
        &self,
        host: &HostRef,
        disks: &[String],
        owner: Option<&DatastoreId>,
    ) -> Result<Vec<DiskHandle>> {
        let requested = dedupe_handles(host, disks)?;
        let inventory = self.list(host).await?;

        for handle in &requested {
            let entry = inventory
                .iter()
                .find(|disk| &disk.handle == handle)
                .ok_or_else(|| DatastoreError::DiskNotFound {
                    host: host.clone(),
                    disk: handle.to_string(),
                })?;

            if !entry.is_usable_by(owner)
                && let Some(claimed_by) = &entry.claimed_by
            {
                return Err(DatastoreError::DiskInUse {
                    host: host.clone(),
                    disk: handle.clone(),
                    claimed_by: claimed_by.clone(),
                });
            }
        }

        tracing::debug!("Resolved {} explicit disks on host {}", requested.len(), host);
        Ok(requested)
    }

    /// Find disks whose canonical name matches the query filter.
    ///
    /// Only unclaimed disks and disks already backing `owner` qualify.
    /// Results are sorted by canonical name, so a fixed inventory always
    /// yields the same list.
    pub async fn discover(
        &self,
        query: &DiscoveryQuery,
        owner: Option<&DatastoreId>,
    ) -> Result<Vec<DiskHandle>> {
        // Compile before rescanning so a bad filter has no side effects.
        let filter = compile_filter(query.filter.as_deref())?;

        if query.rescan {
            tracing::info!("Rescanning storage adapters on host {}", query.host);
            self.inventory
                .rescan(&query.host)
                .await
                .map_err(DatastoreError::Host)?;
        }

        let inventory = self.list(&query.host).await?;
        let mut matched: Vec<DiskHandle> = inventory
            .into_iter()
            .filter(|disk| disk.is_usable_by(owner))
            .filter(|disk| {
                filter
                    .as_ref()
                    .is_none_or(|regex| regex.is_match(disk.handle.as_str()))
            })
            .map(|disk| disk.handle)
            .collect();

        matched.sort();
        matched.dedup();

        if matched.is_empty() {
            return Err(DatastoreError::NoMatch {
                host: query.host.clone(),
                filter: query.filter.clone(),
            });
        }

        tracing::debug!(
            "Discovered {} disks on host {} (filter {:?})",
            matched.len(),
            query.host,
            query.filter
        );
        Ok(matched)
    }

    async fn list(&self, host: &HostRef) -> Result<Vec<HostDisk>> {
        self.inventory
            .list_disks(host)
            .await
            .map_err(DatastoreError::Host)
    }
}

fn dedupe_handles(host: &HostRef, disks: &[String]) -> Result<Vec<DiskHandle>> {
    let mut seen = HashSet::new();
    let mut handles = Vec::with_capacity(disks.len());

    for raw in disks {
        let handle = DiskHandle::parse(raw).ok_or_else(|| DatastoreError::DiskNotFound {
            host: host.clone(),
            disk: raw.clone(),
        })?;
        if seen.insert(handle.clone()) {
            handles.push(handle);
        } else {
            tracing::debug!("Ignoring duplicate disk {} in request", handle);
        }
    }

    Ok(handles)
}

fn compile_filter(filter: Option<&str>) -> Result<Option<Regex>> {
    match filter {
        None => Ok(None),
        Some(pattern) if pattern.is_empty() => Ok(None),
        Some(pattern) => Regex::new(pattern)
            .map(Some)
            .map_err(|error| DatastoreError::InvalidFilter {
                filter: pattern.to_string(),
                reason: error.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> HostRef {
        HostRef::new("host-10")
    }

    #[test]
    fn dedupe_keeps_first_occurrence_order() {
        let raw = vec![
            "naa.2".to_string(),
            " naa.0 ".to_string(),
            "naa.2".to_string(),
            "naa.1".to_string(),
        ];
        let handles: Vec<String> = dedupe_handles(&host(), &raw)
            .unwrap()
            .into_iter()
            .map(|handle| handle.to_string())
            .collect();
        assert_eq!(handles, vec!["naa.2", "naa.0", "naa.1"]);
    }

    #[test]
    fn blank_disk_entries_are_not_found() {
        let error = dedupe_handles(&host(), &["  ".to_string()]).unwrap_err();
        assert!(matches!(error, DatastoreError::DiskNotFound { .. }));
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(compile_filter(None).unwrap().is_none());
        assert!(compile_filter(Some("")).unwrap().is_none());
        assert!(compile_filter(Some("^naa\\.")).unwrap().is_some());
    }

    #[test]
    fn invalid_filter_is_reported() {
        let error = compile_filter(Some("naa.(")).unwrap_err();
        assert!(matches!(error, DatastoreError::InvalidFilter { .. }));
    }
}
