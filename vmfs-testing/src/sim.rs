// SPDX-License-Identifier: GPL-3.0-only

//! In-process ESXi host
//!
//! `SimulatedHost` implements every host contract over an in-memory
//! inventory so the reconciler and the acceptance scenarios run without a
//! real host. Faults are injected per operation kind and consumed once.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use vmfs_contracts::{
    DatastoreOps, DatastoreOracle, HostDiskInventory, HostError, HostErrorKind, HostLookup,
    OperationKind,
};
use vmfs_types::{
    DatastoreId, DatastoreSpec, DatastoreState, DatastoreSummary, DiskHandle, HostDisk, HostQuery,
    HostRef,
};

use crate::config::AcceptanceConfig;

const GIB: u64 = 1024 * 1024 * 1024;

/// Space VMFS keeps for its own metadata, per extent
const EXTENT_OVERHEAD_BYTES: u64 = 512 * 1024 * 1024;

#[derive(Debug, Clone)]
struct SimDisk {
    handle: DiskHandle,
    size_bytes: u64,
    is_ssd: bool,
    visible: bool,
}

#[derive(Debug, Clone)]
struct SimDatastore {
    name: String,
    extents: Vec<DiskHandle>,
}

#[derive(Debug, Default)]
struct SimState {
    disks: Vec<SimDisk>,
    datastores: BTreeMap<DatastoreId, SimDatastore>,
    next_id: u64,
    faults: Vec<(OperationKind, HostError)>,
    empty_creates: usize,
    rescans: usize,
    history: Vec<String>,
}

impl SimState {
    fn take_fault(&mut self, operation: OperationKind) -> Result<(), HostError> {
        match self.faults.iter().position(|(kind, _)| *kind == operation) {
            Some(index) => Err(self.faults.remove(index).1),
            None => Ok(()),
        }
    }

    fn disk(&self, handle: &DiskHandle) -> Option<&SimDisk> {
        self.disks
            .iter()
            .find(|disk| disk.visible && &disk.handle == handle)
    }

    fn owner_of(&self, handle: &DiskHandle) -> Option<&DatastoreId> {
        self.datastores
            .iter()
            .find(|(_, datastore)| datastore.extents.contains(handle))
            .map(|(id, _)| id)
    }

    /// Check `disks` can join `target` (or a new datastore when `None`).
    fn check_free(&self, disks: &[DiskHandle], target: Option<&DatastoreId>) -> Result<(), HostError> {
        for handle in disks {
            if self.disk(handle).is_none() {
                return Err(HostError::new(
                    HostErrorKind::InvalidInput,
                    format!("disk {handle} is not attached to this host"),
                ));
            }
            if let Some(owner) = self.owner_of(handle)
                && Some(owner) != target
            {
                return Err(HostError::new(
                    HostErrorKind::Conflict,
                    format!("disk {handle} is in use by datastore {owner}"),
                ));
            }
        }
        Ok(())
    }

    fn check_name(&self, name: &str, except: Option<&DatastoreId>) -> Result<(), HostError> {
        let taken = self
            .datastores
            .iter()
            .any(|(id, datastore)| datastore.name == name && Some(id) != except);
        if taken {
            return Err(HostError::new(
                HostErrorKind::Conflict,
                format!("a datastore named '{name}' already exists"),
            ));
        }
        Ok(())
    }

    fn summary(&self, id: &DatastoreId, datastore: &SimDatastore) -> DatastoreSummary {
        let capacity_bytes: u64 = datastore
            .extents
            .iter()
            .filter_map(|handle| self.disks.iter().find(|disk| &disk.handle == handle))
            .map(|disk| disk.size_bytes)
            .sum();
        let overhead = EXTENT_OVERHEAD_BYTES * datastore.extents.len() as u64;

        DatastoreSummary {
            capacity_bytes,
            free_bytes: capacity_bytes.saturating_sub(overhead),
            uncommitted_bytes: 0,
            url: format!("ds:///vmfs/volumes/{id}/"),
            accessible: true,
            multiple_host_access: false,
            maintenance_mode: "normal".to_string(),
        }
    }
}

pub struct SimulatedHost {
    host: HostRef,
    datacenter: Option<String>,
    latency: Option<Duration>,
    state: Mutex<SimState>,
}

impl SimulatedHost {
    pub fn new(host: impl Into<String>, datacenter: Option<&str>) -> Self {
        Self {
            host: HostRef::new(host),
            datacenter: datacenter.map(str::to_string),
            latency: None,
            state: Mutex::new(SimState {
                next_id: 1,
                ..SimState::default()
            }),
        }
    }

    /// Host seeded with the configured disks plus a local boot datastore.
    pub fn from_config(config: &AcceptanceConfig) -> Self {
        let host = config.esxi_host.as_deref().unwrap_or("esxi-01.lab.local");
        let mut simulated = Self::new(host, config.datacenter()).with_boot_datastore();
        for disk in &config.disks {
            simulated = simulated.with_disk(disk, 16);
        }
        simulated
    }

    pub fn host_ref(&self) -> &HostRef {
        &self.host
    }

    /// Attach a visible, unclaimed disk of `size_gib`.
    pub fn with_disk(self, handle: &str, size_gib: u64) -> Self {
        self.attach(handle, size_gib, true)
    }

    /// Attach a disk that only shows up after a rescan.
    pub fn with_pending_disk(self, handle: &str, size_gib: u64) -> Self {
        self.attach(handle, size_gib, false)
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn with_boot_datastore(self) -> Self {
        let boot = "mpx.vmhba0:C0:T0:L0";
        let simulated = self.with_disk(boot, 32);
        {
            let mut state = simulated.lock();
            if let Some(handle) = DiskHandle::parse(boot) {
                state.datastores.insert(
                    DatastoreId::new("datastore-0"),
                    SimDatastore {
                        name: "datastore1".to_string(),
                        extents: vec![handle],
                    },
                );
            }
        }
        simulated
    }

    fn attach(self, handle: &str, size_gib: u64, visible: bool) -> Self {
        if let Some(handle) = DiskHandle::parse(handle) {
            let mut state = self.lock();
            state.disks.retain(|disk| disk.handle != handle);
            let is_ssd = state.disks.len() % 2 == 1;
            state.disks.push(SimDisk {
                handle,
                size_bytes: size_gib * GIB,
                is_ssd,
                visible,
            });
        }
        self
    }

    /// Make the next `operation` fail with `error`.
    pub fn fail_next(&self, operation: OperationKind, error: HostError) {
        self.lock().faults.push((operation, error));
    }

    /// Make the next create report success but leave the datastore without extents.
    pub fn leave_next_create_empty(&self) {
        self.lock().empty_creates += 1;
    }

    pub fn rescan_count(&self) -> usize {
        self.lock().rescans
    }

    /// Mutating operations applied so far, e.g. "extend datastore-1 [naa.1]".
    pub fn history(&self) -> Vec<String> {
        self.lock().history.clone()
    }

    pub fn datastore_ids(&self) -> Vec<DatastoreId> {
        self.lock().datastores.keys().cloned().collect()
    }

    /// Add extents behind the reconciler's back.
    pub fn force_extents(&self, id: &DatastoreId, disks: &[DiskHandle]) {
        if let Some(datastore) = self.lock().datastores.get_mut(id) {
            datastore.extents.extend(disks.iter().cloned());
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn settle(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn check_host(&self, host: &HostRef) -> Result<(), HostError> {
        if host == &self.host {
            Ok(())
        } else {
            Err(HostError::new(
                HostErrorKind::InvalidInput,
                format!("unknown host {host}"),
            ))
        }
    }

    fn not_found(id: &DatastoreId) -> HostError {
        HostError::not_found(format!("datastore {id}"))
    }
}

fn join(disks: &[DiskHandle]) -> String {
    disks
        .iter()
        .map(DiskHandle::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[async_trait]
impl HostLookup for SimulatedHost {
    async fn resolve_host(&self, query: &HostQuery) -> Result<HostRef, HostError> {
        let datacenter_matches = match (&query.datacenter, &self.datacenter) {
            (Some(requested), Some(actual)) => requested == actual,
            _ => true,
        };
        if query.name == self.host.as_str() && datacenter_matches {
            Ok(self.host.clone())
        } else {
            Err(HostError::not_found(format!("host '{}'", query.name)))
        }
    }
}

#[async_trait]
impl HostDiskInventory for SimulatedHost {
    async fn list_disks(&self, host: &HostRef) -> Result<Vec<HostDisk>, HostError> {
        self.check_host(host)?;
        let state = self.lock();
        Ok(state
            .disks
            .iter()
            .filter(|disk| disk.visible)
            .map(|disk| HostDisk {
                handle: disk.handle.clone(),
                display_name: format!("Local VMware Disk ({})", disk.handle),
                size_bytes: disk.size_bytes,
                is_local: true,
                is_ssd: disk.is_ssd,
                claimed_by: state.owner_of(&disk.handle).cloned(),
            })
            .collect())
    }

    async fn rescan(&self, host: &HostRef) -> Result<(), HostError> {
        self.check_host(host)?;
        self.settle().await;
        let mut state = self.lock();
        state.rescans += 1;
        for disk in &mut state.disks {
            disk.visible = true;
        }
        Ok(())
    }
}

#[async_trait]
impl DatastoreOracle for SimulatedHost {
    async fn describe(&self, id: &DatastoreId) -> Result<DatastoreState, HostError> {
        let mut state = self.lock();
        state.take_fault(OperationKind::Describe)?;
        let datastore = state.datastores.get(id).ok_or_else(|| Self::not_found(id))?;

        Ok(DatastoreState {
            id: id.clone(),
            name: datastore.name.clone(),
            host: self.host.clone(),
            extents: datastore.extents.clone(),
            summary: state.summary(id, datastore),
        })
    }
}

#[async_trait]
impl DatastoreOps for SimulatedHost {
    async fn create(&self, spec: &DatastoreSpec) -> Result<DatastoreId, HostError> {
        self.check_host(&spec.host)?;
        self.settle().await;
        let mut state = self.lock();
        state.take_fault(OperationKind::Create)?;
        state.check_name(&spec.name, None)?;
        state.check_free(&spec.disks, None)?;

        let id = DatastoreId::new(format!("datastore-{}", state.next_id));
        state.next_id += 1;

        let extents = if state.empty_creates > 0 {
            state.empty_creates -= 1;
            Vec::new()
        } else {
            spec.disks.clone()
        };
        state.history.push(format!("create {id} [{}]", join(&extents)));
        state.datastores.insert(
            id.clone(),
            SimDatastore {
                name: spec.name.clone(),
                extents,
            },
        );
        Ok(id)
    }

    async fn extend(&self, id: &DatastoreId, disks: &[DiskHandle]) -> Result<(), HostError> {
        self.settle().await;
        let mut state = self.lock();
        state.take_fault(OperationKind::Extend)?;
        if !state.datastores.contains_key(id) {
            return Err(Self::not_found(id));
        }
        state.check_free(disks, Some(id))?;

        state.history.push(format!("extend {id} [{}]", join(disks)));
        if let Some(datastore) = state.datastores.get_mut(id) {
            for disk in disks {
                if !datastore.extents.contains(disk) {
                    datastore.extents.push(disk.clone());
                }
            }
        }
        Ok(())
    }

    async fn rename(&self, id: &DatastoreId, name: &str) -> Result<(), HostError> {
        self.settle().await;
        let mut state = self.lock();
        state.take_fault(OperationKind::Rename)?;
        if !state.datastores.contains_key(id) {
            return Err(Self::not_found(id));
        }
        state.check_name(name, Some(id))?;

        state.history.push(format!("rename {id} '{name}'"));
        if let Some(datastore) = state.datastores.get_mut(id) {
            datastore.name = name.to_string();
        }
        Ok(())
    }

    async fn delete(&self, id: &DatastoreId) -> Result<(), HostError> {
        self.settle().await;
        let mut state = self.lock();
        state.take_fault(OperationKind::Delete)?;
        if state.datastores.remove(id).is_none() {
            return Err(Self::not_found(id));
        }
        state.history.push(format!("delete {id}"));
        Ok(())
    }
}
