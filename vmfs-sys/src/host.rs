// SPDX-License-Identifier: GPL-3.0-only

//! Host contracts backed by the ESXi shell
//!
//! `EsxcliHost` serves the host it runs on. Datastore ids are VMFS volume
//! UUIDs, which survive renames and extent additions.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use vmfs_contracts::{DatastoreOps, DatastoreOracle, HostDiskInventory, HostError, HostLookup};
use vmfs_types::{
    DatastoreId, DatastoreSpec, DatastoreState, DiskHandle, HostDisk, HostQuery, HostRef,
};

use crate::esxcli::{self, ExtentRow, FilesystemRow};
use crate::runner::CommandRunner;
use crate::{Result, SysError};

/// GPT partition type GUID for VMFS
pub const VMFS_PARTITION_GUID: &str = "AA31E02A400F11DB9590000C2911D1B8";

/// First usable sector for the VMFS partition (1 MiB aligned)
const PARTITION_START_SECTOR: u64 = 2048;

const DISK_DEVICE_ROOT: &str = "/vmfs/devices/disks";

fn device_path(disk: &DiskHandle) -> String {
    format!("{DISK_DEVICE_ROOT}/{disk}")
}

fn partition_path(disk: &DiskHandle) -> String {
    format!("{DISK_DEVICE_ROOT}/{disk}:1")
}

fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

/// Parse `partedUtil getUsableSectors` output ("34 20971486").
fn parse_usable_sectors(output: &str) -> Result<(u64, u64)> {
    let mut fields = output.split_whitespace().map(str::parse::<u64>);
    match (fields.next(), fields.next()) {
        (Some(Ok(first)), Some(Ok(last))) if last > first => Ok((first, last)),
        _ => Err(SysError::Parse {
            command: "partedUtil getUsableSectors".to_string(),
            reason: format!("unexpected sector range '{}'", output.trim()),
        }),
    }
}

pub struct EsxcliHost {
    runner: Arc<dyn CommandRunner>,
    vmfs_version: String,
}

impl EsxcliHost {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            vmfs_version: "vmfs6".to_string(),
        }
    }

    /// Filesystem version passed to `vmkfstools -C` (default "vmfs6").
    pub fn with_vmfs_version(mut self, version: impl Into<String>) -> Self {
        self.vmfs_version = version.into();
        self
    }

    async fn exec(&self, program: &'static str, arguments: Vec<String>) -> Result<String> {
        let runner = Arc::clone(&self.runner);
        tokio::task::spawn_blocking(move || runner.run(program, &arguments))
            .await
            .map_err(|error| SysError::Io(std::io::Error::other(error.to_string())))?
    }

    async fn esxcli(&self, namespace: &[&str]) -> Result<String> {
        let mut arguments = args(&["--formatter=csv"]);
        arguments.extend(args(namespace));
        self.exec("esxcli", arguments).await
    }

    async fn extents(&self) -> Result<Vec<ExtentRow>> {
        esxcli::parse_extents(&self.esxcli(&["storage", "vmfs", "extent", "list"]).await?)
    }

    async fn filesystems(&self) -> Result<Vec<FilesystemRow>> {
        let output = self.esxcli(&["storage", "filesystem", "list"]).await?;
        Ok(esxcli::parse_filesystems(&output)?
            .into_iter()
            .filter(FilesystemRow::is_vmfs)
            .collect())
    }

    async fn filesystem(&self, id: &DatastoreId) -> Result<FilesystemRow> {
        self.filesystems()
            .await?
            .into_iter()
            .find(|row| row.uuid == id.as_str())
            .ok_or_else(|| SysError::NotFound(format!("datastore {id}")))
    }

    /// Label `disk` GPT and create one VMFS partition spanning it.
    async fn partition(&self, disk: &DiskHandle) -> Result<()> {
        let device = device_path(disk);
        self.exec("partedUtil", args(&["mklabel", &device, "gpt"])).await?;
        let (_, last) =
            parse_usable_sectors(&self.exec("partedUtil", args(&["getUsableSectors", &device])).await?)?;
        let table = format!("1 {PARTITION_START_SECTOR} {last} {VMFS_PARTITION_GUID} 0");
        self.exec("partedUtil", args(&["setptbl", &device, "gpt", &table]))
            .await?;
        tracing::debug!("Partitioned {} for VMFS (sectors {}..{})", disk, PARTITION_START_SECTOR, last);
        Ok(())
    }

    async fn span(&self, head: &DiskHandle, disk: &DiskHandle) -> Result<()> {
        self.partition(disk).await?;
        self.exec(
            "vmkfstools",
            args(&["-Z", &partition_path(disk), &partition_path(head)]),
        )
        .await?;
        tracing::info!("Spanned VMFS on {} onto {}", head, disk);
        Ok(())
    }

    async fn head_extent(&self, id: &DatastoreId) -> Result<DiskHandle> {
        esxcli::extents_of(&self.extents().await?, id.as_str())
            .into_iter()
            .next()
            .ok_or_else(|| SysError::NotFound(format!("datastore {id}")))
    }

    async fn create_datastore(&self, spec: &DatastoreSpec) -> Result<DatastoreId> {
        let Some((head, rest)) = spec.disks.split_first() else {
            return Err(SysError::Parse {
                command: "vmkfstools -C".to_string(),
                reason: "no disks requested".to_string(),
            });
        };

        if self
            .filesystems()
            .await?
            .iter()
            .any(|row| row.volume_name == spec.name)
        {
            return Err(SysError::Conflict(format!(
                "a datastore named '{}' already exists",
                spec.name
            )));
        }

        self.partition(head).await?;
        self.exec(
            "vmkfstools",
            args(&["-C", &self.vmfs_version, "-S", &spec.name, &partition_path(head)]),
        )
        .await?;
        tracing::info!("Created VMFS '{}' on {}", spec.name, head);

        let id = self
            .extents()
            .await?
            .into_iter()
            .find(|row| row.device_name == head.as_str() && row.extent_number == 0)
            .map(|row| DatastoreId::new(row.vmfs_uuid))
            .ok_or_else(|| SysError::NotFound(format!("VMFS volume on {head}")))?;

        for disk in rest {
            if let Err(error) = self.span(head, disk).await {
                return Err(self.abandon_create(&id, &spec.name, error).await);
            }
        }

        Ok(id)
    }

    /// Destroy a volume whose create failed part way.
    ///
    /// Returns `error` unchanged once the volume is gone; otherwise wraps it
    /// with the volume UUID so the caller can still find it.
    async fn abandon_create(&self, id: &DatastoreId, name: &str, error: SysError) -> SysError {
        tracing::warn!("Create of '{}' failed after formatting {}, destroying it: {}", name, id, error);
        match self
            .exec("vim-cmd", args(&["hostsvc/datastore/destroy", name]))
            .await
        {
            Ok(_) => error,
            Err(cleanup) => {
                tracing::error!("Could not destroy partial VMFS volume {}: {}", id, cleanup);
                SysError::VolumeLeftBehind {
                    uuid: id.to_string(),
                    source: Box::new(error),
                }
            }
        }
    }

    async fn extend_datastore(&self, id: &DatastoreId, disks: &[DiskHandle]) -> Result<()> {
        let head = self.head_extent(id).await?;
        for disk in disks {
            self.span(&head, disk).await?;
        }
        Ok(())
    }

    async fn rename_datastore(&self, id: &DatastoreId, name: &str) -> Result<()> {
        let current = self.filesystem(id).await?;
        self.exec(
            "vim-cmd",
            args(&["hostsvc/datastore/rename", &current.volume_name, name]),
        )
        .await?;
        tracing::info!("Renamed datastore {} from '{}' to '{}'", id, current.volume_name, name);
        Ok(())
    }

    async fn delete_datastore(&self, id: &DatastoreId) -> Result<()> {
        let current = self.filesystem(id).await?;
        self.exec(
            "vim-cmd",
            args(&["hostsvc/datastore/destroy", &current.volume_name]),
        )
        .await?;
        tracing::info!("Destroyed datastore {} ('{}')", id, current.volume_name);
        Ok(())
    }

    async fn describe_datastore(&self, id: &DatastoreId) -> Result<DatastoreState> {
        let filesystem = self.filesystem(id).await?;
        let extents = esxcli::extents_of(&self.extents().await?, id.as_str());
        let host = self.local_host().await?;

        Ok(DatastoreState {
            id: id.clone(),
            name: filesystem.volume_name.clone(),
            host,
            extents,
            summary: filesystem.summary(),
        })
    }

    async fn local_host(&self) -> Result<HostRef> {
        let hostname = esxcli::parse_hostname(&self.esxcli(&["system", "hostname", "get"]).await?)?;
        let name = if hostname.fqdn.is_empty() {
            hostname.host_name
        } else {
            hostname.fqdn
        };
        Ok(HostRef::new(name))
    }

    async fn inventory(&self) -> Result<Vec<HostDisk>> {
        let devices =
            esxcli::parse_devices(&self.esxcli(&["storage", "core", "device", "list"]).await?)?;
        let claims: HashMap<String, String> = self
            .extents()
            .await?
            .into_iter()
            .map(|row| (row.device_name, row.vmfs_uuid))
            .collect();

        Ok(devices
            .into_iter()
            .filter(|device| device.is_disk())
            .filter_map(|device| {
                let handle = DiskHandle::parse(&device.device)?;
                Some(HostDisk {
                    claimed_by: claims.get(handle.as_str()).map(DatastoreId::new),
                    size_bytes: device.size_bytes(),
                    display_name: device.display_name,
                    is_local: device.is_local,
                    is_ssd: device.is_ssd,
                    handle,
                })
            })
            .collect())
    }
}

#[async_trait]
impl HostLookup for EsxcliHost {
    async fn resolve_host(&self, query: &HostQuery) -> std::result::Result<HostRef, HostError> {
        let hostname = esxcli::parse_hostname(&self.esxcli(&["system", "hostname", "get"]).await?)?;
        if query.name != hostname.fqdn && query.name != hostname.host_name {
            return Err(HostError::not_found(format!(
                "host '{}' (this shell serves '{}')",
                query.name, hostname.fqdn
            )));
        }
        if let Some(datacenter) = &query.datacenter {
            tracing::debug!("Standalone host: ignoring datacenter '{}'", datacenter);
        }
        Ok(HostRef::new(if hostname.fqdn.is_empty() {
            hostname.host_name
        } else {
            hostname.fqdn
        }))
    }
}

#[async_trait]
impl HostDiskInventory for EsxcliHost {
    async fn list_disks(&self, host: &HostRef) -> std::result::Result<Vec<HostDisk>, HostError> {
        tracing::debug!("Listing disks on {}", host);
        Ok(self.inventory().await?)
    }

    async fn rescan(&self, host: &HostRef) -> std::result::Result<(), HostError> {
        tracing::info!("Rescanning storage adapters on {}", host);
        self.esxcli(&["storage", "core", "adapter", "rescan", "--all"])
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DatastoreOracle for EsxcliHost {
    async fn describe(&self, id: &DatastoreId) -> std::result::Result<DatastoreState, HostError> {
        Ok(self.describe_datastore(id).await?)
    }
}

#[async_trait]
impl DatastoreOps for EsxcliHost {
    async fn create(&self, spec: &DatastoreSpec) -> std::result::Result<DatastoreId, HostError> {
        Ok(self.create_datastore(spec).await?)
    }

    async fn extend(
        &self,
        id: &DatastoreId,
        disks: &[DiskHandle],
    ) -> std::result::Result<(), HostError> {
        Ok(self.extend_datastore(id, disks).await?)
    }

    async fn rename(&self, id: &DatastoreId, name: &str) -> std::result::Result<(), HostError> {
        Ok(self.rename_datastore(id, name).await?)
    }

    async fn delete(&self, id: &DatastoreId) -> std::result::Result<(), HostError> {
        Ok(self.delete_datastore(id).await?)
    }
}
