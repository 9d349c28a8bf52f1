// SPDX-License-Identifier: GPL-3.0-only

//! Parsers for `esxcli --formatter=csv` output
//!
//! Every listing starts with a header row. Header names are matched with
//! spaces removed so "Device Name" and "DeviceName" both resolve.

use std::collections::BTreeMap;

use vmfs_types::{DatastoreSummary, DiskHandle, mib_to_bytes};

use crate::{Result, SysError};

/// Row of `esxcli storage core device list`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRow {
    pub device: String,
    pub display_name: String,
    pub size_mib: u64,
    pub device_type: String,
    pub is_local: bool,
    pub is_ssd: bool,
}

/// Row of `esxcli storage vmfs extent list`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtentRow {
    pub volume_name: String,
    pub vmfs_uuid: String,
    pub extent_number: u32,
    pub device_name: String,
}

/// Row of `esxcli storage filesystem list`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilesystemRow {
    pub mount_point: String,
    pub volume_name: String,
    pub uuid: String,
    pub mounted: bool,
    pub fs_type: String,
    pub size_bytes: u64,
    pub free_bytes: u64,
}

impl FilesystemRow {
    pub fn is_vmfs(&self) -> bool {
        self.fs_type.to_ascii_uppercase().starts_with("VMFS")
    }

    pub fn summary(&self) -> DatastoreSummary {
        DatastoreSummary {
            capacity_bytes: self.size_bytes,
            free_bytes: self.free_bytes,
            uncommitted_bytes: 0,
            url: format!("ds://{}/", self.mount_point.trim_end_matches('/')),
            accessible: self.mounted,
            multiple_host_access: false,
            maintenance_mode: "normal".to_string(),
        }
    }
}

/// Row of `esxcli system hostname get`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostnameRow {
    pub host_name: String,
    pub fqdn: String,
}

fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(character) = chars.next() {
        match character {
            '"' if quoted && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut current).trim().to_string()),
            other => current.push(other),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

fn header_key(raw: &str) -> String {
    raw.chars()
        .filter(|character| !character.is_whitespace())
        .collect()
}

/// Split CSV output into header-keyed records.
///
/// Trailing empty columns (esxcli ends each line with a comma) are ignored.
pub fn parse_records(output: &str) -> Vec<BTreeMap<String, String>> {
    let mut lines = output.lines().filter(|line| !line.trim().is_empty());
    let Some(header) = lines.next() else {
        return Vec::new();
    };
    let headers: Vec<String> = split_csv_line(header)
        .iter()
        .map(|value| header_key(value))
        .collect();

    lines
        .map(|line| {
            headers
                .iter()
                .zip(split_csv_line(line))
                .filter(|(key, _)| !key.is_empty())
                .map(|(key, value)| (key.clone(), value))
                .collect()
        })
        .collect()
}

fn field<'a>(record: &'a BTreeMap<String, String>, key: &str) -> &'a str {
    record.get(key).map(String::as_str).unwrap_or("")
}

fn flag(record: &BTreeMap<String, String>, key: &str) -> bool {
    field(record, key).eq_ignore_ascii_case("true")
}

fn number<T: std::str::FromStr>(command: &str, record: &BTreeMap<String, String>, key: &str) -> Result<T> {
    let raw = field(record, key);
    raw.parse().map_err(|_| SysError::Parse {
        command: command.to_string(),
        reason: format!("{key} is not a number: '{raw}'"),
    })
}

pub fn parse_devices(output: &str) -> Result<Vec<DeviceRow>> {
    const COMMAND: &str = "esxcli storage core device list";
    parse_records(output)
        .iter()
        .filter(|record| !field(record, "Device").is_empty())
        .map(|record| {
            Ok(DeviceRow {
                device: field(record, "Device").to_string(),
                display_name: field(record, "DisplayName").to_string(),
                size_mib: number(COMMAND, record, "Size")?,
                device_type: field(record, "DeviceType").to_string(),
                is_local: flag(record, "IsLocal"),
                is_ssd: flag(record, "IsSSD"),
            })
        })
        .collect()
}

pub fn parse_extents(output: &str) -> Result<Vec<ExtentRow>> {
    const COMMAND: &str = "esxcli storage vmfs extent list";
    parse_records(output)
        .iter()
        .filter(|record| !field(record, "VMFSUUID").is_empty())
        .map(|record| {
            Ok(ExtentRow {
                volume_name: field(record, "VolumeName").to_string(),
                vmfs_uuid: field(record, "VMFSUUID").to_string(),
                extent_number: number(COMMAND, record, "ExtentNumber")?,
                device_name: field(record, "DeviceName").to_string(),
            })
        })
        .collect()
}

pub fn parse_filesystems(output: &str) -> Result<Vec<FilesystemRow>> {
    const COMMAND: &str = "esxcli storage filesystem list";
    parse_records(output)
        .iter()
        .filter(|record| !field(record, "UUID").is_empty())
        .map(|record| {
            Ok(FilesystemRow {
                mount_point: field(record, "MountPoint").to_string(),
                volume_name: field(record, "VolumeName").to_string(),
                uuid: field(record, "UUID").to_string(),
                mounted: flag(record, "Mounted"),
                fs_type: field(record, "Type").to_string(),
                size_bytes: number(COMMAND, record, "Size")?,
                free_bytes: number(COMMAND, record, "Free")?,
            })
        })
        .collect()
}

pub fn parse_hostname(output: &str) -> Result<HostnameRow> {
    parse_records(output)
        .first()
        .map(|record| HostnameRow {
            host_name: field(record, "HostName").to_string(),
            fqdn: field(record, "FullyQualifiedDomainName").to_string(),
        })
        .ok_or_else(|| SysError::Parse {
            command: "esxcli system hostname get".to_string(),
            reason: "no hostname record".to_string(),
        })
}

/// Extents of datastore `uuid`, head extent first.
pub fn extents_of(rows: &[ExtentRow], uuid: &str) -> Vec<DiskHandle> {
    let mut owned: Vec<&ExtentRow> = rows.iter().filter(|row| row.vmfs_uuid == uuid).collect();
    owned.sort_by_key(|row| row.extent_number);
    owned
        .into_iter()
        .filter_map(|row| DiskHandle::parse(&row.device_name))
        .collect()
}

impl DeviceRow {
    pub fn size_bytes(&self) -> u64 {
        mib_to_bytes(self.size_mib)
    }

    /// Only block devices can carry a VMFS partition.
    pub fn is_disk(&self) -> bool {
        self.device_type.is_empty() || self.device_type.eq_ignore_ascii_case("Direct-Access")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICES: &str = "Device,DisplayName,Size,DeviceType,IsLocal,IsSSD,\n\
        naa.6000c29a,\"Local VMware Disk (naa.6000c29a)\",16384,Direct-Access,true,false,\n\
        mpx.vmhba32:C0:T0:L0,\"Local NECVMWar CD-ROM (mpx.vmhba32:C0:T0:L0)\",0,CD-ROM,true,false,\n";

    const EXTENTS: &str = "Volume Name,VMFS UUID,Extent Number,Device Name,Partition,\n\
        datastore1,5f1d0a5e-11aa,0,naa.6000c29z,3,\n\
        terraform-test,60aa11bb-22cc,1,naa.6000c29c,1,\n\
        terraform-test,60aa11bb-22cc,0,naa.6000c29b,1,\n";

    #[test]
    fn quoted_fields_keep_commas() {
        assert_eq!(
            split_csv_line("a,\"b, c\",\"d \"\"e\"\"\","),
            vec!["a", "b, c", "d \"e\"", ""]
        );
    }

    #[test]
    fn devices_parse_with_types_and_flags() {
        let devices = parse_devices(DEVICES).unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].device, "naa.6000c29a");
        assert_eq!(devices[0].display_name, "Local VMware Disk (naa.6000c29a)");
        assert_eq!(devices[0].size_bytes(), 16384 * 1024 * 1024);
        assert!(devices[0].is_disk());
        assert!(!devices[1].is_disk());
    }

    #[test]
    fn spaced_headers_resolve_and_extents_sort_by_number() {
        let extents = parse_extents(EXTENTS).unwrap();
        let handles: Vec<String> = extents_of(&extents, "60aa11bb-22cc")
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(handles, vec!["naa.6000c29b", "naa.6000c29c"]);
        assert!(extents_of(&extents, "unknown").is_empty());
    }

    #[test]
    fn malformed_numbers_are_reported() {
        let error = parse_devices("Device,Size\nnaa.1,lots\n").unwrap_err();
        assert!(error.to_string().contains("Size"));
    }

    #[test]
    fn filesystem_summary_builds_datastore_url() {
        let rows = parse_filesystems(
            "Mount Point,Volume Name,UUID,Mounted,Type,Size,Free\n\
             /vmfs/volumes/60aa11bb-22cc,terraform-test,60aa11bb-22cc,true,VMFS-6,10737418240,9663676416\n",
        )
        .unwrap();
        let summary = rows[0].summary();
        assert!(rows[0].is_vmfs());
        assert_eq!(summary.url, "ds:///vmfs/volumes/60aa11bb-22cc/");
        assert_eq!(summary.used_bytes(), 1073741824);
        assert!(summary.accessible);
    }
}
