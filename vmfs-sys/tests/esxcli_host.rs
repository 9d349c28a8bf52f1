// SPDX-License-Identifier: GPL-3.0-only

use std::sync::{Arc, Mutex};

use vmfs_contracts::{DatastoreOps, DatastoreOracle, HostDiskInventory, HostErrorKind, HostLookup};
use vmfs_sys::{CommandRunner, EsxcliHost, Result, SysError, VMFS_PARTITION_GUID};
use vmfs_types::{DatastoreId, DatastoreSpec, DiskHandle, HostQuery, HostRef};

const HOSTNAME: &str = "Domain Name,Fully Qualified Domain Name,Host Name\n\
    lab.local,esxi-01.lab.local,esxi-01\n";

const DEVICES: &str = "Device,Display Name,Size,Device Type,Is Local,Is SSD\n\
    naa.6000c29a,Local VMware Disk (naa.6000c29a),16384,Direct-Access,true,false\n\
    naa.6000c29b,Local VMware Disk (naa.6000c29b),16384,Direct-Access,true,true\n\
    naa.6000c29z,Local VMware Disk (naa.6000c29z),32768,Direct-Access,true,false\n";

const EXTENTS: &str = "Volume Name,VMFS UUID,Extent Number,Device Name,Partition\n\
    datastore1,5f1d0a5e-11aa,0,naa.6000c29z,3\n\
    terraform-test,60aa11bb-22cc,0,naa.6000c29a,1\n";

const FILESYSTEMS: &str = "Mount Point,Volume Name,UUID,Mounted,Type,Size,Free\n\
    /vmfs/volumes/5f1d0a5e-11aa,datastore1,5f1d0a5e-11aa,true,VMFS-6,32212254720,30064771072\n\
    /vmfs/volumes/60aa11bb-22cc,terraform-test,60aa11bb-22cc,true,VMFS-6,16911433728,15837691904\n\
    /vmfs/volumes/6a3e-bootbank,BOOTBANK1,6a3e-bootbank,true,vfat,4293591040,4022075392\n";

/// Replays canned esxcli listings and records every invocation.
#[derive(Default)]
struct ScriptedRunner {
    calls: Mutex<Vec<String>>,
    extents: Mutex<String>,
    fail_on: &'static [&'static str],
}

impl ScriptedRunner {
    fn new() -> Self {
        Self {
            extents: Mutex::new(EXTENTS.to_string()),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<String> {
        let line = format!("{program} {}", args.join(" "));
        self.calls.lock().unwrap().push(line.clone());

        if self.fail_on.iter().any(|pattern| line.contains(pattern)) {
            return Err(SysError::CommandFailed {
                command: line,
                stderr: "Device or resource busy".to_string(),
            });
        }

        let output = match line.as_str() {
            "esxcli --formatter=csv system hostname get" => HOSTNAME.to_string(),
            "esxcli --formatter=csv storage core device list" => DEVICES.to_string(),
            "esxcli --formatter=csv storage vmfs extent list" => self.extents.lock().unwrap().clone(),
            "esxcli --formatter=csv storage filesystem list" => FILESYSTEMS.to_string(),
            other if other.starts_with("partedUtil getUsableSectors") => "34 33554398".to_string(),
            other if other.starts_with("vmkfstools -C") => {
                self.extents
                    .lock()
                    .unwrap()
                    .push_str("terraform-new,70bb22cc-33dd,0,naa.6000c29b,1\n");
                String::new()
            }
            _ => String::new(),
        };
        Ok(output)
    }
}

fn handle(name: &str) -> DiskHandle {
    DiskHandle::parse(name).unwrap()
}

#[tokio::test]
async fn describe_reports_extents_and_summary() {
    let host = EsxcliHost::new(Arc::new(ScriptedRunner::new()));
    let state = host
        .describe(&DatastoreId::new("60aa11bb-22cc"))
        .await
        .unwrap();

    assert_eq!(state.name, "terraform-test");
    assert_eq!(state.host, HostRef::new("esxi-01.lab.local"));
    assert_eq!(state.extents, vec![handle("naa.6000c29a")]);
    assert_eq!(state.summary.url, "ds:///vmfs/volumes/60aa11bb-22cc/");
}

#[tokio::test]
async fn describe_unknown_uuid_is_not_found() {
    let host = EsxcliHost::new(Arc::new(ScriptedRunner::new()));
    let error = host
        .describe(&DatastoreId::new("6a3e-bootbank"))
        .await
        .unwrap_err();
    assert!(error.is_not_found());
}

#[tokio::test]
async fn inventory_marks_claimed_disks() {
    let host = EsxcliHost::new(Arc::new(ScriptedRunner::new()));
    let disks = host
        .list_disks(&HostRef::new("esxi-01.lab.local"))
        .await
        .unwrap();

    let available: Vec<&str> = disks
        .iter()
        .filter(|disk| disk.is_available())
        .map(|disk| disk.handle.as_str())
        .collect();
    assert_eq!(available, vec!["naa.6000c29b"]);
    assert!(disks.iter().any(|disk| disk.is_ssd));
}

#[tokio::test]
async fn create_partitions_then_formats_then_spans() {
    let runner = Arc::new(ScriptedRunner::new());
    let host = EsxcliHost::new(runner.clone());
    let spec = DatastoreSpec {
        name: "terraform-new".to_string(),
        host: HostRef::new("esxi-01.lab.local"),
        disks: vec![handle("naa.6000c29b"), handle("naa.6000c29c")],
    };

    let id = host.create(&spec).await.unwrap();
    assert_eq!(id, DatastoreId::new("70bb22cc-33dd"));

    let calls = runner.calls();
    let table = format!("1 2048 33554398 {VMFS_PARTITION_GUID} 0");
    let position = |needle: &str| {
        calls
            .iter()
            .position(|call| call.contains(needle))
            .unwrap_or_else(|| panic!("missing call containing {needle}: {calls:?}"))
    };

    let setptbl = position(&table);
    let format = position("vmkfstools -C vmfs6 -S terraform-new /vmfs/devices/disks/naa.6000c29b:1");
    let span = position(
        "vmkfstools -Z /vmfs/devices/disks/naa.6000c29c:1 /vmfs/devices/disks/naa.6000c29b:1",
    );
    assert!(setptbl < format);
    assert!(format < span);
}

#[tokio::test]
async fn create_rejects_duplicate_names_before_touching_disks() {
    let runner = Arc::new(ScriptedRunner::new());
    let host = EsxcliHost::new(runner.clone());
    let spec = DatastoreSpec {
        name: "datastore1".to_string(),
        host: HostRef::new("esxi-01.lab.local"),
        disks: vec![handle("naa.6000c29b")],
    };

    let error = host.create(&spec).await.unwrap_err();
    assert_eq!(error.kind, HostErrorKind::Conflict);
    assert!(!runner.calls().iter().any(|call| call.starts_with("partedUtil")));
}

#[tokio::test]
async fn rename_and_delete_address_the_current_volume_name() {
    let runner = Arc::new(ScriptedRunner::new());
    let host = EsxcliHost::new(runner.clone());
    let id = DatastoreId::new("60aa11bb-22cc");

    host.rename(&id, "terraform-test-renamed").await.unwrap();
    host.delete(&id).await.unwrap();

    let calls = runner.calls();
    assert!(calls.contains(
        &"vim-cmd hostsvc/datastore/rename terraform-test terraform-test-renamed".to_string()
    ));
    assert!(calls.contains(&"vim-cmd hostsvc/datastore/destroy terraform-test".to_string()));
}

#[tokio::test]
async fn tool_failures_map_to_host_error_kinds() {
    let runner = Arc::new(ScriptedRunner {
        fail_on: &["vmkfstools -Z"],
        ..ScriptedRunner::new()
    });
    let host = EsxcliHost::new(runner);

    let error = host
        .extend(&DatastoreId::new("60aa11bb-22cc"), &[handle("naa.6000c29b")])
        .await
        .unwrap_err();
    assert_eq!(error.kind, HostErrorKind::Busy);
}

fn new_two_disk_spec() -> DatastoreSpec {
    DatastoreSpec {
        name: "terraform-new".to_string(),
        host: HostRef::new("esxi-01.lab.local"),
        disks: vec![handle("naa.6000c29b"), handle("naa.6000c29c")],
    }
}

#[tokio::test]
async fn failed_span_during_create_destroys_the_new_volume() {
    let runner = Arc::new(ScriptedRunner {
        fail_on: &["vmkfstools -Z"],
        ..ScriptedRunner::new()
    });
    let host = EsxcliHost::new(runner.clone());

    let error = host.create(&new_two_disk_spec()).await.unwrap_err();
    assert_eq!(error.kind, HostErrorKind::Busy);
    assert_eq!(error.resource, None);

    let calls = runner.calls();
    let span = calls
        .iter()
        .position(|call| call.starts_with("vmkfstools -Z"))
        .unwrap();
    let destroy = calls
        .iter()
        .position(|call| call == "vim-cmd hostsvc/datastore/destroy terraform-new")
        .unwrap();
    assert!(span < destroy);
}

#[tokio::test]
async fn failed_rollback_reports_the_volume_uuid() {
    let runner = Arc::new(ScriptedRunner {
        fail_on: &["vmkfstools -Z", "hostsvc/datastore/destroy"],
        ..ScriptedRunner::new()
    });
    let host = EsxcliHost::new(runner);

    let error = host.create(&new_two_disk_spec()).await.unwrap_err();
    assert_eq!(error.kind, HostErrorKind::Busy);
    assert_eq!(error.resource, Some(DatastoreId::new("70bb22cc-33dd")));
    assert!(error.message.contains("70bb22cc-33dd"));
}

#[tokio::test]
async fn configured_vmfs_version_is_used_for_format() {
    let runner = Arc::new(ScriptedRunner::new());
    let host = EsxcliHost::new(runner.clone()).with_vmfs_version("vmfs5");
    let spec = DatastoreSpec {
        disks: vec![handle("naa.6000c29b")],
        ..new_two_disk_spec()
    };

    host.create(&spec).await.unwrap();
    assert!(runner.calls().contains(
        &"vmkfstools -C vmfs5 -S terraform-new /vmfs/devices/disks/naa.6000c29b:1".to_string()
    ));
}

#[tokio::test]
async fn host_lookup_accepts_short_and_full_names() {
    let host = EsxcliHost::new(Arc::new(ScriptedRunner::new()));

    let by_short = host
        .resolve_host(&HostQuery::new(Some("dc-01"), "esxi-01"))
        .await
        .unwrap();
    assert_eq!(by_short, HostRef::new("esxi-01.lab.local"));

    let missing = host
        .resolve_host(&HostQuery::new(None, "esxi-02"))
        .await
        .unwrap_err();
    assert!(missing.is_not_found());
}
