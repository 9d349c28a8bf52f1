// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;
use std::time::Duration;

use vmfs_contracts::{HostError, HostErrorKind, OperationKind};
use vmfs_reconciler::{DatastoreError, DatastoreReconciler, ReconcilerConfig};
use vmfs_types::{DatastoreSpec, DiskHandle, HostRef, ReconcileOp, ReconcilePhase};
use vmfs_testing::SimulatedHost;

const HOST: &str = "esxi-01.lab.local";

fn host() -> SimulatedHost {
    SimulatedHost::new(HOST, None)
        .with_disk("naa.d0", 16)
        .with_disk("naa.d1", 16)
}

fn spec(name: &str, disks: &[&str]) -> DatastoreSpec {
    DatastoreSpec {
        name: name.to_string(),
        host: HostRef::new(HOST),
        disks: disks
            .iter()
            .map(|disk| DiskHandle::parse(disk).unwrap())
            .collect(),
    }
}

#[tokio::test]
async fn create_failure_is_fatal_and_references_nothing() {
    let host = Arc::new(host());
    host.fail_next(
        OperationKind::Create,
        HostError::new(HostErrorKind::PermissionDenied, "no Host.Config.Storage privilege"),
    );
    let reconciler = DatastoreReconciler::new(host.clone(), ReconcilerConfig::default());

    let error = reconciler
        .converge(None, &spec("ds", &["naa.d0"]))
        .await
        .unwrap_err();

    match error {
        DatastoreError::Reconcile {
            phase,
            id,
            last_known,
            source,
            ..
        } => {
            assert_eq!(phase, ReconcilePhase::Creating);
            assert!(id.is_none());
            assert!(last_known.is_none());
            assert_eq!(source.kind, HostErrorKind::PermissionDenied);
        }
        other => panic!("expected reconcile error, got {other:?}"),
    }
    assert!(host.history().is_empty());
}

#[tokio::test]
async fn extend_failure_carries_last_known_state() {
    let host = Arc::new(host());
    let reconciler = DatastoreReconciler::new(host.clone(), ReconcilerConfig::default());
    let id = reconciler
        .converge(None, &spec("ds", &["naa.d0"]))
        .await
        .unwrap()
        .state
        .id;

    host.fail_next(
        OperationKind::Extend,
        HostError::new(HostErrorKind::Busy, "device busy"),
    );
    let error = reconciler
        .converge(Some(&id), &spec("renamed", &["naa.d0", "naa.d1"]))
        .await
        .unwrap_err();

    assert_eq!(error.phase(), Some(ReconcilePhase::Updating));
    let last_known = error.last_known().unwrap();
    assert_eq!(last_known.name, "ds");
    assert_eq!(last_known.extents.len(), 1);
    assert!(matches!(
        error,
        DatastoreError::Reconcile {
            operation: ReconcileOp::Extend { .. },
            ..
        }
    ));
    // Rename is not attempted once extend failed.
    assert!(host.history().iter().all(|entry| !entry.starts_with("rename")));
}

#[tokio::test]
async fn empty_create_is_cleaned_up() {
    let host = Arc::new(host());
    host.leave_next_create_empty();
    let reconciler = DatastoreReconciler::new(host.clone(), ReconcilerConfig::default());

    let error = reconciler
        .converge(None, &spec("ds", &["naa.d0"]))
        .await
        .unwrap_err();

    assert_eq!(error.phase(), Some(ReconcilePhase::Creating));
    assert!(error.last_known().is_none());
    assert!(host.datastore_ids().is_empty());
}

#[tokio::test]
async fn failed_cleanup_keeps_the_partial_datastore_recoverable() {
    let host = Arc::new(host());
    host.leave_next_create_empty();
    host.fail_next(
        OperationKind::Delete,
        HostError::new(HostErrorKind::Busy, "datastore busy"),
    );
    let reconciler = DatastoreReconciler::new(host.clone(), ReconcilerConfig::default());

    let error = reconciler
        .converge(None, &spec("ds", &["naa.d0"]))
        .await
        .unwrap_err();

    let partial = error.last_known().unwrap();
    assert!(partial.extents.is_empty());
    assert!(matches!(
        &error,
        DatastoreError::Reconcile { id: Some(id), .. } if *id == partial.id
    ));
    assert_eq!(host.datastore_ids(), vec![partial.id.clone()]);
}

#[tokio::test]
async fn delete_failure_is_wrapped_in_deleting_phase() {
    let host = Arc::new(host());
    let reconciler = DatastoreReconciler::new(host.clone(), ReconcilerConfig::default());
    let id = reconciler
        .converge(None, &spec("ds", &["naa.d0"]))
        .await
        .unwrap()
        .state
        .id;

    host.fail_next(
        OperationKind::Delete,
        HostError::new(HostErrorKind::Unavailable, "host disconnected"),
    );
    let error = reconciler.delete(&id).await.unwrap_err();

    assert_eq!(error.phase(), Some(ReconcilePhase::Deleting));
    assert_eq!(error.last_known().map(|state| state.id.clone()), Some(id.clone()));
    reconciler.delete(&id).await.unwrap();
}

#[tokio::test]
async fn describe_faults_are_host_errors_not_absence() {
    let host = Arc::new(host());
    let reconciler = DatastoreReconciler::new(host.clone(), ReconcilerConfig::default());
    let id = reconciler
        .converge(None, &spec("ds", &["naa.d0"]))
        .await
        .unwrap()
        .state
        .id;

    host.fail_next(
        OperationKind::Describe,
        HostError::new(HostErrorKind::Unavailable, "management agent restarting"),
    );
    let error = reconciler.read(&id).await.unwrap_err();
    assert!(matches!(error, DatastoreError::Host(_)));
    assert!(reconciler.read(&id).await.unwrap().is_present());
}

#[tokio::test(start_paused = true)]
async fn slow_host_calls_time_out() {
    let host = Arc::new(host().with_latency(Duration::from_secs(120)));
    let config = ReconcilerConfig {
        operation_timeout_secs: Some(30),
        ..ReconcilerConfig::default()
    };
    let reconciler = DatastoreReconciler::new(host.clone(), config);

    let error = reconciler
        .converge(None, &spec("ds", &["naa.d0"]))
        .await
        .unwrap_err();

    match error {
        DatastoreError::Reconcile { source, .. } => {
            assert_eq!(source.kind, HostErrorKind::Timeout)
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn drift_behind_the_reconciler_is_kept() {
    let host = Arc::new(host());
    let reconciler = DatastoreReconciler::new(host.clone(), ReconcilerConfig::default());
    let id = reconciler
        .converge(None, &spec("ds", &["naa.d0"]))
        .await
        .unwrap()
        .state
        .id;

    host.force_extents(&id, &[DiskHandle::parse("naa.d1").unwrap()]);
    let reconciled = reconciler
        .converge(Some(&id), &spec("ds", &["naa.d0"]))
        .await
        .unwrap();
    assert_eq!(reconciled.state.extents.len(), 2);
    assert_eq!(reconciled.retained_extents.len(), 1);
}
