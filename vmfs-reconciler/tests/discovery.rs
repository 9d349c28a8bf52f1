// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use vmfs_reconciler::{DatastoreError, DatastoreReconciler, DiskSetResolver, ReconcilerConfig};
use vmfs_types::{
    DatastoreConfig, DiscoveryQuery, DiskHandle, DiskSelection, HostRef,
};
use vmfs_testing::SimulatedHost;

const HOST: &str = "esxi-01.lab.local";

fn inventory() -> Arc<SimulatedHost> {
    Arc::new(
        SimulatedHost::new(HOST, None)
            .with_disk("naa.6000c29c", 16)
            .with_disk("naa.6000c29a", 16)
            .with_disk("t10.ATA_SSD", 16)
            .with_pending_disk("naa.6000c29b", 16),
    )
}

fn query(filter: Option<&str>, rescan: bool) -> DiscoveryQuery {
    DiscoveryQuery {
        host: HostRef::new(HOST),
        filter: filter.map(str::to_string),
        rescan,
    }
}

fn names(handles: &[DiskHandle]) -> Vec<&str> {
    handles.iter().map(DiskHandle::as_str).collect()
}

#[tokio::test]
async fn discovery_is_sorted_and_repeatable() {
    let host = inventory();
    let resolver = DiskSetResolver::new(host.clone());

    let first = resolver.discover(&query(Some("^naa\\."), false), None).await.unwrap();
    let second = resolver.discover(&query(Some("^naa\\."), false), None).await.unwrap();

    assert_eq!(names(&first), vec!["naa.6000c29a", "naa.6000c29c"]);
    assert_eq!(first, second);
    assert_eq!(host.rescan_count(), 0);
}

#[tokio::test]
async fn rescan_reveals_new_disks() {
    let host = inventory();
    let resolver = DiskSetResolver::new(host.clone());

    let found = resolver.discover(&query(Some("^naa\\."), true), None).await.unwrap();
    assert_eq!(
        names(&found),
        vec!["naa.6000c29a", "naa.6000c29b", "naa.6000c29c"]
    );
    assert_eq!(host.rescan_count(), 1);
}

#[tokio::test]
async fn missing_filter_matches_all_free_disks() {
    let resolver = DiskSetResolver::new(inventory());
    let found = resolver.discover(&query(None, false), None).await.unwrap();
    assert_eq!(found.len(), 3);
}

#[tokio::test]
async fn no_match_and_bad_filter_are_distinct_errors() {
    let host = inventory();
    let resolver = DiskSetResolver::new(host.clone());

    let none = resolver.discover(&query(Some("^eui\\."), false), None).await.unwrap_err();
    assert!(matches!(none, DatastoreError::NoMatch { .. }));

    let invalid = resolver.discover(&query(Some("naa.(("), true), None).await.unwrap_err();
    assert!(matches!(invalid, DatastoreError::InvalidFilter { .. }));
    assert_eq!(host.rescan_count(), 0, "bad filter must not trigger a rescan");
}

#[tokio::test]
async fn claimed_disks_are_not_discovered() {
    let host = inventory();
    let reconciler = DatastoreReconciler::new(host.clone(), ReconcilerConfig::default());
    let config = DatastoreConfig {
        name: "terraform-test".to_string(),
        host: HostRef::new(HOST),
        disks: DiskSelection::Discover(query(Some("^naa\\.6000c29a$"), false)),
    };
    reconciler.apply(None, &config).await.unwrap();

    let remaining = reconciler
        .resolver()
        .discover(&query(Some("^naa\\."), false), None)
        .await
        .unwrap();
    assert_eq!(names(&remaining), vec!["naa.6000c29c"]);
}

#[tokio::test]
async fn reapplying_a_discovery_config_is_a_no_op() {
    let host = inventory();
    let reconciler = DatastoreReconciler::new(host.clone(), ReconcilerConfig::default());
    let config = DatastoreConfig {
        name: "terraform-test".to_string(),
        host: HostRef::new(HOST),
        disks: DiskSelection::Discover(query(Some("^naa\\."), true)),
    };

    let created = reconciler.apply(None, &config).await.unwrap();
    assert_eq!(
        names(&created.state.extents),
        vec!["naa.6000c29a", "naa.6000c29b", "naa.6000c29c"]
    );

    let again = reconciler
        .apply(Some(&created.state.id), &config)
        .await
        .unwrap();
    assert!(again.applied.is_empty());
    assert!(again.retained_extents.is_empty());
    assert_eq!(again.state.id, created.state.id);
    assert_eq!(again.state.extents, created.state.extents);
    assert_eq!(host.rescan_count(), 2);
}

#[tokio::test]
async fn owner_discovers_its_own_extents_and_free_disks() {
    let host = inventory();
    let reconciler = DatastoreReconciler::new(host.clone(), ReconcilerConfig::default());
    let config = DatastoreConfig {
        name: "terraform-test".to_string(),
        host: HostRef::new(HOST),
        disks: DiskSelection::Discover(query(Some("^naa\\.6000c29a$"), false)),
    };
    let created = reconciler.apply(None, &config).await.unwrap();

    let found = reconciler
        .resolver()
        .discover(&query(Some("^naa\\."), false), Some(&created.state.id))
        .await
        .unwrap();
    assert_eq!(names(&found), vec!["naa.6000c29a", "naa.6000c29c"]);
}
