//! Shared test utilities for merge view integration tests
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use ::common::config::MergeConfig;
use ::common::merge::{MergeDirEntry, MergeNode, MergeView};
use ::common::testkit::TestCluster;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A cluster with the local device plus the given remote device ids
pub fn cluster(devices: &[u64]) -> TestCluster {
    cluster_with(devices, MergeConfig::default())
}

pub fn cluster_with(devices: &[u64], config: MergeConfig) -> TestCluster {
    init_tracing();
    let mut cluster = TestCluster::with_config(config);
    for id in devices {
        cluster.add_device(*id).unwrap();
    }
    cluster
}

pub async fn mount(cluster: &TestCluster) -> MergeView {
    cluster.mount().await.unwrap()
}

/// Look up a path and wait for every device to answer
pub async fn settled(view: &MergeView, path: &str) -> Arc<MergeNode> {
    let node = view.lookup_path(path).await.unwrap();
    node.work().wait_idle().await;
    node
}

/// Device ids backing a node, sorted since remote comrades attach in
///  completion order
pub fn devices(node: &MergeNode) -> Vec<u64> {
    let mut ids: Vec<u64> = node.registry().devices().into_iter().map(|d| d.0).collect();
    ids.sort_unstable();
    ids
}

pub fn sorted_names(entries: &[MergeDirEntry]) -> Vec<String> {
    let mut names: Vec<String> = entries.iter().map(|e| e.name.clone()).collect();
    names.sort();
    names
}

/// Give spawned tasks a chance to run
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(30)).await;
}
