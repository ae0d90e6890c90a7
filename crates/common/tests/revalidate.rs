//! Integration tests for cached node revalidation

mod common;

use std::sync::Arc;

use ::common::backing::BackingStore;
use ::common::config::MergeConfig;
use ::common::merge::{LookupFlags, NodeLayer, Validity};

#[tokio::test]
async fn test_backing_removal_makes_node_stale() {
    let cluster = common::cluster(&[]);
    cluster.local().add_dir("d").unwrap();
    let view = common::mount(&cluster).await;
    let node = common::settled(&view, "/d").await;
    assert_eq!(
        view.revalidate(&node, LookupFlags::default()).await,
        Validity::Valid
    );

    cluster
        .store()
        .rmdir(&cluster.local().path("d"))
        .await
        .unwrap();
    assert_eq!(
        view.revalidate(&node, LookupFlags::default()).await,
        Validity::Stale
    );
    let err = view.lookup_path("/d").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(node.is_dead());
}

#[tokio::test]
async fn test_recreated_entry_is_looked_up_again() {
    let cluster = common::cluster(&[]);
    cluster.local().add_dir("d").unwrap();
    let view = common::mount(&cluster).await;
    let old = common::settled(&view, "/d").await;

    let store = cluster.store();
    store.rmdir(&cluster.local().path("d")).await.unwrap();
    cluster.local().add_dir("d").unwrap();

    let new = common::settled(&view, "/d").await;
    assert!(!Arc::ptr_eq(&old, &new));
    assert!(old.is_dead());
    assert_eq!(common::devices(&new), vec![0]);
}

#[tokio::test]
async fn test_forced_revalidation_is_stale() {
    let cluster = common::cluster(&[]);
    cluster.local().add_file("f", 0).unwrap();
    let view = common::mount(&cluster).await;
    let node = common::settled(&view, "/f").await;

    let forced = LookupFlags {
        revalidate: true,
        ..Default::default()
    };
    assert_eq!(view.revalidate(&node, forced).await, Validity::Stale);
}

#[tokio::test]
async fn test_intent_flags_keep_populated_node() {
    let cluster = common::cluster(&[]);
    cluster.local().add_file("f", 0).unwrap();
    let view = common::mount(&cluster).await;
    let node = common::settled(&view, "/f").await;

    for flags in [LookupFlags::create(), LookupFlags::rename_target()] {
        assert_eq!(view.revalidate(&node, flags).await, Validity::Valid);
    }
    let root = view.root();
    let again = view.lookup(&root, "f", LookupFlags::create()).await.unwrap();
    assert!(Arc::ptr_eq(&node, &again));
    assert!(!node.is_dead());
}

#[tokio::test]
async fn test_negative_node_is_stale() {
    let cluster = common::cluster(&[]);
    let view = common::mount(&cluster).await;
    let root = view.root();
    let negative = view.lookup(&root, "n", LookupFlags::create()).await.unwrap();
    assert!(negative.is_empty());
    assert_eq!(
        view.revalidate(&negative, LookupFlags::create()).await,
        Validity::Stale
    );
}

#[tokio::test]
async fn test_trusted_node_stays_valid() {
    let config = MergeConfig {
        trusted_roots: vec!["t".to_string()],
        ..Default::default()
    };
    let cluster = common::cluster_with(&[], config);
    cluster.local().add_dir("t").unwrap();
    let view = common::mount(&cluster).await;
    let node = common::settled(&view, "/t").await;
    assert_eq!(node.layer(), NodeLayer::Trusted);

    let store = cluster.store();
    store.rmdir(&cluster.local().path("t")).await.unwrap();
    cluster.local().add_dir("t").unwrap();
    assert_eq!(
        view.revalidate(&node, LookupFlags::default()).await,
        Validity::Valid
    );
    let again = common::settled(&view, "/t").await;
    assert!(Arc::ptr_eq(&node, &again));
}

#[tokio::test]
async fn test_root_always_valid() {
    let cluster = common::cluster(&[]);
    let view = common::mount(&cluster).await;
    let root = view.root();

    assert_eq!(
        view.revalidate(&root, LookupFlags::create()).await,
        Validity::Valid
    );
}

#[tokio::test]
async fn test_dead_node_is_stale() {
    let cluster = common::cluster(&[]);
    cluster.local().add_dir("d").unwrap();
    let view = common::mount(&cluster).await;
    let node = common::settled(&view, "/d").await;

    view.evict(&node).await;
    assert_eq!(
        view.revalidate(&node, LookupFlags::default()).await,
        Validity::Stale
    );
}
