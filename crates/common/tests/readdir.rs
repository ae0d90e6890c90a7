//! Integration tests for merged directory listings

mod common;

use ::common::backing::{EntryKind, StoreOp};
use ::common::merge::{MergeError, NodeKind};

fn seed(cluster: &::common::testkit::TestCluster) {
    let local = cluster.local();
    local.add_file("a.txt", 1).unwrap();
    local.add_dir("docs").unwrap();

    let one = cluster.device(1).unwrap();
    one.add_file("a.txt", 11).unwrap();
    one.add_file("b", 12).unwrap();
    one.add_dir("docs").unwrap();
    // backing names that look encoded are never shown
    one.add_file("x_conflict_dev3", 0).unwrap();

    let two = cluster.device(2).unwrap();
    two.add_dir("a.txt").unwrap();
    two.add_file("docs", 22).unwrap();
}

#[tokio::test]
async fn test_readdir_merges_and_encodes_conflicts() {
    let cluster = common::cluster(&[1, 2]);
    seed(&cluster);
    let view = common::mount(&cluster).await;

    let entries = view.readdir(&view.root()).await.unwrap();
    assert_eq!(
        common::sorted_names(&entries),
        vec![
            "a.txt",
            "a.txt_remote_directory",
            "a_conflict_dev1.txt",
            "b",
            "docs",
            "docs_conflict_dev2",
        ]
    );

    let docs = entries.iter().find(|e| e.name == "docs").unwrap();
    assert_eq!(docs.kind, EntryKind::Dir);
    assert_eq!(docs.device.0, 0);
    let a = entries.iter().find(|e| e.name == "a.txt").unwrap();
    assert_eq!(a.kind, EntryKind::Reg);
    assert_eq!(a.device.0, 0);
}

#[tokio::test]
async fn test_encoded_names_resolve() {
    let cluster = common::cluster(&[1, 2]);
    seed(&cluster);
    let view = common::mount(&cluster).await;

    let file = common::settled(&view, "/a_conflict_dev1.txt").await;
    assert_eq!(common::devices(&file), vec![1]);
    assert_eq!(view.attr(&file).unwrap().size, 11);

    let dir = common::settled(&view, "/a.txt_remote_directory").await;
    assert_eq!(common::devices(&dir), vec![2]);
    assert_eq!(dir.kind(), NodeKind::Dir);

    let file = common::settled(&view, "/docs_conflict_dev2").await;
    assert_eq!(common::devices(&file), vec![2]);
    assert_eq!(view.attr(&file).unwrap().size, 22);
}

#[tokio::test]
async fn test_directory_conflict_shown_once() {
    let cluster = common::cluster(&[1, 2]);
    cluster.local().add_file("n", 0).unwrap();
    cluster.device(1).unwrap().add_dir("n").unwrap();
    cluster.device(2).unwrap().add_dir("n").unwrap();
    let view = common::mount(&cluster).await;

    let entries = view.readdir(&view.root()).await.unwrap();
    assert_eq!(
        common::sorted_names(&entries),
        vec!["n", "n_remote_directory"]
    );
}

#[tokio::test]
async fn test_readdir_skips_failing_device() {
    let cluster = common::cluster(&[1]);
    cluster.local().add_file("mine", 0).unwrap();
    cluster.device(1).unwrap().add_file("theirs", 0).unwrap();
    let view = common::mount(&cluster).await;
    cluster.device(1).unwrap().fail(Some(StoreOp::Readdir));

    let entries = view.readdir(&view.root()).await.unwrap();
    assert_eq!(common::sorted_names(&entries), vec!["mine"]);
}

#[tokio::test]
async fn test_readdir_fails_when_every_device_fails() {
    let cluster = common::cluster(&[1]);
    let view = common::mount(&cluster).await;
    cluster.local().fail(Some(StoreOp::Readdir));
    cluster.device(1).unwrap().fail(Some(StoreOp::Readdir));

    let err = view.readdir(&view.root()).await.unwrap_err();
    assert!(matches!(err, MergeError::Store(_)));
}

#[tokio::test]
async fn test_readdir_of_regular_file() {
    let cluster = common::cluster(&[]);
    cluster.local().add_file("f", 0).unwrap();
    let view = common::mount(&cluster).await;
    let node = common::settled(&view, "/f").await;

    let err = view.readdir(&node).await.unwrap_err();
    assert!(matches!(err, MergeError::NotADirectory(_)));
}

#[tokio::test]
async fn test_readdir_nested_directory() {
    let cluster = common::cluster(&[1]);
    cluster.local().add_file("d/one", 0).unwrap();
    cluster.device(1).unwrap().add_file("d/two", 0).unwrap();
    let view = common::mount(&cluster).await;

    let d = common::settled(&view, "/d").await;
    let entries = view.readdir(&d).await.unwrap();
    assert_eq!(common::sorted_names(&entries), vec!["one", "two"]);
}
