//! Integration tests for unlink and rmdir

mod common;

use ::common::backing::StoreError;
use ::common::merge::MergeError;

#[tokio::test]
async fn test_unlink_regular_file() {
    let cluster = common::cluster(&[1]);
    cluster.device(1).unwrap().add_file("f", 4).unwrap();
    let view = common::mount(&cluster).await;
    let root = view.root();
    let node = common::settled(&view, "/f").await;

    view.unlink(&root, "f").await.unwrap();
    assert!(!cluster.device(1).unwrap().exists("f"));
    assert!(node.is_dead());
    assert!(view.cache().get("/f").is_none());
    assert!(view.lookup_path("/f").await.is_err());
}

#[tokio::test]
async fn test_unlink_conflict_name_denied() {
    let cluster = common::cluster(&[1]);
    cluster.local().add_file("f", 1).unwrap();
    cluster.device(1).unwrap().add_file("f", 2).unwrap();
    let view = common::mount(&cluster).await;

    let err = view.unlink(&view.root(), "f_conflict_dev1").await.unwrap_err();
    assert!(matches!(err, MergeError::PermissionDenied(_)));
    assert!(cluster.device(1).unwrap().exists("f"));
}

#[tokio::test]
async fn test_unlink_directory_rejected() {
    let cluster = common::cluster(&[]);
    cluster.local().add_dir("d").unwrap();
    let view = common::mount(&cluster).await;

    let err = view.unlink(&view.root(), "d").await.unwrap_err();
    assert!(matches!(err, MergeError::IsADirectory(_)));
    assert!(cluster.local().exists("d"));
}

#[tokio::test]
async fn test_rmdir_regular_file_rejected() {
    let cluster = common::cluster(&[]);
    cluster.local().add_file("f", 0).unwrap();
    let view = common::mount(&cluster).await;

    let err = view.rmdir(&view.root(), "f").await.unwrap_err();
    assert!(matches!(err, MergeError::NotADirectory(_)));
}

#[tokio::test]
async fn test_rmdir_removes_every_device() {
    let cluster = common::cluster(&[1, 2]);
    for id in [0, 1, 2] {
        cluster.device(id).unwrap().add_dir("d").unwrap();
    }
    let view = common::mount(&cluster).await;
    let root = view.root();
    common::settled(&view, "/d").await;
    let before = view.attr(&root).unwrap().nlink;

    view.rmdir(&root, "d").await.unwrap();
    for id in [0, 1, 2] {
        assert!(!cluster.device(id).unwrap().exists("d"), "device {}", id);
    }
    assert_eq!(view.attr(&root).unwrap().nlink, before - 1);
}

#[tokio::test]
async fn test_rmdir_stops_at_first_failure() {
    let cluster = common::cluster(&[1]);
    cluster.local().add_dir("d").unwrap();
    cluster.device(1).unwrap().add_dir("d/child").unwrap();
    let view = common::mount(&cluster).await;
    let node = common::settled(&view, "/d").await;

    let err = view.rmdir(&view.root(), "d").await.unwrap_err();
    assert!(matches!(
        err,
        MergeError::Store(StoreError::DirectoryNotEmpty(_))
    ));
    // the local comrade was removed before device 1 refused
    assert!(!cluster.local().exists("d"));
    assert!(cluster.device(1).unwrap().exists("d"));
    assert_eq!(common::devices(&node), vec![1]);
    assert!(!node.is_dead());
}

#[tokio::test]
async fn test_remove_missing_entry() {
    let cluster = common::cluster(&[]);
    let view = common::mount(&cluster).await;
    let root = view.root();

    assert!(view.unlink(&root, "nope").await.unwrap_err().is_not_found());
    assert!(view.rmdir(&root, "nope").await.unwrap_err().is_not_found());
}
