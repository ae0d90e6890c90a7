//! Sessions over an initialized state directory

use common::device::{Cid, DeviceId, DeviceSelector};
use mergefs_daemon::{AppState, PeerConfig, Session, SessionError};

fn init_state(dir: &tempfile::TempDir) -> AppState {
    let mut state = AppState::init(Some(dir.path().join("mergefs")), None).unwrap();
    state
        .add_peer(PeerConfig {
            id: 1,
            cid: None,
            online: true,
        })
        .unwrap();
    state
}

#[tokio::test]
async fn test_session_merges_configured_peers() {
    let dir = tempfile::tempdir().unwrap();
    let state = init_state(&dir);
    let local = state.device_root(&DeviceSelector::Local);
    let remote = state.device_root(&DeviceSelector::Remote(Cid::from_device(DeviceId(1))));
    std::fs::write(local.join("todo.md"), b"local").unwrap();
    std::fs::write(remote.join("todo.md"), b"remote").unwrap();
    std::fs::create_dir(remote.join("pics")).unwrap();

    let session = Session::open(state).await.unwrap();
    let root = session.resolve("/").await.unwrap();
    let mut names: Vec<String> = session
        .view
        .readdir(&root)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["pics", "todo.md", "todo_conflict_dev1.md"]);

    let (pics, name) = session.resolve_parent("/pics/new").await.unwrap();
    session.view.mkdir(&pics, name).await.unwrap();
    assert!(local.join("pics").join("new").is_dir());
}

#[tokio::test]
async fn test_offline_peer_is_hidden() {
    let dir = tempfile::tempdir().unwrap();
    let mut state = init_state(&dir);
    let remote = state.device_root(&DeviceSelector::Remote(Cid::from_device(DeviceId(1))));
    std::fs::write(remote.join("theirs"), b"x").unwrap();
    state.set_peer_online(1, false).unwrap();

    let session = Session::open(state).await.unwrap();
    let err = session.resolve("/theirs").await.err().unwrap();
    assert!(matches!(err, SessionError::Merge(e) if e.is_not_found()));
}

#[tokio::test]
async fn test_missing_data_dir_fails_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let state = init_state(&dir);
    std::fs::remove_dir_all(&state.data_path).unwrap();

    assert!(AppState::load(Some(state.mergefs_dir.clone())).is_err());
}
