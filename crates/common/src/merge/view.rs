use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use tokio::task::JoinHandle;

use super::cache::NodeCache;
use super::comrade::Comrade;
use super::dispatch::{spawn_workers, LookupDispatcher};
use super::lookup::LookupFlags;
use super::node::MergeNode;
use super::registry::MergeAttr;
use super::MergeError;
use crate::backing::{BackingStore, Metadata, SetAttr};
use crate::config::MergeConfig;
use crate::device::{ConnectionRegistry, DeviceId, DeviceSelector, PeerConnection, PeerStatus};

const ROOT_INO: u64 = 1;

/// A mounted merge view.
///  Cheap to clone; every clone drives the same view.
#[derive(Debug, Clone)]
pub struct MergeView(Arc<ViewInner>);

#[derive(Debug)]
pub(crate) struct ViewInner {
    pub(crate) store: Arc<dyn BackingStore>,
    pub(crate) peers: ConnectionRegistry,
    pub(crate) config: MergeConfig,
    pub(crate) dispatcher: LookupDispatcher,
    pub(crate) cache: NodeCache,
    pub(crate) root: Arc<MergeNode>,
    next_ino: AtomicU64,
    workers: Vec<JoinHandle<()>>,
}

impl Drop for ViewInner {
    fn drop(&mut self) {
        for worker in &self.workers {
            worker.abort();
        }
    }
}

impl MergeView {
    /// Mount a view over `store`. The local device root must resolve;
    ///  unreachable peers are skipped.
    pub async fn mount(
        store: Arc<dyn BackingStore>,
        peers: ConnectionRegistry,
        config: MergeConfig,
    ) -> Result<Self, MergeError> {
        config
            .validate()
            .map_err(|e| MergeError::InvalidArgument(e.to_string()))?;

        let (dispatcher, receiver) = LookupDispatcher::new();
        let workers = spawn_workers(
            receiver,
            store.clone(),
            config.lookup_workers,
            config.lookup_timeout(),
        );
        let view = Self(Arc::new(ViewInner {
            store,
            peers,
            config,
            dispatcher,
            cache: NodeCache::new(),
            root: MergeNode::root(ROOT_INO),
            next_ino: AtomicU64::new(ROOT_INO + 1),
            workers,
        }));
        view.rebuild_root().await?;
        tracing::info!(
            "merge view mounted with {} device(s)",
            view.0.root.registry().len()
        );
        Ok(view)
    }

    /* Getters */

    pub fn root(&self) -> Arc<MergeNode> {
        self.0.root.clone()
    }

    pub fn store(&self) -> &Arc<dyn BackingStore> {
        &self.0.store
    }

    pub fn peers(&self) -> &ConnectionRegistry {
        &self.0.peers
    }

    pub fn config(&self) -> &MergeConfig {
        &self.0.config
    }

    pub fn cache(&self) -> &NodeCache {
        &self.0.cache
    }

    pub(crate) fn inner(&self) -> &ViewInner {
        &self.0
    }

    pub(crate) fn next_ino(&self) -> u64 {
        self.0.next_ino.fetch_add(1, Ordering::Relaxed)
    }

    /* Root */

    /// Resolve `device_view/local` and every online peer's root, then
    ///  swap them in as the root's comrades
    async fn rebuild_root(&self) -> Result<(), MergeError> {
        let store = &self.0.store;
        let local = DeviceSelector::Local.root();
        let entry = store.lookup(&local).await.map_err(|e| {
            tracing::error!("local device root {} unavailable: {}", local, e);
            MergeError::from(e)
        })?;
        let mut comrades = vec![Comrade::new(DeviceId::LOCAL, entry)];

        let peers = self.0.peers.online();
        let roots = join_all(peers.iter().map(|peer| async move {
            let path = peer.selector().root();
            (peer.device_id, store.lookup(&path).await, path)
        }))
        .await;
        for (device_id, result, path) in roots {
            match result {
                Ok(entry) if entry.kind().is_dir() => comrades.push(Comrade::new(device_id, entry)),
                Ok(_) => tracing::warn!("peer root {} is not a directory", path),
                Err(e) => tracing::warn!("skipping peer {}: {}", device_id, e),
            }
        }

        let old = self.0.root.registry().replace(comrades);
        drop(old);
        Ok(())
    }

    /// Register (or re-enable) a peer and remerge the whole view
    pub async fn peer_online(&self, peer: PeerConnection) -> Result<(), MergeError> {
        let device_id = peer.device_id;
        if self.0.peers.get(device_id).is_some() {
            self.0
                .peers
                .set_status(device_id, PeerStatus::Online)
                .map_err(|e| MergeError::InvalidArgument(e.to_string()))?;
        } else {
            self.0
                .peers
                .add(peer)
                .map_err(|e| MergeError::InvalidArgument(e.to_string()))?;
        }
        tracing::info!("device {} online", device_id);
        self.remerge().await
    }

    pub async fn peer_offline(&self, device_id: DeviceId) -> Result<(), MergeError> {
        self.0
            .peers
            .set_status(device_id, PeerStatus::Offline)
            .map_err(|e| MergeError::InvalidArgument(e.to_string()))?;
        tracing::info!("device {} offline", device_id);
        self.remerge().await
    }

    async fn remerge(&self) -> Result<(), MergeError> {
        self.rebuild_root().await?;
        for node in self.0.cache.remove_descendants(self.0.root.path()) {
            node.release().await;
        }
        Ok(())
    }

    /* Lifecycle */

    /// Drop `node` from the cache and release its comrades
    pub async fn evict(&self, node: &Arc<MergeNode>) {
        if node.is_root() {
            return;
        }
        self.0.cache.remove_node(node);
        node.release().await;
    }

    /// Evict every cached node below `node`
    pub async fn evict_descendants(&self, node: &MergeNode) {
        for child in self.0.cache.remove_descendants(node.path()) {
            child.release().await;
        }
    }

    /* Attributes */

    /// Attributes synthesized from the node's comrades
    pub fn attr(&self, node: &MergeNode) -> Result<MergeAttr, MergeError> {
        node.attr()
            .ok_or_else(|| MergeError::NotFound(node.path().to_string()))
    }

    /// Live metadata of the authoritative (first) comrade
    pub async fn getattr(&self, node: &MergeNode) -> Result<Metadata, MergeError> {
        let first = node
            .registry()
            .first()
            .ok_or_else(|| MergeError::NotFound(node.path().to_string()))?;
        let meta = self.0.store.getattr(first.path()).await?;
        first.entry().refresh(meta.clone());
        Ok(meta)
    }

    /// Apply size and time changes to the first comrade only.
    ///  Ownership and permission changes are not propagated.
    pub async fn setattr(&self, node: &MergeNode, attr: SetAttr) -> Result<Metadata, MergeError> {
        let attr = SetAttr {
            mode: None,
            uid: None,
            gid: None,
            ..attr
        };
        let first = node
            .registry()
            .first()
            .ok_or_else(|| MergeError::NotFound(node.path().to_string()))?;
        if attr.is_empty() {
            return Ok(first.entry().metadata());
        }
        let meta = self.0.store.setattr(first.path(), &attr).await?;
        first.entry().refresh(meta.clone());
        Ok(meta)
    }

    /* Paths */

    /// Resolve a `/`-separated logical path from the root
    pub async fn lookup_path(&self, path: &str) -> Result<Arc<MergeNode>, MergeError> {
        let mut node = self.root();
        for name in path.split('/').filter(|p| !p.is_empty()) {
            node = self.lookup(&node, name, LookupFlags::default()).await?;
        }
        Ok(node)
    }

    /// Resolve the parent of a logical path, returning it with the final name
    pub async fn lookup_parent<'a>(
        &self,
        path: &'a str,
    ) -> Result<(Arc<MergeNode>, &'a str), MergeError> {
        let trimmed = path.trim_end_matches('/');
        let (parent, name) = match trimmed.rfind('/') {
            Some(idx) => (&trimmed[..idx], &trimmed[idx + 1..]),
            None => ("", trimmed),
        };
        if name.is_empty() {
            return Err(MergeError::InvalidArgument(format!(
                "{:?} has no final component",
                path
            )));
        }
        Ok((self.lookup_path(parent).await?, name))
    }
}
