use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use super::codec::{DecodedName, NameKind};
use super::registry::{ComradeRegistry, MergeAttr, NodeKind};
use super::work::LookupGroup;
use crate::backing::BackingStore;

/// Where a node sits in the merge view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeLayer {
    /// The view root
    Root,
    /// Configured top-level names that are never revalidated
    Trusted,
    Normal,
}

/// One logical entry of the merge view
#[derive(Debug)]
pub struct MergeNode {
    ino: u64,
    /// Display name, empty for the root
    name: String,
    /// Logical path made of display names, `""` for the root and
    ///  `/a/b` below it
    path: String,
    /// Same path made of real backing names
    real_path: String,
    layer: NodeLayer,
    parent: Option<Arc<MergeNode>>,
    registry: ComradeRegistry,
    work: LookupGroup,
    /// Link count adjustment on top of the synthesized count
    nlink_bias: AtomicI64,
    dead: AtomicBool,
    /// Held on a directory while its entries change, and on an entry
    ///  while it is being created or renamed into
    op_lock: Arc<Mutex<()>>,
}

impl MergeNode {
    pub fn root(ino: u64) -> Arc<Self> {
        Arc::new(Self {
            ino,
            name: String::new(),
            path: String::new(),
            real_path: String::new(),
            layer: NodeLayer::Root,
            parent: None,
            registry: ComradeRegistry::new(NodeKind::Dir),
            work: LookupGroup::new(),
            nlink_bias: AtomicI64::new(0),
            dead: AtomicBool::new(false),
            op_lock: Arc::new(Mutex::new(())),
        })
    }

    /// A fresh, comrade-less child of `parent`. Names that encode a
    ///  directory or a regular file start out with that kind.
    pub fn child(
        parent: &Arc<MergeNode>,
        display: &str,
        decoded: &DecodedName,
        layer: NodeLayer,
        ino: u64,
    ) -> Arc<Self> {
        let kind = match decoded.kind {
            NameKind::Common => NodeKind::Unknown,
            NameKind::Dir => NodeKind::Dir,
            NameKind::Reg => NodeKind::Reg,
        };
        Arc::new(Self {
            ino,
            name: display.to_string(),
            path: format!("{}/{}", parent.path, display),
            real_path: format!("{}/{}", parent.real_path, decoded.real),
            layer,
            parent: Some(parent.clone()),
            registry: ComradeRegistry::new(kind),
            work: LookupGroup::new(),
            nlink_bias: AtomicI64::new(0),
            dead: AtomicBool::new(false),
            op_lock: Arc::new(Mutex::new(())),
        })
    }

    /* Getters */

    pub fn ino(&self) -> u64 {
        self.ino
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn real_path(&self) -> &str {
        &self.real_path
    }

    /// Last component of the real path
    pub fn real_name(&self) -> &str {
        self.real_path
            .rsplit('/')
            .next()
            .unwrap_or(self.real_path.as_str())
    }

    pub fn layer(&self) -> NodeLayer {
        self.layer
    }

    pub fn parent(&self) -> Option<&Arc<MergeNode>> {
        self.parent.as_ref()
    }

    pub fn registry(&self) -> &ComradeRegistry {
        &self.registry
    }

    pub fn work(&self) -> &LookupGroup {
        &self.work
    }

    pub fn kind(&self) -> NodeKind {
        self.registry.kind()
    }

    pub fn is_root(&self) -> bool {
        self.layer == NodeLayer::Root
    }

    pub fn is_dir(&self) -> bool {
        self.kind() == NodeKind::Dir
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn is_dead(&self) -> bool {
        self.dead.load(Ordering::Acquire)
    }

    /// Take the node's operation lock
    pub async fn lock_ops(&self) -> OwnedMutexGuard<()> {
        self.op_lock.clone().lock_owned().await
    }

    /// Whether a create, rename or remove currently holds the node
    pub fn is_busy(&self) -> bool {
        self.op_lock.try_lock().is_err()
    }

    /// Wait until no operation holds the node
    pub async fn wait_unlocked(&self) {
        drop(self.op_lock.lock().await);
    }

    pub fn child_path(&self, display: &str) -> String {
        format!("{}/{}", self.path, display)
    }

    /// Whether `path` lies strictly below this node
    pub fn is_ancestor_of(&self, path: &str) -> bool {
        path.len() > self.path.len()
            && path.starts_with(&self.path)
            && path.as_bytes()[self.path.len()] == b'/'
    }

    /* Attributes */

    pub fn attr(&self) -> Option<MergeAttr> {
        let mut attr = self.registry.aggregate(self.ino)?;
        let bias = self.nlink_bias.load(Ordering::Relaxed);
        attr.nlink = (attr.nlink as i64 + bias).max(1) as u32;
        Some(attr)
    }

    pub fn bump_nlink(&self, delta: i64) {
        self.nlink_bias.fetch_add(delta, Ordering::Relaxed);
    }

    /// Reload every comrade's metadata from its backing store and drop any
    ///  link count adjustment. A failure on the first comrade is returned,
    ///  failures on the others are logged.
    pub async fn refresh_attr(&self, store: &dyn BackingStore) -> Result<(), super::MergeError> {
        for (idx, comrade) in self.registry.snapshot().into_iter().enumerate() {
            match store.getattr(comrade.path()).await {
                Ok(meta) => comrade.entry().refresh(meta),
                Err(e) if idx == 0 => return Err(e.into()),
                Err(e) => tracing::warn!(
                    "failed to refresh {} on device {}: {}",
                    comrade.path(),
                    comrade.device(),
                    e
                ),
            }
        }
        self.nlink_bias.store(0, Ordering::Relaxed);
        Ok(())
    }

    /* Lifecycle */

    /// Wait for in-flight lookups, then drop every comrade reference.
    ///  The node is dead afterwards and revalidates as stale.
    pub async fn release(&self) {
        self.work.wait_idle().await;
        self.dead.store(true, Ordering::Release);
        let comrades = self.registry.close();
        tracing::debug!("released {} comrades of {:?}", comrades.len(), self.path);
        drop(comrades);
    }
}
