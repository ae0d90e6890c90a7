use std::sync::Arc;

use tokio::sync::OwnedMutexGuard;

use super::codec::{self, DecodedName};
use super::dispatch::LookupTask;
use super::node::{MergeNode, NodeLayer};
use super::revalidate::Validity;
use super::view::MergeView;
use super::MergeError;
use crate::device::{DeviceId, DeviceSelector};

/// Intent of a lookup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LookupFlags {
    /// The caller will create the entry if it is missing
    pub create: bool,
    /// The entry is the target of a rename
    pub rename_target: bool,
    /// Skip the cache even if it looks valid
    pub revalidate: bool,
}

impl LookupFlags {
    pub fn create() -> Self {
        Self {
            create: true,
            ..Default::default()
        }
    }

    pub fn rename_target() -> Self {
        Self {
            create: true,
            rename_target: true,
            ..Default::default()
        }
    }

}

impl MergeView {
    /// Resolve `name` below `parent`.
    ///
    /// A cached node is reused if it revalidates, and a node whose fan-out
    ///  is still running is joined instead of replaced. Otherwise a fresh
    ///  node is fanned out to every candidate device and returned as soon
    ///  as one device answers. With `flags.create` a miss yields an empty
    ///  node for the caller to populate.
    pub async fn lookup(
        &self,
        parent: &Arc<MergeNode>,
        name: &str,
        flags: LookupFlags,
    ) -> Result<Arc<MergeNode>, MergeError> {
        if name.len() > self.config().max_name_len {
            return Err(MergeError::NameTooLong(name.to_string()));
        }
        if name.is_empty() || name.contains('/') || name == "." || name == ".." {
            return Err(MergeError::InvalidArgument(format!("bad name {:?}", name)));
        }
        if parent.is_dead() {
            return Err(MergeError::Stale(parent.path().to_string()));
        }
        if !parent.is_dir() {
            return Err(MergeError::NotADirectory(parent.path().to_string()));
        }

        let path = parent.child_path(name);
        if let Some(cached) = self.cache().get(&path) {
            if let Some(node) = self.reuse(&cached, flags).await {
                return Ok(node);
            }
        }

        let decoded = codec::decode(name);
        let layer = if parent.is_root() && self.config().is_trusted(name) {
            NodeLayer::Trusted
        } else {
            NodeLayer::Normal
        };
        let fresh = MergeNode::child(parent, name, &decoded, layer, self.next_ino());
        let (node, inserted) = self.cache().get_or_insert(fresh);
        if inserted {
            if let Err(e) = self.fan_out(&node, &decoded) {
                self.evict(&node).await;
                return Err(e);
            }
        }
        node.work().wait_first_hit().await;

        if node.is_empty() {
            if flags.create {
                tracing::debug!("{} not found, returning negative node", path);
                return Ok(node);
            }
            if inserted {
                // a create that joined this node may be filling it
                let _guard = node.lock_ops().await;
                if !node.is_empty() {
                    return Ok(node);
                }
                self.evict(&node).await;
            }
            return Err(MergeError::NotFound(path));
        }
        Ok(node)
    }

    /// Look up `name` and take its operation lock, for callers about to
    ///  change it. A node released before the lock was won is looked up
    ///  again.
    pub(crate) async fn lookup_locked(
        &self,
        parent: &Arc<MergeNode>,
        name: &str,
        flags: LookupFlags,
    ) -> Result<(Arc<MergeNode>, OwnedMutexGuard<()>), MergeError> {
        loop {
            let node = self.lookup(parent, name, flags).await?;
            let guard = node.lock_ops().await;
            if !node.is_dead() {
                return Ok((node, guard));
            }
            tracing::debug!("{} released while waiting, looking up again", node.path());
        }
    }

    /// Decide whether a cached node can be handed out as is
    async fn reuse(&self, node: &Arc<MergeNode>, flags: LookupFlags) -> Option<Arc<MergeNode>> {
        // an entry being created or renamed into is judged once that is done
        if node.is_busy() {
            node.wait_unlocked().await;
        }
        if !node.work().is_idle() {
            node.work().wait_first_hit().await;
            if !node.is_empty() && !flags.revalidate {
                return Some(node.clone());
            }
        }
        if self.revalidate(node, flags).await == Validity::Valid {
            return Some(node.clone());
        }
        // only evict once no operation holds the node, and only if it is
        //  still stale then
        let _guard = node.lock_ops().await;
        if !flags.revalidate && self.revalidate(node, flags).await == Validity::Valid {
            return Some(node.clone());
        }
        self.evict(node).await;
        None
    }

    /// Queue one lookup per candidate device and return without waiting.
    ///  A regular-file conflict name only queries its owning device.
    fn fan_out(&self, node: &Arc<MergeNode>, decoded: &DecodedName) -> Result<(), MergeError> {
        let candidates: Vec<(DeviceId, DeviceSelector)> = match decoded.owner() {
            Some(owner) if owner.is_local() => vec![(DeviceId::LOCAL, DeviceSelector::Local)],
            Some(owner) => self
                .peers()
                .get(owner)
                .filter(|p| p.is_online())
                .map(|p| (p.device_id, p.selector()))
                .into_iter()
                .collect(),
            None => std::iter::once((DeviceId::LOCAL, DeviceSelector::Local))
                .chain(
                    self.peers()
                        .online()
                        .into_iter()
                        .map(|p| (p.device_id, p.selector())),
                )
                .collect(),
        };

        let max_path = self.config().max_path_len;
        let tasks: Vec<LookupTask> = candidates
            .into_iter()
            .filter_map(|(device, selector)| {
                let path = format!("{}{}", selector.root(), node.real_path());
                if path.len() > max_path {
                    tracing::warn!("skipping device {}: {} exceeds path limit", device, path);
                    return None;
                }
                Some(LookupTask {
                    device,
                    path,
                    node: node.clone(),
                })
            })
            .collect();

        if tasks.is_empty() && decoded.owner().is_none() {
            return Err(MergeError::NameTooLong(node.path().to_string()));
        }

        // counted up front so no task can drain the group early
        let total = tasks.len();
        node.work().begin(total);
        let mut first_error = None;
        let mut failed = 0;
        for task in tasks {
            if let Err(e) = self.inner().dispatcher.dispatch(task) {
                node.work().finish(false);
                failed += 1;
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) if failed == total => {
                tracing::error!("no lookup could be queued for {}: {}", node.path(), e);
                Err(e)
            }
            Some(e) => {
                tracing::warn!("partial fan-out for {}: {}", node.path(), e);
                Ok(())
            }
            None => {
                tracing::debug!("fanned {} out to {} device(s)", node.path(), total);
                Ok(())
            }
        }
    }
}
