use std::sync::Arc;

use super::codec::{self, NameKind};
use super::comrade::Comrade;
use super::lookup::LookupFlags;
use super::node::MergeNode;
use super::registry::RejectReason;
use super::view::MergeView;
use super::MergeError;
use crate::backing::{EntryKind, StoreError, DIR_MODE, FILE_MODE};
use crate::device::DeviceId;

impl MergeView {
    /// Create a regular file under `parent` on the local device
    pub async fn create(
        &self,
        parent: &Arc<MergeNode>,
        name: &str,
        exclusive: bool,
    ) -> Result<Arc<MergeNode>, MergeError> {
        self.create_child(parent, name, EntryKind::Reg, exclusive)
            .await
    }

    /// Create a directory under `parent` on the local device
    pub async fn mkdir(
        &self,
        parent: &Arc<MergeNode>,
        name: &str,
    ) -> Result<Arc<MergeNode>, MergeError> {
        self.create_child(parent, name, EntryKind::Dir, true).await
    }

    async fn create_child(
        &self,
        parent: &Arc<MergeNode>,
        name: &str,
        kind: EntryKind,
        exclusive: bool,
    ) -> Result<Arc<MergeNode>, MergeError> {
        check_new_name(name)?;

        let _dir = parent.lock_ops().await;
        let (node, _entry) = self
            .lookup_locked(parent, name, LookupFlags::create())
            .await?;
        node.work().wait_idle().await;
        if !node.is_empty() {
            return Err(MergeError::AlreadyExists(node.path().to_string()));
        }

        match self.materialize(parent, &node, kind, exclusive).await {
            Ok(()) => Ok(node),
            Err(e) => {
                tracing::error!("failed to create {}: {}", node.path(), e);
                self.evict(&node).await;
                Err(e)
            }
        }
    }

    /// Create `node` in the local backing directory of `parent`,
    ///  materializing missing local ancestors first.
    async fn materialize(
        &self,
        parent: &Arc<MergeNode>,
        node: &Arc<MergeNode>,
        kind: EntryKind,
        exclusive: bool,
    ) -> Result<(), MergeError> {
        let parent_local = self.ensure_local_dir(parent).await?;
        let path = self.local_child_path(&parent_local, node)?;

        let entry = match kind {
            EntryKind::Dir => self.store().mkdir(&path, DIR_MODE).await?,
            _ => self.store().create(&path, FILE_MODE, exclusive).await?,
        };
        node.registry()
            .attach_validated(Comrade::new(DeviceId::LOCAL, entry))
            .map_err(|r| r.into_error(&path))?;

        if let Err(e) = parent.refresh_attr(self.store().as_ref()).await {
            tracing::warn!("failed to refresh {}: {}", parent.path(), e);
        }
        if kind.is_dir() {
            parent.bump_nlink(1);
        }
        tracing::debug!("created {} at {}", node.path(), path);
        Ok(())
    }

    /// Local comrade of `node`, creating the directory (and every missing
    ///  ancestor) on the local device if needed.
    ///
    /// Walks up until an ancestor with a local comrade is found, then back
    ///  down one level at a time. Each level waits for its in-flight lookups
    ///  before its comrade list is read, and each path is checked against
    ///  the limit before anything at that level is touched.
    pub async fn ensure_local_dir(&self, node: &Arc<MergeNode>) -> Result<Comrade, MergeError> {
        let max_depth = self.config().max_path_len / 2;
        let mut missing: Vec<Arc<MergeNode>> = Vec::new();
        let mut current = node.clone();

        let mut local = loop {
            current.work().wait_idle().await;
            if !current.is_dir() {
                return Err(MergeError::NotADirectory(current.path().to_string()));
            }
            if let Some(local) = current.registry().for_device(DeviceId::LOCAL) {
                break local;
            }
            let Some(parent) = current.parent().cloned() else {
                return Err(MergeError::NotFound(format!(
                    "no local root for {}",
                    node.path()
                )));
            };
            if missing.len() >= max_depth {
                return Err(MergeError::NameTooLong(node.path().to_string()));
            }
            missing.push(current);
            current = parent;
        };

        while let Some(level) = missing.pop() {
            let path = self.local_child_path(&local, &level)?;
            let entry = match self.store().mkdir(&path, DIR_MODE).await {
                Ok(entry) => entry,
                Err(StoreError::AlreadyExists(_)) => self.store().lookup(&path).await?,
                Err(e) => return Err(e.into()),
            };
            let comrade = Comrade::new(DeviceId::LOCAL, entry);
            match level.registry().attach_validated(comrade.clone()) {
                Ok(()) => {
                    if let Some(parent) = level.parent() {
                        parent.bump_nlink(1);
                    }
                    tracing::debug!("materialized local directory {}", path);
                    local = comrade;
                }
                // a racing lookup attached the local entry first
                Err(r) if r.reason == RejectReason::Duplicate => {
                    local = level.registry().for_device(DeviceId::LOCAL).unwrap_or(comrade);
                }
                Err(r) => return Err(r.into_error(&path)),
            }
        }
        Ok(local)
    }

    fn local_child_path(&self, parent: &Comrade, node: &MergeNode) -> Result<String, MergeError> {
        let path = format!("{}/{}", parent.path(), node.real_name());
        if path.len() > self.config().max_path_len {
            return Err(MergeError::NameTooLong(path));
        }
        Ok(path)
    }
}

/// Names given to new or renamed entries must be plain real names
pub(crate) fn check_new_name(name: &str) -> Result<(), MergeError> {
    if codec::classify(name) != NameKind::Common
        || name.contains(codec::CONFLICTING_FILE_SUFFIX)
        || name.contains(codec::CONFLICTING_DIR_SUFFIX)
    {
        return Err(MergeError::PermissionDenied(format!(
            "{} is a conflict name",
            name
        )));
    }
    if !codec::is_valid_real_name(name) {
        return Err(MergeError::InvalidArgument(format!("bad name {:?}", name)));
    }
    Ok(())
}
