use std::sync::Arc;

use super::create::check_new_name;
use super::lookup::LookupFlags;
use super::node::MergeNode;
use super::registry::NodeKind;
use super::view::MergeView;
use super::MergeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RemoveKind {
    Unlink,
    Rmdir,
}

impl MergeView {
    /// Remove a regular file from every device that backs it
    pub async fn unlink(&self, parent: &Arc<MergeNode>, name: &str) -> Result<(), MergeError> {
        self.remove(parent, name, RemoveKind::Unlink).await
    }

    /// Remove a directory from every device that backs it
    pub async fn rmdir(&self, parent: &Arc<MergeNode>, name: &str) -> Result<(), MergeError> {
        self.remove(parent, name, RemoveKind::Rmdir).await
    }

    async fn remove(
        &self,
        parent: &Arc<MergeNode>,
        name: &str,
        kind: RemoveKind,
    ) -> Result<(), MergeError> {
        check_new_name(name)?;
        let _dir = parent.lock_ops().await;
        let (node, _entry) = self
            .lookup_locked(parent, name, LookupFlags::default())
            .await?;
        node.work().wait_idle().await;

        match (kind, node.kind()) {
            (RemoveKind::Unlink, NodeKind::Dir) => {
                return Err(MergeError::IsADirectory(node.path().to_string()))
            }
            (RemoveKind::Rmdir, NodeKind::Reg) => {
                return Err(MergeError::NotADirectory(node.path().to_string()))
            }
            _ => {}
        }

        for comrade in node.registry().snapshot() {
            let result = match kind {
                RemoveKind::Unlink => {
                    // the entry may have moved since it was cached
                    match self.store().lookup(comrade.path()).await {
                        Ok(entry) => self.store().unlink(entry.path()).await,
                        Err(e) => Err(e),
                    }
                }
                RemoveKind::Rmdir => self.store().rmdir(comrade.path()).await,
            };
            if let Err(e) = result {
                tracing::error!(
                    "failed to remove {} on device {}: {}",
                    comrade.path(),
                    comrade.device(),
                    e
                );
                return Err(e.into());
            }
            drop(node.registry().take(comrade.device()));
        }

        if let Err(e) = parent.refresh_attr(self.store().as_ref()).await {
            tracing::warn!("failed to refresh {}: {}", parent.path(), e);
        }
        if kind == RemoveKind::Rmdir {
            parent.bump_nlink(-1);
        }
        self.evict(&node).await;
        Ok(())
    }
}
