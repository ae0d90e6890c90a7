use std::sync::Arc;

use super::create::check_new_name;
use super::lookup::LookupFlags;
use super::node::MergeNode;
use super::registry::NodeKind;
use super::view::MergeView;
use super::MergeError;

/// Rename flags, bit-compatible with `renameat2`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenameFlags(pub u32);

impl RenameFlags {
    pub const NOREPLACE: u32 = 1 << 0;
    pub const EXCHANGE: u32 = 1 << 1;
    pub const WHITEOUT: u32 = 1 << 2;

    pub fn no_replace() -> Self {
        Self(Self::NOREPLACE)
    }

    pub fn is_no_replace(&self) -> bool {
        self.0 & Self::NOREPLACE != 0
    }

    fn unsupported(&self) -> u32 {
        self.0 & !Self::NOREPLACE
    }
}

impl MergeView {
    /// Rename `old_name` to `new_name` within the same logical directory.
    ///
    /// Each comrade moves on its own device, and only on devices that also
    ///  back the destination directory; other devices are left untouched.
    ///  The first backing failure stops the walk, leaving comrades already
    ///  moved in their new place.
    pub async fn rename(
        &self,
        old_parent: &Arc<MergeNode>,
        old_name: &str,
        new_parent: &Arc<MergeNode>,
        new_name: &str,
        flags: RenameFlags,
    ) -> Result<(), MergeError> {
        if flags.unsupported() != 0 {
            return Err(MergeError::InvalidArgument(format!(
                "unsupported rename flags {:#x}",
                flags.unsupported()
            )));
        }
        check_new_name(old_name)?;
        check_new_name(new_name)?;
        if old_parent.path() != new_parent.path() {
            return Err(MergeError::CrossDirectory {
                from: old_parent.child_path(old_name),
                to: new_parent.child_path(new_name),
            });
        }

        if !Arc::ptr_eq(old_parent, new_parent) {
            // two live nodes never share a path, so one of these was released
            let dead = if old_parent.is_dead() { old_parent } else { new_parent };
            return Err(MergeError::Stale(dead.path().to_string()));
        }

        let _dir = new_parent.lock_ops().await;
        let (old, _old_entry) = self
            .lookup_locked(old_parent, old_name, LookupFlags::default())
            .await?;
        if old_name == new_name {
            return Ok(());
        }
        let (new, _new_entry) = self
            .lookup_locked(new_parent, new_name, LookupFlags::rename_target())
            .await?;

        // every device backing the directory must be known before deciding
        //  where each comrade can move
        new_parent.work().wait_idle().await;
        old.work().wait_idle().await;
        new.work().wait_idle().await;
        if !new.is_empty() {
            if flags.is_no_replace() {
                return Err(MergeError::AlreadyExists(new.path().to_string()));
            }
            // entries being replaced are overwritten per device below
            drop(new.registry().reset());
        }

        match self
            .move_comrades(&old, new_parent, &new, flags.is_no_replace())
            .await
        {
            Ok(moved) => {
                tracing::debug!(
                    "renamed {} -> {} on {} device(s)",
                    old.path(),
                    new.path(),
                    moved
                );
                if old.kind() == NodeKind::Reg || old.is_empty() {
                    self.evict(&old).await;
                }
                self.evict_descendants(&old).await;
                if let Err(e) = new_parent.refresh_attr(self.store().as_ref()).await {
                    tracing::warn!("failed to refresh {}: {}", new_parent.path(), e);
                }
                Ok(())
            }
            Err(e) => {
                tracing::error!("rename {} -> {} failed: {}", old.path(), new.path(), e);
                self.evict(&new).await;
                Err(e)
            }
        }
    }

    async fn move_comrades(
        &self,
        old: &MergeNode,
        new_parent: &MergeNode,
        new: &MergeNode,
        no_replace: bool,
    ) -> Result<usize, MergeError> {
        let mut moved = 0;
        for comrade in old.registry().snapshot() {
            let device = comrade.device();
            let Some(dst_parent) = new_parent.registry().for_device(device) else {
                tracing::debug!(
                    "device {} has no comrade for {}, leaving {} in place",
                    device,
                    new_parent.path(),
                    comrade.path()
                );
                continue;
            };
            let to = format!("{}/{}", dst_parent.path(), new.real_name());
            if to.len() > self.config().max_path_len {
                return Err(MergeError::NameTooLong(to));
            }
            self.store().rename(comrade.path(), &to, no_replace).await?;

            let Some(taken) = old.registry().take(device) else {
                continue;
            };
            if let Err(rejected) = new.registry().attach_validated(taken.rebind(to)) {
                tracing::warn!(
                    "moved comrade for device {} not attached to {}: {:?}",
                    device,
                    new.path(),
                    rejected.reason
                );
            }
            moved += 1;
        }
        Ok(moved)
    }
}
