use std::time::Duration;

use anyhow::Result;

use crate::backing::{EntryKind, Gate, MemoryStore, StoreOp};
use crate::device::{DeviceId, DeviceSelector};

/// Handle on one device's subtree inside a [`TestCluster`](super::TestCluster)
#[derive(Debug, Clone)]
pub struct TestDevice {
    id: DeviceId,
    selector: DeviceSelector,
    store: MemoryStore,
}

impl TestDevice {
    pub(crate) fn new(id: DeviceId, selector: DeviceSelector, store: MemoryStore) -> Self {
        Self {
            id,
            selector,
            store,
        }
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    /// `device_view/<selector>`
    pub fn root(&self) -> String {
        self.selector.root()
    }

    /// Backing path of a path relative to this device's root
    pub fn path(&self, rel: &str) -> String {
        let rel = rel.trim_matches('/');
        if rel.is_empty() {
            self.root()
        } else {
            format!("{}/{}", self.root(), rel)
        }
    }

    /* Seeding */

    pub fn add_dir(&self, rel: &str) -> Result<()> {
        self.store.add_dir(&self.path(rel))?;
        Ok(())
    }

    pub fn add_file(&self, rel: &str, size: u64) -> Result<()> {
        self.store.add_file(&self.path(rel), size)?;
        Ok(())
    }

    pub fn set_mtime(&self, rel: &str, mtime: std::time::SystemTime) -> Result<()> {
        self.store.set_mtime(&self.path(rel), mtime)?;
        Ok(())
    }

    /* Inspection */

    pub fn exists(&self, rel: &str) -> bool {
        self.store.exists(&self.path(rel))
    }

    pub fn kind(&self, rel: &str) -> Option<EntryKind> {
        self.store.kind(&self.path(rel))
    }

    /// Lookups that reached this device, as backing paths
    pub fn lookups(&self) -> Vec<String> {
        let root = self.root();
        let prefix = format!("{}/", root);
        self.store
            .lookups()
            .into_iter()
            .filter(|p| *p == root || p.starts_with(&prefix))
            .collect()
    }

    /* Faults */

    pub fn delay(&self, delay: Duration) {
        self.store.delay(&self.root(), delay);
    }

    pub fn fail(&self, op: Option<StoreOp>) {
        self.store.fail(&self.root(), op);
    }

    /// Hold every lookup on this device until the gate opens
    pub fn gate(&self) -> Gate {
        self.store.gate(&self.root())
    }

    /// Hold lookups of the entry at `rel` only, leaving its children alone
    pub fn gate_entry(&self, rel: &str) -> Gate {
        self.store.gate_exact(&self.path(rel))
    }
}
