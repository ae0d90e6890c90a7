use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};

use super::device::TestDevice;
use crate::backing::MemoryStore;
use crate::config::MergeConfig;
use crate::device::{Cid, ConnectionRegistry, DeviceId, DeviceSelector, PeerConnection, PeerStatus};
use crate::merge::MergeView;

/// A local device plus any number of remote devices sharing one
///  in-memory backing store
#[derive(Debug)]
pub struct TestCluster {
    store: MemoryStore,
    peers: ConnectionRegistry,
    config: MergeConfig,
    local: TestDevice,
    devices: BTreeMap<u64, TestDevice>,
}

impl Default for TestCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl TestCluster {
    pub fn new() -> Self {
        Self::with_config(MergeConfig {
            lookup_workers: 4,
            ..Default::default()
        })
    }

    pub fn with_config(config: MergeConfig) -> Self {
        let store = MemoryStore::new();
        let local = TestDevice::new(DeviceId::LOCAL, DeviceSelector::Local, store.clone());
        // the local root always exists
        let _ = store.add_dir(&local.root());
        Self {
            store,
            peers: ConnectionRegistry::new(),
            config,
            local,
            devices: BTreeMap::new(),
        }
    }

    /// Register an online remote device and create its root
    pub fn add_device(&mut self, id: u64) -> Result<TestDevice> {
        let device_id = DeviceId(id);
        let cid = Cid::from_device(device_id);
        self.peers.add(PeerConnection::new(device_id, cid.clone()))?;
        let device = TestDevice::new(device_id, DeviceSelector::Remote(cid), self.store.clone());
        device.add_dir("")?;
        self.devices.insert(id, device.clone());
        tracing::debug!("test cluster added device {}", id);
        Ok(device)
    }

    /// Register a remote device that starts out offline
    pub fn add_offline_device(&mut self, id: u64) -> Result<TestDevice> {
        let device = self.add_device(id)?;
        self.peers.set_status(DeviceId(id), PeerStatus::Offline)?;
        Ok(device)
    }

    /* Getters */

    pub fn local(&self) -> &TestDevice {
        &self.local
    }

    pub fn device(&self, id: u64) -> Result<&TestDevice> {
        if id == 0 {
            return Ok(&self.local);
        }
        self.devices
            .get(&id)
            .ok_or_else(|| anyhow!("device {} is not part of the cluster", id))
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn peers(&self) -> &ConnectionRegistry {
        &self.peers
    }

    pub fn config_mut(&mut self) -> &mut MergeConfig {
        &mut self.config
    }

    /// Mount a view over the cluster
    pub async fn mount(&self) -> Result<MergeView> {
        let view = MergeView::mount(
            Arc::new(self.store.clone()),
            self.peers.clone(),
            self.config.clone(),
        )
        .await?;
        self.store.clear_log();
        Ok(view)
    }
}
