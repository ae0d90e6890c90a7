use std::sync::Arc;

use parking_lot::RwLock;

use super::{Cid, DeviceId, DeviceSelector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerStatus {
    Online,
    Offline,
}

/// A remote device known to this instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerConnection {
    pub device_id: DeviceId,
    pub cid: Cid,
    pub status: PeerStatus,
}

impl PeerConnection {
    pub fn new(device_id: DeviceId, cid: Cid) -> Self {
        Self {
            device_id,
            cid,
            status: PeerStatus::Online,
        }
    }

    pub fn is_online(&self) -> bool {
        self.status == PeerStatus::Online
    }

    pub fn selector(&self) -> DeviceSelector {
        DeviceSelector::Remote(self.cid.clone())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("device id {0} is reserved for the local device")]
    ReservedDeviceId(DeviceId),
    #[error("device {0} is already registered")]
    DuplicateDevice(DeviceId),
    #[error("connection id {0} is already registered")]
    DuplicateCid(Cid),
    #[error("device {0} is not registered")]
    UnknownDevice(DeviceId),
}

/// Lock-guarded list of remote devices.
///  Cheap to clone; all clones share the same list.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    peers: Arc<RwLock<Vec<PeerConnection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, peer: PeerConnection) -> Result<(), RegistryError> {
        if peer.device_id.is_local() {
            return Err(RegistryError::ReservedDeviceId(peer.device_id));
        }
        let mut peers = self.peers.write();
        if peers.iter().any(|p| p.device_id == peer.device_id) {
            return Err(RegistryError::DuplicateDevice(peer.device_id));
        }
        if peers.iter().any(|p| p.cid == peer.cid) {
            return Err(RegistryError::DuplicateCid(peer.cid));
        }
        tracing::debug!("registering device {} ({})", peer.device_id, peer.cid);
        peers.push(peer);
        Ok(())
    }

    pub fn remove(&self, device_id: DeviceId) -> Result<PeerConnection, RegistryError> {
        let mut peers = self.peers.write();
        let idx = peers
            .iter()
            .position(|p| p.device_id == device_id)
            .ok_or(RegistryError::UnknownDevice(device_id))?;
        Ok(peers.remove(idx))
    }

    pub fn set_status(&self, device_id: DeviceId, status: PeerStatus) -> Result<(), RegistryError> {
        let mut peers = self.peers.write();
        let peer = peers
            .iter_mut()
            .find(|p| p.device_id == device_id)
            .ok_or(RegistryError::UnknownDevice(device_id))?;
        peer.status = status;
        Ok(())
    }

    pub fn get(&self, device_id: DeviceId) -> Option<PeerConnection> {
        self.peers
            .read()
            .iter()
            .find(|p| p.device_id == device_id)
            .cloned()
    }

    /// Snapshot of every online peer, in registration order
    pub fn online(&self) -> Vec<PeerConnection> {
        self.peers
            .read()
            .iter()
            .filter(|p| p.is_online())
            .cloned()
            .collect()
    }

    pub fn all(&self) -> Vec<PeerConnection> {
        self.peers.read().clone()
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }
}
