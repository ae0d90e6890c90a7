use crate::backing::{EntryKind, EntryRef};
use crate::device::DeviceId;

/// One backing entry on one device, contributing to a merge node.
///  Owns one reference to the entry; cloning takes another.
#[derive(Debug, Clone)]
pub struct Comrade {
    device: DeviceId,
    entry: EntryRef,
}

impl Comrade {
    pub fn new(device: DeviceId, entry: EntryRef) -> Self {
        Self { device, entry }
    }

    /* Getters */

    pub fn device(&self) -> DeviceId {
        self.device
    }

    pub fn entry(&self) -> &EntryRef {
        &self.entry
    }

    pub fn path(&self) -> &str {
        self.entry.path()
    }

    pub fn kind(&self) -> EntryKind {
        self.entry.kind()
    }

    pub fn is_local(&self) -> bool {
        self.device.is_local()
    }

    /// Move this comrade to a new backing path, giving up the old reference
    pub fn rebind(self, path: impl Into<String>) -> Self {
        let entry = self.entry.rebind(path);
        Self {
            device: self.device,
            entry,
        }
    }
}
