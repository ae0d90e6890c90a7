use std::time::SystemTime;

use parking_lot::Mutex;

use super::comrade::Comrade;
use super::MergeError;
use crate::backing::{EntryKind, DIR_MODE, FILE_MODE};
use crate::device::DeviceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Unknown,
    Dir,
    Reg,
}

impl From<EntryKind> for NodeKind {
    fn from(kind: EntryKind) -> Self {
        match kind {
            EntryKind::Dir => NodeKind::Dir,
            EntryKind::Reg => NodeKind::Reg,
            EntryKind::Other => NodeKind::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Another comrade for the same device is already attached
    Duplicate,
    /// Comrade kind does not match the node kind
    KindMismatch,
    /// The node already has its single regular-file comrade
    RegularTaken,
    /// Neither a directory nor a regular file
    Unsupported,
    /// The node has been released
    Closed,
}

/// A comrade the registry refused. Dropping it releases its reference.
#[derive(Debug)]
pub struct Rejected {
    pub comrade: Comrade,
    pub reason: RejectReason,
}

impl Rejected {
    /// Error for an operation that could not attach its comrade at `path`
    pub fn into_error(self, path: &str) -> MergeError {
        match self.reason {
            RejectReason::Closed => MergeError::Stale(path.to_string()),
            reason => MergeError::TypeMismatch(format!("{}: {:?}", path, reason)),
        }
    }
}

/// Attributes synthesized from a node's comrades
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeAttr {
    pub ino: u64,
    pub kind: NodeKind,
    pub size: u64,
    pub nlink: u32,
    pub mode: u32,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
}

#[derive(Debug)]
struct RegistryInner {
    kind: NodeKind,
    comrades: Vec<Comrade>,
    closed: bool,
}

/// The comrade list of one merge node.
///  Every mutation happens under the list lock, which is never held
///  across an await point.
#[derive(Debug)]
pub struct ComradeRegistry {
    inner: Mutex<RegistryInner>,
}

impl ComradeRegistry {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                kind,
                comrades: Vec::new(),
                closed: false,
            }),
        }
    }

    /// Attach a comrade if it is compatible with the node.
    ///  The first accepted comrade fixes the node kind. Directories accept
    ///  one comrade per device; a regular file only ever has one comrade.
    ///  The local comrade always sits first.
    pub fn attach_validated(&self, comrade: Comrade) -> Result<(), Rejected> {
        let mut inner = self.inner.lock();
        let reject = |comrade, reason| Err(Rejected { comrade, reason });

        if inner.closed {
            return reject(comrade, RejectReason::Closed);
        }

        if inner
            .comrades
            .iter()
            .any(|c| c.device() == comrade.device())
        {
            tracing::warn!(
                "discarding duplicate comrade for device {} at {}",
                comrade.device(),
                comrade.path()
            );
            return reject(comrade, RejectReason::Duplicate);
        }

        let incoming = comrade.kind();
        match (inner.kind, incoming) {
            (_, EntryKind::Other) => return reject(comrade, RejectReason::Unsupported),
            (NodeKind::Unknown, kind) => inner.kind = kind.into(),
            (NodeKind::Dir, EntryKind::Dir) => {}
            (NodeKind::Reg, EntryKind::Reg) if inner.comrades.is_empty() => {}
            (NodeKind::Reg, EntryKind::Reg) => {
                return reject(comrade, RejectReason::RegularTaken)
            }
            _ => return reject(comrade, RejectReason::KindMismatch),
        }

        if comrade.is_local() {
            inner.comrades.insert(0, comrade);
        } else {
            inner.comrades.push(comrade);
        }
        Ok(())
    }

    /// Replace the whole list, keeping the local comrade first and
    ///  dropping duplicates.
    pub fn replace(&self, comrades: Vec<Comrade>) -> Vec<Comrade> {
        let mut next: Vec<Comrade> = Vec::with_capacity(comrades.len());
        for comrade in comrades {
            if next.iter().any(|c| c.device() == comrade.device()) {
                tracing::warn!("dropping duplicate comrade for device {}", comrade.device());
                continue;
            }
            if comrade.is_local() {
                next.insert(0, comrade);
            } else {
                next.push(comrade);
            }
        }
        let mut inner = self.inner.lock();
        std::mem::replace(&mut inner.comrades, next)
    }

    /* Getters */

    pub fn kind(&self) -> NodeKind {
        self.inner.lock().kind
    }

    pub fn len(&self) -> usize {
        self.inner.lock().comrades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().comrades.is_empty()
    }

    pub fn first(&self) -> Option<Comrade> {
        self.inner.lock().comrades.first().cloned()
    }

    pub fn for_device(&self, device: DeviceId) -> Option<Comrade> {
        self.inner
            .lock()
            .comrades
            .iter()
            .find(|c| c.device() == device)
            .cloned()
    }

    pub fn snapshot(&self) -> Vec<Comrade> {
        self.inner.lock().comrades.clone()
    }

    pub fn devices(&self) -> Vec<DeviceId> {
        self.inner.lock().comrades.iter().map(|c| c.device()).collect()
    }

    /* Removal */

    /// Detach the comrade of one device
    pub fn take(&self, device: DeviceId) -> Option<Comrade> {
        let mut inner = self.inner.lock();
        let idx = inner.comrades.iter().position(|c| c.device() == device)?;
        Some(inner.comrades.remove(idx))
    }

    /// Detach every comrade and refuse any later attach.
    ///  The caller drops them outside the lock.
    pub fn close(&self) -> Vec<Comrade> {
        let mut inner = self.inner.lock();
        inner.closed = true;
        std::mem::take(&mut inner.comrades)
    }

    /// Detach every comrade and forget the node kind
    pub fn reset(&self) -> Vec<Comrade> {
        let mut inner = self.inner.lock();
        inner.kind = NodeKind::Unknown;
        std::mem::take(&mut inner.comrades)
    }

    /// Synthesize attributes: the first comrade supplies size, atime and
    ///  ctime; mtime is the newest across all comrades.
    pub fn aggregate(&self, ino: u64) -> Option<MergeAttr> {
        let inner = self.inner.lock();
        let first = inner.comrades.first()?.entry().metadata();
        let mtime = inner
            .comrades
            .iter()
            .map(|c| c.entry().metadata().mtime)
            .max()
            .unwrap_or(first.mtime);
        let (nlink, mode) = match inner.kind {
            NodeKind::Dir => (inner.comrades.len() as u32 + 2, DIR_MODE),
            _ => (1, FILE_MODE),
        };
        Some(MergeAttr {
            ino,
            kind: inner.kind,
            size: first.size,
            nlink,
            mode,
            atime: first.atime,
            mtime,
            ctime: first.ctime,
        })
    }
}

#[cfg(test)]
mod test {
    use std::time::{Duration, UNIX_EPOCH};

    use super::*;
    use crate::backing::{BackingEntry, Metadata};

    fn comrade(device: u64, kind: EntryKind) -> Comrade {
        comrade_with(device, kind, 0, UNIX_EPOCH)
    }

    fn comrade_with(device: u64, kind: EntryKind, size: u64, mtime: SystemTime) -> Comrade {
        let meta = Metadata {
            kind,
            ino: device + 100,
            size,
            nlink: 1,
            mode: 0o644,
            atime: UNIX_EPOCH + Duration::from_secs(device),
            mtime,
            ctime: UNIX_EPOCH + Duration::from_secs(device),
        };
        Comrade::new(
            DeviceId(device),
            BackingEntry::new(format!("device_view/{}/x", device), meta),
        )
    }

    #[test]
    fn test_first_comrade_sets_kind() {
        let registry = ComradeRegistry::new(NodeKind::Unknown);
        registry.attach_validated(comrade(2, EntryKind::Dir)).unwrap();
        assert_eq!(registry.kind(), NodeKind::Dir);

        let rejected = registry
            .attach_validated(comrade(3, EntryKind::Reg))
            .unwrap_err();
        assert_eq!(rejected.reason, RejectReason::KindMismatch);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_local_comrade_sorted_first() {
        let registry = ComradeRegistry::new(NodeKind::Unknown);
        registry.attach_validated(comrade(2, EntryKind::Dir)).unwrap();
        registry.attach_validated(comrade(1, EntryKind::Dir)).unwrap();
        registry.attach_validated(comrade(0, EntryKind::Dir)).unwrap();
        assert_eq!(
            registry.devices(),
            vec![DeviceId(0), DeviceId(2), DeviceId(1)]
        );
        assert!(registry.first().unwrap().is_local());
    }

    #[test]
    fn test_single_regular_comrade() {
        let registry = ComradeRegistry::new(NodeKind::Unknown);
        registry.attach_validated(comrade(1, EntryKind::Reg)).unwrap();
        let rejected = registry
            .attach_validated(comrade(2, EntryKind::Reg))
            .unwrap_err();
        assert_eq!(rejected.reason, RejectReason::RegularTaken);

        // a node typed regular by its name accepts its one file
        let named = ComradeRegistry::new(NodeKind::Reg);
        assert_eq!(
            named
                .attach_validated(comrade(3, EntryKind::Dir))
                .unwrap_err()
                .reason,
            RejectReason::KindMismatch
        );
        named.attach_validated(comrade(3, EntryKind::Reg)).unwrap();
    }

    #[test]
    fn test_duplicate_device_discarded() {
        let registry = ComradeRegistry::new(NodeKind::Unknown);
        registry.attach_validated(comrade(4, EntryKind::Dir)).unwrap();
        let rejected = registry
            .attach_validated(comrade(4, EntryKind::Dir))
            .unwrap_err();
        assert_eq!(rejected.reason, RejectReason::Duplicate);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_rejected_comrade_releases_reference() {
        let registry = ComradeRegistry::new(NodeKind::Dir);
        let file = comrade(1, EntryKind::Reg);
        let entry = file.entry().clone();
        assert_eq!(std::sync::Arc::strong_count(&entry), 2);
        drop(registry.attach_validated(file));
        assert_eq!(std::sync::Arc::strong_count(&entry), 1);
    }

    #[test]
    fn test_aggregate_directory() {
        let registry = ComradeRegistry::new(NodeKind::Unknown);
        let newest = UNIX_EPOCH + Duration::from_secs(500);
        registry
            .attach_validated(comrade_with(3, EntryKind::Dir, 7, UNIX_EPOCH))
            .unwrap();
        registry
            .attach_validated(comrade_with(0, EntryKind::Dir, 4096, UNIX_EPOCH))
            .unwrap();
        registry
            .attach_validated(comrade_with(5, EntryKind::Dir, 9, newest))
            .unwrap();

        let attr = registry.aggregate(77).unwrap();
        assert_eq!(attr.ino, 77);
        assert_eq!(attr.size, 4096);
        assert_eq!(attr.atime, UNIX_EPOCH);
        assert_eq!(attr.mtime, newest);
        assert_eq!(attr.nlink, 5);
        assert_eq!(attr.mode, DIR_MODE);
    }

    #[test]
    fn test_aggregate_regular() {
        let registry = ComradeRegistry::new(NodeKind::Unknown);
        assert!(registry.aggregate(1).is_none());
        registry
            .attach_validated(comrade_with(2, EntryKind::Reg, 11, UNIX_EPOCH))
            .unwrap();
        let attr = registry.aggregate(1).unwrap();
        assert_eq!(attr.nlink, 1);
        assert_eq!(attr.size, 11);
        assert_eq!(attr.mode, FILE_MODE);
    }

    #[test]
    fn test_take_and_reset() {
        let registry = ComradeRegistry::new(NodeKind::Unknown);
        registry.attach_validated(comrade(0, EntryKind::Dir)).unwrap();
        registry.attach_validated(comrade(1, EntryKind::Dir)).unwrap();
        let taken = registry.take(DeviceId(1)).unwrap();
        assert_eq!(taken.device(), DeviceId(1));
        assert!(registry.take(DeviceId(1)).is_none());
        assert_eq!(registry.kind(), NodeKind::Dir);
        assert_eq!(registry.reset().len(), 1);
        assert!(registry.is_empty());
        assert_eq!(registry.kind(), NodeKind::Unknown);
    }

    #[test]
    fn test_closed_registry_rejects_attach() {
        let registry = ComradeRegistry::new(NodeKind::Unknown);
        registry.attach_validated(comrade(0, EntryKind::Dir)).unwrap();
        assert_eq!(registry.close().len(), 1);

        let rejected = registry
            .attach_validated(comrade(1, EntryKind::Dir))
            .unwrap_err();
        assert_eq!(rejected.reason, RejectReason::Closed);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_replace_orders_local_first() {
        let registry = ComradeRegistry::new(NodeKind::Dir);
        registry.attach_validated(comrade(9, EntryKind::Dir)).unwrap();
        let old = registry.replace(vec![
            comrade(1, EntryKind::Dir),
            comrade(0, EntryKind::Dir),
            comrade(1, EntryKind::Dir),
        ]);
        assert_eq!(old.len(), 1);
        assert_eq!(registry.devices(), vec![DeviceId(0), DeviceId(1)]);
    }
}
