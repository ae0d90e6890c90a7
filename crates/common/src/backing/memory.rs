use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;

use super::{
    components, BackingEntry, BackingStore, DirEntry, EntryKind, EntryRef, Metadata, SetAttr,
    StoreError, DIR_MODE, FILE_MODE,
};

/// Operations recorded in the [`MemoryStore`] log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Lookup,
    Create,
    Mkdir,
    Unlink,
    Rmdir,
    Rename,
    Getattr,
    Setattr,
    Readdir,
}

#[derive(Debug, Clone)]
enum FaultKind {
    Delay(Duration),
    Fail,
    Gate(watch::Receiver<bool>),
}

#[derive(Debug, Clone)]
struct Fault {
    prefix: String,
    op: Option<StoreOp>,
    kind: FaultKind,
    /// Only the prefix itself, not the entries below it
    exact: bool,
}

impl Fault {
    fn matches(&self, op: StoreOp, path: &str) -> bool {
        self.op.map_or(true, |o| o == op)
            && (path == self.prefix
                || (!self.exact && path.starts_with(&format!("{}/", self.prefix))))
    }
}

/// Holds operations under a prefix until opened
#[derive(Debug)]
pub struct Gate {
    tx: watch::Sender<bool>,
}

impl Gate {
    pub fn open(&self) {
        self.tx.send_replace(true);
    }
}

/// In-memory backing store with injectable latency, failures and gates.
///  Cheap to clone; all clones share the same tree.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

#[derive(Debug)]
struct MemoryStoreInner {
    /// normalized path -> metadata, the root is ""
    nodes: BTreeMap<String, Metadata>,
    next_ino: u64,
    faults: Vec<Fault>,
    log: Vec<(StoreOp, String)>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(path: &str) -> Result<String, StoreError> {
    Ok(components(path)?.join("/"))
}

fn parent_of(key: &str) -> Option<&str> {
    if key.is_empty() {
        return None;
    }
    Some(key.rfind('/').map_or("", |idx| &key[..idx]))
}

fn is_under(key: &str, ancestor: &str) -> bool {
    (ancestor.is_empty() && !key.is_empty())
        || (key.len() > ancestor.len()
            && key.starts_with(ancestor)
            && key.as_bytes()[ancestor.len()] == b'/')
}

impl MemoryStoreInner {
    fn new_meta(&mut self, kind: EntryKind, mode: u32) -> Metadata {
        let now = SystemTime::now();
        self.next_ino += 1;
        Metadata {
            kind,
            ino: self.next_ino,
            size: 0,
            nlink: if kind.is_dir() { 2 } else { 1 },
            mode,
            atime: now,
            mtime: now,
            ctime: now,
        }
    }

    fn dir(&self, key: &str, path: &str) -> Result<&Metadata, StoreError> {
        match self.nodes.get(key) {
            Some(meta) if meta.kind.is_dir() => Ok(meta),
            Some(_) => Err(StoreError::NotADirectory(path.to_string())),
            None => Err(StoreError::NotFound(path.to_string())),
        }
    }

    fn parent_dir(&self, key: &str, path: &str) -> Result<String, StoreError> {
        let parent = parent_of(key).ok_or_else(|| StoreError::InvalidPath(path.to_string()))?;
        self.dir(parent, path)?;
        Ok(parent.to_string())
    }

    fn touch(&mut self, key: &str, nlink_delta: i64) {
        if let Some(meta) = self.nodes.get_mut(key) {
            let now = SystemTime::now();
            meta.mtime = now;
            meta.ctime = now;
            meta.nlink = (meta.nlink as i64 + nlink_delta).max(0) as u32;
        }
    }

    fn has_children(&self, key: &str) -> bool {
        self.nodes.keys().any(|k| parent_of(k) == Some(key) && k != key)
    }

    /// mkdir -p, used for seeding
    fn ensure(&mut self, key: &str, kind: EntryKind) {
        let parts: Vec<String> = key.split('/').map(String::from).collect();
        let mut current = String::new();
        for (idx, part) in parts.iter().enumerate() {
            let parent = current.clone();
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(part);
            if self.nodes.contains_key(&current) {
                continue;
            }
            let leaf = idx + 1 == parts.len();
            let (kind, mode) = if leaf && !kind.is_dir() {
                (kind, FILE_MODE)
            } else {
                (EntryKind::Dir, DIR_MODE)
            };
            let meta = self.new_meta(kind, mode);
            self.nodes.insert(current.clone(), meta);
            self.touch(&parent, if kind.is_dir() { 1 } else { 0 });
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let now = SystemTime::now();
        let mut nodes = BTreeMap::new();
        nodes.insert(
            String::new(),
            Metadata {
                kind: EntryKind::Dir,
                ino: 1,
                size: 0,
                nlink: 2,
                mode: DIR_MODE,
                atime: now,
                mtime: now,
                ctime: now,
            },
        );
        Self {
            inner: Arc::new(Mutex::new(MemoryStoreInner {
                nodes,
                next_ino: 1,
                faults: Vec::new(),
                log: Vec::new(),
            })),
        }
    }

    /* Seeding */

    /// Create a directory and any missing ancestors
    pub fn add_dir(&self, path: &str) -> Result<(), StoreError> {
        let key = normalize(path)?;
        self.inner.lock().ensure(&key, EntryKind::Dir);
        Ok(())
    }

    /// Create a regular file of the given size and any missing ancestors
    pub fn add_file(&self, path: &str, size: u64) -> Result<(), StoreError> {
        let key = normalize(path)?;
        let mut inner = self.inner.lock();
        inner.ensure(&key, EntryKind::Reg);
        if let Some(meta) = inner.nodes.get_mut(&key) {
            meta.size = size;
        }
        Ok(())
    }

    pub fn set_mtime(&self, path: &str, mtime: SystemTime) -> Result<(), StoreError> {
        let key = normalize(path)?;
        let mut inner = self.inner.lock();
        let meta = inner
            .nodes
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        meta.mtime = mtime;
        Ok(())
    }

    pub fn exists(&self, path: &str) -> bool {
        normalize(path)
            .map(|key| self.inner.lock().nodes.contains_key(&key))
            .unwrap_or(false)
    }

    pub fn kind(&self, path: &str) -> Option<EntryKind> {
        let key = normalize(path).ok()?;
        self.inner.lock().nodes.get(&key).map(|m| m.kind)
    }

    /* Fault injection */

    /// Delay every operation at or below `prefix`
    pub fn delay(&self, prefix: &str, delay: Duration) {
        self.push_fault(prefix, None, FaultKind::Delay(delay));
    }

    /// Fail `op` (or every operation) at or below `prefix` with an io error
    pub fn fail(&self, prefix: &str, op: Option<StoreOp>) {
        self.push_fault(prefix, op, FaultKind::Fail);
    }

    /// Block lookups at or below `prefix` until the returned gate is opened
    pub fn gate(&self, prefix: &str) -> Gate {
        let (tx, rx) = watch::channel(false);
        self.push_fault(prefix, Some(StoreOp::Lookup), FaultKind::Gate(rx));
        Gate { tx }
    }

    /// Block lookups of exactly `path` until the returned gate is opened
    pub fn gate_exact(&self, path: &str) -> Gate {
        let (tx, rx) = watch::channel(false);
        let path = normalize(path).unwrap_or_else(|_| path.to_string());
        self.inner.lock().faults.push(Fault {
            prefix: path,
            op: Some(StoreOp::Lookup),
            kind: FaultKind::Gate(rx),
            exact: true,
        });
        Gate { tx }
    }

    pub fn clear_faults(&self) {
        self.inner.lock().faults.clear();
    }

    fn push_fault(&self, prefix: &str, op: Option<StoreOp>, kind: FaultKind) {
        let prefix = normalize(prefix).unwrap_or_else(|_| prefix.to_string());
        self.inner.lock().faults.push(Fault {
            prefix,
            op,
            kind,
            exact: false,
        });
    }

    /* Log */

    /// Every path passed to `lookup`, in call order
    pub fn lookups(&self) -> Vec<String> {
        self.ops(StoreOp::Lookup)
    }

    pub fn ops(&self, op: StoreOp) -> Vec<String> {
        self.inner
            .lock()
            .log
            .iter()
            .filter(|(o, _)| *o == op)
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn clear_log(&self) {
        self.inner.lock().log.clear();
    }

    /// Record the call, then apply any matching faults.
    ///  Never holds the lock across an await.
    async fn enter(&self, op: StoreOp, path: &str) -> Result<String, StoreError> {
        let key = normalize(path)?;
        let faults: Vec<Fault> = {
            let mut inner = self.inner.lock();
            inner.log.push((op, key.clone()));
            inner
                .faults
                .iter()
                .filter(|f| f.matches(op, &key))
                .cloned()
                .collect()
        };
        for fault in faults {
            match fault.kind {
                FaultKind::Delay(delay) => tokio::time::sleep(delay).await,
                FaultKind::Gate(mut rx) => {
                    // a dropped gate counts as open
                    let _ = rx.wait_for(|open| *open).await;
                }
                FaultKind::Fail => {
                    return Err(StoreError::Io(std::io::Error::other(format!(
                        "injected {:?} failure at {}",
                        op, path
                    ))))
                }
            }
        }
        Ok(key)
    }
}

#[async_trait]
impl BackingStore for MemoryStore {
    async fn lookup(&self, path: &str) -> Result<EntryRef, StoreError> {
        let key = self.enter(StoreOp::Lookup, path).await?;
        let inner = self.inner.lock();
        let meta = inner
            .nodes
            .get(&key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        Ok(BackingEntry::new(key, meta))
    }

    async fn create(
        &self,
        path: &str,
        mode: u32,
        exclusive: bool,
    ) -> Result<EntryRef, StoreError> {
        let key = self.enter(StoreOp::Create, path).await?;
        let mut inner = self.inner.lock();
        let parent = inner.parent_dir(&key, path)?;
        if let Some(existing) = inner.nodes.get(&key) {
            if exclusive {
                return Err(StoreError::AlreadyExists(path.to_string()));
            }
            if existing.kind.is_dir() {
                return Err(StoreError::IsADirectory(path.to_string()));
            }
            return Ok(BackingEntry::new(key, existing.clone()));
        }
        let meta = inner.new_meta(EntryKind::Reg, mode);
        inner.nodes.insert(key.clone(), meta.clone());
        inner.touch(&parent, 0);
        Ok(BackingEntry::new(key, meta))
    }

    async fn mkdir(&self, path: &str, mode: u32) -> Result<EntryRef, StoreError> {
        let key = self.enter(StoreOp::Mkdir, path).await?;
        let mut inner = self.inner.lock();
        let parent = inner.parent_dir(&key, path)?;
        if inner.nodes.contains_key(&key) {
            return Err(StoreError::AlreadyExists(path.to_string()));
        }
        let meta = inner.new_meta(EntryKind::Dir, mode);
        inner.nodes.insert(key.clone(), meta.clone());
        inner.touch(&parent, 1);
        Ok(BackingEntry::new(key, meta))
    }

    async fn unlink(&self, path: &str) -> Result<(), StoreError> {
        let key = self.enter(StoreOp::Unlink, path).await?;
        let mut inner = self.inner.lock();
        match inner.nodes.get(&key) {
            None => return Err(StoreError::NotFound(path.to_string())),
            Some(meta) if meta.kind.is_dir() => {
                return Err(StoreError::IsADirectory(path.to_string()))
            }
            Some(_) => {}
        }
        inner.nodes.remove(&key);
        if let Some(parent) = parent_of(&key) {
            inner.touch(parent, 0);
        }
        Ok(())
    }

    async fn rmdir(&self, path: &str) -> Result<(), StoreError> {
        let key = self.enter(StoreOp::Rmdir, path).await?;
        let mut inner = self.inner.lock();
        inner.dir(&key, path)?;
        if key.is_empty() {
            return Err(StoreError::InvalidPath(path.to_string()));
        }
        if inner.has_children(&key) {
            return Err(StoreError::DirectoryNotEmpty(path.to_string()));
        }
        inner.nodes.remove(&key);
        if let Some(parent) = parent_of(&key) {
            inner.touch(parent, -1);
        }
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str, no_replace: bool) -> Result<(), StoreError> {
        let src = self.enter(StoreOp::Rename, from).await?;
        let dst = normalize(to)?;
        let mut inner = self.inner.lock();
        let src_meta = inner
            .nodes
            .get(&src)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(from.to_string()))?;
        if src.is_empty() || is_under(&dst, &src) {
            return Err(StoreError::InvalidPath(to.to_string()));
        }
        if src == dst {
            return Ok(());
        }
        let dst_parent = inner.parent_dir(&dst, to)?;
        if let Some(dst_meta) = inner.nodes.get(&dst).cloned() {
            if no_replace {
                return Err(StoreError::AlreadyExists(to.to_string()));
            }
            match (src_meta.kind.is_dir(), dst_meta.kind.is_dir()) {
                (false, true) => return Err(StoreError::IsADirectory(to.to_string())),
                (true, false) => return Err(StoreError::NotADirectory(to.to_string())),
                (true, true) if inner.has_children(&dst) => {
                    return Err(StoreError::DirectoryNotEmpty(to.to_string()))
                }
                _ => {}
            }
            inner.nodes.remove(&dst);
            if dst_meta.kind.is_dir() {
                inner.touch(&dst_parent, -1);
            }
        }

        let moved: Vec<String> = inner
            .nodes
            .keys()
            .filter(|k| **k == src || is_under(k, &src))
            .cloned()
            .collect();
        for old in moved {
            if let Some(meta) = inner.nodes.remove(&old) {
                let new = format!("{}{}", dst, &old[src.len()..]);
                inner.nodes.insert(new, meta);
            }
        }
        let dir_delta = if src_meta.kind.is_dir() { 1 } else { 0 };
        if let Some(src_parent) = parent_of(&src) {
            let src_parent = src_parent.to_string();
            inner.touch(&src_parent, -dir_delta);
        }
        inner.touch(&dst_parent, dir_delta);
        Ok(())
    }

    async fn getattr(&self, path: &str) -> Result<Metadata, StoreError> {
        let key = self.enter(StoreOp::Getattr, path).await?;
        self.inner
            .lock()
            .nodes
            .get(&key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    async fn setattr(&self, path: &str, attr: &SetAttr) -> Result<Metadata, StoreError> {
        let key = self.enter(StoreOp::Setattr, path).await?;
        let mut inner = self.inner.lock();
        let meta = inner
            .nodes
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        if let Some(size) = attr.size {
            if meta.kind.is_dir() {
                return Err(StoreError::IsADirectory(path.to_string()));
            }
            meta.size = size;
        }
        if let Some(atime) = attr.atime {
            meta.atime = atime;
        }
        if let Some(mtime) = attr.mtime {
            meta.mtime = mtime;
        }
        if let Some(mode) = attr.mode {
            meta.mode = mode & 0o7777;
        }
        meta.ctime = SystemTime::now();
        Ok(meta.clone())
    }

    async fn readdir(&self, path: &str) -> Result<Vec<DirEntry>, StoreError> {
        let key = self.enter(StoreOp::Readdir, path).await?;
        let inner = self.inner.lock();
        inner.dir(&key, path)?;
        Ok(inner
            .nodes
            .iter()
            .filter(|(k, _)| !k.is_empty() && parent_of(k) == Some(key.as_str()))
            .map(|(k, meta)| DirEntry {
                name: k.rsplit('/').next().unwrap_or(k).to_string(),
                kind: meta.kind,
                ino: meta.ino,
            })
            .collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_seed_and_lookup() {
        let store = MemoryStore::new();
        store.add_file("device_view/local/a/b.txt", 12).unwrap();

        let entry = store.lookup("device_view/local/a/b.txt").await.unwrap();
        assert_eq!(entry.kind(), EntryKind::Reg);
        assert_eq!(entry.metadata().size, 12);
        assert_eq!(store.kind("device_view/local/a"), Some(EntryKind::Dir));
        assert!(store
            .lookup("device_view/local/missing")
            .await
            .unwrap_err()
            .is_not_found());
        assert_eq!(
            store.lookups(),
            vec!["device_view/local/a/b.txt", "device_view/local/missing"]
        );
    }

    #[tokio::test]
    async fn test_mkdir_requires_parent() {
        let store = MemoryStore::new();
        let err = store.mkdir("x/y", DIR_MODE).await.unwrap_err();
        assert!(err.is_not_found());
        store.mkdir("x", DIR_MODE).await.unwrap();
        store.mkdir("x/y", DIR_MODE).await.unwrap();
        assert_eq!(store.getattr("x").await.unwrap().nlink, 3);
        assert!(matches!(
            store.mkdir("x/y", DIR_MODE).await,
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_rmdir_not_empty() {
        let store = MemoryStore::new();
        store.add_file("d/f", 0).unwrap();
        assert!(matches!(
            store.rmdir("d").await,
            Err(StoreError::DirectoryNotEmpty(_))
        ));
        store.unlink("d/f").await.unwrap();
        store.rmdir("d").await.unwrap();
        assert!(!store.exists("d"));
    }

    #[tokio::test]
    async fn test_rename_moves_subtree() {
        let store = MemoryStore::new();
        store.add_file("a/sub/f", 1).unwrap();
        store.add_dir("b").unwrap();
        store.rename("a/sub", "b/sub2", false).await.unwrap();
        assert!(store.exists("b/sub2/f"));
        assert!(!store.exists("a/sub"));

        store.add_file("b/g", 0).unwrap();
        assert!(matches!(
            store.rename("b/sub2/f", "b/g", true).await,
            Err(StoreError::AlreadyExists(_))
        ));
        assert!(matches!(
            store.rename("b", "b/sub2/inside", false).await,
            Err(StoreError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let store = MemoryStore::new();
        store.add_dir("device_view/remote/x").unwrap();
        store.fail("device_view/remote", Some(StoreOp::Lookup));
        assert!(matches!(
            store.lookup("device_view/remote/x").await,
            Err(StoreError::Io(_))
        ));
        assert!(store.getattr("device_view/remote/x").await.is_ok());
        store.clear_faults();
        assert!(store.lookup("device_view/remote/x").await.is_ok());
    }

    #[tokio::test]
    async fn test_gate_blocks_until_open() {
        let store = MemoryStore::new();
        store.add_dir("slow/x").unwrap();
        let gate = store.gate("slow");

        let handle = {
            let store = store.clone();
            tokio::spawn(async move { store.lookup("slow/x").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        gate.open();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_readdir_lists_children() {
        let store = MemoryStore::new();
        store.add_file("r/a", 0).unwrap();
        store.add_dir("r/b/c").unwrap();
        let names: Vec<_> = store
            .readdir("r")
            .await
            .unwrap()
            .into_iter()
            .map(|e| (e.name, e.kind))
            .collect();
        assert_eq!(
            names,
            vec![
                ("a".to_string(), EntryKind::Reg),
                ("b".to_string(), EntryKind::Dir)
            ]
        );
    }
}
