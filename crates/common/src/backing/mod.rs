//! Backing store abstraction
//!
//! The merge engine never touches storage directly. Every device's subtree
//! lives inside one backing store under `device_view/<selector>/...`, and the
//! engine only issues ordinary path operations against those synthesized
//! paths. Two implementations ship with the crate:
//!
//! - [`FsStore`]: a real directory tree on the local filesystem
//! - [`MemoryStore`]: an in-memory tree with fault injection, used by tests

mod fs;
mod memory;

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

pub use fs::FsStore;
pub use memory::{Gate, MemoryStore, StoreOp};

/// Default permission bits for directories created through the view
pub const DIR_MODE: u32 = 0o771;
/// Default permission bits for regular files created through the view
pub const FILE_MODE: u32 = 0o660;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no such entry: {0}")]
    NotFound(String),
    #[error("entry already exists: {0}")]
    AlreadyExists(String),
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("is a directory: {0}")]
    IsADirectory(String),
    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),
    #[error("invalid backing path: {0}")]
    InvalidPath(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    Dir,
    Reg,
    Other,
}

impl EntryKind {
    pub fn is_dir(&self) -> bool {
        matches!(self, EntryKind::Dir)
    }

    pub fn is_reg(&self) -> bool {
        matches!(self, EntryKind::Reg)
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Dir => write!(f, "dir"),
            EntryKind::Reg => write!(f, "file"),
            EntryKind::Other => write!(f, "other"),
        }
    }
}

/// Metadata snapshot of one backing entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub kind: EntryKind,
    pub ino: u64,
    pub size: u64,
    pub nlink: u32,
    pub mode: u32,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
}

/// Attribute changes for `setattr`. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetAttr {
    pub size: Option<u64>,
    pub atime: Option<SystemTime>,
    pub mtime: Option<SystemTime>,
    pub mode: Option<u32>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
}

impl SetAttr {
    pub fn is_empty(&self) -> bool {
        *self == SetAttr::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
    pub ino: u64,
}

/// A resolved backing entry.
///  Handed out as an [`EntryRef`]; each holder owns one
///  reference and dropping it releases that reference.
#[derive(Debug)]
pub struct BackingEntry {
    path: String,
    kind: EntryKind,
    ino: u64,
    meta: RwLock<Metadata>,
}

pub type EntryRef = Arc<BackingEntry>;

impl BackingEntry {
    pub fn new(path: impl Into<String>, meta: Metadata) -> EntryRef {
        Arc::new(Self {
            path: path.into(),
            kind: meta.kind,
            ino: meta.ino,
            meta: RwLock::new(meta),
        })
    }

    /* Getters */

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn ino(&self) -> u64 {
        self.ino
    }

    pub fn metadata(&self) -> Metadata {
        self.meta.read().clone()
    }

    /// Replace the cached metadata with a fresh snapshot
    pub fn refresh(&self, meta: Metadata) {
        *self.meta.write() = meta;
    }

    /// A new handle to the same backing object at a different path
    pub fn rebind(&self, path: impl Into<String>) -> EntryRef {
        BackingEntry::new(path, self.metadata())
    }
}

/// The operation set the merge engine needs from storage.
///  All paths are relative to the store root and use `/` separators.
#[async_trait]
pub trait BackingStore: fmt::Debug + Send + Sync + 'static {
    async fn lookup(&self, path: &str) -> Result<EntryRef, StoreError>;

    /// Create a regular file. With `exclusive` an existing entry is an error,
    ///  otherwise the existing file is returned.
    async fn create(&self, path: &str, mode: u32, exclusive: bool)
        -> Result<EntryRef, StoreError>;

    async fn mkdir(&self, path: &str, mode: u32) -> Result<EntryRef, StoreError>;

    async fn unlink(&self, path: &str) -> Result<(), StoreError>;

    async fn rmdir(&self, path: &str) -> Result<(), StoreError>;

    async fn rename(&self, from: &str, to: &str, no_replace: bool) -> Result<(), StoreError>;

    async fn getattr(&self, path: &str) -> Result<Metadata, StoreError>;

    async fn setattr(&self, path: &str, attr: &SetAttr) -> Result<Metadata, StoreError>;

    async fn readdir(&self, path: &str) -> Result<Vec<DirEntry>, StoreError>;

    /// Whether a previously resolved entry still names the same object
    async fn revalidate(&self, entry: &BackingEntry) -> bool {
        match self.getattr(entry.path()).await {
            Ok(meta) => meta.ino == entry.ino() && meta.kind == entry.kind(),
            Err(_) => false,
        }
    }
}

/// Split a backing path into components, rejecting anything that
///  could escape the store root.
pub(crate) fn components(path: &str) -> Result<Vec<&str>, StoreError> {
    if path.starts_with('/') {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    if parts.iter().any(|p| *p == "." || *p == "..") {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(parts)
}
