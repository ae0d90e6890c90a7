use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{
    components, BackingEntry, BackingStore, DirEntry, EntryKind, EntryRef, Metadata, SetAttr,
    StoreError,
};

/// Backing store over a real directory tree
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Open a store rooted at an existing directory
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        let meta = tokio::fs::metadata(&root)
            .await
            .map_err(|e| map_io(e, &root.to_string_lossy()))?;
        if !meta.is_dir() {
            return Err(StoreError::NotADirectory(root.to_string_lossy().into()));
        }
        Ok(Self::new(root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        let mut full = self.root.clone();
        for part in components(path)? {
            full.push(part);
        }
        Ok(full)
    }

    async fn stat(&self, path: &str) -> Result<Metadata, StoreError> {
        let full = self.resolve(path)?;
        let meta = tokio::fs::symlink_metadata(&full)
            .await
            .map_err(|e| map_io(e, path))?;
        Ok(to_metadata(&meta))
    }
}

fn map_io(err: io::Error, path: &str) -> StoreError {
    match err.kind() {
        io::ErrorKind::NotFound => StoreError::NotFound(path.to_string()),
        io::ErrorKind::AlreadyExists => StoreError::AlreadyExists(path.to_string()),
        io::ErrorKind::NotADirectory => StoreError::NotADirectory(path.to_string()),
        io::ErrorKind::IsADirectory => StoreError::IsADirectory(path.to_string()),
        io::ErrorKind::DirectoryNotEmpty => StoreError::DirectoryNotEmpty(path.to_string()),
        _ => StoreError::Io(err),
    }
}

fn to_kind(file_type: std::fs::FileType) -> EntryKind {
    if file_type.is_dir() {
        EntryKind::Dir
    } else if file_type.is_file() {
        EntryKind::Reg
    } else {
        EntryKind::Other
    }
}

#[cfg(unix)]
fn to_metadata(meta: &std::fs::Metadata) -> Metadata {
    use std::os::unix::fs::MetadataExt;
    use std::time::{Duration, UNIX_EPOCH};

    let at = |secs: i64, nsecs: i64| {
        if secs >= 0 {
            UNIX_EPOCH + Duration::new(secs as u64, nsecs as u32)
        } else {
            UNIX_EPOCH
        }
    };
    Metadata {
        kind: to_kind(meta.file_type()),
        ino: meta.ino(),
        size: meta.size(),
        nlink: meta.nlink() as u32,
        mode: meta.mode() & 0o7777,
        atime: at(meta.atime(), meta.atime_nsec()),
        mtime: at(meta.mtime(), meta.mtime_nsec()),
        ctime: at(meta.ctime(), meta.ctime_nsec()),
    }
}

#[cfg(not(unix))]
fn to_metadata(meta: &std::fs::Metadata) -> Metadata {
    use std::time::UNIX_EPOCH;

    let mtime = meta.modified().unwrap_or(UNIX_EPOCH);
    Metadata {
        kind: to_kind(meta.file_type()),
        ino: 0,
        size: meta.len(),
        nlink: 1,
        mode: if meta.is_dir() {
            super::DIR_MODE
        } else {
            super::FILE_MODE
        },
        atime: meta.accessed().unwrap_or(mtime),
        mtime,
        ctime: meta.created().unwrap_or(mtime),
    }
}

#[async_trait]
impl BackingStore for FsStore {
    async fn lookup(&self, path: &str) -> Result<EntryRef, StoreError> {
        let meta = self.stat(path).await?;
        Ok(BackingEntry::new(path, meta))
    }

    async fn create(
        &self,
        path: &str,
        mode: u32,
        exclusive: bool,
    ) -> Result<EntryRef, StoreError> {
        let full = self.resolve(path)?;
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true);
        if exclusive {
            options.create_new(true);
        } else {
            options.create(true);
        }
        #[cfg(unix)]
        options.mode(mode);
        #[cfg(not(unix))]
        let _ = mode;
        options.open(&full).await.map_err(|e| map_io(e, path))?;
        self.lookup(path).await
    }

    async fn mkdir(&self, path: &str, mode: u32) -> Result<EntryRef, StoreError> {
        let full = self.resolve(path)?;
        let mut builder = tokio::fs::DirBuilder::new();
        #[cfg(unix)]
        builder.mode(mode);
        #[cfg(not(unix))]
        let _ = mode;
        builder.create(&full).await.map_err(|e| map_io(e, path))?;
        self.lookup(path).await
    }

    async fn unlink(&self, path: &str) -> Result<(), StoreError> {
        let meta = self.stat(path).await?;
        if meta.kind.is_dir() {
            return Err(StoreError::IsADirectory(path.to_string()));
        }
        let full = self.resolve(path)?;
        tokio::fs::remove_file(&full)
            .await
            .map_err(|e| map_io(e, path))
    }

    async fn rmdir(&self, path: &str) -> Result<(), StoreError> {
        let meta = self.stat(path).await?;
        if !meta.kind.is_dir() {
            return Err(StoreError::NotADirectory(path.to_string()));
        }
        let full = self.resolve(path)?;
        tokio::fs::remove_dir(&full)
            .await
            .map_err(|e| map_io(e, path))
    }

    async fn rename(&self, from: &str, to: &str, no_replace: bool) -> Result<(), StoreError> {
        let src = self.resolve(from)?;
        let dst = self.resolve(to)?;
        // not atomic with the rename below; good enough for a single writer
        if no_replace && tokio::fs::symlink_metadata(&dst).await.is_ok() {
            return Err(StoreError::AlreadyExists(to.to_string()));
        }
        tokio::fs::rename(&src, &dst)
            .await
            .map_err(|e| map_io(e, from))
    }

    async fn getattr(&self, path: &str) -> Result<Metadata, StoreError> {
        self.stat(path).await
    }

    async fn setattr(&self, path: &str, attr: &SetAttr) -> Result<Metadata, StoreError> {
        let full = self.resolve(path)?;
        let attr = attr.clone();
        let owned_path = path.to_string();
        tokio::task::spawn_blocking(move || apply_setattr(&full, &attr))
            .await
            .map_err(io::Error::other)?
            .map_err(|e| map_io(e, &owned_path))?;
        self.stat(path).await
    }

    async fn readdir(&self, path: &str) -> Result<Vec<DirEntry>, StoreError> {
        let full = self.resolve(path)?;
        let mut reader = tokio::fs::read_dir(&full)
            .await
            .map_err(|e| map_io(e, path))?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                tracing::warn!("skipping non utf-8 name under {}", path);
                continue;
            };
            let meta = entry.metadata().await?;
            let meta = to_metadata(&meta);
            entries.push(DirEntry {
                name,
                kind: meta.kind,
                ino: meta.ino,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}

fn apply_setattr(path: &Path, attr: &SetAttr) -> io::Result<()> {
    if attr.size.is_some() || attr.atime.is_some() || attr.mtime.is_some() {
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(attr.size.is_some())
            .open(path)?;
        if let Some(size) = attr.size {
            file.set_len(size)?;
        }
        let mut times = std::fs::FileTimes::new();
        if let Some(atime) = attr.atime {
            times = times.set_accessed(atime);
        }
        if let Some(mtime) = attr.mtime {
            times = times.set_modified(mtime);
        }
        file.set_times(times)?;
    }
    #[cfg(unix)]
    if let Some(mode) = attr.mode {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    }
    Ok(())
}
