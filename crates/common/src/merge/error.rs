use crate::backing::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
    #[error("name too long: {0}")]
    NameTooLong(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("rename across directories is not supported: {from} -> {to}")]
    CrossDirectory { from: String, to: String },
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("is a directory: {0}")]
    IsADirectory(String),
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("stale node: {0}")]
    Stale(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl MergeError {
    pub fn is_not_found(&self) -> bool {
        match self {
            MergeError::NotFound(_) => true,
            MergeError::Store(e) => e.is_not_found(),
            _ => false,
        }
    }
}
