//! Mounting a merge view over the on-disk state directory

use std::sync::Arc;

use common::backing::{FsStore, StoreError};
use common::merge::{MergeError, MergeNode, MergeView};

use crate::state::{AppState, StateError};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("state error: {0}")]
    State(#[from] StateError),
    #[error("backing store error: {0}")]
    Store(#[from] StoreError),
    #[error("{0}")]
    Merge(#[from] MergeError),
}

/// An open merge view plus the state it was built from
pub struct Session {
    pub state: AppState,
    pub view: MergeView,
}

impl Session {
    pub async fn open(state: AppState) -> Result<Self, SessionError> {
        let store = FsStore::open(&state.data_path).await?;
        let peers = state.registry()?;
        tracing::debug!(
            "mounting {} with {} peer(s)",
            state.data_path.display(),
            peers.len()
        );
        let view = MergeView::mount(Arc::new(store), peers, state.config.merge.clone()).await?;
        Ok(Self { state, view })
    }

    /// Resolve a logical path and wait until every device has answered
    pub async fn resolve(&self, path: &str) -> Result<Arc<MergeNode>, SessionError> {
        let node = self.view.lookup_path(path).await?;
        node.work().wait_idle().await;
        Ok(node)
    }

    /// Resolve the parent directory of a logical path
    pub async fn resolve_parent<'a>(
        &self,
        path: &'a str,
    ) -> Result<(Arc<MergeNode>, &'a str), SessionError> {
        let (parent, name) = self.view.lookup_parent(path).await?;
        parent.work().wait_idle().await;
        Ok((parent, name))
    }
}
