use clap::Args;
use common::device::{Cid, CidError};

use mergefs_daemon::state::{PeerConfig, StateError};

#[derive(Args, Debug, Clone)]
pub struct Add {
    /// Device id of the peer (must not be 0)
    pub id: u64,

    /// Connection id naming the peer's subtree (derived from the id if omitted)
    #[arg(long)]
    pub cid: Option<String>,

    /// Register the peer as offline
    #[arg(long)]
    pub offline: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum PeerAddError {
    #[error("invalid cid: {0}")]
    Cid(#[from] CidError),
    #[error(transparent)]
    State(#[from] StateError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Add {
    type Error = PeerAddError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let cid = self.cid.clone().map(Cid::new).transpose()?;
        let mut state = ctx.load_state()?;
        let peer = PeerConfig {
            id: self.id,
            cid,
            online: !self.offline,
        };
        let root = state.device_root(&common::device::DeviceSelector::Remote(peer.cid()));
        state.add_peer(peer)?;
        Ok(format!("added device {} at {}", self.id, root.display()))
    }
}
