use clap::Args;

use mergefs_daemon::state::StateError;

/// Include a peer's subtree in the view again
#[derive(Args, Debug, Clone)]
pub struct Online {
    pub id: u64,
}

/// Hide a peer's subtree from the view
#[derive(Args, Debug, Clone)]
pub struct Offline {
    pub id: u64,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Online {
    type Error = StateError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut state = ctx.load_state()?;
        state.set_peer_online(self.id, true)?;
        Ok(format!("device {} online", self.id))
    }
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Offline {
    type Error = StateError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut state = ctx.load_state()?;
        state.set_peer_online(self.id, false)?;
        Ok(format!("device {} offline", self.id))
    }
}
