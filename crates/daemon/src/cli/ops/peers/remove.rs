use clap::Args;

use mergefs_daemon::state::StateError;

#[derive(Args, Debug, Clone)]
pub struct Remove {
    pub id: u64,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Remove {
    type Error = StateError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut state = ctx.load_state()?;
        let peer = state.remove_peer(self.id)?;
        Ok(format!(
            "removed device {}; its subtree {} was left on disk",
            peer.id,
            peer.cid()
        ))
    }
}
