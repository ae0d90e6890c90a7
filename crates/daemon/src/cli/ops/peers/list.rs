use clap::Args;

use mergefs_daemon::state::StateError;

#[derive(Args, Debug, Clone)]
pub struct List;

#[async_trait::async_trait]
impl crate::cli::op::Op for List {
    type Error = StateError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.load_state()?;
        if state.config.peers.is_empty() {
            return Ok("No peers configured".to_string());
        }
        Ok(state
            .config
            .peers
            .iter()
            .map(|peer| {
                let status = if peer.online { "online" } else { "offline" };
                format!("{} {} ({})", peer.id, peer.cid(), status)
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
