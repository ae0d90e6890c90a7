use clap::Args;
use common::merge::RenameFlags;

use mergefs_daemon::SessionError;

/// Rename an entry within its directory, on every device that has it
#[derive(Args, Debug, Clone)]
pub struct Mv {
    pub from: String,
    pub to: String,

    /// Fail instead of replacing an existing target
    #[arg(long)]
    pub no_replace: bool,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Mv {
    type Error = SessionError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let session = ctx.session().await?;
        let (old_parent, old_name) = session.resolve_parent(&self.from).await?;
        let (new_parent, new_name) = session.resolve_parent(&self.to).await?;
        let flags = if self.no_replace {
            RenameFlags::no_replace()
        } else {
            RenameFlags::default()
        };
        session
            .view
            .rename(&old_parent, old_name, &new_parent, new_name, flags)
            .await?;
        Ok(format!("moved {} -> {}", self.from, self.to))
    }
}
