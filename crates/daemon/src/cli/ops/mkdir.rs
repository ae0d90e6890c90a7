use clap::Args;

use mergefs_daemon::SessionError;

#[derive(Args, Debug, Clone)]
pub struct Mkdir {
    /// Directory to create on the local device
    pub path: String,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Mkdir {
    type Error = SessionError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let session = ctx.session().await?;
        let (parent, name) = session.resolve_parent(&self.path).await?;
        let node = session.view.mkdir(&parent, name).await?;
        Ok(format!("created directory {}", node.path()))
    }
}
