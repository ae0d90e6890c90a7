use clap::Args;

use mergefs_daemon::SessionError;

#[derive(Args, Debug, Clone)]
pub struct Touch {
    /// File to create on the local device
    pub path: String,

    /// Fail if the backing file already exists
    #[arg(long)]
    pub exclusive: bool,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Touch {
    type Error = SessionError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let session = ctx.session().await?;
        let (parent, name) = session.resolve_parent(&self.path).await?;
        let node = session.view.create(&parent, name, self.exclusive).await?;
        Ok(format!("created file {}", node.path()))
    }
}
