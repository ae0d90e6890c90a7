use clap::Args;

use mergefs_daemon::SessionError;

/// Remove a file from every device that holds it
#[derive(Args, Debug, Clone)]
pub struct Rm {
    pub path: String,
}

/// Remove an empty directory from every device that holds it
#[derive(Args, Debug, Clone)]
pub struct Rmdir {
    pub path: String,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Rm {
    type Error = SessionError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let session = ctx.session().await?;
        let (parent, name) = session.resolve_parent(&self.path).await?;
        session.view.unlink(&parent, name).await?;
        Ok(format!("removed {}", self.path))
    }
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Rmdir {
    type Error = SessionError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let session = ctx.session().await?;
        let (parent, name) = session.resolve_parent(&self.path).await?;
        session.view.rmdir(&parent, name).await?;
        Ok(format!("removed directory {}", self.path))
    }
}
