use std::time::UNIX_EPOCH;

use clap::Args;

use mergefs_daemon::SessionError;

#[derive(Args, Debug, Clone)]
pub struct Stat {
    pub path: String,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Stat {
    type Error = SessionError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let session = ctx.session().await?;
        let node = session.resolve(&self.path).await?;
        let attr = session.view.attr(&node)?;
        let mtime = attr
            .mtime
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let devices = node
            .registry()
            .devices()
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(",");

        Ok(format!(
            "path: {}\n\
             kind: {:?}\n\
             ino: {}\n\
             size: {}\n\
             nlink: {}\n\
             mode: {:o}\n\
             mtime: {}\n\
             devices: {}",
            node.path(),
            attr.kind,
            attr.ino,
            attr.size,
            attr.nlink,
            attr.mode,
            mtime,
            devices
        ))
    }
}
