use clap::Args;

use mergefs_daemon::SessionError;

#[derive(Args, Debug, Clone)]
pub struct Ls {
    /// Directory to list (defaults to the root)
    #[arg(default_value = "/")]
    pub path: String,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Ls {
    type Error = SessionError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let session = ctx.session().await?;
        let dir = session.resolve(&self.path).await?;
        let mut entries = session.view.readdir(&dir).await?;
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        if entries.is_empty() {
            return Ok("No items found".to_string());
        }
        Ok(entries
            .iter()
            .map(|entry| {
                let type_str = if entry.kind.is_dir() { "dir" } else { "file" };
                format!("{} ({}) [device {}]", entry.name, type_str, entry.device)
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
