use clap::{Args, Subcommand};

pub mod add;
pub mod list;
pub mod remove;
pub mod status;

use crate::cli::op::Op;

crate::command_enum! {
    (List, list::List),
    (Add, add::Add),
    (Remove, remove::Remove),
    (Online, status::Online),
    (Offline, status::Offline),
}

// Rename the generated Command to PeersCommand for clarity
pub type PeersCommand = Command;

/// Manage the remote devices merged into the view
#[derive(Args, Debug, Clone)]
pub struct Peers {
    #[command(subcommand)]
    pub command: PeersCommand,
}

#[async_trait::async_trait]
impl Op for Peers {
    type Error = OpError;
    type Output = OpOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx).await
    }
}
