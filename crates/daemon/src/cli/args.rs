pub use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mergefs")]
#[command(about = "Browse and edit the merged view of every connected device")]
pub struct Args {
    /// Path to the mergefs config directory (defaults to ~/.mergefs)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    /// Log filter, overriding the configured level (RUST_LOG still wins)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: crate::Command,
}
