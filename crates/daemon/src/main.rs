// CLI modules
mod cli;

use clap::{Parser, Subcommand};
use cli::{args::Args, op::Op, Init, Ls, Mkdir, Mv, Peers, Rm, Rmdir, Stat, Touch, Version};
use mergefs_daemon::state::AppState;

command_enum! {
    (Init, Init),
    (Ls, Ls),
    (Stat, Stat),
    (Mkdir, Mkdir),
    (Touch, Touch),
    (Rm, Rm),
    (Rmdir, Rmdir),
    (Mv, Mv),
    (Peers, Peers),
    (Version, Version),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Log level: explicit flag > config file > warn
    let state = AppState::load(args.config_path.clone()).ok();
    let log_level = args
        .log_level
        .clone()
        .or_else(|| state.as_ref().map(|s| s.config.log_level.clone()))
        .unwrap_or_else(|| "warn".to_string());
    let log_dir = state
        .as_ref()
        .filter(|s| s.config.log_to_file)
        .map(|s| s.log_dir.clone());
    let guards = mergefs_daemon::init_logging(&log_level, log_dir.as_deref());

    let ctx = cli::op::OpContext::new(args.config_path);

    let code = match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };
    // exit skips destructors, flush the log writers first
    drop(guards);
    std::process::exit(code);
}
