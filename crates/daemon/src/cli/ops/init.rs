use std::path::PathBuf;

use clap::Args;
use common::config::MergeConfig;

use mergefs_daemon::state::{AppConfig, AppState, StateError};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Directory holding device_view/ (defaults to <config>/data)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Number of lookup workers
    #[arg(long)]
    pub lookup_workers: Option<usize>,

    /// Per-device lookup timeout in milliseconds (unset waits forever)
    #[arg(long)]
    pub lookup_timeout_ms: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    StateFailed(#[from] StateError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let defaults = MergeConfig::default();
        let config = AppConfig {
            data_dir: self.data_dir.clone(),
            merge: MergeConfig {
                lookup_workers: self.lookup_workers.unwrap_or(defaults.lookup_workers),
                lookup_timeout_ms: self.lookup_timeout_ms,
                ..defaults
            },
            ..Default::default()
        };

        let state = AppState::init(ctx.config_path.clone(), Some(config))?;

        let timeout = match state.config.merge.lookup_timeout_ms {
            Some(ms) => format!("{}ms", ms),
            None => "none".to_string(),
        };

        Ok(format!(
            "Initialized mergefs directory at: {}\n\
             - Config: {}\n\
             - Data: {}\n\
             - Lookup workers: {}\n\
             - Lookup timeout: {}",
            state.mergefs_dir.display(),
            state.config_path.display(),
            state.data_path.display(),
            state.config.merge.lookup_workers,
            timeout
        ))
    }
}
