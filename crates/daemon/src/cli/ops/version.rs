use std::convert::Infallible;

use clap::Args;

use common::build_info;

/// Print the mergefs build
#[derive(Args, Debug, Clone)]
pub struct Version {
    /// Print only the release number
    #[arg(long)]
    pub short: bool,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Version {
    type Error = Infallible;
    type Output = String;

    async fn execute(&self, _ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let info = build_info!();
        if self.short {
            return Ok(info.version.to_string());
        }
        Ok(info.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cli::op::{Op, OpContext};
    use common::build_info;

    #[tokio::test]
    async fn test_short_version_is_release_number() {
        let ctx = OpContext::new(None);
        let short = Version { short: true }.execute(&ctx).await.unwrap();
        assert_eq!(short, build_info!().version);

        let full = Version { short: false }.execute(&ctx).await.unwrap();
        assert!(full.starts_with(&format!("mergefs {}", short)));
    }
}
