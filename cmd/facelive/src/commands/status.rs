use clap::Args;

use super::{build_orchestrator, output_result};
use crate::Cli;

#[derive(Args)]
pub struct StatusCommand {
    /// Exit with an error unless the camera and all models are ready
    #[arg(long)]
    pub strict: bool,
}

impl StatusCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let orchestrator = build_orchestrator(cli)?;
        let status = orchestrator.system_status();
        output_result(cli, &status)?;
        if self.strict && !status.is_ready() {
            anyhow::bail!("system not ready");
        }
        Ok(())
    }
}
