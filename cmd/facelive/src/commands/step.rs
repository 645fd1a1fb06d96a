use std::time::Duration;

use clap::Args;
use facelive_liveness::{StepName, StepParams};

use super::{build_orchestrator, load_reference, output_result, parse_secs, print_verbose};
use crate::Cli;

#[derive(Args)]
pub struct StepCommand {
    /// Step to run: person_verification, depth_pose, blink_gaze, voice_captcha
    pub step: StepName,

    /// Reference face image (person_verification only)
    #[arg(short = 'r', long)]
    pub reference: Option<String>,

    /// Treat the reference file as base64 text
    #[arg(long)]
    pub base64: bool,

    /// Step duration in seconds
    #[arg(short = 'd', long, value_parser = parse_secs)]
    pub duration: Option<Duration>,

    /// Push per-frame overlays to the log
    #[arg(long)]
    pub display: bool,
}

impl StepCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let orchestrator = build_orchestrator(cli)?;

        let reference_image = match &self.reference {
            Some(path) => Some(load_reference(path, self.base64)?),
            None => None,
        };

        print_verbose(cli, &format!("Running step {}", self.step));
        let result = orchestrator
            .run_single_step(
                self.step,
                StepParams {
                    reference_image,
                    duration: self.duration,
                    display: self.display,
                },
            )
            .await;

        output_result(cli, &result.single_step_view())
    }
}
