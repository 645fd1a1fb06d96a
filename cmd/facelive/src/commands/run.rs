use std::time::Duration;

use clap::Args;
use facelive_liveness::{PipelineRequest, StepDurations, StepName};
use tracing::info;

use super::{build_orchestrator, load_reference, output_result, parse_step_duration, print_verbose};
use crate::Cli;

#[derive(Args)]
pub struct RunCommand {
    /// Reference face image. Without it person verification is skipped.
    #[arg(short = 'r', long)]
    pub reference: Option<String>,

    /// Treat the reference file as base64 text
    #[arg(long)]
    pub base64: bool,

    /// Per-step duration override, e.g. blink_gaze=5 (repeatable)
    #[arg(short = 'd', long = "duration", value_parser = parse_step_duration)]
    pub durations: Vec<(StepName, Duration)>,

    /// Push per-frame overlays to the log
    #[arg(long)]
    pub display: bool,

    /// Exit with an error unless the subject is judged live
    #[arg(long)]
    pub strict: bool,
}

impl RunCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let orchestrator = build_orchestrator(cli)?;

        let reference_image = match &self.reference {
            Some(path) => Some(load_reference(path, self.base64)?),
            None => None,
        };
        let durations = self
            .durations
            .iter()
            .fold(StepDurations::default(), |d, &(step, secs)| d.with(step, secs));

        print_verbose(cli, &format!("Running pipeline (reference: {})", reference_image.is_some()));
        let result = orchestrator
            .run_pipeline(PipelineRequest {
                reference_image,
                durations,
                display: self.display,
            })
            .await;

        info!(
            is_live = result.is_live,
            confidence = result.confidence,
            passed = result.passed_steps,
            total = result.total_steps,
            "pipeline verdict"
        );
        output_result(cli, &result)?;

        if self.strict && !result.is_live {
            anyhow::bail!("{}", result.message);
        }
        Ok(())
    }
}
