use anyhow::Context as _;
use clap::Args;
use facelive_capture::PcmAudio;

use super::{build_orchestrator, output_result, print_verbose};
use crate::Cli;

#[derive(Args)]
pub struct VerifyAudioCommand {
    /// Recorded answer: a WAV file, or raw PCM16 with --sample-rate
    pub file: String,

    /// Treat the file as raw PCM16 mono at this rate
    #[arg(long)]
    pub sample_rate: Option<u32>,

    /// Challenge expression, e.g. "12 + 15". Omit to draw one.
    #[arg(short = 'e', long)]
    pub expression: Option<String>,
}

impl VerifyAudioCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let orchestrator = build_orchestrator(cli)?;

        let data = std::fs::read(&self.file).with_context(|| format!("reading {}", self.file))?;
        let audio = match self.sample_rate {
            Some(rate) => PcmAudio::raw(rate, data)?,
            None => PcmAudio::from_wav(&data)?,
        };
        print_verbose(
            cli,
            &format!("Audio: {} bytes at {} Hz", audio.data.len(), audio.sample_rate),
        );

        let result = orchestrator.verify_uploaded_audio(&audio, self.expression.as_deref());
        output_result(cli, &result.single_step_view())
    }
}
