//! CLI commands module.

mod audio;
mod config;
mod run;
mod status;
mod step;

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use facelive_liveness::{ChallengeGenerator, LivenessConfig, Orchestrator, ReferenceImage, StepName};
use serde::Serialize;

use crate::scenario::Scenario;
use crate::Cli;

pub use audio::VerifyAudioCommand;
pub use config::ConfigCommand;
pub use run::RunCommand;
pub use status::StatusCommand;
pub use step::StepCommand;

/// Config path from `--config`, else the default location.
pub(crate) fn config_path(cli: &Cli) -> Option<PathBuf> {
    match &cli.config {
        Some(path) => Some(PathBuf::from(path)),
        None => LivenessConfig::default_path(),
    }
}

/// Loads the engine configuration.
///
/// An explicit `--config` must exist; a missing default file means defaults.
pub(crate) fn load_config(cli: &Cli) -> anyhow::Result<LivenessConfig> {
    let Some(path) = config_path(cli) else {
        return Ok(LivenessConfig::default());
    };
    if cli.config.is_none() && !path.exists() {
        return Ok(LivenessConfig::default());
    }
    LivenessConfig::load(&path).with_context(|| format!("loading {}", path.display()))
}

pub(crate) fn load_scenario(cli: &Cli) -> anyhow::Result<Scenario> {
    match &cli.scenario {
        Some(path) => Scenario::load(Path::new(path)).with_context(|| format!("loading scenario {path}")),
        None => Ok(Scenario::default()),
    }
}

/// Builds an orchestrator for the scenario with a fixed captcha seed.
///
/// The seed comes from `--seed`, then `voice_captcha.seed`, else is random.
/// The scripted transcript answers the first challenge of that seed.
pub(crate) fn build_orchestrator(cli: &Cli) -> anyhow::Result<Orchestrator> {
    let config = load_config(cli)?;
    let scenario = load_scenario(cli)?;
    let seed = cli
        .seed
        .or(config.voice_captcha.seed)
        .unwrap_or_else(rand::random);
    let challenge = ChallengeGenerator::seeded(seed).next_challenge();
    print_verbose(cli, &format!("Captcha seed: {seed} ({challenge})"));

    let providers = scenario.providers(challenge.expected_answer());
    let orchestrator = Orchestrator::new(config, scenario.device(), providers)?;
    Ok(orchestrator.with_challenge_seed(seed))
}

/// Reads a reference image; `base64` treats the file as base64 text.
pub(crate) fn load_reference(path: &str, base64: bool) -> anyhow::Result<ReferenceImage> {
    if base64 {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
        return Ok(ReferenceImage::from_base64(text.trim()));
    }
    let data = std::fs::read(path).with_context(|| format!("reading {path}"))?;
    Ok(ReferenceImage::from_bytes(data))
}

/// Parses `STEP=SECONDS`.
pub(crate) fn parse_step_duration(s: &str) -> Result<(StepName, Duration), String> {
    let (step, secs) = s
        .split_once('=')
        .ok_or_else(|| format!("expected STEP=SECONDS, got {s:?}"))?;
    let step: StepName = step.parse().map_err(|e| format!("{e}"))?;
    Ok((step, parse_secs(secs)?))
}

pub(crate) fn parse_secs(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("invalid seconds {s:?}"))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(format!("seconds must be positive, got {secs}"));
    }
    Ok(Duration::from_secs_f64(secs))
}

/// Writes `value` as YAML (default) or JSON to `--output` or stdout.
pub(crate) fn output_result<T: Serialize>(cli: &Cli, value: &T) -> anyhow::Result<()> {
    let output = if cli.json {
        serde_json::to_string_pretty(value)?
    } else {
        serde_yaml::to_string(value)?
    };
    match &cli.output {
        Some(path) => {
            let mut file = File::create(path).with_context(|| format!("creating {path}"))?;
            file.write_all(output.as_bytes())?;
        }
        None => println!("{output}"),
    }
    Ok(())
}

pub(crate) fn print_verbose(cli: &Cli, message: &str) {
    if cli.verbose {
        eprintln!("[verbose] {message}");
    }
}
