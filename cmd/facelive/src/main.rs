//! FaceLive CLI - runs liveness checks against scripted capture scenarios.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod scenario;

use commands::{ConfigCommand, RunCommand, StatusCommand, StepCommand, VerifyAudioCommand};

/// FaceLive CLI - multi-step face liveness verification.
///
/// Runs the liveness pipeline against a simulated camera and scripted
/// models described by a scenario file:
///   - Full pipeline (person, depth/pose, blink/gaze, voice captcha)
///   - Single steps
///   - Captcha answers from recorded audio
///   - Health status
///
/// Engine configuration is read from ~/.facelive/config.yaml.
#[derive(Parser)]
#[command(name = "facelive")]
#[command(about = "Face liveness verification CLI tool")]
#[command(version)]
pub struct Cli {
    /// Config file (default is ~/.facelive/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Scenario file describing the simulated subject (YAML)
    #[arg(short = 's', long, global = true)]
    pub scenario: Option<String>,

    /// Captcha seed (overrides voice_captcha.seed)
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Output file (default: stdout)
    #[arg(short = 'o', long, global = true)]
    pub output: Option<String>,

    /// Output as JSON instead of YAML
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show camera and model readiness
    Status(StatusCommand),
    /// Run the full liveness pipeline
    Run(RunCommand),
    /// Run a single step
    Step(StepCommand),
    /// Check a recorded captcha answer
    #[command(name = "verify-audio")]
    VerifyAudio(VerifyAudioCommand),
    /// Inspect engine configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Status(cmd) => cmd.run(&cli).await,
        Commands::Run(cmd) => cmd.run(&cli).await,
        Commands::Step(cmd) => cmd.run(&cli).await,
        Commands::VerifyAudio(cmd) => cmd.run(&cli).await,
        Commands::Config(cmd) => cmd.run(&cli).await,
    }
}
