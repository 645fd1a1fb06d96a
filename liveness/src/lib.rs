//! Multi-step face liveness verification.
//!
//! # Pipeline
//!
//! An [`Orchestrator`] claims the capture device once per run and walks a
//! fixed sequence of steps, stopping at the first one that does not pass:
//!
//! ```text
//! Init -> PersonVerification -> DepthPoseLiveness -> BlinkGaze -> VoiceCaptcha -> Done
//!    \__________________________________________________________________________/
//!                                     -> Failed
//! ```
//!
//! Person verification runs only when a reference image is supplied;
//! otherwise a skipped result stands in for it. Each step pulls media until
//! its wall-clock budget runs out and decides once at the end.
//!
//! # Verdict
//!
//! [`FusionPolicy`] averages the confidence of the passed steps. A run is
//! live only when every step passed, at least three did, and the average
//! reaches the threshold (0.7 by default).
//!
//! # Errors
//!
//! Malformed input and unmet criteria come back as a failed
//! [`StepResult`]. Resource, model and internal faults are
//! [`LivenessError`]s; the orchestrator turns them into a `Failed`
//! [`PipelineResult`] after releasing the device.
//!
//! # Example
//!
//! ```rust,ignore
//! let orchestrator = Orchestrator::new(LivenessConfig::default(), device, providers)?;
//! let result = orchestrator.run_pipeline(PipelineRequest::default()).await;
//! println!("{}", serde_json::to_string_pretty(&result)?);
//! ```

mod captcha;
mod config;
mod error;
mod fusion;
mod numwords;
mod orchestrator;
mod preview;
mod result;
mod state;
mod status;
mod steps;
mod window;

pub use captcha::{extract_spoken_number, parse_expression, Challenge, ChallengeGenerator, Operator};
pub use config::{
    BlinkGazeConfig, CaptureConfig, ConfigError, DepthPoseConfig, FusionConfig, LivenessConfig,
    PersonVerificationConfig, VoiceCaptchaConfig, DEFAULT_BASE_DIR, DEFAULT_CONFIG_FILE,
};
pub use error::LivenessError;
pub use fusion::FusionPolicy;
pub use numwords::words_to_number;
pub use orchestrator::{Orchestrator, PipelineRequest, Providers, StepDurations, StepParams};
pub use preview::{PreviewSink, TracingPreview};
pub use result::{
    Details, Fields, Metrics, PipelineResult, SingleStepView, StepName, StepResult, UnknownStep,
};
pub use state::{PipelineStage, StageTracker};
pub use status::SystemStatus;
pub use steps::blink_gaze::{gaze_ratio, BlinkCounter};
pub use steps::depth_pose::{frame_confidence, vote_passes, DepthPoseAnalyzer, FrameVote};
pub use steps::person::ReferenceImage;
pub use window::RingBuffer;
