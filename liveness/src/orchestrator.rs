//! Pipeline driver.
//!
//! The [`Orchestrator`] owns the configuration, the capture device handle
//! and the capability providers. Each run claims the device once, walks the
//! steps in fixed order and stops at the first step that does not pass.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use facelive_capture::{CaptureDevice, CaptureResource, PcmAudio};
use facelive_perception::{
    BlinkGazeAnalyzer, DepthPoseEstimator, FaceMatcher, PerceptionError, SpeechTranscriber,
};
use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::captcha::{parse_expression, Challenge, ChallengeGenerator};
use crate::config::{ConfigError, LivenessConfig};
use crate::fusion::FusionPolicy;
use crate::preview::{PreviewSink, TracingPreview};
use crate::state::{PipelineStage, StageTracker};
use crate::status::SystemStatus;
use crate::steps::blink_gaze::BlinkGazeStep;
use crate::steps::depth_pose::DepthPoseStep;
use crate::steps::person::{PersonVerificationStep, ReferenceImage};
use crate::steps::voice_captcha::{verify_upload, VoiceCaptchaStep};
use crate::steps::Pacer;
use crate::{LivenessError, PipelineResult, StepName, StepResult};

/// Capability providers injected at startup.
#[derive(Clone)]
pub struct Providers {
    pub face: Arc<dyn FaceMatcher>,
    pub depth_pose: Arc<dyn DepthPoseEstimator>,
    pub landmarks: Arc<dyn BlinkGazeAnalyzer>,
    pub speech: Arc<dyn SpeechTranscriber>,
}

impl Providers {
    /// Readiness of every model `step` needs.
    pub fn readiness(&self, step: StepName) -> Result<(), PerceptionError> {
        match step {
            StepName::PersonVerification => self.face.readiness(),
            StepName::DepthPoseLiveness => {
                self.depth_pose.readiness()?;
                self.landmarks.readiness()
            }
            StepName::BlinkGaze => self.landmarks.readiness(),
            StepName::VoiceCaptcha => {
                self.landmarks.readiness()?;
                self.speech.readiness()
            }
        }
    }
}

/// Per-step budget overrides. Unset steps use the configured duration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepDurations {
    pub person_verification: Option<Duration>,
    pub depth_pose_liveness: Option<Duration>,
    pub blink_gaze: Option<Duration>,
    pub voice_captcha: Option<Duration>,
}

impl StepDurations {
    pub fn get(&self, step: StepName) -> Option<Duration> {
        match step {
            StepName::PersonVerification => self.person_verification,
            StepName::DepthPoseLiveness => self.depth_pose_liveness,
            StepName::BlinkGaze => self.blink_gaze,
            StepName::VoiceCaptcha => self.voice_captcha,
        }
    }

    pub fn with(mut self, step: StepName, duration: Duration) -> Self {
        let slot = match step {
            StepName::PersonVerification => &mut self.person_verification,
            StepName::DepthPoseLiveness => &mut self.depth_pose_liveness,
            StepName::BlinkGaze => &mut self.blink_gaze,
            StepName::VoiceCaptcha => &mut self.voice_captcha,
        };
        *slot = Some(duration);
        self
    }
}

/// Input of a full pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineRequest {
    /// Identity to match. Without it person verification is skipped.
    pub reference_image: Option<ReferenceImage>,
    pub durations: StepDurations,
    /// Push per-frame overlays to the preview sink.
    pub display: bool,
}

/// Input of a single ad-hoc step.
#[derive(Debug, Clone, Default)]
pub struct StepParams {
    /// Required for person verification, ignored otherwise.
    pub reference_image: Option<ReferenceImage>,
    pub duration: Option<Duration>,
    pub display: bool,
}

fn log_fault(stage: &str, err: &LivenessError) {
    match err {
        LivenessError::Internal(_) => {
            error!(stage, kind = err.kind(), error = %err, "liveness: internal fault")
        }
        _ => warn!(stage, kind = err.kind(), error = %err, "liveness: run aborted"),
    }
}

/// Drives liveness runs against one capture device.
///
/// # Thread Safety
///
/// All methods take `&self`. Runs against the same device are serialized
/// by the device itself: a second concurrent run gets a resource error.
pub struct Orchestrator {
    config: LivenessConfig,
    device: Arc<dyn CaptureDevice>,
    providers: Providers,
    preview: Arc<dyn PreviewSink>,
    challenges: Mutex<ChallengeGenerator>,
    fusion: FusionPolicy,
}

impl Orchestrator {
    /// Validates `config` and wires the providers.
    ///
    /// The challenge generator is seeded from `voice_captcha.seed` when set.
    pub fn new(
        config: LivenessConfig,
        device: Arc<dyn CaptureDevice>,
        providers: Providers,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let challenges = match config.voice_captcha.seed {
            Some(seed) => ChallengeGenerator::seeded(seed),
            None => ChallengeGenerator::from_entropy(),
        };
        Ok(Self {
            fusion: FusionPolicy::new(&config.fusion),
            config,
            device,
            providers,
            preview: Arc::new(TracingPreview),
            challenges: Mutex::new(challenges),
        })
    }

    pub fn with_preview(mut self, preview: Arc<dyn PreviewSink>) -> Self {
        self.preview = preview;
        self
    }

    /// Restarts the challenge sequence from `seed`.
    pub fn with_challenge_seed(self, seed: u64) -> Self {
        *self.challenges.lock() = ChallengeGenerator::seeded(seed);
        self
    }

    pub fn config(&self) -> &LivenessConfig {
        &self.config
    }

    /// Draws the next captcha challenge.
    pub fn next_challenge(&self) -> Challenge {
        self.challenges.lock().next_challenge()
    }

    /// Runs every step in order and fuses the results.
    ///
    /// Never returns an error: faults come back as a `Failed` result whose
    /// `error` is safe to show. The device is released on every path.
    pub async fn run_pipeline(&self, request: PipelineRequest) -> PipelineResult {
        let mut resource = match CaptureResource::acquire(self.device.clone()).await {
            Ok(resource) => resource,
            Err(e) => {
                let err = LivenessError::from(e);
                log_fault("acquire", &err);
                return self.fusion.aborted(Vec::new(), &err);
            }
        };
        info!(device = resource.device_id(), "liveness: pipeline started");

        let mut tracker = StageTracker::new();
        let mut steps = Vec::with_capacity(StepName::ALL.len());
        let outcome = self
            .run_steps(&mut resource, &request, &mut tracker, &mut steps)
            .await;
        resource.release();

        match outcome {
            Ok(()) if tracker.stage() == PipelineStage::Done => self.fusion.completed(steps),
            Ok(()) => self.fusion.rejected(steps),
            Err(err) => {
                log_fault(&tracker.stage().to_string(), &err);
                tracker.fail();
                self.fusion.aborted(steps, &err)
            }
        }
    }

    async fn run_steps(
        &self,
        resource: &mut CaptureResource,
        request: &PipelineRequest,
        tracker: &mut StageTracker,
        steps: &mut Vec<StepResult>,
    ) -> Result<(), LivenessError> {
        for step in StepName::ALL {
            tracker.advance(step.into())?;
            let result = match (step, &request.reference_image) {
                (StepName::PersonVerification, None) => StepResult::skipped(step),
                (_, reference) => {
                    let budget = request
                        .durations
                        .get(step)
                        .unwrap_or_else(|| self.config.step_duration(step));
                    self.execute(step, resource, reference.as_ref(), budget, request.display)
                        .await?
                }
            };
            let passed = result.passed();
            if !passed {
                warn!(
                    step = %step,
                    reason = result.error().unwrap_or(result.message()),
                    "liveness: step failed"
                );
            }
            steps.push(result);
            if !passed {
                tracker.fail();
                return Ok(());
            }
        }
        tracker.advance(PipelineStage::Done)
    }

    async fn execute(
        &self,
        step: StepName,
        resource: &mut CaptureResource,
        reference: Option<&ReferenceImage>,
        budget: Duration,
        display: bool,
    ) -> Result<StepResult, LivenessError> {
        self.providers.readiness(step)?;
        let preview = display.then_some(self.preview.as_ref());
        let cfg = &self.config;
        let pacer = || Pacer::new(budget, &cfg.capture);

        let result = match step {
            StepName::PersonVerification => {
                let Some(reference) = reference else {
                    return Ok(StepResult::invalid(
                        step,
                        "reference image is required for person verification",
                    ));
                };
                PersonVerificationStep::new(self.providers.face.as_ref(), &cfg.person_verification)
                    .run(resource.video()?, reference, pacer(), preview)
                    .await?
            }
            StepName::DepthPoseLiveness => {
                DepthPoseStep::new(
                    self.providers.depth_pose.as_ref(),
                    self.providers.landmarks.as_ref(),
                    &cfg.depth_pose,
                )
                .run(resource.video()?, pacer(), preview)
                .await?
            }
            StepName::BlinkGaze => {
                BlinkGazeStep::new(self.providers.landmarks.as_ref(), &cfg.blink_gaze)
                    .run(resource.video()?, pacer(), preview)
                    .await?
            }
            StepName::VoiceCaptcha => {
                let challenge = self.next_challenge();
                let (video, audio) = resource.split()?;
                VoiceCaptchaStep::new(
                    self.providers.landmarks.as_ref(),
                    self.providers.speech.as_ref(),
                    &cfg.voice_captcha,
                    challenge,
                )
                .run(video, audio, pacer(), pacer(), preview)
                .await?
            }
        };
        if let Some(p) = preview {
            p.close(step);
        }
        Ok(result)
    }

    /// Runs one step on its own claim of the device, without fusion.
    ///
    /// Faults come back as a failed result carrying the public error message.
    pub async fn run_single_step(&self, step: StepName, params: StepParams) -> StepResult {
        if step == StepName::PersonVerification && params.reference_image.is_none() {
            return StepResult::invalid(step, "reference image is required for person verification");
        }
        let mut resource = match CaptureResource::acquire(self.device.clone()).await {
            Ok(resource) => resource,
            Err(e) => return Self::fault_result(step, &LivenessError::from(e)),
        };
        let budget = params
            .duration
            .unwrap_or_else(|| self.config.step_duration(step));
        let outcome = self
            .execute(
                step,
                &mut resource,
                params.reference_image.as_ref(),
                budget,
                params.display,
            )
            .await;
        resource.release();

        outcome.unwrap_or_else(|err| Self::fault_result(step, &err))
    }

    fn fault_result(step: StepName, err: &LivenessError) -> StepResult {
        log_fault(step.as_str(), err);
        StepResult::new(step, false, 0.0, format!("{step} aborted")).with_error(err.public_message())
    }

    /// Checks a pre-recorded spoken answer.
    ///
    /// `expression` is the challenge the speaker answered (`"23 + 4"`); when
    /// absent a fresh challenge is drawn. No capture device is used.
    pub fn verify_uploaded_audio(&self, audio: &PcmAudio, expression: Option<&str>) -> StepResult {
        let step = StepName::VoiceCaptcha;
        let challenge = match expression {
            Some(expr) => match parse_expression(expr) {
                Some(challenge) => challenge,
                None => {
                    return StepResult::invalid(step, format!("invalid captcha expression {expr:?}"));
                }
            },
            None => self.next_challenge(),
        };
        let outcome = self
            .providers
            .speech
            .readiness()
            .map_err(LivenessError::from)
            .and_then(|()| {
                verify_upload(
                    self.providers.speech.as_ref(),
                    audio,
                    &challenge,
                    self.config.voice_captcha.upload_chunk_samples,
                )
            });
        outcome.unwrap_or_else(|err| Self::fault_result(step, &err))
    }

    /// Health snapshot. Probes the device without claiming it.
    pub fn system_status(&self) -> SystemStatus {
        let models_loaded: BTreeMap<StepName, bool> = StepName::ALL
            .into_iter()
            .map(|step| (step, self.providers.readiness(step).is_ok()))
            .collect();
        SystemStatus {
            camera_available: self.device.is_available(),
            models_loaded,
            configuration: self.config.clone(),
            timestamp: Utc::now(),
        }
    }
}
