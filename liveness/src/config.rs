//! Engine configuration.
//!
//! Stored as YAML, by default at `~/.facelive/config.yaml`. Every field has
//! a default, so an empty file (or a file naming only the values to change)
//! is a valid configuration.
//!
//! ```yaml
//! depth_pose:
//!   duration_secs: 6
//!   require_motion: true
//! voice_captcha:
//!   seed: 42
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::StepName;

/// Default base configuration directory name.
pub const DEFAULT_BASE_DIR: &str = ".facelive";
/// Default configuration filename.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config: read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config: parse: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("config: invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn check_secs(field: &'static str, secs: f64) -> Result<(), ConfigError> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(invalid(field, format!("must be a positive number of seconds, got {secs}")));
    }
    Ok(())
}

fn check_unit(field: &'static str, v: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&v) {
        return Err(invalid(field, format!("must be within [0, 1], got {v}")));
    }
    Ok(())
}

fn check_positive(field: &'static str, v: f64) -> Result<(), ConfigError> {
    if !v.is_finite() || v <= 0.0 {
        return Err(invalid(field, format!("must be positive, got {v}")));
    }
    Ok(())
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    pub capture: CaptureConfig,
    pub fusion: FusionConfig,
    pub person_verification: PersonVerificationConfig,
    pub depth_pose: DepthPoseConfig,
    pub blink_gaze: BlinkGazeConfig,
    pub voice_captcha: VoiceCaptchaConfig,
}

impl LivenessConfig {
    /// `~/.facelive/config.yaml`, if a home directory exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(DEFAULT_BASE_DIR).join(DEFAULT_CONFIG_FILE))
    }

    /// Reads and validates a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parses and validates YAML. Empty input yields the defaults.
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: Self = if s.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(s)?
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Configured time budget of a step.
    pub fn step_duration(&self, step: StepName) -> Duration {
        match step {
            StepName::PersonVerification => self.person_verification.duration(),
            StepName::DepthPoseLiveness => self.depth_pose.duration(),
            StepName::BlinkGaze => self.blink_gaze.duration(),
            StepName::VoiceCaptcha => self.voice_captcha.duration(),
        }
    }

    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.capture;
        check_secs("capture.grace_period_secs", c.grace_period_secs)?;
        check_secs("capture.read_timeout_secs", c.read_timeout_secs)?;

        let f = &self.fusion;
        check_unit("fusion.confidence_threshold", f.confidence_threshold)?;

        let p = &self.person_verification;
        check_secs("person_verification.duration_secs", p.duration_secs)?;
        if !(-1.0..=1.0).contains(&p.similarity_threshold) {
            return Err(invalid(
                "person_verification.similarity_threshold",
                format!("must be within [-1, 1], got {}", p.similarity_threshold),
            ));
        }

        let d = &self.depth_pose;
        check_secs("depth_pose.duration_secs", d.duration_secs)?;
        check_unit("depth_pose.vote_ratio", d.vote_ratio)?;
        check_unit("depth_pose.frame_confidence", d.frame_confidence)?;
        check_positive("depth_pose.max_reprojection_error", d.max_reprojection_error)?;
        check_positive("depth_pose.depth_threshold_base", d.depth_threshold_base)?;
        check_positive("depth_pose.motion_threshold_base", d.motion_threshold_base)?;
        if d.motion_window < 3 {
            return Err(invalid("depth_pose.motion_window", "must hold at least 3 poses"));
        }
        if d.depth_smoothing == 0 {
            return Err(invalid("depth_pose.depth_smoothing", "must be at least 1"));
        }

        let b = &self.blink_gaze;
        check_secs("blink_gaze.duration_secs", b.duration_secs)?;
        check_positive("blink_gaze.ear_threshold", b.ear_threshold)?;
        if b.consec_frames == 0 {
            return Err(invalid("blink_gaze.consec_frames", "must be at least 1"));
        }
        if b.gaze_low >= b.gaze_high {
            return Err(invalid(
                "blink_gaze.gaze_low",
                format!("must be below gaze_high ({} >= {})", b.gaze_low, b.gaze_high),
            ));
        }

        let v = &self.voice_captcha;
        check_secs("voice_captcha.duration_secs", v.duration_secs)?;
        check_positive("voice_captcha.mar_std_threshold", v.mar_std_threshold)?;
        if v.upload_chunk_samples == 0 {
            return Err(invalid("voice_captcha.upload_chunk_samples", "must be at least 1"));
        }
        Ok(())
    }
}

/// Capture pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// A step aborts with a resource error after this long without a frame.
    pub grace_period_secs: f64,
    /// Upper bound on a single frame or chunk read.
    pub read_timeout_secs: f64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: 3.0,
            read_timeout_secs: 0.1,
        }
    }
}

impl CaptureConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs_f64(self.grace_period_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.read_timeout_secs)
    }
}

/// Pipeline verdict policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub min_passed_steps: usize,
    pub confidence_threshold: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            min_passed_steps: 3,
            confidence_threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonVerificationConfig {
    pub duration_secs: f64,
    /// A frame matches when cosine similarity is strictly above this.
    pub similarity_threshold: f64,
}

impl Default for PersonVerificationConfig {
    fn default() -> Self {
        Self {
            duration_secs: 2.0,
            similarity_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthPoseConfig {
    pub duration_secs: f64,
    /// The step passes when the live-vote share is strictly above this.
    pub vote_ratio: f64,
    /// A frame votes live only when its confidence is strictly above this.
    pub frame_confidence: f64,
    pub max_reprojection_error: f64,
    /// Scaled by brightness into the per-frame depth threshold.
    pub depth_threshold_base: f64,
    /// Scaled by contrast into the per-frame motion threshold.
    pub motion_threshold_base: f64,
    /// Number of recent poses whose variance is the motion term.
    pub motion_window: usize,
    /// Number of recent depth values averaged; 1 disables smoothing.
    pub depth_smoothing: usize,
    pub min_face_size: f64,
    /// Also require head motion above the threshold for a live vote.
    pub require_motion: bool,
}

impl Default for DepthPoseConfig {
    fn default() -> Self {
        Self {
            duration_secs: 5.0,
            vote_ratio: 0.6,
            frame_confidence: 0.7,
            max_reprojection_error: 12.0,
            depth_threshold_base: 3.0,
            motion_threshold_base: 0.2,
            motion_window: 10,
            depth_smoothing: 1,
            min_face_size: 100.0,
            require_motion: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlinkGazeConfig {
    pub duration_secs: f64,
    pub ear_threshold: f64,
    /// Closed frames needed before reopening counts as a blink.
    pub consec_frames: usize,
    pub gaze_low: f64,
    pub gaze_high: f64,
    /// Gray level above which an eye-crop pixel counts as sclera.
    pub eye_white_threshold: u8,
    pub min_blinks: usize,
    pub min_gaze_movements: usize,
}

impl Default for BlinkGazeConfig {
    fn default() -> Self {
        Self {
            duration_secs: 4.0,
            ear_threshold: 0.22,
            consec_frames: 2,
            gaze_low: 0.8,
            gaze_high: 1.5,
            eye_white_threshold: 70,
            min_blinks: 1,
            min_gaze_movements: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceCaptchaConfig {
    pub duration_secs: f64,
    /// Mouth movement passes when the MAR standard deviation is strictly
    /// above this.
    pub mar_std_threshold: f64,
    /// Samples per chunk when feeding uploaded audio to the transcriber.
    pub upload_chunk_samples: usize,
    /// Fixed seed for the challenge generator. Unset means OS entropy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for VoiceCaptchaConfig {
    fn default() -> Self {
        Self {
            duration_secs: 7.0,
            mar_std_threshold: 0.01,
            upload_chunk_samples: 4000,
            seed: None,
        }
    }
}

macro_rules! step_duration {
    ($($ty:ty),*) => {$(
        impl $ty {
            pub fn duration(&self) -> Duration {
                Duration::from_secs_f64(self.duration_secs)
            }
        }
    )*};
}

step_duration!(
    PersonVerificationConfig,
    DepthPoseConfig,
    BlinkGazeConfig,
    VoiceCaptchaConfig
);
