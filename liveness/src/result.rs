use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use thiserror::Error;

use crate::state::PipelineStage;

/// The four checks, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    PersonVerification,
    DepthPoseLiveness,
    BlinkGaze,
    VoiceCaptcha,
}

impl StepName {
    /// Every step in execution order.
    pub const ALL: [StepName; 4] = [
        StepName::PersonVerification,
        StepName::DepthPoseLiveness,
        StepName::BlinkGaze,
        StepName::VoiceCaptcha,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PersonVerification => "person_verification",
            Self::DepthPoseLiveness => "depth_pose_liveness",
            Self::BlinkGaze => "blink_gaze",
            Self::VoiceCaptcha => "voice_captcha",
        }
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a step name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("liveness: unknown step {0:?}")]
pub struct UnknownStep(pub String);

impl FromStr for StepName {
    type Err = UnknownStep;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "person_verification" | "person" => Ok(Self::PersonVerification),
            "depth_pose_liveness" | "depth_pose" | "midas_liveness" => Ok(Self::DepthPoseLiveness),
            "blink_gaze" | "blink_detection" => Ok(Self::BlinkGaze),
            "voice_captcha" | "mouth_captcha" => Ok(Self::VoiceCaptcha),
            _ => Err(UnknownStep(s.to_string())),
        }
    }
}

/// Insertion-ordered string-keyed map. Setting an existing key replaces
/// its value in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Fields<V> {
    entries: Vec<(String, V)>,
}

/// Numeric step diagnostics.
pub type Metrics = Fields<f64>;
/// Textual step diagnostics.
pub type Details = Fields<String>;

impl<V> Default for Fields<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<V> Fields<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: V) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: Serialize> Serialize for Fields<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

/// Outcome of one check. Confidence is always within `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    step: StepName,
    passed: bool,
    confidence: f64,
    metrics: Metrics,
    details: Details,
    message: String,
    error: Option<String>,
}

impl StepResult {
    pub fn new(step: StepName, passed: bool, confidence: f64, message: impl Into<String>) -> Self {
        Self {
            step,
            passed,
            confidence: clamp_unit(confidence),
            metrics: Metrics::new(),
            details: Details::new(),
            message: message.into(),
            error: None,
        }
    }

    /// A failed result for malformed input. The message doubles as the
    /// error.
    pub fn invalid(step: StepName, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(step, false, 0.0, message.clone()).with_error(message)
    }

    /// Stand-in for a check that was not requested.
    pub fn skipped(step: StepName) -> Self {
        Self::new(step, true, 1.0, "skipped")
    }

    pub fn with_metric(mut self, key: &str, value: f64) -> Self {
        self.metrics.set(key, value);
        self
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<String>) -> Self {
        self.details.set(key, value.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn step(&self) -> StepName {
        self.step
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn metric(&self, key: &str) -> Option<f64> {
        self.metrics.get(key).copied()
    }

    pub fn details(&self) -> &Details {
        &self.details
    }

    pub fn detail(&self, key: &str) -> Option<&str> {
        self.details.get(key).map(String::as_str)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Serializes as a standalone step response, with `success` in place
    /// of `passed`.
    pub fn single_step_view(&self) -> SingleStepView<'_> {
        SingleStepView(self)
    }

    fn serialize_with<S: Serializer>(&self, serializer: S, verdict_key: &str) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry(verdict_key, &self.passed)?;
        map.serialize_entry("confidence", &self.confidence)?;
        for (k, v) in self.metrics.iter() {
            map.serialize_entry(k, v)?;
        }
        for (k, v) in self.details.iter() {
            map.serialize_entry(k, v)?;
        }
        map.serialize_entry("message", &self.message)?;
        if let Some(err) = &self.error {
            map.serialize_entry("error", err)?;
        }
        map.end()
    }
}

impl Serialize for StepResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.serialize_with(serializer, "passed")
    }
}

/// See [`StepResult::single_step_view`].
pub struct SingleStepView<'a>(&'a StepResult);

impl Serialize for SingleStepView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize_with(serializer, "success")
    }
}

/// Final verdict of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineResult {
    /// The detection process ran to a verdict. False when the run was
    /// aborted or the person did not match the reference.
    pub success: bool,
    pub is_live: bool,
    /// Mean confidence of the passed steps.
    pub confidence: f64,
    #[serde(serialize_with = "serialize_steps")]
    pub steps: Vec<StepResult>,
    pub passed_steps: usize,
    pub total_steps: usize,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub stage: PipelineStage,
    pub timestamp: DateTime<Utc>,
}

impl PipelineResult {
    pub fn step(&self, name: StepName) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.step() == name)
    }
}

fn serialize_steps<S: Serializer>(steps: &[StepResult], serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(steps.len()))?;
    for step in steps {
        map.serialize_entry(step.step().as_str(), step)?;
    }
    map.end()
}
