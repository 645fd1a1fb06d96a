//! Step executors.
//!
//! Each step pulls media until its wall-clock budget runs out, never
//! stopping early on "enough evidence". A stalled source becomes a
//! resource error once nothing has arrived for the grace period.

pub(crate) mod blink_gaze;
pub(crate) mod depth_pose;
pub(crate) mod person;
pub(crate) mod voice_captcha;

use std::time::Duration;

use facelive_capture::{AudioChunk, AudioSource, Frame, VideoSource};
use tokio::time::Instant;

use crate::config::CaptureConfig;
use crate::LivenessError;

/// Enforces a step's time budget and the stall grace period.
#[derive(Debug)]
pub(crate) struct Pacer {
    deadline: Instant,
    grace: Duration,
    read_timeout: Duration,
    last_progress: Instant,
}

impl Pacer {
    pub(crate) fn new(budget: Duration, capture: &CaptureConfig) -> Self {
        let now = Instant::now();
        Self {
            deadline: now + budget,
            grace: capture.grace_period(),
            read_timeout: capture.read_timeout(),
            last_progress: now,
        }
    }

    fn next_timeout(&self) -> Option<Duration> {
        let now = Instant::now();
        if now >= self.deadline {
            return None;
        }
        Some(self.read_timeout.min(self.deadline - now))
    }

    fn check_stall(&self, what: &str) -> Result<(), LivenessError> {
        let idle = Instant::now() - self.last_progress;
        if idle >= self.grace {
            return Err(LivenessError::Resource(format!(
                "no {what} received for {:.1}s",
                idle.as_secs_f64()
            )));
        }
        Ok(())
    }

    /// Next frame, or `None` once the budget is spent.
    pub(crate) async fn next_frame(
        &mut self,
        video: &mut dyn VideoSource,
    ) -> Result<Option<Frame>, LivenessError> {
        while let Some(timeout) = self.next_timeout() {
            if let Some(frame) = video.read_frame(timeout).await? {
                frame.validate()?;
                self.last_progress = Instant::now();
                return Ok(Some(frame));
            }
            self.check_stall("video frame")?;
        }
        Ok(None)
    }

    /// Next audio chunk, or `None` once the budget is spent.
    pub(crate) async fn next_chunk(
        &mut self,
        audio: &mut dyn AudioSource,
    ) -> Result<Option<AudioChunk>, LivenessError> {
        while let Some(timeout) = self.next_timeout() {
            if let Some(chunk) = audio.read_chunk(timeout).await? {
                self.last_progress = Instant::now();
                return Ok(Some(chunk));
            }
            self.check_stall("audio chunk")?;
        }
        Ok(None)
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation, 0 when empty.
fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    (values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64).sqrt()
}
