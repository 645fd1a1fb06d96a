use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::device::{AudioSource, CaptureDevice, CaptureStreams, VideoSource};
use crate::CaptureError;

/// Lifecycle state of a [`CaptureResource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceState {
    Free,
    Held,
    Released,
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::Held => write!(f, "held"),
            Self::Released => write!(f, "released"),
        }
    }
}

/// Exclusive claim on one camera + microphone pair for one run.
///
/// The claim is released by [`CaptureResource::release`] or, failing that,
/// when the value is dropped (including during a panic unwind). Release
/// happens at most once.
pub struct CaptureResource {
    device: Arc<dyn CaptureDevice>,
    streams: Option<CaptureStreams>,
    state: ResourceState,
    acquired_at: Option<DateTime<Utc>>,
}

impl CaptureResource {
    /// Opens `device` and moves the resource from Free to Held.
    pub async fn acquire(device: Arc<dyn CaptureDevice>) -> Result<Self, CaptureError> {
        let mut resource = Self {
            device,
            streams: None,
            state: ResourceState::Free,
            acquired_at: None,
        };

        if !resource.device.is_available() {
            return Err(CaptureError::Unavailable(resource.device_id().to_string()));
        }
        let streams = resource.device.open().await?;

        resource.streams = Some(streams);
        resource.state = ResourceState::Held;
        resource.acquired_at = Some(Utc::now());
        info!(device = resource.device_id(), "capture: acquired");
        Ok(resource)
    }

    /// Identifier of the underlying device.
    pub fn device_id(&self) -> &str {
        self.device.device_id()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ResourceState {
        self.state
    }

    /// When the device was claimed.
    pub fn acquired_at(&self) -> Option<DateTime<Utc>> {
        self.acquired_at
    }

    /// Video half of the device.
    pub fn video(&mut self) -> Result<&mut dyn VideoSource, CaptureError> {
        let streams = self.streams.as_mut().ok_or(CaptureError::Released)?;
        Ok(streams.video.as_mut())
    }

    /// Audio half of the device.
    pub fn audio(&mut self) -> Result<&mut dyn AudioSource, CaptureError> {
        let streams = self.streams.as_mut().ok_or(CaptureError::Released)?;
        Ok(streams.audio.as_mut())
    }

    /// Borrows both halves at once so they can be driven concurrently.
    pub fn split(&mut self) -> Result<(&mut dyn VideoSource, &mut dyn AudioSource), CaptureError> {
        let streams = self.streams.as_mut().ok_or(CaptureError::Released)?;
        Ok((streams.video.as_mut(), streams.audio.as_mut()))
    }

    /// Moves the resource from Held to Released.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.state != ResourceState::Held {
            return;
        }
        if let Some(streams) = self.streams.take() {
            self.device.release(streams);
        }
        self.state = ResourceState::Released;
        let held_ms = self
            .acquired_at
            .map(|at| (Utc::now() - at).num_milliseconds())
            .unwrap_or_default();
        debug!(device = self.device.device_id(), held_ms, "capture: released");
    }
}

impl Drop for CaptureResource {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl fmt::Debug for CaptureResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureResource")
            .field("device", &self.device_id())
            .field("state", &self.state)
            .field("acquired_at", &self.acquired_at)
            .finish()
    }
}
