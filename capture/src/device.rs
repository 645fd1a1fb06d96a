use std::time::Duration;

use async_trait::async_trait;

use crate::{AudioChunk, CaptureError, Frame};

/// Video half of an opened capture device.
#[async_trait]
pub trait VideoSource: Send {
    /// Waits up to `timeout` for the next frame.
    ///
    /// Returns `Ok(None)` when no frame arrived in time. A stalled camera
    /// keeps returning `Ok(None)`; deciding when that becomes fatal is the
    /// caller's job.
    async fn read_frame(&mut self, timeout: Duration) -> Result<Option<Frame>, CaptureError>;
}

/// Audio half of an opened capture device. Chunks are PCM16 mono.
#[async_trait]
pub trait AudioSource: Send {
    /// Sample rate of every chunk this source yields.
    fn sample_rate(&self) -> u32;

    /// Waits up to `timeout` for the next audio chunk.
    async fn read_chunk(&mut self, timeout: Duration) -> Result<Option<AudioChunk>, CaptureError>;
}

/// Both halves of an opened device.
pub struct CaptureStreams {
    pub video: Box<dyn VideoSource>,
    pub audio: Box<dyn AudioSource>,
}

/// A physical camera + microphone pair.
///
/// Opening claims the pair exclusively until [`CaptureDevice::release`] is
/// called. Callers should go through [`crate::CaptureResource`], which
/// guarantees the release.
///
/// # Thread Safety
///
/// Implementations must be safe for concurrent use; availability probes
/// may run while another task holds the device.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Stable identifier of the device (e.g. "/dev/video0").
    fn device_id(&self) -> &str;

    /// Reports whether the device could be opened right now, without
    /// claiming it.
    fn is_available(&self) -> bool;

    /// Claims the device and starts both streams.
    async fn open(&self) -> Result<CaptureStreams, CaptureError>;

    /// Stops the streams and gives up the claim.
    fn release(&self, streams: CaptureStreams);
}
