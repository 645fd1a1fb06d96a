//! Camera and microphone capture for liveness runs.
//!
//! A run claims one synchronized video+audio source through a
//! [`CaptureResource`]. The resource moves through
//! [`ResourceState::Free`] -> [`ResourceState::Held`] ->
//! [`ResourceState::Released`] exactly once, whichever way the run ends.
//!
//! # Pulling media
//!
//! ```rust,ignore
//! use facelive_capture::CaptureResource;
//!
//! let mut capture = CaptureResource::acquire(device).await?;
//! let (video, audio) = capture.split()?;
//! let frame = video.read_frame(Duration::from_millis(100)).await?;
//! capture.release();
//! ```
//!
//! Reads are bounded by a timeout and return `Ok(None)` when nothing
//! arrived in time, so callers own the wall-clock budget.

mod audio;
mod device;
mod error;
mod frame;
pub mod mock;
mod resource;

pub use audio::{AudioChunk, PcmAudio};
pub use device::{AudioSource, CaptureDevice, CaptureStreams, VideoSource};
pub use error::CaptureError;
pub use frame::{Frame, GrayImage, PixelFormat};
pub use resource::{CaptureResource, ResourceState};
