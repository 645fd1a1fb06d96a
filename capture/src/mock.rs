//! Scripted capture device for tests and replays.
//!
//! [`MockDevice`] paces frames and audio chunks on the tokio clock, so a test
//! running with a paused clock sees the same sequence on every run.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::time::{sleep, sleep_until, Instant};

use crate::device::{AudioSource, CaptureDevice, CaptureStreams, VideoSource};
use crate::{AudioChunk, CaptureError, Frame, PixelFormat};

/// Produces the frame for a slot, or `None` when the camera yields nothing.
pub type FrameScript = Arc<dyn Fn(u64) -> Option<Frame> + Send + Sync>;

/// Produces the PCM16 payload for an audio slot, or `None` for a gap.
pub type AudioScript = Arc<dyn Fn(u64) -> Option<Bytes> + Send + Sync>;

/// Builds a uniform gray frame.
pub fn uniform_frame(width: u32, height: u32, value: u8) -> Frame {
    Frame {
        seq: 0,
        timestamp: Duration::ZERO,
        width,
        height,
        format: PixelFormat::Gray8,
        data: Bytes::from(vec![value; width as usize * height as usize]),
    }
}

/// A capture device driven by closures.
pub struct MockDevice {
    id: String,
    available: bool,
    frame_interval: Duration,
    frames: FrameScript,
    sample_rate: u32,
    chunk_interval: Duration,
    audio: AudioScript,
    read_error_at: Option<u64>,
    held: AtomicBool,
    opens: AtomicUsize,
    releases: AtomicUsize,
}

impl MockDevice {
    /// Creates an available device producing 30 fps uniform 320x240 frames
    /// and 100 ms chunks of 16 kHz silence.
    pub fn new(id: &str) -> Self {
        let frame = uniform_frame(320, 240, 128);
        Self {
            id: id.to_string(),
            available: true,
            frame_interval: Duration::from_secs(1) / 30,
            frames: Arc::new(move |_| Some(frame.clone())),
            sample_rate: 16000,
            chunk_interval: Duration::from_millis(100),
            audio: Arc::new(|_| Some(Bytes::from(vec![0u8; 3200]))),
            read_error_at: None,
            held: AtomicBool::new(false),
            opens: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
        }
    }

    /// Makes availability probes fail.
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Sets the frame rate.
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.frame_interval = Duration::from_secs(1) / fps.max(1);
        self
    }

    /// Sets the frame script.
    pub fn with_frames<F>(mut self, frames: F) -> Self
    where
        F: Fn(u64) -> Option<Frame> + Send + Sync + 'static,
    {
        self.frames = Arc::new(frames);
        self
    }

    /// Sets the audio script. `chunk_interval` is the wall time between chunks.
    pub fn with_audio<F>(mut self, sample_rate: u32, chunk_interval: Duration, audio: F) -> Self
    where
        F: Fn(u64) -> Option<Bytes> + Send + Sync + 'static,
    {
        self.sample_rate = sample_rate;
        self.chunk_interval = chunk_interval;
        self.audio = Arc::new(audio);
        self
    }

    /// Makes the video read for slot `seq` fail.
    pub fn with_read_error_at(mut self, seq: u64) -> Self {
        self.read_error_at = Some(seq);
        self
    }

    /// Number of successful opens.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Number of releases.
    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// Whether the device is currently claimed.
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureDevice for MockDevice {
    fn device_id(&self) -> &str {
        &self.id
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn open(&self) -> Result<CaptureStreams, CaptureError> {
        if !self.available {
            return Err(CaptureError::Unavailable(self.id.clone()));
        }
        if self.held.swap(true, Ordering::SeqCst) {
            return Err(CaptureError::Busy(self.id.clone()));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);

        let started = Instant::now();
        Ok(CaptureStreams {
            video: Box::new(MockVideo {
                script: self.frames.clone(),
                interval: self.frame_interval,
                started,
                next_due: started,
                seq: 0,
                read_error_at: self.read_error_at,
            }),
            audio: Box::new(MockAudio {
                script: self.audio.clone(),
                sample_rate: self.sample_rate,
                interval: self.chunk_interval,
                started,
                next_due: started,
                seq: 0,
            }),
        })
    }

    fn release(&self, streams: CaptureStreams) {
        drop(streams);
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.held.store(false, Ordering::SeqCst);
    }
}

struct MockVideo {
    script: FrameScript,
    interval: Duration,
    started: Instant,
    next_due: Instant,
    seq: u64,
    read_error_at: Option<u64>,
}

#[async_trait]
impl VideoSource for MockVideo {
    async fn read_frame(&mut self, timeout: Duration) -> Result<Option<Frame>, CaptureError> {
        if self.next_due > Instant::now() + timeout {
            sleep(timeout).await;
            return Ok(None);
        }
        sleep_until(self.next_due).await;

        let seq = self.seq;
        let timestamp = self.next_due - self.started;
        self.seq += 1;
        self.next_due += self.interval;

        if self.read_error_at == Some(seq) {
            return Err(CaptureError::Read(format!("scripted failure at frame {seq}")));
        }
        Ok((self.script)(seq).map(|f| f.with_seq(seq).with_timestamp(timestamp)))
    }
}

struct MockAudio {
    script: AudioScript,
    sample_rate: u32,
    interval: Duration,
    started: Instant,
    next_due: Instant,
    seq: u64,
}

#[async_trait]
impl AudioSource for MockAudio {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    async fn read_chunk(&mut self, timeout: Duration) -> Result<Option<AudioChunk>, CaptureError> {
        if self.next_due > Instant::now() + timeout {
            sleep(timeout).await;
            return Ok(None);
        }
        sleep_until(self.next_due).await;

        let seq = self.seq;
        let timestamp = self.next_due - self.started;
        self.seq += 1;
        self.next_due += self.interval;

        Ok((self.script)(seq).map(|data| AudioChunk {
            seq,
            timestamp,
            sample_rate: self.sample_rate,
            data,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn frames_are_paced_by_fps() {
        let device = MockDevice::new("cam").with_fps(10);
        let mut streams = device.open().await.unwrap();
        let start = Instant::now();
        let first = streams.video.read_frame(Duration::from_secs(1)).await.unwrap().unwrap();
        let second = streams.video.read_frame(Duration::from_secs(1)).await.unwrap().unwrap();
        assert_eq!((first.seq, second.seq), (0, 1));
        assert_eq!(second.timestamp, Duration::from_millis(100));
        assert_eq!(Instant::now() - start, Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn short_timeout_returns_none() {
        let device = MockDevice::new("cam").with_fps(1);
        let mut streams = device.open().await.unwrap();
        assert!(streams.video.read_frame(Duration::from_millis(10)).await.unwrap().is_some());
        assert!(streams.video.read_frame(Duration::from_millis(10)).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn scripted_gap_and_error() {
        let device = MockDevice::new("cam")
            .with_frames(|seq| (seq != 1).then(|| uniform_frame(2, 2, 0)))
            .with_read_error_at(2);
        let mut streams = device.open().await.unwrap();
        let timeout = Duration::from_secs(1);
        assert!(streams.video.read_frame(timeout).await.unwrap().is_some());
        assert!(streams.video.read_frame(timeout).await.unwrap().is_none());
        assert!(streams.video.read_frame(timeout).await.is_err());
    }
}
