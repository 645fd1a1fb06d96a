use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::CaptureError;

/// Pixel layout of a [`Frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// One byte per pixel.
    Gray8,
    /// Three bytes per pixel, red first.
    Rgb8,
    /// Three bytes per pixel, blue first (camera native on most backends).
    Bgr8,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub fn channels(self) -> usize {
        match self {
            Self::Gray8 => 1,
            Self::Rgb8 | Self::Bgr8 => 3,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gray8 => write!(f, "gray8"),
            Self::Rgb8 => write!(f, "rgb8"),
            Self::Bgr8 => write!(f, "bgr8"),
        }
    }
}

/// One video frame pulled from a capture device.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Monotonic frame counter within one capture session.
    pub seq: u64,
    /// Capture time relative to the start of the session.
    pub timestamp: Duration,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Row-major pixel data, `width * height * format.channels()` bytes.
    pub data: Bytes,
}

impl Frame {
    /// Creates a frame after checking that `data` matches the dimensions.
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: impl Into<Bytes>,
    ) -> Result<Self, CaptureError> {
        let data = data.into();
        check_layout(width, height, format, data.len())?;
        Ok(Self {
            seq: 0,
            timestamp: Duration::ZERO,
            width,
            height,
            format,
            data,
        })
    }

    /// Re-checks that `data` matches the dimensions.
    ///
    /// Fields are public, so a device can hand out a frame that never went
    /// through [`Frame::new`].
    pub fn validate(&self) -> Result<(), CaptureError> {
        check_layout(self.width, self.height, self.format, self.data.len())
    }

    /// Sets the frame counter.
    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = seq;
        self
    }

    /// Sets the capture timestamp.
    pub fn with_timestamp(mut self, timestamp: Duration) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Converts the frame to 8-bit luma using BT.601 weights.
    pub fn gray(&self) -> GrayImage {
        let data = match self.format {
            PixelFormat::Gray8 => self.data.to_vec(),
            PixelFormat::Rgb8 => self
                .data
                .chunks_exact(3)
                .map(|px| luma(px[0], px[1], px[2]))
                .collect(),
            PixelFormat::Bgr8 => self
                .data
                .chunks_exact(3)
                .map(|px| luma(px[2], px[1], px[0]))
                .collect(),
        };
        GrayImage {
            width: self.width,
            height: self.height,
            data,
        }
    }
}

fn check_layout(width: u32, height: u32, format: PixelFormat, len: usize) -> Result<(), CaptureError> {
    if width == 0 || height == 0 {
        return Err(CaptureError::InvalidFrame(format!(
            "empty dimensions {width}x{height}"
        )));
    }
    let expected = width as usize * height as usize * format.channels();
    if len != expected {
        return Err(CaptureError::InvalidFrame(format!(
            "{width}x{height} {format} needs {expected} bytes, got {len}"
        )));
    }
    Ok(())
}

fn luma(r: u8, g: u8, b: u8) -> u8 {
    let y = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
    y.round().clamp(0.0, 255.0) as u8
}

/// Single-channel 8-bit image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl GrayImage {
    /// Wraps row-major luma bytes.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, CaptureError> {
        if data.len() != width as usize * height as usize {
            return Err(CaptureError::InvalidFrame(format!(
                "{width}x{height} gray needs {} bytes, got {}",
                width as usize * height as usize,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the pixel at (x, y). Out-of-range coordinates read as 0.
    pub fn pixel(&self, x: u32, y: u32) -> u8 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        self.data
            .get(y as usize * self.width as usize + x as usize)
            .copied()
            .unwrap_or(0)
    }

    /// Mean and population standard deviation of all pixels
    /// (brightness and contrast).
    pub fn mean_std(&self) -> (f64, f64) {
        if self.data.is_empty() {
            return (0.0, 0.0);
        }
        let n = self.data.len() as f64;
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        for &p in &self.data {
            let v = p as f64;
            sum += v;
            sum_sq += v * v;
        }
        let mean = sum / n;
        let var = (sum_sq / n - mean * mean).max(0.0);
        (mean, var.sqrt())
    }

    /// Counts pixels strictly brighter than `threshold` in the half-open
    /// rectangle `[x0, x1) x [y0, y1)`, clipped to the image. Pixels past
    /// the end of a short buffer are not counted.
    pub fn count_above(&self, x0: u32, y0: u32, x1: u32, y1: u32, threshold: u8) -> usize {
        let x1 = x1.min(self.width);
        let y1 = y1.min(self.height);
        let mut count = 0;
        for y in y0..y1 {
            let row = y as usize * self.width as usize;
            for x in x0..x1 {
                if self.data.get(row + x as usize).is_some_and(|&p| p > threshold) {
                    count += 1;
                }
            }
        }
        count
    }
}
