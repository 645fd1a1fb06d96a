use std::time::Duration;

use bytes::Bytes;

use crate::CaptureError;

/// A block of PCM16 signed little-endian mono audio pulled from a microphone.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Monotonic chunk counter within one capture session.
    pub seq: u64,
    /// Capture time relative to the start of the session.
    pub timestamp: Duration,
    pub sample_rate: u32,
    pub data: Bytes,
}

impl AudioChunk {
    /// Number of samples in the chunk.
    pub fn samples(&self) -> usize {
        self.data.len() / 2
    }

    /// Playback duration of the chunk.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples() as f64 / self.sample_rate as f64)
    }
}

/// A complete pre-recorded PCM16 mono buffer.
#[derive(Debug, Clone)]
pub struct PcmAudio {
    pub sample_rate: u32,
    pub data: Bytes,
}

impl PcmAudio {
    /// Wraps raw PCM16 signed little-endian mono samples.
    pub fn raw(sample_rate: u32, data: impl Into<Bytes>) -> Result<Self, CaptureError> {
        let data = data.into();
        if sample_rate == 0 {
            return Err(CaptureError::InvalidAudio("sample rate is zero".into()));
        }
        if data.len() % 2 != 0 {
            return Err(CaptureError::InvalidAudio(format!(
                "odd byte count {} for 16-bit samples",
                data.len()
            )));
        }
        Ok(Self { sample_rate, data })
    }

    /// Decodes a RIFF/WAVE file holding 16-bit PCM. Multi-channel input
    /// keeps only the first channel.
    pub fn from_wav(wav: &[u8]) -> Result<Self, CaptureError> {
        if wav.len() < 12 || &wav[0..4] != b"RIFF" || &wav[8..12] != b"WAVE" {
            return Err(CaptureError::InvalidAudio("missing RIFF/WAVE header".into()));
        }

        let mut fmt: Option<(u16, u16, u32, u16)> = None;
        let mut pos = 12;
        while pos + 8 <= wav.len() {
            let id = &wav[pos..pos + 4];
            let size = u32::from_le_bytes([wav[pos + 4], wav[pos + 5], wav[pos + 6], wav[pos + 7]])
                as usize;
            let body_start = pos + 8;
            let body_end = body_start.saturating_add(size).min(wav.len());
            let body = &wav[body_start..body_end];

            match id {
                b"fmt " => {
                    if body.len() < 16 {
                        return Err(CaptureError::InvalidAudio("short fmt chunk".into()));
                    }
                    let audio_format = u16::from_le_bytes([body[0], body[1]]);
                    let channels = u16::from_le_bytes([body[2], body[3]]);
                    let sample_rate = u32::from_le_bytes([body[4], body[5], body[6], body[7]]);
                    let bits = u16::from_le_bytes([body[14], body[15]]);
                    fmt = Some((audio_format, channels, sample_rate, bits));
                }
                b"data" => {
                    let (audio_format, channels, sample_rate, bits) = fmt.ok_or_else(|| {
                        CaptureError::InvalidAudio("data chunk before fmt chunk".into())
                    })?;
                    if audio_format != 1 || bits != 16 {
                        return Err(CaptureError::InvalidAudio(format!(
                            "unsupported encoding: format {audio_format}, {bits} bits"
                        )));
                    }
                    if channels == 0 {
                        return Err(CaptureError::InvalidAudio("zero channels".into()));
                    }
                    return Self::raw(sample_rate, first_channel(body, channels as usize));
                }
                _ => {}
            }

            // Chunks are padded to an even size.
            pos = body_start.saturating_add(size + (size & 1));
        }

        Err(CaptureError::InvalidAudio("no data chunk".into()))
    }

    /// Splits the buffer into consecutive blocks of at most `samples` samples.
    pub fn chunks(&self, samples: usize) -> impl Iterator<Item = &[u8]> {
        self.data.chunks(samples.max(1) * 2)
    }

    /// Playback duration of the buffer.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64((self.data.len() / 2) as f64 / self.sample_rate as f64)
    }
}

fn first_channel(interleaved: &[u8], channels: usize) -> Vec<u8> {
    let frame_bytes = channels * 2;
    interleaved
        .chunks_exact(frame_bytes)
        .flat_map(|frame| [frame[0], frame[1]])
        .collect()
}
