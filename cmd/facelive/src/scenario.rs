//! Scripted capture scenarios.
//!
//! A scenario file describes a simulated subject in front of the camera and
//! how each model responds to it. Every section is optional; the defaults
//! describe a live subject that passes every step.
//!
//! ```yaml
//! camera:
//!   fps: 30
//!   pattern: gaze_shift
//! face:
//!   similarity: 0.3        # a different person
//! depth:
//!   texture: 0.0           # a flat photo
//! speech:
//!   transcript: "the answer is {answer}"
//! ```
//!
//! `{answer}` in the transcript is replaced by the answer to the first
//! captcha challenge, so a seeded run always answers correctly.

use std::path::Path;
use std::sync::Arc;

use facelive_capture::mock::{uniform_frame, MockDevice};
use facelive_liveness::Providers;
use facelive_perception::mock::{
    gaze_shift_frame, DepthScript, FaceScript, FaceShape, ScriptedDepthPose, ScriptedFaceMatcher,
    ScriptedLandmarks, ScriptedTranscriber,
};
use facelive_perception::PoseEstimate;
use serde::{Deserialize, Serialize};

/// Embedding width of the scripted face matcher.
const EMBEDDING_DIM: usize = 128;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub camera: CameraScript,
    pub face: FaceMatchScript,
    pub depth: DepthPoseScript,
    pub landmarks: LandmarkScript,
    pub speech: SpeechScript,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FramePattern {
    /// Uniform gray at `brightness`.
    Uniform,
    /// Vertical stripes that read as a sideways glance.
    GazeShift,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraScript {
    pub available: bool,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub pattern: FramePattern,
    pub brightness: u8,
    /// The camera goes dark after this many frames.
    pub stall_after: Option<u64>,
    pub sample_rate: u32,
}

impl Default for CameraScript {
    fn default() -> Self {
        Self {
            available: true,
            fps: 30,
            width: 320,
            height: 240,
            pattern: FramePattern::GazeShift,
            brightness: 128,
            stall_after: None,
            sample_rate: 16000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceMatchScript {
    pub ready: bool,
    /// Cosine similarity of every live face to the reference.
    pub similarity: f32,
    /// Faces detected per live frame.
    pub faces: usize,
    /// Faces detected in the reference image.
    pub reference_faces: usize,
}

impl Default for FaceMatchScript {
    fn default() -> Self {
        Self {
            ready: true,
            similarity: 0.9,
            faces: 1,
            reference_faces: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthPoseScript {
    pub ready: bool,
    /// Standard deviation of the depth texture over the face.
    pub texture: f32,
    /// Head sways a few degrees in yaw.
    pub head_motion: bool,
    pub reprojection_error: f64,
}

impl Default for DepthPoseScript {
    fn default() -> Self {
        Self {
            ready: true,
            texture: 8.0,
            head_motion: true,
            reprojection_error: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandmarkScript {
    pub ready: bool,
    pub face_present: bool,
    /// Eyes close for three frames out of every `blink_every`. 0 never blinks.
    pub blink_every: u64,
    /// Mouth toggles open/closed every `mouth_every` frames. 0 keeps it still.
    pub mouth_every: u64,
}

impl Default for LandmarkScript {
    fn default() -> Self {
        Self {
            ready: true,
            face_present: true,
            blink_every: 30,
            mouth_every: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechScript {
    pub ready: bool,
    pub transcript: String,
    pub chunks_per_word: usize,
}

impl Default for SpeechScript {
    fn default() -> Self {
        Self {
            ready: true,
            transcript: "the answer is {answer}".to_string(),
            chunks_per_word: 1,
        }
    }
}

impl LandmarkScript {
    fn shape(&self, seq: u64) -> Option<FaceShape> {
        if !self.face_present {
            return None;
        }
        let closed = self.blink_every > 0 && seq % self.blink_every >= self.blink_every.saturating_sub(3);
        let open = self.mouth_every > 0 && (seq / self.mouth_every) % 2 == 1;
        Some(FaceShape {
            ear: if closed { 0.15 } else { 0.3 },
            mar: if open { 0.4 } else { 0.1 },
        })
    }
}

impl Scenario {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&data)
    }

    pub fn from_yaml_str(s: &str) -> anyhow::Result<Self> {
        if s.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(s)?)
    }

    pub fn device(&self) -> Arc<MockDevice> {
        let cam = self.camera.clone();
        let frame = match cam.pattern {
            FramePattern::Uniform => uniform_frame(cam.width, cam.height, cam.brightness),
            FramePattern::GazeShift => gaze_shift_frame(cam.width, cam.height),
        };
        let stall_after = cam.stall_after;
        let mut device = MockDevice::new("scenario-cam")
            .with_fps(cam.fps)
            .with_frames(move |seq| match stall_after {
                Some(n) if seq >= n => None,
                _ => Some(frame.clone()),
            });
        if cam.sample_rate != 16000 {
            let chunk = vec![0u8; (cam.sample_rate / 10) as usize * 2];
            device = device.with_audio(
                cam.sample_rate,
                std::time::Duration::from_millis(100),
                move |_| Some(chunk.clone().into()),
            );
        }
        if !cam.available {
            device = device.unavailable();
        }
        Arc::new(device)
    }

    /// Scripted providers. `answer` fills the `{answer}` placeholder.
    pub fn providers(&self, answer: &str) -> Providers {
        let f = &self.face;
        let (faces, similarity) = (f.faces, f.similarity);
        let mut face = ScriptedFaceMatcher::new(EMBEDDING_DIM)
            .with_reference_faces(f.reference_faces)
            .with_script(move |_| match faces {
                0 => FaceScript::NoFace,
                1 => FaceScript::Match(similarity),
                n => FaceScript::Crowd(n),
            });
        if !f.ready {
            face = face.not_ready("face model not loaded");
        }

        let d = self.depth.clone();
        let mut depth = ScriptedDepthPose::new(move |seq| {
            let yaw = match (d.head_motion, seq % 2) {
                (false, _) => 0.0,
                (true, 0) => 3.0,
                (true, _) => -3.0,
            };
            DepthScript {
                depth_std: d.texture,
                pose: Some(PoseEstimate {
                    yaw,
                    reprojection_error: d.reprojection_error,
                    ..PoseEstimate::default()
                }),
            }
        });
        if !self.depth.ready {
            depth = depth.not_ready("depth model not loaded");
        }

        let l = self.landmarks.clone();
        let mut landmarks = ScriptedLandmarks::new(move |seq| l.shape(seq));
        if !self.landmarks.ready {
            landmarks = landmarks.not_ready("landmark model not loaded");
        }

        let s = &self.speech;
        let mut speech = ScriptedTranscriber::new(&s.transcript.replace("{answer}", answer))
            .with_chunks_per_word(s.chunks_per_word);
        if !s.ready {
            speech = speech.not_ready("speech model not loaded");
        }

        Providers {
            face: Arc::new(face),
            depth_pose: Arc::new(depth),
            landmarks: Arc::new(landmarks),
            speech: Arc::new(speech),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facelive_capture::CaptureDevice;
    use facelive_liveness::StepName;

    #[test]
    fn empty_scenario_is_live_subject() {
        let s = Scenario::from_yaml_str("").unwrap();
        assert_eq!(s, Scenario::default());
        assert!(s.camera.available);
        assert_eq!(s.speech.transcript, "the answer is {answer}");
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let s = Scenario::from_yaml_str("face:\n  similarity: 0.2\ncamera:\n  stall_after: 5\n").unwrap();
        assert_eq!(s.face.similarity, 0.2);
        assert_eq!(s.face.faces, 1);
        assert_eq!(s.camera.stall_after, Some(5));
        assert_eq!(s.camera.fps, 30);
    }

    #[test]
    fn blink_and_mouth_schedule() {
        let l = LandmarkScript::default();
        let ears: Vec<f32> = (25..31).map(|seq| l.shape(seq).unwrap().ear).collect();
        assert_eq!(ears, [0.3, 0.3, 0.15, 0.15, 0.15, 0.3]);
        assert_eq!(l.shape(0).unwrap().mar, 0.1);
        assert_eq!(l.shape(3).unwrap().mar, 0.4);

        let still = LandmarkScript {
            blink_every: 0,
            mouth_every: 0,
            ..LandmarkScript::default()
        };
        assert_eq!(still.shape(29), Some(FaceShape::NEUTRAL));
    }

    #[test]
    fn unready_models_are_reported() {
        let s = Scenario::from_yaml_str("speech:\n  ready: false\n").unwrap();
        let p = s.providers("27");
        assert!(p.readiness(StepName::VoiceCaptcha).is_err());
        assert!(p.readiness(StepName::BlinkGaze).is_ok());
    }

    #[test]
    fn unavailable_camera() {
        let s = Scenario::from_yaml_str("camera:\n  available: false\n").unwrap();
        assert!(!s.device().is_available());
    }

    #[test]
    fn scenario_file_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spoof.yaml");
        std::fs::write(&path, "depth:\n  texture: 0.0\n  head_motion: false\n").unwrap();
        let s = Scenario::load(&path).unwrap();
        assert_eq!(s.depth.texture, 0.0);
        assert!(!s.depth.head_motion);
    }
}
