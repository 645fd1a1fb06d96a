//! Scripted providers for tests and offline scenarios.
//!
//! Each provider is driven by a closure over the frame sequence number so a
//! test can describe exactly what the "model" sees on every frame.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use facelive_capture::{Frame, PixelFormat};
use parking_lot::Mutex;

use crate::{
    BlinkGazeAnalyzer, BoundingBox, DepthMap, DepthPoseEstimator, FaceDetection, FaceLandmarks,
    FaceMatcher, PerceptionError, PoseEstimate, Point2, Point3, SpeechTranscriber,
    TranscriptStream,
};

/// Sequence number carried by frames produced from
/// [`ScriptedFaceMatcher::decode_image`].
pub const REFERENCE_SEQ: u64 = u64::MAX;

fn check_ready(model: &str, not_ready: &Option<String>) -> Result<(), PerceptionError> {
    match not_ready {
        Some(reason) => Err(PerceptionError::not_ready(model, reason.clone())),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Face matcher
// ---------------------------------------------------------------------------

/// What the face matcher reports for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FaceScript {
    NoFace,
    /// One face whose embedding has the given cosine similarity to the
    /// reference.
    Match(f32),
    /// Several faces.
    Crowd(usize),
}

type FaceFn = Arc<dyn Fn(u64) -> FaceScript + Send + Sync>;

/// Face matcher whose reference embedding is the first basis vector.
pub struct ScriptedFaceMatcher {
    dimension: usize,
    not_ready: Option<String>,
    reference_faces: usize,
    decode_error: bool,
    error_at: Option<u64>,
    script: FaceFn,
    detect_calls: AtomicUsize,
}

impl ScriptedFaceMatcher {
    /// Every frame matches the reference with similarity 0.9.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(2),
            not_ready: None,
            reference_faces: 1,
            decode_error: false,
            error_at: None,
            script: Arc::new(|_| FaceScript::Match(0.9)),
            detect_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_script<F>(mut self, script: F) -> Self
    where
        F: Fn(u64) -> FaceScript + Send + Sync + 'static,
    {
        self.script = Arc::new(script);
        self
    }

    pub fn not_ready(mut self, reason: &str) -> Self {
        self.not_ready = Some(reason.to_string());
        self
    }

    /// Number of faces found in the decoded reference image.
    pub fn with_reference_faces(mut self, n: usize) -> Self {
        self.reference_faces = n;
        self
    }

    pub fn failing_decode(mut self) -> Self {
        self.decode_error = true;
        self
    }

    /// `detect` fails with a backend error on this frame.
    pub fn with_error_at(mut self, seq: u64) -> Self {
        self.error_at = Some(seq);
        self
    }

    pub fn detect_calls(&self) -> usize {
        self.detect_calls.load(Ordering::SeqCst)
    }

    fn reference_embedding(&self) -> Vec<f32> {
        let mut v = vec![0.0; self.dimension];
        v[0] = 3.0;
        v
    }

    fn embedding_with_similarity(&self, similarity: f32) -> Vec<f32> {
        let s = similarity.clamp(-1.0, 1.0);
        let mut v = vec![0.0; self.dimension];
        v[0] = 2.0 * s;
        v[1] = 2.0 * (1.0 - s * s).sqrt();
        v
    }

    fn face(&self, embedding: Vec<f32>) -> FaceDetection {
        FaceDetection {
            bbox: BoundingBox::new(80.0, 60.0, 160.0, 160.0),
            embedding,
        }
    }
}

impl FaceMatcher for ScriptedFaceMatcher {
    fn readiness(&self) -> Result<(), PerceptionError> {
        check_ready("face_matcher", &self.not_ready)
    }

    fn decode_image(&self, encoded: &[u8]) -> Result<Frame, PerceptionError> {
        if self.decode_error || encoded.is_empty() {
            return Err(PerceptionError::Decode("unrecognized image data".into()));
        }
        Frame::new(1, 1, PixelFormat::Gray8, vec![0u8])
            .map(|f| f.with_seq(REFERENCE_SEQ))
            .map_err(|e| PerceptionError::Decode(e.to_string()))
    }

    fn detect(&self, frame: &Frame) -> Result<Vec<FaceDetection>, PerceptionError> {
        if frame.seq == REFERENCE_SEQ {
            return Ok((0..self.reference_faces)
                .map(|_| self.face(self.reference_embedding()))
                .collect());
        }
        self.detect_calls.fetch_add(1, Ordering::SeqCst);
        if self.error_at == Some(frame.seq) {
            return Err(PerceptionError::Backend(format!(
                "detector crashed on frame {}",
                frame.seq
            )));
        }
        Ok(match (self.script)(frame.seq) {
            FaceScript::NoFace => Vec::new(),
            FaceScript::Match(sim) => vec![self.face(self.embedding_with_similarity(sim))],
            FaceScript::Crowd(n) => (0..n)
                .map(|_| self.face(self.embedding_with_similarity(0.9)))
                .collect(),
        })
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

// ---------------------------------------------------------------------------
// Depth and pose
// ---------------------------------------------------------------------------

/// What the depth/pose model reports for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthScript {
    /// Standard deviation of the generated depth texture.
    pub depth_std: f32,
    pub pose: Option<PoseEstimate>,
}

type DepthFn = Arc<dyn Fn(u64) -> DepthScript + Send + Sync>;

/// Depth/pose estimator driven by a per-frame script.
///
/// `solve_pose` answers for the frame most recently passed to
/// `estimate_depth`.
pub struct ScriptedDepthPose {
    not_ready: Option<String>,
    script: DepthFn,
    last_seq: AtomicU64,
}

impl ScriptedDepthPose {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(u64) -> DepthScript + Send + Sync + 'static,
    {
        Self {
            not_ready: None,
            script: Arc::new(script),
            last_seq: AtomicU64::new(0),
        }
    }

    /// Textured depth with a head that sways ±3° in yaw.
    pub fn textured(depth_std: f32) -> Self {
        Self::new(move |seq| DepthScript {
            depth_std,
            pose: Some(PoseEstimate {
                yaw: if seq % 2 == 0 { 3.0 } else { -3.0 },
                pitch: 0.0,
                roll: 0.0,
                reprojection_error: 2.0,
            }),
        })
    }

    /// Flat depth and a perfectly still head, like a photo held up to the
    /// camera.
    pub fn flat() -> Self {
        Self::new(|_| DepthScript {
            depth_std: 0.0,
            pose: Some(PoseEstimate {
                reprojection_error: 2.0,
                ..PoseEstimate::default()
            }),
        })
    }

    pub fn not_ready(mut self, reason: &str) -> Self {
        self.not_ready = Some(reason.to_string());
        self
    }
}

impl DepthPoseEstimator for ScriptedDepthPose {
    fn readiness(&self) -> Result<(), PerceptionError> {
        check_ready("depth_pose", &self.not_ready)
    }

    fn estimate_depth(&self, frame: &Frame) -> Result<DepthMap, PerceptionError> {
        self.last_seq.store(frame.seq, Ordering::SeqCst);
        let s = (self.script)(frame.seq).depth_std;
        let (w, h) = (frame.width, frame.height);
        let data = (0..h)
            .flat_map(|y| {
                (0..w).map(move |x| if (x + y) % 2 == 0 { 10.0 + s } else { 10.0 - s })
            })
            .collect();
        DepthMap::new(w, h, data)
    }

    fn solve_pose(
        &self,
        _image_points: &[Point2; 6],
        _model_points: &[Point3; 6],
        _frame_size: (u32, u32),
    ) -> Result<Option<PoseEstimate>, PerceptionError> {
        let seq = self.last_seq.load(Ordering::SeqCst);
        Ok((self.script)(seq).pose)
    }
}

// ---------------------------------------------------------------------------
// Landmarks
// ---------------------------------------------------------------------------

/// Eye and mouth opening of a synthetic face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceShape {
    pub ear: f32,
    pub mar: f32,
}

impl FaceShape {
    pub const NEUTRAL: FaceShape = FaceShape { ear: 0.3, mar: 0.1 };
}

type ShapeFn = Arc<dyn Fn(u64) -> Option<FaceShape> + Send + Sync>;

/// Landmark detector producing [`synthetic_face`] geometry per frame.
pub struct ScriptedLandmarks {
    not_ready: Option<String>,
    script: ShapeFn,
}

impl ScriptedLandmarks {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(u64) -> Option<FaceShape> + Send + Sync + 'static,
    {
        Self {
            not_ready: None,
            script: Arc::new(script),
        }
    }

    /// The same face on every frame.
    pub fn steady(shape: FaceShape) -> Self {
        Self::new(move |_| Some(shape))
    }

    pub fn not_ready(mut self, reason: &str) -> Self {
        self.not_ready = Some(reason.to_string());
        self
    }
}

impl BlinkGazeAnalyzer for ScriptedLandmarks {
    fn readiness(&self) -> Result<(), PerceptionError> {
        check_ready("blink_gaze", &self.not_ready)
    }

    fn landmarks(&self, frame: &Frame) -> Result<Vec<FaceLandmarks>, PerceptionError> {
        Ok((self.script)(frame.seq)
            .map(|s| synthetic_face(s.ear, s.mar))
            .into_iter()
            .collect())
    }
}

/// A 68-point face laid out for a 320x240 frame.
///
/// The jaw spans x 80..240 and y 100..200, brows sit at y 80, so the padded
/// face box is 200 pixels wide. Each eye is an 8-pixel wide crop starting on
/// a multiple of 8 (x 128 and x 176, centred on y 100). The eye aspect ratio
/// equals `ear` and the mouth aspect ratio equals `mar`.
pub fn synthetic_face(ear: f32, mar: f32) -> FaceLandmarks {
    let mut points = Vec::with_capacity(crate::LANDMARK_COUNT);

    // Jaw 0..17, chin at index 8.
    for i in 0..17 {
        let t = (i as f32 - 8.0) / 8.0;
        points.push(Point2::new(80.0 + 10.0 * i as f32, 100.0 + 100.0 * (1.0 - t * t)));
    }
    // Brows 17..27.
    for i in 0..10 {
        let x = if i < 5 { 110.0 + 8.0 * i as f32 } else { 170.0 + 8.0 * (i - 5) as f32 };
        points.push(Point2::new(x, 80.0));
    }
    // Nose bridge 27..31, tip at 30.
    for y in [105.0, 112.0, 120.0, 130.0] {
        points.push(Point2::new(160.0, y));
    }
    // Nostrils 31..36.
    for i in 0..5 {
        points.push(Point2::new(150.0 + 5.0 * i as f32, 135.0));
    }
    // Eyes 36..42 and 42..48.
    let h = 4.0 * ear;
    for x0 in [128.0f32, 176.0] {
        let cy = 100.0;
        points.extend([
            Point2::new(x0, cy),
            Point2::new(x0 + 3.0, cy - h),
            Point2::new(x0 + 5.0, cy - h),
            Point2::new(x0 + 8.0, cy),
            Point2::new(x0 + 5.0, cy + h),
            Point2::new(x0 + 3.0, cy + h),
        ]);
    }
    // Mouth 48..68: outer lip then inner lip.
    let (cx, cy) = (160.0f32, 170.0f32);
    let h = 20.0 * mar;
    points.extend([
        Point2::new(cx - 20.0, cy),
        Point2::new(cx - 14.0, cy - h / 2.0),
        Point2::new(cx - 7.0, cy - h),
        Point2::new(cx, cy - h),
        Point2::new(cx + 7.0, cy - h),
        Point2::new(cx + 14.0, cy - h / 2.0),
        Point2::new(cx + 20.0, cy),
        Point2::new(cx + 14.0, cy + h / 2.0),
        Point2::new(cx + 7.0, cy + h),
        Point2::new(cx, cy + h),
        Point2::new(cx - 7.0, cy + h),
        Point2::new(cx - 14.0, cy + h / 2.0),
        Point2::new(cx - 15.0, cy),
        Point2::new(cx - 7.0, cy - h / 2.0),
        Point2::new(cx, cy - h / 2.0),
        Point2::new(cx + 7.0, cy - h / 2.0),
        Point2::new(cx + 15.0, cy),
        Point2::new(cx + 7.0, cy + h / 2.0),
        Point2::new(cx, cy + h / 2.0),
        Point2::new(cx - 7.0, cy + h / 2.0),
    ]);

    FaceLandmarks { points }
}

/// A grayscale frame with vertical stripes of period 8: columns with
/// `x % 8 < 5` are bright and the rest dark.
///
/// Over the eye crops of [`synthetic_face`] the left half of each eye is
/// all bright and the right half has one bright column in four, which reads
/// as a sideways glance.
pub fn gaze_shift_frame(width: u32, height: u32) -> Frame {
    let row: Vec<u8> = (0..width).map(|x| if x % 8 < 5 { 200 } else { 20 }).collect();
    let data: Vec<u8> = (0..height).flat_map(|_| row.iter().copied()).collect();
    Frame {
        seq: 0,
        timestamp: Duration::ZERO,
        width,
        height,
        format: PixelFormat::Gray8,
        data: Bytes::from(data),
    }
}

// ---------------------------------------------------------------------------
// Speech
// ---------------------------------------------------------------------------

/// Transcriber that reveals one word of a fixed transcript every
/// `chunks_per_word` audio chunks.
pub struct ScriptedTranscriber {
    not_ready: Option<String>,
    transcript: String,
    chunks_per_word: usize,
    fail_start: bool,
    sessions: Arc<Mutex<Vec<usize>>>,
}

impl ScriptedTranscriber {
    pub fn new(transcript: &str) -> Self {
        Self {
            not_ready: None,
            transcript: transcript.to_string(),
            chunks_per_word: 1,
            fail_start: false,
            sessions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_chunks_per_word(mut self, n: usize) -> Self {
        self.chunks_per_word = n.max(1);
        self
    }

    pub fn not_ready(mut self, reason: &str) -> Self {
        self.not_ready = Some(reason.to_string());
        self
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Chunks accepted by each session opened so far.
    pub fn session_chunks(&self) -> Vec<usize> {
        self.sessions.lock().clone()
    }
}

impl SpeechTranscriber for ScriptedTranscriber {
    fn readiness(&self) -> Result<(), PerceptionError> {
        check_ready("speech", &self.not_ready)
    }

    fn start(&self, _sample_rate: u32) -> Result<Box<dyn TranscriptStream>, PerceptionError> {
        if self.fail_start {
            return Err(PerceptionError::Backend("recognizer refused session".into()));
        }
        let mut sessions = self.sessions.lock();
        sessions.push(0);
        Ok(Box::new(ScriptedStream {
            words: self.transcript.split_whitespace().map(String::from).collect(),
            chunks_per_word: self.chunks_per_word,
            chunks: 0,
            index: sessions.len() - 1,
            sessions: self.sessions.clone(),
        }))
    }
}

struct ScriptedStream {
    words: Vec<String>,
    chunks_per_word: usize,
    chunks: usize,
    index: usize,
    sessions: Arc<Mutex<Vec<usize>>>,
}

impl TranscriptStream for ScriptedStream {
    fn accept_audio_chunk(&mut self, pcm: &[u8]) -> Result<(), PerceptionError> {
        if pcm.len() % 2 != 0 {
            return Err(PerceptionError::InvalidInput(
                "odd-length PCM16 chunk".into(),
            ));
        }
        self.chunks += 1;
        if let Some(n) = self.sessions.lock().get_mut(self.index) {
            *n = self.chunks;
        }
        Ok(())
    }

    fn partial_text(&self) -> String {
        let n = (self.chunks / self.chunks_per_word).min(self.words.len());
        self.words[..n].join(" ")
    }

    fn final_text(&mut self) -> Result<String, PerceptionError> {
        Ok(self.partial_text())
    }
}
