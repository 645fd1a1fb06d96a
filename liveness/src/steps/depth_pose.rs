use facelive_capture::{Frame, VideoSource};
use facelive_perception::{BlinkGazeAnalyzer, DepthMap, DepthPoseEstimator, FaceLandmarks, MODEL_POINTS};
use tracing::{debug, info};

use super::{mean, Pacer};
use crate::config::DepthPoseConfig;
use crate::preview::PreviewSink;
use crate::window::RingBuffer;
use crate::{LivenessError, StepName, StepResult};

const STEP: StepName = StepName::DepthPoseLiveness;

/// Padding added around the landmark extents to form the face box.
const FACE_PADDING: i64 = 20;
/// Reference face size that depth spread is normalized to.
const REFERENCE_FACE_SIZE: f64 = 200.0;
/// Samples needed before a window's statistics are used.
const MIN_WINDOW_SAMPLES: usize = 3;

/// The step passes when the live share of votes is strictly above `ratio`.
pub fn vote_passes(live_votes: usize, total_votes: usize, ratio: f64) -> bool {
    total_votes > 0 && live_votes as f64 / total_votes as f64 > ratio
}

/// Weighted per-frame confidence: 0.4 depth, 0.3 pose fit, 0.3 motion.
pub fn frame_confidence(
    depth_std: f64,
    depth_threshold: f64,
    reprojection_error: f64,
    max_reprojection_error: f64,
    motion_variance: f64,
    motion_threshold: f64,
) -> f64 {
    let depth_score = (depth_std / (2.0 * depth_threshold)).min(1.0);
    let pose_score = (1.0 - reprojection_error / max_reprojection_error).max(0.0);
    let motion_score = (motion_variance / (2.0 * motion_threshold)).min(1.0);
    (0.4 * depth_score + 0.3 * pose_score + 0.3 * motion_score).clamp(0.0, 1.0)
}

/// Analysis of one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameVote {
    pub live: bool,
    pub confidence: f64,
    pub face_found: bool,
    pub brightness: f64,
    pub depth_std: f64,
    pub depth_threshold: f64,
    /// `None` when the pose solver did not converge.
    pub reprojection_error: Option<f64>,
    pub motion_variance: f64,
    pub motion_threshold: f64,
}

impl FrameVote {
    fn overlay(&self, votes: usize) -> Vec<String> {
        let status = if votes < 30 {
            "CHECKING"
        } else if self.live {
            "LIVE"
        } else {
            "SPOOF"
        };
        vec![
            status.to_string(),
            format!("depth std {:.2}", self.depth_std),
            match self.reprojection_error {
                Some(e) => format!("reproj err {e:.2}px"),
                None => "reproj err n/a".to_string(),
            },
            format!("confidence {:.2}", self.confidence),
        ]
    }
}

/// Face box and depth region of interest in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
struct FaceRegion {
    face_size: f64,
    roi: (u32, u32, u32, u32),
}

fn face_region(face: &FaceLandmarks, width: u32, height: u32) -> FaceRegion {
    let (min_x, min_y, max_x, max_y) = face.bounds();
    let (w, h) = (width as i64, height as i64);
    let x1 = (min_x.floor() as i64 - FACE_PADDING).max(0);
    let y1 = (min_y.floor() as i64 - FACE_PADDING).max(0);
    let x2 = (max_x.floor() as i64 + FACE_PADDING).min(w - 1);
    let y2 = (max_y.floor() as i64 + FACE_PADDING).min(h - 1);
    let face_size = (x2 - x1).max(y2 - y1).max(0);

    let (cx, cy) = ((x1 + x2) / 2, (y1 + y2) / 2);
    let side = (face_size / 2).min(w.min(h) / 4);
    let rx1 = (cx - side / 2).max(0);
    let ry1 = (cy - side / 2).max(0);
    let rx2 = (cx + side / 2).min(w - 1).max(rx1);
    let ry2 = (cy + side / 2).min(h - 1).max(ry1);
    FaceRegion {
        face_size: face_size as f64,
        roi: (rx1 as u32, ry1 as u32, rx2 as u32, ry2 as u32),
    }
}

/// Standard deviation of the ROI after mapping it into the depth map's
/// resolution.
fn roi_depth_std(depth: &DepthMap, roi: (u32, u32, u32, u32), width: u32, height: u32) -> f64 {
    let sx = |x: u32| (x as u64 * depth.width() as u64 / width.max(1) as u64) as u32;
    let sy = |y: u32| (y as u64 * depth.height() as u64 / height.max(1) as u64) as u32;
    let (x0, y0, x1, y1) = roi;
    depth
        .region_std(sx(x0), sy(y0), sx(x1), sy(y1))
        .unwrap_or(0.0)
}

/// Per-frame depth/pose analysis with the sliding windows of one run.
pub struct DepthPoseAnalyzer<'a> {
    estimator: &'a dyn DepthPoseEstimator,
    landmarks: &'a dyn BlinkGazeAnalyzer,
    config: &'a DepthPoseConfig,
    yaw: RingBuffer,
    pitch: RingBuffer,
    roll: RingBuffer,
    depth: RingBuffer,
}

impl<'a> DepthPoseAnalyzer<'a> {
    pub fn new(
        estimator: &'a dyn DepthPoseEstimator,
        landmarks: &'a dyn BlinkGazeAnalyzer,
        config: &'a DepthPoseConfig,
    ) -> Self {
        let window = config.motion_window;
        Self {
            estimator,
            landmarks,
            config,
            yaw: RingBuffer::new(window),
            pitch: RingBuffer::new(window),
            roll: RingBuffer::new(window),
            depth: RingBuffer::new(config.depth_smoothing),
        }
    }

    pub fn analyze(&mut self, frame: &Frame) -> Result<FrameVote, LivenessError> {
        let cfg = self.config;
        let (brightness, contrast) = frame.gray().mean_std();
        let depth_threshold = cfg.depth_threshold_base * (0.8 + 0.4 * brightness / 128.0);
        let motion_threshold = cfg.motion_threshold_base * (0.7 + 0.6 * contrast / 64.0);

        let faces = self.landmarks.landmarks(frame)?;
        let Some(face) = faces.first() else {
            return Ok(FrameVote {
                live: false,
                confidence: 0.0,
                face_found: false,
                brightness,
                depth_std: 0.0,
                depth_threshold,
                reprojection_error: None,
                motion_variance: 0.0,
                motion_threshold,
            });
        };

        let depth_map = self.estimator.estimate_depth(frame)?;
        let pose = self
            .estimator
            .solve_pose(&face.pose_points(), &MODEL_POINTS, (frame.width, frame.height))?;

        let region = face_region(face, frame.width, frame.height);
        let raw_depth = if region.face_size < cfg.min_face_size {
            0.0
        } else {
            roi_depth_std(&depth_map, region.roi, frame.width, frame.height) * REFERENCE_FACE_SIZE
                / region.face_size
        };
        self.depth.push(raw_depth);
        let depth_std = if self.depth.len() >= MIN_WINDOW_SAMPLES {
            self.depth.mean()
        } else {
            raw_depth
        };

        if let Some(p) = &pose {
            self.yaw.push(p.yaw);
            self.pitch.push(p.pitch);
            self.roll.push(p.roll);
        }
        let motion_variance = if self.yaw.len() >= MIN_WINDOW_SAMPLES {
            self.yaw.variance() + self.pitch.variance() + self.roll.variance()
        } else {
            0.0
        };

        let reprojection_error = pose.map(|p| p.reprojection_error);
        let reproj = reprojection_error.unwrap_or(f64::INFINITY);
        let confidence = frame_confidence(
            depth_std,
            depth_threshold,
            reproj,
            cfg.max_reprojection_error,
            motion_variance,
            motion_threshold,
        );
        let live = depth_std > depth_threshold
            && reproj < cfg.max_reprojection_error
            && confidence > cfg.frame_confidence
            && (!cfg.require_motion || motion_variance > motion_threshold);

        Ok(FrameVote {
            live,
            confidence,
            face_found: true,
            brightness,
            depth_std,
            depth_threshold,
            reprojection_error,
            motion_variance,
            motion_threshold,
        })
    }
}

/// Depth + head-pose liveness over a fixed window.
pub(crate) struct DepthPoseStep<'a> {
    analyzer: DepthPoseAnalyzer<'a>,
    vote_ratio: f64,
}

impl<'a> DepthPoseStep<'a> {
    pub(crate) fn new(
        estimator: &'a dyn DepthPoseEstimator,
        landmarks: &'a dyn BlinkGazeAnalyzer,
        config: &'a DepthPoseConfig,
    ) -> Self {
        Self {
            analyzer: DepthPoseAnalyzer::new(estimator, landmarks, config),
            vote_ratio: config.vote_ratio,
        }
    }

    pub(crate) async fn run(
        mut self,
        video: &mut dyn VideoSource,
        mut pacer: Pacer,
        preview: Option<&dyn PreviewSink>,
    ) -> Result<StepResult, LivenessError> {
        let mut live_votes = 0usize;
        let mut no_face = 0usize;
        let mut confidences = Vec::new();
        let mut depth_stds = Vec::new();
        let mut reproj_errors = Vec::new();
        let mut motions = Vec::new();
        let mut brightness = Vec::new();

        while let Some(frame) = pacer.next_frame(video).await? {
            let vote = self.analyzer.analyze(&frame)?;
            confidences.push(vote.confidence);
            brightness.push(vote.brightness);
            if vote.live {
                live_votes += 1;
            }
            if vote.face_found {
                depth_stds.push(vote.depth_std);
                motions.push(vote.motion_variance);
                reproj_errors.extend(vote.reprojection_error);
            } else {
                no_face += 1;
            }
            debug!(
                step = %STEP,
                seq = frame.seq,
                live = vote.live,
                confidence = vote.confidence,
                depth_std = vote.depth_std,
                "liveness: frame"
            );
            if let Some(p) = preview {
                p.show(STEP, &frame, &vote.overlay(confidences.len()));
            }
        }

        let total = confidences.len();
        let passed = vote_passes(live_votes, total, self.vote_ratio);
        let ratio = if total == 0 {
            0.0
        } else {
            live_votes as f64 / total as f64
        };
        info!(step = %STEP, passed, live_votes, total, "liveness: step finished");

        let message = if passed {
            "3D liveness confirmed"
        } else if total == 0 {
            "no frames captured"
        } else {
            "insufficient depth or head-pose evidence"
        };
        Ok(StepResult::new(STEP, passed, mean(&confidences), message)
            .with_metric("live_votes", live_votes as f64)
            .with_metric("total_votes", total as f64)
            .with_metric("vote_ratio", ratio)
            .with_metric("frames_processed", total as f64)
            .with_metric("no_face_frames", no_face as f64)
            .with_metric("mean_depth_std", mean(&depth_stds))
            .with_metric("mean_reprojection_error", mean(&reproj_errors))
            .with_metric("mean_motion_variance", mean(&motions))
            .with_metric("mean_brightness", mean(&brightness)))
    }
}
