//! Capability-provider interfaces consumed by the liveness engine.
//!
//! Each model family sits behind its own trait so production backends and
//! test doubles are interchangeable:
//!
//! | Trait | Capability |
//! |---|---|
//! | [`FaceMatcher`] | face detection + identity embedding |
//! | [`DepthPoseEstimator`] | dense depth map + 6-point head pose |
//! | [`BlinkGazeAnalyzer`] | 68-point facial landmarks |
//! | [`SpeechTranscriber`] | streaming speech recognition |
//!
//! Every provider reports [`readiness`](FaceMatcher::readiness) so a model
//! that failed to load surfaces as [`PerceptionError::NotReady`] instead of
//! a silent flag.
//!
//! The geometric helpers ([`eye_aspect_ratio`], [`mouth_aspect_ratio`],
//! [`l2_normalize`], [`cosine_similarity`]) operate on provider output and
//! carry no model state.

mod depth;
mod embedding;
mod error;
mod face;
mod geometry;
mod landmarks;
pub mod mock;
mod speech;

pub use depth::{euler_from_rotation, DepthMap, DepthPoseEstimator, PoseEstimate, MODEL_POINTS};
pub use embedding::{cosine_similarity, l2_normalize};
pub use error::PerceptionError;
pub use face::{FaceDetection, FaceMatcher};
pub use geometry::{BoundingBox, Point2, Point3};
pub use landmarks::{
    eye_aspect_ratio, mouth_aspect_ratio, BlinkGazeAnalyzer, FaceLandmarks, LANDMARK_COUNT,
};
pub use speech::{SpeechTranscriber, TranscriptStream};
