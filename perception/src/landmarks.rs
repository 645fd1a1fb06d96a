use std::ops::Range;

use facelive_capture::Frame;

use crate::{PerceptionError, Point2};

/// Number of points in the dlib-style facial landmark layout.
pub const LANDMARK_COUNT: usize = 68;

const LEFT_EYE: Range<usize> = 36..42;
const RIGHT_EYE: Range<usize> = 42..48;
const MOUTH: Range<usize> = 48..68;
/// Nose tip, chin, left eye corner, right eye corner, left mouth corner,
/// right mouth corner. Matches [`crate::MODEL_POINTS`].
const POSE_INDICES: [usize; 6] = [30, 8, 36, 45, 48, 54];

/// 68 facial landmarks of one face.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceLandmarks {
    pub(crate) points: Vec<Point2>,
}

impl FaceLandmarks {
    pub fn new(points: Vec<Point2>) -> Result<Self, PerceptionError> {
        if points.len() != LANDMARK_COUNT {
            return Err(PerceptionError::DimensionMismatch {
                expected: LANDMARK_COUNT,
                got: points.len(),
            });
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Point2] {
        &self.points
    }

    pub fn left_eye(&self) -> &[Point2] {
        &self.points[LEFT_EYE]
    }

    pub fn right_eye(&self) -> &[Point2] {
        &self.points[RIGHT_EYE]
    }

    /// Outer lip (12 points) followed by inner lip (8 points).
    pub fn mouth(&self) -> &[Point2] {
        &self.points[MOUTH]
    }

    /// Image points for pose solving, in [`crate::MODEL_POINTS`] order.
    pub fn pose_points(&self) -> [Point2; 6] {
        POSE_INDICES.map(|i| self.points[i])
    }

    /// `(min_x, min_y, max_x, max_y)` over all points.
    pub fn bounds(&self) -> (f32, f32, f32, f32) {
        self.points.iter().fold(
            (f32::MAX, f32::MAX, f32::MIN, f32::MIN),
            |(x0, y0, x1, y1), p| (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y)),
        )
    }
}

/// Facial landmark detection for blink and gaze analysis.
///
/// Implementations must be safe for concurrent use.
pub trait BlinkGazeAnalyzer: Send + Sync {
    fn readiness(&self) -> Result<(), PerceptionError> {
        Ok(())
    }

    /// Landmarks for every face found in `frame`.
    fn landmarks(&self, frame: &Frame) -> Result<Vec<FaceLandmarks>, PerceptionError>;
}

/// Eye aspect ratio over the six points of one eye:
/// `(|p1-p5| + |p2-p4|) / (2 |p0-p3|)`.
///
/// Returns 0 when fewer than six points are given or the eye has zero
/// width.
pub fn eye_aspect_ratio(eye: &[Point2]) -> f64 {
    if eye.len() < 6 {
        return 0.0;
    }
    let a = eye[1].distance(eye[5]);
    let b = eye[2].distance(eye[4]);
    let c = eye[0].distance(eye[3]);
    if c == 0.0 {
        return 0.0;
    }
    (a + b) / (2.0 * c)
}

/// Mouth aspect ratio over the twenty mouth points:
/// `(|m2-m10| + |m4-m8|) / (2 |m0-m6|)`.
pub fn mouth_aspect_ratio(mouth: &[Point2]) -> f64 {
    if mouth.len() < 11 {
        return 0.0;
    }
    let a = mouth[2].distance(mouth[10]);
    let b = mouth[4].distance(mouth[8]);
    let c = mouth[0].distance(mouth[6]);
    if c == 0.0 {
        return 0.0;
    }
    (a + b) / (2.0 * c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::synthetic_face;

    #[test]
    fn rejects_wrong_point_count() {
        assert!(FaceLandmarks::new(vec![Point2::default(); 67]).is_err());
    }

    #[test]
    fn ear_of_synthetic_eyes() {
        let face = synthetic_face(0.3, 0.1);
        assert!((eye_aspect_ratio(face.left_eye()) - 0.3).abs() < 1e-5);
        assert!((eye_aspect_ratio(face.right_eye()) - 0.3).abs() < 1e-5);
    }

    #[test]
    fn mar_of_synthetic_mouth() {
        let face = synthetic_face(0.3, 0.55);
        assert!((mouth_aspect_ratio(face.mouth()) - 0.55).abs() < 1e-5);
    }

    #[test]
    fn degenerate_eye_is_zero() {
        let eye = [Point2::new(1.0, 1.0); 6];
        assert_eq!(eye_aspect_ratio(&eye), 0.0);
        assert_eq!(eye_aspect_ratio(&eye[..3]), 0.0);
    }

    #[test]
    fn pose_points_follow_model_order() {
        let face = synthetic_face(0.3, 0.1);
        let pts = face.pose_points();
        assert_eq!(pts[0], face.points()[30]);
        assert_eq!(pts[1], face.points()[8]);
        assert_eq!(pts[5], face.points()[54]);
    }

    #[test]
    fn bounds_cover_all_points() {
        let (x0, y0, x1, y1) = synthetic_face(0.3, 0.1).bounds();
        assert_eq!((x0, x1), (80.0, 240.0));
        assert_eq!((y0, y1), (80.0, 200.0));
    }
}
