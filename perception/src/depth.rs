use facelive_capture::Frame;
use serde::Serialize;

use crate::{PerceptionError, Point2, Point3};

/// Generic 3D head model for pose solving, in millimetres.
///
/// Order: nose tip, chin, left eye outer corner, right eye outer corner,
/// left mouth corner, right mouth corner.
pub const MODEL_POINTS: [Point3; 6] = [
    Point3::new(0.0, 0.0, 0.0),
    Point3::new(0.0, -63.6, -12.5),
    Point3::new(-43.3, 32.7, -26.0),
    Point3::new(43.3, 32.7, -26.0),
    Point3::new(-28.9, -28.9, -24.1),
    Point3::new(28.9, -28.9, -24.1),
];

/// Relative monocular depth, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthMap {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl DepthMap {
    pub fn new(width: u32, height: u32, data: Vec<f32>) -> Result<Self, PerceptionError> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(PerceptionError::DimensionMismatch {
                expected,
                got: data.len(),
            });
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

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Population standard deviation over the half-open rectangle
    /// `[x0, x1) x [y0, y1)`, clipped to the map. `None` when the clipped
    /// region is empty.
    pub fn region_std(&self, x0: u32, y0: u32, x1: u32, y1: u32) -> Option<f64> {
        let (x1, y1) = (x1.min(self.width), y1.min(self.height));
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        let n = ((x1 - x0) as usize * (y1 - y0) as usize) as f64;
        let (mut sum, mut sq) = (0.0f64, 0.0f64);
        for y in y0..y1 {
            let row = y as usize * self.width as usize;
            for &v in &self.data[row + x0 as usize..row + x1 as usize] {
                let v = v as f64;
                sum += v;
                sq += v * v;
            }
        }
        let mean = sum / n;
        Some((sq / n - mean * mean).max(0.0).sqrt())
    }
}

/// Head pose recovered from six image points.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PoseEstimate {
    /// Degrees.
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
    /// Mean distance between projected model points and the image points,
    /// in pixels.
    pub reprojection_error: f64,
}

/// Monocular depth estimation and perspective-n-point pose solving.
///
/// Implementations must be safe for concurrent use.
pub trait DepthPoseEstimator: Send + Sync {
    fn readiness(&self) -> Result<(), PerceptionError> {
        Ok(())
    }

    /// Estimates relative depth for `frame`. The map may have a different
    /// resolution from the frame.
    fn estimate_depth(&self, frame: &Frame) -> Result<DepthMap, PerceptionError>;

    /// Solves head pose from six image points matched to `model_points`.
    ///
    /// The camera is assumed pinhole with focal length equal to the frame
    /// width, principal point at the frame centre and no distortion.
    /// Returns `Ok(None)` when the solver does not converge.
    fn solve_pose(
        &self,
        image_points: &[Point2; 6],
        model_points: &[Point3; 6],
        frame_size: (u32, u32),
    ) -> Result<Option<PoseEstimate>, PerceptionError>;
}

/// Converts a rotation matrix to `(yaw, pitch, roll)` in degrees.
///
/// Backends that solve pose as a rotation matrix use this to report angles
/// in the convention the liveness checks expect.
pub fn euler_from_rotation(r: &[[f64; 3]; 3]) -> (f64, f64, f64) {
    let sy = (r[0][0] * r[0][0] + r[1][0] * r[1][0]).sqrt();
    let (roll, pitch, yaw) = if sy >= 1e-6 {
        (
            r[2][1].atan2(r[2][2]),
            (-r[2][0]).atan2(sy),
            r[1][0].atan2(r[0][0]),
        )
    } else {
        ((-r[1][2]).atan2(r[1][1]), (-r[2][0]).atan2(sy), 0.0)
    };
    (yaw.to_degrees(), pitch.to_degrees(), roll.to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_map_rejects_bad_length() {
        assert!(DepthMap::new(4, 4, vec![0.0; 15]).is_err());
    }

    #[test]
    fn region_std_alternating() {
        let data = (0..16)
            .map(|i| if (i % 4 + i / 4) % 2 == 0 { 12.0 } else { 8.0 })
            .collect();
        let map = DepthMap::new(4, 4, data).unwrap();
        let std = map.region_std(0, 0, 4, 4).unwrap();
        assert!((std - 2.0).abs() < 1e-9);
    }

    #[test]
    fn region_std_flat_and_empty() {
        let map = DepthMap::new(4, 4, vec![3.0; 16]).unwrap();
        assert_eq!(map.region_std(1, 1, 3, 3), Some(0.0));
        assert_eq!(map.region_std(2, 2, 2, 4), None);
        assert_eq!(map.region_std(5, 0, 9, 4), None);
    }

    #[test]
    fn region_std_clips_to_map() {
        let map = DepthMap::new(2, 2, vec![1.0, 1.0, 1.0, 1.0]).unwrap();
        assert_eq!(map.region_std(0, 0, 100, 100), Some(0.0));
    }

    #[test]
    fn euler_identity_is_zero() {
        let id = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        let (yaw, pitch, roll) = euler_from_rotation(&id);
        assert!(yaw.abs() < 1e-9 && pitch.abs() < 1e-9 && roll.abs() < 1e-9);
    }

    #[test]
    fn euler_pure_z_rotation_is_yaw() {
        let a = 30f64.to_radians();
        let r = [
            [a.cos(), -a.sin(), 0.0],
            [a.sin(), a.cos(), 0.0],
            [0.0, 0.0, 1.0],
        ];
        let (yaw, pitch, roll) = euler_from_rotation(&r);
        assert!((yaw - 30.0).abs() < 1e-9);
        assert!(pitch.abs() < 1e-9 && roll.abs() < 1e-9);
    }
}
