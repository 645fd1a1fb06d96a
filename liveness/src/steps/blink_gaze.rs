use facelive_capture::{GrayImage, VideoSource};
use facelive_perception::{eye_aspect_ratio, BlinkGazeAnalyzer, Point2};
use tracing::{debug, info};

use super::{mean, Pacer};
use crate::config::BlinkGazeConfig;
use crate::preview::PreviewSink;
use crate::{LivenessError, StepName, StepResult};

const STEP: StepName = StepName::BlinkGaze;

/// Debounced blink counter.
///
/// A blink registers when the eye reopens after at least `consec_frames`
/// consecutive frames with EAR below the threshold.
#[derive(Debug, Clone)]
pub struct BlinkCounter {
    threshold: f64,
    consec_frames: usize,
    closed_run: usize,
    total: usize,
}

impl BlinkCounter {
    pub fn new(threshold: f64, consec_frames: usize) -> Self {
        Self {
            threshold,
            consec_frames: consec_frames.max(1),
            closed_run: 0,
            total: 0,
        }
    }

    /// Feeds one EAR sample. Returns true when it completes a blink.
    pub fn update(&mut self, ear: f64) -> bool {
        if ear < self.threshold {
            self.closed_run += 1;
            return false;
        }
        let blinked = self.closed_run >= self.consec_frames;
        if blinked {
            self.total += 1;
        }
        self.closed_run = 0;
        blinked
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

/// Left/right sclera balance of one eye.
///
/// The eye crop spans the landmark extents; pixels brighter than
/// `white_threshold` count as white. Returns 1 when the right half has no
/// white, 5 when only the left half has none, else `left / right`.
pub fn gaze_ratio(gray: &GrayImage, eye: &[Point2], white_threshold: u8) -> f64 {
    if eye.is_empty() {
        return 1.0;
    }
    let (mut x0, mut y0, mut x1, mut y1) = (f32::MAX, f32::MAX, f32::MIN, f32::MIN);
    for p in eye {
        x0 = x0.min(p.x);
        y0 = y0.min(p.y);
        x1 = x1.max(p.x);
        y1 = y1.max(p.y);
    }
    let clamp = |v: f32| v.max(0.0).floor() as u32;
    let (x0, y0, x1, y1) = (clamp(x0), clamp(y0), clamp(x1), clamp(y1));
    let mid = x0 + x1.saturating_sub(x0) / 2;

    let left = gray.count_above(x0, y0, mid, y1, white_threshold);
    let right = gray.count_above(mid, y0, x1, y1, white_threshold);
    if right == 0 {
        1.0
    } else if left == 0 {
        5.0
    } else {
        left as f64 / right as f64
    }
}

/// Natural blinking and eye movement over a fixed window.
pub(crate) struct BlinkGazeStep<'a> {
    analyzer: &'a dyn BlinkGazeAnalyzer,
    config: &'a BlinkGazeConfig,
}

impl<'a> BlinkGazeStep<'a> {
    pub(crate) fn new(analyzer: &'a dyn BlinkGazeAnalyzer, config: &'a BlinkGazeConfig) -> Self {
        Self { analyzer, config }
    }

    pub(crate) async fn run(
        &self,
        video: &mut dyn VideoSource,
        mut pacer: Pacer,
        preview: Option<&dyn PreviewSink>,
    ) -> Result<StepResult, LivenessError> {
        let cfg = self.config;
        let mut blinks = BlinkCounter::new(cfg.ear_threshold, cfg.consec_frames);
        let mut gaze_movements = 0usize;
        let mut frames = 0usize;
        let mut ears = Vec::new();
        let mut gazes = Vec::new();

        while let Some(frame) = pacer.next_frame(video).await? {
            frames += 1;
            let faces = self.analyzer.landmarks(&frame)?;
            let Some(face) = faces.first() else {
                continue;
            };

            let ear = (eye_aspect_ratio(face.left_eye()) + eye_aspect_ratio(face.right_eye())) / 2.0;
            ears.push(ear);
            let blinked = blinks.update(ear);

            let gray = frame.gray();
            let gaze = (gaze_ratio(&gray, face.left_eye(), cfg.eye_white_threshold)
                + gaze_ratio(&gray, face.right_eye(), cfg.eye_white_threshold))
                / 2.0;
            gazes.push(gaze);
            if gaze <= cfg.gaze_low || gaze >= cfg.gaze_high {
                gaze_movements += 1;
            }

            debug!(step = %STEP, seq = frame.seq, ear, gaze, blinked, "liveness: frame");
            if let Some(p) = preview {
                p.show(
                    STEP,
                    &frame,
                    &[
                        format!("blinks {}", blinks.total()),
                        format!("gaze movements {gaze_movements}"),
                    ],
                );
            }
        }

        let total_blinks = blinks.total();
        let passed = total_blinks >= cfg.min_blinks && gaze_movements >= cfg.min_gaze_movements;
        let confidence = (f64::min(1.0, total_blinks as f64 / 2.0)
            + f64::min(1.0, gaze_movements as f64 / 3.0))
            / 2.0;
        info!(step = %STEP, passed, blinks = total_blinks, gaze_movements, frames, "liveness: step finished");

        let message = if passed {
            "natural blinking and eye movement detected"
        } else {
            "insufficient blink or gaze activity"
        };
        Ok(StepResult::new(STEP, passed, confidence, message)
            .with_metric("blinks_detected", total_blinks as f64)
            .with_metric("gaze_movements", gaze_movements as f64)
            .with_metric("frames_processed", frames as f64)
            .with_metric("face_frames", ears.len() as f64)
            .with_metric("avg_ear", mean(&ears))
            .with_metric("avg_gaze", mean(&gazes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facelive_capture::mock::uniform_frame;
    use facelive_perception::mock::{gaze_shift_frame, synthetic_face};

    #[test]
    fn one_blink_from_two_closed_frames() {
        let mut c = BlinkCounter::new(0.22, 2);
        let blinks: Vec<bool> = [0.30, 0.18, 0.18, 0.30].iter().map(|&e| c.update(e)).collect();
        assert_eq!(blinks, [false, false, false, true]);
        assert_eq!(c.total(), 1);
    }

    #[test]
    fn single_closed_frame_is_not_a_blink() {
        let mut c = BlinkCounter::new(0.22, 2);
        for e in [0.30, 0.18, 0.30, 0.18, 0.30] {
            c.update(e);
        }
        assert_eq!(c.total(), 0);
    }

    #[test]
    fn eyes_still_closed_at_end_do_not_count() {
        let mut c = BlinkCounter::new(0.22, 2);
        for e in [0.30, 0.18, 0.18, 0.18] {
            c.update(e);
        }
        assert_eq!(c.total(), 0);
    }

    #[test]
    fn centred_gaze_is_one() {
        let face = synthetic_face(0.3, 0.1);
        let gray = uniform_frame(320, 240, 128).gray();
        assert_eq!(gaze_ratio(&gray, face.left_eye(), 70), 1.0);
    }

    #[test]
    fn shifted_gaze_ratio() {
        let face = synthetic_face(0.3, 0.1);
        let gray = gaze_shift_frame(320, 240).gray();
        assert_eq!(gaze_ratio(&gray, face.left_eye(), 70), 4.0);
        assert_eq!(gaze_ratio(&gray, face.right_eye(), 70), 4.0);
    }

    #[test]
    fn dark_eye_counts_as_centred() {
        let face = synthetic_face(0.3, 0.1);
        let gray = uniform_frame(320, 240, 10).gray();
        assert_eq!(gaze_ratio(&gray, face.left_eye(), 70), 1.0);
    }
}
