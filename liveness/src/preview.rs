use facelive_capture::Frame;
use tracing::debug;

use crate::StepName;

/// Receives per-frame overlays while a step runs with display enabled.
///
/// Called from the step loop, so implementations should return quickly.
pub trait PreviewSink: Send + Sync {
    fn show(&self, step: StepName, frame: &Frame, overlay: &[String]);

    /// The step finished; close any window it opened.
    fn close(&self, _step: StepName) {}
}

/// Writes overlays to the `tracing` debug log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPreview;

impl PreviewSink for TracingPreview {
    fn show(&self, step: StepName, frame: &Frame, overlay: &[String]) {
        debug!(step = %step, seq = frame.seq, overlay = %overlay.join(" | "), "preview");
    }
}
