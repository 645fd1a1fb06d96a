use std::fmt;

use serde::Serialize;
use tracing::info;

use crate::{LivenessError, StepName};

/// Orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Init,
    PersonVerification,
    DepthPoseLiveness,
    BlinkGaze,
    VoiceCaptcha,
    Done,
    Failed,
}

impl PipelineStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    fn can_advance_to(self, next: PipelineStage) -> bool {
        use PipelineStage::*;
        match (self, next) {
            (Done | Failed, _) => false,
            (_, Failed) => true,
            (Init, PersonVerification)
            | (PersonVerification, DepthPoseLiveness)
            | (DepthPoseLiveness, BlinkGaze)
            | (BlinkGaze, VoiceCaptcha)
            | (VoiceCaptcha, Done) => true,
            _ => false,
        }
    }
}

impl From<StepName> for PipelineStage {
    fn from(step: StepName) -> Self {
        match step {
            StepName::PersonVerification => Self::PersonVerification,
            StepName::DepthPoseLiveness => Self::DepthPoseLiveness,
            StepName::BlinkGaze => Self::BlinkGaze,
            StepName::VoiceCaptcha => Self::VoiceCaptcha,
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Init => "init",
            Self::PersonVerification => "person_verification",
            Self::DepthPoseLiveness => "depth_pose_liveness",
            Self::BlinkGaze => "blink_gaze",
            Self::VoiceCaptcha => "voice_captcha",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Tracks the current stage and rejects out-of-order transitions.
#[derive(Debug)]
pub struct StageTracker {
    stage: PipelineStage,
    history: Vec<PipelineStage>,
}

impl Default for StageTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StageTracker {
    pub fn new() -> Self {
        Self {
            stage: PipelineStage::Init,
            history: vec![PipelineStage::Init],
        }
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// Every stage visited, starting with `Init`.
    pub fn history(&self) -> &[PipelineStage] {
        &self.history
    }

    pub fn advance(&mut self, next: PipelineStage) -> Result<(), LivenessError> {
        if !self.stage.can_advance_to(next) {
            return Err(LivenessError::Internal(format!(
                "illegal stage transition {} -> {next}",
                self.stage
            )));
        }
        info!(from = %self.stage, to = %next, "liveness: stage");
        self.stage = next;
        self.history.push(next);
        Ok(())
    }

    /// Moves to `Failed` unless the run already ended.
    pub fn fail(&mut self) {
        if !self.stage.is_terminal() {
            info!(from = %self.stage, to = %PipelineStage::Failed, "liveness: stage");
            self.stage = PipelineStage::Failed;
            self.history.push(PipelineStage::Failed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PipelineStage::*;

    #[test]
    fn full_sequence() {
        let mut t = StageTracker::new();
        for s in [PersonVerification, DepthPoseLiveness, BlinkGaze, VoiceCaptcha, Done] {
            t.advance(s).unwrap();
        }
        assert_eq!(t.stage(), Done);
        assert_eq!(t.history().len(), 6);
    }

    #[test]
    fn skipping_a_stage_is_internal_error() {
        let mut t = StageTracker::new();
        t.advance(PersonVerification).unwrap();
        let err = t.advance(BlinkGaze).unwrap_err();
        assert!(matches!(err, LivenessError::Internal(_)));
        assert_eq!(t.stage(), PersonVerification);
    }

    #[test]
    fn terminal_stages_are_final() {
        let mut t = StageTracker::new();
        t.advance(Failed).unwrap();
        assert!(t.advance(PersonVerification).is_err());
        t.fail();
        assert_eq!(t.history(), &[Init, Failed]);
    }

    #[test]
    fn step_maps_to_stage() {
        assert_eq!(PipelineStage::from(StepName::BlinkGaze), BlinkGaze);
    }
}
