use chrono::Utc;

use crate::config::FusionConfig;
use crate::{LivenessError, PipelineResult, PipelineStage, StepName, StepResult};

/// Folds step results into a pipeline verdict.
///
/// Confidence is the mean over passed steps only. A run is live when no
/// step failed, at least `min_passed_steps` passed and the confidence
/// reaches `confidence_threshold`.
#[derive(Debug, Clone)]
pub struct FusionPolicy {
    min_passed_steps: usize,
    confidence_threshold: f64,
}

impl Default for FusionPolicy {
    fn default() -> Self {
        Self::new(&FusionConfig::default())
    }
}

impl FusionPolicy {
    pub fn new(cfg: &FusionConfig) -> Self {
        Self {
            min_passed_steps: cfg.min_passed_steps,
            confidence_threshold: cfg.confidence_threshold,
        }
    }

    /// Mean confidence of the passed steps, 0 when none passed.
    pub fn confidence(steps: &[StepResult]) -> f64 {
        let passed: Vec<f64> = steps
            .iter()
            .filter(|s| s.passed())
            .map(|s| s.confidence())
            .collect();
        if passed.is_empty() {
            return 0.0;
        }
        (passed.iter().sum::<f64>() / passed.len() as f64).clamp(0.0, 1.0)
    }

    pub fn is_live(&self, steps: &[StepResult]) -> bool {
        let passed = steps.iter().filter(|s| s.passed()).count();
        passed == steps.len()
            && passed >= self.min_passed_steps
            && Self::confidence(steps) >= self.confidence_threshold
    }

    /// Every step ran and passed its own criteria.
    pub fn completed(&self, steps: Vec<StepResult>) -> PipelineResult {
        let confidence = Self::confidence(&steps);
        let is_live = self.is_live(&steps);
        let message = if is_live {
            "liveness verified".to_string()
        } else {
            format!(
                "liveness not confirmed: confidence {confidence:.2} with {} passed steps",
                steps.iter().filter(|s| s.passed()).count()
            )
        };
        self.build(steps, true, is_live, message, None, PipelineStage::Done)
    }

    /// A step ran and did not meet its criteria; later steps were skipped.
    ///
    /// A person mismatch means the detection itself failed, so `success`
    /// is false for that step only.
    pub fn rejected(&self, steps: Vec<StepResult>) -> PipelineResult {
        let Some(failed) = steps.iter().find(|s| !s.passed()) else {
            return self.completed(steps);
        };
        let step = failed.step();
        let reason = failed.error().unwrap_or(failed.message()).to_string();
        let (success, message, error) = if step == StepName::PersonVerification {
            (false, "person verification failed".to_string(), reason)
        } else {
            (
                true,
                format!("liveness check failed at {step}"),
                format!("{step} failed: {reason}"),
            )
        };
        self.build(steps, success, false, message, Some(error), PipelineStage::Failed)
    }

    /// The run was cut short by a resource, model or internal fault.
    pub fn aborted(&self, steps: Vec<StepResult>, err: &LivenessError) -> PipelineResult {
        let error = err.public_message();
        self.build(
            steps,
            false,
            false,
            format!("liveness check aborted: {error}"),
            Some(error),
            PipelineStage::Failed,
        )
    }

    fn build(
        &self,
        steps: Vec<StepResult>,
        success: bool,
        is_live: bool,
        message: String,
        error: Option<String>,
        stage: PipelineStage,
    ) -> PipelineResult {
        PipelineResult {
            success,
            is_live,
            confidence: Self::confidence(&steps),
            passed_steps: steps.iter().filter(|s| s.passed()).count(),
            total_steps: steps.len(),
            steps,
            message,
            error,
            stage,
            timestamp: Utc::now(),
        }
    }
}
