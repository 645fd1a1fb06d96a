use facelive_capture::CaptureError;
use facelive_perception::PerceptionError;
use thiserror::Error;

/// Faults that unwind a step to the orchestrator.
///
/// Validation problems and unmet pass criteria are not errors; they come
/// back as a failed [`crate::StepResult`].
#[derive(Debug, Error)]
pub enum LivenessError {
    /// The capture device is unavailable, busy or stalled.
    #[error("liveness: resource error: {0}")]
    Resource(String),

    /// A capability provider reported it is not ready.
    #[error("liveness: model unavailable: {0}")]
    ModelUnavailable(String),

    /// Anything unexpected. The detail is logged but never returned to
    /// callers.
    #[error("liveness: internal error: {0}")]
    Internal(String),
}

impl LivenessError {
    /// Short category name for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Resource(_) => "resource",
            Self::ModelUnavailable(_) => "model_unavailable",
            Self::Internal(_) => "internal",
        }
    }

    /// Message safe to hand to the caller.
    pub fn public_message(&self) -> String {
        match self {
            Self::Resource(msg) => format!("capture resource error: {msg}"),
            Self::ModelUnavailable(msg) => format!("model unavailable: {msg}"),
            Self::Internal(_) => "internal error during liveness check".to_string(),
        }
    }
}

impl From<CaptureError> for LivenessError {
    fn from(err: CaptureError) -> Self {
        match err {
            CaptureError::Unavailable(_)
            | CaptureError::Busy(_)
            | CaptureError::Released
            | CaptureError::Read(_) => Self::Resource(err.to_string()),
            CaptureError::InvalidFrame(_) | CaptureError::InvalidAudio(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<PerceptionError> for LivenessError {
    fn from(err: PerceptionError) -> Self {
        match err {
            PerceptionError::NotReady { .. } => Self::ModelUnavailable(err.to_string()),
            _ => Self::Internal(err.to_string()),
        }
    }
}
