use thiserror::Error;

/// Errors returned by capability providers.
#[derive(Debug, Error)]
pub enum PerceptionError {
    #[error("perception: model {model} not ready: {reason}")]
    NotReady { model: String, reason: String },

    #[error("perception: decode failed: {0}")]
    Decode(String),

    #[error("perception: invalid input: {0}")]
    InvalidInput(String),

    #[error("perception: dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("perception: backend error: {0}")]
    Backend(String),
}

impl PerceptionError {
    /// Shorthand for [`PerceptionError::NotReady`].
    pub fn not_ready(model: &str, reason: impl Into<String>) -> Self {
        Self::NotReady {
            model: model.to_string(),
            reason: reason.into(),
        }
    }
}
