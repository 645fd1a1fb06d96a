use thiserror::Error;

/// Errors returned by capture operations.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture: device {0:?} unavailable")]
    Unavailable(String),

    #[error("capture: device {0:?} is already held")]
    Busy(String),

    #[error("capture: resource already released")]
    Released,

    #[error("capture: read failed: {0}")]
    Read(String),

    #[error("capture: invalid frame: {0}")]
    InvalidFrame(String),

    #[error("capture: invalid audio: {0}")]
    InvalidAudio(String),
}
