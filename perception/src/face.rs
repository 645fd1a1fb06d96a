use facelive_capture::Frame;

use crate::{BoundingBox, PerceptionError};

/// A detected face with its identity embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceDetection {
    pub bbox: BoundingBox,
    /// Raw, not necessarily normalized, identity embedding.
    pub embedding: Vec<f32>,
}

/// Detects faces and extracts identity embeddings.
///
/// Embeddings returned by [`detect`](FaceMatcher::detect) all have
/// [`dimension`](FaceMatcher::dimension) components. Callers normalize
/// before comparing.
///
/// Implementations must be safe for concurrent use.
pub trait FaceMatcher: Send + Sync {
    /// Reports whether the underlying model is loaded.
    fn readiness(&self) -> Result<(), PerceptionError> {
        Ok(())
    }

    /// Decodes an encoded still image (JPEG, PNG, ...) into a frame.
    fn decode_image(&self, encoded: &[u8]) -> Result<Frame, PerceptionError>;

    /// Detects every face in `frame`.
    fn detect(&self, frame: &Frame) -> Result<Vec<FaceDetection>, PerceptionError>;

    /// Embedding dimensionality.
    fn dimension(&self) -> usize;
}
