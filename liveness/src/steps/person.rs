use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use facelive_capture::VideoSource;
use facelive_perception::{cosine_similarity, l2_normalize, FaceMatcher, PerceptionError};
use tracing::{debug, info, warn};

use super::{mean, Pacer};
use crate::config::PersonVerificationConfig;
use crate::preview::PreviewSink;
use crate::{LivenessError, StepName, StepResult};

const STEP: StepName = StepName::PersonVerification;

/// Caller-supplied reference photo.
#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceImage {
    /// Encoded image bytes (JPEG, PNG, ...).
    Encoded(Bytes),
    /// Base64 text, optionally a `data:image/...;base64,` URL.
    Base64(String),
}

impl ReferenceImage {
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self::Encoded(data.into())
    }

    pub fn from_base64(text: impl Into<String>) -> Self {
        Self::Base64(text.into())
    }

    /// Encoded image bytes.
    pub fn decode(&self) -> Result<Bytes, String> {
        match self {
            Self::Encoded(data) if data.is_empty() => Err("reference image is empty".to_string()),
            Self::Encoded(data) => Ok(data.clone()),
            Self::Base64(text) => {
                let payload = match text.split_once(',') {
                    Some((header, payload)) if header.starts_with("data:") => payload,
                    _ => text.as_str(),
                };
                let data = STANDARD
                    .decode(payload.trim())
                    .map_err(|e| format!("reference image is not valid base64: {e}"))?;
                if data.is_empty() {
                    return Err("reference image is empty".to_string());
                }
                Ok(Bytes::from(data))
            }
        }
    }
}

/// Matches the live face against a reference identity.
pub(crate) struct PersonVerificationStep<'a> {
    matcher: &'a dyn FaceMatcher,
    config: &'a PersonVerificationConfig,
}

#[derive(Default)]
struct Tally {
    frames: usize,
    matched: usize,
    mismatched: usize,
    similarities: Vec<f64>,
}

impl Tally {
    fn result(&self, passed: bool, message: impl Into<String>) -> StepResult {
        let max = self.similarities.iter().copied().fold(f64::NAN, f64::max);
        StepResult::new(STEP, passed, mean(&self.similarities), message)
            .with_metric("frames_processed", self.frames as f64)
            .with_metric("matched_frames", self.matched as f64)
            .with_metric("mismatched_frames", self.mismatched as f64)
            .with_metric("mean_similarity", mean(&self.similarities))
            .with_metric("max_similarity", if max.is_nan() { 0.0 } else { max })
    }
}

impl<'a> PersonVerificationStep<'a> {
    pub(crate) fn new(matcher: &'a dyn FaceMatcher, config: &'a PersonVerificationConfig) -> Self {
        Self { matcher, config }
    }

    /// Unit-normalized reference embedding, or a validation message.
    fn reference_embedding(
        &self,
        reference: &ReferenceImage,
    ) -> Result<Result<Vec<f32>, String>, LivenessError> {
        let encoded = match reference.decode() {
            Ok(encoded) => encoded,
            Err(msg) => return Ok(Err(msg)),
        };
        let frame = match self.matcher.decode_image(&encoded) {
            Ok(frame) => frame,
            Err(PerceptionError::Decode(msg) | PerceptionError::InvalidInput(msg)) => {
                return Ok(Err(format!("reference image could not be decoded: {msg}")));
            }
            Err(e) => return Err(e.into()),
        };
        let mut faces = self.matcher.detect(&frame)?;
        if faces.len() != 1 {
            return Ok(Err(format!(
                "reference image must contain exactly one face, found {}",
                faces.len()
            )));
        }
        let mut embedding = faces.swap_remove(0).embedding;
        if embedding.len() != self.matcher.dimension() {
            return Err(LivenessError::Internal(format!(
                "face matcher returned {}-d embedding, expected {}",
                embedding.len(),
                self.matcher.dimension()
            )));
        }
        if embedding.iter().all(|&x| x == 0.0) {
            return Ok(Err("reference embedding has zero norm".to_string()));
        }
        l2_normalize(&mut embedding);
        Ok(Ok(embedding))
    }

    pub(crate) async fn run(
        &self,
        video: &mut dyn VideoSource,
        reference: &ReferenceImage,
        mut pacer: Pacer,
        preview: Option<&dyn PreviewSink>,
    ) -> Result<StepResult, LivenessError> {
        let reference = match self.reference_embedding(reference)? {
            Ok(embedding) => embedding,
            Err(msg) => {
                warn!(step = %STEP, reason = %msg, "liveness: invalid reference");
                return Ok(StepResult::invalid(STEP, msg));
            }
        };

        let threshold = self.config.similarity_threshold;
        let mut tally = Tally::default();
        while let Some(frame) = pacer.next_frame(video).await? {
            tally.frames += 1;
            let faces = self.matcher.detect(&frame)?;
            if faces.len() != 1 {
                let msg = format!("expected exactly one face, found {}", faces.len());
                if let Some(p) = preview {
                    p.show(STEP, &frame, std::slice::from_ref(&msg));
                }
                warn!(step = %STEP, seq = frame.seq, faces = faces.len(), "liveness: wrong face count");
                return Ok(tally
                    .result(false, msg.clone())
                    .with_metric("face_count", faces.len() as f64)
                    .with_error(msg));
            }

            let mut embedding = faces[0].embedding.clone();
            l2_normalize(&mut embedding);
            let similarity = cosine_similarity(&reference, &embedding)?;
            tally.similarities.push(similarity);
            let same = similarity > threshold;
            if same {
                tally.matched += 1;
            } else {
                tally.mismatched += 1;
            }
            debug!(step = %STEP, seq = frame.seq, similarity, same, "liveness: frame");
            if let Some(p) = preview {
                let label = if same { "same person" } else { "different person" };
                p.show(STEP, &frame, &[format!("{label} (score {similarity:.3})")]);
            }
        }

        let passed = tally.matched > 0 && tally.mismatched == 0;
        let message = if passed {
            "person matches reference"
        } else if tally.frames == 0 {
            "no frames captured"
        } else if tally.mismatched > 0 {
            "person does not match reference"
        } else {
            "no matching face captured"
        };
        info!(
            step = %STEP,
            passed,
            frames = tally.frames,
            matched = tally.matched,
            mismatched = tally.mismatched,
            "liveness: step finished"
        );
        Ok(tally.result(passed, message))
    }
}
