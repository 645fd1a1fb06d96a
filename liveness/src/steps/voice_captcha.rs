use facelive_capture::{AudioSource, PcmAudio, VideoSource};
use facelive_perception::{mouth_aspect_ratio, BlinkGazeAnalyzer, SpeechTranscriber, TranscriptStream};
use tracing::{debug, info};

use super::{std_dev, Pacer};
use crate::captcha::{extract_spoken_number, Challenge};
use crate::config::VoiceCaptchaConfig;
use crate::preview::PreviewSink;
use crate::{LivenessError, StepName, StepResult};

const STEP: StepName = StepName::VoiceCaptcha;

/// MAR standard deviation at which the mouth-movement term saturates.
const MAR_STD_SATURATION: f64 = 0.02;

/// Final transcript, falling back to the last partial when the final
/// text is empty.
fn transcript(stream: &mut dyn TranscriptStream) -> Result<String, LivenessError> {
    let text = stream.final_text()?;
    if text.trim().is_empty() {
        return Ok(stream.partial_text());
    }
    Ok(text)
}

fn with_challenge_details(
    result: StepResult,
    challenge: &Challenge,
    spoken_text: &str,
    recognized: Option<&str>,
) -> StepResult {
    result
        .with_detail("question", challenge.question())
        .with_detail("expected_answer", challenge.expected_answer())
        .with_detail("spoken_text", spoken_text)
        .with_detail("recognized_number", recognized.unwrap_or_default())
}

/// Spoken arithmetic answer plus visible mouth movement.
pub(crate) struct VoiceCaptchaStep<'a> {
    landmarks: &'a dyn BlinkGazeAnalyzer,
    speech: &'a dyn SpeechTranscriber,
    config: &'a VoiceCaptchaConfig,
    challenge: Challenge,
}

impl<'a> VoiceCaptchaStep<'a> {
    pub(crate) fn new(
        landmarks: &'a dyn BlinkGazeAnalyzer,
        speech: &'a dyn SpeechTranscriber,
        config: &'a VoiceCaptchaConfig,
        challenge: Challenge,
    ) -> Self {
        Self {
            landmarks,
            speech,
            config,
            challenge,
        }
    }

    /// Runs the mouth and speech producers side by side until both
    /// budgets are spent, then decides once on their joint state.
    pub(crate) async fn run(
        &self,
        video: &mut dyn VideoSource,
        audio: &mut dyn AudioSource,
        mut video_pacer: Pacer,
        mut audio_pacer: Pacer,
        preview: Option<&dyn PreviewSink>,
    ) -> Result<StepResult, LivenessError> {
        let question = self.challenge.question();
        info!(step = %STEP, question = %question, "liveness: challenge issued");
        let mut stream = self.speech.start(audio.sample_rate())?;

        let mouth = async {
            let mut frames = 0usize;
            let mut mars = Vec::new();
            while let Some(frame) = video_pacer.next_frame(video).await? {
                frames += 1;
                let faces = self.landmarks.landmarks(&frame)?;
                let mar = faces.first().map(|face| mouth_aspect_ratio(face.mouth()));
                if let Some(mar) = mar {
                    mars.push(mar);
                }
                debug!(step = %STEP, seq = frame.seq, mar, "liveness: frame");
                if let Some(p) = preview {
                    let status = match mar {
                        Some(mar) => format!("MAR {mar:.3}"),
                        None => "no face".to_string(),
                    };
                    p.show(STEP, &frame, &[format!("say: {question}"), status]);
                }
            }
            Ok::<_, LivenessError>((frames, mars))
        };

        let listen = async {
            let mut chunks = 0usize;
            while let Some(chunk) = audio_pacer.next_chunk(audio).await? {
                chunks += 1;
                stream.accept_audio_chunk(&chunk.data)?;
            }
            Ok::<_, LivenessError>(chunks)
        };

        let ((frames, mars), chunks) = tokio::try_join!(mouth, listen)?;

        let spoken = transcript(stream.as_mut())?;
        let recognized = extract_spoken_number(&spoken);
        let matched = recognized.as_deref() == Some(self.challenge.expected_answer());
        let mar_std = std_dev(&mars);
        let moving = mar_std > self.config.mar_std_threshold;
        let passed = moving && matched;
        let confidence = (f64::min(1.0, mar_std / MAR_STD_SATURATION) + if matched { 1.0 } else { 0.0 }) / 2.0;
        info!(
            step = %STEP,
            passed,
            matched,
            mar_std,
            spoken = %spoken,
            "liveness: step finished"
        );

        let message = match (moving, matched) {
            (true, true) => "spoken answer and mouth movement verified",
            (false, true) => "answer correct but no mouth movement detected",
            (_, false) if recognized.is_none() => "no spoken number recognized",
            (_, false) => "spoken answer is incorrect",
        };
        let result = StepResult::new(STEP, passed, confidence, message)
            .with_metric("mar_std_dev", mar_std)
            .with_metric("frames_processed", frames as f64)
            .with_metric("mouth_frames", mars.len() as f64)
            .with_metric("audio_chunks", chunks as f64);
        Ok(with_challenge_details(
            result,
            &self.challenge,
            &spoken,
            recognized.as_deref(),
        ))
    }
}

/// Speech-only check of a pre-recorded answer.
///
/// Confidence is 1 on an exact match, 0.5 when some number was recognized
/// but differs, else 0.
pub(crate) fn verify_upload(
    speech: &dyn SpeechTranscriber,
    audio: &PcmAudio,
    challenge: &Challenge,
    chunk_samples: usize,
) -> Result<StepResult, LivenessError> {
    let mut stream = speech.start(audio.sample_rate)?;
    let mut chunks = 0usize;
    for chunk in audio.chunks(chunk_samples) {
        stream.accept_audio_chunk(chunk)?;
        chunks += 1;
    }
    let spoken = transcript(stream.as_mut())?;
    let recognized = extract_spoken_number(&spoken);
    let matched = recognized.as_deref() == Some(challenge.expected_answer());
    let (confidence, message) = match (&recognized, matched) {
        (_, true) => (1.0, "spoken answer is correct"),
        (Some(_), false) => (0.5, "spoken answer is incorrect"),
        (None, false) => (0.0, "no spoken number recognized"),
    };
    info!(
        step = %STEP,
        passed = matched,
        chunks,
        spoken = %spoken,
        "liveness: uploaded audio checked"
    );
    let result = StepResult::new(STEP, matched, confidence, message)
        .with_metric("audio_chunks", chunks as f64)
        .with_metric("audio_duration_secs", audio.duration().as_secs_f64());
    Ok(with_challenge_details(
        result,
        challenge,
        &spoken,
        recognized.as_deref(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captcha::parse_expression;
    use facelive_perception::mock::ScriptedTranscriber;

    fn pcm(samples: usize) -> PcmAudio {
        PcmAudio::raw(16000, vec![0u8; samples * 2]).unwrap()
    }

    #[test]
    fn upload_exact_match() {
        let speech = ScriptedTranscriber::new("the answer is twenty seven");
        let challenge = parse_expression("23 + 4").unwrap();
        let r = verify_upload(&speech, &pcm(20000), &challenge, 4000).unwrap();
        assert!(r.passed());
        assert_eq!(r.confidence(), 1.0);
        assert_eq!(r.detail("recognized_number"), Some("27"));
        assert_eq!(r.detail("expected_answer"), Some("27"));
        assert_eq!(r.metric("audio_chunks"), Some(5.0));
    }

    #[test]
    fn upload_wrong_number_is_half_confident() {
        let speech = ScriptedTranscriber::new("twenty eight");
        let challenge = parse_expression("23 + 4").unwrap();
        let r = verify_upload(&speech, &pcm(8000), &challenge, 4000).unwrap();
        assert!(!r.passed());
        assert_eq!(r.confidence(), 0.5);
        assert_eq!(r.detail("recognized_number"), Some("28"));
    }

    #[test]
    fn upload_without_number() {
        let speech = ScriptedTranscriber::new("hello there");
        let challenge = parse_expression("23 + 4").unwrap();
        let r = verify_upload(&speech, &pcm(8000), &challenge, 4000).unwrap();
        assert!(!r.passed());
        assert_eq!(r.confidence(), 0.0);
        assert_eq!(r.detail("recognized_number"), Some(""));
    }

    #[test]
    fn upload_with_digits_transcript() {
        let speech = ScriptedTranscriber::new("it is 22");
        let challenge = parse_expression("30 - 8").unwrap();
        let r = verify_upload(&speech, &pcm(12000), &challenge, 4000).unwrap();
        assert!(r.passed());
    }
}
