use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use facelive_capture::mock::MockDevice;
use bytes::Bytes;
use facelive_capture::{Frame, PcmAudio, PixelFormat};
use facelive_liveness::{
    ChallengeGenerator, LivenessConfig, Orchestrator, PipelineRequest, PipelineResult,
    PipelineStage, PreviewSink, Providers, ReferenceImage, StepDurations, StepName, StepParams,
};
use facelive_perception::mock::{
    gaze_shift_frame, FaceScript, FaceShape, ScriptedDepthPose, ScriptedFaceMatcher,
    ScriptedLandmarks, ScriptedTranscriber,
};
use facelive_perception::{BlinkGazeAnalyzer, FaceLandmarks, PerceptionError};
use parking_lot::Mutex;
use tokio::time::Instant;

const SEED: u64 = 7;

/// Blinks on frames 10..13 of every 30, mouth opens and closes every 3
/// frames.
fn live_shape(seq: u64) -> Option<FaceShape> {
    let ear = if (10..13).contains(&(seq % 30)) { 0.15 } else { 0.3 };
    let mar = if (seq / 3) % 2 == 0 { 0.1 } else { 0.4 };
    Some(FaceShape { ear, mar })
}

fn expected_answer() -> String {
    ChallengeGenerator::seeded(SEED)
        .next_challenge()
        .expected_answer()
        .to_string()
}

fn live_device() -> Arc<MockDevice> {
    let frame = gaze_shift_frame(320, 240);
    Arc::new(MockDevice::new("cam0").with_frames(move |_| Some(frame.clone())))
}

fn short_durations() -> StepDurations {
    StepName::ALL
        .into_iter()
        .fold(StepDurations::default(), |d, step| {
            d.with(step, Duration::from_secs(2))
        })
}

struct Rig {
    device: Arc<MockDevice>,
    face: Arc<ScriptedFaceMatcher>,
    speech: Arc<ScriptedTranscriber>,
    orchestrator: Orchestrator,
}

fn rig(
    device: Arc<MockDevice>,
    face: ScriptedFaceMatcher,
    depth: ScriptedDepthPose,
    landmarks: Arc<dyn BlinkGazeAnalyzer>,
    speech: ScriptedTranscriber,
) -> Rig {
    let face = Arc::new(face);
    let speech = Arc::new(speech);
    let providers = Providers {
        face: face.clone(),
        depth_pose: Arc::new(depth),
        landmarks,
        speech: speech.clone(),
    };
    let orchestrator = Orchestrator::new(LivenessConfig::default(), device.clone(), providers)
        .unwrap()
        .with_challenge_seed(SEED);
    Rig {
        device,
        face,
        speech,
        orchestrator,
    }
}

fn live_rig() -> Rig {
    rig(
        live_device(),
        ScriptedFaceMatcher::new(8),
        ScriptedDepthPose::textured(8.0),
        Arc::new(ScriptedLandmarks::new(live_shape)),
        ScriptedTranscriber::new(&format!("the answer is {}", expected_answer())),
    )
}

fn request() -> PipelineRequest {
    PipelineRequest {
        durations: short_durations(),
        ..PipelineRequest::default()
    }
}

fn with_reference(reference: &[u8]) -> PipelineRequest {
    PipelineRequest {
        reference_image: Some(ReferenceImage::from_bytes(reference.to_vec())),
        ..request()
    }
}

fn assert_released_once(device: &MockDevice) {
    assert_eq!(device.open_count(), 1);
    assert_eq!(device.release_count(), 1);
    assert!(!device.is_held());
}

#[tokio::test(start_paused = true)]
async fn live_subject_passes_every_step() {
    let r = live_rig();
    let result = r.orchestrator.run_pipeline(request()).await;

    assert!(result.success, "{result:?}");
    assert!(result.is_live, "{result:?}");
    assert_eq!(result.stage, PipelineStage::Done);
    assert_eq!(result.total_steps, 4);
    assert_eq!(result.passed_steps, 4);
    assert!(result.confidence >= 0.7 && result.confidence <= 1.0);
    assert!(result.error.is_none());

    let person = result.step(StepName::PersonVerification).unwrap();
    assert_eq!(person.message(), "skipped");
    assert_eq!(person.confidence(), 1.0);

    let blink = result.step(StepName::BlinkGaze).unwrap();
    assert!(blink.metric("blinks_detected").unwrap() >= 1.0);

    let voice = result.step(StepName::VoiceCaptcha).unwrap();
    assert_eq!(voice.detail("recognized_number"), Some(expected_answer().as_str()));
    assert!(voice.metric("mar_std_dev").unwrap() > 0.01);

    for step in &result.steps {
        assert!((0.0..=1.0).contains(&step.confidence()));
    }
    assert_released_once(&r.device);
    assert_eq!(r.speech.session_chunks().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn pipeline_json_shape() {
    let r = live_rig();
    let result = r.orchestrator.run_pipeline(request()).await;
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["success"], true);
    assert_eq!(json["is_live"], true);
    assert_eq!(json["passed_steps"], 4);
    assert_eq!(json["steps"]["person_verification"]["message"], "skipped");
    assert_eq!(json["steps"]["depth_pose_liveness"]["passed"], true);
    assert!(json["steps"]["blink_gaze"]["gaze_movements"].is_number());
    assert!(json.get("error").is_none());
    assert!(json["timestamp"].is_string());
}

#[tokio::test(start_paused = true)]
async fn same_seed_same_result() {
    let normalize = |mut r: PipelineResult| {
        r.timestamp = Utc.timestamp_opt(0, 0).unwrap();
        r
    };
    let a = normalize(live_rig().orchestrator.run_pipeline(request()).await);
    let b = normalize(live_rig().orchestrator.run_pipeline(request()).await);
    assert_eq!(a, b);
}

#[tokio::test(start_paused = true)]
async fn matching_reference_is_verified() {
    let r = live_rig();
    let result = r.orchestrator.run_pipeline(with_reference(b"jpeg")).await;
    assert!(result.is_live, "{result:?}");
    let person = result.step(StepName::PersonVerification).unwrap();
    assert!(person.passed());
    assert!((person.confidence() - 0.9).abs() < 1e-5);
    assert_eq!(person.metric("mismatched_frames"), Some(0.0));
}

#[tokio::test(start_paused = true)]
async fn different_person_stops_the_run() {
    let r = rig(
        live_device(),
        ScriptedFaceMatcher::new(8).with_script(|_| FaceScript::Match(0.3)),
        ScriptedDepthPose::textured(8.0),
        Arc::new(ScriptedLandmarks::new(live_shape)),
        ScriptedTranscriber::new("seven"),
    );
    let result = r.orchestrator.run_pipeline(with_reference(b"jpeg")).await;

    assert!(!result.success);
    assert!(!result.is_live);
    assert_eq!(result.stage, PipelineStage::Failed);
    assert_eq!(result.total_steps, 1);
    assert!(result.step(StepName::DepthPoseLiveness).is_none());
    assert_released_once(&r.device);
}

#[tokio::test(start_paused = true)]
async fn wrong_face_count_fails_without_spending_budget() {
    let r = rig(
        live_device(),
        ScriptedFaceMatcher::new(8).with_script(|seq| {
            if seq == 5 {
                FaceScript::Crowd(2)
            } else {
                FaceScript::Match(0.9)
            }
        }),
        ScriptedDepthPose::textured(8.0),
        Arc::new(ScriptedLandmarks::new(live_shape)),
        ScriptedTranscriber::new("seven"),
    );
    let start = Instant::now();
    let result = r.orchestrator.run_pipeline(with_reference(b"jpeg")).await;

    assert!(Instant::now() - start < Duration::from_secs(1));
    assert!(!result.success);
    let person = result.step(StepName::PersonVerification).unwrap();
    assert!(!person.passed());
    assert_eq!(person.metric("face_count"), Some(2.0));
    assert_eq!(person.error(), Some("expected exactly one face, found 2"));
    assert_eq!(r.face.detect_calls(), 6);
}

#[tokio::test(start_paused = true)]
async fn reference_with_two_faces_is_invalid() {
    let r = rig(
        live_device(),
        ScriptedFaceMatcher::new(8).with_reference_faces(2),
        ScriptedDepthPose::textured(8.0),
        Arc::new(ScriptedLandmarks::new(live_shape)),
        ScriptedTranscriber::new("seven"),
    );
    let result = r.orchestrator.run_pipeline(with_reference(b"jpeg")).await;
    let person = result.step(StepName::PersonVerification).unwrap();
    assert!(!person.passed());
    assert!(person.error().unwrap().contains("exactly one face"));
    assert_eq!(r.face.detect_calls(), 0);
    assert_released_once(&r.device);
}

#[tokio::test(start_paused = true)]
async fn flat_depth_fails_fast() {
    let r = rig(
        live_device(),
        ScriptedFaceMatcher::new(8),
        ScriptedDepthPose::flat(),
        Arc::new(ScriptedLandmarks::new(live_shape)),
        ScriptedTranscriber::new("seven"),
    );
    let result = r.orchestrator.run_pipeline(request()).await;

    assert!(result.success);
    assert!(!result.is_live);
    assert_eq!(result.stage, PipelineStage::Failed);
    assert_eq!(result.total_steps, 2);
    assert!(result.step(StepName::BlinkGaze).is_none());
    assert!(result.step(StepName::VoiceCaptcha).is_none());
    assert!(
        result
            .error
            .as_deref()
            .unwrap()
            .starts_with("depth_pose_liveness failed")
    );
    assert!(r.speech.session_chunks().is_empty());
    assert_released_once(&r.device);
}

#[tokio::test(start_paused = true)]
async fn unavailable_camera_fails_before_any_step() {
    let device = Arc::new(MockDevice::new("cam0").unavailable());
    let r = rig(
        device,
        ScriptedFaceMatcher::new(8),
        ScriptedDepthPose::textured(8.0),
        Arc::new(ScriptedLandmarks::new(live_shape)),
        ScriptedTranscriber::new("seven"),
    );
    let result = r.orchestrator.run_pipeline(request()).await;

    assert!(!result.success);
    assert_eq!(result.stage, PipelineStage::Failed);
    assert!(result.steps.is_empty());
    assert!(result.error.unwrap().starts_with("capture resource error"));
    assert_eq!(r.device.open_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn internal_fault_mid_loop_releases_once() {
    let r = rig(
        live_device(),
        ScriptedFaceMatcher::new(8).with_error_at(5),
        ScriptedDepthPose::textured(8.0),
        Arc::new(ScriptedLandmarks::new(live_shape)),
        ScriptedTranscriber::new("seven"),
    );
    let result = r.orchestrator.run_pipeline(with_reference(b"jpeg")).await;

    assert!(!result.success);
    assert_eq!(result.stage, PipelineStage::Failed);
    assert_eq!(
        result.error.as_deref(),
        Some("internal error during liveness check")
    );
    assert!(!result.message.contains("detector crashed"));
    assert_released_once(&r.device);
}

#[tokio::test(start_paused = true)]
async fn camera_read_error_is_a_resource_fault() {
    let frame = gaze_shift_frame(320, 240);
    let device = Arc::new(
        MockDevice::new("cam0")
            .with_frames(move |_| Some(frame.clone()))
            .with_read_error_at(70),
    );
    let r = rig(
        device,
        ScriptedFaceMatcher::new(8),
        ScriptedDepthPose::textured(8.0),
        Arc::new(ScriptedLandmarks::new(live_shape)),
        ScriptedTranscriber::new("seven"),
    );
    let result = r.orchestrator.run_pipeline(request()).await;

    assert!(!result.success);
    assert!(result.error.unwrap().starts_with("capture resource error"));
    assert_eq!(result.total_steps, 2);
    assert_released_once(&r.device);
}

#[tokio::test(start_paused = true)]
async fn stalled_camera_aborts_after_grace() {
    let device = Arc::new(MockDevice::new("cam0").with_frames(|seq| {
        (seq < 10).then(|| gaze_shift_frame(320, 240))
    }));
    let r = rig(
        device,
        ScriptedFaceMatcher::new(8),
        ScriptedDepthPose::textured(8.0),
        Arc::new(ScriptedLandmarks::new(live_shape)),
        ScriptedTranscriber::new("seven"),
    );
    let request = PipelineRequest {
        durations: short_durations().with(StepName::DepthPoseLiveness, Duration::from_secs(10)),
        ..PipelineRequest::default()
    };
    let start = Instant::now();
    let result = r.orchestrator.run_pipeline(request).await;

    assert!(Instant::now() - start < Duration::from_secs(5));
    assert!(!result.success);
    assert!(result.error.unwrap().contains("no video frame received"));
    assert_released_once(&r.device);
}

#[tokio::test(start_paused = true)]
async fn missing_model_aborts_at_its_step() {
    let r = rig(
        live_device(),
        ScriptedFaceMatcher::new(8),
        ScriptedDepthPose::textured(8.0),
        Arc::new(ScriptedLandmarks::new(live_shape)),
        ScriptedTranscriber::new("seven").not_ready("vosk model missing"),
    );
    let result = r.orchestrator.run_pipeline(request()).await;

    assert!(!result.success);
    assert_eq!(result.total_steps, 3);
    assert!(result.error.unwrap().starts_with("model unavailable"));
    assert_released_once(&r.device);
}

struct PanickingLandmarks;

impl BlinkGazeAnalyzer for PanickingLandmarks {
    fn landmarks(&self, frame: &Frame) -> Result<Vec<FaceLandmarks>, PerceptionError> {
        if frame.seq == 3 {
            panic!("landmark backend crashed");
        }
        Ok(Vec::new())
    }
}

#[tokio::test(start_paused = true)]
async fn panic_in_provider_still_releases_device() {
    let r = rig(
        live_device(),
        ScriptedFaceMatcher::new(8),
        ScriptedDepthPose::textured(8.0),
        Arc::new(PanickingLandmarks),
        ScriptedTranscriber::new("seven"),
    );
    let device = r.device.clone();
    let orchestrator = Arc::new(r.orchestrator);
    let handle = tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move { orchestrator.run_pipeline(request()).await }
    });

    let err = handle.await.unwrap_err();
    assert!(err.is_panic());
    assert_released_once(&device);
}

#[tokio::test(start_paused = true)]
async fn single_step_runs_without_fusion() {
    let r = live_rig();
    let result = r
        .orchestrator
        .run_single_step(
            StepName::BlinkGaze,
            StepParams {
                duration: Some(Duration::from_secs(2)),
                ..StepParams::default()
            },
        )
        .await;

    assert!(result.passed(), "{result:?}");
    assert_eq!(result.metric("blinks_detected"), Some(2.0));
    let json = serde_json::to_value(result.single_step_view()).unwrap();
    assert_eq!(json["success"], true);
    assert!(json.get("passed").is_none());
    assert_released_once(&r.device);
}

#[tokio::test(start_paused = true)]
async fn single_person_step_requires_reference() {
    let r = live_rig();
    let result = r
        .orchestrator
        .run_single_step(StepName::PersonVerification, StepParams::default())
        .await;
    assert!(!result.passed());
    assert!(result.error().is_some());
    assert_eq!(r.device.open_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn single_step_on_busy_device_reports_resource_error() {
    let r = live_rig();
    let orchestrator = Arc::new(r.orchestrator);
    let pipeline = tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move { orchestrator.run_pipeline(request()).await }
    });
    tokio::time::sleep(Duration::from_millis(500)).await;

    let single = orchestrator
        .run_single_step(StepName::BlinkGaze, StepParams::default())
        .await;
    assert!(!single.passed());
    assert!(single.error().unwrap().starts_with("capture resource error"));

    let result = pipeline.await.unwrap();
    assert!(result.is_live);
    assert_eq!(r.device.release_count(), 1);
}

#[derive(Default)]
struct RecordingPreview {
    shown: Mutex<Vec<StepName>>,
    closed: Mutex<Vec<StepName>>,
}

impl PreviewSink for RecordingPreview {
    fn show(&self, step: StepName, _frame: &Frame, overlay: &[String]) {
        assert!(!overlay.is_empty());
        self.shown.lock().push(step);
    }

    fn close(&self, step: StepName) {
        self.closed.lock().push(step);
    }
}

#[tokio::test(start_paused = true)]
async fn display_pushes_overlays() {
    let preview = Arc::new(RecordingPreview::default());
    let r = live_rig();
    let orchestrator = r.orchestrator.with_preview(preview.clone());

    let result = orchestrator
        .run_single_step(
            StepName::DepthPoseLiveness,
            StepParams {
                duration: Some(Duration::from_secs(1)),
                display: true,
                ..StepParams::default()
            },
        )
        .await;
    assert!(result.passed(), "{result:?}");
    let shown = preview.shown.lock().clone();
    assert_eq!(shown.len() as f64, result.metric("frames_processed").unwrap());
    assert!(shown.iter().all(|&s| s == StepName::DepthPoseLiveness));
    assert_eq!(*preview.closed.lock(), vec![StepName::DepthPoseLiveness]);

    let quiet = orchestrator
        .run_single_step(StepName::BlinkGaze, StepParams::default())
        .await;
    assert!(quiet.passed());
    assert_eq!(preview.shown.lock().len(), shown.len());
}

#[test]
fn uploaded_answer_is_checked() {
    let r = live_rig();
    let orchestrator = Orchestrator::new(
        LivenessConfig::default(),
        r.device.clone(),
        Providers {
            face: r.face.clone(),
            depth_pose: Arc::new(ScriptedDepthPose::flat()),
            landmarks: Arc::new(ScriptedLandmarks::steady(FaceShape::NEUTRAL)),
            speech: Arc::new(ScriptedTranscriber::new("twenty seven")),
        },
    )
    .unwrap();
    let audio = PcmAudio::raw(16000, vec![0u8; 16000]).unwrap();

    let result = orchestrator.verify_uploaded_audio(&audio, Some("23 + 4"));
    assert!(result.passed(), "{result:?}");
    assert_eq!(result.confidence(), 1.0);
    assert_eq!(result.detail("question"), Some("23 + 4 = ?"));

    let wrong = orchestrator.verify_uploaded_audio(&audio, Some("30 - 8"));
    assert!(!wrong.passed());
    assert_eq!(wrong.confidence(), 0.5);

    let invalid = orchestrator.verify_uploaded_audio(&audio, Some("23 * 4"));
    assert!(!invalid.passed());
    assert!(invalid.error().is_some());
    assert_eq!(r.device.open_count(), 0);
}

#[test]
fn uploaded_answer_to_generated_challenge() {
    let r = rig(
        live_device(),
        ScriptedFaceMatcher::new(8),
        ScriptedDepthPose::flat(),
        Arc::new(ScriptedLandmarks::steady(FaceShape::NEUTRAL)),
        ScriptedTranscriber::new(&expected_answer()),
    );
    let audio = PcmAudio::raw(16000, vec![0u8; 8000]).unwrap();
    let result = r.orchestrator.verify_uploaded_audio(&audio, None);
    assert!(result.passed(), "{result:?}");
    assert_eq!(result.detail("expected_answer"), Some(expected_answer().as_str()));
}

#[test]
fn status_reports_readiness_without_claiming() {
    let r = live_rig();
    let status = r.orchestrator.system_status();
    assert!(status.camera_available);
    assert!(status.is_ready());
    assert_eq!(status.models_loaded.len(), 4);
    assert_eq!(r.device.open_count(), 0);

    let degraded = rig(
        Arc::new(MockDevice::new("cam1").unavailable()),
        ScriptedFaceMatcher::new(8),
        ScriptedDepthPose::textured(8.0),
        Arc::new(ScriptedLandmarks::new(live_shape)),
        ScriptedTranscriber::new("seven").not_ready("model missing"),
    );
    let status = degraded.orchestrator.system_status();
    assert!(!status.camera_available);
    assert!(!status.is_ready());
    assert_eq!(status.models_loaded[&StepName::VoiceCaptcha], false);
    assert_eq!(status.models_loaded[&StepName::BlinkGaze], true);

    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["models_loaded"]["voice_captcha"], false);
    assert_eq!(json["configuration"]["fusion"]["min_passed_steps"], 3);
}

/// Blinks like `live_shape` but never moves the mouth.
fn still_mouth(seq: u64) -> Option<FaceShape> {
    live_shape(seq).map(|shape| FaceShape { mar: 0.1, ..shape })
}

fn blink_step_params() -> StepParams {
    StepParams {
        duration: Some(Duration::from_secs(2)),
        ..StepParams::default()
    }
}

#[tokio::test(start_paused = true)]
async fn still_mouth_fails_the_last_step() {
    let r = rig(
        live_device(),
        ScriptedFaceMatcher::new(8),
        ScriptedDepthPose::textured(8.0),
        Arc::new(ScriptedLandmarks::new(still_mouth)),
        ScriptedTranscriber::new(&format!("the answer is {}", expected_answer())),
    );
    let result = r.orchestrator.run_pipeline(request()).await;

    assert!(result.success, "{result:?}");
    assert!(!result.is_live);
    assert_eq!(result.stage, PipelineStage::Failed);
    assert_eq!(result.total_steps, 4);
    assert_eq!(result.passed_steps, 3);
    let error = result.error.as_deref().unwrap();
    assert!(error.starts_with("voice_captcha failed"), "{error}");

    let voice = result.step(StepName::VoiceCaptcha).unwrap();
    assert!(!voice.passed());
    assert!((voice.confidence() - 0.5).abs() < 1e-9);
    assert!(voice.metric("mar_std_dev").unwrap() < 0.01);
    assert_eq!(voice.detail("recognized_number"), Some(expected_answer().as_str()));
    assert_released_once(&r.device);
}

#[tokio::test(start_paused = true)]
async fn wrong_spoken_answer_fails_captcha() {
    let wrong = expected_answer().parse::<i64>().unwrap() + 1;
    let r = rig(
        live_device(),
        ScriptedFaceMatcher::new(8),
        ScriptedDepthPose::textured(8.0),
        Arc::new(ScriptedLandmarks::new(live_shape)),
        ScriptedTranscriber::new(&format!("the answer is {wrong}")),
    );
    let result = r.orchestrator.run_pipeline(request()).await;

    assert!(result.success);
    assert!(!result.is_live);
    assert_eq!(result.total_steps, 4);

    let voice = result.step(StepName::VoiceCaptcha).unwrap();
    assert!(!voice.passed());
    assert_eq!(voice.message(), "spoken answer is incorrect");
    assert_eq!(voice.detail("recognized_number"), Some(wrong.to_string().as_str()));
    assert!(voice.metric("mar_std_dev").unwrap() > 0.01);
    assert!(voice.confidence() <= 0.5);
}

#[tokio::test(start_paused = true)]
async fn no_blinks_fails_blink_step() {
    let r = rig(
        live_device(),
        ScriptedFaceMatcher::new(8),
        ScriptedDepthPose::textured(8.0),
        Arc::new(ScriptedLandmarks::steady(FaceShape::NEUTRAL)),
        ScriptedTranscriber::new("unused"),
    );
    let result = r
        .orchestrator
        .run_single_step(StepName::BlinkGaze, blink_step_params())
        .await;

    assert!(!result.passed(), "{result:?}");
    assert_eq!(result.metric("blinks_detected"), Some(0.0));
    assert!(result.metric("gaze_movements").unwrap() >= 2.0);
    assert!((result.confidence() - 0.5).abs() < 1e-9);
    assert_eq!(result.message(), "insufficient blink or gaze activity");
    assert_released_once(&r.device);
}

#[tokio::test(start_paused = true)]
async fn centred_gaze_fails_blink_step() {
    // Uniform frames read as a centred gaze on every frame.
    let r = rig(
        Arc::new(MockDevice::new("cam0")),
        ScriptedFaceMatcher::new(8),
        ScriptedDepthPose::textured(8.0),
        Arc::new(ScriptedLandmarks::new(live_shape)),
        ScriptedTranscriber::new("unused"),
    );
    let result = r
        .orchestrator
        .run_single_step(StepName::BlinkGaze, blink_step_params())
        .await;

    assert!(!result.passed(), "{result:?}");
    assert_eq!(result.metric("blinks_detected"), Some(2.0));
    assert_eq!(result.metric("gaze_movements"), Some(0.0));
    assert!((result.confidence() - 0.5).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn short_frame_data_is_an_internal_fault() {
    let device = Arc::new(MockDevice::new("cam0").with_frames(|seq| {
        Some(Frame {
            seq,
            timestamp: Duration::ZERO,
            width: 320,
            height: 240,
            format: PixelFormat::Gray8,
            data: Bytes::from(vec![200u8; 100]),
        })
    }));
    let r = rig(
        device,
        ScriptedFaceMatcher::new(8),
        ScriptedDepthPose::textured(8.0),
        Arc::new(ScriptedLandmarks::new(live_shape)),
        ScriptedTranscriber::new("unused"),
    );
    let result = r
        .orchestrator
        .run_single_step(
            StepName::BlinkGaze,
            StepParams {
                duration: Some(Duration::from_secs(1)),
                ..StepParams::default()
            },
        )
        .await;

    assert!(!result.passed());
    assert_eq!(result.confidence(), 0.0);
    assert_eq!(result.error(), Some("internal error during liveness check"));
    assert_released_once(&r.device);
}
