use super::*;
use crate::config::ExtractionConfig;
use crate::detector::{DetectorResponse, FrameSource, MockVideoSource, ScriptedDetector};
use crate::error::PosecoachError;
use crate::events::{EventBus, EventFilter, PosecoachEvent};
use crate::pose::{Landmark, Pose};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn create_test_pose(landmarks: usize) -> Pose {
    (0..landmarks)
        .map(|i| Landmark::new(i as f64 * 0.1, 0.5, 0.0, 0.9))
        .collect()
}

fn create_test_pipeline(event_bus: &Arc<EventBus>) -> ExtractionPipeline {
    let config = ExtractionConfig {
        fps: 10,
        progress_interval_frames: 4,
    };
    ExtractionPipeline::new(config, Arc::clone(event_bus))
}

fn clip(descriptor: &str, millis: u64) -> MockVideoSource {
    MockVideoSource::clip(descriptor, Duration::from_millis(millis))
}

fn boxed(sources: Vec<MockVideoSource>) -> Vec<Box<dyn FrameSource>> {
    sources
        .into_iter()
        .map(|source| Box::new(source) as Box<dyn FrameSource>)
        .collect()
}

#[tokio::test]
async fn test_extracts_across_sources() {
    let event_bus = Arc::new(EventBus::new(1024));
    let mut pipeline = create_test_pipeline(&event_bus);
    let first = clip("intro.mp4", 1000);
    let second = clip("chorus.mp4", 500);
    let released = [first.released_flag(), second.released_flag()];
    let detector = ScriptedDetector::always(create_test_pose(33));

    let sequence = pipeline
        .extract(boxed(vec![first, second]), &detector, "Full routine")
        .await
        .unwrap();

    assert_eq!(sequence.name(), "Full routine");
    assert_eq!(sequence.len(), 15);
    assert_eq!(sequence.timing()[0], 0.0);
    assert_eq!(sequence.timing()[3], 300.0);
    assert_eq!(sequence.timing()[14], 1400.0);
    assert_eq!(
        sequence.metadata().video_source.as_deref(),
        Some("intro.mp4, chorus.mp4")
    );
    assert_eq!(sequence.metadata().fps, Some(10.0));
    assert!(released.iter().all(|flag| flag.load(Ordering::Relaxed)));

    let stats = pipeline.stats();
    assert_eq!(stats.sources_completed, 2);
    assert_eq!(stats.frames_sampled, 15);
    assert_eq!(stats.acceptance_rate(), 1.0);
}

#[tokio::test]
async fn test_skips_frames_without_pose() {
    let event_bus = Arc::new(EventBus::new(1024));
    let mut receiver = event_bus.subscribe_filtered(EventFilter::extraction(), "test");
    let mut pipeline = create_test_pipeline(&event_bus);
    let detector = ScriptedDetector::new(
        vec![
            DetectorResponse::Detected(create_test_pose(33)),
            DetectorResponse::NoDetection,
            DetectorResponse::Fail("inference timeout".to_string()),
            DetectorResponse::Detected(create_test_pose(33)),
        ],
        DetectorResponse::NoDetection,
    );

    let sequence = pipeline
        .extract(boxed(vec![clip("a.mp4", 1000)]), &detector, "sparse")
        .await
        .unwrap();

    // Surviving keyframes are re-timed contiguously
    assert_eq!(sequence.len(), 2);
    assert_eq!(sequence.timing(), &[0.0, 100.0]);
    assert_eq!(detector.call_count(), 10);

    let events = receiver.drain();
    let skipped = events
        .iter()
        .filter(|e| matches!(e, PosecoachEvent::FrameSkipped { .. }))
        .count();
    let failed = events
        .iter()
        .filter(|e| matches!(e, PosecoachEvent::DetectorFailed { .. }))
        .count();
    assert_eq!(skipped, 7);
    assert_eq!(failed, 1);
    assert_eq!(pipeline.stats().detector_errors, 1);
    assert_eq!(pipeline.stats().frames_without_detection, 7);
}

#[tokio::test]
async fn test_failed_source_is_abandoned() {
    let event_bus = Arc::new(EventBus::new(1024));
    let mut receiver = event_bus.subscribe_filtered(EventFilter::extraction(), "test");
    let mut pipeline = create_test_pipeline(&event_bus);
    let broken = clip("broken.mp4", 1000).failing_at(3);
    let broken_released = broken.released_flag();
    let detector = ScriptedDetector::always(create_test_pose(33));

    let sequence = pipeline
        .extract(
            boxed(vec![broken, clip("ok.mp4", 1000)]),
            &detector,
            "recovered",
        )
        .await
        .unwrap();

    assert_eq!(sequence.len(), 13);
    assert!(broken_released.load(Ordering::Relaxed));
    assert_eq!(pipeline.stats().sources_failed, 1);
    assert_eq!(pipeline.stats().sources_completed, 1);

    let failures: Vec<_> = receiver
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            PosecoachEvent::SourceFailed { source, .. } => Some(source),
            _ => None,
        })
        .collect();
    assert_eq!(failures, vec!["broken.mp4".to_string()]);
}

#[tokio::test]
async fn test_no_poses_is_empty_sequence() {
    let event_bus = Arc::new(EventBus::new(1024));
    let mut pipeline = create_test_pipeline(&event_bus);
    let detector = ScriptedDetector::blind();

    let result = pipeline
        .extract(boxed(vec![clip("empty_room.mp4", 500)]), &detector, "nobody")
        .await;

    assert!(matches!(result, Err(PosecoachError::EmptySequence)));
}

#[tokio::test]
async fn test_live_source_rejected() {
    let event_bus = Arc::new(EventBus::new(1024));
    let mut pipeline = create_test_pipeline(&event_bus);
    let camera = MockVideoSource::live("camera0");
    let released = camera.released_flag();
    let detector = ScriptedDetector::always(create_test_pose(33));

    let result = pipeline.extract(boxed(vec![camera]), &detector, "live").await;

    assert!(matches!(result, Err(PosecoachError::EmptySequence)));
    assert_eq!(pipeline.stats().sources_failed, 1);
    assert!(released.load(Ordering::Relaxed));
}

#[tokio::test]
async fn test_progress_reported_periodically() {
    let event_bus = Arc::new(EventBus::new(1024));
    let mut receiver = event_bus.subscribe_filtered(EventFilter::extraction(), "test");
    let mut pipeline = create_test_pipeline(&event_bus);
    let detector = ScriptedDetector::always(create_test_pose(33));

    pipeline
        .extract(boxed(vec![clip("a.mp4", 1000)]), &detector, "progress")
        .await
        .unwrap();

    let progress: Vec<(u64, f64)> = receiver
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            PosecoachEvent::ExtractionProgress { frame, percent, .. } => Some((frame, percent)),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![(4, 40.0), (8, 80.0), (10, 100.0)]);
}

#[tokio::test]
async fn test_mismatched_landmark_counts_dropped() {
    let event_bus = Arc::new(EventBus::new(1024));
    let mut pipeline = create_test_pipeline(&event_bus);
    let detector = ScriptedDetector::new(
        vec![
            DetectorResponse::Detected(create_test_pose(33)),
            DetectorResponse::Detected(create_test_pose(17)),
        ],
        DetectorResponse::Detected(create_test_pose(33)),
    );

    let sequence = pipeline
        .extract(boxed(vec![clip("a.mp4", 500)]), &detector, "mixed")
        .await
        .unwrap();

    assert_eq!(sequence.len(), 4);
    assert_eq!(sequence.landmark_count(), 33);
    assert_eq!(pipeline.stats().poses_rejected, 1);
}

#[tokio::test]
async fn test_non_finite_pose_dropped() {
    let event_bus = Arc::new(EventBus::new(1024));
    let mut receiver = event_bus.subscribe_filtered(EventFilter::extraction(), "test");
    let mut pipeline = create_test_pipeline(&event_bus);
    let mut glitched = create_test_pose(33).into_landmarks();
    glitched[0].x = f64::NAN;
    let detector = ScriptedDetector::new(
        vec![DetectorResponse::Detected(glitched.into())],
        DetectorResponse::Detected(create_test_pose(33)),
    );

    let sequence = pipeline
        .extract(boxed(vec![clip("a.mp4", 1000)]), &detector, "glitch")
        .await
        .unwrap();

    assert_eq!(sequence.len(), 9);
    assert!(sequence.poses().iter().all(Pose::is_finite));
    assert_eq!(pipeline.stats().poses_rejected, 1);

    let failed: Vec<u64> = receiver
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            PosecoachEvent::DetectorFailed { frame, .. } => Some(frame),
            _ => None,
        })
        .collect();
    assert_eq!(failed, vec![0]);
}

#[tokio::test]
async fn test_cancelled_run_releases_sources() {
    let event_bus = Arc::new(EventBus::new(1024));
    let token = CancellationToken::new();
    let mut pipeline = create_test_pipeline(&event_bus).with_cancellation(token.clone());
    let first = clip("a.mp4", 1000);
    let second = clip("b.mp4", 1000);
    let released = [first.released_flag(), second.released_flag()];
    let detector = ScriptedDetector::always(create_test_pose(33));

    token.cancel();
    let result = pipeline
        .extract(boxed(vec![first, second]), &detector, "cancelled")
        .await;

    assert!(matches!(result, Err(PosecoachError::Cancelled)));
    assert!(released.iter().all(|flag| flag.load(Ordering::Relaxed)));
    assert_eq!(detector.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_interrupts_detection() {
    let event_bus = Arc::new(EventBus::new(1024));
    let mut pipeline = create_test_pipeline(&event_bus);
    let token = pipeline.cancellation_token().clone();
    let detector = ScriptedDetector::always(create_test_pose(33)).with_latency(Duration::from_secs(60));

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();
    });

    let result = pipeline
        .extract(boxed(vec![clip("slow.mp4", 1000)]), &detector, "slow")
        .await;

    assert!(matches!(result, Err(PosecoachError::Cancelled)));
    assert_eq!(detector.call_count(), 1);
}

#[test]
fn test_stats_rates() {
    let mut stats = ExtractionStats::default();
    assert_eq!(stats.acceptance_rate(), 0.0);

    stats.record_start(2);
    for _ in 0..4 {
        stats.record_frame();
    }
    stats.record_pose();
    stats.record_no_detection();
    assert_eq!(stats.sources_total, 2);
    assert_eq!(stats.acceptance_rate(), 0.25);

    stats.reset();
    assert_eq!(stats.frames_sampled, 0);
}
