use super::*;
use crate::pose::{Landmark, Pose};
use crate::sequence::{PoseSequence, SequenceMetadata};
use std::sync::Arc;

fn create_test_pose(x: f64) -> Pose {
    vec![
        Landmark::new(x, 0.0, 0.0, 1.0),
        Landmark::new(x, 1.0, 0.0, 1.0),
    ]
    .into()
}

fn create_test_sequence(timing: Vec<f64>) -> Arc<PoseSequence> {
    let poses = (0..timing.len())
        .map(|i| create_test_pose(i as f64))
        .collect();
    Arc::new(PoseSequence::new("drill", poses, timing, SequenceMetadata::default()).unwrap())
}

#[test]
fn test_empty_clock_is_inert() {
    let mut clock = PlaybackClock::empty();

    assert!(!clock.play());
    assert!(!clock.pause());
    assert!(!clock.skip_forward());
    assert_eq!(clock.tick(100.0), TickOutcome::default());
    assert_eq!(clock.status(), PlaybackStatus::Stopped);
    assert_eq!(clock.current_target_pose().unwrap(), None);
    assert_eq!(clock.interpolation_t(), None);
    assert_eq!(clock.progress(), 0.0);
}

#[test]
fn test_ticks_land_between_keyframes() {
    let mut clock = PlaybackClock::new(create_test_sequence(vec![0.0, 100.0, 200.0]));
    assert!(clock.play());

    let first = clock.tick(60.0);
    assert!(!first.advanced);
    let second = clock.tick(90.0);
    assert!(second.advanced);
    assert!(!second.completed);

    let state = clock.state();
    assert_eq!(state.current_index, 1);
    assert_eq!(state.elapsed_ms, 150.0);
    assert!(state.running);
    assert_eq!(clock.interpolation_t(), Some(0.5));

    let target = clock.current_target_pose().unwrap().unwrap();
    assert_eq!(target.landmarks()[0].x, 1.5);
}

#[test]
fn test_completion_reported_once() {
    let mut clock = PlaybackClock::new(create_test_sequence(vec![0.0, 1000.0]));
    clock.play();

    let completions = (0..11)
        .map(|_| clock.tick(100.0))
        .filter(|outcome| outcome.completed)
        .count();

    assert_eq!(completions, 1);
    assert_eq!(clock.status(), PlaybackStatus::Stopped);
    assert_eq!(clock.state().current_index, 1);
    assert!(clock.is_finished());
    assert_eq!(clock.progress(), 1.0);
}

#[test]
fn test_large_tick_skips_keyframes() {
    let mut clock = PlaybackClock::new(create_test_sequence(vec![0.0, 10.0, 20.0, 30.0, 40.0]));
    clock.play();

    let outcome = clock.tick(25.0);
    assert!(outcome.advanced);
    assert_eq!(clock.state().current_index, 2);
}

#[test]
fn test_bad_deltas_are_ignored() {
    let mut clock = PlaybackClock::new(create_test_sequence(vec![0.0, 100.0]));
    clock.play();
    clock.tick(40.0);

    clock.tick(-25.0);
    clock.tick(f64::NAN);
    clock.tick(f64::INFINITY);

    assert_eq!(clock.state().elapsed_ms, 40.0);
    assert_eq!(clock.status(), PlaybackStatus::Playing);
}

#[test]
fn test_ticks_ignored_unless_playing() {
    let mut clock = PlaybackClock::new(create_test_sequence(vec![0.0, 100.0]));

    assert_eq!(clock.tick(50.0), TickOutcome::default());
    assert_eq!(clock.state().elapsed_ms, 0.0);

    clock.play();
    clock.tick(30.0);
    assert!(clock.pause());
    clock.tick(30.0);

    assert_eq!(clock.status(), PlaybackStatus::Paused);
    assert_eq!(clock.state().elapsed_ms, 30.0);
    assert!(!clock.state().running);
}

#[test]
fn test_play_is_idempotent() {
    let mut clock = PlaybackClock::new(create_test_sequence(vec![0.0, 100.0]));

    assert!(clock.play());
    assert!(!clock.play());
    clock.tick(20.0);
    assert!(clock.pause());
    assert!(!clock.pause());
    assert!(clock.play());
    assert_eq!(clock.state().elapsed_ms, 20.0);
}

#[test]
fn test_play_after_completion_restarts() {
    let mut clock = PlaybackClock::new(create_test_sequence(vec![0.0, 100.0]));
    clock.play();
    assert!(clock.tick(150.0).completed);

    assert!(clock.play());
    assert_eq!(clock.state().current_index, 0);
    assert_eq!(clock.state().elapsed_ms, 0.0);
    assert!(!clock.is_finished());
}

#[test]
fn test_skip_forward() {
    let mut clock = PlaybackClock::new(create_test_sequence(vec![0.0, 100.0, 250.0]));

    assert!(clock.skip_forward());
    assert_eq!(clock.state().current_index, 1);
    assert_eq!(clock.state().elapsed_ms, 100.0);
    assert_eq!(clock.interpolation_t(), Some(0.0));

    assert!(clock.skip_forward());
    assert_eq!(clock.state().elapsed_ms, 250.0);

    // Already on the final keyframe
    assert!(!clock.skip_forward());
    assert_eq!(clock.state().current_index, 2);
    assert_eq!(clock.state().elapsed_ms, 250.0);
}

#[test]
fn test_reset_from_any_state() {
    let sequence = create_test_sequence(vec![0.0, 100.0, 200.0]);

    let mut playing = PlaybackClock::new(Arc::clone(&sequence));
    playing.play();
    playing.tick(120.0);

    let mut paused = playing.clone();
    paused.pause();

    let mut completed = playing.clone();
    completed.tick(500.0);

    for mut clock in [playing, paused, completed, PlaybackClock::new(sequence)] {
        clock.reset();
        assert_eq!(
            clock.state(),
            PlaybackState {
                current_index: 0,
                elapsed_ms: 0.0,
                running: false,
            }
        );
        assert_eq!(clock.status(), PlaybackStatus::Stopped);
        assert!(!clock.is_finished());
    }
}

#[test]
fn test_single_keyframe_sequence() {
    let mut clock = PlaybackClock::new(create_test_sequence(vec![0.0]));

    assert_eq!(clock.interpolation_t(), Some(1.0));
    assert_eq!(clock.current_target_pose().unwrap(), Some(create_test_pose(0.0)));

    clock.play();
    let outcome = clock.tick(0.0);
    assert!(outcome.completed);
    assert!(!outcome.advanced);
}

#[test]
fn test_target_is_exact_on_keyframes() {
    let mut clock = PlaybackClock::new(create_test_sequence(vec![0.0, 33.3, 66.6]));
    clock.play();

    assert_eq!(clock.current_target_pose().unwrap(), Some(create_test_pose(0.0)));
    clock.tick(33.3);
    assert_eq!(clock.current_target_pose().unwrap(), Some(create_test_pose(1.0)));
}

#[test]
fn test_load_replaces_and_rewinds() {
    let mut clock = PlaybackClock::new(create_test_sequence(vec![0.0, 100.0]));
    clock.play();
    clock.tick(50.0);

    clock.load(create_test_sequence(vec![0.0, 10.0, 20.0]));

    assert_eq!(clock.status(), PlaybackStatus::Stopped);
    assert_eq!(clock.state().elapsed_ms, 0.0);
    assert_eq!(clock.sequence().map(|s| s.len()), Some(3));
}

#[test]
fn test_status_serializes() {
    let json = serde_json::to_string(&PlaybackStatus::Paused).unwrap();
    assert_eq!(json, "\"Paused\"");
}
