use crate::config::PosecoachConfig;
use crate::detector::{require_pose, PoseDetector};
use crate::error::{PosecoachError, Result};
use crate::events::{EventBus, PosecoachEvent};
use crate::frame::VideoFrame;
use crate::playback::{PlaybackClock, PlaybackState, PlaybackStatus, TickOutcome};
use crate::pose::{LiveDetectionSample, Pose};
use crate::scoring::{ScoreStats, SimilarityScorer};
use crate::sequence::{self, PoseSequence};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

/// A live sample scored against the target pose
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreUpdate {
    pub score: f64,
    pub target_index: usize,
    pub interpolation_t: f64,
    pub captured_at: SystemTime,
}

/// What happened to one live detection
#[derive(Debug, Clone, PartialEq)]
pub enum SampleOutcome {
    Scored(ScoreUpdate),
    /// Captured before the most recently accepted sample
    Stale { latest_accepted: SystemTime },
    /// The detector found no body in the frame
    NoDetection,
    /// Nothing loaded to score against
    NoTarget,
    /// The session shut down before the sample could be scored
    Cancelled,
}

struct SessionState {
    clock: PlaybackClock,
    latest_accepted: Option<SystemTime>,
    stats: ScoreStats,
    ticker: Option<CancellationToken>,
}

impl SessionState {
    fn stop_ticker(&mut self) {
        if let Some(token) = self.ticker.take() {
            token.cancel();
        }
    }
}

/// One learner practicing against one loaded sequence.
///
/// Owns the playback clock and drives it from a periodic tick task while
/// playing. Live samples are scored against whatever target pose the clock
/// reports at the moment they arrive.
pub struct PracticeSession {
    id: Uuid,
    state: Arc<Mutex<SessionState>>,
    scorer: SimilarityScorer,
    event_bus: Arc<EventBus>,
    tick_interval: Duration,
    cancellation_token: CancellationToken,
}

impl PracticeSession {
    pub fn new(config: &PosecoachConfig, event_bus: Arc<EventBus>) -> Self {
        let tick_rate = config.playback.tick_rate_hz.max(1);
        let id = Uuid::new_v4();
        debug!("Creating practice session {} ticking at {} Hz", id, tick_rate);

        Self {
            id,
            state: Arc::new(Mutex::new(SessionState {
                clock: PlaybackClock::empty(),
                latest_accepted: None,
                stats: ScoreStats::default(),
                ticker: None,
            })),
            scorer: SimilarityScorer::from_config(&config.scoring),
            event_bus,
            tick_interval: Duration::from_secs_f64(1.0 / f64::from(tick_rate)),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Replace the scorer built from configuration
    pub fn with_scorer(mut self, scorer: SimilarityScorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation_token
    }

    /// Make `sequence` the active target. Playback stops and rewinds.
    pub async fn load_sequence(&self, sequence: Arc<PoseSequence>) {
        {
            let mut state = self.state.lock();
            state.stop_ticker();
            state.clock.load(Arc::clone(&sequence));
            state.stats.reset();
        }

        info!(
            "Session {} loaded '{}' ({} poses, {:.0} ms)",
            self.id,
            sequence.name(),
            sequence.len(),
            sequence.duration_ms()
        );
        self.event_bus
            .emit(PosecoachEvent::SequenceLoaded {
                name: sequence.name().to_string(),
                pose_count: sequence.len(),
                duration_ms: sequence.duration_ms(),
            })
            .await;
    }

    /// Decode and load a serialized sequence. A document that fails to
    /// decode leaves the current sequence in place.
    pub async fn load_sequence_bytes(&self, bytes: &[u8]) -> Result<Arc<PoseSequence>> {
        let sequence = Arc::new(sequence::deserialize(bytes)?);
        self.load_sequence(Arc::clone(&sequence)).await;
        Ok(sequence)
    }

    pub async fn load_sequence_file<P: AsRef<Path>>(&self, path: P) -> Result<Arc<PoseSequence>> {
        let sequence = Arc::new(sequence::load_file(path).await?);
        self.load_sequence(Arc::clone(&sequence)).await;
        Ok(sequence)
    }

    pub fn sequence(&self) -> Option<Arc<PoseSequence>> {
        self.state.lock().clock.sequence().cloned()
    }

    /// Start or resume playback and the tick task
    pub async fn play(&self) -> bool {
        if self.cancellation_token.is_cancelled() {
            return false;
        }

        let (started, snapshot) = {
            let mut state = self.state.lock();
            let started = state.clock.play();
            if started {
                state.stop_ticker();
                let token = self.cancellation_token.child_token();
                self.spawn_ticker(token.clone());
                state.ticker = Some(token);
            }
            (started, state.clock.state())
        };

        if started {
            self.publish_state(PlaybackStatus::Playing, snapshot).await;
        }
        started
    }

    pub async fn pause(&self) -> bool {
        let (paused, snapshot) = {
            let mut state = self.state.lock();
            let paused = state.clock.pause();
            if paused {
                state.stop_ticker();
            }
            (paused, state.clock.state())
        };

        if paused {
            self.publish_state(PlaybackStatus::Paused, snapshot).await;
        }
        paused
    }

    /// Rewind to the first keyframe and stop. Clears the session scores.
    pub async fn reset(&self) {
        let snapshot = {
            let mut state = self.state.lock();
            state.stop_ticker();
            state.clock.reset();
            state.stats.reset();
            state.clock.state()
        };
        self.publish_state(PlaybackStatus::Stopped, snapshot).await;
    }

    pub async fn skip_forward(&self) -> bool {
        let (skipped, status, snapshot) = {
            let mut state = self.state.lock();
            let skipped = state.clock.skip_forward();
            (skipped, state.clock.status(), state.clock.state())
        };

        if skipped {
            self.publish_state(status, snapshot).await;
        }
        skipped
    }

    /// Advance the clock by hand, for hosts that own the frame clock
    pub async fn advance(&self, delta_ms: f64) -> TickOutcome {
        let (outcome, name) = {
            let mut state = self.state.lock();
            let outcome = state.clock.tick(delta_ms);
            if outcome.completed {
                state.stop_ticker();
            }
            (outcome, sequence_name(&state.clock))
        };

        if outcome.completed {
            publish_completed(&self.event_bus, name).await;
        }
        outcome
    }

    /// Score a live detection against the current target pose.
    ///
    /// Samples captured before the most recently accepted one are discarded
    /// so late detector results never overwrite a newer score.
    pub async fn submit_sample(&self, sample: LiveDetectionSample) -> Result<SampleOutcome> {
        if self.cancellation_token.is_cancelled() {
            return Ok(SampleOutcome::Cancelled);
        }

        let outcome = {
            let mut state = self.state.lock();
            match state.latest_accepted {
                Some(latest) if sample.captured_at < latest => {
                    state.stats.record_discarded();
                    SampleOutcome::Stale {
                        latest_accepted: latest,
                    }
                }
                _ => match state.clock.current_target_pose()? {
                    None => SampleOutcome::NoTarget,
                    Some(target) => {
                        let score = self.scorer.score(&sample.pose, &target)?;
                        let playback = state.clock.state();
                        state.latest_accepted = Some(sample.captured_at);
                        state.stats.record_score(score);
                        SampleOutcome::Scored(ScoreUpdate {
                            score,
                            target_index: playback.current_index,
                            interpolation_t: state.clock.interpolation_t().unwrap_or(1.0),
                            captured_at: sample.captured_at,
                        })
                    }
                },
            }
        };

        match &outcome {
            SampleOutcome::Scored(update) => {
                debug!(
                    "Score {:.1} against keyframe {} (t={:.2})",
                    update.score, update.target_index, update.interpolation_t
                );
                self.event_bus
                    .emit(PosecoachEvent::ScoreUpdated {
                        score: update.score,
                        target_index: update.target_index,
                        captured_at: update.captured_at,
                    })
                    .await;
            }
            SampleOutcome::Stale { latest_accepted } => {
                debug!("Discarding stale sample");
                self.event_bus
                    .emit(PosecoachEvent::SampleDiscarded {
                        captured_at: sample.captured_at,
                        latest_accepted: *latest_accepted,
                    })
                    .await;
            }
            _ => {}
        }

        Ok(outcome)
    }

    /// Run the detector on a live frame and score the result.
    ///
    /// Shutting the session down abandons an in-flight detection.
    pub async fn detect_and_score<D>(&self, detector: &D, frame: &VideoFrame) -> Result<SampleOutcome>
    where
        D: PoseDetector + ?Sized,
    {
        let detection = tokio::select! {
            _ = self.cancellation_token.cancelled() => {
                debug!("Detection for frame {} abandoned on shutdown", frame.index);
                return Ok(SampleOutcome::Cancelled);
            }
            detection = detector.detect(frame) => detection,
        };

        match detection.and_then(require_pose) {
            Ok(pose) => {
                self.submit_sample(LiveDetectionSample::new(pose, frame.captured_at))
                    .await
            }
            Err(PosecoachError::DetectionUnavailable) => Ok(SampleOutcome::NoDetection),
            Err(e) => Err(e),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state.lock().clock.state()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.state.lock().clock.status()
    }

    pub fn progress(&self) -> f64 {
        self.state.lock().clock.progress()
    }

    pub fn current_target_pose(&self) -> Result<Option<Pose>> {
        self.state.lock().clock.current_target_pose()
    }

    pub fn stats(&self) -> ScoreStats {
        self.state.lock().stats.clone()
    }

    /// Whether the background tick task is driving the clock
    pub fn is_ticking(&self) -> bool {
        self.state.lock().ticker.is_some()
    }

    /// Stop the tick task and any in-flight detection. Idempotent.
    pub fn shutdown(&self) {
        if self.cancellation_token.is_cancelled() {
            return;
        }
        info!("Shutting down practice session {}", self.id);
        self.cancellation_token.cancel();
        self.state.lock().stop_ticker();
    }

    fn spawn_ticker(&self, token: CancellationToken) {
        let state = Arc::clone(&self.state);
        let event_bus = Arc::clone(&self.event_bus);
        let period = self.tick_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;
            let mut last_tick = Instant::now();

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("Tick task stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        let now = Instant::now();
                        let delta_ms = now.duration_since(last_tick).as_secs_f64() * 1000.0;
                        last_tick = now;

                        let (outcome, name) = {
                            let mut state = state.lock();
                            if token.is_cancelled() {
                                break;
                            }
                            let outcome = state.clock.tick(delta_ms);
                            if outcome.completed {
                                state.ticker = None;
                            }
                            (outcome, sequence_name(&state.clock))
                        };

                        if outcome.completed {
                            publish_completed(&event_bus, name).await;
                            break;
                        }
                    }
                }
            }
        });
    }

    async fn publish_state(&self, status: PlaybackStatus, snapshot: PlaybackState) {
        self.event_bus
            .emit(PosecoachEvent::PlaybackStateChanged {
                status,
                index: snapshot.current_index,
                elapsed_ms: snapshot.elapsed_ms,
            })
            .await;
    }
}

impl Drop for PracticeSession {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}

fn sequence_name(clock: &PlaybackClock) -> String {
    clock
        .sequence()
        .map(|sequence| sequence.name().to_string())
        .unwrap_or_default()
}

async fn publish_completed(event_bus: &EventBus, sequence: String) {
    event_bus
        .emit(PosecoachEvent::PlaybackCompleted {
            sequence,
            timestamp: SystemTime::now(),
        })
        .await;
}
