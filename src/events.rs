use crate::error::EventBusError;
use crate::playback::PlaybackStatus;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Events that can occur while extracting, playing back and scoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PosecoachEvent {
    /// Extraction started over a batch of sources
    ExtractionStarted { source_count: usize, fps: u32 },
    /// A source was opened and its sampling plan computed
    SourceOpened { source: String, total_frames: u64 },
    /// Periodic extraction progress within one source
    ExtractionProgress {
        source: String,
        frame: u64,
        total_frames: u64,
        percent: f64,
    },
    /// The detector found no body in a sampled frame
    FrameSkipped { source: String, frame: u64 },
    /// The detector failed on a sampled frame
    DetectorFailed {
        source: String,
        frame: u64,
        error: String,
    },
    /// A source could not be read; the rest of it was abandoned
    SourceFailed { source: String, error: String },
    /// Extraction produced a sequence
    ExtractionCompleted {
        name: String,
        pose_count: usize,
        frames_sampled: u64,
    },
    /// A sequence became the active playback target
    SequenceLoaded {
        name: String,
        pose_count: usize,
        duration_ms: f64,
    },
    /// Transport state changed
    PlaybackStateChanged {
        status: PlaybackStatus,
        index: usize,
        elapsed_ms: f64,
    },
    /// Playback reached the final keyframe
    PlaybackCompleted {
        sequence: String,
        timestamp: SystemTime,
    },
    /// A live sample was scored against the interpolated target
    ScoreUpdated {
        score: f64,
        target_index: usize,
        captured_at: SystemTime,
    },
    /// A live sample arrived older than the latest accepted one
    SampleDiscarded {
        captured_at: SystemTime,
        latest_accepted: SystemTime,
    },
}

impl PosecoachEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            PosecoachEvent::ExtractionStarted { source_count, fps } => {
                format!("Extracting poses from {} source(s) at {} fps", source_count, fps)
            }
            PosecoachEvent::SourceOpened {
                source,
                total_frames,
            } => {
                format!("Opened {}: {} frames to process", source, total_frames)
            }
            PosecoachEvent::ExtractionProgress {
                source,
                frame,
                total_frames,
                percent,
            } => {
                format!(
                    "Processed frame {}/{} of {} ({:.1}%)",
                    frame, total_frames, source, percent
                )
            }
            PosecoachEvent::FrameSkipped { source, frame } => {
                format!("No pose detected in frame {} of {}", frame, source)
            }
            PosecoachEvent::DetectorFailed {
                source,
                frame,
                error,
            } => {
                format!("Detector failed on frame {} of {}: {}", frame, source, error)
            }
            PosecoachEvent::SourceFailed { source, error } => {
                format!("Source {} failed: {}", source, error)
            }
            PosecoachEvent::ExtractionCompleted {
                name,
                pose_count,
                frames_sampled,
            } => {
                format!(
                    "Extracted {} poses from {} frames into '{}'",
                    pose_count, frames_sampled, name
                )
            }
            PosecoachEvent::SequenceLoaded {
                name,
                pose_count,
                duration_ms,
            } => {
                format!(
                    "Loaded sequence '{}' ({} poses, {:.0} ms)",
                    name, pose_count, duration_ms
                )
            }
            PosecoachEvent::PlaybackStateChanged {
                status,
                index,
                elapsed_ms,
            } => {
                format!(
                    "Playback {:?} at keyframe {} ({:.0} ms)",
                    status, index, elapsed_ms
                )
            }
            PosecoachEvent::PlaybackCompleted { sequence, .. } => {
                format!("Playback of '{}' completed", sequence)
            }
            PosecoachEvent::ScoreUpdated {
                score,
                target_index,
                ..
            } => {
                format!("Similarity {:.1}% near keyframe {}", score, target_index)
            }
            PosecoachEvent::SampleDiscarded { .. } => "Stale live sample discarded".to_string(),
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            PosecoachEvent::ExtractionStarted { .. } => "extraction_started",
            PosecoachEvent::SourceOpened { .. } => "source_opened",
            PosecoachEvent::ExtractionProgress { .. } => "extraction_progress",
            PosecoachEvent::FrameSkipped { .. } => "frame_skipped",
            PosecoachEvent::DetectorFailed { .. } => "detector_failed",
            PosecoachEvent::SourceFailed { .. } => "source_failed",
            PosecoachEvent::ExtractionCompleted { .. } => "extraction_completed",
            PosecoachEvent::SequenceLoaded { .. } => "sequence_loaded",
            PosecoachEvent::PlaybackStateChanged { .. } => "playback_state_changed",
            PosecoachEvent::PlaybackCompleted { .. } => "playback_completed",
            PosecoachEvent::ScoreUpdated { .. } => "score_updated",
            PosecoachEvent::SampleDiscarded { .. } => "sample_discarded",
        }
    }
}

/// Async event bus for component coordination using broadcast channels
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PosecoachEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<PosecoachEvent> {
        self.sender.subscribe()
    }

    /// Subscribe with a filter applied on receipt
    pub fn subscribe_filtered(&self, filter: EventFilter, name: &str) -> EventReceiver {
        EventReceiver::new(self.subscribe(), filter, name.to_string())
    }

    /// Publish an event to all subscribers
    pub async fn publish(&self, event: PosecoachEvent) -> Result<usize, EventBusError> {
        // Log important events at appropriate levels
        match &event {
            PosecoachEvent::ExtractionCompleted { .. }
            | PosecoachEvent::SequenceLoaded { .. }
            | PosecoachEvent::PlaybackCompleted { .. } => {
                info!("{}", event.description());
            }
            PosecoachEvent::SourceFailed { .. } | PosecoachEvent::DetectorFailed { .. } => {
                warn!("{}", event.description());
            }
            _ => debug!("Event: {}", event.description()),
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Publish without caring whether anyone is listening
    pub async fn emit(&self, event: PosecoachEvent) {
        if let Err(e) = self.publish(event).await {
            debug!("Event dropped: {}", e);
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Check if there are any active subscribers
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
}

impl EventFilter {
    /// Extraction progress and per-frame/per-source outcomes
    pub fn extraction() -> Self {
        EventFilter::EventTypes(vec![
            "extraction_started",
            "source_opened",
            "extraction_progress",
            "frame_skipped",
            "detector_failed",
            "source_failed",
            "extraction_completed",
        ])
    }

    /// Check if an event passes this filter
    pub fn matches(&self, event: &PosecoachEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
        }
    }
}

/// Event receiver with filtering capabilities
pub struct EventReceiver {
    receiver: broadcast::Receiver<PosecoachEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    /// Create a new event receiver with a filter
    pub fn new(
        receiver: broadcast::Receiver<PosecoachEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event
    pub async fn recv(&mut self) -> Result<PosecoachEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!(
                            "Receiver '{}' received event: {}",
                            self.name,
                            event.description()
                        );
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::PublishFailed {
                        details: format!("Receiver lagged behind by {} events", n),
                    });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Option<PosecoachEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => {
                    return Ok(None);
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::PublishFailed {
                        details: format!("Receiver lagged behind by {} events", n),
                    });
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Everything currently queued that passes the filter
    pub fn drain(&mut self) -> Vec<PosecoachEvent> {
        let mut events = Vec::new();
        while let Ok(Some(event)) = self.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Bounded history of events with per-type counts
#[derive(Debug, Default)]
pub struct EventRecorder {
    history: VecDeque<PosecoachEvent>,
    max_history: usize,
    counts: HashMap<&'static str, u64>,
}

impl EventRecorder {
    pub fn new(max_history: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(max_history),
            max_history,
            counts: HashMap::new(),
        }
    }

    pub fn record_event(&mut self, event: PosecoachEvent) {
        *self.counts.entry(event.event_type()).or_insert(0) += 1;

        self.history.push_back(event);
        while self.history.len() > self.max_history {
            self.history.pop_front();
        }
    }

    pub fn count(&self, event_type: &str) -> u64 {
        self.counts.get(event_type).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Most recent events of a type, newest first
    pub fn recent(&self, event_type: &str, count: usize) -> Vec<&PosecoachEvent> {
        self.history
            .iter()
            .rev()
            .filter(|e| e.event_type() == event_type)
            .take(count)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_event_bus_basic_operations() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let event = PosecoachEvent::ScoreUpdated {
            score: 87.5,
            target_index: 3,
            captured_at: SystemTime::now(),
        };

        let subscriber_count = event_bus.publish(event).await.unwrap();
        assert_eq!(subscriber_count, 1);

        match receiver.recv().await.unwrap() {
            PosecoachEvent::ScoreUpdated { score, target_index, .. } => {
                assert_eq!(score, 87.5);
                assert_eq!(target_index, 3);
            }
            _ => panic!("Unexpected event type"),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let event_bus = EventBus::new(10);
        assert!(!event_bus.has_subscribers());

        let event = PosecoachEvent::SourceFailed {
            source: "a.mp4".to_string(),
            error: "gone".to_string(),
        };
        assert!(event_bus.publish(event.clone()).await.is_err());

        // emit swallows the missing audience
        event_bus.emit(event).await;
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let event_bus = EventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();

        assert_eq!(event_bus.subscriber_count(), 2);

        event_bus
            .publish(PosecoachEvent::PlaybackCompleted {
                sequence: "waltz".to_string(),
                timestamp: SystemTime::now(),
            })
            .await
            .unwrap();

        let _ = timeout(Duration::from_millis(100), receiver1.recv())
            .await
            .unwrap()
            .unwrap();
        let _ = timeout(Duration::from_millis(100), receiver2.recv())
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_filtered_receiver() {
        let event_bus = EventBus::new(10);
        let mut filtered = event_bus.subscribe_filtered(EventFilter::extraction(), "test");

        event_bus
            .publish(PosecoachEvent::ScoreUpdated {
                score: 50.0,
                target_index: 0,
                captured_at: SystemTime::now(),
            })
            .await
            .unwrap();
        event_bus
            .publish(PosecoachEvent::FrameSkipped {
                source: "clip.mp4".to_string(),
                frame: 12,
            })
            .await
            .unwrap();

        let received = timeout(Duration::from_millis(100), filtered.recv())
            .await
            .unwrap()
            .unwrap();
        match received {
            PosecoachEvent::FrameSkipped { frame, .. } => assert_eq!(frame, 12),
            other => panic!("Unexpected event: {:?}", other),
        }
        assert!(filtered.drain().is_empty());
    }

    #[test]
    fn test_extraction_filter() {
        let filter = EventFilter::extraction();

        assert!(filter.matches(&PosecoachEvent::DetectorFailed {
            source: "clip.mp4".to_string(),
            frame: 3,
            error: "pose contains a non-finite landmark value".to_string(),
        }));
        assert!(!filter.matches(&PosecoachEvent::SampleDiscarded {
            captured_at: SystemTime::UNIX_EPOCH,
            latest_accepted: SystemTime::UNIX_EPOCH,
        }));
        assert!(EventFilter::All.matches(&PosecoachEvent::SampleDiscarded {
            captured_at: SystemTime::UNIX_EPOCH,
            latest_accepted: SystemTime::UNIX_EPOCH,
        }));
    }

    #[test]
    fn test_event_properties() {
        let event = PosecoachEvent::ExtractionProgress {
            source: "clip.mp4".to_string(),
            frame: 30,
            total_frames: 120,
            percent: 25.0,
        };

        assert_eq!(event.event_type(), "extraction_progress");
        assert!(event.description().contains("30/120"));
        assert!(event.description().contains("25.0%"));
    }

    #[test]
    fn test_event_recorder() {
        let mut recorder = EventRecorder::new(2);
        for frame in 0..3 {
            recorder.record_event(PosecoachEvent::FrameSkipped {
                source: "clip".to_string(),
                frame,
            });
        }

        assert_eq!(recorder.count("frame_skipped"), 3);
        assert_eq!(recorder.total(), 3);

        let recent = recorder.recent("frame_skipped", 5);
        assert_eq!(recent.len(), 2);
        match recent[0] {
            PosecoachEvent::FrameSkipped { frame, .. } => assert_eq!(*frame, 2),
            other => panic!("Unexpected event: {:?}", other),
        }
    }
}
