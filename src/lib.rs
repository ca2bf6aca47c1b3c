pub mod config;
pub mod detector;
pub mod error;
pub mod events;
pub mod extraction;
pub mod frame;
pub mod interpolate;
pub mod playback;
pub mod pose;
pub mod scoring;
pub mod sequence;
pub mod session;

pub use config::PosecoachConfig;
pub use detector::{FrameSource, PoseDetector};
pub use error::{EventBusError, PosecoachError, Result};
pub use events::{EventBus, EventFilter, EventReceiver, EventRecorder, PosecoachEvent};
pub use extraction::{ExtractionPipeline, ExtractionStats};
pub use frame::{FrameFormat, FrameSampler, VideoFrame};
pub use interpolate::interpolate;
pub use playback::{PlaybackClock, PlaybackState, PlaybackStatus, TickOutcome};
pub use pose::{BodyLandmark, Landmark, LiveDetectionSample, Pose, WeightMap, POSE_LANDMARK_COUNT};
pub use scoring::{score, ScoreStats, SimilarityScorer};
pub use sequence::{PoseSequence, SequenceMetadata, SequenceStore};
pub use session::{PracticeSession, SampleOutcome, ScoreUpdate};
