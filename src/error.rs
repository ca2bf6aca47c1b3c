use thiserror::Error;

#[derive(Error, Debug)]
pub enum PosecoachError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Pose landmark counts differ: expected {expected}, got {actual}")]
    SequenceMismatch { expected: usize, actual: usize },

    #[error("Malformed sequence file: {reason}")]
    MalformedSequenceFile { reason: String },

    #[error("Operation would run over an empty pose sequence")]
    EmptySequence,

    #[error("Detector returned no landmarks")]
    DetectionUnavailable,

    #[error("Invalid weight {weight} for landmark {landmark}")]
    InvalidWeight { landmark: String, weight: f64 },

    #[error("Detector error: {details}")]
    Detector { details: String },

    #[error("Frame source '{source_name}' error: {details}")]
    Source { source_name: String, details: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl PosecoachError {
    pub fn component<C: Into<String>, M: Into<String>>(component: C, message: M) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn malformed<S: Into<String>>(reason: S) -> Self {
        Self::MalformedSequenceFile {
            reason: reason.into(),
        }
    }

    pub fn detector<S: Into<String>>(details: S) -> Self {
        Self::Detector {
            details: details.into(),
        }
    }

    pub fn frame_source<N: Into<String>, D: Into<String>>(source_name: N, details: D) -> Self {
        Self::Source {
            source_name: source_name.into(),
            details: details.into(),
        }
    }
}

/// Event bus failures
#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Event channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, PosecoachError>;
