use crate::error::{PosecoachError, Result};
use crate::frame::VideoFrame;
use crate::pose::Pose;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Pose estimation model.
///
/// `Ok(None)` means the model ran but found no body in the frame. `Err`
/// is reserved for the model itself failing.
#[async_trait]
pub trait PoseDetector: Send + Sync {
    async fn detect(&self, frame: &VideoFrame) -> Result<Option<Pose>>;
}

#[async_trait]
impl<D: PoseDetector + ?Sized> PoseDetector for Arc<D> {
    async fn detect(&self, frame: &VideoFrame) -> Result<Option<Pose>> {
        (**self).detect(frame).await
    }
}

/// Turn a detector answer into a pose, with an empty answer as
/// `DetectionUnavailable`
pub fn require_pose(detection: Option<Pose>) -> Result<Pose> {
    detection.ok_or(PosecoachError::DetectionUnavailable)
}

/// Ordered, timestamped frames from a stored video or a live camera.
///
/// Stored video reports a finite duration and can be read at any position.
/// A live camera reports `None` and is not seekable.
#[async_trait]
pub trait FrameSource: Send {
    /// Human readable origin, e.g. a file name
    fn descriptor(&self) -> &str;

    async fn duration(&mut self) -> Result<Option<Duration>>;

    async fn frame_at(&mut self, index: u64, position: Duration) -> Result<VideoFrame>;

    /// Release the underlying handle. Called once the source is done with,
    /// whether or not reading succeeded.
    async fn release(&mut self) -> Result<()> {
        Ok(())
    }
}
