use super::interface::{FrameSource, PoseDetector};
use crate::error::{PosecoachError, Result};
use crate::frame::VideoFrame;
use crate::pose::Pose;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// What a [`ScriptedDetector`] answers for one call
#[derive(Debug, Clone)]
pub enum DetectorResponse {
    Detected(Pose),
    NoDetection,
    Fail(String),
}

/// Detector that replays a fixed list of answers, for running the pipeline
/// and sessions without a model
pub struct ScriptedDetector {
    responses: Mutex<VecDeque<DetectorResponse>>,
    fallback: DetectorResponse,
    latency: Option<Duration>,
    calls: AtomicU64,
}

impl ScriptedDetector {
    /// Answers `responses` in call order, then `fallback` forever
    pub fn new(responses: Vec<DetectorResponse>, fallback: DetectorResponse) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            fallback,
            latency: None,
            calls: AtomicU64::new(0),
        }
    }

    /// Always finds `pose`
    pub fn always(pose: Pose) -> Self {
        Self::new(Vec::new(), DetectorResponse::Detected(pose))
    }

    /// Never finds a body
    pub fn blind() -> Self {
        Self::new(Vec::new(), DetectorResponse::NoDetection)
    }

    /// Delay every answer, to simulate model inference time
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PoseDetector for ScriptedDetector {
    async fn detect(&self, frame: &VideoFrame) -> Result<Option<Pose>> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let response = self
            .responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        debug!("Scripted detector answering frame {}: {:?}", frame.index, response);

        match response {
            DetectorResponse::Detected(pose) => Ok(Some(pose)),
            DetectorResponse::NoDetection => Ok(None),
            DetectorResponse::Fail(details) => Err(PosecoachError::detector(details)),
        }
    }
}

/// In-memory stand-in for a video file or camera
pub struct MockVideoSource {
    descriptor: String,
    duration: Option<Duration>,
    fail_at_frame: Option<u64>,
    frames_read: u64,
    released: Arc<AtomicBool>,
}

impl MockVideoSource {
    /// Stored video of the given length
    pub fn clip(descriptor: &str, duration: Duration) -> Self {
        Self {
            descriptor: descriptor.to_string(),
            duration: Some(duration),
            fail_at_frame: None,
            frames_read: 0,
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Unbounded live camera
    pub fn live(descriptor: &str) -> Self {
        Self {
            duration: None,
            ..Self::clip(descriptor, Duration::ZERO)
        }
    }

    /// Fail reading the frame at `index`
    pub fn failing_at(mut self, index: u64) -> Self {
        self.fail_at_frame = Some(index);
        self
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Flag that flips once the pipeline releases this source
    pub fn released_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.released)
    }
}

#[async_trait]
impl FrameSource for MockVideoSource {
    fn descriptor(&self) -> &str {
        &self.descriptor
    }

    async fn duration(&mut self) -> Result<Option<Duration>> {
        Ok(self.duration)
    }

    async fn frame_at(&mut self, index: u64, position: Duration) -> Result<VideoFrame> {
        if self.fail_at_frame == Some(index) {
            return Err(PosecoachError::frame_source(
                self.descriptor.clone(),
                format!("decode failed at frame {}", index),
            ));
        }
        self.frames_read += 1;
        Ok(VideoFrame::empty(index, position))
    }

    async fn release(&mut self) -> Result<()> {
        self.released.store(true, Ordering::Relaxed);
        Ok(())
    }
}
