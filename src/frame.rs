use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Pixel layout of a decoded video frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameFormat {
    /// RGB24 format - uncompressed RGB data
    Rgb24,
    /// RGBA format - uncompressed RGB data with alpha, as canvases produce
    Rgba,
}

/// One image sampled from a video source, handed to the pose detector
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Sample number within its source
    pub index: u64,
    /// Offset of the frame from the start of the source
    pub position: Duration,
    /// Wall time the frame was captured or decoded
    pub captured_at: SystemTime,
    /// Raw frame data (shared ownership for efficiency)
    pub data: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
    pub format: FrameFormat,
}

impl VideoFrame {
    pub fn new(
        index: u64,
        position: Duration,
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: FrameFormat,
    ) -> Self {
        Self {
            index,
            position,
            captured_at: SystemTime::now(),
            data: Arc::new(data),
            width,
            height,
            format,
        }
    }

    /// Frame with no pixel data, for sources whose detector only needs timing
    pub fn empty(index: u64, position: Duration) -> Self {
        Self::new(index, position, Vec::new(), 0, 0, FrameFormat::Rgba)
    }

    /// Position in milliseconds
    pub fn position_ms(&self) -> f64 {
        self.position.as_secs_f64() * 1000.0
    }
}

/// Fixed-rate sampling plan over a finite source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSampler {
    fps: u32,
}

impl FrameSampler {
    pub const DEFAULT_FPS: u32 = 30;

    /// Sampler at `fps`; zero falls back to the default rate
    pub fn new(fps: u32) -> Self {
        Self {
            fps: if fps == 0 { Self::DEFAULT_FPS } else { fps },
        }
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps as f64)
    }

    /// Whole frames that fit in `duration`
    pub fn total_frames(&self, duration: Duration) -> u64 {
        (duration.as_secs_f64() * self.fps as f64).floor() as u64
    }

    /// Position of sample `index`
    pub fn position(&self, index: u64) -> Duration {
        Duration::from_secs_f64(index as f64 / self.fps as f64)
    }

    /// Every sample position within `duration`, in order
    pub fn positions(&self, duration: Duration) -> impl Iterator<Item = (u64, Duration)> + '_ {
        (0..self.total_frames(duration)).map(move |i| (i, self.position(i)))
    }
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FPS)
    }
}
