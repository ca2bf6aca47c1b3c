use crate::error::{PosecoachError, Result};
use crate::pose::Pose;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provenance of a recorded sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceMetadata {
    #[serde(alias = "timestamp")]
    pub created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
}

impl SequenceMetadata {
    pub fn new(video_source: Option<String>, fps: Option<f64>) -> Self {
        Self {
            created: Utc::now(),
            video_source,
            fps,
        }
    }
}

impl Default for SequenceMetadata {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// A named, timed recording of keyframe poses.
///
/// Always valid once constructed: one timing entry per pose, timing starts
/// at 0 ms and strictly increases, and every pose has the same landmark
/// count.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseSequence {
    name: String,
    poses: Vec<Pose>,
    timing: Vec<f64>,
    metadata: SequenceMetadata,
}

impl PoseSequence {
    pub fn new(
        name: impl Into<String>,
        poses: Vec<Pose>,
        timing: Vec<f64>,
        metadata: SequenceMetadata,
    ) -> Result<Self> {
        validate(&poses, &timing)?;
        Ok(Self {
            name: name.into(),
            poses,
            timing,
            metadata,
        })
    }

    /// Build a sequence whose keyframes are evenly spaced at `fps`
    pub fn from_frame_rate(
        name: impl Into<String>,
        poses: Vec<Pose>,
        fps: f64,
        metadata: SequenceMetadata,
    ) -> Result<Self> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(PosecoachError::malformed(format!(
                "frame rate must be positive, got {}",
                fps
            )));
        }
        let timing = frame_timestamps(poses.len(), fps);
        Self::new(name, poses, timing, metadata)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn poses(&self) -> &[Pose] {
        &self.poses
    }

    pub fn timing(&self) -> &[f64] {
        &self.timing
    }

    pub fn metadata(&self) -> &SequenceMetadata {
        &self.metadata
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    /// Whether the sequence has no poses
    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    pub fn last_index(&self) -> usize {
        self.poses.len() - 1
    }

    /// Timestamp of the final keyframe in milliseconds
    pub fn duration_ms(&self) -> f64 {
        self.timing[self.last_index()]
    }

    pub fn landmark_count(&self) -> usize {
        self.poses[0].len()
    }
}

/// Evenly spaced keyframe times: `index * (1000 / fps)` milliseconds
pub fn frame_timestamps(count: usize, fps: f64) -> Vec<f64> {
    let interval = 1000.0 / fps;
    (0..count).map(|i| i as f64 * interval).collect()
}

fn validate(poses: &[Pose], timing: &[f64]) -> Result<()> {
    if poses.is_empty() {
        return Err(PosecoachError::malformed("sequence has no poses"));
    }

    if poses.len() != timing.len() {
        return Err(PosecoachError::malformed(format!(
            "{} poses but {} timing entries",
            poses.len(),
            timing.len()
        )));
    }

    if timing[0] != 0.0 {
        return Err(PosecoachError::malformed(format!(
            "first timestamp must be 0, got {}",
            timing[0]
        )));
    }

    for (i, pair) in timing.windows(2).enumerate() {
        if !pair[1].is_finite() || pair[1] <= pair[0] {
            return Err(PosecoachError::malformed(format!(
                "timing must strictly increase: entry {} is {} after {}",
                i + 1,
                pair[1],
                pair[0]
            )));
        }
    }

    let expected = poses[0].len();
    for (i, pose) in poses.iter().enumerate() {
        if pose.len() != expected {
            return Err(PosecoachError::malformed(format!(
                "pose {} has {} landmarks, expected {}",
                i,
                pose.len(),
                expected
            )));
        }

        if !pose.is_finite() {
            return Err(PosecoachError::malformed(format!(
                "pose {} contains a non-finite landmark value",
                i
            )));
        }
    }

    Ok(())
}
