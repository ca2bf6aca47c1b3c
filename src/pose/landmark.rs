use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// One estimated anatomical point with its detection confidence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Detection confidence in `0..1`; legacy recordings may omit it
    #[serde(default = "default_visibility")]
    pub visibility: f64,
}

fn default_visibility() -> f64 {
    1.0
}

impl Landmark {
    pub fn new(x: f64, y: f64, z: f64, visibility: f64) -> Self {
        Self { x, y, z, visibility }
    }

    /// Euclidean distance between the two positions, ignoring visibility
    pub fn distance(&self, other: &Landmark) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    pub fn is_visible(&self, threshold: f64) -> bool {
        self.visibility >= threshold
    }

    /// Whether every component is a finite number
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite() && self.visibility.is_finite()
    }
}

/// Full set of landmarks for one instant, indexed by anatomical position
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pose {
    landmarks: Vec<Landmark>,
}

impl Pose {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Self { landmarks }
    }

    pub fn landmarks(&self) -> &[Landmark] {
        &self.landmarks
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.landmarks.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Landmark> {
        self.landmarks.iter()
    }

    pub fn into_landmarks(self) -> Vec<Landmark> {
        self.landmarks
    }

    pub fn is_finite(&self) -> bool {
        self.landmarks.iter().all(Landmark::is_finite)
    }
}

impl From<Vec<Landmark>> for Pose {
    fn from(landmarks: Vec<Landmark>) -> Self {
        Self::new(landmarks)
    }
}

impl FromIterator<Landmark> for Pose {
    fn from_iter<I: IntoIterator<Item = Landmark>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Pose {
    type Item = &'a Landmark;
    type IntoIter = std::slice::Iter<'a, Landmark>;

    fn into_iter(self) -> Self::IntoIter {
        self.landmarks.iter()
    }
}

/// A pose delivered by the live detector, scored once and dropped
#[derive(Debug, Clone)]
pub struct LiveDetectionSample {
    pub pose: Pose,
    pub captured_at: SystemTime,
}

impl LiveDetectionSample {
    pub fn new(pose: Pose, captured_at: SystemTime) -> Self {
        Self { pose, captured_at }
    }

    /// Sample stamped with the current wall time
    pub fn now(pose: Pose) -> Self {
        Self::new(pose, SystemTime::now())
    }
}
