use super::body::{BodyLandmark, POSE_LANDMARK_COUNT};
use crate::error::{PosecoachError, Result};
use std::sync::OnceLock;

/// Per-landmark score multipliers. Landmarks without an entry weigh 1.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightMap {
    weights: [f64; POSE_LANDMARK_COUNT],
}

impl WeightMap {
    /// Build a map from explicit entries; every weight must be finite and positive
    pub fn new<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (BodyLandmark, f64)>,
    {
        let mut weights = [1.0; POSE_LANDMARK_COUNT];
        for (landmark, weight) in entries {
            if !weight.is_finite() || weight <= 0.0 {
                return Err(PosecoachError::InvalidWeight {
                    landmark: landmark.to_string(),
                    weight,
                });
            }
            weights[landmark.index()] = weight;
        }
        Ok(Self { weights })
    }

    /// Every landmark weighted equally
    pub fn uniform() -> Self {
        Self {
            weights: [1.0; POSE_LANDMARK_COUNT],
        }
    }

    /// Torso and major limb joints emphasised over the face and extremities
    pub fn standard() -> &'static WeightMap {
        static STANDARD: OnceLock<WeightMap> = OnceLock::new();
        STANDARD.get_or_init(|| {
            let mut weights = [1.0; POSE_LANDMARK_COUNT];
            for (landmark, weight) in STANDARD_WEIGHTS {
                weights[landmark.index()] = *weight;
            }
            WeightMap { weights }
        })
    }

    pub fn weight(&self, landmark: BodyLandmark) -> f64 {
        self.weights[landmark.index()]
    }

    /// Weight for a raw pose index; indices past the body layout weigh 1
    pub fn weight_at(&self, index: usize) -> f64 {
        self.weights.get(index).copied().unwrap_or(1.0)
    }
}

impl Default for WeightMap {
    fn default() -> Self {
        Self::standard().clone()
    }
}

const STANDARD_WEIGHTS: &[(BodyLandmark, f64)] = &[
    // Torso
    (BodyLandmark::LeftShoulder, 1.5),
    (BodyLandmark::RightShoulder, 1.5),
    (BodyLandmark::LeftHip, 1.5),
    (BodyLandmark::RightHip, 1.5),
    // Arms
    (BodyLandmark::LeftElbow, 1.2),
    (BodyLandmark::RightElbow, 1.2),
    (BodyLandmark::LeftWrist, 1.0),
    (BodyLandmark::RightWrist, 1.0),
    // Legs
    (BodyLandmark::LeftKnee, 1.2),
    (BodyLandmark::RightKnee, 1.2),
    (BodyLandmark::LeftAnkle, 1.0),
    (BodyLandmark::RightAnkle, 1.0),
];
