mod body;
mod landmark;
mod weights;

pub use body::{BodyLandmark, POSE_LANDMARK_COUNT};
pub use landmark::{Landmark, LiveDetectionSample, Pose};
pub use weights::WeightMap;
