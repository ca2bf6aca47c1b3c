mod interface;
mod mock;

pub use interface::{require_pose, FrameSource, PoseDetector};
pub use mock::{DetectorResponse, MockVideoSource, ScriptedDetector};
