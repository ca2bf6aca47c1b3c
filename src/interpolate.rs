//! Linear blending between two keyframe poses.

use crate::error::{PosecoachError, Result};
use crate::pose::{Landmark, Pose};

/// Blend `a` towards `b` by `t`.
///
/// `t` is clamped to `[0, 1]` so rounding at segment boundaries never
/// extrapolates. The endpoints return the input poses unchanged.
pub fn interpolate(a: &Pose, b: &Pose, t: f64) -> Result<Pose> {
    if a.len() != b.len() {
        return Err(PosecoachError::SequenceMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    if t == 0.0 {
        return Ok(a.clone());
    }
    if t == 1.0 {
        return Ok(b.clone());
    }

    Ok(a.iter().zip(b.iter()).map(|(la, lb)| lerp(la, lb, t)).collect())
}

fn lerp(a: &Landmark, b: &Landmark, t: f64) -> Landmark {
    Landmark {
        x: a.x + (b.x - a.x) * t,
        y: a.y + (b.y - a.y) * t,
        z: a.z + (b.z - a.z) * t,
        visibility: a.visibility + (b.visibility - a.visibility) * t,
    }
}
