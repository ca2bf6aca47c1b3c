//! Weighted per-landmark similarity between a live pose and a target pose.

use crate::config::ScoringConfig;
use crate::error::{PosecoachError, Result};
use crate::pose::{Pose, WeightMap};
use std::time::SystemTime;

/// Landmarks below this visibility carry no information about the pose
pub const DEFAULT_VISIBILITY_THRESHOLD: f64 = 0.5;

/// Score `current` against `target` on a `0..=100` scale using the default
/// visibility threshold.
pub fn score(current: &Pose, target: &Pose, weights: &WeightMap) -> Result<f64> {
    score_with_threshold(current, target, weights, DEFAULT_VISIBILITY_THRESHOLD)
}

/// Score with an explicit visibility threshold.
///
/// An index is skipped when either side is below `threshold` or carries a
/// non-finite component. When every index is skipped there is nothing to
/// compare and the score is 0.
pub fn score_with_threshold(
    current: &Pose,
    target: &Pose,
    weights: &WeightMap,
    threshold: f64,
) -> Result<f64> {
    if current.len() != target.len() {
        return Err(PosecoachError::SequenceMismatch {
            expected: target.len(),
            actual: current.len(),
        });
    }

    let mut weighted_distance = 0.0;
    let mut total_weight = 0.0;

    for (index, (live, reference)) in current.iter().zip(target.iter()).enumerate() {
        if !live.is_finite() || !reference.is_finite() {
            continue;
        }
        if !live.is_visible(threshold) || !reference.is_visible(threshold) {
            continue;
        }
        let weight = weights.weight_at(index);
        weighted_distance += weight * live.distance(reference);
        total_weight += weight;
    }

    if total_weight == 0.0 {
        return Ok(0.0);
    }

    let similarity = 100.0 - 100.0 * weighted_distance / total_weight;
    Ok(similarity.clamp(0.0, 100.0))
}

/// Scorer bound to a weight map and visibility threshold
#[derive(Debug, Clone)]
pub struct SimilarityScorer {
    weights: WeightMap,
    visibility_threshold: f64,
}

impl SimilarityScorer {
    pub fn new(weights: WeightMap, visibility_threshold: f64) -> Self {
        Self {
            weights,
            visibility_threshold,
        }
    }

    pub fn from_config(config: &ScoringConfig) -> Self {
        Self::new(WeightMap::standard().clone(), config.visibility_threshold)
    }

    pub fn score(&self, current: &Pose, target: &Pose) -> Result<f64> {
        score_with_threshold(current, target, &self.weights, self.visibility_threshold)
    }

    pub fn weights(&self) -> &WeightMap {
        &self.weights
    }

    pub fn visibility_threshold(&self) -> f64 {
        self.visibility_threshold
    }
}

impl Default for SimilarityScorer {
    fn default() -> Self {
        Self::from_config(&ScoringConfig::default())
    }
}

/// Running totals over the scores of one practice session
#[derive(Debug, Clone, Default)]
pub struct ScoreStats {
    pub samples_scored: u64,
    pub samples_discarded: u64,
    pub total_score: f64,
    pub best_score: Option<f64>,
    pub last_score: Option<f64>,
    pub last_scored_at: Option<SystemTime>,
}

impl ScoreStats {
    pub fn record_score(&mut self, score: f64) {
        self.samples_scored += 1;
        self.total_score += score;
        self.best_score = Some(self.best_score.map_or(score, |best| best.max(score)));
        self.last_score = Some(score);
        self.last_scored_at = Some(SystemTime::now());
    }

    pub fn record_discarded(&mut self) {
        self.samples_discarded += 1;
    }

    pub fn average_score(&self) -> f64 {
        if self.samples_scored == 0 {
            0.0
        } else {
            self.total_score / self.samples_scored as f64
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
