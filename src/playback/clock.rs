use crate::error::Result;
use crate::interpolate::interpolate;
use crate::pose::Pose;
use crate::sequence::PoseSequence;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, trace};

/// Transport state of the playback clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackStatus {
    Stopped,
    Playing,
    Paused,
}

/// Position of the virtual target clock within the active sequence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackState {
    pub current_index: usize,
    pub elapsed_ms: f64,
    pub running: bool,
}

/// What a single tick changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// The current keyframe index moved
    pub advanced: bool,
    /// This tick reached the final keyframe; reported once per play-through
    pub completed: bool,
}

/// Virtual clock walking a pose sequence against wall time.
///
/// Transport calls never fail: anything invalid for the current state is a
/// no-op. Without a sequence every operation is a no-op.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    sequence: Option<Arc<PoseSequence>>,
    current_index: usize,
    elapsed_ms: f64,
    status: PlaybackStatus,
    finished: bool,
}

impl PlaybackClock {
    pub fn new(sequence: Arc<PoseSequence>) -> Self {
        Self {
            sequence: Some(sequence),
            ..Self::empty()
        }
    }

    /// Clock with nothing to play
    pub fn empty() -> Self {
        Self {
            sequence: None,
            current_index: 0,
            elapsed_ms: 0.0,
            status: PlaybackStatus::Stopped,
            finished: false,
        }
    }

    /// Replace the active sequence and rewind
    pub fn load(&mut self, sequence: Arc<PoseSequence>) {
        debug!(
            "Playback clock loaded '{}' ({} keyframes)",
            sequence.name(),
            sequence.len()
        );
        self.sequence = Some(sequence);
        self.reset();
    }

    pub fn sequence(&self) -> Option<&Arc<PoseSequence>> {
        self.sequence.as_ref()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn state(&self) -> PlaybackState {
        PlaybackState {
            current_index: self.current_index,
            elapsed_ms: self.elapsed_ms,
            running: self.status == PlaybackStatus::Playing,
        }
    }

    /// Start or resume. Returns whether the clock is newly playing.
    ///
    /// Playing again after a completed play-through starts from the top.
    pub fn play(&mut self) -> bool {
        if self.sequence.is_none() || self.status == PlaybackStatus::Playing {
            return false;
        }
        if self.finished {
            self.rewind();
        }
        self.status = PlaybackStatus::Playing;
        true
    }

    /// Hold the current position. Returns whether the clock was playing.
    pub fn pause(&mut self) -> bool {
        if self.status != PlaybackStatus::Playing {
            return false;
        }
        self.status = PlaybackStatus::Paused;
        true
    }

    /// Back to the first keyframe, stopped
    pub fn reset(&mut self) {
        self.rewind();
        self.status = PlaybackStatus::Stopped;
    }

    /// Jump to the next keyframe. Returns whether the position moved.
    pub fn skip_forward(&mut self) -> bool {
        let Some(sequence) = self.sequence.as_ref() else {
            return false;
        };
        if self.current_index >= sequence.last_index() {
            return false;
        }
        self.current_index += 1;
        self.elapsed_ms = sequence.timing()[self.current_index];
        true
    }

    /// Advance the clock by `delta_ms` of wall time. Only acts while playing.
    pub fn tick(&mut self, delta_ms: f64) -> TickOutcome {
        if self.status != PlaybackStatus::Playing {
            return TickOutcome::default();
        }
        let Some(sequence) = self.sequence.clone() else {
            return TickOutcome::default();
        };

        if delta_ms.is_finite() && delta_ms > 0.0 {
            self.elapsed_ms += delta_ms;
        }

        let timing = sequence.timing();
        let last = sequence.last_index();
        let start_index = self.current_index;

        while self.current_index < last && self.elapsed_ms >= timing[self.current_index + 1] {
            self.current_index += 1;
        }

        let mut outcome = TickOutcome {
            advanced: self.current_index != start_index,
            completed: false,
        };

        if self.elapsed_ms >= timing[last] {
            self.status = PlaybackStatus::Stopped;
            self.finished = true;
            outcome.completed = true;
            debug!(
                "Playback of '{}' completed at {:.1} ms",
                sequence.name(),
                self.elapsed_ms
            );
        }

        trace!(
            "Tick +{:.2} ms -> index {} at {:.2} ms",
            delta_ms,
            self.current_index,
            self.elapsed_ms
        );
        outcome
    }

    /// Blend factor between the current keyframe and the next one.
    /// Always 1 on the final keyframe.
    pub fn interpolation_t(&self) -> Option<f64> {
        let sequence = self.sequence.as_ref()?;
        let index = self.current_index;
        if index >= sequence.last_index() {
            return Some(1.0);
        }

        let timing = sequence.timing();
        let span = timing[index + 1] - timing[index];
        Some(((self.elapsed_ms - timing[index]) / span).clamp(0.0, 1.0))
    }

    /// Interpolated target pose at the current clock position
    pub fn current_target_pose(&self) -> Result<Option<Pose>> {
        let (Some(sequence), Some(t)) = (self.sequence.as_ref(), self.interpolation_t()) else {
            return Ok(None);
        };
        let poses = sequence.poses();
        let next = (self.current_index + 1).min(sequence.last_index());

        interpolate(&poses[self.current_index], &poses[next], t).map(Some)
    }

    /// Fraction of the sequence played, in `[0, 1]`
    pub fn progress(&self) -> f64 {
        match self.sequence.as_ref() {
            None => 0.0,
            Some(_) if self.finished => 1.0,
            Some(sequence) if sequence.duration_ms() > 0.0 => {
                (self.elapsed_ms / sequence.duration_ms()).clamp(0.0, 1.0)
            }
            Some(_) => 0.0,
        }
    }

    /// Whether the last play-through reached the end
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn rewind(&mut self) {
        self.current_index = 0;
        self.elapsed_ms = 0.0;
        self.finished = false;
    }
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::empty()
    }
}
