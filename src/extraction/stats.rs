use std::time::{Duration, SystemTime};

/// Counters for one extraction run
#[derive(Debug, Clone, Default)]
pub struct ExtractionStats {
    pub sources_total: usize,
    pub sources_completed: usize,
    pub sources_failed: usize,
    pub frames_sampled: u64,
    pub poses_accepted: u64,
    pub frames_without_detection: u64,
    pub detector_errors: u64,
    pub poses_rejected: u64,
    pub started_at: Option<SystemTime>,
    pub elapsed: Duration,
}

impl ExtractionStats {
    pub fn record_start(&mut self, sources_total: usize) {
        *self = Self {
            sources_total,
            started_at: Some(SystemTime::now()),
            ..Self::default()
        };
    }

    pub fn record_frame(&mut self) {
        self.frames_sampled += 1;
    }

    pub fn record_pose(&mut self) {
        self.poses_accepted += 1;
    }

    pub fn record_no_detection(&mut self) {
        self.frames_without_detection += 1;
    }

    pub fn record_detector_error(&mut self) {
        self.detector_errors += 1;
    }

    /// A detected pose whose landmark count disagreed with the sequence
    pub fn record_rejected_pose(&mut self) {
        self.poses_rejected += 1;
    }

    pub fn record_source_completed(&mut self) {
        self.sources_completed += 1;
    }

    pub fn record_source_failed(&mut self) {
        self.sources_failed += 1;
    }

    pub fn record_finish(&mut self) {
        if let Some(started_at) = self.started_at {
            self.elapsed = started_at.elapsed().unwrap_or_default();
        }
    }

    /// Share of sampled frames that produced a keyframe
    pub fn acceptance_rate(&self) -> f64 {
        if self.frames_sampled == 0 {
            0.0
        } else {
            self.poses_accepted as f64 / self.frames_sampled as f64
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
