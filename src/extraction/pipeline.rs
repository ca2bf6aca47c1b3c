use super::stats::ExtractionStats;
use crate::config::ExtractionConfig;
use crate::detector::{require_pose, FrameSource, PoseDetector};
use crate::error::{PosecoachError, Result};
use crate::events::{EventBus, PosecoachEvent};
use crate::frame::FrameSampler;
use crate::pose::Pose;
use crate::sequence::{PoseSequence, SequenceMetadata};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Turns recorded videos into a keyframe pose sequence.
///
/// Sources are read one after another and every sampled frame goes through
/// the detector. Frames without a usable detection are skipped; a source that
/// cannot be read is abandoned and the run moves on to the next one.
pub struct ExtractionPipeline {
    config: ExtractionConfig,
    sampler: FrameSampler,
    event_bus: Arc<EventBus>,
    cancellation_token: CancellationToken,
    stats: ExtractionStats,
}

impl ExtractionPipeline {
    pub fn new(config: ExtractionConfig, event_bus: Arc<EventBus>) -> Self {
        let sampler = FrameSampler::new(config.fps);
        Self {
            config,
            sampler,
            event_bus,
            cancellation_token: CancellationToken::new(),
            stats: ExtractionStats::default(),
        }
    }

    /// Stop the run when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation_token
    }

    pub fn stats(&self) -> &ExtractionStats {
        &self.stats
    }

    /// Extract one sequence named `name` from `sources`, in order.
    ///
    /// Every source is released before this returns, including on failure
    /// and cancellation.
    pub async fn extract(
        &mut self,
        sources: Vec<Box<dyn FrameSource>>,
        detector: &dyn PoseDetector,
        name: &str,
    ) -> Result<PoseSequence> {
        let fps = self.sampler.fps();
        info!(
            "Extracting '{}' from {} source(s) at {} fps",
            name,
            sources.len(),
            fps
        );

        self.stats.record_start(sources.len());
        self.event_bus
            .emit(PosecoachEvent::ExtractionStarted {
                source_count: sources.len(),
                fps,
            })
            .await;

        let descriptors: Vec<String> = sources
            .iter()
            .map(|source| source.descriptor().to_string())
            .collect();
        let mut poses = Vec::new();
        let mut cancelled = false;

        for mut source in sources {
            if cancelled || self.cancellation_token.is_cancelled() {
                cancelled = true;
                release_source(source.as_mut()).await;
                continue;
            }

            match self.process_source(source.as_mut(), detector, &mut poses).await {
                Ok(()) => self.stats.record_source_completed(),
                Err(PosecoachError::Cancelled) => cancelled = true,
                Err(e) => {
                    error!("Source '{}' failed: {}", source.descriptor(), e);
                    self.stats.record_source_failed();
                    self.event_bus
                        .emit(PosecoachEvent::SourceFailed {
                            source: source.descriptor().to_string(),
                            error: e.to_string(),
                        })
                        .await;
                }
            }

            release_source(source.as_mut()).await;
        }

        self.stats.record_finish();

        if cancelled {
            warn!("Extraction of '{}' cancelled", name);
            return Err(PosecoachError::Cancelled);
        }

        if poses.is_empty() {
            warn!(
                "Extraction of '{}' found no poses in {} sampled frames",
                name, self.stats.frames_sampled
            );
            return Err(PosecoachError::EmptySequence);
        }

        let metadata = SequenceMetadata::new(Some(descriptors.join(", ")), Some(f64::from(fps)));
        let sequence = PoseSequence::from_frame_rate(name, poses, f64::from(fps), metadata)?;

        info!(
            "Extracted '{}': {} poses from {} frames ({:.1}% accepted)",
            name,
            sequence.len(),
            self.stats.frames_sampled,
            self.stats.acceptance_rate() * 100.0
        );
        self.event_bus
            .emit(PosecoachEvent::ExtractionCompleted {
                name: sequence.name().to_string(),
                pose_count: sequence.len(),
                frames_sampled: self.stats.frames_sampled,
            })
            .await;

        Ok(sequence)
    }

    async fn process_source(
        &mut self,
        source: &mut dyn FrameSource,
        detector: &dyn PoseDetector,
        poses: &mut Vec<Pose>,
    ) -> Result<()> {
        let descriptor = source.descriptor().to_string();
        let duration = source.duration().await?.ok_or_else(|| {
            PosecoachError::frame_source(
                descriptor.clone(),
                "source has no finite duration".to_string(),
            )
        })?;

        let total_frames = self.sampler.total_frames(duration);
        info!(
            "Opened '{}': {:.2}s, {} frames to sample",
            descriptor,
            duration.as_secs_f64(),
            total_frames
        );
        self.event_bus
            .emit(PosecoachEvent::SourceOpened {
                source: descriptor.clone(),
                total_frames,
            })
            .await;

        let progress_interval = u64::from(self.config.progress_interval_frames.max(1));
        let sampler = self.sampler;

        for (index, position) in sampler.positions(duration) {
            if self.cancellation_token.is_cancelled() {
                return Err(PosecoachError::Cancelled);
            }

            let frame = source.frame_at(index, position).await?;
            self.stats.record_frame();

            let detection = tokio::select! {
                _ = self.cancellation_token.cancelled() => return Err(PosecoachError::Cancelled),
                detection = detector.detect(&frame) => detection,
            };

            match detection.and_then(require_pose) {
                Ok(pose) => self.accept_pose(&descriptor, index, pose, poses).await,
                Err(PosecoachError::DetectionUnavailable) => {
                    debug!(
                        "No pose in '{}' frame {} at {:.0} ms",
                        descriptor,
                        index,
                        frame.position_ms()
                    );
                    self.stats.record_no_detection();
                    self.event_bus
                        .emit(PosecoachEvent::FrameSkipped {
                            source: descriptor.clone(),
                            frame: index,
                        })
                        .await;
                }
                Err(e) => {
                    warn!("Detector failed on '{}' frame {}: {}", descriptor, index, e);
                    self.stats.record_detector_error();
                    self.event_bus
                        .emit(PosecoachEvent::DetectorFailed {
                            source: descriptor.clone(),
                            frame: index,
                            error: e.to_string(),
                        })
                        .await;
                }
            }

            let processed = index + 1;
            if processed % progress_interval == 0 || processed == total_frames {
                let percent = processed as f64 * 100.0 / total_frames as f64;
                debug!("'{}' progress: {:.0}%", descriptor, percent);
                self.event_bus
                    .emit(PosecoachEvent::ExtractionProgress {
                        source: descriptor.clone(),
                        frame: processed,
                        total_frames,
                        percent,
                    })
                    .await;
            }
        }

        Ok(())
    }

    async fn accept_pose(&mut self, descriptor: &str, index: u64, pose: Pose, poses: &mut Vec<Pose>) {
        let rejection = match poses.first().map(Pose::len) {
            _ if !pose.is_finite() => Some("pose contains a non-finite landmark value".to_string()),
            Some(expected) if pose.len() != expected => Some(
                PosecoachError::SequenceMismatch {
                    expected,
                    actual: pose.len(),
                }
                .to_string(),
            ),
            _ => None,
        };

        if let Some(reason) = rejection {
            warn!("Dropping pose from '{}' frame {}: {}", descriptor, index, reason);
            self.stats.record_rejected_pose();
            self.event_bus
                .emit(PosecoachEvent::DetectorFailed {
                    source: descriptor.to_string(),
                    frame: index,
                    error: reason,
                })
                .await;
            return;
        }

        self.stats.record_pose();
        poses.push(pose);
    }
}

async fn release_source(source: &mut dyn FrameSource) {
    if let Err(e) = source.release().await {
        warn!("Failed to release '{}': {}", source.descriptor(), e);
    }
}
