use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PosecoachConfig {
    pub playback: PlaybackConfig,
    pub scoring: ScoringConfig,
    pub extraction: ExtractionConfig,
    pub storage: StorageConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PlaybackConfig {
    /// Frame-clock rate driving playback ticks
    #[serde(default = "default_tick_rate_hz")]
    pub tick_rate_hz: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ScoringConfig {
    /// Landmarks below this visibility on either side are left out of the score
    #[serde(default = "default_visibility_threshold")]
    pub visibility_threshold: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ExtractionConfig {
    /// Nominal sampling rate for stored video
    #[serde(default = "default_extraction_fps")]
    pub fps: u32,

    /// Emit a progress event every N sampled frames
    #[serde(default = "default_progress_interval_frames")]
    pub progress_interval_frames: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StorageConfig {
    /// Directory holding saved pose sequences
    #[serde(default = "default_storage_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl PosecoachConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("posecoach.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("playback.tick_rate_hz", default_tick_rate_hz())?
            .set_default(
                "scoring.visibility_threshold",
                default_visibility_threshold(),
            )?
            .set_default("extraction.fps", default_extraction_fps())?
            .set_default(
                "extraction.progress_interval_frames",
                default_progress_interval_frames(),
            )?
            .set_default("storage.path", default_storage_path())?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            .add_source(File::with_name(&path_str).required(false))
            // POSECOACH__PLAYBACK__TICK_RATE_HZ=30
            .add_source(Environment::with_prefix("POSECOACH").separator("__"))
            .build()?;

        let config: PosecoachConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.playback.tick_rate_hz == 0 {
            return Err(ConfigError::Message(
                "Playback tick_rate_hz must be greater than 0".to_string(),
            ));
        }

        let threshold = self.scoring.visibility_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Message(format!(
                "Scoring visibility_threshold must be within [0, 1], got {}",
                threshold
            )));
        }

        if self.extraction.fps == 0 {
            return Err(ConfigError::Message(
                "Extraction fps must be greater than 0".to_string(),
            ));
        }

        if self.extraction.progress_interval_frames == 0 {
            return Err(ConfigError::Message(
                "Extraction progress_interval_frames must be greater than 0".to_string(),
            ));
        }

        if self.storage.path.trim().is_empty() {
            return Err(ConfigError::Message(
                "Storage path must not be empty".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for PosecoachConfig {
    fn default() -> Self {
        Self {
            playback: PlaybackConfig {
                tick_rate_hz: default_tick_rate_hz(),
            },
            scoring: ScoringConfig {
                visibility_threshold: default_visibility_threshold(),
            },
            extraction: ExtractionConfig {
                fps: default_extraction_fps(),
                progress_interval_frames: default_progress_interval_frames(),
            },
            storage: StorageConfig {
                path: default_storage_path(),
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            visibility_threshold: default_visibility_threshold(),
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            fps: default_extraction_fps(),
            progress_interval_frames: default_progress_interval_frames(),
        }
    }
}

// Default value functions
fn default_tick_rate_hz() -> u32 {
    60
}

fn default_visibility_threshold() -> f64 {
    0.5
}

fn default_extraction_fps() -> u32 {
    30
}
fn default_progress_interval_frames() -> u32 {
    30
}

fn default_storage_path() -> String {
    "./sequences".to_string()
}

fn default_event_bus_capacity() -> usize {
    256
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = PosecoachConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.playback.tick_rate_hz, 60);
        assert_eq!(config.scoring.visibility_threshold, 0.5);
        assert_eq!(config.extraction.fps, 30);
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[playback]\ntick_rate_hz = 24\n\n[extraction]\nfps = 15\n"
        )
        .unwrap();

        let config = PosecoachConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.playback.tick_rate_hz, 24);
        assert_eq!(config.extraction.fps, 15);
        // Untouched sections keep their defaults
        assert_eq!(config.scoring, ScoringConfig::default());
        assert_eq!(config.storage.path, "./sequences");
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = PosecoachConfig::load_from_file("/nonexistent/posecoach.toml").unwrap();
        assert_eq!(config, PosecoachConfig::default());
    }

    #[test]
    fn test_config_validation() {
        let mut config = PosecoachConfig::default();

        config.scoring.visibility_threshold = 1.5;
        assert!(config.validate().is_err());

        config.scoring.visibility_threshold = 0.5;
        config.playback.tick_rate_hz = 0;
        assert!(config.validate().is_err());

        config.playback.tick_rate_hz = 30;
        config.extraction.progress_interval_frames = 0;
        assert!(config.validate().is_err());

        config.extraction.progress_interval_frames = 10;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config_serializes_to_toml() {
        let rendered = toml::to_string_pretty(&PosecoachConfig::default()).unwrap();
        assert!(rendered.contains("[playback]"));
        assert!(rendered.contains("tick_rate_hz = 60"));

        let parsed: PosecoachConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, PosecoachConfig::default());
    }
}
