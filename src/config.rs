use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::density::DensityThresholds;
use crate::direction::Direction;
use crate::error::{SignalError, SignalResult};

/// Phase timing parameters for the signal policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Green time for an empty road, seconds.
    pub min_green_time: u32,
    /// Green time for a saturated road, seconds.
    pub max_green_time: u32,
    /// Vehicles at which a road counts as 100% dense.
    pub max_capacity_per_road: u32,
    /// Length of an emergency preemption phase, seconds.
    pub emergency_duration: u32,
    /// Timer shown while an operator override holds a road.
    pub override_hold: u32,
    /// Active road before the first phase is computed.
    pub initial_direction: Direction,
    /// Road opened for an emergency reported without a direction.
    pub emergency_direction: Direction,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            min_green_time: 30,
            max_green_time: 60,
            max_capacity_per_road: 8,
            emergency_duration: 99,
            override_hold: 999,
            initial_direction: Direction::North,
            emergency_direction: Direction::North,
        }
    }
}

impl SignalConfig {
    pub fn validate(&self) -> SignalResult<()> {
        if self.min_green_time > self.max_green_time {
            return Err(SignalError::Config(format!(
                "min_green_time ({}) must not exceed max_green_time ({})",
                self.min_green_time, self.max_green_time
            )));
        }
        if self.max_capacity_per_road == 0 {
            return Err(SignalError::Config(
                "max_capacity_per_road must be > 0".to_string(),
            ));
        }
        if self.emergency_duration == 0 {
            return Err(SignalError::Config(
                "emergency_duration must be > 0".to_string(),
            ));
        }
        if self.override_hold == 0 {
            return Err(SignalError::Config("override_hold must be > 0".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Boxes below this confidence are not counted.
    pub confidence_threshold: f32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Simulated,
    Directory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub source: SourceKind,
    /// Folder polled for detector reports when `source` is `directory`.
    pub captures_dir: PathBuf,
    pub poll_interval_secs: u64,
    /// Snapshots older than this are reported stale.
    pub stale_after_secs: u64,
    pub tick_interval_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Simulated,
            captures_dir: PathBuf::from("captures"),
            poll_interval_secs: 2,
            stale_after_secs: 10,
            tick_interval_ms: 1000,
        }
    }
}

impl FeedConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThingSpeakConfig {
    /// Write key; telemetry goes to the log when empty.
    pub api_key: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ThingSpeakConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.thingspeak.com/update".to_string(),
            timeout_secs: 5,
        }
    }
}

impl ThingSpeakConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub thingspeak: ThingSpeakConfig,
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub signal: SignalConfig,
    pub density: DensityThresholds,
    pub detection: DetectionConfig,
    pub feed: FeedConfig,
    pub telemetry: TelemetryConfig,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> SignalResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| SignalError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_yaml::from_str(&contents).map_err(|e| SignalError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SignalResult<()> {
        self.signal.validate()?;
        if self.density.low_below > self.density.medium_below {
            return Err(SignalError::Config(format!(
                "density.low_below ({}) must not exceed density.medium_below ({})",
                self.density.low_below, self.density.medium_below
            )));
        }
        if !(0.0..=1.0).contains(&self.detection.confidence_threshold) {
            return Err(SignalError::Config(format!(
                "confidence_threshold must be in [0, 1], got {}",
                self.detection.confidence_threshold
            )));
        }
        if self.feed.tick_interval_ms == 0 {
            return Err(SignalError::Config(
                "tick_interval_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.signal.min_green_time, 30);
        assert_eq!(config.signal.max_green_time, 60);
        assert_eq!(config.feed.source, SourceKind::Simulated);
        assert!(!config.telemetry.thingspeak.is_configured());
    }

    #[test]
    fn test_load_partial_yaml_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "signal:\n  min_green_time: 5\n  emergency_direction: E\nfeed:\n  source: directory\n  captures_dir: /tmp/caps"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.signal.min_green_time, 5);
        assert_eq!(config.signal.max_green_time, 60);
        assert_eq!(config.signal.emergency_direction, Direction::East);
        assert_eq!(config.feed.source, SourceKind::Directory);
        assert_eq!(config.feed.captures_dir, PathBuf::from("/tmp/caps"));
        assert_eq!(config.density.medium_below, 8);
    }

    #[test]
    fn test_shipped_config_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config.yaml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.signal.emergency_duration, 99);
        assert_eq!(config.feed.tick_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_load_rejects_inverted_green_times() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "signal:\n  min_green_time: 70\n  max_green_time: 60").unwrap();
        assert!(matches!(
            Config::load(file.path()),
            Err(SignalError::Config(_))
        ));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, SignalError::Io { .. }));
    }

    #[test]
    fn test_load_bad_direction_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "signal:\n  initial_direction: Up").unwrap();
        assert!(matches!(
            Config::load(file.path()),
            Err(SignalError::Parse { .. })
        ));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut config = Config::default();
        config.signal.max_capacity_per_road = 0;
        assert!(config.validate().is_err());
    }
}
