use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection::domain::face_detector::DetectorKind;
use crate::shared::constants::{
    APP_DIR_NAME, CAPTURE_HEIGHT, CAPTURE_WIDTH, DEFAULT_JPEG_QUALITY,
};

/// Upper bound for the frame and storage intervals.
pub const MAX_INTERVAL_SECS: f64 = 3600.0;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tunables for every stream a registry creates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub frame_interval_secs: f64,
    pub storage_interval_secs: f64,
    pub max_concurrent_streams: usize,
    pub emotion_confidence_threshold: f64,
    pub face_confidence_threshold: f64,
    pub detector: DetectorKind,
    pub camera_device: String,
    pub frame_width: u32,
    pub frame_height: u32,
    pub max_read_failures: u32,
    pub reopen_backoff_ms: u64,
    pub join_timeout_ms: u64,
    pub jpeg_quality: u8,
    pub input_size: u32,
    /// Extra directories searched for model files.
    pub model_dirs: Vec<PathBuf>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            frame_interval_secs: 0.1,
            storage_interval_secs: 2.0,
            max_concurrent_streams: 10,
            emotion_confidence_threshold: 0.4,
            face_confidence_threshold: 0.5,
            detector: DetectorKind::Accurate,
            camera_device: default_camera_device().to_string(),
            frame_width: CAPTURE_WIDTH,
            frame_height: CAPTURE_HEIGHT,
            max_read_failures: 5,
            reopen_backoff_ms: 1000,
            join_timeout_ms: 1000,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            input_size: 96,
            model_dirs: Vec::new(),
        }
    }
}

impl StreamConfig {
    /// Loads config from `path`, or from the platform config dir when `None`.
    ///
    /// A missing default file yields defaults; a missing explicit file is an
    /// error. Environment overrides are applied last, then the result is
    /// validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => match Self::config_path().filter(|p| p.exists()) {
                Some(p) => Self::from_file(&p)?,
                None => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("config.json"))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies the legacy environment variable overrides.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        fn parse<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
            raw.trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("{key}={raw} is not a valid value")))
        }

        if let Some(v) = lookup("FRAME_INTERVAL") {
            self.frame_interval_secs = parse("FRAME_INTERVAL", &v)?;
        }
        if let Some(v) = lookup("STORAGE_INTERVAL") {
            self.storage_interval_secs = parse("STORAGE_INTERVAL", &v)?;
        }
        if let Some(v) = lookup("MAX_CONCURRENT_USERS") {
            self.max_concurrent_streams = parse("MAX_CONCURRENT_USERS", &v)?;
        }
        if let Some(v) = lookup("EMOTION_CONFIDENCE_THRESHOLD") {
            self.emotion_confidence_threshold = parse("EMOTION_CONFIDENCE_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("FACE_DETECTOR") {
            self.detector = parse("FACE_DETECTOR", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("frame_interval_secs", self.frame_interval_secs),
            ("storage_interval_secs", self.storage_interval_secs),
        ] {
            if !(value > 0.0 && value <= MAX_INTERVAL_SECS) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be in (0, {MAX_INTERVAL_SECS}] seconds, got {value}"
                )));
            }
        }
        if self.max_concurrent_streams == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_streams must be at least 1".into(),
            ));
        }
        for (name, value) in [
            ("emotion_confidence_threshold", self.emotion_confidence_threshold),
            ("face_confidence_threshold", self.face_confidence_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be between 0.0 and 1.0, got {value}"
                )));
            }
        }
        if self.max_read_failures == 0 {
            return Err(ConfigError::Invalid(
                "max_read_failures must be at least 1".into(),
            ));
        }
        if self.frame_width == 0 || self.frame_height == 0 || self.input_size == 0 {
            return Err(ConfigError::Invalid(
                "frame dimensions and input_size must be non-zero".into(),
            ));
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(ConfigError::Invalid(format!(
                "jpeg_quality must be between 1 and 100, got {}",
                self.jpeg_quality
            )));
        }
        Ok(())
    }

    pub fn frame_interval(&self) -> Duration {
        interval(self.frame_interval_secs)
    }

    pub fn storage_interval(&self) -> Duration {
        interval(self.storage_interval_secs)
    }

    pub fn reopen_backoff(&self) -> Duration {
        Duration::from_millis(self.reopen_backoff_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

/// Out-of-range values saturate instead of panicking; NaN becomes zero.
fn interval(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.clamp(0.0, MAX_INTERVAL_SECS)).unwrap_or(Duration::ZERO)
}

fn default_camera_device() -> &'static str {
    #[cfg(target_os = "linux")]
    {
        "/dev/video0"
    }
    #[cfg(not(target_os = "linux"))]
    {
        "0"
    }
}
