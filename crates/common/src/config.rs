//! Application and capture configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RaytrackError, RaytrackResult};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Default capture settings.
    pub capture: CaptureConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Output encoder selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// VP8 in a WebM container (requires the `gstreamer` feature).
    Webm,
    /// Animated PNG container.
    #[default]
    Apng,
    /// Per-frame PNGs streamed over a persistent connection.
    Socket,
}

impl Format {
    pub fn as_str(self) -> &'static str {
        match self {
            Format::Webm => "webm",
            Format::Apng => "apng",
            Format::Socket => "socket",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = RaytrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webm" => Ok(Format::Webm),
            "apng" => Ok(Format::Apng),
            "socket" => Ok(Format::Socket),
            other => Err(RaytrackError::config(format!(
                "Unknown encoder format '{other}' (expected webm, apng or socket)"
            ))),
        }
    }
}

/// Capture session parameters. Immutable once a session is constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Output frame rate; drives the virtual time step.
    pub fps: u32,

    /// Encoder quality, 0-100.
    pub quality: u8,

    /// Which encoder to use.
    pub format: Format,

    /// Stop after this many output frames (0 = unbounded).
    pub frame_limit: u64,

    /// Stop after this many simulated seconds (0 = unbounded).
    pub time_limit: f64,

    /// Offset in milliseconds added to the simulated time origin.
    pub start_time: f64,

    /// Sub-frame samples per output frame; 1 or less disables motion blur.
    pub motion_blur_frames: u32,

    /// Seconds of buffered output before the muxing encoder splits a part (0 = never).
    pub auto_save_time: f64,

    /// Base name for output artifacts. Generated when absent.
    pub file_name: Option<String>,

    /// Per-frame diagnostic logging.
    pub verbose: bool,

    /// Directory artifacts are written to.
    pub output_dir: PathBuf,

    /// Address of the frame receiver for the socket format.
    pub stream_address: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            fps: 60,
            quality: 100,
            format: Format::default(),
            frame_limit: 0,
            time_limit: 0.0,
            start_time: 0.0,
            motion_blur_frames: 1,
            auto_save_time: 0.0,
            file_name: None,
            verbose: false,
            output_dir: PathBuf::from("."),
            stream_address: "127.0.0.1:8999".to_string(),
        }
    }
}

impl CaptureConfig {
    /// Reject values that would make the virtual schedule meaningless.
    pub fn validate(&self) -> RaytrackResult<()> {
        if self.fps == 0 {
            return Err(RaytrackError::config("fps must be greater than zero"));
        }
        if self.quality > 100 {
            return Err(RaytrackError::config(format!(
                "quality must be within 0-100, got {}",
                self.quality
            )));
        }
        for (name, value) in [
            ("time_limit", self.time_limit),
            ("start_time", self.start_time),
            ("auto_save_time", self.auto_save_time),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(RaytrackError::config(format!(
                    "{name} must be a finite, non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Whether sub-frame accumulation is active.
    pub fn motion_blur_enabled(&self) -> bool {
        self.motion_blur_frames > 1
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "raytrack=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<PathBuf, std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(&config_path, json)?;
        Ok(config_path)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("raytrack").join("config.json")
}
