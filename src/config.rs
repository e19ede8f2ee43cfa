//! Configuration management for camera-timelapse
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{Result, TimelapseError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
///
/// Holds the session defaults, the camera backend, the encoder settings,
/// the HTTP control surface and logging.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Session defaults used when a start request omits a value
    #[serde(default)]
    pub timelapse: TimelapseConfig,

    /// Camera backend used to capture stills
    #[serde(default)]
    pub camera: CameraConfig,

    /// External encoder settings
    #[serde(default)]
    pub encoder: EncoderConfig,

    /// HTTP control surface
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Session defaults and frame storage behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelapseConfig {
    /// Seconds between capture attempts
    #[serde(default = "default_interval")]
    pub default_interval: i64,

    /// Total capture duration in minutes
    #[serde(default = "default_duration")]
    pub default_duration: i64,

    /// Directory that receives session frame directories and videos
    #[serde(default = "default_output_path")]
    pub default_output_path: PathBuf,

    /// Remove frame files after a successful assembly
    #[serde(default)]
    pub cleanup_frames: bool,

    /// File extension for stored frames
    #[serde(default = "default_frame_extension")]
    pub frame_extension: String,

    /// Fail the session after this many failed ticks in a row (unset = never)
    #[serde(default)]
    pub max_consecutive_failures: Option<u32>,
}

fn default_interval() -> i64 {
    60
}

fn default_duration() -> i64 {
    1440 // 24 hours
}

fn default_output_path() -> PathBuf {
    PathBuf::from("/config/timelapses")
}

fn default_frame_extension() -> String {
    "jpg".to_string()
}

impl Default for TimelapseConfig {
    fn default() -> Self {
        Self {
            default_interval: default_interval(),
            default_duration: default_duration(),
            default_output_path: default_output_path(),
            cleanup_frames: false,
            frame_extension: default_frame_extension(),
            max_consecutive_failures: None,
        }
    }
}

/// Camera backend selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Backend type ("http" or "command")
    #[serde(rename = "type", default = "default_camera_type")]
    pub camera_type: String,

    /// HTTP snapshot camera settings
    #[serde(default)]
    pub http: HttpCameraConfig,

    /// External command camera settings
    #[serde(default)]
    pub command: CommandCameraConfig,
}

fn default_camera_type() -> String {
    "http".to_string()
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            camera_type: default_camera_type(),
            http: HttpCameraConfig::default(),
            command: CommandCameraConfig::default(),
        }
    }
}

/// HTTP snapshot camera configuration
///
/// `url_template` may contain `{camera_id}`, which is replaced with the
/// entity id of the camera being captured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpCameraConfig {
    /// Snapshot URL template
    #[serde(default = "default_url_template")]
    pub url_template: String,

    /// Bearer token (prefer env var TIMELAPSE_CAMERA_TOKEN)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_camera_timeout")]
    pub timeout_seconds: u64,
}

fn default_url_template() -> String {
    "http://homeassistant.local:8123/api/camera_proxy/{camera_id}".to_string()
}

fn default_camera_timeout() -> u64 {
    10
}

impl Default for HttpCameraConfig {
    fn default() -> Self {
        Self {
            url_template: default_url_template(),
            token: None,
            timeout_seconds: default_camera_timeout(),
        }
    }
}

/// External command camera configuration
///
/// The command must write one encoded still to stdout. `{camera_id}` in
/// any argument is replaced with the camera entity id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandCameraConfig {
    /// Program to execute
    #[serde(default)]
    pub program: String,

    /// Program arguments
    #[serde(default)]
    pub args: Vec<String>,

    /// Seconds before a running capture is killed and counted as failed
    #[serde(default = "default_camera_timeout")]
    pub timeout_seconds: u64,
}

impl Default for CommandCameraConfig {
    fn default() -> Self {
        Self {
            program: String::new(),
            args: Vec::new(),
            timeout_seconds: default_camera_timeout(),
        }
    }
}

/// External encoder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// ffmpeg binary name or path
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    /// Playback rate of the assembled video (one output frame per still)
    #[serde(default = "default_output_fps")]
    pub output_fps: u32,

    /// ffmpeg video codec
    #[serde(default = "default_video_codec")]
    pub video_codec: String,

    /// ffmpeg pixel format
    #[serde(default = "default_pixel_format")]
    pub pixel_format: String,
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_output_fps() -> u32 {
    30
}

fn default_video_codec() -> String {
    "libx264".to_string()
}

fn default_pixel_format() -> String {
    "yuv420p".to_string()
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            output_fps: default_output_fps(),
            video_codec: default_video_codec(),
            pixel_format: default_pixel_format(),
        }
    }
}

/// HTTP control surface configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Camera entity ids exposed as timelapse entities
    #[serde(default)]
    pub entities: Vec<String>,
}

fn default_bind() -> String {
    "127.0.0.1:8765".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            entities: Vec::new(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Enable JSON-formatted logs
    #[serde(default)]
    pub json_format: bool,

    /// Log file path (if None, STDOUT only)
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// Per-tick capture detail at debug level
    #[serde(default)]
    pub debug: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            file_path: None,
            debug: false,
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// A missing file is not an error: defaults are used and a warning is
    /// logged.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Errors
    ///
    /// Returns `TimelapseError::Config` if the file exists but cannot be read
    /// or parsed
    pub fn load(path: &Path, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| TimelapseError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| TimelapseError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(interval) = std::env::var("TIMELAPSE_DEFAULT_INTERVAL") {
            if let Ok(value) = interval.parse() {
                self.timelapse.default_interval = value;
            } else {
                tracing::warn!("Invalid TIMELAPSE_DEFAULT_INTERVAL: {}", interval);
            }
        }

        if let Ok(duration) = std::env::var("TIMELAPSE_DEFAULT_DURATION") {
            if let Ok(value) = duration.parse() {
                self.timelapse.default_duration = value;
            } else {
                tracing::warn!("Invalid TIMELAPSE_DEFAULT_DURATION: {}", duration);
            }
        }

        if let Ok(path) = std::env::var("TIMELAPSE_OUTPUT_PATH") {
            self.timelapse.default_output_path = PathBuf::from(path);
        }

        if let Ok(camera_type) = std::env::var("TIMELAPSE_CAMERA_TYPE") {
            self.camera.camera_type = camera_type;
        }

        if let Ok(url) = std::env::var("TIMELAPSE_CAMERA_URL") {
            self.camera.http.url_template = url;
        }

        if let Ok(token) = std::env::var("TIMELAPSE_CAMERA_TOKEN") {
            self.camera.http.token = Some(token);
        }

        if let Ok(ffmpeg) = std::env::var("TIMELAPSE_FFMPEG_PATH") {
            self.encoder.ffmpeg_path = ffmpeg;
        }

        if let Ok(bind) = std::env::var("TIMELAPSE_BIND") {
            self.server.bind = bind;
        }

        if let Ok(level) = std::env::var("TIMELAPSE_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(debug) = std::env::var("TIMELAPSE_DEBUG") {
            self.logging.debug = matches!(debug.to_lowercase().as_str(), "1" | "true" | "yes");
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            self.logging.debug = true;
        }
    }

    /// Validate the configuration
    ///
    /// Ensures all configuration values are within acceptable ranges
    /// and that required fields are properly set.
    ///
    /// # Errors
    ///
    /// Returns `TimelapseError::Config` if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.timelapse.default_interval <= 0 {
            return Err(TimelapseError::Config(
                "timelapse.default_interval must be greater than 0".to_string(),
            )
            .into());
        }

        if self.timelapse.default_duration <= 0 {
            return Err(TimelapseError::Config(
                "timelapse.default_duration must be greater than 0".to_string(),
            )
            .into());
        }

        if self.timelapse.frame_extension.is_empty()
            || !self
                .timelapse
                .frame_extension
                .chars()
                .all(|c| c.is_ascii_alphanumeric())
        {
            return Err(TimelapseError::Config(format!(
                "Invalid timelapse.frame_extension: {:?}",
                self.timelapse.frame_extension
            ))
            .into());
        }

        if self.timelapse.max_consecutive_failures == Some(0) {
            return Err(TimelapseError::Config(
                "timelapse.max_consecutive_failures must be greater than 0 when set".to_string(),
            )
            .into());
        }

        let valid_cameras = ["http", "command"];
        if !valid_cameras.contains(&self.camera.camera_type.as_str()) {
            return Err(TimelapseError::Config(format!(
                "Invalid camera type: {}. Must be one of: {}",
                self.camera.camera_type,
                valid_cameras.join(", ")
            ))
            .into());
        }

        if self.camera.camera_type == "command" && self.camera.command.program.is_empty() {
            return Err(TimelapseError::Config(
                "camera.command.program is required for the command camera".to_string(),
            )
            .into());
        }

        if self.camera.http.timeout_seconds == 0 {
            return Err(TimelapseError::Config(
                "camera.http.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.camera.command.timeout_seconds == 0 {
            return Err(TimelapseError::Config(
                "camera.command.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.encoder.output_fps == 0 {
            return Err(TimelapseError::Config(
                "encoder.output_fps must be greater than 0".to_string(),
            )
            .into());
        }

        if self.encoder.ffmpeg_path.is_empty() {
            return Err(
                TimelapseError::Config("encoder.ffmpeg_path cannot be empty".to_string()).into(),
            );
        }

        for entity_id in &self.server.entities {
            crate::services::validate_entity_id(entity_id)?;
        }

        Ok(())
    }
}
