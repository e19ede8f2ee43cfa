//! Error types for camera-timelapse
//!
//! This module defines all error types used throughout the service,
//! using `thiserror` for ergonomic error handling.

use serde::Serialize;
use thiserror::Error;

/// Main error type for timelapse operations
///
/// Capture and frame-write failures are non-fatal and only show up in logs
/// and frame counts. `NoFramesCaptured` and `Encoding` end a session in the
/// `Failed` state.
#[derive(Error, Debug)]
pub enum TimelapseError {
    /// Invalid start parameters (interval or duration not positive, bad entity id)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A session is already capturing or assembling for this camera
    #[error("Timelapse already running for {0}")]
    AlreadyRunning(String),

    /// The camera did not deliver a usable still
    #[error("Capture failed for {camera_id}: {message}")]
    CaptureFailure {
        /// Camera the capture was requested from
        camera_id: String,
        /// Opaque description of the failure
        message: String,
    },

    /// Session ended before any frame was stored
    #[error("No frames captured in {0}")]
    NoFramesCaptured(String),

    /// External encoder failed or produced no output
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Configuration file or value errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Camera backend could not be constructed
    #[error("Camera error: {0}")]
    Camera(String),

    /// No entity or session with this id
    #[error("Not found: {0}")]
    NotFound(String),

    /// IO errors (frame writes, directory management)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Copyable classification of a [`TimelapseError`]
///
/// Stored in session snapshots and used by the HTTP surface to pick a
/// status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidConfig,
    AlreadyRunning,
    CaptureFailure,
    NoFramesCaptured,
    EncodingError,
    Config,
    NotFound,
    IoError,
    Internal,
}

impl TimelapseError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            TimelapseError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            TimelapseError::AlreadyRunning(_) => ErrorKind::AlreadyRunning,
            TimelapseError::CaptureFailure { .. } | TimelapseError::Camera(_) => {
                ErrorKind::CaptureFailure
            }
            TimelapseError::NoFramesCaptured(_) => ErrorKind::NoFramesCaptured,
            TimelapseError::Encoding(_) => ErrorKind::EncodingError,
            TimelapseError::Config(_) | TimelapseError::Yaml(_) => ErrorKind::Config,
            TimelapseError::NotFound(_) => ErrorKind::NotFound,
            TimelapseError::Io(_) => ErrorKind::IoError,
        }
    }
}

/// Classify any error produced by this crate
///
/// Errors that did not originate as a [`TimelapseError`] are `Internal`.
pub fn kind_of(error: &anyhow::Error) -> ErrorKind {
    match error.downcast_ref::<TimelapseError>() {
        Some(e) => e.kind(),
        None if error.downcast_ref::<std::io::Error>().is_some() => ErrorKind::IoError,
        None => ErrorKind::Internal,
    }
}

/// Result type alias for timelapse operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_display() {
        let error = TimelapseError::InvalidConfig("interval must be positive".to_string());
        assert_eq!(
            error.to_string(),
            "Invalid configuration: interval must be positive"
        );
    }

    #[test]
    fn test_already_running_display() {
        let error = TimelapseError::AlreadyRunning("camera.porch".to_string());
        assert_eq!(error.to_string(), "Timelapse already running for camera.porch");
    }

    #[test]
    fn test_capture_failure_display() {
        let error = TimelapseError::CaptureFailure {
            camera_id: "camera.porch".to_string(),
            message: "timeout".to_string(),
        };
        assert!(error.to_string().contains("camera.porch"));
        assert!(error.to_string().contains("timeout"));
    }

    #[test]
    fn test_encoding_error_display() {
        let error = TimelapseError::Encoding("ffmpeg exited with status 1".to_string());
        assert_eq!(error.to_string(), "Encoding error: ffmpeg exited with status 1");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: TimelapseError = io_error.into();
        assert!(matches!(error, TimelapseError::Io(_)));
        assert_eq!(error.kind(), ErrorKind::IoError);
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("invalid: : yaml").unwrap_err();
        let error: TimelapseError = yaml_error.into();
        assert_eq!(error.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_kind_of_anyhow() {
        let err: anyhow::Error = TimelapseError::NoFramesCaptured("dir".to_string()).into();
        assert_eq!(kind_of(&err), ErrorKind::NoFramesCaptured);

        let err = anyhow::anyhow!("something else");
        assert_eq!(kind_of(&err), ErrorKind::Internal);
    }

    #[test]
    fn test_error_kind_serialization() {
        let json = serde_json::to_string(&ErrorKind::AlreadyRunning).unwrap();
        assert_eq!(json, "\"already_running\"");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TimelapseError>();
    }
}
