//! External command camera
//!
//! Runs a configured program once per capture and takes its stdout as the
//! encoded still, e.g. `gphoto2 --capture-image-and-download --stdout` or an
//! `ffmpeg` single-frame grab from an RTSP stream.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::process::Command;

use super::{render_template, Camera};
use crate::config::CommandCameraConfig;
use crate::error::{Result, TimelapseError};

/// Camera backed by an external program
#[derive(Debug, Clone)]
pub struct CommandCamera {
    config: CommandCameraConfig,
}

impl CommandCamera {
    /// Create a new command camera
    ///
    /// # Errors
    ///
    /// Returns `TimelapseError::Camera` if no program is configured
    pub fn new(config: CommandCameraConfig) -> Result<Self> {
        if config.program.is_empty() {
            return Err(TimelapseError::Camera("No capture program configured".to_string()).into());
        }
        Ok(Self { config })
    }

    /// Arguments for a capture of `camera_id`
    pub fn args_for(&self, camera_id: &str) -> Vec<String> {
        self.config
            .args
            .iter()
            .map(|arg| render_template(arg, camera_id))
            .collect()
    }
}

#[async_trait]
impl Camera for CommandCamera {
    async fn capture_still(&self, camera_id: &str) -> Result<Bytes> {
        let args = self.args_for(camera_id);
        tracing::debug!(program = %self.config.program, ?args, "Running capture command");

        let child = Command::new(&self.config.program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        // Dropping the timed-out future kills the child.
        let limit = Duration::from_secs(self.config.timeout_seconds);
        let output = tokio::time::timeout(limit, child)
            .await
            .map_err(|_| TimelapseError::CaptureFailure {
                camera_id: camera_id.to_string(),
                message: format!(
                    "{} timed out after {}s",
                    self.config.program, self.config.timeout_seconds
                ),
            })?
            .map_err(|e| TimelapseError::CaptureFailure {
                camera_id: camera_id.to_string(),
                message: format!("failed to run {}: {}", self.config.program, e),
            })?;

        if !output.status.success() {
            return Err(TimelapseError::CaptureFailure {
                camera_id: camera_id.to_string(),
                message: format!(
                    "{} exited with {}: {}",
                    self.config.program,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            }
            .into());
        }

        if output.stdout.is_empty() {
            return Err(TimelapseError::CaptureFailure {
                camera_id: camera_id.to_string(),
                message: "capture command produced no output".to_string(),
            }
            .into());
        }

        Ok(Bytes::from(output.stdout))
    }
}
