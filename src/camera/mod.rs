//! Camera capability consumed by the capture scheduler
//!
//! A [`Camera`] turns a camera entity id into one encoded still image.
//! Errors are opaque: the scheduler treats every failure the same way
//! (log, skip the tick, keep the session running).
//!
//! Implementations:
//!
//! - [`http::HttpSnapshotCamera`]: fetches a snapshot URL, e.g. a Home
//!   Assistant `camera_proxy` endpoint.
//! - [`command::CommandCamera`]: runs an external program and reads the
//!   still from its stdout.

pub mod command;
pub mod http;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::CameraConfig;
use crate::error::{Result, TimelapseError};

pub use command::CommandCamera;
pub use http::HttpSnapshotCamera;

/// Source of still images for a camera entity
#[async_trait]
pub trait Camera: Send + Sync + std::fmt::Debug {
    /// Capture one still from `camera_id`
    ///
    /// # Errors
    ///
    /// Any error is treated as a capture failure for this tick.
    async fn capture_still(&self, camera_id: &str) -> Result<Bytes>;
}

/// Build the camera backend selected in configuration
///
/// # Errors
///
/// Returns `TimelapseError::Camera` if the backend cannot be constructed
pub fn from_config(config: &CameraConfig) -> Result<Arc<dyn Camera>> {
    match config.camera_type.as_str() {
        "http" => Ok(Arc::new(HttpSnapshotCamera::new(config.http.clone())?)),
        "command" => Ok(Arc::new(CommandCamera::new(config.command.clone())?)),
        other => Err(TimelapseError::Camera(format!("Unknown camera type: {}", other)).into()),
    }
}

/// Substitute `{camera_id}` in a template
pub(crate) fn render_template(template: &str, camera_id: &str) -> String {
    template.replace("{camera_id}", camera_id)
}
