//! Test utilities for camera-timelapse
//!
//! Scripted camera and encoder fakes shared by the unit tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;

use crate::assembler::{EncodeJob, VideoEncoder};
use crate::camera::Camera;
use crate::error::{Result, TimelapseError};

/// Payload returned by [`ScriptedCamera`] on success
pub const FAKE_JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0xFF, 0xD9];

/// Camera that fails on chosen attempts (1-based) and succeeds otherwise
#[derive(Debug, Default)]
pub struct ScriptedCamera {
    failing: HashSet<u64>,
    always_fail: bool,
    calls: AtomicU64,
}

impl ScriptedCamera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(attempts: &[u64]) -> Self {
        Self {
            failing: attempts.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn always_failing() -> Self {
        Self {
            always_fail: true,
            ..Self::default()
        }
    }

    /// Capture attempts seen so far
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Camera for ScriptedCamera {
    async fn capture_still(&self, camera_id: &str) -> Result<Bytes> {
        let attempt = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.always_fail || self.failing.contains(&attempt) {
            return Err(TimelapseError::CaptureFailure {
                camera_id: camera_id.to_string(),
                message: format!("scripted failure on attempt {}", attempt),
            }
            .into());
        }
        Ok(Bytes::from_static(FAKE_JPEG))
    }
}

/// Encoder that writes a placeholder video, or fails when asked to
#[derive(Debug, Default)]
pub struct FakeEncoder {
    fail: bool,
    calls: AtomicUsize,
}

impl FakeEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Encode runs seen so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoEncoder for FakeEncoder {
    async fn encode(&self, job: &EncodeJob) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(TimelapseError::Encoding("ffmpeg exited with status 1".to_string()).into());
        }
        let body = format!("fake video: {} frames @ {} fps", job.frame_count, job.fps);
        tokio::fs::write(&job.output, body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_scripted_camera_fails_on_listed_attempts() {
        let camera = ScriptedCamera::failing_on(&[2]);
        assert!(camera.capture_still("camera.porch").await.is_ok());
        assert!(camera.capture_still("camera.porch").await.is_err());
        assert!(camera.capture_still("camera.porch").await.is_ok());
        assert_eq!(camera.calls(), 3);
    }

    #[tokio::test]
    async fn test_fake_encoder_writes_output() {
        let dir = TempDir::new().unwrap();
        let encoder = FakeEncoder::new();
        let job = EncodeJob {
            input_pattern: dir.path().join("frame_*.jpg").to_string_lossy().to_string(),
            frame_count: 3,
            output: dir.path().join("out.mp4"),
            fps: 30,
        };
        encoder.encode(&job).await.unwrap();
        assert!(std::fs::metadata(&job.output).unwrap().len() > 0);
        assert_eq!(encoder.calls(), 1);
    }
}
