use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use camera_timelapse::assembler::{EncodeJob, VideoAssembler, VideoEncoder};
use camera_timelapse::camera::Camera;
use camera_timelapse::scheduler::{CaptureScheduler, SchedulerOptions};
use camera_timelapse::{Result, TimelapseError};
use tempfile::TempDir;

#[allow(dead_code)]
pub const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0xFF, 0xD9];

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

#[allow(dead_code)]
pub fn write_frames(dir: &std::path::Path, count: u64) {
    fs::create_dir_all(dir).expect("failed to create frame dir");
    for i in 0..count {
        fs::write(dir.join(format!("frame_{:06}.jpg", i)), JPEG).expect("failed to write frame");
    }
}

/// Camera failing on the listed 1-based attempts
#[derive(Debug, Default)]
pub struct FlakyCamera {
    failing: HashSet<u64>,
    calls: AtomicU64,
}

#[allow(dead_code)]
impl FlakyCamera {
    pub fn new(failing: &[u64]) -> Self {
        Self {
            failing: failing.iter().copied().collect(),
            calls: AtomicU64::new(0),
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Camera for FlakyCamera {
    async fn capture_still(&self, camera_id: &str) -> Result<Bytes> {
        let attempt = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing.contains(&attempt) {
            return Err(TimelapseError::CaptureFailure {
                camera_id: camera_id.to_string(),
                message: format!("attempt {} failed", attempt),
            }
            .into());
        }
        Ok(Bytes::from_static(JPEG))
    }
}

/// Encoder recording its jobs and writing a placeholder video
#[derive(Debug, Default)]
pub struct RecordingEncoder {
    pub jobs: std::sync::Mutex<Vec<EncodeJob>>,
    calls: AtomicUsize,
}

#[allow(dead_code)]
impl RecordingEncoder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoEncoder for RecordingEncoder {
    async fn encode(&self, job: &EncodeJob) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.jobs.lock().expect("jobs lock").push(job.clone());
        tokio::fs::write(&job.output, b"video").await?;
        Ok(())
    }
}

#[allow(dead_code)]
pub fn scheduler(camera: Arc<dyn Camera>, encoder: Arc<RecordingEncoder>) -> CaptureScheduler {
    CaptureScheduler::new(
        camera,
        VideoAssembler::new(encoder, 30),
        SchedulerOptions::default(),
    )
}
