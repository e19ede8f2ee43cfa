//! Video assembly from a session's stored frames
//!
//! [`VideoAssembler`] checks that a session produced frames, hands an
//! [`EncodeJob`] to a [`VideoEncoder`] and verifies that a non-empty video
//! came out. [`FfmpegEncoder`] is the production encoder; it runs `ffmpeg`
//! with a glob input over the frame directory.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::EncoderConfig;
use crate::error::{Result, TimelapseError};
use crate::frames::FrameStore;

/// Lines of encoder stderr kept in an error message
const STDERR_TAIL_LINES: usize = 20;

/// One encoder invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeJob {
    /// Glob matching the ordered input frames
    pub input_pattern: String,
    /// Number of frames found at assembly time
    pub frame_count: usize,
    /// Video file to produce
    pub output: PathBuf,
    /// Playback frame rate
    pub fps: u32,
}

/// External encoder turning a frame sequence into a video file
#[async_trait]
pub trait VideoEncoder: Send + Sync + std::fmt::Debug {
    /// Run the encoder to completion
    ///
    /// # Errors
    ///
    /// Returns `TimelapseError::Encoding` if the encoder cannot be started or
    /// exits unsuccessfully
    async fn encode(&self, job: &EncodeJob) -> Result<()>;
}

/// Builder for ffmpeg arguments
#[derive(Debug, Clone)]
pub struct FfmpegCommandBuilder {
    framerate: u32,
    input_pattern: String,
    video_codec: String,
    pixel_format: String,
    output_path: String,
}

impl FfmpegCommandBuilder {
    pub fn new(input_pattern: String, output_path: String) -> Self {
        Self {
            framerate: 30,
            input_pattern,
            video_codec: "libx264".to_string(),
            pixel_format: "yuv420p".to_string(),
            output_path,
        }
    }

    pub fn with_framerate(mut self, framerate: u32) -> Self {
        self.framerate = framerate;
        self
    }

    pub fn with_video_codec(mut self, codec: String) -> Self {
        self.video_codec = codec;
        self
    }

    pub fn with_pixel_format(mut self, pixel_format: String) -> Self {
        self.pixel_format = pixel_format;
        self
    }

    pub fn build(&self) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(), "error".to_string(),
            "-framerate".to_string(), self.framerate.to_string(),
            "-pattern_type".to_string(), "glob".to_string(),
            "-i".to_string(), self.input_pattern.clone(),
            "-c:v".to_string(), self.video_codec.clone(),
            "-pix_fmt".to_string(), self.pixel_format.clone(),
            self.output_path.clone(),
        ]
    }
}

/// Encoder that shells out to ffmpeg
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    config: EncoderConfig,
}

impl FfmpegEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    /// ffmpeg arguments for a job
    pub fn command_args(&self, job: &EncodeJob) -> Vec<String> {
        FfmpegCommandBuilder::new(
            job.input_pattern.clone(),
            job.output.to_string_lossy().to_string(),
        )
        .with_framerate(job.fps)
        .with_video_codec(self.config.video_codec.clone())
        .with_pixel_format(self.config.pixel_format.clone())
        .build()
    }
}

#[async_trait]
impl VideoEncoder for FfmpegEncoder {
    async fn encode(&self, job: &EncodeJob) -> Result<()> {
        let args = self.command_args(job);
        tracing::debug!(ffmpeg = %self.config.ffmpeg_path, ?args, "Executing ffmpeg");

        let output = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    TimelapseError::Encoding(format!(
                        "{} not found, cannot create timelapse",
                        self.config.ffmpeg_path
                    ))
                } else {
                    TimelapseError::Encoding(format!(
                        "failed to start {}: {}",
                        self.config.ffmpeg_path, e
                    ))
                }
            })?;

        if !output.status.success() {
            return Err(TimelapseError::Encoding(format!(
                "{} exited with {}: {}",
                self.config.ffmpeg_path,
                output.status,
                stderr_tail(&output.stderr)
            ))
            .into());
        }

        Ok(())
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    let tail = lines[start..].join("\n");
    if tail.trim().is_empty() {
        "Unknown error".to_string()
    } else {
        tail
    }
}

/// Turns a session's frames into its output video
#[derive(Debug, Clone)]
pub struct VideoAssembler {
    encoder: Arc<dyn VideoEncoder>,
    fps: u32,
}

impl VideoAssembler {
    /// Create an assembler playing frames back at `fps`
    pub fn new(encoder: Arc<dyn VideoEncoder>, fps: u32) -> Self {
        Self { encoder, fps }
    }

    /// Playback frame rate
    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Assemble every frame in `store` into `output`
    ///
    /// # Returns
    ///
    /// The path of the written video
    ///
    /// # Errors
    ///
    /// Returns `TimelapseError::NoFramesCaptured` without running the encoder
    /// when the store is empty, and `TimelapseError::Encoding` when the
    /// encoder fails or leaves no (or an empty) output file
    pub async fn assemble(&self, store: &FrameStore, output: &Path) -> Result<PathBuf> {
        let frames = store.list_ordered().await?;
        if frames.is_empty() {
            tracing::error!(dir = %store.dir().display(), "No frames found, cannot create timelapse");
            return Err(TimelapseError::NoFramesCaptured(store.dir().display().to_string()).into());
        }

        tracing::info!(
            frames = frames.len(),
            dir = %store.dir().display(),
            output = %output.display(),
            fps = self.fps,
            "Assembling timelapse"
        );

        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(TimelapseError::Io)?;
        }

        let job = EncodeJob {
            input_pattern: store.glob_pattern(),
            frame_count: frames.len(),
            output: output.to_path_buf(),
            fps: self.fps,
        };

        self.encoder
            .encode(&job)
            .await
            .map_err(|e| -> anyhow::Error {
                match e.downcast::<TimelapseError>() {
                    Ok(err @ TimelapseError::Encoding(_)) => err.into(),
                    Ok(other) => TimelapseError::Encoding(other.to_string()).into(),
                    Err(other) => TimelapseError::Encoding(other.to_string()).into(),
                }
            })?;

        match tokio::fs::metadata(output).await {
            Ok(meta) if meta.len() > 0 => {
                tracing::info!(output = %output.display(), bytes = meta.len(), "Timelapse generated");
                Ok(output.to_path_buf())
            }
            _ => Err(TimelapseError::Encoding(format!(
                "Output file does not exist or is empty: {}",
                output.display()
            ))
            .into()),
        }
    }
}
