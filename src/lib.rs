//! camera-timelapse - periodic camera capture and timelapse assembly
//!
//! This library captures still frames from a camera entity at a fixed
//! interval for a bounded duration, stores them as numbered images and
//! assembles them into a video with ffmpeg once the session ends.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `scheduler`: Session lifecycle, periodic ticking, stop and shutdown
//! - `session`: Session snapshots, states and start requests
//! - `frames`: Numbered frame files in a session directory
//! - `assembler`: Frame sequence to video via an external encoder
//! - `camera`: Still image sources (HTTP snapshot, external command)
//! - `entity` / `services` / `server`: Control surface
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use camera_timelapse::commands::build_scheduler;
//! use camera_timelapse::services::StartTimelapseCall;
//! use camera_timelapse::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     config.validate()?;
//!
//!     let scheduler = build_scheduler(&config)?;
//!     let request = StartTimelapseCall::new("camera.front_door").resolve(&config.timelapse)?;
//!     let handle = scheduler.start(request).await?;
//!     let session = handle.wait().await;
//!     println!("{:?} {}", session.state, session.output_file.display());
//!     Ok(())
//! }
//! ```

pub mod assembler;
pub mod camera;
pub mod cli;
pub mod commands;
pub mod config;
pub mod entity;
pub mod error;
pub mod frames;
pub mod logging;
pub mod metrics;
pub mod scheduler;
pub mod server;
pub mod services;
pub mod session;

// Re-export commonly used types
pub use assembler::{FfmpegEncoder, VideoAssembler, VideoEncoder};
pub use camera::Camera;
pub use config::Config;
pub use entity::TimelapseEntity;
pub use error::{ErrorKind, Result, TimelapseError};
pub use frames::{FrameRef, FrameStore};
pub use scheduler::{CaptureScheduler, SessionHandle};
pub use session::{Session, SessionState, StartRequest};

#[cfg(test)]
pub mod test_utils;
