//! Command-line interface definition for camera-timelapse
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands to serve the control surface, record a single
//! session in the foreground, and re-run assembly on stored frames.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// camera-timelapse - periodic camera capture and timelapse assembly
///
/// Captures stills from a camera at a fixed interval and assembles them
/// into a video with ffmpeg once the session ends.
#[derive(Parser, Debug, Clone)]
#[command(name = "camera-timelapse")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "TIMELAPSE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose (per-tick) logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Serve the HTTP control surface for the configured entities
    Serve {
        /// Override the listen address from config
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Record one timelapse in the foreground (Ctrl+C stops early)
    Record {
        /// Camera entity id (e.g. camera.front_door)
        #[arg(long)]
        camera: String,

        /// Seconds between captures (defaults to config)
        #[arg(short, long, allow_negative_numbers = true)]
        interval: Option<i64>,

        /// Total duration in minutes (defaults to config)
        #[arg(short, long, allow_negative_numbers = true)]
        duration: Option<i64>,

        /// Output directory (defaults to config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Assemble an existing frame directory into a video
    Assemble {
        /// Directory containing frame_NNNNNN files
        #[arg(short, long)]
        frames: PathBuf,

        /// Output video file
        #[arg(short, long)]
        output: PathBuf,

        /// Output frame rate (defaults to config)
        #[arg(long)]
        fps: Option<u32>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Resolve the configuration file path
    ///
    /// Uses `--config` when given, otherwise `config.yaml` in the platform
    /// config directory, falling back to `config/config.yaml`.
    pub fn config_path(&self) -> PathBuf {
        if let Some(path) = &self.config {
            return path.clone();
        }
        directories::ProjectDirs::from("", "", "camera-timelapse")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
            .unwrap_or_else(|| PathBuf::from("config/config.yaml"))
    }
}
