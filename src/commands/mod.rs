/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

- `serve`   : HTTP control surface for the configured camera entities
- `record`  : One timelapse in the foreground
- `assemble`: Re-run assembly over an existing frame directory

Handlers are thin: they build the camera, encoder and scheduler from
configuration and delegate to the library.
*/

use std::sync::Arc;

use crate::assembler::{FfmpegEncoder, VideoAssembler};
use crate::camera;
use crate::config::Config;
use crate::error::Result;
use crate::scheduler::{CaptureScheduler, SchedulerOptions};

/// Build the assembler from encoder configuration
pub fn build_assembler(config: &Config, fps: Option<u32>) -> VideoAssembler {
    let encoder = Arc::new(FfmpegEncoder::new(config.encoder.clone()));
    VideoAssembler::new(encoder, fps.unwrap_or(config.encoder.output_fps))
}

/// Build a scheduler wired to the configured camera and encoder
///
/// # Errors
///
/// Returns `TimelapseError::Camera` if the camera backend cannot be built
pub fn build_scheduler(config: &Config) -> Result<CaptureScheduler> {
    let camera = camera::from_config(&config.camera)?;
    Ok(CaptureScheduler::new(
        camera,
        build_assembler(config, None),
        SchedulerOptions::from(&config.timelapse),
    ))
}

/// Resolves on Ctrl+C
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

// Control surface server
pub mod serve {
    //! Serve the HTTP control surface until Ctrl+C, then stop every active
    //! session and wait for its assembly.

    use super::*;
    use crate::server;
    use crate::services::TimelapseService;

    /// Run the control surface
    ///
    /// # Arguments
    ///
    /// * `config` - Loaded configuration
    /// * `bind` - Listen address overriding `server.bind`
    ///
    /// # Errors
    ///
    /// Returns an error if the scheduler cannot be built, an entity id is
    /// invalid, or the address cannot be bound
    pub async fn run_serve(config: Config, bind: Option<String>) -> Result<()> {
        let scheduler = build_scheduler(&config)?;
        let service = Arc::new(TimelapseService::new(
            scheduler.clone(),
            config.timelapse.clone(),
            &config.server.entities,
        )?);

        let bind = bind.unwrap_or_else(|| config.server.bind.clone());
        tracing::info!(
            bind = %bind,
            entities = config.server.entities.len(),
            camera = %config.camera.camera_type,
            "Starting control surface"
        );

        server::serve(service, &bind, shutdown_signal()).await?;

        for session in scheduler.shutdown().await {
            tracing::info!(
                camera_id = %session.camera_id,
                state = ?session.state,
                frames = session.frame_count,
                "Session finished during shutdown"
            );
        }
        Ok(())
    }
}

// Foreground recording
pub mod record {
    //! Record a single timelapse in the foreground. Ctrl+C ends capturing
    //! early; the captured frames are still assembled.

    use super::*;
    use crate::services::StartTimelapseCall;
    use crate::session::SessionState;
    use std::path::PathBuf;

    /// Record one timelapse and print the video path
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot start or ends `Failed`
    pub async fn run_record(
        config: Config,
        camera: String,
        interval: Option<i64>,
        duration: Option<i64>,
        output: Option<PathBuf>,
    ) -> Result<()> {
        let scheduler = build_scheduler(&config)?;
        let call = StartTimelapseCall {
            entity_id: camera,
            interval,
            duration,
            output_path: output,
        };
        let handle = scheduler.start(call.resolve(&config.timelapse)?).await?;

        tokio::select! {
            _ = handle.wait() => {}
            _ = shutdown_signal() => {
                tracing::info!("Interrupt received, stopping capture");
                handle.stop().await;
            }
        }

        let session = handle.wait().await;
        match (session.state, session.error) {
            (SessionState::Completed, _) => {
                println!("{}", session.output_file.display());
                Ok(())
            }
            (_, Some(error)) => Err(anyhow::anyhow!(error.message)),
            (state, None) => Err(anyhow::anyhow!("Timelapse ended in state {:?}", state)),
        }
    }
}

// Manual assembly
pub mod assemble {
    //! Assemble an existing frame directory, e.g. after an encoder failure
    //! left a session `Failed` with its frames on disk.

    use super::*;
    use crate::error::TimelapseError;
    use crate::frames::FrameStore;
    use std::path::PathBuf;

    /// Assemble `frames` into `output` and print the video path
    ///
    /// # Errors
    ///
    /// Returns `TimelapseError::NoFramesCaptured` for an empty directory and
    /// `TimelapseError::Encoding` if the encoder fails
    pub async fn run_assemble(
        config: Config,
        frames: PathBuf,
        output: PathBuf,
        fps: Option<u32>,
    ) -> Result<()> {
        if fps == Some(0) {
            return Err(TimelapseError::InvalidConfig("fps must be greater than 0".to_string()).into());
        }

        let store = FrameStore::open(&frames, &config.timelapse.frame_extension);
        let assembler = build_assembler(&config, fps);
        let path = assembler.assemble(&store, &output).await?;
        println!("{}", path.display());
        Ok(())
    }
}
