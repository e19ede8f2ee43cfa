//! camera-timelapse - periodic camera capture and timelapse assembly
//!
#![doc = "camera-timelapse - periodic camera capture and timelapse assembly"]
#![doc = "Main entry point for the camera-timelapse service."]

use anyhow::Result;

use camera_timelapse::cli::{Cli, Commands};
use camera_timelapse::commands;
use camera_timelapse::config::Config;
use camera_timelapse::logging::init_logging;
use camera_timelapse::metrics::init_metrics_exporter;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load and validate configuration
    let config_path = cli.config_path();
    let config = Config::load(&config_path, &cli)?;
    config.validate()?;

    init_logging(&config.logging)?;
    init_metrics_exporter();
    tracing::debug!("Loaded configuration from {}", config_path.display());

    match cli.command {
        Commands::Serve { bind } => {
            tracing::info!("Starting control surface");
            commands::serve::run_serve(config, bind).await?;
            Ok(())
        }
        Commands::Record {
            camera,
            interval,
            duration,
            output,
        } => {
            tracing::info!("Starting foreground recording for {}", camera);
            commands::record::run_record(config, camera, interval, duration, output).await?;
            Ok(())
        }
        Commands::Assemble {
            frames,
            output,
            fps,
        } => {
            tracing::info!("Assembling frames from {}", frames.display());
            commands::assemble::run_assemble(config, frames, output, fps).await?;
            Ok(())
        }
    }
}
