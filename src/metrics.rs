//! Capture and assembly metrics
//!
//! Every metric is labeled by camera entity id.
//!
//! # Metrics
//!
//! - `timelapse_sessions_total`: Counter of started sessions
//! - `timelapse_active_sessions`: Gauge of sessions not yet finished
//! - `timelapse_frames_captured_total`: Counter of stored frames
//! - `timelapse_capture_failures_total`: Counter of failed camera grabs
//! - `timelapse_frame_write_failures_total`: Counter of failed frame writes
//! - `timelapse_assembly_duration_seconds`: Histogram of encoder runtime
//! - `timelapse_session_outcomes_total`: Counter of finished sessions by outcome
//!
//! # Examples
//!
//! ```
//! use camera_timelapse::metrics::SessionMetrics;
//!
//! let metrics = SessionMetrics::new("camera.porch");
//! metrics.record_frame();
//! metrics.record_outcome("completed");
//! ```

use metrics::{decrement_gauge, histogram, increment_counter, increment_gauge};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Metrics for one timelapse session
///
/// Increments the active-session gauge on creation and decrements it
/// exactly once, either in [`SessionMetrics::record_outcome`] or on drop.
#[derive(Debug)]
pub struct SessionMetrics {
    camera_id: String,
    recorded: AtomicBool,
}

impl SessionMetrics {
    /// Start tracking a session for `camera_id`
    pub fn new(camera_id: &str) -> Self {
        increment_counter!("timelapse_sessions_total", "camera" => camera_id.to_string());
        increment_gauge!("timelapse_active_sessions", 1.0, "camera" => camera_id.to_string());

        Self {
            camera_id: camera_id.to_string(),
            recorded: AtomicBool::new(false),
        }
    }

    /// A frame was stored
    pub fn record_frame(&self) {
        increment_counter!("timelapse_frames_captured_total", "camera" => self.camera_id.clone());
    }

    /// The camera did not deliver a still
    pub fn record_capture_failure(&self) {
        increment_counter!("timelapse_capture_failures_total", "camera" => self.camera_id.clone());
    }

    /// A still could not be written to disk
    pub fn record_write_failure(&self) {
        increment_counter!(
            "timelapse_frame_write_failures_total",
            "camera" => self.camera_id.clone()
        );
    }

    /// Time spent in the encoder
    pub fn record_assembly(&self, elapsed: Duration, status: &str) {
        histogram!(
            "timelapse_assembly_duration_seconds",
            elapsed.as_secs_f64(),
            "camera" => self.camera_id.clone(),
            "status" => status.to_string()
        );
    }

    /// Session reached a terminal state ("completed", "failed")
    pub fn record_outcome(&self, outcome: &str) {
        if self.recorded.swap(true, Ordering::SeqCst) {
            return;
        }

        increment_counter!(
            "timelapse_session_outcomes_total",
            "camera" => self.camera_id.clone(),
            "outcome" => outcome.to_string()
        );
        decrement_gauge!("timelapse_active_sessions", 1.0, "camera" => self.camera_id.clone());
    }

    /// Camera label
    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }
}

impl Drop for SessionMetrics {
    fn drop(&mut self) {
        if !self.recorded.load(Ordering::SeqCst) {
            decrement_gauge!("timelapse_active_sessions", 1.0, "camera" => self.camera_id.clone());
        }
    }
}

/// Initializes the metrics exporter for Prometheus
///
/// When the `prometheus` feature is enabled this installs the Prometheus
/// exporter with its default listener. Otherwise it does nothing.
pub fn init_metrics_exporter() {
    #[cfg(feature = "prometheus")]
    {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let builder = PrometheusBuilder::new();
        let _ = builder.install().map_err(|e| {
            tracing::warn!("Failed to install Prometheus exporter: {}", e);
        });
    }
}
