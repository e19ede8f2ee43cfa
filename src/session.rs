//! Timelapse session records
//!
//! A [`Session`] is the observable state of one timelapse run. The session
//! task owns the authoritative copy and publishes snapshots; everything
//! else (control surface, HTTP handlers, CLI) reads clones.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{ErrorKind, Result, TimelapseError};
use crate::frames::MAX_FRAME_INDEX;

/// Lifecycle of a session
///
/// `Idle -> Capturing -> Assembling -> Completed`, with `Failed` reachable
/// from `Capturing` and `Assembling`. Nothing re-enters `Capturing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Capturing,
    Assembling,
    Completed,
    Failed,
}

impl SessionState {
    /// Session still owns its camera (capturing or assembling)
    pub fn is_active(self) -> bool {
        matches!(self, SessionState::Capturing | SessionState::Assembling)
    }

    /// Session can no longer change
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed)
    }

    /// Coarse status string shown on the control surface
    pub fn status(self) -> &'static str {
        match self {
            SessionState::Idle | SessionState::Completed => "idle",
            SessionState::Capturing => "recording",
            SessionState::Assembling => "processing",
            SessionState::Failed => "error",
        }
    }
}

/// Fatal error recorded on a failed session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionError {
    pub kind: ErrorKind,
    pub message: String,
}

impl SessionError {
    pub fn from_error(error: &anyhow::Error) -> Self {
        Self {
            kind: crate::error::kind_of(error),
            message: error.to_string(),
        }
    }
}

/// Parameters of a start request, before validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    /// Camera entity id
    pub camera_id: String,
    /// Seconds between capture attempts
    pub interval_seconds: i64,
    /// Total capture duration in minutes
    pub duration_minutes: i64,
    /// Directory receiving the session's frame directory and video
    pub output_path: PathBuf,
}

impl StartRequest {
    /// Validate the request and return `(interval, duration)`
    ///
    /// # Errors
    ///
    /// Returns `TimelapseError::InvalidConfig` when the camera id is empty,
    /// interval or duration is not positive, or the session would need more
    /// frame indices than a frame file name can hold
    ///
    /// # Examples
    ///
    /// ```
    /// use std::path::PathBuf;
    /// use std::time::Duration;
    /// use camera_timelapse::session::StartRequest;
    ///
    /// let request = StartRequest {
    ///     camera_id: "camera.porch".to_string(),
    ///     interval_seconds: 60,
    ///     duration_minutes: 1440,
    ///     output_path: PathBuf::from("/tmp"),
    /// };
    /// let (interval, duration) = request.validate().unwrap();
    /// assert_eq!(interval, Duration::from_secs(60));
    /// assert_eq!(duration, Duration::from_secs(86_400));
    /// ```
    pub fn validate(&self) -> Result<(Duration, Duration)> {
        if self.camera_id.trim().is_empty() {
            return Err(TimelapseError::InvalidConfig("camera id cannot be empty".to_string()).into());
        }
        if self.interval_seconds <= 0 {
            return Err(TimelapseError::InvalidConfig(format!(
                "interval must be greater than 0 seconds, got {}",
                self.interval_seconds
            ))
            .into());
        }
        if self.duration_minutes <= 0 {
            return Err(TimelapseError::InvalidConfig(format!(
                "duration must be greater than 0 minutes, got {}",
                self.duration_minutes
            ))
            .into());
        }

        let interval = self.interval_seconds as u64;
        let duration = (self.duration_minutes as u64)
            .checked_mul(60)
            .ok_or_else(|| TimelapseError::InvalidConfig("duration is too large".to_string()))?;

        let attempts = (duration + interval - 1) / interval;
        if attempts > MAX_FRAME_INDEX + 1 {
            return Err(TimelapseError::InvalidConfig(format!(
                "{} capture attempts exceed the frame limit of {}",
                attempts,
                MAX_FRAME_INDEX + 1
            ))
            .into());
        }

        Ok((Duration::from_secs(interval), Duration::from_secs(duration)))
    }
}

/// Snapshot of one timelapse run
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: Uuid,
    pub camera_id: String,
    pub interval_seconds: u64,
    pub duration_minutes: u64,
    pub frame_dir: PathBuf,
    pub output_file: PathBuf,
    pub started_at: DateTime<Utc>,
    /// Set when capturing ends (duration elapsed, stop, or failure)
    pub ended_at: Option<DateTime<Utc>>,
    pub state: SessionState,
    /// Frames successfully stored
    pub frame_count: u64,
    /// Capture attempts made so far
    pub attempts: u64,
    /// Index of the most recently stored frame
    pub last_index: Option<u64>,
    pub error: Option<SessionError>,
}

impl Session {
    pub(crate) fn new(
        camera_id: &str,
        interval: Duration,
        duration: Duration,
        frame_dir: PathBuf,
        output_file: PathBuf,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            camera_id: camera_id.to_string(),
            interval_seconds: interval.as_secs(),
            duration_minutes: duration.as_secs() / 60,
            frame_dir,
            output_file,
            started_at: Utc::now(),
            ended_at: None,
            state: SessionState::Capturing,
            frame_count: 0,
            attempts: 0,
            last_index: None,
            error: None,
        }
    }

    /// Configured total duration
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_minutes * 60)
    }

    /// When capturing ends if nobody stops the session
    pub fn scheduled_end(&self) -> DateTime<Utc> {
        self.started_at + chrono::Duration::seconds((self.duration_minutes * 60) as i64)
    }

    /// Time spent capturing, frozen once capturing ended
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        let end = self.ended_at.unwrap_or(now);
        (end - self.started_at).to_std().unwrap_or_default()
    }

    /// Capture progress in percent
    pub fn progress(&self, now: DateTime<Utc>) -> u8 {
        if self.state == SessionState::Completed {
            return 100;
        }
        let total = self.duration().as_secs_f64();
        if total <= 0.0 {
            return 0;
        }
        let ratio = self.elapsed(now).as_secs_f64() / total;
        (ratio * 100.0).clamp(0.0, 100.0) as u8
    }

    /// Capture time left, zero once capturing ended
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Duration {
        if self.state != SessionState::Capturing {
            return Duration::ZERO;
        }
        self.duration().saturating_sub(self.elapsed(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(interval: i64, duration: i64) -> StartRequest {
        StartRequest {
            camera_id: "camera.porch".to_string(),
            interval_seconds: interval,
            duration_minutes: duration,
            output_path: PathBuf::from("/tmp"),
        }
    }

    fn is_invalid(result: Result<(Duration, Duration)>) -> bool {
        matches!(
            result.unwrap_err().downcast_ref::<TimelapseError>(),
            Some(TimelapseError::InvalidConfig(_))
        )
    }

    #[test]
    fn test_validate_rejects_non_positive_values() {
        assert!(is_invalid(request(0, 10).validate()));
        assert!(is_invalid(request(-1, 10).validate()));
        assert!(is_invalid(request(10, 0).validate()));
        assert!(is_invalid(request(10, -3).validate()));
    }

    #[test]
    fn test_validate_rejects_empty_camera() {
        let mut req = request(10, 10);
        req.camera_id = " ".to_string();
        assert!(is_invalid(req.validate()));
    }

    #[test]
    fn test_validate_rejects_too_many_frames() {
        // 1s interval for 30 days needs 2.6M frames
        assert!(is_invalid(request(1, 30 * 24 * 60).validate()));
    }

    #[test]
    fn test_validate_accepts_defaults() {
        let (interval, duration) = request(60, 1440).validate().unwrap();
        assert_eq!(interval, Duration::from_secs(60));
        assert_eq!(duration, Duration::from_secs(86_400));
    }

    #[test]
    fn test_state_flags() {
        assert!(SessionState::Capturing.is_active());
        assert!(SessionState::Assembling.is_active());
        assert!(!SessionState::Completed.is_active());
        assert!(SessionState::Failed.is_terminal());
        assert!(!SessionState::Idle.is_terminal());
        assert_eq!(SessionState::Capturing.status(), "recording");
        assert_eq!(SessionState::Assembling.status(), "processing");
        assert_eq!(SessionState::Failed.status(), "error");
        assert_eq!(SessionState::Completed.status(), "idle");
    }

    #[test]
    fn test_progress_and_remaining() {
        let mut session = Session::new(
            "camera.porch",
            Duration::from_secs(60),
            Duration::from_secs(600),
            PathBuf::from("/tmp/f"),
            PathBuf::from("/tmp/f.mp4"),
        );
        let halfway = session.started_at + chrono::Duration::seconds(300);
        assert_eq!(session.progress(halfway), 50);
        assert_eq!(session.time_remaining(halfway), Duration::from_secs(300));

        let later = session.started_at + chrono::Duration::seconds(900);
        assert_eq!(session.progress(later), 100);
        assert_eq!(session.time_remaining(later), Duration::ZERO);

        session.state = SessionState::Assembling;
        session.ended_at = Some(halfway);
        assert_eq!(session.elapsed(later), Duration::from_secs(300));
        assert_eq!(session.time_remaining(later), Duration::ZERO);

        session.state = SessionState::Completed;
        assert_eq!(session.progress(later), 100);
    }

    #[test]
    fn test_scheduled_end() {
        let session = Session::new(
            "camera.porch",
            Duration::from_secs(60),
            Duration::from_secs(120),
            PathBuf::from("/tmp/f"),
            PathBuf::from("/tmp/f.mp4"),
        );
        assert_eq!(
            session.scheduled_end() - session.started_at,
            chrono::Duration::seconds(120)
        );
    }
}
