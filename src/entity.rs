//! Toggle-style control surface for one camera
//!
//! A [`TimelapseEntity`] is "on" while its camera is capturing. Turning it on
//! starts a session with the configured defaults (overridable per call);
//! turning it off stops the running session. Its attributes summarize the
//! camera's most recent session.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::TimelapseConfig;
use crate::error::{ErrorKind, Result};
use crate::scheduler::CaptureScheduler;
use crate::services::StartTimelapseCall;
use crate::session::{Session, SessionState};

/// Optional overrides for [`TimelapseEntity::turn_on`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnOnParams {
    #[serde(default)]
    pub interval: Option<i64>,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub output_path: Option<PathBuf>,
}

/// Readable state of an entity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityAttributes {
    pub entity_id: String,
    /// "on" while capturing
    pub state: &'static str,
    /// idle, recording, processing or error
    pub status: &'static str,
    pub frame_count: u64,
    /// Seconds spent capturing
    pub elapsed_time: u64,
    /// Percent of the configured duration
    pub progress: u8,
    /// Seconds of capturing left
    pub time_remaining: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

impl EntityAttributes {
    fn idle(entity_id: &str) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            state: "off",
            status: SessionState::Idle.status(),
            frame_count: 0,
            elapsed_time: 0,
            progress: 0,
            time_remaining: 0,
            session_id: None,
            output_file: None,
            error_kind: None,
            error_message: None,
            interval: None,
            duration: None,
            start_time: None,
            end_time: None,
        }
    }

    /// Summarize `session` as seen at `now`
    pub fn from_session(entity_id: &str, session: &Session, now: DateTime<Utc>) -> Self {
        let capturing = session.state == SessionState::Capturing;
        Self {
            entity_id: entity_id.to_string(),
            state: if capturing { "on" } else { "off" },
            status: session.state.status(),
            frame_count: session.frame_count,
            elapsed_time: session.elapsed(now).as_secs(),
            progress: session.progress(now),
            time_remaining: session.time_remaining(now).as_secs(),
            session_id: Some(session.id.to_string()),
            output_file: (session.state == SessionState::Completed)
                .then(|| session.output_file.clone()),
            error_kind: session.error.as_ref().map(|e| e.kind),
            error_message: session.error.as_ref().map(|e| e.message.clone()),
            interval: Some(session.interval_seconds),
            duration: Some(session.duration_minutes),
            start_time: Some(session.started_at),
            end_time: Some(session.ended_at.unwrap_or_else(|| session.scheduled_end())),
        }
    }
}

/// Control surface for one camera entity
#[derive(Debug, Clone)]
pub struct TimelapseEntity {
    camera_id: String,
    scheduler: CaptureScheduler,
    defaults: TimelapseConfig,
}

impl TimelapseEntity {
    pub fn new(camera_id: &str, scheduler: CaptureScheduler, defaults: TimelapseConfig) -> Self {
        Self {
            camera_id: camera_id.to_string(),
            scheduler,
            defaults,
        }
    }

    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }

    /// Start a session for this camera
    ///
    /// # Errors
    ///
    /// Returns `TimelapseError::InvalidConfig` or
    /// `TimelapseError::AlreadyRunning` from the scheduler
    pub async fn turn_on(&self, params: TurnOnParams) -> Result<Session> {
        let call = StartTimelapseCall {
            entity_id: self.camera_id.clone(),
            interval: params.interval,
            duration: params.duration,
            output_path: params.output_path,
        };
        let request = call.resolve(&self.defaults)?;
        let handle = self.scheduler.start(request).await?;
        Ok(handle.snapshot())
    }

    /// Stop this camera's session
    ///
    /// Returns `None` if the camera never had a session.
    pub async fn turn_off(&self) -> Option<Session> {
        let handle = self.scheduler.handle(&self.camera_id).await?;
        tracing::info!(camera_id = %self.camera_id, "Turning timelapse off");
        Some(handle.stop().await)
    }

    /// Whether the camera is capturing
    pub async fn is_on(&self) -> bool {
        self.scheduler
            .session(&self.camera_id)
            .await
            .map(|s| s.state == SessionState::Capturing)
            .unwrap_or(false)
    }

    /// Current attributes
    pub async fn attributes(&self) -> EntityAttributes {
        match self.scheduler.session(&self.camera_id).await {
            Some(session) => EntityAttributes::from_session(&self.camera_id, &session, Utc::now()),
            None => EntityAttributes::idle(&self.camera_id),
        }
    }
}
