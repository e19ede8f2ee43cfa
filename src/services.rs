//! Service calls
//!
//! `start_timelapse` and `stop_timelapse` are the declarative entry points of
//! the control surface. Calls carry optional parameters which are resolved
//! against the configured defaults before they reach the scheduler.

use std::collections::BTreeMap;
use std::path::PathBuf;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::TimelapseConfig;
use crate::entity::TimelapseEntity;
use crate::error::{Result, TimelapseError};
use crate::scheduler::CaptureScheduler;
use crate::session::{Session, StartRequest};

/// `<domain>.<object_id>`, lowercase
const ENTITY_ID_PATTERN: &str = r"^[a-z0-9_]+\.[a-z0-9_]+$";

/// Check that `entity_id` looks like `<domain>.<object_id>`
///
/// # Errors
///
/// Returns `TimelapseError::InvalidConfig` for anything else
///
/// # Examples
///
/// ```
/// use camera_timelapse::services::validate_entity_id;
///
/// assert!(validate_entity_id("camera.front_door").is_ok());
/// assert!(validate_entity_id("Front Door").is_err());
/// ```
pub fn validate_entity_id(entity_id: &str) -> Result<()> {
    let pattern = Regex::new(ENTITY_ID_PATTERN)
        .map_err(|e| anyhow::anyhow!("Invalid entity id pattern: {}", e))?;
    if pattern.is_match(entity_id) {
        Ok(())
    } else {
        Err(TimelapseError::InvalidConfig(format!("invalid entity id: {:?}", entity_id)).into())
    }
}

/// `start_timelapse` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartTimelapseCall {
    pub entity_id: String,
    /// Seconds between captures, configured default when absent
    #[serde(default)]
    pub interval: Option<i64>,
    /// Minutes to capture for, configured default when absent
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub output_path: Option<PathBuf>,
}

impl StartTimelapseCall {
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            interval: None,
            duration: None,
            output_path: None,
        }
    }

    /// Fill in defaults and build the scheduler request
    ///
    /// # Errors
    ///
    /// Returns `TimelapseError::InvalidConfig` if the entity id is malformed
    pub fn resolve(&self, defaults: &TimelapseConfig) -> Result<StartRequest> {
        validate_entity_id(&self.entity_id)?;
        Ok(StartRequest {
            camera_id: self.entity_id.clone(),
            interval_seconds: self.interval.unwrap_or(defaults.default_interval),
            duration_minutes: self.duration.unwrap_or(defaults.default_duration),
            output_path: self
                .output_path
                .clone()
                .unwrap_or_else(|| defaults.default_output_path.clone()),
        })
    }
}

/// `stop_timelapse` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopTimelapseCall {
    pub entity_id: String,
}

/// Service registry: the scheduler plus the exposed camera entities
#[derive(Debug, Clone)]
pub struct TimelapseService {
    scheduler: CaptureScheduler,
    defaults: TimelapseConfig,
    entities: BTreeMap<String, TimelapseEntity>,
}

impl TimelapseService {
    /// Register one entity per id in `entity_ids`
    ///
    /// # Errors
    ///
    /// Returns `TimelapseError::InvalidConfig` for a malformed entity id
    pub fn new(
        scheduler: CaptureScheduler,
        defaults: TimelapseConfig,
        entity_ids: &[String],
    ) -> Result<Self> {
        let mut entities = BTreeMap::new();
        for id in entity_ids {
            validate_entity_id(id)?;
            entities.insert(
                id.clone(),
                TimelapseEntity::new(id, scheduler.clone(), defaults.clone()),
            );
        }
        tracing::debug!(count = entities.len(), "Registered timelapse entities");

        Ok(Self {
            scheduler,
            defaults,
            entities,
        })
    }

    pub fn scheduler(&self) -> &CaptureScheduler {
        &self.scheduler
    }

    /// Handle a `start_timelapse` call
    ///
    /// # Errors
    ///
    /// Returns `TimelapseError::InvalidConfig` or
    /// `TimelapseError::AlreadyRunning` as raised by the scheduler
    pub async fn start_timelapse(&self, call: &StartTimelapseCall) -> Result<Session> {
        let request = call.resolve(&self.defaults)?;
        let handle = self.scheduler.start(request).await?;
        Ok(handle.snapshot())
    }

    /// Handle a `stop_timelapse` call
    ///
    /// # Errors
    ///
    /// Returns `TimelapseError::NotFound` if the camera never had a session
    pub async fn stop_timelapse(&self, call: &StopTimelapseCall) -> Result<Session> {
        validate_entity_id(&call.entity_id)?;
        self.scheduler.stop(&call.entity_id).await
    }

    /// Registered entity for `entity_id`
    ///
    /// # Errors
    ///
    /// Returns `TimelapseError::NotFound` for an unregistered id
    pub fn entity(&self, entity_id: &str) -> Result<&TimelapseEntity> {
        self.entities
            .get(entity_id)
            .ok_or_else(|| TimelapseError::NotFound(format!("no entity {}", entity_id)).into())
    }

    /// Registered entities in id order
    pub fn entities(&self) -> impl Iterator<Item = &TimelapseEntity> {
        self.entities.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::VideoAssembler;
    use crate::error::ErrorKind;
    use crate::scheduler::SchedulerOptions;
    use crate::session::SessionState;
    use crate::test_utils::{FakeEncoder, ScriptedCamera};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn service(dir: &TempDir) -> TimelapseService {
        let scheduler = CaptureScheduler::new(
            Arc::new(ScriptedCamera::new()),
            VideoAssembler::new(Arc::new(FakeEncoder::new()), 30),
            SchedulerOptions::default(),
        );
        let defaults = TimelapseConfig {
            default_output_path: dir.path().to_path_buf(),
            ..TimelapseConfig::default()
        };
        TimelapseService::new(scheduler, defaults, &["camera.porch".to_string()]).unwrap()
    }

    #[test]
    fn test_validate_entity_id() {
        assert!(validate_entity_id("camera.front_door").is_ok());
        assert!(validate_entity_id("camera.cam_2").is_ok());
        assert!(validate_entity_id("camera").is_err());
        assert!(validate_entity_id("Camera.Porch").is_err());
        assert!(validate_entity_id("camera.porch.extra").is_err());
        assert!(validate_entity_id("camera.").is_err());
        assert!(validate_entity_id("").is_err());
    }

    #[test]
    fn test_start_call_uses_defaults() {
        let defaults = TimelapseConfig::default();
        let request = StartTimelapseCall::new("camera.porch").resolve(&defaults).unwrap();
        assert_eq!(request.camera_id, "camera.porch");
        assert_eq!(request.interval_seconds, 60);
        assert_eq!(request.duration_minutes, 1440);
        assert_eq!(request.output_path, PathBuf::from("/config/timelapses"));
    }

    #[test]
    fn test_start_call_overrides_defaults() {
        let call: StartTimelapseCall = serde_json::from_str(
            r#"{"entity_id": "camera.porch", "interval": 5, "duration": 30, "output_path": "/tmp/tl"}"#,
        )
        .unwrap();
        let request = call.resolve(&TimelapseConfig::default()).unwrap();
        assert_eq!(request.interval_seconds, 5);
        assert_eq!(request.duration_minutes, 30);
        assert_eq!(request.output_path, PathBuf::from("/tmp/tl"));
    }

    #[test]
    fn test_start_call_rejects_bad_entity() {
        let err = StartTimelapseCall::new("not an entity")
            .resolve(&TimelapseConfig::default())
            .unwrap_err();
        assert_eq!(crate::error::kind_of(&err), ErrorKind::InvalidConfig);
    }

    #[test]
    fn test_new_rejects_bad_entity() {
        let dir = TempDir::new().unwrap();
        let scheduler = service(&dir).scheduler().clone();
        let result = TimelapseService::new(
            scheduler,
            TimelapseConfig::default(),
            &["Porch Camera".to_string()],
        );
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_and_stop_through_services() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);

        let mut call = StartTimelapseCall::new("camera.porch");
        call.interval = Some(10);
        call.duration = Some(5);
        let session = service.start_timelapse(&call).await.unwrap();
        assert_eq!(session.state, SessionState::Capturing);
        assert!(session.frame_dir.starts_with(dir.path()));

        let err = service.start_timelapse(&call).await.unwrap_err();
        assert_eq!(crate::error::kind_of(&err), ErrorKind::AlreadyRunning);

        let stopped = service
            .stop_timelapse(&StopTimelapseCall {
                entity_id: "camera.porch".to_string(),
            })
            .await
            .unwrap();
        assert_ne!(stopped.state, SessionState::Capturing);
    }

    #[tokio::test]
    async fn test_stop_without_session_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = service(&dir)
            .stop_timelapse(&StopTimelapseCall {
                entity_id: "camera.garden".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(crate::error::kind_of(&err), ErrorKind::NotFound);
    }

    #[test]
    fn test_entity_lookup() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        assert!(service.entity("camera.porch").is_ok());
        assert!(service.entity("camera.garden").is_err());
        assert_eq!(service.entities().count(), 1);
    }
}
