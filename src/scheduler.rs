//! Capture scheduling
//!
//! [`CaptureScheduler`] owns at most one active session per camera. Each
//! session runs as its own task: it ticks at the configured interval, grabs a
//! still from the camera, appends it to the session's [`FrameStore`], and
//! hands the frames to the [`VideoAssembler`] once capturing ends. The task is
//! the only writer of its [`Session`]; callers observe it through a
//! [`SessionHandle`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Utc};
use tokio::sync::{watch, Mutex};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::assembler::VideoAssembler;
use crate::camera::Camera;
use crate::config::TimelapseConfig;
use crate::error::{Result, TimelapseError};
use crate::frames::{FrameRef, FrameStore};
use crate::metrics::SessionMetrics;
use crate::session::{Session, SessionError, SessionState, StartRequest};

/// Scheduler behavior shared by every session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Frame file extension
    pub frame_extension: String,
    /// Remove frames after a successful assembly
    pub cleanup_frames: bool,
    /// Fail the session after this many consecutive failed ticks
    pub max_consecutive_failures: Option<u32>,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            frame_extension: "jpg".to_string(),
            cleanup_frames: false,
            max_consecutive_failures: None,
        }
    }
}

impl From<&TimelapseConfig> for SchedulerOptions {
    fn from(config: &TimelapseConfig) -> Self {
        Self {
            frame_extension: config.frame_extension.clone(),
            cleanup_frames: config.cleanup_frames,
            max_consecutive_failures: config.max_consecutive_failures,
        }
    }
}

/// Observer and stop switch for one session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    status: watch::Receiver<Session>,
    stop: CancellationToken,
}

impl SessionHandle {
    /// Current snapshot
    pub fn snapshot(&self) -> Session {
        self.status.borrow().clone()
    }

    /// Whether the session still owns its camera
    pub fn is_active(&self) -> bool {
        self.status.borrow().state.is_active()
    }

    /// Request the end of capturing and wait until capturing has ended
    ///
    /// Idempotent. Has no effect once the session is assembling or finished;
    /// assembly always runs to completion.
    pub async fn stop(&self) -> Session {
        self.stop.cancel();
        self.wait_until(|s| s.state != SessionState::Capturing).await
    }

    /// Wait for the session to reach `Completed` or `Failed`
    pub async fn wait(&self) -> Session {
        self.wait_until(|s| s.state.is_terminal()).await
    }

    async fn wait_until(&self, done: impl FnMut(&Session) -> bool) -> Session {
        let mut rx = self.status.clone();
        let result = rx.wait_for(done).await.map(|s| (*s).clone());
        // The task drops its sender only after publishing a terminal state
        result.unwrap_or_else(|_| rx.borrow().clone())
    }
}

struct SchedulerInner {
    camera: Arc<dyn Camera>,
    assembler: VideoAssembler,
    options: SchedulerOptions,
    sessions: Mutex<HashMap<String, SessionHandle>>,
}

/// Starts, stops and tracks timelapse sessions
///
/// Cloning is cheap; clones share the same session registry.
#[derive(Clone)]
pub struct CaptureScheduler {
    inner: Arc<SchedulerInner>,
}

impl std::fmt::Debug for CaptureScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureScheduler")
            .field("camera", &self.inner.camera)
            .field("assembler", &self.inner.assembler)
            .field("options", &self.inner.options)
            .finish()
    }
}

impl CaptureScheduler {
    pub fn new(camera: Arc<dyn Camera>, assembler: VideoAssembler, options: SchedulerOptions) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                camera,
                assembler,
                options,
                sessions: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Start a session for `request.camera_id`
    ///
    /// Creates the session's frame directory under `request.output_path` and
    /// spawns the capture task. The first capture happens immediately.
    ///
    /// # Errors
    ///
    /// Returns `TimelapseError::InvalidConfig` for bad parameters,
    /// `TimelapseError::AlreadyRunning` when the camera has a session that is
    /// still capturing or assembling, and `TimelapseError::Io` if the frame
    /// directory cannot be created
    pub async fn start(&self, request: StartRequest) -> Result<SessionHandle> {
        let (interval, duration) = request.validate()?;
        let camera_id = request.camera_id.clone();

        let mut sessions = self.inner.sessions.lock().await;
        if let Some(existing) = sessions.get(&camera_id) {
            if existing.is_active() {
                return Err(TimelapseError::AlreadyRunning(camera_id).into());
            }
        }

        let (frame_dir, output_file) = session_paths(&request.output_path, &camera_id).await;
        let store = FrameStore::create(&frame_dir, &self.inner.options.frame_extension).await?;

        let session = Session::new(&camera_id, interval, duration, frame_dir, output_file);
        tracing::info!(
            camera_id = %camera_id,
            session_id = %session.id,
            interval_seconds = session.interval_seconds,
            duration_minutes = session.duration_minutes,
            frame_dir = %session.frame_dir.display(),
            "Started timelapse"
        );

        let (status_tx, status_rx) = watch::channel(session);
        let stop = CancellationToken::new();
        let handle = SessionHandle {
            status: status_rx,
            stop: stop.clone(),
        };

        let runner = SessionRunner {
            camera_id: camera_id.clone(),
            camera: Arc::clone(&self.inner.camera),
            store,
            assembler: self.inner.assembler.clone(),
            options: self.inner.options.clone(),
            metrics: SessionMetrics::new(&camera_id),
            status: status_tx,
            next_index: 0,
            consecutive_failures: 0,
        };
        tokio::spawn(runner.run(stop, interval, duration));

        sessions.insert(camera_id, handle.clone());
        Ok(handle)
    }

    /// Stop the session for `camera_id`
    ///
    /// Returns the snapshot taken once capturing has ended. Stopping a
    /// session that is assembling or finished changes nothing.
    ///
    /// # Errors
    ///
    /// Returns `TimelapseError::NotFound` if the camera never had a session
    pub async fn stop(&self, camera_id: &str) -> Result<Session> {
        let handle = self
            .handle(camera_id)
            .await
            .ok_or_else(|| TimelapseError::NotFound(format!("no timelapse for {}", camera_id)))?;
        tracing::info!(camera_id = %camera_id, "Stopping timelapse");
        Ok(handle.stop().await)
    }

    /// Handle of the most recent session for `camera_id`
    pub async fn handle(&self, camera_id: &str) -> Option<SessionHandle> {
        self.inner.sessions.lock().await.get(camera_id).cloned()
    }

    /// Snapshot of the most recent session for `camera_id`
    pub async fn session(&self, camera_id: &str) -> Option<Session> {
        self.handle(camera_id).await.map(|h| h.snapshot())
    }

    /// Snapshots of the most recent session of every camera
    pub async fn sessions(&self) -> Vec<Session> {
        let sessions = self.inner.sessions.lock().await;
        let mut list: Vec<Session> = sessions.values().map(|h| h.snapshot()).collect();
        list.sort_by(|a, b| a.camera_id.cmp(&b.camera_id));
        list
    }

    /// Stop every active session and wait for each to finish
    pub async fn shutdown(&self) -> Vec<Session> {
        let handles: Vec<SessionHandle> = {
            let sessions = self.inner.sessions.lock().await;
            sessions.values().filter(|h| h.is_active()).cloned().collect()
        };
        if handles.is_empty() {
            return Vec::new();
        }

        tracing::info!(count = handles.len(), "Shutting down active timelapses");
        futures::future::join_all(handles.iter().map(|h| async move {
            h.stop().await;
            h.wait().await
        }))
        .await
    }
}

/// Object id part of an entity id (`camera.porch` -> `porch`)
pub(crate) fn camera_name(camera_id: &str) -> &str {
    camera_id
        .split_once('.')
        .map(|(_, name)| name)
        .unwrap_or(camera_id)
}

/// Pick a fresh frame directory and video path for a new session
async fn session_paths(output_path: &Path, camera_id: &str) -> (PathBuf, PathBuf) {
    let stem = format!(
        "timelapse_{}_{}",
        camera_name(camera_id),
        Local::now().format("%Y%m%d_%H%M%S")
    );

    let mut candidate = stem.clone();
    let mut n = 2;
    loop {
        let frame_dir = output_path.join(&candidate);
        let output_file = output_path.join(format!("{}.mp4", candidate));
        let taken = tokio::fs::metadata(&frame_dir).await.is_ok()
            || tokio::fs::metadata(&output_file).await.is_ok();
        if !taken {
            return (frame_dir, output_file);
        }
        candidate = format!("{}_{}", stem, n);
        n += 1;
    }
}

/// Why capturing ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaptureEnd {
    DurationElapsed,
    Stopped,
}

/// Result of one capture attempt
#[derive(Debug)]
pub(crate) enum TickOutcome {
    Stored(FrameRef),
    CaptureFailed,
    WriteFailed,
}

/// Task state of one session
struct SessionRunner {
    camera_id: String,
    camera: Arc<dyn Camera>,
    store: FrameStore,
    assembler: VideoAssembler,
    options: SchedulerOptions,
    metrics: SessionMetrics,
    status: watch::Sender<Session>,
    /// Next frame index; capture failures do not consume one
    next_index: u64,
    consecutive_failures: u32,
}

impl SessionRunner {
    async fn run(mut self, stop: CancellationToken, interval: Duration, duration: Duration) {
        let span = tracing::info_span!(
            "timelapse",
            camera_id = %self.camera_id,
            session_id = %self.status.borrow().id
        );

        async move {
            match self.capture(&stop, interval, duration).await {
                Ok(end) => {
                    self.status.send_modify(|s| {
                        s.state = SessionState::Assembling;
                        s.ended_at = Some(Utc::now());
                    });
                    let frames = self.status.borrow().frame_count;
                    tracing::info!(?end, frames, "Capture finished");
                    self.assemble().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Timelapse failed while capturing");
                    self.fail(&e);
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Tick until the duration elapses or a stop is requested
    ///
    /// Ticks are scheduled from the start instant, so a session makes exactly
    /// `ceil(duration / interval)` attempts unless stopped.
    async fn capture(
        &mut self,
        stop: &CancellationToken,
        interval: Duration,
        duration: Duration,
    ) -> Result<CaptureEnd> {
        let start = Instant::now();
        let deadline = start + duration;
        let mut ticker = tokio::time::interval_at(start, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => return Ok(CaptureEnd::Stopped),
                scheduled = ticker.tick() => {
                    if scheduled >= deadline {
                        return Ok(CaptureEnd::DurationElapsed);
                    }
                    if let TickOutcome::Stored(frame) = self.tick().await {
                        tracing::debug!(
                            index = frame.index,
                            bytes = frame.size,
                            path = %frame.path.display(),
                            "Captured frame"
                        );
                    }

                    if let Some(max) = self.options.max_consecutive_failures {
                        if self.consecutive_failures >= max {
                            return Err(TimelapseError::CaptureFailure {
                                camera_id: self.camera_id.clone(),
                                message: format!("{} consecutive failed captures", max),
                            }
                            .into());
                        }
                    }
                }
            }
        }
    }

    /// Make one capture attempt
    ///
    /// Failures are logged and counted but never end the session.
    pub(crate) async fn tick(&mut self) -> TickOutcome {
        self.status.send_modify(|s| s.attempts += 1);
        let attempt = self.status.borrow().attempts;

        let image = match self.camera.capture_still(&self.camera_id).await {
            Ok(image) if !image.is_empty() => image,
            Ok(_) => {
                tracing::warn!(attempt, "No image content received from camera");
                return self.capture_failed();
            }
            Err(e) => {
                tracing::warn!(attempt, error = %e, "Error capturing frame");
                return self.capture_failed();
            }
        };

        let index = self.next_index;
        self.next_index += 1;

        match self.store.append(index, &image).await {
            Ok(frame) => {
                self.consecutive_failures = 0;
                self.metrics.record_frame();
                self.status.send_modify(|s| {
                    s.frame_count += 1;
                    s.last_index = Some(index);
                });
                TickOutcome::Stored(frame)
            }
            Err(e) => {
                self.consecutive_failures += 1;
                self.metrics.record_write_failure();
                tracing::error!(attempt, index, error = %e, "Error saving frame");
                TickOutcome::WriteFailed
            }
        }
    }

    fn capture_failed(&mut self) -> TickOutcome {
        self.consecutive_failures += 1;
        self.metrics.record_capture_failure();
        TickOutcome::CaptureFailed
    }

    async fn assemble(&mut self) {
        let output = self.status.borrow().output_file.clone();
        let assembler = self.assembler.clone();
        let store = self.store.clone();

        let started = std::time::Instant::now();
        let result = match tokio::spawn(async move { assembler.assemble(&store, &output).await }).await {
            Ok(result) => result,
            Err(e) => Err(anyhow::anyhow!("Assembly task failed: {}", e)),
        };

        match result {
            Ok(path) => {
                self.metrics.record_assembly(started.elapsed(), "success");
                if self.options.cleanup_frames {
                    match self.store.cleanup().await {
                        Ok(removed) => tracing::debug!(removed, "Removed frames"),
                        Err(e) => tracing::warn!(error = %e, "Failed to remove frames"),
                    }
                }
                self.status.send_modify(|s| {
                    s.state = SessionState::Completed;
                    s.output_file = path.clone();
                });
                self.metrics.record_outcome("completed");
                tracing::info!(output = %path.display(), "Timelapse completed");
            }
            Err(e) => {
                self.metrics.record_assembly(started.elapsed(), "failure");
                tracing::error!(error = %e, "Error creating timelapse");
                self.fail(&e);
            }
        }
    }

    fn fail(&mut self, error: &anyhow::Error) {
        let error = SessionError::from_error(error);
        self.status.send_modify(|s| {
            s.state = SessionState::Failed;
            if s.ended_at.is_none() {
                s.ended_at = Some(Utc::now());
            }
            s.error = Some(error);
        });
        self.metrics.record_outcome("failed");
    }
}
