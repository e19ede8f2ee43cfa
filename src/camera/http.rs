//! HTTP snapshot camera
//!
//! Fetches one still per capture from a URL built from
//! [`HttpCameraConfig::url_template`]. With a Home Assistant instance the
//! template points at `/api/camera_proxy/{camera_id}` and the token is a
//! long-lived access token sent as a bearer credential.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;

use super::{render_template, Camera};
use crate::config::HttpCameraConfig;
use crate::error::{Result, TimelapseError};

/// Camera that downloads snapshots over HTTP
#[derive(Debug, Clone)]
pub struct HttpSnapshotCamera {
    client: Client,
    config: HttpCameraConfig,
}

impl HttpSnapshotCamera {
    /// Create a new HTTP snapshot camera
    ///
    /// # Errors
    ///
    /// Returns `TimelapseError::Camera` if the HTTP client cannot be built
    ///
    /// # Examples
    ///
    /// ```
    /// use camera_timelapse::camera::HttpSnapshotCamera;
    /// use camera_timelapse::config::HttpCameraConfig;
    ///
    /// let camera = HttpSnapshotCamera::new(HttpCameraConfig::default());
    /// assert!(camera.is_ok());
    /// ```
    pub fn new(config: HttpCameraConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("camera-timelapse/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TimelapseError::Camera(format!("Failed to create HTTP client: {}", e)))?;

        tracing::debug!(url_template = %config.url_template, "Initialized HTTP snapshot camera");

        Ok(Self { client, config })
    }

    /// Snapshot URL for a camera entity
    pub fn snapshot_url(&self, camera_id: &str) -> String {
        render_template(&self.config.url_template, camera_id)
    }
}

#[async_trait]
impl Camera for HttpSnapshotCamera {
    async fn capture_still(&self, camera_id: &str) -> Result<Bytes> {
        let url = self.snapshot_url(camera_id);
        let mut request = self.client.get(&url);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let transport = |e: reqwest::Error| TimelapseError::CaptureFailure {
            camera_id: camera_id.to_string(),
            message: format!("snapshot request failed: {}", e),
        };

        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(TimelapseError::CaptureFailure {
                camera_id: camera_id.to_string(),
                message: format!("snapshot request returned {}", status),
            }
            .into());
        }

        let body = response.bytes().await.map_err(transport)?;
        if body.is_empty() {
            return Err(TimelapseError::CaptureFailure {
                camera_id: camera_id.to_string(),
                message: "empty snapshot body".to_string(),
            }
            .into());
        }

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn camera_for(server: &MockServer, token: Option<&str>) -> HttpSnapshotCamera {
        HttpSnapshotCamera::new(HttpCameraConfig {
            url_template: format!("{}/api/camera_proxy/{{camera_id}}", server.uri()),
            token: token.map(str::to_string),
            timeout_seconds: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_snapshot_url() {
        let camera = HttpSnapshotCamera::new(HttpCameraConfig {
            url_template: "http://ha:8123/api/camera_proxy/{camera_id}".to_string(),
            token: None,
            timeout_seconds: 5,
        })
        .unwrap();
        assert_eq!(
            camera.snapshot_url("camera.garden"),
            "http://ha:8123/api/camera_proxy/camera.garden"
        );
    }

    #[tokio::test]
    async fn test_capture_still_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/camera_proxy/camera.garden"))
            .and(header("authorization", "Bearer abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0xFF, 0xD8, 0xFF], "image/jpeg"))
            .mount(&server)
            .await;

        let camera = camera_for(&server, Some("abc123"));
        let still = camera.capture_still("camera.garden").await.unwrap();
        assert_eq!(still.as_ref(), &[0xFF, 0xD8, 0xFF]);
    }

    #[tokio::test]
    async fn test_capture_still_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let camera = camera_for(&server, None);
        let err = camera.capture_still("camera.garden").await.unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_capture_still_empty_body_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let camera = camera_for(&server, None);
        let err = camera.capture_still("camera.garden").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TimelapseError>(),
            Some(TimelapseError::CaptureFailure { .. })
        ));
    }

    #[tokio::test]
    async fn test_unreachable_camera_is_capture_failure() {
        let server = MockServer::start().await;
        let camera = camera_for(&server, None);
        drop(server);

        let err = camera.capture_still("camera.garden").await.unwrap_err();
        assert_eq!(
            crate::error::kind_of(&err),
            crate::error::ErrorKind::CaptureFailure
        );
    }
}
