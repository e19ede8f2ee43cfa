//! HTTP control surface
//!
//! Exposes the service calls and the per-camera entities over JSON:
//!
//! - `POST /api/services/start_timelapse`
//! - `POST /api/services/stop_timelapse`
//! - `GET  /api/entities`
//! - `GET  /api/entities/:entity_id`
//! - `POST /api/entities/:entity_id/turn_on`
//! - `POST /api/entities/:entity_id/turn_off`
//!
//! Errors are returned as `{"error": <kind>, "message": <text>}`.

use std::future::Future;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::entity::{EntityAttributes, TurnOnParams};
use crate::error::{kind_of, ErrorKind, Result, TimelapseError};
use crate::services::{StartTimelapseCall, StopTimelapseCall, TimelapseService};
use crate::session::Session;

type SharedService = Arc<TimelapseService>;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorKind,
    message: String,
}

/// Error returned by a handler
#[derive(Debug)]
pub struct ApiError(anyhow::Error);

impl<E: Into<anyhow::Error>> From<E> for ApiError {
    fn from(error: E) -> Self {
        Self(error.into())
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidConfig | ErrorKind::Config => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::AlreadyRunning => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = kind_of(&self.0);
        let status = status_for(kind);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        } else {
            tracing::debug!(error = %self.0, "Request rejected");
        }
        let body = ErrorBody {
            error: kind,
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// Decode a JSON request body; malformed input is `InvalidConfig`
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    let value = serde_json::from_slice(body)
        .map_err(|e| TimelapseError::InvalidConfig(format!("Invalid request body: {}", e)))?;
    Ok(value)
}

/// Like [`parse_body`], but an empty body yields the default value
fn parse_optional_body<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    parse_body(body)
}

/// Build the control surface router
pub fn router(service: SharedService) -> Router {
    Router::new()
        .route("/api/services/start_timelapse", post(start_timelapse))
        .route("/api/services/stop_timelapse", post(stop_timelapse))
        .route("/api/entities", get(list_entities))
        .route("/api/entities/:entity_id", get(get_entity))
        .route("/api/entities/:entity_id/turn_on", post(turn_on))
        .route("/api/entities/:entity_id/turn_off", post(turn_off))
        .with_state(service)
}

/// Serve the control surface on `bind` until `shutdown` resolves
///
/// # Errors
///
/// Returns `TimelapseError::Config` if the address cannot be bound, or the
/// server's IO error
pub async fn serve<F>(service: SharedService, bind: &str, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| TimelapseError::Config(format!("Failed to bind {}: {}", bind, e)))?;
    tracing::info!(addr = %listener.local_addr()?, "Control surface listening");

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn start_timelapse(State(service): State<SharedService>, body: Bytes) -> ApiResult<Session> {
    let call: StartTimelapseCall = parse_body(&body)?;
    Ok(Json(service.start_timelapse(&call).await?))
}

async fn stop_timelapse(State(service): State<SharedService>, body: Bytes) -> ApiResult<Session> {
    let call: StopTimelapseCall = parse_body(&body)?;
    Ok(Json(service.stop_timelapse(&call).await?))
}

async fn list_entities(State(service): State<SharedService>) -> ApiResult<Vec<EntityAttributes>> {
    let mut list = Vec::new();
    for entity in service.entities() {
        list.push(entity.attributes().await);
    }
    Ok(Json(list))
}

async fn get_entity(
    State(service): State<SharedService>,
    Path(entity_id): Path<String>,
) -> ApiResult<EntityAttributes> {
    let entity = service.entity(&entity_id)?;
    Ok(Json(entity.attributes().await))
}

async fn turn_on(
    State(service): State<SharedService>,
    Path(entity_id): Path<String>,
    body: Bytes,
) -> ApiResult<EntityAttributes> {
    let entity = service.entity(&entity_id)?;
    let params: TurnOnParams = parse_optional_body(&body)?;
    entity.turn_on(params).await?;
    Ok(Json(entity.attributes().await))
}

async fn turn_off(
    State(service): State<SharedService>,
    Path(entity_id): Path<String>,
) -> ApiResult<EntityAttributes> {
    let entity = service.entity(&entity_id)?;
    entity.turn_off().await;
    Ok(Json(entity.attributes().await))
}
