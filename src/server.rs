//! HTTP surface for the capture service.
//!
//! Uses axum to expose the scrolling capture, the single-shot render, static
//! frame access, health and an administrative manual sweep.

use crate::{
    ArtifactStore, BrowserLauncher, CaptureError, CaptureRequest, CaptureService, Config,
    HealthChecker, Metrics, RenderBody, RetentionManager, ScrollCaptureBody, SessionId,
    SnapshotRequest, SweepReport,
};
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use url::Url;

/// Shared state for HTTP handlers.
pub struct AppState {
    pub capture: CaptureService,
    pub retention: RetentionManager,
    pub store: Arc<ArtifactStore>,
    pub health: HealthChecker,
    public_base_url: Option<Url>,
    prometheus: Option<PrometheusHandle>,
    max_body_bytes: usize,
}

impl AppState {
    /// Wires the output directory handle into the controller and the retention manager.
    ///
    /// Install any metrics recorder before calling this.
    pub fn from_config(
        config: &Config,
        launcher: Arc<dyn BrowserLauncher>,
        prometheus: Option<PrometheusHandle>,
    ) -> Result<Self, CaptureError> {
        let metrics = Arc::new(Metrics::new());
        let store = Arc::new(ArtifactStore::open(&config.output_dir, &config.static_route)?);
        let capture = CaptureService::new(
            launcher,
            store.clone(),
            config.capture.clone(),
            config.scratch_dir(),
            metrics.clone(),
        );
        let retention = RetentionManager::new(store.clone(), config.retention_delay, metrics);
        let health = HealthChecker::new(store.clone(), retention.clone());

        let public_base_url = config
            .public_base_url
            .as_deref()
            .map(parse_base_url)
            .transpose()?;

        Ok(Self {
            capture,
            retention,
            store,
            health,
            public_base_url,
            prometheus,
            max_body_bytes: config.max_body_bytes,
        })
    }

    fn base_url(&self, headers: &HeaderMap) -> Result<Url, CaptureError> {
        if let Some(base) = &self.public_base_url {
            return Ok(base.clone());
        }
        let host = headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| CaptureError::InvalidInput("missing Host header".to_string()))?;
        parse_base_url(&format!("http://{host}"))
            .map_err(|_| CaptureError::InvalidInput(format!("invalid Host header: {host}")))
    }
}

fn parse_base_url(raw: &str) -> Result<Url, CaptureError> {
    let mut url = Url::parse(raw)
        .map_err(|e| CaptureError::Configuration(format!("invalid base url {raw:?}: {e}")))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Over-limit bodies keep their 413; every other rejection is a malformed request.
fn body_error(rejection: JsonRejection) -> CaptureError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        CaptureError::PayloadTooLarge(rejection.body_text())
    } else {
        CaptureError::InvalidInput(rejection.body_text())
    }
}

fn absolute_url(base: &Url, relative: &str) -> Result<String, CaptureError> {
    base.join(relative.trim_start_matches('/'))
        .map(|u| u.to_string())
        .map_err(|e| CaptureError::CaptureFailed(format!("could not build artifact url: {e}")))
}

#[derive(Debug, Serialize)]
pub struct ScreenshotResponse {
    pub images: Vec<String>,
    pub truncated: bool,
}

impl IntoResponse for CaptureError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(serde_json::json!({ "detail": self.to_string() }))).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let static_path = format!("{}/{{name}}", state.store.route());
    let body_limit = DefaultBodyLimit::max(state.max_body_bytes);

    Router::new()
        .route("/screenshot", post(screenshot_handler))
        .route("/screenshot/", post(screenshot_handler))
        .route("/render-screenshot", post(render_handler))
        .route("/render-screenshot/", post(render_handler))
        .route("/health", get(health_handler))
        .route("/health/details", get(health_details_handler))
        .route("/sessions/{id}", delete(cleanup_handler))
        .route("/metrics", get(metrics_handler))
        .route(&static_path, get(static_handler))
        .layer(body_limit)
        .with_state(state)
}

/// Serves until `shutdown` resolves.
pub async fn serve<F>(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<(), CaptureError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(addr = %addr, "starting HTTP capture server");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| CaptureError::Io(format!("HTTP server error: {e}")))
}

fn png_response(bytes: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "image/png")], bytes).into_response()
}

async fn screenshot_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<ScrollCaptureBody>, JsonRejection>,
) -> Result<Json<ScreenshotResponse>, CaptureError> {
    let Json(body) = body.map_err(body_error)?;
    let request = CaptureRequest::try_from(body)?;
    let base = state.base_url(&headers)?;

    let frames = state.capture.capture_frames(request).await?;
    state.retention.schedule_cleanup(&frames.session_id);

    let images = frames
        .frames
        .iter()
        .map(|artifact| absolute_url(&base, &artifact.relative_url))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(ScreenshotResponse {
        images,
        truncated: frames.truncated,
    }))
}

async fn render_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RenderBody>, JsonRejection>,
) -> Result<Response, CaptureError> {
    let Json(body) = body.map_err(body_error)?;
    let request = SnapshotRequest::try_from(body)?;
    let png = state.capture.render_full_page(request).await?;
    Ok(png_response(png))
}

async fn static_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response, CaptureError> {
    let bytes = state.store.read(&name).await?;
    Ok(png_response(bytes))
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "OK" }))
}

async fn health_details_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.health.check().await)
}

async fn cleanup_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SweepReport>, CaptureError> {
    let session = SessionId::parse(&id)?;
    info!("Manual sweep requested for session {}", session);
    Ok(Json(state.retention.cleanup(&session).await))
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> Result<String, CaptureError> {
    state
        .prometheus
        .as_ref()
        .map(|handle| handle.render())
        .ok_or_else(|| CaptureError::NotFound("metrics are disabled".to_string()))
}
