//! HTTP routes and handlers

use axum::{
    extract::{ConnectInfo, DefaultBodyLimit, Multipart, Path, Query, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine as _;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::limiter::Decision;
use crate::state::AppState;
use flutevision_core::{Error, ErrorKind, Mode};
use flutevision_vision::PredictOutcome;

pub fn create_router(state: AppState) -> Router {
    let config = Arc::clone(&state.config);

    let predict_routes = Router::new()
        .route("/api/v1/predict", post(predict_upload))
        .route("/api/v1/predict/frame", post(predict_frame))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .route("/", get(root))
        .route("/api/v1/", get(api_root))
        .route("/api/v1/health", get(health_check))
        .route("/api/v1/labels/:mode", get(list_labels))
        .route("/api/v1/fingerings", get(list_fingerings))
        .route("/metrics", get(render_metrics))
        .merge(predict_routes)
        .fallback(fallback)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.max_upload_bytes))
        .layer(cors_layer(&config.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(parsed))
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "FluteVision API - hand fingering recognition",
        "docs": "/api/v1/",
        "health": "/api/v1/health",
    }))
}

async fn api_root() -> Json<Value> {
    Json(json!({
        "message": "FluteVision API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let service = state.service.read();
    let ready = service.is_ready();

    let modes: serde_json::Map<String, Value> = Mode::ALL
        .iter()
        .map(|&mode| {
            let entry = service.registry().entry(mode);
            let artifact = entry.artifact.as_ref();
            let labels = artifact.map(|a| a.labels().to_vec()).unwrap_or_default();
            let detail = json!({
                "ready": entry.is_ready(),
                "count": labels.len(),
                "labels": labels,
                "test_accuracy": artifact.and_then(|a| a.test_accuracy()),
                "fingerprint": artifact.map(|a| a.fingerprint()),
                "error": entry.load_error,
            });
            (mode.as_str().to_string(), detail)
        })
        .collect();

    Json(json!({
        "status": if ready { "healthy" } else { "not ready" },
        "model_loaded": ready,
        "state": service.state().as_str(),
        "modes": modes,
    }))
}

async fn list_labels(
    State(state): State<AppState>,
    Path(mode): Path<String>,
) -> Result<Json<Value>, AppError> {
    let labels = state.service.read().list_labels(&mode)?;
    Ok(Json(json!({
        "mode": mode,
        "count": labels.len(),
        "labels": labels,
    })))
}

async fn list_fingerings(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let labels = state.service.read().list_labels(Mode::Flute.as_str())?;
    Ok(Json(json!({
        "count": labels.len(),
        "fingerings": labels,
    })))
}

async fn render_metrics(State(state): State<AppState>) -> String {
    state
        .metrics_handle
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}

fn default_mode() -> String {
    Mode::Flute.as_str().to_string()
}

#[derive(Debug, Deserialize)]
struct PredictQuery {
    #[serde(default = "default_mode")]
    mode: String,
}

/// Inline frame upload for video streams
#[derive(Debug, Deserialize)]
struct FrameRequest {
    /// Base64 image, optionally as a `data:` URL
    image: String,
    #[serde(default = "default_mode")]
    mode: String,
}

async fn predict_upload(
    State(state): State<AppState>,
    Query(query): Query<PredictQuery>,
    mut multipart: Multipart,
) -> Result<Json<PredictOutcome>, AppError> {
    let image = read_upload(&mut multipart).await?;
    run_prediction(&state, image, query.mode).await
}

async fn predict_frame(
    State(state): State<AppState>,
    Json(request): Json<FrameRequest>,
) -> Result<Json<PredictOutcome>, AppError> {
    let image = decode_frame(&request.image)?;
    run_prediction(&state, image, request.mode).await
}

/// Take the `file` field, or the first non-empty field when none is named so
async fn read_upload(multipart: &mut Multipart) -> Result<Bytes, AppError> {
    let mut fallback = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Error reading file: {}", e)))?
    {
        let is_file = field.name() == Some("file");
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Error reading file: {}", e)))?;

        if is_file {
            return Ok(data);
        }
        if fallback.is_none() && !data.is_empty() {
            fallback = Some(data);
        }
    }

    Ok(fallback.unwrap_or_default())
}

fn decode_frame(image: &str) -> Result<Bytes, AppError> {
    let payload = match image.strip_prefix("data:") {
        Some(url) => url.split_once(',').map(|(_, data)| data).unwrap_or(""),
        None => image,
    };
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| Error::decode(format!("invalid base64 frame: {}", e)))?;
    Ok(Bytes::from(bytes))
}

async fn run_prediction(
    state: &AppState,
    image: Bytes,
    mode: String,
) -> Result<Json<PredictOutcome>, AppError> {
    metrics::counter!("flutevision_requests_total", "endpoint" => "predict").increment(1);

    let request_id = Uuid::new_v4();
    let service = Arc::clone(&state.service);

    let outcome = tokio::task::spawn_blocking(move || service.read().predict(&image, &mode))
        .await
        .map_err(|e| AppError::Internal(format!("prediction task failed: {}", e)))??;

    debug!(
        %request_id,
        success = outcome.success,
        gesture = outcome.gesture.as_deref().unwrap_or("-"),
        confidence = outcome.confidence,
        "prediction served"
    );
    Ok(Json(outcome))
}

/// Rate-limit middleware for prediction routes
async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let client = client_key(&request);
    match state.limiter.check(&client) {
        Decision::Allowed => next.run(request).await,
        Decision::Limited { retry_after } => {
            warn!(client = %client, "Rate limit exceeded");
            AppError::RateLimited {
                limit: state.limiter.limit(),
                retry_after_secs: retry_after.as_secs().max(1),
            }
            .into_response()
        }
    }
}

/// Client identity: peer address, then `X-Forwarded-For`, then a shared bucket
fn client_key(request: &Request) -> String {
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    forwarded_for(request.headers()).unwrap_or_else(|| "shared".to_string())
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

async fn fallback() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}

/// Error handling
#[derive(Debug)]
pub enum AppError {
    Service(Error),
    BadRequest(String),
    RateLimited { limit: usize, retry_after_secs: u64 },
    Internal(String),
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        AppError::Service(err)
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation | ErrorKind::Decode => StatusCode::BAD_REQUEST,
        ErrorKind::NotReady => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Startup | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, body) = match self {
            AppError::Service(err) => {
                let kind = err.kind();
                let status = status_for(kind);
                if status.is_server_error() {
                    error!("Request failed: {}", err);
                }
                (status, kind.as_str(), json!({ "error": err.to_string() }))
            }
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorKind::Validation.as_str(),
                json!({ "error": msg }),
            ),
            AppError::RateLimited {
                limit,
                retry_after_secs,
            } => {
                metrics::counter!("flutevision_errors_total", "kind" => "rate_limited")
                    .increment(1);
                let body = json!({
                    "error": "Too many requests",
                    "message": format!(
                        "Slow down! Sending requests too fast to the prediction endpoint (limit {} per minute)",
                        limit
                    ),
                });
                let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
                return response;
            }
            AppError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorKind::Internal.as_str(),
                    json!({ "error": msg }),
                )
            }
        };

        metrics::counter!("flutevision_errors_total", "kind" => kind).increment(1);
        (status, Json(body)).into_response()
    }
}
