//! HTTP surface for the image labeling pipeline.
//!
//! - `POST /images` – Raw base64 multipart body with a `Content-Type: multipart/form-data;
//!   boundary=...` header. Returns `{"labels": [...]}`.
//! - `POST /events` – Gateway-style event envelope (`headers`, `body`, `isBase64Encoded`).
//!   Returns a gateway-style response (`statusCode`, `body`).
//! - `GET /metrics` – Upload counters.
//! - `GET /commands` – Machine-readable command catalog.
//!
//! Failures are reported as a JSON string. Every failure maps to `500` unless strict status codes
//! are enabled, in which case malformed requests map to `400`. Bodies that cannot be extracted
//! (over the size limit, not UTF-8, not JSON) are malformed requests too.

use crate::identity::IdentityProvider;
use crate::pipeline::{ErrorKind, PipelineApi, PipelineError, UploadRequest};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        DefaultBodyLimit, State,
        rejection::{BytesRejection, JsonRejection},
    },
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

/// Shared handler state.
struct ApiState<S> {
    service: Arc<S>,
    identity: Arc<dyn IdentityProvider>,
    strict_status_codes: bool,
}

impl<S> Clone for ApiState<S> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            identity: self.identity.clone(),
            strict_status_codes: self.strict_status_codes,
        }
    }
}

/// Build the HTTP router exposing the upload API surface.
pub fn create_router<S>(
    service: Arc<S>,
    identity: Arc<dyn IdentityProvider>,
    strict_status_codes: bool,
    max_body_bytes: usize,
) -> Router
where
    S: PipelineApi + 'static,
{
    let state = ApiState {
        service,
        identity,
        strict_status_codes,
    };
    Router::new()
        .route("/images", post(upload_image::<S>))
        .route("/events", post(handle_event::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

/// Success response for label requests.
#[derive(Debug, Serialize)]
struct LabelsResponse {
    labels: Vec<String>,
}

/// Decode, store, label, and index an uploaded image.
async fn upload_image<S>(
    State(state): State<ApiState<S>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<LabelsResponse>, AppError>
where
    S: PipelineApi,
{
    let strict = state.strict_status_codes;
    let outcome = match body_text(body) {
        Ok(body) => run_upload(&state, &headers, body).await,
        Err(error) => Err(error),
    };
    let labels = outcome.map_err(|error| AppError { error, strict })?;
    Ok(Json(LabelsResponse { labels }))
}

fn body_text(body: Result<Bytes, BytesRejection>) -> Result<String, PipelineError> {
    let bytes = body.map_err(|rejection| {
        tracing::warn!(status = %rejection.status(), "Rejected upload body");
        PipelineError::InvalidBody(rejection.body_text())
    })?;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| PipelineError::InvalidBody("body is not valid UTF-8".into()))
}

/// Gateway-style request envelope.
#[derive(Deserialize)]
struct GatewayEvent {
    #[serde(default)]
    headers: Option<HashMap<String, String>>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default = "default_base64_encoded", rename = "isBase64Encoded")]
    is_base64_encoded: bool,
}

fn default_base64_encoded() -> bool {
    true
}

/// Gateway-style response envelope.
#[derive(Debug, Serialize)]
struct GatewayResponse {
    #[serde(rename = "statusCode")]
    status_code: u16,
    body: String,
}

/// Process an upload delivered as a gateway event.
async fn handle_event<S>(
    State(state): State<ApiState<S>>,
    event: Result<Json<GatewayEvent>, JsonRejection>,
) -> Response
where
    S: PipelineApi,
{
    let upload = event
        .map_err(|rejection| {
            tracing::warn!(status = %rejection.status(), "Rejected gateway event");
            PipelineError::InvalidBody(rejection.body_text())
        })
        .and_then(|Json(event)| event_upload(&event));
    let outcome = match upload {
        Ok((headers, body)) => run_upload(&state, &headers, body).await,
        Err(error) => Err(error),
    };

    let (status, body) = match outcome {
        Ok(labels) => (
            StatusCode::OK,
            json!({ "labels": labels }).to_string(),
        ),
        Err(error) => (
            status_for(&error, state.strict_status_codes),
            json!(error.client_message()).to_string(),
        ),
    };

    let envelope = GatewayResponse {
        status_code: status.as_u16(),
        body,
    };
    (status, Json(envelope)).into_response()
}

/// Translate a gateway event into request headers and a base64 body.
fn event_upload(event: &GatewayEvent) -> Result<(HeaderMap, String), PipelineError> {
    let mut headers = HeaderMap::new();
    for (name, value) in event.headers.iter().flatten() {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.insert(name, value);
        }
    }

    let body = event
        .body
        .as_deref()
        .ok_or_else(|| PipelineError::MissingField("body".into()))?;
    let body = if event.is_base64_encoded {
        body.to_string()
    } else {
        STANDARD.encode(body)
    };
    Ok((headers, body))
}

async fn run_upload<S>(
    state: &ApiState<S>,
    headers: &HeaderMap,
    body: String,
) -> Result<Vec<String>, PipelineError>
where
    S: PipelineApi,
{
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| PipelineError::MissingHeader("Content-Type".into()))?
        .to_string();
    let user_id = state.identity.resolve(headers);
    tracing::info!(user_id = %user_id, content_type = %content_type, "Upload received");

    let outcome = state
        .service
        .process_upload(UploadRequest {
            content_type,
            body_base64: body,
            user_id,
        })
        .await?;
    tracing::info!(
        object_key = %outcome.object_key,
        labels = outcome.labels.len(),
        custom_labels = outcome.custom_labels.len(),
        "Upload request completed"
    );
    Ok(outcome.labels)
}

/// Return upload counters.
async fn get_metrics<S>(State(state): State<ApiState<S>>) -> Json<MetricsResponse>
where
    S: PipelineApi,
{
    let snapshot = state.service.metrics_snapshot();
    Json(MetricsResponse {
        uploads_processed: snapshot.uploads_processed,
        labels_detected: snapshot.labels_detected,
        failures: snapshot.failures,
    })
}

/// Response body for `GET /metrics`.
#[derive(Serialize)]
struct MetricsResponse {
    uploads_processed: u64,
    labels_detected: u64,
    failures: u64,
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery by hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "upload_image",
                method: "POST",
                path: "/images",
                description: "Upload a base64-encoded multipart body with one file part and an optional `customlabels` field. Response returns { \"labels\": [string] }.",
                request_example: None,
            },
            CommandDescriptor {
                name: "upload_event",
                method: "POST",
                path: "/events",
                description: "Upload through a gateway event envelope. Response returns { \"statusCode\": number, \"body\": string }.",
                request_example: Some(json!({
                    "headers": { "Content-Type": "multipart/form-data; boundary=XyZ" },
                    "body": "LS1YeVoNCi4uLg==",
                    "isBase64Encoded": true
                })),
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return upload counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

fn status_for(error: &PipelineError, strict: bool) -> StatusCode {
    match error.kind() {
        ErrorKind::MalformedRequest if strict => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

struct AppError {
    error: PipelineError,
    strict: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_for(&self.error, self.strict);
        (status, Json(self.error.client_message())).into_response()
    }
}
