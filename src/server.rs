//! Web server module for tcpwatch.
//!
//! Provides the HTTP API consumed by the UI: dataset selection, probe
//! lifecycle control, and incremental sample reads.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

use crate::monitor::{Monitor, MonitorError};
use crate::storage::StorageError;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<Monitor>,
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

/// JSON error body; failures surface as explicit responses, never a crash.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(ErrorBody { error: msg.into() })).into_response()
}

/// Query parameters for the incremental samples read.
#[derive(Debug, Deserialize)]
pub struct SamplesQueryParams {
    /// Target hostname (raw `host[:port]` identifier).
    pub host: Option<String>,
    /// Cursor: timestamp of the last sample already seen (RFC 3339).
    pub since: Option<DateTime<Utc>>,
}

/// Response for the dataset listing.
#[derive(Debug, Serialize)]
struct DatasetsResponse {
    datasets: Vec<String>,
    active: Option<String>,
}

/// Request body for dataset activation.
#[derive(Debug, Deserialize)]
pub struct SwitchRequest {
    pub name: String,
}

/// Probe lifecycle actions accepted by the control endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProbeAction {
    Start,
    Stop,
    Delete,
}

/// Request body for probe lifecycle control.
///
/// `start`/`stop` without a host apply to every known target; `delete`
/// requires one.
#[derive(Debug, Deserialize)]
pub struct ProbeRequest {
    pub host: Option<String>,
    pub action: ProbeAction,
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/api/datasets", get(datasets_handler))
        .route("/api/datasets/switch", post(switch_handler))
        .route("/api/samples", get(samples_handler))
        .route("/api/probes", post(probes_handler))
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Liveness probe.
async fn healthz_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// List dataset tables and the active one.
async fn datasets_handler(State(state): State<AppState>) -> Response {
    match state.monitor.datasets().await {
        Ok(datasets) => {
            let active = state.monitor.active_dataset().await;
            Json(DatasetsResponse { datasets, active }).into_response()
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Activate a dataset, stopping every prober of the previous one first.
async fn switch_handler(
    State(state): State<AppState>,
    Json(req): Json<SwitchRequest>,
) -> Response {
    if req.name.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "dataset name isn't defined");
    }

    match state.monitor.switch(&req.name).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e @ MonitorError::Storage(StorageError::InvalidDatasetName(_))) => {
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Incremental samples read: rows strictly newer than `since`, plus the next
/// cursor.
async fn samples_handler(
    State(state): State<AppState>,
    Query(params): Query<SamplesQueryParams>,
) -> Response {
    let Some(host) = params.host.filter(|h| !h.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "hostname isn't defined");
    };

    let guard = state.monitor.active().await;
    let Some(active) = guard.as_ref() else {
        return error_response(
            StatusCode::CONFLICT,
            "no dataset is active; choose one first",
        );
    };

    // A host queried before it was ever started becomes a known idle target.
    active.controller().ensure_known(&host).await;

    match active.store().query(&host, params.since).await {
        Ok(batch) => Json(batch).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Probe lifecycle control: start/stop one or all targets, delete one.
async fn probes_handler(
    State(state): State<AppState>,
    Json(req): Json<ProbeRequest>,
) -> Response {
    let guard = state.monitor.active().await;
    let Some(active) = guard.as_ref() else {
        return error_response(
            StatusCode::CONFLICT,
            "no dataset is active; choose one first",
        );
    };

    let controller = active.controller();
    let host = req.host.as_deref().filter(|h| !h.is_empty());
    tracing::debug!(action = req.action.as_ref(), host = host.unwrap_or("<all>"), "Probe control");

    match (req.action, host) {
        (ProbeAction::Start, Some(host)) => controller.start(host).await,
        (ProbeAction::Start, None) => controller.start_all().await,
        (ProbeAction::Stop, Some(host)) => controller.stop(host).await,
        (ProbeAction::Stop, None) => controller.stop_all().await,
        (ProbeAction::Delete, Some(host)) => {
            if let Err(e) = controller.delete(host).await {
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
            }
        }
        (ProbeAction::Delete, None) => {
            return error_response(StatusCode::BAD_REQUEST, "delete requires a host");
        }
    }

    StatusCode::NO_CONTENT.into_response()
}
