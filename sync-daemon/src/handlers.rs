use std::collections::HashMap;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};
use sync_core::prelude::*;

use crate::metrics;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: String,
}

pub async fn health<B: BackendClient + 'static>(State(state): State<AppState<B>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        service: state.config.service.name.clone(),
    })
}

#[derive(Debug, Serialize)]
pub struct DependencyStatus {
    pub healthy: bool,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub service: String,
    pub dependencies: HashMap<String, DependencyStatus>,
}

pub async fn readiness<B: BackendClient + 'static>(State(state): State<AppState<B>>) -> impl IntoResponse {
    let mut dependencies = HashMap::new();

    let db_status = match state.engine.store().health_check().await {
        Ok(()) => DependencyStatus { healthy: true, message: None },
        Err(err) => DependencyStatus { healthy: false, message: Some(err.to_string()) },
    };
    let db_healthy = db_status.healthy;
    dependencies.insert("database".to_string(), db_status);

    let backend_status = match state.engine.backend_health().await {
        Ok(()) => DependencyStatus { healthy: true, message: None },
        Err(err) => DependencyStatus { healthy: false, message: Some(err.to_string()) },
    };
    let backend_healthy = backend_status.healthy;
    dependencies.insert("backend".to_string(), backend_status);

    let ready = db_healthy && backend_healthy;
    let status = if ready {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            ready,
            service: state.config.service.name.clone(),
            dependencies,
        }),
    )
}

pub async fn metrics_handler<B: BackendClient + 'static>(State(state): State<AppState<B>>) -> impl IntoResponse {
    metrics::SYNC_SERVICE_UP.set(if state.engine.is_running() { 1.0 } else { 0.0 });
    (
        [("Content-Type", "text/plain; version=0.0.4")],
        metrics::gather(),
    )
}

pub async fn trigger_sync<B: BackendClient + 'static>(State(state): State<AppState<B>>) -> impl IntoResponse {
    let timeout = Duration::from_secs(state.config.service.trigger_timeout_secs);
    let report = match tokio::time::timeout(timeout, state.engine.run_cycle()).await {
        Ok(report) => report,
        Err(_) => {
            return Err(Error::Internal("sync cycle timed out".to_string()));
        }
    };

    metrics::LAST_SYNC_TIMESTAMP_SECONDS.set(chrono::Utc::now().timestamp() as f64);
    metrics::SYNC_OPERATIONS_TOTAL
        .with_label_values(&["cycle", "completed"])
        .inc();

    *state.last_cycle.write().await = Some(report.clone());
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct AlarmsQuery {
    pub sync_state: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_alarms<B: BackendClient + 'static>(
    State(state): State<AppState<B>>,
    Query(query): Query<AlarmsQuery>,
) -> impl IntoResponse {
    let state_filter = query.sync_state.as_deref().and_then(parse_sync_state);
    let limit = query.limit.unwrap_or(100).min(1000);
    let offset = query.offset.unwrap_or(0);

    match state.engine.store().list_sync_records(state_filter, limit, offset).await {
        Ok(records) => Ok(Json(records)),
        Err(err) => Err(err),
    }
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub batch_id: Option<String>,
    pub alarm_id: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_logs<B: BackendClient + 'static>(
    State(state): State<AppState<B>>,
    Query(query): Query<LogsQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(100).min(1000);
    let offset = query.offset.unwrap_or(0);

    match state
        .engine
        .store()
        .list_audit_log(query.batch_id.as_deref(), query.alarm_id, limit, offset)
        .await
    {
        Ok(entries) => Ok(Json(entries)),
        Err(err) => Err(err),
    }
}

pub async fn statistics<B: BackendClient + 'static>(State(state): State<AppState<B>>) -> impl IntoResponse {
    match state.engine.store().get_sync_statistics().await {
        Ok(stats) => Ok(Json(stats)),
        Err(err) => Err(err),
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub running: bool,
    pub last_cycle: Option<CycleReport>,
}

pub async fn status<B: BackendClient + 'static>(State(state): State<AppState<B>>) -> impl IntoResponse {
    Json(StatusResponse {
        running: state.engine.is_running(),
        last_cycle: state.last_cycle.read().await.clone(),
    })
}

#[derive(Debug, Deserialize)]
pub struct ServiceControlRequest {
    pub action: ServiceAction,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
}

#[derive(Debug, Serialize)]
pub struct ServiceControlResponse {
    pub running: bool,
}

pub async fn service_control<B: BackendClient + 'static>(
    State(state): State<AppState<B>>,
    Json(request): Json<ServiceControlRequest>,
) -> impl IntoResponse {
    match request.action {
        ServiceAction::Start => state.engine.start(),
        ServiceAction::Stop => state.engine.stop(),
        ServiceAction::Restart => {
            state.engine.stop();
            state.engine.start();
        }
    }
    Json(ServiceControlResponse { running: state.engine.is_running() })
}

fn parse_sync_state(raw: &str) -> Option<SyncState> {
    match raw.to_uppercase().as_str() {
        "FIRING" | "PENDING" => Some(SyncState::Firing),
        "RESOLVED" => Some(SyncState::Resolved),
        "SILENCED" => Some(SyncState::Silenced),
        "ERROR" => Some(SyncState::Error),
        _ => None,
    }
}
