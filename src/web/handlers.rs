use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};

use super::{ApiResponse, AppState, WebError};
use crate::models::{MonitorStatus, Subscriber};
use crate::service::CheckReport;

#[derive(Debug, Serialize, Deserialize)]
pub struct SubscribeRequest {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MonitorAction {
    pub changed: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubscriberCount {
    pub count: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Json<ApiResponse<MonitorStatus>> {
    let status = state.service.get_status().await;
    let meta = serde_json::json!({
        "loop_state": format!("{:?}", state.service.monitor_state()).to_lowercase(),
    });
    Json(ApiResponse::success_with_meta(status, meta))
}

pub async fn start_monitor(State(state): State<AppState>) -> Json<ApiResponse<MonitorAction>> {
    let started = state.service.start_monitoring().await;
    let message = if started {
        "Monitoring started"
    } else {
        "Monitoring is already active"
    };

    tracing::info!(started, "Start requested over HTTP");
    Json(ApiResponse::success(MonitorAction {
        changed: started,
        message: message.to_string(),
    }))
}

pub async fn stop_monitor(State(state): State<AppState>) -> Json<ApiResponse<MonitorAction>> {
    let stopped = state.service.stop_monitoring();
    let message = if stopped {
        "Monitoring will stop within a second"
    } else {
        "Monitoring is not running"
    };

    tracing::info!(stopped, "Stop requested over HTTP");
    Json(ApiResponse::success(MonitorAction {
        changed: stopped,
        message: message.to_string(),
    }))
}

pub async fn check_now(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<CheckReport>>, WebError> {
    let report = state.service.check_now().await?;
    Ok(Json(ApiResponse::success(report)))
}

pub async fn reset_baseline(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<CheckReport>>, WebError> {
    let report = state.service.reset_baseline().await?;
    Ok(Json(ApiResponse::success(report)))
}

pub async fn list_subscribers(State(state): State<AppState>) -> Json<ApiResponse<Vec<Subscriber>>> {
    Json(ApiResponse::success(state.service.list_subscribers().await))
}

pub async fn create_subscriber(
    State(state): State<AppState>,
    Json(request): Json<SubscribeRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Subscriber>>), WebError> {
    if request.email.trim().is_empty() {
        return Err(WebError::bad_request("Email is required"));
    }

    let name = request.name.as_deref().unwrap_or_default();
    let subscriber = state.service.add_subscriber(&request.email, name).await?;

    tracing::info!(email = %subscriber.email, "Subscriber added over HTTP");
    Ok((StatusCode::CREATED, Json(ApiResponse::success(subscriber))))
}

pub async fn subscriber_count(State(state): State<AppState>) -> Json<ApiResponse<SubscriberCount>> {
    let count = state.service.get_subscriber_count().await;
    Json(ApiResponse::success(SubscriberCount { count }))
}

pub async fn delete_subscriber(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<ApiResponse<MonitorAction>>, WebError> {
    if !state.service.remove_subscriber(&email).await {
        return Err(WebError::not_found(format!("Subscriber {}", email.trim())));
    }

    Ok(Json(ApiResponse::success(MonitorAction {
        changed: true,
        message: "Unsubscribed".to_string(),
    })))
}
