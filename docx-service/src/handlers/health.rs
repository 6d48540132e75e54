use crate::dtos::StatusResponse;
use crate::startup::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use chrono::{SecondsFormat, Utc};
use serde_json::json;

/// Liveness ping at `/`.
pub async fn root_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "running".to_string(),
        environment: state.config.environment.clone(),
        time_utc: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        message: "docx-service is alive.".to_string(),
    })
}

pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "docx-service",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn metrics() -> impl IntoResponse {
    (
        [("content-type", "text/plain; charset=utf-8")],
        crate::services::get_metrics(),
    )
}
