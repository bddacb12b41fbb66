use crate::AppState;
use axum::{Json, extract::State};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub storage: String,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "System health status", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = if state.db.ping().await.is_ok() {
        "connected"
    } else {
        "disconnected"
    };

    // A missing object is still a successful round trip
    let storage = match state.storage.file_exists("health-check").await {
        Ok(_) => "connected",
        Err(e) => {
            tracing::warn!("⚠️ Storage health check failed: {}", e);
            "disconnected"
        }
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        database: database.to_string(),
        storage: storage.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
