//! Service status endpoint: liveness, database reachability and the number
//! of enabled resorts.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use super::AppState;
use crate::db::queries;

/// Status response.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    /// "running" whenever the process can answer
    pub status: String,
    pub message: String,
    pub timestamp: String,
    /// "connected" or "error"
    pub database: String,
    /// Enabled resorts, when the database answered
    pub total_resorts: Option<i64>,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/api/status",
    tag = "Status",
    responses(
        (status = 200, description = "Service status", body = StatusResponse),
    )
)]
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let (database, total_resorts) = match queries::count_enabled_resorts(&state.pool).await {
        Ok(count) => ("connected".to_string(), Some(count)),
        Err(e) => {
            tracing::error!("Status check failed to reach database: {e}");
            ("error".to_string(), None)
        }
    };

    Json(StatusResponse {
        status: "running".to_string(),
        message: "API is operational".to_string(),
        timestamp: Utc::now().to_rfc3339(),
        database,
        total_resorts,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
