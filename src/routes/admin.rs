//! Admin endpoints, gated on the `X-Admin-API-Key` header.
//!
//! - DELETE /api/admin/resorts/{id} — soft delete. The resort row and all
//!   of its snapshots stay in place; `enabled` flips to false and every
//!   cache key that could still serve the resort is dropped.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use super::AppState;
use crate::errors::{AppError, ErrorResponse};
use crate::services::store;

/// Header carrying the admin secret.
const ADMIN_KEY_HEADER: &str = "X-Admin-API-Key";

/// Identity of a disabled resort.
#[derive(Debug, Serialize, ToSchema)]
pub struct DisabledResort {
    pub resort_id: i32,
    pub resort_name: String,
    pub resort_slug: String,
}

/// Soft-delete response.
#[derive(Debug, Serialize, ToSchema)]
pub struct DisableResponse {
    pub message: String,
    pub resort: DisabledResort,
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let configured = state
        .admin_api_key
        .as_deref()
        .ok_or_else(|| AppError::Unauthorized("Admin API is not configured".to_string()))?;
    let presented = headers
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if presented != configured {
        return Err(AppError::Unauthorized("Invalid admin API key".to_string()));
    }
    Ok(())
}

/// Soft-delete a resort.
#[utoipa::path(
    delete,
    path = "/api/admin/resorts/{id}",
    tag = "Admin",
    params(("id" = i32, Path, description = "Resort id")),
    responses(
        (status = 200, description = "Resort disabled", body = DisableResponse),
        (status = 401, description = "Missing or invalid admin key", body = ErrorResponse),
        (status = 404, description = "Resort not found", body = ErrorResponse),
    )
)]
pub async fn disable_resort(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    headers: HeaderMap,
) -> Result<Json<DisableResponse>, AppError> {
    authorize(&state, &headers)?;

    let resort = store::disable_resort(&state.pool, &state.cache, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resort {id} not found")))?;

    tracing::info!(resort_id = id, slug = %resort.slug, "Resort disabled");
    Ok(Json(DisableResponse {
        message: "Resort disabled".to_string(),
        resort: DisabledResort {
            resort_id: resort.id,
            resort_name: resort.name,
            resort_slug: resort.slug,
        },
    }))
}
