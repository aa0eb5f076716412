//! Resort HTTP endpoints.
//!
//! - GET /api/resorts — full records for every enabled resort
//! - GET /api/resorts/summary — lightweight list, no forecast arrays
//! - GET /api/resorts/{id} and /api/resorts/slug/{slug} — single resort
//! - GET /api/resorts/open — summaries filtered to open/partial
//! - GET /api/resorts/search — substring search on name/location
//! - GET /api/resorts/nearby — Haversine radius search

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::AppState;
use crate::errors::{AppError, ErrorResponse};
use crate::helpers::{haversine_km, round2};
use crate::services::store::{self, ResortDetail, ResortKey, ResortSummary};

/// Default nearby-search radius (km).
const DEFAULT_NEARBY_RADIUS_KM: f64 = 50.0;

/// Metadata block attached to list responses.
#[derive(Debug, Serialize, ToSchema)]
pub struct ListMetadata {
    pub total_resorts: usize,
    pub timestamp: String,
}

/// Response for the full-resort list.
#[derive(Debug, Serialize, ToSchema)]
pub struct ResortListResponse {
    pub resorts: Vec<ResortDetail>,
    pub metadata: ListMetadata,
}

/// Response for the summary list.
#[derive(Debug, Serialize, ToSchema)]
pub struct SummaryListResponse {
    pub resorts: Vec<ResortSummary>,
    pub metadata: ListMetadata,
}

fn metadata(count: usize) -> ListMetadata {
    ListMetadata {
        total_resorts: count,
        timestamp: Utc::now().to_rfc3339(),
    }
}

/// All enabled resorts with their full latest records (heavy: includes
/// hourly and daily forecasts).
#[utoipa::path(
    get,
    path = "/api/resorts",
    tag = "Resorts",
    responses(
        (status = 200, description = "Full records for all enabled resorts", body = ResortListResponse),
    )
)]
pub async fn list_resorts(
    State(state): State<AppState>,
) -> Result<Json<ResortListResponse>, AppError> {
    let resorts = store::get_all_resorts(&state.pool, &state.cache).await?;
    let metadata = metadata(resorts.len());
    Ok(Json(ResortListResponse { resorts, metadata }))
}

/// Lightweight summaries: identity, latest counts, current weather, no
/// forecast arrays.
#[utoipa::path(
    get,
    path = "/api/resorts/summary",
    tag = "Resorts",
    responses(
        (status = 200, description = "Summaries for all enabled resorts", body = SummaryListResponse),
    )
)]
pub async fn list_summaries(
    State(state): State<AppState>,
) -> Result<Json<SummaryListResponse>, AppError> {
    let resorts = store::get_all_summaries(&state.pool, &state.cache).await?;
    let metadata = metadata(resorts.len());
    Ok(Json(SummaryListResponse { resorts, metadata }))
}

/// Single resort by id.
#[utoipa::path(
    get,
    path = "/api/resorts/{id}",
    tag = "Resorts",
    params(("id" = i32, Path, description = "Resort id")),
    responses(
        (status = 200, description = "Full resort record", body = ResortDetail),
        (status = 404, description = "Resort not found", body = ErrorResponse),
    )
)]
pub async fn get_resort_by_id(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ResortDetail>, AppError> {
    let detail = store::get_resort_detail(&state.pool, &state.cache, ResortKey::Id(id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resort {id} not found")))?;
    Ok(Json(detail))
}

/// Single resort by slug.
#[utoipa::path(
    get,
    path = "/api/resorts/slug/{slug}",
    tag = "Resorts",
    params(("slug" = String, Path, description = "Resort slug")),
    responses(
        (status = 200, description = "Full resort record", body = ResortDetail),
        (status = 404, description = "Resort not found", body = ErrorResponse),
    )
)]
pub async fn get_resort_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ResortDetail>, AppError> {
    let detail = store::get_resort_detail(&state.pool, &state.cache, ResortKey::Slug(&slug))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resort '{slug}' not found")))?;
    Ok(Json(detail))
}

/// Summaries filtered to resorts currently open or partially open.
#[utoipa::path(
    get,
    path = "/api/resorts/open",
    tag = "Resorts",
    responses(
        (status = 200, description = "Open and partially open resorts", body = SummaryListResponse),
    )
)]
pub async fn list_open_resorts(
    State(state): State<AppState>,
) -> Result<Json<SummaryListResponse>, AppError> {
    let resorts: Vec<ResortSummary> = store::get_all_summaries(&state.pool, &state.cache)
        .await?
        .into_iter()
        .filter(|r| matches!(r.status.as_deref(), Some("open") | Some("partial")))
        .collect();
    let metadata = metadata(resorts.len());
    Ok(Json(SummaryListResponse { resorts, metadata }))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchParams {
    /// Substring to match against the resort name (case-insensitive)
    pub name: Option<String>,
    /// Substring to match against the resort location (case-insensitive)
    pub location: Option<String>,
}

/// Case-insensitive substring search over name and location. OR semantics
/// when both parameters are present.
#[utoipa::path(
    get,
    path = "/api/resorts/search",
    tag = "Resorts",
    params(SearchParams),
    responses(
        (status = 200, description = "Matching resorts", body = ResortListResponse),
        (status = 400, description = "Neither name nor location given", body = ErrorResponse),
    )
)]
pub async fn search_resorts(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<ResortListResponse>, AppError> {
    let name_query = params.name.as_deref().unwrap_or("").to_lowercase();
    let location_query = params.location.as_deref().unwrap_or("").to_lowercase();
    if name_query.is_empty() && location_query.is_empty() {
        return Err(AppError::BadRequest(
            "Provide a name or location parameter".to_string(),
        ));
    }

    let resorts: Vec<ResortDetail> = store::get_all_resorts(&state.pool, &state.cache)
        .await?
        .into_iter()
        .filter(|resort| {
            let match_name =
                !name_query.is_empty() && resort.name.to_lowercase().contains(&name_query);
            let match_location = !location_query.is_empty()
                && resort
                    .location
                    .as_deref()
                    .map(|l| l.to_lowercase().contains(&location_query))
                    .unwrap_or(false);
            match_name || match_location
        })
        .collect();

    let metadata = metadata(resorts.len());
    Ok(Json(ResortListResponse { resorts, metadata }))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct NearbyParams {
    /// Center latitude (WGS84)
    pub lat: Option<String>,
    /// Center longitude (WGS84)
    pub lon: Option<String>,
    /// Search radius in kilometres (default 50)
    pub radius: Option<String>,
}

/// Resorts within a radius of a point, sorted by distance ascending. Each
/// result carries a `distance` field in km, rounded to 2 decimals.
#[utoipa::path(
    get,
    path = "/api/resorts/nearby",
    tag = "Resorts",
    params(NearbyParams),
    responses(
        (status = 200, description = "Resorts within the radius", body = ResortListResponse),
        (status = 400, description = "Invalid parameters", body = ErrorResponse),
    )
)]
pub async fn nearby_resorts(
    State(state): State<AppState>,
    Query(params): Query<NearbyParams>,
) -> Result<Json<ResortListResponse>, AppError> {
    let parse = |v: Option<&str>| -> Option<f64> { v.and_then(|s| s.parse().ok()) };
    let (Some(lat), Some(lon)) = (
        parse(params.lat.as_deref()),
        parse(params.lon.as_deref()),
    ) else {
        return Err(AppError::BadRequest("Invalid parameters".to_string()));
    };
    let radius = match params.radius.as_deref() {
        None => DEFAULT_NEARBY_RADIUS_KM,
        Some(raw) => raw
            .parse()
            .map_err(|_| AppError::BadRequest("Invalid parameters".to_string()))?,
    };

    let mut resorts: Vec<ResortDetail> = store::get_all_resorts(&state.pool, &state.cache)
        .await?
        .into_iter()
        .filter_map(|mut resort| {
            let (resort_lat, resort_lon) = (resort.lat?, resort.lon?);
            let distance = haversine_km(lat, lon, resort_lat, resort_lon);
            if distance > radius {
                return None;
            }
            resort.distance = Some(round2(distance));
            Some(resort)
        })
        .collect();
    resorts.sort_by(|a, b| {
        a.distance
            .unwrap_or(f64::MAX)
            .total_cmp(&b.distance.unwrap_or(f64::MAX))
    });

    let metadata = metadata(resorts.len());
    Ok(Json(ResortListResponse { resorts, metadata }))
}
