//! Trail HTTP endpoints.
//!
//! - GET /api/resorts/{id}/trails
//! - GET /api/resorts/slug/{slug}/trails
//!
//! Both accept optional `type` and `difficulty` filters and include
//! per-difficulty/per-type counts plus the total length in km.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::{IntoParams, ToSchema};

use super::AppState;
use crate::errors::{AppError, ErrorResponse};
use crate::services::store::{self, ResortKey, TrailOut};

#[derive(Debug, Deserialize, IntoParams)]
pub struct TrailFilters {
    /// Filter by piste type (downhill, nordic, skitour, sled, hike, ...)
    #[serde(rename = "type")]
    pub piste_type: Option<String>,
    /// Filter by difficulty (novice, easy, intermediate, advanced, expert,
    /// freeride)
    pub difficulty: Option<String>,
}

/// The filters that were applied, echoed back in the response.
#[derive(Debug, Serialize, ToSchema)]
pub struct FiltersApplied {
    #[serde(rename = "type")]
    pub piste_type: Option<String>,
    pub difficulty: Option<String>,
}

/// Trail list response.
#[derive(Debug, Serialize, ToSchema)]
pub struct TrailListResponse {
    pub resort_id: Option<i32>,
    pub slug: Option<String>,
    pub total_trails: usize,
    pub total_length_km: f64,
    pub difficulty_stats: BTreeMap<String, usize>,
    pub type_stats: BTreeMap<String, usize>,
    pub filters_applied: FiltersApplied,
    pub trails: Vec<TrailOut>,
}

fn build_response(
    resort_id: Option<i32>,
    slug: Option<String>,
    trails: Vec<TrailOut>,
    filters: TrailFilters,
) -> TrailListResponse {
    let filtered: Vec<TrailOut> = trails
        .into_iter()
        .filter(|trail| {
            filters
                .piste_type
                .as_deref()
                .map(|t| trail.piste_type.as_deref() == Some(t))
                .unwrap_or(true)
                && filters
                    .difficulty
                    .as_deref()
                    .map(|d| trail.difficulty.as_deref() == Some(d))
                    .unwrap_or(true)
        })
        .collect();

    let stats = store::trail_stats(&filtered);
    TrailListResponse {
        resort_id,
        slug,
        total_trails: filtered.len(),
        total_length_km: stats.total_length_km,
        difficulty_stats: stats.difficulty_stats,
        type_stats: stats.type_stats,
        filters_applied: FiltersApplied {
            piste_type: filters.piste_type,
            difficulty: filters.difficulty,
        },
        trails: filtered,
    }
}

/// Trails for a resort by id.
#[utoipa::path(
    get,
    path = "/api/resorts/{id}/trails",
    tag = "Trails",
    params(("id" = i32, Path, description = "Resort id"), TrailFilters),
    responses(
        (status = 200, description = "Trail list with statistics", body = TrailListResponse),
        (status = 404, description = "Resort unknown or no trail data", body = ErrorResponse),
    )
)]
pub async fn get_trails_by_id(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Query(filters): Query<TrailFilters>,
) -> Result<Json<TrailListResponse>, AppError> {
    let trails = store::get_resort_trails(&state.pool, &state.cache, ResortKey::Id(id))
        .await?
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::NotFound(format!("No trail data for resort {id}")))?;
    Ok(Json(build_response(Some(id), None, trails, filters)))
}

/// Trails for a resort by slug.
#[utoipa::path(
    get,
    path = "/api/resorts/slug/{slug}/trails",
    tag = "Trails",
    params(("slug" = String, Path, description = "Resort slug"), TrailFilters),
    responses(
        (status = 200, description = "Trail list with statistics", body = TrailListResponse),
        (status = 404, description = "Resort unknown or no trail data", body = ErrorResponse),
    )
)]
pub async fn get_trails_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(filters): Query<TrailFilters>,
) -> Result<Json<TrailListResponse>, AppError> {
    let trails = store::get_resort_trails(&state.pool, &state.cache, ResortKey::Slug(&slug))
        .await?
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::NotFound(format!("No trail data for resort '{slug}'")))?;
    Ok(Json(build_response(None, Some(slug), trails, filters)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trail(difficulty: &str, piste_type: &str) -> TrailOut {
        TrailOut {
            id: 0,
            osm_id: None,
            osm_type: None,
            name: None,
            difficulty: Some(difficulty.to_string()),
            piste_type: Some(piste_type.to_string()),
            geometry: None,
            length_meters: Some(1000.0),
            lit: None,
            grooming: None,
            width: None,
            trail_ref: None,
        }
    }

    #[test]
    fn test_build_response_filters_by_type_and_difficulty() {
        let trails = vec![
            trail("easy", "downhill"),
            trail("easy", "nordic"),
            trail("expert", "downhill"),
        ];
        let response = build_response(
            Some(1),
            None,
            trails,
            TrailFilters {
                piste_type: Some("downhill".to_string()),
                difficulty: Some("easy".to_string()),
            },
        );
        assert_eq!(response.total_trails, 1);
        assert_eq!(response.total_length_km, 1.0);
        assert_eq!(response.filters_applied.piste_type.as_deref(), Some("downhill"));
    }

    #[test]
    fn test_build_response_no_filters_keeps_all() {
        let trails = vec![trail("easy", "downhill"), trail("expert", "downhill")];
        let response = build_response(
            None,
            Some("powder-peak".to_string()),
            trails,
            TrailFilters {
                piste_type: None,
                difficulty: None,
            },
        );
        assert_eq!(response.total_trails, 2);
        assert_eq!(response.difficulty_stats["easy"], 1);
        assert_eq!(response.type_stats["downhill"], 2);
    }
}
