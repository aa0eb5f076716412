//! Latest-state store: the bridge between the persistence layer, the read
//! cache and the HTTP API.
//!
//! Reads are cache-aside: try Redis, fall back to Postgres, fill the cache.
//! Writes go through `persist_record` / `save_trails`, which commit the
//! transaction and then delete the affected keys so the next read rebuilds.
//!
//! The status-from-opening-date rewrite lives here so the detail and
//! summary views can never disagree: whatever the provider reported, a
//! resort that opened within the last 50 days reads as `open` and one whose
//! opening date is still ahead reads as `closed`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use utoipa::ToSchema;

use crate::cache::{self, Cache};
use crate::config::ResortDescriptor;
use crate::db::models::{Resort, ResortTrail};
use crate::db::queries;
use crate::errors::CollectError;
use crate::helpers::round2;
use crate::services::normalizer::CanonicalRecord;
use crate::services::overpass::TrailCollection;

/// Days after the opening date during which a resort reads as open.
const OPENING_GRACE_DAYS: i64 = 50;

/// Resort lookup key.
#[derive(Debug, Clone, Copy)]
pub enum ResortKey<'a> {
    Id(i32),
    Slug(&'a str),
}

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

/// Elevation block exposed by the API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ElevationBlock {
    pub min: i32,
    pub max: i32,
    pub vertical: i32,
}

/// Opening-hours block exposed by the API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OpeningHours {
    /// Human-readable weekday lines.
    pub weekday_text: Option<Vec<String>>,
    /// Structured open/close periods.
    pub periods: Option<serde_json::Value>,
    pub open_now: Option<bool>,
}

/// Current weather as exposed on both detail and summary views.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WeatherSummaryOut {
    pub temperature: Option<f64>,
    pub apparent_temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<String>,
    pub last_update: String,
}

/// Full weather payload for the detail view.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WeatherDetailOut {
    pub temperature: Option<f64>,
    pub apparent_temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<String>,
    pub winddirection: Option<f64>,
    pub freezing_level_current: Option<f64>,
    pub freezing_level_24h_avg: Option<f64>,
    pub temp_base: Option<f64>,
    pub temp_mid: Option<f64>,
    pub temp_summit: Option<f64>,
    pub today_sunrise: Option<String>,
    pub today_sunset: Option<String>,
    pub today_temp_max: Option<f64>,
    pub today_temp_min: Option<f64>,
    pub avg_windspeed_24h: Option<f64>,
    pub snowfall_24h: Option<f64>,
    pub precipitation_24h: Option<f64>,
    /// Hourly forecast points, local time.
    pub hourly_forecast: Option<serde_json::Value>,
    /// Daily forecast points.
    pub daily_forecast: Option<serde_json::Value>,
    pub last_update: String,
}

/// Webcam as exposed by the API (latest row per webcam).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebcamOut {
    pub webcam_uuid: String,
    pub title: Option<String>,
    pub image_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub video_stream_url: Option<String>,
    pub webcam_type: i32,
    pub is_featured: bool,
    pub last_updated: Option<String>,
    pub source: Option<String>,
}

/// Full resort record: identity + latest condition + latest weather + webcams.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResortDetail {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub location: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub elevation_min: Option<i32>,
    pub elevation_max: Option<i32>,
    pub elevation: Option<ElevationBlock>,
    pub boundary: Option<serde_json::Value>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub zip_code: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub opening_hours: Option<OpeningHours>,
    pub status: Option<String>,
    pub opening_date: Option<String>,
    pub new_snow: Option<f64>,
    pub base_depth: Option<f64>,
    pub snow_depth_summit: Option<f64>,
    pub lifts_open: Option<i32>,
    pub lifts_total: Option<i32>,
    pub trails_open: Option<i32>,
    pub trails_total: Option<i32>,
    pub temperature: Option<f64>,
    pub last_update: Option<String>,
    pub data_source: Option<String>,
    pub weather: Option<WeatherDetailOut>,
    pub webcams: Option<Vec<WebcamOut>>,
    /// Distance from a nearby-search center (km); present on nearby results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

/// Lightweight per-resort summary: no forecast arrays.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResortSummary {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub location: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub elevation_min: Option<i32>,
    pub elevation_max: Option<i32>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub zip_code: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub data_source: Option<String>,
    pub status: Option<String>,
    pub opening_date: Option<String>,
    pub new_snow_24h: Option<f64>,
    pub base_depth: Option<f64>,
    pub lifts_open: Option<i32>,
    pub lifts_total: Option<i32>,
    pub trails_open: Option<i32>,
    pub trails_total: Option<i32>,
    pub last_condition_update: Option<String>,
    pub weather: Option<WeatherSummaryOut>,
    pub updated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

/// Trail as exposed by the API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TrailOut {
    pub id: i64,
    pub osm_id: Option<String>,
    pub osm_type: Option<String>,
    pub name: Option<String>,
    pub difficulty: Option<String>,
    pub piste_type: Option<String>,
    pub geometry: Option<serde_json::Value>,
    pub length_meters: Option<f64>,
    pub lit: Option<bool>,
    pub grooming: Option<String>,
    pub width: Option<String>,
    #[serde(rename = "ref")]
    pub trail_ref: Option<String>,
}

impl From<ResortTrail> for TrailOut {
    fn from(t: ResortTrail) -> Self {
        Self {
            id: t.id,
            osm_id: t.osm_id,
            osm_type: t.osm_type,
            name: t.name,
            difficulty: t.difficulty,
            piste_type: t.piste_type,
            geometry: t.geometry,
            length_meters: t.length_meters,
            lit: t.lit,
            grooming: t.grooming,
            width: t.width,
            trail_ref: t.trail_ref,
        }
    }
}

// ---------------------------------------------------------------------------
// Status rewrite
// ---------------------------------------------------------------------------

/// Rewrite a reported status from the opening date, relative to `today`.
///
/// - opened within the last `OPENING_GRACE_DAYS` days (incl. today) ⇒ "open"
/// - opening date still ahead ⇒ "closed"
/// - anything else (long past, unparseable, absent) ⇒ reported status
///
/// Applying the rewrite twice yields the same status.
pub fn status_from_opening_date(
    opening_date: Option<&str>,
    reported: Option<&str>,
    today: NaiveDate,
) -> Option<String> {
    let reported_owned = reported.map(|s| s.to_string());
    let Some(raw) = opening_date else {
        return reported_owned;
    };
    let Some(date) = parse_opening_date(raw) else {
        return reported_owned;
    };

    let days_until = (date - today).num_days();
    if days_until > 0 {
        Some("closed".to_string())
    } else if -days_until <= OPENING_GRACE_DAYS {
        Some("open".to_string())
    } else {
        reported_owned
    }
}

/// Opening dates arrive as bare dates or full RFC 3339 timestamps.
fn parse_opening_date(raw: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.date_naive())
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Latest full record for one enabled resort. Cache-aside under
/// `resort:{id}` / `resort:{slug}`.
pub async fn get_resort_detail(
    pool: &PgPool,
    cache: &Cache,
    key: ResortKey<'_>,
) -> Result<Option<ResortDetail>, sqlx::Error> {
    let cache_key = match key {
        ResortKey::Id(id) => cache::keys::resort_id(id),
        ResortKey::Slug(slug) => cache::keys::resort_slug(slug),
    };
    if let Some(detail) = cache.get_json::<ResortDetail>(&cache_key).await {
        return Ok(Some(detail));
    }

    let resort = match key {
        ResortKey::Id(id) => queries::get_resort_by_id(pool, id).await?,
        ResortKey::Slug(slug) => queries::get_resort_by_slug(pool, slug).await?,
    };
    let Some(resort) = resort.filter(|r| r.enabled) else {
        return Ok(None);
    };

    let detail = assemble_detail(pool, &resort).await?;
    cache.set_json(&cache_key, &detail).await;
    Ok(Some(detail))
}

async fn assemble_detail(pool: &PgPool, resort: &Resort) -> Result<ResortDetail, sqlx::Error> {
    let condition = queries::latest_condition(pool, resort.id).await?;
    let weather = queries::latest_weather(pool, resort.id).await?;
    let webcams = queries::latest_webcams(pool, resort.id).await?;

    let elevation = match (resort.elevation_min, resort.elevation_max) {
        (Some(min), Some(max)) => Some(ElevationBlock {
            min,
            max,
            vertical: max - min,
        }),
        _ => None,
    };

    let opening_hours = if resort.opening_hours_weekday.is_some()
        || resort.opening_hours_periods.is_some()
    {
        Some(OpeningHours {
            weekday_text: resort
                .opening_hours_weekday
                .as_deref()
                .and_then(|raw| serde_json::from_str(raw).ok()),
            periods: resort.opening_hours_periods.clone(),
            open_now: resort.is_open_now,
        })
    } else {
        None
    };

    let opening_date = condition
        .as_ref()
        .and_then(|c| c.opening_date().map(|s| s.to_string()));
    let status = status_from_opening_date(
        opening_date.as_deref(),
        condition.as_ref().and_then(|c| c.status.as_deref()),
        Utc::now().date_naive(),
    );

    let weather_out = weather.map(|w| WeatherDetailOut {
        temperature: w.current_temp,
        apparent_temperature: w.apparent_temperature,
        humidity: w.current_humidity,
        wind_speed: w.current_windspeed,
        wind_direction: w.current_winddirection_compass.clone(),
        winddirection: w.current_winddirection,
        freezing_level_current: w.freezing_level_current,
        freezing_level_24h_avg: w.freezing_level_24h_avg,
        temp_base: w.temp_base,
        temp_mid: w.temp_mid,
        temp_summit: w.temp_summit,
        today_sunrise: w.today_sunrise,
        today_sunset: w.today_sunset,
        today_temp_max: w.today_temp_max,
        today_temp_min: w.today_temp_min,
        avg_windspeed_24h: w.avg_windspeed_24h,
        snowfall_24h: w.snowfall_24h,
        precipitation_24h: w.precipitation_24h,
        hourly_forecast: w.hourly_forecast,
        daily_forecast: w.daily_forecast,
        last_update: w.timestamp.to_rfc3339(),
    });

    let webcams_out = if webcams.is_empty() {
        None
    } else {
        Some(
            webcams
                .into_iter()
                .map(|cam| WebcamOut {
                    webcam_uuid: cam.webcam_uuid,
                    title: cam.title,
                    image_url: cam.image_url,
                    thumbnail_url: cam.thumbnail_url,
                    video_stream_url: cam.video_stream_url,
                    webcam_type: cam.webcam_type,
                    is_featured: cam.is_featured,
                    last_updated: cam.last_updated.map(|t| t.to_rfc3339()),
                    source: cam.source,
                })
                .collect(),
        )
    };

    Ok(ResortDetail {
        id: resort.id,
        name: resort.name.clone(),
        slug: resort.slug.clone(),
        location: resort.location.clone(),
        lat: resort.lat,
        lon: resort.lon,
        elevation_min: resort.elevation_min,
        elevation_max: resort.elevation_max,
        elevation,
        boundary: resort.boundary.clone(),
        address: resort.address.clone(),
        city: resort.city.clone(),
        zip_code: resort.zip_code.clone(),
        phone: resort.phone.clone(),
        website: resort.website.clone(),
        opening_hours,
        status,
        opening_date,
        new_snow: condition.as_ref().and_then(|c| c.new_snow),
        base_depth: condition.as_ref().and_then(|c| c.base_depth),
        snow_depth_summit: condition.as_ref().and_then(|c| c.summit_depth()),
        lifts_open: condition.as_ref().and_then(|c| c.lifts_open),
        lifts_total: condition.as_ref().and_then(|c| c.lifts_total),
        trails_open: condition.as_ref().and_then(|c| c.trails_open),
        trails_total: condition.as_ref().and_then(|c| c.trails_total),
        temperature: condition.as_ref().and_then(|c| c.temperature),
        last_update: condition.as_ref().map(|c| c.timestamp.to_rfc3339()),
        data_source: condition
            .as_ref()
            .and_then(|c| c.data_source.clone())
            .or_else(|| resort.data_source.clone()),
        weather: weather_out,
        webcams: webcams_out,
        distance: None,
    })
}

/// Full records for every enabled resort. Cached under `resorts:all`.
pub async fn get_all_resorts(
    pool: &PgPool,
    cache: &Cache,
) -> Result<Vec<ResortDetail>, sqlx::Error> {
    if let Some(all) = cache.get_json::<Vec<ResortDetail>>(cache::keys::RESORTS_ALL).await {
        return Ok(all);
    }

    let resorts = queries::list_enabled_resorts(pool).await?;
    let mut details = Vec::with_capacity(resorts.len());
    for resort in &resorts {
        details.push(assemble_detail(pool, resort).await?);
    }

    cache.set_json(cache::keys::RESORTS_ALL, &details).await;
    Ok(details)
}

/// Summaries for every enabled resort. Cached under `resorts:summary` with
/// its own (shorter) TTL.
pub async fn get_all_summaries(
    pool: &PgPool,
    cache: &Cache,
) -> Result<Vec<ResortSummary>, sqlx::Error> {
    if let Some(all) = cache
        .get_json::<Vec<ResortSummary>>(cache::keys::RESORTS_SUMMARY)
        .await
    {
        return Ok(all);
    }

    let resorts = queries::list_enabled_resorts(pool).await?;
    let mut summaries = Vec::with_capacity(resorts.len());
    for resort in &resorts {
        let condition = queries::latest_condition(pool, resort.id).await?;
        let weather = queries::latest_weather(pool, resort.id).await?;

        let opening_date = condition
            .as_ref()
            .and_then(|c| c.opening_date().map(|s| s.to_string()));
        let status = status_from_opening_date(
            opening_date.as_deref(),
            condition.as_ref().and_then(|c| c.status.as_deref()),
            Utc::now().date_naive(),
        );

        summaries.push(ResortSummary {
            id: resort.id,
            name: resort.name.clone(),
            slug: resort.slug.clone(),
            location: resort.location.clone(),
            lat: resort.lat,
            lon: resort.lon,
            elevation_min: resort.elevation_min,
            elevation_max: resort.elevation_max,
            address: resort.address.clone(),
            city: resort.city.clone(),
            zip_code: resort.zip_code.clone(),
            phone: resort.phone.clone(),
            website: resort.website.clone(),
            data_source: resort.data_source.clone(),
            status,
            opening_date,
            new_snow_24h: condition.as_ref().and_then(|c| c.new_snow),
            base_depth: condition.as_ref().and_then(|c| c.base_depth),
            lifts_open: condition.as_ref().and_then(|c| c.lifts_open),
            lifts_total: condition.as_ref().and_then(|c| c.lifts_total),
            trails_open: condition.as_ref().and_then(|c| c.trails_open),
            trails_total: condition.as_ref().and_then(|c| c.trails_total),
            last_condition_update: condition.as_ref().map(|c| c.timestamp.to_rfc3339()),
            weather: weather.map(|w| WeatherSummaryOut {
                temperature: w.current_temp,
                apparent_temperature: w.apparent_temperature,
                humidity: w.current_humidity,
                wind_speed: w.current_windspeed,
                wind_direction: w.current_winddirection_compass,
                last_update: w.timestamp.to_rfc3339(),
            }),
            updated_at: Some(resort.updated_at.to_rfc3339()),
            distance: None,
        });
    }

    cache
        .set_json_ttl(
            cache::keys::RESORTS_SUMMARY,
            &summaries,
            cache::SUMMARY_TTL_SECS,
        )
        .await;
    Ok(summaries)
}

/// Trails for one enabled resort. Cache-aside under `trails:{id|slug}`.
/// Returns None when the resort is unknown or disabled.
pub async fn get_resort_trails(
    pool: &PgPool,
    cache: &Cache,
    key: ResortKey<'_>,
) -> Result<Option<Vec<TrailOut>>, sqlx::Error> {
    let cache_key = match key {
        ResortKey::Id(id) => cache::keys::trails_id(id),
        ResortKey::Slug(slug) => cache::keys::trails_slug(slug),
    };
    if let Some(trails) = cache.get_json::<Vec<TrailOut>>(&cache_key).await {
        return Ok(Some(trails));
    }

    let resort = match key {
        ResortKey::Id(id) => queries::get_resort_by_id(pool, id).await?,
        ResortKey::Slug(slug) => queries::get_resort_by_slug(pool, slug).await?,
    };
    let Some(resort) = resort.filter(|r| r.enabled) else {
        return Ok(None);
    };

    let trails: Vec<TrailOut> = queries::list_trails(pool, resort.id)
        .await?
        .into_iter()
        .map(TrailOut::from)
        .collect();

    cache
        .set_json_ttl(&cache_key, &trails, cache::TRAILS_TTL_SECS)
        .await;
    Ok(Some(trails))
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Persist one collection pass and invalidate the resort's read keys.
/// A failed transaction surfaces as `DATABASE_SAVE_FAILED`.
pub async fn persist_record(
    pool: &PgPool,
    cache: &Cache,
    descriptor: &ResortDescriptor,
    record: &CanonicalRecord,
) -> Result<(), CollectError> {
    queries::save_resort_record(pool, descriptor, record)
        .await
        .map_err(|e| CollectError::DatabaseSaveFailed {
            resort_id: descriptor.id,
            message: e.to_string(),
        })?;

    cache.invalidate_resort(descriptor.id, &descriptor.slug).await;
    Ok(())
}

/// Persist a trail collection pass and invalidate the trail keys.
pub async fn save_trails(
    pool: &PgPool,
    cache: &Cache,
    descriptor: &ResortDescriptor,
    collection: &TrailCollection,
) -> Result<usize, CollectError> {
    let boundary = collection
        .boundary
        .as_ref()
        .map(|ring| serde_json::to_value(ring).expect("ring serializes"));

    let inserted = queries::replace_trails(
        pool,
        descriptor.id,
        boundary.as_ref(),
        &collection.trails,
    )
    .await
    .map_err(|e| CollectError::DatabaseSaveFailed {
        resort_id: descriptor.id,
        message: e.to_string(),
    })?;

    cache.invalidate_trails(descriptor.id, &descriptor.slug).await;
    Ok(inserted)
}

/// Soft-delete a resort and drop every cache key that could still serve it.
/// Returns the resort row as it was, or None when absent.
pub async fn disable_resort(
    pool: &PgPool,
    cache: &Cache,
    resort_id: i32,
) -> Result<Option<Resort>, sqlx::Error> {
    let Some(resort) = queries::disable_resort(pool, resort_id).await? else {
        return Ok(None);
    };

    cache.invalidate_resort(resort.id, &resort.slug).await;
    cache.invalidate_trails(resort.id, &resort.slug).await;
    Ok(Some(resort))
}

// ---------------------------------------------------------------------------
// Trail statistics (shared by both trail endpoints)
// ---------------------------------------------------------------------------

/// Per-difficulty and per-type counts plus total length.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TrailStats {
    pub difficulty_stats: std::collections::BTreeMap<String, usize>,
    pub type_stats: std::collections::BTreeMap<String, usize>,
    pub total_length_km: f64,
}

/// Compute stats over a (possibly filtered) trail list.
pub fn trail_stats(trails: &[TrailOut]) -> TrailStats {
    let mut difficulty_stats = std::collections::BTreeMap::new();
    let mut type_stats = std::collections::BTreeMap::new();
    let mut total_length_m = 0.0;

    for trail in trails {
        let difficulty = trail
            .difficulty
            .clone()
            .unwrap_or_else(|| "unknown".to_string());
        *difficulty_stats.entry(difficulty).or_insert(0) += 1;
        let piste_type = trail
            .piste_type
            .clone()
            .unwrap_or_else(|| "unknown".to_string());
        *type_stats.entry(piste_type).or_insert(0) += 1;
        total_length_m += trail.length_meters.unwrap_or(0.0);
    }

    TrailStats {
        difficulty_stats,
        type_stats,
        total_length_km: round2(total_length_m / 1000.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_rewrite_recent_opening_forces_open() {
        let status = status_from_opening_date(
            Some("2025-11-10"),
            Some("closed"),
            date("2025-11-20"),
        );
        assert_eq!(status.as_deref(), Some("open"));
    }

    #[test]
    fn test_rewrite_future_opening_forces_closed() {
        let status = status_from_opening_date(
            Some("2025-12-05"),
            Some("open"),
            date("2025-11-20"),
        );
        assert_eq!(status.as_deref(), Some("closed"));
    }

    #[test]
    fn test_rewrite_old_opening_keeps_reported() {
        let status = status_from_opening_date(
            Some("2025-01-01"),
            Some("partial"),
            date("2025-11-20"),
        );
        assert_eq!(status.as_deref(), Some("partial"));
    }

    #[test]
    fn test_rewrite_grace_boundary() {
        // Exactly 50 days since opening still reads open; 51 does not
        let status = status_from_opening_date(Some("2025-10-01"), Some("closed"), date("2025-11-20"));
        assert_eq!(status.as_deref(), Some("open"));
        let status = status_from_opening_date(Some("2025-10-01"), Some("closed"), date("2025-11-21"));
        assert_eq!(status.as_deref(), Some("closed"));
    }

    #[test]
    fn test_rewrite_handles_rfc3339_and_garbage() {
        let status = status_from_opening_date(
            Some("2025-11-10T00:00:00Z"),
            Some("closed"),
            date("2025-11-20"),
        );
        assert_eq!(status.as_deref(), Some("open"));

        let status =
            status_from_opening_date(Some("soon"), Some("partial"), date("2025-11-20"));
        assert_eq!(status.as_deref(), Some("partial"));
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let today = date("2025-11-20");
        for (opening, reported) in [
            (Some("2025-11-10"), Some("closed")),
            (Some("2025-12-05"), Some("open")),
            (Some("2025-01-01"), Some("partial")),
            (None, Some("open")),
        ] {
            let once = status_from_opening_date(opening, reported, today);
            let twice = status_from_opening_date(opening, once.as_deref(), today);
            assert_eq!(once, twice, "opening={opening:?} reported={reported:?}");
        }
    }

    #[test]
    fn test_rewrite_without_opening_date_passes_through() {
        assert_eq!(
            status_from_opening_date(None, Some("open"), date("2025-11-20")).as_deref(),
            Some("open")
        );
        assert_eq!(status_from_opening_date(None, None, date("2025-11-20")), None);
    }

    fn trail(difficulty: &str, piste_type: &str, length: f64) -> TrailOut {
        TrailOut {
            id: 0,
            osm_id: None,
            osm_type: None,
            name: None,
            difficulty: Some(difficulty.to_string()),
            piste_type: Some(piste_type.to_string()),
            geometry: None,
            length_meters: Some(length),
            lit: None,
            grooming: None,
            width: None,
            trail_ref: None,
        }
    }

    #[test]
    fn test_trail_stats() {
        let trails = vec![
            trail("easy", "downhill", 1200.0),
            trail("easy", "nordic", 800.0),
            trail("expert", "downhill", 2500.0),
        ];
        let stats = trail_stats(&trails);
        assert_eq!(stats.difficulty_stats["easy"], 2);
        assert_eq!(stats.difficulty_stats["expert"], 1);
        assert_eq!(stats.type_stats["downhill"], 2);
        assert_eq!(stats.total_length_km, 4.5);
    }

    #[test]
    fn test_trail_stats_empty() {
        let stats = trail_stats(&[]);
        assert!(stats.difficulty_stats.is_empty());
        assert_eq!(stats.total_length_km, 0.0);
    }
}
