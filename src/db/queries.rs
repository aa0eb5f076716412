use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use super::models::{Resort, ResortCondition, ResortTrail, ResortWeather, ResortWebcam};
use crate::config::ResortDescriptor;
use crate::services::google_places::ContactInfo;
use crate::services::normalizer::CanonicalRecord;
use crate::services::overpass::TrailRecord;

/// Resort SELECT column list.
///
/// All columns from the `resorts` table. Keep in sync with the `Resort`
/// model struct in `models.rs`.
const RESORT_COLS: &str = "\
    id, name, slug, location, lat, lon, elevation_min, elevation_max, boundary, \
    data_source, source_url, source_id, \
    address, city, zip_code, phone, website, \
    opening_hours_weekday, opening_hours_periods, is_open_now, \
    enabled, notes, created_at, updated_at";

/// Condition SELECT column list.
const CONDITION_COLS: &str = "\
    id, resort_id, timestamp, status, new_snow, base_depth, \
    lifts_open, lifts_total, trails_open, trails_total, temperature, \
    extra, source, data_source, created_at";

/// Weather SELECT column list.
const WEATHER_COLS: &str = "\
    id, resort_id, timestamp, current_temp, apparent_temperature, \
    current_humidity, current_windspeed, current_winddirection, \
    current_winddirection_compass, freezing_level_current, \
    freezing_level_24h_avg, temp_base, temp_mid, temp_summit, \
    today_sunrise, today_sunset, today_temp_max, today_temp_min, \
    avg_windspeed_24h, snowfall_24h, precipitation_24h, \
    hourly_forecast, daily_forecast, source, created_at";

/// Webcam SELECT column list.
const WEBCAM_COLS: &str = "\
    id, resort_id, timestamp, webcam_uuid, title, image_url, thumbnail_url, \
    video_stream_url, webcam_type, is_featured, last_updated, source, created_at";

/// Trail SELECT column list.
const TRAIL_COLS: &str = "\
    id, resort_id, osm_id, osm_type, name, difficulty, piste_type, geometry, \
    length_meters, lit, grooming, width, ref, created_at";

// ---------------------------------------------------------------------------
// Resort reads
// ---------------------------------------------------------------------------

pub async fn get_resort_by_id(pool: &PgPool, id: i32) -> Result<Option<Resort>, sqlx::Error> {
    sqlx::query_as::<_, Resort>(&format!(
        "SELECT {RESORT_COLS} FROM resorts WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn get_resort_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Resort>, sqlx::Error> {
    sqlx::query_as::<_, Resort>(&format!(
        "SELECT {RESORT_COLS} FROM resorts WHERE slug = $1"
    ))
    .bind(slug)
    .fetch_optional(pool)
    .await
}

/// All enabled resorts, ordered by id for stable list responses.
pub async fn list_enabled_resorts(pool: &PgPool) -> Result<Vec<Resort>, sqlx::Error> {
    sqlx::query_as::<_, Resort>(&format!(
        "SELECT {RESORT_COLS} FROM resorts WHERE enabled = TRUE ORDER BY id"
    ))
    .fetch_all(pool)
    .await
}

pub async fn count_enabled_resorts(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM resorts WHERE enabled = TRUE")
        .fetch_one(pool)
        .await
}

// ---------------------------------------------------------------------------
// Latest snapshot reads
// ---------------------------------------------------------------------------

pub async fn latest_condition(
    pool: &PgPool,
    resort_id: i32,
) -> Result<Option<ResortCondition>, sqlx::Error> {
    sqlx::query_as::<_, ResortCondition>(&format!(
        "SELECT {CONDITION_COLS} FROM resort_conditions
         WHERE resort_id = $1
         ORDER BY timestamp DESC
         LIMIT 1"
    ))
    .bind(resort_id)
    .fetch_optional(pool)
    .await
}

pub async fn latest_weather(
    pool: &PgPool,
    resort_id: i32,
) -> Result<Option<ResortWeather>, sqlx::Error> {
    sqlx::query_as::<_, ResortWeather>(&format!(
        "SELECT {WEATHER_COLS} FROM resort_weather
         WHERE resort_id = $1
         ORDER BY timestamp DESC
         LIMIT 1"
    ))
    .bind(resort_id)
    .fetch_optional(pool)
    .await
}

/// Newest row per webcam_uuid for a resort.
pub async fn latest_webcams(
    pool: &PgPool,
    resort_id: i32,
) -> Result<Vec<ResortWebcam>, sqlx::Error> {
    sqlx::query_as::<_, ResortWebcam>(&format!(
        "SELECT DISTINCT ON (webcam_uuid) {WEBCAM_COLS}
         FROM resort_webcams
         WHERE resort_id = $1
         ORDER BY webcam_uuid, timestamp DESC"
    ))
    .bind(resort_id)
    .fetch_all(pool)
    .await
}

pub async fn list_trails(pool: &PgPool, resort_id: i32) -> Result<Vec<ResortTrail>, sqlx::Error> {
    sqlx::query_as::<_, ResortTrail>(&format!(
        "SELECT {TRAIL_COLS} FROM resort_trails WHERE resort_id = $1 ORDER BY id"
    ))
    .bind(resort_id)
    .fetch_all(pool)
    .await
}

// ---------------------------------------------------------------------------
// Collection write path
// ---------------------------------------------------------------------------

/// Persist one collection pass for a resort as a single transaction:
/// upsert the identity row, insert condition + weather snapshots, and
/// append webcam rows. Rolls back as a unit on any failure.
pub async fn save_resort_record(
    pool: &PgPool,
    descriptor: &ResortDescriptor,
    record: &CanonicalRecord,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    let now = Utc::now();

    upsert_resort(&mut tx, descriptor, now).await?;
    insert_condition(&mut tx, record, now).await?;
    if let Some(weather) = &record.weather {
        insert_weather(&mut tx, record.resort_id, weather, now).await?;
    }
    insert_webcams(&mut tx, record, now).await?;

    tx.commit().await
}

async fn upsert_resort(
    tx: &mut Transaction<'_, Postgres>,
    descriptor: &ResortDescriptor,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO resorts (id, name, slug, location, lat, lon,
                              elevation_min, elevation_max,
                              data_source, source_url, source_id, enabled)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
         ON CONFLICT (id) DO UPDATE SET updated_at = $13",
    )
    .bind(descriptor.id)
    .bind(&descriptor.name)
    .bind(&descriptor.slug)
    .bind(&descriptor.location)
    .bind(descriptor.lat)
    .bind(descriptor.lon)
    .bind(descriptor.elevation_min)
    .bind(descriptor.elevation_max)
    .bind(descriptor.data_source.as_str())
    .bind(&descriptor.source_url)
    .bind(&descriptor.source_id)
    .bind(descriptor.enabled)
    .bind(now)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_condition(
    tx: &mut Transaction<'_, Postgres>,
    record: &CanonicalRecord,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    let extra = serde_json::json!({
        "opening_date": record.opening_date,
        "closing_date": record.closing_date,
        "summit_depth": record.summit_depth,
    });

    sqlx::query(
        "INSERT INTO resort_conditions
            (resort_id, timestamp, status, new_snow, base_depth,
             lifts_open, lifts_total, trails_open, trails_total,
             temperature, extra, source, data_source)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
    )
    .bind(record.resort_id)
    .bind(now)
    .bind(record.status.as_str())
    .bind(record.new_snow)
    .bind(record.base_depth)
    .bind(record.lifts_open)
    .bind(record.lifts_total)
    .bind(record.trails_open)
    .bind(record.trails_total)
    .bind(record.temperature)
    .bind(extra)
    .bind(&record.source)
    .bind(record.data_source.as_str())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_weather(
    tx: &mut Transaction<'_, Postgres>,
    resort_id: i32,
    weather: &crate::services::normalizer::WeatherBlock,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    let hourly = serde_json::to_value(&weather.hourly_forecast)
        .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
    let daily = serde_json::to_value(&weather.daily_forecast)
        .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
    let today = weather.today.as_ref();

    sqlx::query(
        "INSERT INTO resort_weather
            (resort_id, timestamp, current_temp, apparent_temperature,
             current_humidity, current_windspeed, current_winddirection,
             current_winddirection_compass, freezing_level_current,
             freezing_level_24h_avg, temp_base, temp_mid, temp_summit,
             today_sunrise, today_sunset, today_temp_max, today_temp_min,
             avg_windspeed_24h, snowfall_24h, precipitation_24h,
             hourly_forecast, daily_forecast, source)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                 $14, $15, $16, $17, $18, $19, $20, $21, $22, $23)",
    )
    .bind(resort_id)
    .bind(now)
    .bind(weather.current.temperature)
    .bind(weather.current.apparent_temperature)
    .bind(weather.current.humidity)
    .bind(weather.current.windspeed)
    .bind(weather.current.winddirection)
    .bind(&weather.current.winddirection_compass)
    .bind(weather.freezing_level_current)
    .bind(weather.freezing_level_24h_avg)
    .bind(weather.temp_base)
    .bind(weather.temp_mid)
    .bind(weather.temp_summit)
    .bind(today.and_then(|t| t.sunrise.clone()))
    .bind(today.and_then(|t| t.sunset.clone()))
    .bind(today.and_then(|t| t.temp_max))
    .bind(today.and_then(|t| t.temp_min))
    .bind(weather.avg_windspeed_24h)
    .bind(weather.snowfall_24h)
    .bind(weather.precipitation_24h)
    .bind(hourly)
    .bind(daily)
    .bind(&weather.source)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_webcams(
    tx: &mut Transaction<'_, Postgres>,
    record: &CanonicalRecord,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    for cam in &record.webcams {
        let last_updated = cam
            .last_updated
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        sqlx::query(
            "INSERT INTO resort_webcams
                (resort_id, timestamp, webcam_uuid, title, image_url,
                 thumbnail_url, video_stream_url, webcam_type, is_featured,
                 last_updated, source)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(record.resort_id)
        .bind(now)
        .bind(&cam.webcam_uuid)
        .bind(&cam.title)
        .bind(&cam.image_url)
        .bind(&cam.thumbnail_url)
        .bind(&cam.video_stream_url)
        .bind(cam.webcam_type)
        .bind(cam.is_featured)
        .bind(last_updated)
        .bind(&record.source)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Trail write path
// ---------------------------------------------------------------------------

/// Replace a resort's trail set (and optionally its boundary polygon) in one
/// transaction. Returns the number of trails inserted.
pub async fn replace_trails(
    pool: &PgPool,
    resort_id: i32,
    boundary: Option<&serde_json::Value>,
    trails: &[TrailRecord],
) -> Result<usize, sqlx::Error> {
    let mut tx = pool.begin().await?;

    if let Some(boundary) = boundary {
        sqlx::query("UPDATE resorts SET boundary = $2, updated_at = NOW() WHERE id = $1")
            .bind(resort_id)
            .bind(boundary)
            .execute(&mut *tx)
            .await?;
    }

    sqlx::query("DELETE FROM resort_trails WHERE resort_id = $1")
        .bind(resort_id)
        .execute(&mut *tx)
        .await?;

    for trail in trails {
        let geometry = serde_json::to_value(&trail.geometry)
            .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        sqlx::query(
            "INSERT INTO resort_trails
                (resort_id, osm_id, osm_type, name, difficulty, piste_type,
                 geometry, length_meters, lit, grooming, width, ref)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(resort_id)
        .bind(&trail.osm_id)
        .bind(&trail.osm_type)
        .bind(&trail.name)
        .bind(&trail.difficulty)
        .bind(&trail.piste_type)
        .bind(geometry)
        .bind(trail.length_meters)
        .bind(trail.lit)
        .bind(&trail.grooming)
        .bind(&trail.width)
        .bind(&trail.trail_ref)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(trails.len())
}

// ---------------------------------------------------------------------------
// Contact enrichment write path
// ---------------------------------------------------------------------------

/// Update a resort's contact columns from a places lookup. Only fields the
/// lookup actually produced are written. Returns false when the resort does
/// not exist.
pub async fn update_contact_info(
    pool: &PgPool,
    resort_id: i32,
    contact: &ContactInfo,
) -> Result<bool, sqlx::Error> {
    let periods = contact
        .opening_hours_periods
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
    let weekday_text = contact
        .opening_hours_weekday
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

    let result = sqlx::query(
        "UPDATE resorts SET
            address = COALESCE($2, address),
            city = COALESCE($3, city),
            zip_code = COALESCE($4, zip_code),
            phone = COALESCE($5, phone),
            website = COALESCE($6, website),
            opening_hours_weekday = COALESCE($7, opening_hours_weekday),
            opening_hours_periods = COALESCE($8, opening_hours_periods),
            is_open_now = COALESCE($9, is_open_now),
            updated_at = NOW()
         WHERE id = $1",
    )
    .bind(resort_id)
    .bind(&contact.address)
    .bind(&contact.city)
    .bind(&contact.zip_code)
    .bind(&contact.phone)
    .bind(&contact.website)
    .bind(weekday_text)
    .bind(periods)
    .bind(contact.open_now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

// ---------------------------------------------------------------------------
// Soft delete
// ---------------------------------------------------------------------------

/// Disable a resort without removing any rows. Returns the resort as it was
/// before the flip, or None if it does not exist.
pub async fn disable_resort(pool: &PgPool, resort_id: i32) -> Result<Option<Resort>, sqlx::Error> {
    let resort = get_resort_by_id(pool, resort_id).await?;
    let Some(resort) = resort else {
        return Ok(None);
    };

    sqlx::query("UPDATE resorts SET enabled = FALSE, updated_at = NOW() WHERE id = $1")
        .bind(resort_id)
        .execute(pool)
        .await?;

    Ok(Some(resort))
}
