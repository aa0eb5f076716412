use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Resort identity row. Long-lived; soft-deleted via `enabled`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Resort {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub location: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub elevation_min: Option<i32>,
    pub elevation_max: Option<i32>,
    /// Boundary polygon as an ordered ring of [lon, lat] pairs.
    pub boundary: Option<serde_json::Value>,
    pub data_source: Option<String>,
    pub source_url: Option<String>,
    pub source_id: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub zip_code: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub opening_hours_weekday: Option<String>,
    pub opening_hours_periods: Option<serde_json::Value>,
    pub is_open_now: Option<bool>,
    pub enabled: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Time-stamped operational state row. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResortCondition {
    pub id: i64,
    pub resort_id: i32,
    pub timestamp: DateTime<Utc>,
    pub status: Option<String>,
    pub new_snow: Option<f64>,
    pub base_depth: Option<f64>,
    pub lifts_open: Option<i32>,
    pub lifts_total: Option<i32>,
    pub trails_open: Option<i32>,
    pub trails_total: Option<i32>,
    pub temperature: Option<f64>,
    /// Opening/closing dates, summit depth and other provider extras.
    pub extra: Option<serde_json::Value>,
    pub source: Option<String>,
    pub data_source: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ResortCondition {
    /// The `opening_date` string carried in the extras blob, if any.
    pub fn opening_date(&self) -> Option<&str> {
        self.extra.as_ref()?.get("opening_date")?.as_str()
    }

    pub fn summit_depth(&self) -> Option<f64> {
        self.extra.as_ref()?.get("summit_depth")?.as_f64()
    }
}

/// Time-stamped meteorological row. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResortWeather {
    pub id: i64,
    pub resort_id: i32,
    pub timestamp: DateTime<Utc>,
    pub current_temp: Option<f64>,
    pub apparent_temperature: Option<f64>,
    pub current_humidity: Option<f64>,
    pub current_windspeed: Option<f64>,
    pub current_winddirection: Option<f64>,
    pub current_winddirection_compass: Option<String>,
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
    /// Hourly forecast points (local time), serialized `HourlyPoint` list.
    pub hourly_forecast: Option<serde_json::Value>,
    /// Daily forecast points, serialized `DailyPoint` list.
    pub daily_forecast: Option<serde_json::Value>,
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One webcam observation row; the read path keeps the newest row per
/// `webcam_uuid`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResortWebcam {
    pub id: i64,
    pub resort_id: i32,
    pub timestamp: DateTime<Utc>,
    pub webcam_uuid: String,
    pub title: Option<String>,
    pub image_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub video_stream_url: Option<String>,
    pub webcam_type: i32,
    pub is_featured: bool,
    pub last_updated: Option<DateTime<Utc>>,
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Static trail geometry row. Replaced wholesale on each trail collection.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResortTrail {
    pub id: i64,
    pub resort_id: i32,
    pub osm_id: Option<String>,
    pub osm_type: Option<String>,
    pub name: Option<String>,
    pub difficulty: Option<String>,
    pub piste_type: Option<String>,
    /// Ordered [lon, lat] polyline.
    pub geometry: Option<serde_json::Value>,
    pub length_meters: Option<f64>,
    pub lit: Option<bool>,
    pub grooming: Option<String>,
    pub width: Option<String>,
    #[sqlx(rename = "ref")]
    #[serde(rename = "ref")]
    pub trail_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}
