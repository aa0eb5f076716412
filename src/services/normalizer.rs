//! Payload normalization: one canonical record shape for every provider.
//!
//! Each upstream feed has its own schema; the normalizer maps them all into
//! `CanonicalRecord`, applying the sentinel-coercion rules from `helpers`,
//! the provider-specific status derivation, and (for weather payloads) the
//! elevation-banded temperature interpolation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::config::{DataSource, ResortDescriptor};
use crate::helpers::{coerce_count, coerce_depth, coerce_temperature, round1, wind_compass};
use crate::services::openmeteo::interpolate_temperature_at_elevation;

/// Operational status of a resort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResortStatus {
    Open,
    Partial,
    Closed,
}

impl ResortStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ResortStatus::Open => "open",
            ResortStatus::Partial => "partial",
            ResortStatus::Closed => "closed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "open" => Some(ResortStatus::Open),
            "partial" => Some(ResortStatus::Partial),
            "closed" => Some(ResortStatus::Closed),
            _ => None,
        }
    }
}

/// A webcam extracted from the supplementary provider.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebcamRecord {
    pub webcam_uuid: String,
    pub title: Option<String>,
    pub image_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub video_stream_url: Option<String>,
    pub webcam_type: i32,
    pub is_featured: bool,
    /// Provider-reported last update, RFC 3339.
    pub last_updated: Option<String>,
}

/// Instantaneous weather at collection time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CurrentWeather {
    pub temperature: Option<f64>,
    pub apparent_temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub windspeed: Option<f64>,
    pub winddirection: Option<f64>,
    pub winddirection_compass: Option<String>,
}

/// Today's daily aggregates from the forecast.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct TodayWeather {
    pub date: Option<String>,
    pub sunrise: Option<String>,
    pub sunset: Option<String>,
    pub temp_max: Option<f64>,
    pub temp_min: Option<f64>,
    pub precipitation: Option<f64>,
    pub snowfall: Option<f64>,
    pub windspeed_max: Option<f64>,
}

/// One hourly forecast sample. Times are local to the resort's timezone,
/// exactly as the provider reports them.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HourlyPoint {
    pub time: String,
    pub temperature: Option<f64>,
    pub apparent_temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub windspeed: Option<f64>,
    pub winddirection: Option<f64>,
    pub freezing_level: Option<f64>,
    /// WMO weather code.
    pub weather_code: Option<i64>,
    /// Hourly snowfall (cm).
    pub snowfall: Option<f64>,
    /// Hourly precipitation (mm).
    pub precipitation: Option<f64>,
    pub temp_base: Option<f64>,
    pub temp_mid: Option<f64>,
    pub temp_summit: Option<f64>,
}

/// One daily forecast sample.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DailyPoint {
    pub date: String,
    pub temp_max: Option<f64>,
    pub temp_min: Option<f64>,
    pub snowfall: Option<f64>,
    pub precipitation: Option<f64>,
    /// WMO code taken from the hourly sample at 12:00 local of this date.
    pub weather_code: Option<i64>,
}

/// Normalized weather block, attached to a canonical record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WeatherBlock {
    pub current: CurrentWeather,
    pub freezing_level_current: Option<f64>,
    pub freezing_level_24h_avg: Option<f64>,
    pub temp_base: Option<f64>,
    pub temp_mid: Option<f64>,
    pub temp_summit: Option<f64>,
    pub today: Option<TodayWeather>,
    pub hourly_forecast: Vec<HourlyPoint>,
    pub daily_forecast: Vec<DailyPoint>,
    pub avg_windspeed_24h: Option<f64>,
    pub snowfall_24h: Option<f64>,
    pub precipitation_24h: Option<f64>,
    pub source: String,
}

/// The canonical per-resort record produced by one collection pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub resort_id: i32,
    pub name: String,
    pub slug: String,
    pub location: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub status: ResortStatus,
    /// New snow over the past 24h (cm).
    pub new_snow: f64,
    /// Base snow depth (cm). None when the provider reports no depth.
    pub base_depth: Option<f64>,
    pub lifts_open: i32,
    pub lifts_total: i32,
    pub trails_open: i32,
    pub trails_total: i32,
    pub temperature: Option<f64>,
    pub opening_date: Option<String>,
    pub closing_date: Option<String>,
    pub summit_depth: Option<f64>,
    /// URL the primary payload came from.
    pub source: String,
    pub data_source: DataSource,
    pub webcams: Vec<WebcamRecord>,
    pub weather: Option<WeatherBlock>,
}

/// Number of hourly forecast samples retained, starting at the current hour.
const HOURLY_FORECAST_HORIZON: usize = 80;
/// Number of daily forecast samples retained.
const DAILY_FORECAST_HORIZON: usize = 8;
/// Minimum hourly samples required before 24h aggregates are computed.
const AGGREGATE_WINDOW_HOURS: usize = 24;

/// Normalize a raw primary payload into the canonical record.
pub fn normalize(
    resort: &ResortDescriptor,
    raw: &Value,
    source_kind: DataSource,
) -> CanonicalRecord {
    let mut record = match source_kind {
        DataSource::Mtnpowder => normalize_mtnpowder(resort, raw),
        DataSource::Onthesnow => normalize_onthesnow(resort, raw),
    };
    clamp_counts(&mut record);
    record
}

/// Open counts can never exceed totals. A zero total is treated as
/// "total unknown" and left alone.
fn clamp_counts(record: &mut CanonicalRecord) {
    if record.lifts_total > 0 {
        record.lifts_open = record.lifts_open.min(record.lifts_total);
    }
    if record.trails_total > 0 {
        record.trails_open = record.trails_open.min(record.trails_total);
    }
}

// ---------------------------------------------------------------------------
// MtnPowder
// ---------------------------------------------------------------------------

fn normalize_mtnpowder(resort: &ResortDescriptor, raw: &Value) -> CanonicalRecord {
    let snow_report = raw.get("SnowReport");
    let base_station = raw
        .get("CurrentConditions")
        .and_then(|c| c.get("Base"));

    let lifts_open = coerce_count(snow_report.and_then(|s| s.get("TotalOpenLifts")));
    let lifts_total = coerce_count(snow_report.and_then(|s| s.get("TotalLifts")));

    let operating_status = raw
        .get("OperatingStatus")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let status = if operating_status.contains("Open") && lifts_open > 0 {
        ResortStatus::Open
    } else if operating_status.contains("Open") {
        ResortStatus::Partial
    } else {
        ResortStatus::Closed
    };

    // The feed reports temperature as a string; sentinel values become 0
    // rather than dropping the field entirely.
    let temperature = coerce_temperature(base_station.and_then(|b| b.get("TemperatureC")))
        .unwrap_or(0.0);

    let source_url = format!(
        "https://www.mtnpowder.com/feed?resortId={}",
        resort.source_id.as_deref().unwrap_or("")
    );

    CanonicalRecord {
        resort_id: resort.id,
        name: resort.name.clone(),
        slug: resort.slug.clone(),
        location: resort.location.clone(),
        lat: resort.lat,
        lon: resort.lon,
        status,
        new_snow: coerce_depth(snow_report.and_then(|s| s.get("StormTotalCM"))).unwrap_or(0.0),
        base_depth: coerce_depth(snow_report.and_then(|s| s.get("BaseDepthCM"))),
        lifts_open,
        lifts_total,
        trails_open: coerce_count(snow_report.and_then(|s| s.get("TotalOpenTrails"))),
        trails_total: coerce_count(snow_report.and_then(|s| s.get("TotalTrails"))),
        temperature: Some(temperature),
        opening_date: None,
        closing_date: None,
        summit_depth: coerce_depth(snow_report.and_then(|s| s.get("SummitDepthCM"))),
        source: source_url,
        data_source: DataSource::Mtnpowder,
        webcams: Vec::new(),
        weather: None,
    }
}

// ---------------------------------------------------------------------------
// OnTheSnow
// ---------------------------------------------------------------------------

fn normalize_onthesnow(resort: &ResortDescriptor, raw: &Value) -> CanonicalRecord {
    let page_props = raw.get("props").and_then(|p| p.get("pageProps"));
    let full_resort = page_props.and_then(|p| p.get("fullResort"));
    let short_weather = page_props.and_then(|p| p.get("shortWeather"));

    let snow = full_resort.and_then(|r| r.get("snow"));
    let lifts = full_resort.and_then(|r| r.get("lifts"));
    let runs = full_resort.and_then(|r| r.get("runs"));
    let status_info = full_resort.and_then(|r| r.get("status"));

    let open_flag = status_info
        .and_then(|s| s.get("openFlag"))
        .and_then(|v| v.as_i64())
        .unwrap_or(2);
    let status = match open_flag {
        0 => ResortStatus::Open,
        1 => ResortStatus::Partial,
        _ => ResortStatus::Closed,
    };

    let base_depth = coerce_depth(snow.and_then(|s| s.get("base")))
        .or_else(|| coerce_depth(snow.and_then(|s| s.get("summit"))));

    // The page reports a min/max band for today; the canonical temperature
    // is the band mean.
    let temp_min = coerce_temperature(short_weather.and_then(|w| w.get("temp")).and_then(|t| t.get("min")));
    let temp_max = coerce_temperature(short_weather.and_then(|w| w.get("temp")).and_then(|t| t.get("max")));
    let temperature = match (temp_min, temp_max) {
        (Some(min), Some(max)) => Some(round1((min + max) / 2.0)),
        (Some(v), None) | (None, Some(v)) => Some(v),
        (None, None) => None,
    };

    let name = full_resort
        .and_then(|r| r.get("title"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| resort.name.clone());
    let lat = full_resort
        .and_then(|r| r.get("latitude"))
        .and_then(|v| v.as_f64())
        .unwrap_or(resort.lat);
    let lon = full_resort
        .and_then(|r| r.get("longitude"))
        .and_then(|v| v.as_f64())
        .unwrap_or(resort.lon);

    let string_at = |v: Option<&Value>| -> Option<String> {
        v.and_then(|x| x.as_str()).map(|s| s.to_string())
    };

    CanonicalRecord {
        resort_id: resort.id,
        name,
        slug: resort.slug.clone(),
        location: resort.location.clone(),
        lat,
        lon,
        status,
        new_snow: coerce_depth(snow.and_then(|s| s.get("last24"))).unwrap_or(0.0),
        base_depth,
        lifts_open: coerce_count(lifts.and_then(|l| l.get("open"))),
        lifts_total: coerce_count(lifts.and_then(|l| l.get("total"))),
        trails_open: coerce_count(runs.and_then(|r| r.get("open"))),
        trails_total: coerce_count(runs.and_then(|r| r.get("total"))),
        temperature,
        opening_date: string_at(status_info.and_then(|s| s.get("openingDate"))),
        closing_date: string_at(status_info.and_then(|s| s.get("closingDate"))),
        summit_depth: coerce_depth(snow.and_then(|s| s.get("summit"))),
        source: resort.source_url.clone().unwrap_or_default(),
        data_source: DataSource::Onthesnow,
        webcams: extract_webcams(full_resort),
        weather: None,
    }
}

/// Pull the webcam list out of an OnTheSnow page payload.
pub fn extract_webcams(full_resort: Option<&Value>) -> Vec<WebcamRecord> {
    let Some(cams) = full_resort
        .and_then(|r| r.get("webcams"))
        .and_then(|w| w.as_array())
    else {
        return Vec::new();
    };

    cams.iter()
        .filter_map(|cam| {
            let uuid = cam.get("uuid").and_then(|v| v.as_str())?;
            let string_at = |key: &str| -> Option<String> {
                cam.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
            };
            Some(WebcamRecord {
                webcam_uuid: uuid.to_string(),
                title: string_at("title"),
                image_url: string_at("imageUrl"),
                thumbnail_url: string_at("thumbnailUrl"),
                video_stream_url: string_at("videoStreamUrl"),
                webcam_type: cam.get("type").and_then(|v| v.as_i64()).unwrap_or(0) as i32,
                is_featured: cam
                    .get("featured")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false),
                last_updated: string_at("lastUpdated"),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

/// Merge a supplementary OnTheSnow record into the primary record.
///
/// Webcams always come from the supplementary source; lift/trail counts are
/// backfilled only when the primary has nothing. Nothing else from the
/// supplementary payload overrides the primary.
pub fn apply_supplementary(primary: &mut CanonicalRecord, supplementary: CanonicalRecord) {
    if !supplementary.webcams.is_empty() {
        primary.webcams = supplementary.webcams;
    }
    if primary.trails_total == 0 && supplementary.trails_total > 0 {
        primary.trails_total = supplementary.trails_total;
        primary.trails_open = supplementary.trails_open;
    }
}

// ---------------------------------------------------------------------------
// Open-Meteo
// ---------------------------------------------------------------------------

/// Normalize a merged Open-Meteo response (hourly + daily) into a weather
/// block. The hourly series is local-time and anchored at the current hour.
pub fn normalize_openmeteo(resort: &ResortDescriptor, raw: &Value) -> WeatherBlock {
    let hourly = raw.get("hourly");

    let times = string_series(hourly, "time");
    let temperatures = f64_series(hourly, "temperature_2m");
    let apparent = f64_series(hourly, "apparent_temperature");
    let humidities = f64_series(hourly, "relativehumidity_2m");
    let windspeeds = f64_series(hourly, "windspeed_10m");
    let winddirections = f64_series(hourly, "winddirection_10m");
    let freezing_levels = f64_series(hourly, "freezinglevel_height");
    let weathercodes = i64_series(hourly, "weathercode");
    let snowfalls = f64_series(hourly, "snowfall");
    let precipitations = f64_series(hourly, "precipitation");

    let pressure_series = PRESSURE_LEVEL_FIELDS
        .map(|field| f64_series(hourly, field));

    let pressure_temps_at = |i: usize| -> [Option<f64>; 5] {
        [0, 1, 2, 3, 4].map(|level| pressure_series[level].get(i).copied().flatten())
    };

    let band_targets = BandTargets::from_descriptor(resort);
    let current_bands = band_targets.interpolate(&pressure_temps_at(0));

    let current_winddirection = value_at(&winddirections, 0);
    let current = CurrentWeather {
        temperature: value_at(&temperatures, 0),
        apparent_temperature: value_at(&apparent, 0),
        humidity: value_at(&humidities, 0),
        windspeed: value_at(&windspeeds, 0),
        winddirection: current_winddirection,
        winddirection_compass: current_winddirection
            .and_then(wind_compass)
            .map(|s| s.to_string()),
    };

    // 24h aggregates require a full window of samples.
    let freezing_level_24h_avg = window_mean(&freezing_levels);
    let avg_windspeed_24h = window_mean(&windspeeds);
    let snowfall_24h = window_sum(&snowfalls);
    let precipitation_24h = window_sum(&precipitations);

    let mut hourly_forecast = Vec::with_capacity(HOURLY_FORECAST_HORIZON.min(times.len()));
    for (i, time) in times.iter().take(HOURLY_FORECAST_HORIZON).enumerate() {
        let bands = band_targets.interpolate(&pressure_temps_at(i));
        hourly_forecast.push(HourlyPoint {
            time: time.clone(),
            temperature: value_at(&temperatures, i),
            apparent_temperature: value_at(&apparent, i),
            humidity: value_at(&humidities, i),
            windspeed: value_at(&windspeeds, i),
            winddirection: value_at(&winddirections, i),
            freezing_level: value_at(&freezing_levels, i),
            weather_code: weathercodes.get(i).copied().flatten(),
            snowfall: value_at(&snowfalls, i),
            precipitation: value_at(&precipitations, i),
            temp_base: bands.base,
            temp_mid: bands.mid,
            temp_summit: bands.summit,
        });
    }

    let daily = raw.get("daily");
    let daily_dates = string_series(daily, "time");
    let sunrises = string_series(daily, "sunrise");
    let sunsets = string_series(daily, "sunset");
    let temps_max = f64_series(daily, "temperature_2m_max");
    let temps_min = f64_series(daily, "temperature_2m_min");
    let precip_sums = f64_series(daily, "precipitation_sum");
    let snowfall_sums = f64_series(daily, "snowfall_sum");
    let windspeed_maxes = f64_series(daily, "windspeed_10m_max");

    let today = daily_dates.first().map(|date| TodayWeather {
        date: Some(date.clone()),
        sunrise: sunrises.first().cloned(),
        sunset: sunsets.first().cloned(),
        temp_max: value_at(&temps_max, 0),
        temp_min: value_at(&temps_min, 0),
        precipitation: value_at(&precip_sums, 0),
        snowfall: value_at(&snowfall_sums, 0),
        windspeed_max: value_at(&windspeed_maxes, 0),
    });

    let daily_forecast = daily_dates
        .iter()
        .take(DAILY_FORECAST_HORIZON)
        .enumerate()
        .map(|(i, date)| DailyPoint {
            date: date.clone(),
            temp_max: value_at(&temps_max, i),
            temp_min: value_at(&temps_min, i),
            snowfall: value_at(&snowfall_sums, i),
            precipitation: value_at(&precip_sums, i),
            weather_code: daily_weather_code(date, &times, &weathercodes),
        })
        .collect();

    WeatherBlock {
        current,
        freezing_level_current: value_at(&freezing_levels, 0),
        freezing_level_24h_avg,
        temp_base: current_bands.base,
        temp_mid: current_bands.mid,
        temp_summit: current_bands.summit,
        today,
        hourly_forecast,
        daily_forecast,
        avg_windspeed_24h,
        snowfall_24h,
        precipitation_24h,
        source: "Open-Meteo API".to_string(),
    }
}

/// Hourly field names for the five pressure levels, ordered low→high altitude.
const PRESSURE_LEVEL_FIELDS: [&str; 5] = [
    "temperature_1000hPa",
    "temperature_925hPa",
    "temperature_850hPa",
    "temperature_700hPa",
    "temperature_500hPa",
];

/// Banded temperatures at the three resort elevations.
struct BandedTemps {
    base: Option<f64>,
    mid: Option<f64>,
    summit: Option<f64>,
}

/// Elevation targets for banded-temperature interpolation.
struct BandTargets {
    base: Option<f64>,
    mid: Option<f64>,
    summit: Option<f64>,
}

impl BandTargets {
    fn from_descriptor(resort: &ResortDescriptor) -> Self {
        Self {
            base: resort.elevation_min.map(|e| e as f64),
            mid: resort.elevation_mid(),
            summit: resort.elevation_max.map(|e| e as f64),
        }
    }

    fn interpolate(&self, pressure_temps: &[Option<f64>; 5]) -> BandedTemps {
        let at = |target: Option<f64>| {
            target.and_then(|t| interpolate_temperature_at_elevation(t, pressure_temps))
        };
        BandedTemps {
            base: at(self.base),
            mid: at(self.mid),
            summit: at(self.summit),
        }
    }
}

fn f64_series(block: Option<&Value>, field: &str) -> Vec<Option<f64>> {
    block
        .and_then(|b| b.get(field))
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().map(|v| v.as_f64()).collect())
        .unwrap_or_default()
}

fn i64_series(block: Option<&Value>, field: &str) -> Vec<Option<i64>> {
    block
        .and_then(|b| b.get(field))
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().map(|v| v.as_i64()).collect())
        .unwrap_or_default()
}

fn string_series(block: Option<&Value>, field: &str) -> Vec<String> {
    block
        .and_then(|b| b.get(field))
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default()
}

fn value_at(series: &[Option<f64>], i: usize) -> Option<f64> {
    series.get(i).copied().flatten()
}

/// Mean over the first 24 samples, or None if fewer than 24 are present.
fn window_mean(series: &[Option<f64>]) -> Option<f64> {
    let window: Vec<f64> = series
        .iter()
        .take(AGGREGATE_WINDOW_HOURS)
        .filter_map(|v| *v)
        .collect();
    if window.len() < AGGREGATE_WINDOW_HOURS {
        return None;
    }
    Some(round1(window.iter().sum::<f64>() / window.len() as f64))
}

/// Sum over the first 24 samples, or None if fewer than 24 are present.
fn window_sum(series: &[Option<f64>]) -> Option<f64> {
    let window: Vec<f64> = series
        .iter()
        .take(AGGREGATE_WINDOW_HOURS)
        .filter_map(|v| *v)
        .collect();
    if window.len() < AGGREGATE_WINDOW_HOURS {
        return None;
    }
    Some(round1(window.iter().sum::<f64>()))
}

/// WMO code for a daily point: the hourly sample at 12:00 local of that
/// date, falling back to the first hourly sample of the date.
fn daily_weather_code(date: &str, times: &[String], codes: &[Option<i64>]) -> Option<i64> {
    let noon = format!("{date}T12:00");
    if let Some(idx) = times.iter().position(|t| *t == noon) {
        if let Some(code) = codes.get(idx).copied().flatten() {
            return Some(code);
        }
    }
    times
        .iter()
        .position(|t| t.starts_with(date))
        .and_then(|idx| codes.get(idx).copied().flatten())
}
