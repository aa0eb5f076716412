//! Data-quality monitor.
//!
//! After a collection run, every persisted resort record is scored against a
//! field-by-field rubric in three groups: critical identity fields, snow
//! report fields, and current-weather fields. Each field yields
//! success/warning/error; the per-resort report carries an overall status
//! and a completeness score.

use serde::Serialize;
use sqlx::PgPool;
use utoipa::ToSchema;

use crate::db::models::{Resort, ResortCondition, ResortWeather};
use crate::db::queries;
use crate::services::normalizer::ResortStatus;

/// Plausible temperature range (°C) for temperature-class fields.
const TEMP_RANGE: (f64, f64) = (-40.0, 40.0);

/// Warning ratio at which a resort's overall status degrades.
const WARNING_RATIO_THRESHOLD: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Success,
    Warning,
    Error,
}

/// Result of checking a single field.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FieldCheck {
    pub field: String,
    pub status: CheckStatus,
    pub value: Option<String>,
    pub message: String,
}

impl FieldCheck {
    fn new(field: &str, status: CheckStatus, value: Option<String>, message: &str) -> Self {
        Self {
            field: field.to_string(),
            status,
            value,
            message: message.to_string(),
        }
    }
}

/// Per-resort quality report.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ResortReport {
    pub resort_id: i32,
    pub resort_name: String,
    pub overall_status: CheckStatus,
    pub data_source: String,
    pub last_update: Option<String>,
    pub score: f64,
    pub checks: Vec<FieldCheck>,
}

/// Aggregated counts across one run's reports.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MonitorSummary {
    pub total: usize,
    pub success: usize,
    pub warning: usize,
    pub error: usize,
    pub avg_score: f64,
}

/// Full quality report for a run.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorReport {
    pub summary: MonitorSummary,
    pub resorts: Vec<ResortReport>,
}

/// How a numeric field is judged.
enum NumericClass {
    /// 0 ⇒ warning (success when the resort is not open); negative ⇒ error.
    Gauge { excused_when_not_open: bool },
    /// Valid inside [-40, 40]; no zero-warning.
    Temperature,
    /// Like Temperature, but 0 additionally warns (sentinel-coerced values),
    /// excused when the resort is not open.
    ConditionTemperature,
}

/// Check one numeric field value. Numeric fields are never critical, so a
/// missing value is a warning.
fn check_numeric(
    field: &str,
    value: Option<f64>,
    class: NumericClass,
    resort_open: bool,
) -> FieldCheck {
    let Some(value) = value else {
        return FieldCheck::new(field, CheckStatus::Warning, None, "no data");
    };
    let rendered = Some(format!("{value}"));

    match class {
        NumericClass::Gauge {
            excused_when_not_open,
        } => {
            if value < 0.0 {
                FieldCheck::new(field, CheckStatus::Error, rendered, "negative value")
            } else if value == 0.0 {
                if excused_when_not_open && !resort_open {
                    FieldCheck::new(field, CheckStatus::Success, rendered, "resort not open")
                } else {
                    FieldCheck::new(field, CheckStatus::Warning, rendered, "value is 0")
                }
            } else {
                FieldCheck::new(field, CheckStatus::Success, rendered, "ok")
            }
        }
        NumericClass::Temperature => {
            if (TEMP_RANGE.0..=TEMP_RANGE.1).contains(&value) {
                FieldCheck::new(field, CheckStatus::Success, rendered, "ok")
            } else {
                FieldCheck::new(field, CheckStatus::Error, rendered, "out of plausible range")
            }
        }
        NumericClass::ConditionTemperature => {
            if !(TEMP_RANGE.0..=TEMP_RANGE.1).contains(&value) {
                FieldCheck::new(field, CheckStatus::Error, rendered, "out of plausible range")
            } else if value == 0.0 {
                if resort_open {
                    FieldCheck::new(field, CheckStatus::Warning, rendered, "value is 0")
                } else {
                    FieldCheck::new(field, CheckStatus::Success, rendered, "resort not open")
                }
            } else {
                FieldCheck::new(field, CheckStatus::Success, rendered, "ok")
            }
        }
    }
}

fn check_string(field: &str, value: Option<&str>) -> FieldCheck {
    match value {
        Some(v) if !v.trim().is_empty() => {
            FieldCheck::new(field, CheckStatus::Success, Some(v.to_string()), "ok")
        }
        Some(_) => FieldCheck::new(field, CheckStatus::Error, None, "empty"),
        None => FieldCheck::new(field, CheckStatus::Error, None, "missing"),
    }
}

/// Score one resort's latest persisted state.
pub fn check_resort(
    resort: &Resort,
    condition: Option<&ResortCondition>,
    weather: Option<&ResortWeather>,
) -> ResortReport {
    let status = condition.and_then(|c| c.status.as_deref());
    // Counts of zero are expected while closed or only partially open.
    let resort_open = matches!(
        status.and_then(ResortStatus::from_str),
        Some(ResortStatus::Open)
    );

    let mut checks = Vec::new();

    // Critical fields
    checks.push(check_string("name", Some(resort.name.as_str())));
    checks.push(check_string("status", status));
    checks.push(check_string(
        "data_source",
        condition
            .and_then(|c| c.data_source.as_deref())
            .or(resort.data_source.as_deref()),
    ));

    // Snow report fields
    let gauge = |excused: bool| NumericClass::Gauge {
        excused_when_not_open: excused,
    };
    checks.push(check_numeric(
        "new_snow",
        condition.and_then(|c| c.new_snow),
        gauge(true),
        resort_open,
    ));
    checks.push(check_numeric(
        "base_depth",
        condition.and_then(|c| c.base_depth),
        gauge(true),
        resort_open,
    ));
    checks.push(check_numeric(
        "lifts_open",
        condition.and_then(|c| c.lifts_open).map(f64::from),
        gauge(true),
        resort_open,
    ));
    // Totals are never excused: a resort knows its registered lift and
    // trail counts even off-season.
    checks.push(check_numeric(
        "lifts_total",
        condition.and_then(|c| c.lifts_total).map(f64::from),
        gauge(false),
        resort_open,
    ));
    checks.push(check_numeric(
        "trails_open",
        condition.and_then(|c| c.trails_open).map(f64::from),
        gauge(true),
        resort_open,
    ));
    checks.push(check_numeric(
        "trails_total",
        condition.and_then(|c| c.trails_total).map(f64::from),
        gauge(false),
        resort_open,
    ));
    checks.push(check_numeric(
        "temperature",
        condition.and_then(|c| c.temperature),
        NumericClass::ConditionTemperature,
        resort_open,
    ));

    // Weather fields
    checks.push(check_numeric(
        "weather.current.temperature",
        weather.and_then(|w| w.current_temp),
        NumericClass::Temperature,
        resort_open,
    ));
    checks.push(check_numeric(
        "weather.current.humidity",
        weather.and_then(|w| w.current_humidity),
        gauge(false),
        resort_open,
    ));
    checks.push(check_numeric(
        "weather.current.windspeed",
        weather.and_then(|w| w.current_windspeed),
        gauge(false),
        resort_open,
    ));
    checks.push(check_numeric(
        "weather.freezing_level_current",
        weather.and_then(|w| w.freezing_level_current),
        gauge(false),
        resort_open,
    ));
    checks.push(check_numeric(
        "weather.temp_base",
        weather.and_then(|w| w.temp_base),
        NumericClass::Temperature,
        resort_open,
    ));
    checks.push(check_numeric(
        "weather.temp_summit",
        weather.and_then(|w| w.temp_summit),
        NumericClass::Temperature,
        resort_open,
    ));

    let total = checks.len();
    let errors = checks
        .iter()
        .filter(|c| c.status == CheckStatus::Error)
        .count();
    let warnings = checks
        .iter()
        .filter(|c| c.status == CheckStatus::Warning)
        .count();

    let overall_status = if errors > 0 {
        CheckStatus::Error
    } else if warnings as f64 >= total as f64 * WARNING_RATIO_THRESHOLD {
        CheckStatus::Warning
    } else {
        CheckStatus::Success
    };

    let score = ((total - errors - warnings) as f64 / total as f64 * 100.0 * 10.0).round() / 10.0;

    ResortReport {
        resort_id: resort.id,
        resort_name: resort.name.clone(),
        overall_status,
        data_source: condition
            .and_then(|c| c.data_source.clone())
            .or_else(|| resort.data_source.clone())
            .unwrap_or_else(|| "unknown".to_string()),
        last_update: condition.map(|c| c.timestamp.to_rfc3339()),
        score,
        checks,
    }
}

/// Score every enabled resort's latest persisted state.
pub async fn monitor_all(pool: &PgPool) -> Result<MonitorReport, sqlx::Error> {
    let resorts = queries::list_enabled_resorts(pool).await?;
    let mut reports = Vec::with_capacity(resorts.len());

    for resort in &resorts {
        let condition = queries::latest_condition(pool, resort.id).await?;
        let weather = queries::latest_weather(pool, resort.id).await?;
        reports.push(check_resort(resort, condition.as_ref(), weather.as_ref()));
    }

    Ok(MonitorReport {
        summary: summarize(&reports),
        resorts: reports,
    })
}

/// Aggregate report counts and the average score.
pub fn summarize(reports: &[ResortReport]) -> MonitorSummary {
    let total = reports.len();
    let success = reports
        .iter()
        .filter(|r| r.overall_status == CheckStatus::Success)
        .count();
    let warning = reports
        .iter()
        .filter(|r| r.overall_status == CheckStatus::Warning)
        .count();
    let error = reports
        .iter()
        .filter(|r| r.overall_status == CheckStatus::Error)
        .count();
    let avg_score = if total == 0 {
        0.0
    } else {
        let sum: f64 = reports.iter().map(|r| r.score).sum();
        (sum / total as f64 * 10.0).round() / 10.0
    };

    MonitorSummary {
        total,
        success,
        warning,
        error,
        avg_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn resort() -> Resort {
        Resort {
            id: 1,
            name: "Powder Peak".to_string(),
            slug: "powder-peak".to_string(),
            location: Some("BC".to_string()),
            lat: Some(50.1),
            lon: Some(-122.9),
            elevation_min: Some(650),
            elevation_max: Some(2280),
            boundary: None,
            data_source: Some("mtnpowder".to_string()),
            source_url: None,
            source_id: Some("42".to_string()),
            address: None,
            city: None,
            zip_code: None,
            phone: None,
            website: None,
            opening_hours_weekday: None,
            opening_hours_periods: None,
            is_open_now: None,
            enabled: true,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn condition(status: &str) -> ResortCondition {
        ResortCondition {
            id: 1,
            resort_id: 1,
            timestamp: Utc::now(),
            status: Some(status.to_string()),
            new_snow: Some(5.0),
            base_depth: Some(120.0),
            lifts_open: Some(8),
            lifts_total: Some(10),
            trails_open: Some(40),
            trails_total: Some(60),
            temperature: Some(-4.0),
            extra: None,
            source: Some("https://example.test".to_string()),
            data_source: Some("mtnpowder".to_string()),
            created_at: Utc::now(),
        }
    }

    fn weather() -> ResortWeather {
        ResortWeather {
            id: 1,
            resort_id: 1,
            timestamp: Utc::now(),
            current_temp: Some(-6.0),
            apparent_temperature: Some(-11.0),
            current_humidity: Some(78.0),
            current_windspeed: Some(14.0),
            current_winddirection: Some(250.0),
            current_winddirection_compass: Some("W".to_string()),
            freezing_level_current: Some(1500.0),
            freezing_level_24h_avg: Some(1450.0),
            temp_base: Some(-3.0),
            temp_mid: Some(-6.5),
            temp_summit: Some(-10.0),
            today_sunrise: None,
            today_sunset: None,
            today_temp_max: Some(-2.0),
            today_temp_min: Some(-9.0),
            avg_windspeed_24h: Some(12.0),
            snowfall_24h: Some(4.0),
            precipitation_24h: Some(3.5),
            hourly_forecast: None,
            daily_forecast: None,
            source: Some("Open-Meteo API".to_string()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_complete_record_scores_success() {
        let report = check_resort(&resort(), Some(&condition("open")), Some(&weather()));
        assert_eq!(report.overall_status, CheckStatus::Success);
        assert_eq!(report.score, 100.0);
    }

    #[test]
    fn test_missing_condition_is_error() {
        // No condition row ⇒ critical `status` field is missing
        let report = check_resort(&resort(), None, Some(&weather()));
        assert_eq!(report.overall_status, CheckStatus::Error);
        let status_check = report.checks.iter().find(|c| c.field == "status").unwrap();
        assert_eq!(status_check.status, CheckStatus::Error);
    }

    #[test]
    fn test_zero_counts_excused_when_closed() {
        let mut c = condition("closed");
        c.new_snow = Some(0.0);
        c.lifts_open = Some(0);
        c.trails_open = Some(0);
        let report = check_resort(&resort(), Some(&c), Some(&weather()));
        for field in ["new_snow", "lifts_open", "trails_open"] {
            let check = report.checks.iter().find(|ch| ch.field == field).unwrap();
            assert_eq!(check.status, CheckStatus::Success, "{field}");
            assert_eq!(check.message, "resort not open", "{field}");
        }
    }

    #[test]
    fn test_zero_totals_warn_even_when_closed() {
        let mut c = condition("closed");
        c.lifts_total = Some(0);
        c.trails_total = Some(0);
        let report = check_resort(&resort(), Some(&c), Some(&weather()));
        for field in ["lifts_total", "trails_total"] {
            let check = report.checks.iter().find(|ch| ch.field == field).unwrap();
            assert_eq!(check.status, CheckStatus::Warning, "{field}");
        }
    }

    #[test]
    fn test_zero_counts_warn_when_open() {
        let mut c = condition("open");
        c.lifts_open = Some(0);
        let report = check_resort(&resort(), Some(&c), Some(&weather()));
        let check = report.checks.iter().find(|ch| ch.field == "lifts_open").unwrap();
        assert_eq!(check.status, CheckStatus::Warning);
    }

    #[test]
    fn test_sentinel_temperature_zero_warns_when_open() {
        let mut c = condition("open");
        c.temperature = Some(0.0);
        let report = check_resort(&resort(), Some(&c), Some(&weather()));
        let check = report.checks.iter().find(|ch| ch.field == "temperature").unwrap();
        assert_eq!(check.status, CheckStatus::Warning);

        let mut c = condition("partial");
        c.temperature = Some(0.0);
        let report = check_resort(&resort(), Some(&c), Some(&weather()));
        let check = report.checks.iter().find(|ch| ch.field == "temperature").unwrap();
        assert_eq!(check.status, CheckStatus::Success);
        assert_eq!(check.message, "resort not open");
    }

    #[test]
    fn test_negative_temperature_is_fine_but_out_of_range_errors() {
        let mut w = weather();
        w.current_temp = Some(-39.0);
        let report = check_resort(&resort(), Some(&condition("open")), Some(&w));
        let check = report
            .checks
            .iter()
            .find(|ch| ch.field == "weather.current.temperature")
            .unwrap();
        assert_eq!(check.status, CheckStatus::Success);

        let mut w = weather();
        w.temp_summit = Some(-55.0);
        let report = check_resort(&resort(), Some(&condition("open")), Some(&w));
        let check = report
            .checks
            .iter()
            .find(|ch| ch.field == "weather.temp_summit")
            .unwrap();
        assert_eq!(check.status, CheckStatus::Error);
    }

    #[test]
    fn test_negative_gauge_is_error() {
        let mut w = weather();
        w.current_windspeed = Some(-1.0);
        let report = check_resort(&resort(), Some(&condition("open")), Some(&w));
        let check = report
            .checks
            .iter()
            .find(|ch| ch.field == "weather.current.windspeed")
            .unwrap();
        assert_eq!(check.status, CheckStatus::Error);
        assert_eq!(report.overall_status, CheckStatus::Error);
    }

    #[test]
    fn test_missing_weather_degrades_to_warning() {
        // 6 of 16 checks warn (37%) ⇒ warning overall, no errors
        let report = check_resort(&resort(), Some(&condition("open")), None);
        assert_eq!(report.overall_status, CheckStatus::Warning);
        assert!(report.score < 100.0);
    }

    #[test]
    fn test_summarize_counts_and_average() {
        let reports = vec![
            check_resort(&resort(), Some(&condition("open")), Some(&weather())),
            check_resort(&resort(), Some(&condition("open")), None),
            check_resort(&resort(), None, None),
        ];
        let summary = summarize(&reports);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.success, 1);
        assert_eq!(summary.warning, 1);
        assert_eq!(summary.error, 1);
        assert!(summary.avg_score > 0.0 && summary.avg_score < 100.0);
    }
}
