//! Shared numeric helpers for upstream payload coercion and geo math.
//!
//! Upstream feeds use sentinel strings ("--", "") and mixed number/string
//! encodings for the same field. Parsing is centralized here so every
//! adapter maps sentinels the same way according to the field's semantic
//! class:
//!
//! - counts (lifts, trails): sentinel/non-numeric → 0, negatives clamp to 0
//! - depths (cm): sentinel/non-numeric → None
//! - temperatures (°C): sentinel/non-numeric → None (negatives are valid)

use serde_json::Value;

/// Parse a count-class field (lifts, trails). Sentinels and garbage are 0;
/// negative counts clamp to 0.
pub fn coerce_count(value: Option<&Value>) -> i32 {
    match parse_numeric(value) {
        Some(n) if n > 0.0 => n as i32,
        _ => 0,
    }
}

/// Parse a depth-class field (snow depths in cm). Sentinels and garbage are
/// None; negative depths are rejected.
pub fn coerce_depth(value: Option<&Value>) -> Option<f64> {
    parse_numeric(value).filter(|n| *n >= 0.0)
}

/// Parse a temperature-class field (°C). Sentinels and garbage are None;
/// negative values are kept.
pub fn coerce_temperature(value: Option<&Value>) -> Option<f64> {
    parse_numeric(value)
}

/// Extract a finite f64 from a JSON number or numeric string.
/// Sentinel strings ("--", "") and non-numeric text yield None.
fn parse_numeric(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || trimmed == "--" {
                return None;
            }
            trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
        }
        _ => None,
    }
}

/// The eight compass points, clockwise from north.
const COMPASS_POINTS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];

/// Map a wind direction in degrees to an 8-point compass label.
pub fn wind_compass(degrees: f64) -> Option<&'static str> {
    if !degrees.is_finite() {
        return None;
    }
    let normalized = degrees.rem_euclid(360.0);
    let idx = ((normalized / 45.0).round() as usize) % 8;
    Some(COMPASS_POINTS[idx])
}

/// Mean radius of the Earth in kilometres.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two WGS84 points in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Round to 1 decimal place (24h aggregates).
pub fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Round to 2 decimal places (distances, trail lengths).
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce_count_from_number() {
        assert_eq!(coerce_count(Some(&json!(12))), 12);
        assert_eq!(coerce_count(Some(&json!(3.7))), 3);
    }

    #[test]
    fn test_coerce_count_sentinels() {
        assert_eq!(coerce_count(Some(&json!("--"))), 0);
        assert_eq!(coerce_count(Some(&json!(""))), 0);
        assert_eq!(coerce_count(Some(&json!("n/a"))), 0);
        assert_eq!(coerce_count(None), 0);
    }

    #[test]
    fn test_coerce_count_clamps_negative() {
        assert_eq!(coerce_count(Some(&json!(-4))), 0);
        assert_eq!(coerce_count(Some(&json!("-2"))), 0);
    }

    #[test]
    fn test_coerce_depth_sentinels_are_null() {
        assert_eq!(coerce_depth(Some(&json!("--"))), None);
        assert_eq!(coerce_depth(Some(&json!(""))), None);
        assert_eq!(coerce_depth(None), None);
        assert_eq!(coerce_depth(Some(&json!(-5.0))), None);
        assert_eq!(coerce_depth(Some(&json!("42"))), Some(42.0));
    }

    #[test]
    fn test_coerce_temperature_keeps_negatives() {
        assert_eq!(coerce_temperature(Some(&json!("-3"))), Some(-3.0));
        assert_eq!(coerce_temperature(Some(&json!(-12.5))), Some(-12.5));
        assert_eq!(coerce_temperature(Some(&json!("--"))), None);
    }

    #[test]
    fn test_wind_compass_cardinals() {
        assert_eq!(wind_compass(0.0), Some("N"));
        assert_eq!(wind_compass(45.0), Some("NE"));
        assert_eq!(wind_compass(90.0), Some("E"));
        assert_eq!(wind_compass(180.0), Some("S"));
        assert_eq!(wind_compass(270.0), Some("W"));
    }

    #[test]
    fn test_wind_compass_rounds_to_nearest_point() {
        assert_eq!(wind_compass(22.0), Some("N"));
        assert_eq!(wind_compass(23.0), Some("NE"));
        assert_eq!(wind_compass(350.0), Some("N"));
    }

    #[test]
    fn test_wind_compass_modular() {
        // compass(d) == compass(d mod 360) for any degree value
        for d in [-720.0, -45.0, 0.0, 123.0, 359.9, 360.0, 725.0] {
            assert_eq!(wind_compass(d), wind_compass(d.rem_euclid(360.0)), "d={d}");
        }
    }

    #[test]
    fn test_haversine_known_distance() {
        // Whistler village to Blackcomb base: roughly 4.5 km
        let d = haversine_km(50.1163, -122.9574, 50.1150, -122.8944);
        assert!((4.0..5.0).contains(&d), "got {d}");
    }

    #[test]
    fn test_haversine_zero_distance() {
        let d = haversine_km(50.0, -120.0, 50.0, -120.0);
        assert!(d.abs() < 1e-9);
    }

    #[test]
    fn test_round1_half_away_from_zero() {
        assert_eq!(round1(1.25), 1.3);
        assert_eq!(round1(-1.25), -1.3);
        assert_eq!(round1(2.04), 2.0);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(12.345), 12.35);
        assert_eq!(round2(0.004), 0.0);
    }
}
