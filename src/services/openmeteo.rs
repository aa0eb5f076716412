//! Open-Meteo forecast adapter.
//!
//! Two calls per resort: 4 days of hourly metrics (including the five
//! pressure-level temperatures used for elevation banding) and 8 days of
//! daily metrics. The daily response is merged into the hourly one; a failed
//! daily call degrades to hourly-only rather than failing the resort.
//!
//! With a commercial API key requests go to the customer endpoint; the free
//! endpoint gets a 1–2 s politeness delay per call.

use rand::Rng;
use serde_json::Value;

use crate::config::ResortDescriptor;
use crate::errors::CollectError;
use crate::services::fetcher::{FetchOptions, HttpFetcher};

const API_BASE_URL_FREE: &str = "https://api.open-meteo.com/v1/forecast";
const API_BASE_URL_PAID: &str = "https://customer-api.open-meteo.com/v1/forecast";

/// Hourly metrics requested, including pressure-level temperatures.
const HOURLY_FIELDS: &str = "temperature_2m,apparent_temperature,relativehumidity_2m,\
windspeed_10m,winddirection_10m,freezinglevel_height,weathercode,snowfall,precipitation,\
temperature_1000hPa,temperature_925hPa,temperature_850hPa,temperature_700hPa,temperature_500hPa";

/// Daily metrics requested.
const DAILY_FIELDS: &str =
    "sunrise,sunset,temperature_2m_max,temperature_2m_min,precipitation_sum,snowfall_sum,windspeed_10m_max";

/// Days of hourly coverage (96 hours).
const HOURLY_FORECAST_DAYS: u8 = 4;
/// Days of daily coverage.
const DAILY_FORECAST_DAYS: u8 = 8;

/// Client for the Open-Meteo forecast API.
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    fetcher: HttpFetcher,
    api_key: Option<String>,
    base_url: String,
}

impl OpenMeteoClient {
    pub fn new(fetcher: HttpFetcher, api_key: Option<String>) -> Self {
        let base_url = if api_key.is_some() {
            API_BASE_URL_PAID
        } else {
            API_BASE_URL_FREE
        };
        Self {
            fetcher,
            api_key,
            base_url: base_url.to_string(),
        }
    }

    /// Point the client at a different endpoint (tests).
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    fn forecast_url(&self, resort: &ResortDescriptor, block: &str, fields: &str, days: u8) -> String {
        let mut url = format!(
            "{}?latitude={}&longitude={}&{block}={fields}\
             &temperature_unit=celsius&windspeed_unit=kmh&precipitation_unit=mm\
             &timezone=auto&forecast_days={days}",
            self.base_url, resort.lat, resort.lon,
        );
        if let Some(key) = &self.api_key {
            url.push_str("&apikey=");
            url.push_str(key);
        }
        url
    }

    /// Fetch the merged hourly + daily forecast payload for a resort.
    pub async fn collect(
        &self,
        resort: &ResortDescriptor,
        options: &FetchOptions,
    ) -> Result<Value, CollectError> {
        if self.api_key.is_none() {
            // Free tier: spread calls out to stay inside the polite rate.
            let delay = rand::thread_rng().gen_range(1.0..=2.0);
            tokio::time::sleep(std::time::Duration::from_secs_f64(delay)).await;
        }

        let hourly_url = self.forecast_url(resort, "hourly", HOURLY_FIELDS, HOURLY_FORECAST_DAYS);
        tracing::debug!(resort = %resort.name, "Collecting Open-Meteo hourly forecast");
        let mut payload = self.fetcher.get_with(&hourly_url, options).await?.json()?;

        let daily_url = self.forecast_url(resort, "daily", DAILY_FIELDS, DAILY_FORECAST_DAYS);
        match self.fetcher.get_with(&daily_url, options).await {
            Ok(response) => match response.json() {
                Ok(daily_payload) => {
                    if let Some(daily) = daily_payload.get("daily") {
                        payload["daily"] = daily.clone();
                    }
                    if let Some(units) = daily_payload.get("daily_units") {
                        payload["daily_units"] = units.clone();
                    }
                }
                Err(e) => {
                    tracing::warn!(resort = %resort.name, "Daily forecast decode failed: {e}");
                }
            },
            Err(e) => {
                // Hourly data alone is still worth keeping.
                tracing::warn!(resort = %resort.name, "Daily forecast fetch failed: {e}");
            }
        }

        Ok(payload)
    }
}

// ---------------------------------------------------------------------------
// Elevation banding
// ---------------------------------------------------------------------------

/// Approximate altitudes of the five requested pressure levels (meters),
/// ordered 1000 → 500 hPa.
const LEVEL_ALTITUDES_M: [f64; 5] = [110.0, 750.0, 1500.0, 3000.0, 5500.0];

/// Plausibility bounds for an interpolated temperature (°C).
const PLAUSIBLE_TEMP_RANGE: (f64, f64) = (-50.0, 50.0);

/// Temperature at a target elevation by piecewise linear interpolation over
/// the pressure-level temperatures.
///
/// `pressure_temps` is ordered 1000/925/850/700/500 hPa. Levels without data
/// are skipped; at least two are required. Targets outside the table's range
/// extrapolate linearly from the nearest two levels. Results outside the
/// plausible range are rejected to None.
pub fn interpolate_temperature_at_elevation(
    target_elevation: f64,
    pressure_temps: &[Option<f64>; 5],
) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = LEVEL_ALTITUDES_M
        .iter()
        .zip(pressure_temps.iter())
        .filter_map(|(alt, temp)| temp.map(|t| (*alt, t)))
        .collect();

    if pairs.len() < 2 {
        return None;
    }

    let result = if target_elevation <= pairs[0].0 {
        extrapolate(pairs[0], pairs[1], target_elevation)
    } else if target_elevation >= pairs[pairs.len() - 1].0 {
        extrapolate(pairs[pairs.len() - 2], pairs[pairs.len() - 1], target_elevation)
    } else {
        let mut value = None;
        for window in pairs.windows(2) {
            let (low, high) = (window[0], window[1]);
            if low.0 <= target_elevation && target_elevation <= high.0 {
                let ratio = (target_elevation - low.0) / (high.0 - low.0);
                value = Some(low.1 + ratio * (high.1 - low.1));
                break;
            }
        }
        value?
    };

    (PLAUSIBLE_TEMP_RANGE.0..=PLAUSIBLE_TEMP_RANGE.1)
        .contains(&result)
        .then_some(result)
}

fn extrapolate(a: (f64, f64), b: (f64, f64), target: f64) -> f64 {
    a.1 + (b.1 - a.1) / (b.0 - a.0) * (target - a.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn descriptor() -> ResortDescriptor {
        serde_json::from_value(serde_json::json!({
            "id": 1,
            "name": "Powder Peak",
            "slug": "powder-peak",
            "lat": 50.1,
            "lon": -122.9,
            "elevation_min": 2424,
            "elevation_max": 3369,
            "data_source": "mtnpowder",
            "enabled": true
        }))
        .unwrap()
    }

    fn test_options() -> FetchOptions {
        FetchOptions {
            timeout: Duration::from_secs(5),
            max_retries: 1,
            jitter: false,
        }
    }

    // --- interpolation ---

    #[test]
    fn test_interpolation_between_levels() {
        // 850hPa(1500m)=8.0, 700hPa(3000m)=0.0, 500hPa(5500m)=-15.0
        let temps = [None, None, Some(8.0), Some(0.0), Some(-15.0)];
        let base = interpolate_temperature_at_elevation(2424.0, &temps).unwrap();
        assert!((base - 3.07).abs() < 0.05, "base={base}");
        let summit = interpolate_temperature_at_elevation(3369.0, &temps).unwrap();
        assert!((summit + 2.22).abs() < 0.05, "summit={summit}");
    }

    #[test]
    fn test_interpolation_exact_level() {
        let temps = [Some(20.0), Some(18.0), Some(15.0), Some(8.0), Some(-5.0)];
        assert_eq!(
            interpolate_temperature_at_elevation(1500.0, &temps),
            Some(15.0)
        );
    }

    #[test]
    fn test_extrapolation_below_lowest_level() {
        // Gradient between 110m(20.0) and 750m(18.0) continues downward
        let temps = [Some(20.0), Some(18.0), None, None, None];
        let sea_level = interpolate_temperature_at_elevation(0.0, &temps).unwrap();
        assert!((sea_level - 20.34).abs() < 0.01, "got {sea_level}");
    }

    #[test]
    fn test_extrapolation_above_highest_level() {
        let temps = [None, None, None, Some(0.0), Some(-15.0)];
        let high = interpolate_temperature_at_elevation(6000.0, &temps).unwrap();
        assert!((high + 18.0).abs() < 0.01, "got {high}");
    }

    #[test]
    fn test_requires_two_levels() {
        let temps = [None, None, Some(8.0), None, None];
        assert_eq!(interpolate_temperature_at_elevation(2000.0, &temps), None);
        let temps = [None; 5];
        assert_eq!(interpolate_temperature_at_elevation(2000.0, &temps), None);
    }

    #[test]
    fn test_implausible_result_rejected() {
        // Steep inverted gradient drives extrapolation past -50°C
        let temps = [None, None, None, Some(-30.0), Some(-49.0)];
        assert_eq!(
            interpolate_temperature_at_elevation(9000.0, &temps),
            None,
            "extrapolation far past the table must be rejected"
        );
    }

    // --- collect ---

    fn hourly_body() -> serde_json::Value {
        serde_json::json!({
            "hourly": { "time": ["2026-01-15T00:00"], "temperature_2m": [-4.0] }
        })
    }

    #[tokio::test]
    async fn test_collect_merges_daily_into_hourly() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("forecast_days", "4"))
            .respond_with(ResponseTemplate::new(200).set_body_json(hourly_body()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("forecast_days", "8"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "daily": { "time": ["2026-01-15"], "sunrise": ["2026-01-15T07:58"] },
                "daily_units": { "sunrise": "iso8601" }
            })))
            .mount(&server)
            .await;

        // An api key skips the free-tier delay; the endpoint is the mock.
        let client = OpenMeteoClient::new(HttpFetcher::new(), Some("k".to_string()))
            .with_base_url(&format!("{}/v1/forecast", server.uri()));
        let payload = client.collect(&descriptor(), &test_options()).await.unwrap();

        assert_eq!(payload["hourly"]["temperature_2m"][0], -4.0);
        assert_eq!(payload["daily"]["time"][0], "2026-01-15");
        assert_eq!(payload["daily_units"]["sunrise"], "iso8601");
    }

    #[tokio::test]
    async fn test_collect_daily_failure_returns_hourly_only() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("forecast_days", "4"))
            .respond_with(ResponseTemplate::new(200).set_body_json(hourly_body()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("forecast_days", "8"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = OpenMeteoClient::new(HttpFetcher::new(), Some("k".to_string()))
            .with_base_url(&format!("{}/v1/forecast", server.uri()));
        let payload = client.collect(&descriptor(), &test_options()).await.unwrap();

        assert_eq!(payload["hourly"]["temperature_2m"][0], -4.0);
        assert!(payload.get("daily").is_none());
    }

    #[test]
    fn test_forecast_url_selects_paid_endpoint() {
        let paid = OpenMeteoClient::new(HttpFetcher::new(), Some("secret".to_string()));
        let url = paid.forecast_url(&descriptor(), "hourly", HOURLY_FIELDS, 4);
        assert!(url.starts_with(API_BASE_URL_PAID));
        assert!(url.contains("apikey=secret"));

        let free = OpenMeteoClient::new(HttpFetcher::new(), None);
        let url = free.forecast_url(&descriptor(), "daily", DAILY_FIELDS, 8);
        assert!(url.starts_with(API_BASE_URL_FREE));
        assert!(!url.contains("apikey"));
        assert!(url.contains("timezone=auto"));
    }
}
