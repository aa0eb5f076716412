//! Google Places contact-info adapter.
//!
//! Used only by the contact-enrichment task: text-search for the resort by
//! name near its coordinates, then a details lookup for address, phone,
//! website and opening hours. Output is a flat contact record the
//! persistence layer merges into the resort row.

use serde_json::Value;

use crate::config::ResortDescriptor;
use crate::errors::CollectError;
use crate::services::fetcher::{FetchOptions, HttpFetcher};

const API_BASE_URL: &str = "https://maps.googleapis.com/maps/api/place";

/// Search radius around the resort's coordinates (meters).
const SEARCH_RADIUS_M: u32 = 5000;

/// Flat contact record produced by a places lookup.
#[derive(Debug, Clone, Default)]
pub struct ContactInfo {
    pub address: Option<String>,
    pub city: Option<String>,
    pub zip_code: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    /// Human-readable weekday lines.
    pub opening_hours_weekday: Option<Vec<String>>,
    /// Structured open/close periods, kept verbatim.
    pub opening_hours_periods: Option<Value>,
    pub open_now: Option<bool>,
    /// Provider coordinates, sometimes more accurate than the registry's.
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// Client for the Places text-search + details flow.
#[derive(Debug, Clone)]
pub struct PlacesClient {
    fetcher: HttpFetcher,
    api_key: String,
    base_url: String,
}

impl PlacesClient {
    pub fn new(fetcher: HttpFetcher, api_key: String) -> Self {
        Self {
            fetcher,
            api_key,
            base_url: API_BASE_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    fn options() -> FetchOptions {
        FetchOptions {
            timeout: std::time::Duration::from_secs(10),
            max_retries: 2,
            ..FetchOptions::default()
        }
    }

    /// Look up contact info for a resort. `NO_DATA` when the place cannot
    /// be found or the details response is unusable.
    pub async fn collect(&self, resort: &ResortDescriptor) -> Result<ContactInfo, CollectError> {
        let place_id = self.find_place(resort).await?;
        tracing::debug!(resort = %resort.name, %place_id, "Found place id");
        self.place_details(&place_id).await
    }

    async fn find_place(&self, resort: &ResortDescriptor) -> Result<String, CollectError> {
        let query = format!("{} ski resort", resort.name);
        let url = format!(
            "{}/textsearch/json?query={}&location={},{}&radius={}&key={}",
            self.base_url,
            urlencode(&query),
            resort.lat,
            resort.lon,
            SEARCH_RADIUS_M,
            self.api_key,
        );

        let payload = self.fetcher.get_with(&url, &Self::options()).await?.json()?;
        let status = payload.get("status").and_then(|s| s.as_str()).unwrap_or("");
        if status != "OK" {
            return Err(CollectError::NoData { url });
        }
        payload
            .get("results")
            .and_then(|r| r.as_array())
            .and_then(|r| r.first())
            .and_then(|r| r.get("place_id"))
            .and_then(|p| p.as_str())
            .map(|p| p.to_string())
            .ok_or(CollectError::NoData { url })
    }

    async fn place_details(&self, place_id: &str) -> Result<ContactInfo, CollectError> {
        let fields = "name,formatted_address,address_components,formatted_phone_number,\
                      international_phone_number,website,geometry,opening_hours";
        let url = format!(
            "{}/details/json?place_id={}&fields={}&key={}",
            self.base_url,
            urlencode(place_id),
            urlencode(fields),
            self.api_key,
        );

        let payload = self.fetcher.get_with(&url, &Self::options()).await?.json()?;
        let status = payload.get("status").and_then(|s| s.as_str()).unwrap_or("");
        let Some(result) = payload.get("result").filter(|_| status == "OK") else {
            return Err(CollectError::NoData { url });
        };

        Ok(parse_details(result))
    }
}

/// Map a Places details result to a flat contact record.
fn parse_details(result: &Value) -> ContactInfo {
    let mut street_address: Option<String> = None;
    let mut city = None;
    let mut zip_code = None;

    if let Some(components) = result.get("address_components").and_then(|c| c.as_array()) {
        for component in components {
            let types: Vec<&str> = component
                .get("types")
                .and_then(|t| t.as_array())
                .map(|t| t.iter().filter_map(|v| v.as_str()).collect())
                .unwrap_or_default();
            let long_name = component
                .get("long_name")
                .and_then(|v| v.as_str())
                .unwrap_or("");

            if types.contains(&"street_number") || types.contains(&"route") {
                street_address = Some(match street_address {
                    Some(existing) => format!("{existing} {long_name}"),
                    None => long_name.to_string(),
                });
            } else if types.contains(&"locality") {
                city = Some(long_name.to_string());
            } else if types.contains(&"postal_code") {
                zip_code = Some(long_name.to_string());
            }
        }
    }

    let string_at = |key: &str| -> Option<String> {
        result.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
    };

    let opening_hours = result.get("opening_hours");
    let location = result.get("geometry").and_then(|g| g.get("location"));

    ContactInfo {
        address: street_address,
        city,
        zip_code,
        phone: string_at("formatted_phone_number")
            .or_else(|| string_at("international_phone_number")),
        website: string_at("website"),
        opening_hours_weekday: opening_hours
            .and_then(|h| h.get("weekday_text"))
            .and_then(|w| w.as_array())
            .map(|w| {
                w.iter()
                    .filter_map(|v| v.as_str())
                    .map(|s| s.to_string())
                    .collect()
            }),
        opening_hours_periods: opening_hours.and_then(|h| h.get("periods")).cloned(),
        open_now: opening_hours.and_then(|h| h.get("open_now")).and_then(|v| v.as_bool()),
        lat: location.and_then(|l| l.get("lat")).and_then(|v| v.as_f64()),
        lon: location.and_then(|l| l.get("lng")).and_then(|v| v.as_f64()),
    }
}

/// Minimal percent-encoding for query values.
fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b',' => {
                out.push(byte as char)
            }
            b' ' => out.push_str("%20"),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn descriptor() -> ResortDescriptor {
        serde_json::from_value(serde_json::json!({
            "id": 1,
            "name": "Powder Peak",
            "slug": "powder-peak",
            "lat": 50.1,
            "lon": -122.9,
            "data_source": "mtnpowder",
            "enabled": true
        }))
        .unwrap()
    }

    #[test]
    fn test_urlencode() {
        assert_eq!(urlencode("Powder Peak ski resort"), "Powder%20Peak%20ski%20resort");
        assert_eq!(urlencode("a&b=c"), "a%26b%3Dc");
    }

    #[test]
    fn test_parse_details_address_components() {
        let result = serde_json::json!({
            "formatted_phone_number": "(604) 555-0100",
            "website": "https://powderpeak.test",
            "address_components": [
                { "long_name": "4545", "types": ["street_number"] },
                { "long_name": "Blackcomb Way", "types": ["route"] },
                { "long_name": "Whistler", "types": ["locality", "political"] },
                { "long_name": "V8E 0X9", "types": ["postal_code"] }
            ],
            "opening_hours": {
                "open_now": true,
                "weekday_text": ["Monday: 8:30 AM – 3:00 PM"],
                "periods": [{ "open": { "day": 1, "time": "0830" } }]
            },
            "geometry": { "location": { "lat": 50.11, "lng": -122.95 } }
        });

        let contact = parse_details(&result);
        assert_eq!(contact.address.as_deref(), Some("4545 Blackcomb Way"));
        assert_eq!(contact.city.as_deref(), Some("Whistler"));
        assert_eq!(contact.zip_code.as_deref(), Some("V8E 0X9"));
        assert_eq!(contact.phone.as_deref(), Some("(604) 555-0100"));
        assert_eq!(contact.open_now, Some(true));
        assert_eq!(contact.lat, Some(50.11));
        assert_eq!(
            contact.opening_hours_weekday.as_ref().unwrap()[0],
            "Monday: 8:30 AM – 3:00 PM"
        );
    }

    #[tokio::test]
    async fn test_collect_search_then_details() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/textsearch/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "OK",
                "results": [{ "place_id": "pid-123" }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/details/json"))
            .and(query_param("place_id", "pid-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "OK",
                "result": { "website": "https://powderpeak.test" }
            })))
            .mount(&server)
            .await;

        let client =
            PlacesClient::new(HttpFetcher::new(), "key".to_string()).with_base_url(&server.uri());
        let contact = client.collect(&descriptor()).await.unwrap();
        assert_eq!(contact.website.as_deref(), Some("https://powderpeak.test"));
    }

    #[tokio::test]
    async fn test_collect_zero_results_is_no_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/textsearch/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ZERO_RESULTS",
                "results": []
            })))
            .mount(&server)
            .await;

        let client =
            PlacesClient::new(HttpFetcher::new(), "key".to_string()).with_base_url(&server.uri());
        let err = client.collect(&descriptor()).await.unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::NoData);
    }
}
