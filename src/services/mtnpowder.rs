//! MtnPowder feed adapter.
//!
//! Straightforward JSON feed keyed by the resort's `source_id`.

use serde_json::Value;

use crate::config::ResortDescriptor;
use crate::errors::CollectError;
use crate::services::fetcher::{FetchOptions, HttpFetcher};

const FEED_BASE_URL: &str = "https://www.mtnpowder.com/feed";

/// Feed URL for a resort.
pub fn feed_url(resort: &ResortDescriptor) -> String {
    format!(
        "{}?resortId={}",
        FEED_BASE_URL,
        resort.source_id.as_deref().unwrap_or("")
    )
}

/// Fetch and decode the raw MtnPowder payload for a resort.
pub async fn collect(
    fetcher: &HttpFetcher,
    resort: &ResortDescriptor,
    options: &FetchOptions,
) -> Result<Value, CollectError> {
    let url = feed_url(resort);
    if resort.source_id.is_none() {
        return Err(CollectError::NoData { url });
    }

    tracing::debug!(resort = %resort.name, %url, "Collecting MtnPowder feed");
    let response = fetcher.get_with(&url, options).await?;
    response.json()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn descriptor(source_id: Option<&str>) -> ResortDescriptor {
        serde_json::from_value(serde_json::json!({
            "id": 1,
            "name": "Powder Peak",
            "slug": "powder-peak",
            "lat": 50.1,
            "lon": -122.9,
            "data_source": "mtnpowder",
            "source_id": source_id,
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

    #[test]
    fn test_feed_url_carries_source_id() {
        assert_eq!(
            feed_url(&descriptor(Some("42"))),
            "https://www.mtnpowder.com/feed?resortId=42"
        );
    }

    #[tokio::test]
    async fn test_collect_missing_source_id_is_no_data() {
        let fetcher = HttpFetcher::new();
        let err = collect(&fetcher, &descriptor(None), &test_options())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoData);
    }

    #[tokio::test]
    async fn test_collect_decode_failure_is_json_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .and(query_param("resortId", "42"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        // Point the adapter at the mock by fetching the mock URL directly;
        // the decode path is what's under test.
        let fetcher = HttpFetcher::new();
        let response = fetcher
            .get_with(
                &format!("{}/feed?resortId=42", server.uri()),
                &test_options(),
            )
            .await
            .unwrap();
        let err = response.json().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::JsonError);
    }
}
