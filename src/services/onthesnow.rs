//! OnTheSnow page adapter.
//!
//! OnTheSnow has no public feed; the resort page embeds its full data model
//! as a JSON island in `<script id="__NEXT_DATA__">…</script>`. This adapter
//! fetches the page and parses that island.
//!
//! Used two ways: as the primary source for resorts routed to it, and as the
//! supplementary source (webcams + lift/trail-count backfill) for everyone
//! else with an `onthesnow_url`.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::errors::CollectError;
use crate::services::fetcher::{FetchOptions, HttpFetcher};

/// Matches the embedded JSON island. The page is a single line of minified
/// HTML, so the body group is non-greedy with dot-matches-newline.
fn next_data_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)<script id="__NEXT_DATA__"[^>]*>(.*?)</script>"#)
            .expect("static regex must compile")
    })
}

/// Fetch an OnTheSnow page and decode its `__NEXT_DATA__` island.
pub async fn collect(
    fetcher: &HttpFetcher,
    url: &str,
    options: &FetchOptions,
) -> Result<Value, CollectError> {
    tracing::debug!(%url, "Collecting OnTheSnow page");
    let response = fetcher.get_with(url, options).await?;
    extract_next_data(&response.body, url)
}

/// Locate and parse the JSON island in a page body.
pub fn extract_next_data(html: &str, url: &str) -> Result<Value, CollectError> {
    let captures = next_data_regex()
        .captures(html)
        .ok_or_else(|| CollectError::NoData {
            url: url.to_string(),
        })?;

    serde_json::from_str(&captures[1]).map_err(|e| CollectError::Json {
        url: url.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_extract_next_data() {
        let html = r#"<html><body>
            <script id="__NEXT_DATA__" type="application/json">{"props":{"pageProps":{"fullResort":{"title":"Powder Peak"}}}}</script>
        </body></html>"#;
        let value = extract_next_data(html, "https://example.test/resort").unwrap();
        assert_eq!(
            value["props"]["pageProps"]["fullResort"]["title"],
            "Powder Peak"
        );
    }

    #[test]
    fn test_missing_island_is_no_data() {
        let err = extract_next_data("<html><body>nothing here</body></html>", "u").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoData);
    }

    #[test]
    fn test_malformed_island_is_json_error() {
        let html = r#"<script id="__NEXT_DATA__">{"props": oops}</script>"#;
        let err = extract_next_data(html, "u").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::JsonError);
    }

    #[test]
    fn test_island_spanning_lines() {
        let html = "<script id=\"__NEXT_DATA__\" type=\"application/json\">\n{\"props\": {}}\n</script>";
        let value = extract_next_data(html, "u").unwrap();
        assert!(value["props"].is_object());
    }
}
