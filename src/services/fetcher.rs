//! HTTP fetcher with bounded retries, backoff and jitter.
//!
//! Single entry point for every upstream request the adapters make. All
//! failure modes collapse into the typed `CollectError` taxonomy — the
//! fetcher never panics and never raises past retry exhaustion.
//!
//! Retry policy:
//! - retried: transport errors, timeouts, HTTP 408/425/429 and 5xx
//! - not retried: 404 (surfaces immediately) and all other 4xx
//! - attempt N is followed by a `2 × N` second wait
//! - a uniform jitter in [0.5, 1.0] s runs before the first attempt to
//!   spread load when hundreds of fetches start together

use std::time::Duration;

use rand::Rng;
use reqwest::StatusCode;

use crate::errors::CollectError;

/// Per-attempt request timeout (seconds).
const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Total attempts per fetch.
const DEFAULT_MAX_RETRIES: u32 = 3;
/// Backoff base: attempt N waits `BACKOFF_BASE_SECS × N` seconds.
const BACKOFF_BASE_SECS: u64 = 2;

/// Browser-like headers; some providers reject obvious bot agents.
const USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";
const ACCEPT: &str = "application/json, text/html, text/plain, */*";

/// Options for a single fetch.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub max_retries: u32,
    /// Pre-request jitter; disabled in tests.
    pub jitter: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            jitter: true,
        }
    }
}

/// A successful upstream response.
#[derive(Debug)]
pub struct FetchedResponse {
    pub status: u16,
    pub body: String,
    pub url: String,
}

impl FetchedResponse {
    /// Decode the body as JSON; failures classify as `JSON_ERROR`.
    pub fn json(&self) -> Result<serde_json::Value, CollectError> {
        serde_json::from_str(&self.body).map_err(|e| CollectError::Json {
            url: self.url.clone(),
            message: e.to_string(),
        })
    }
}

/// Shared HTTP client for all adapters. Cheap to clone; safe for concurrent
/// use across resorts.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy)]
enum RequestKind<'a> {
    Get,
    PostForm(&'a [(&'a str, &'a str)]),
}

impl HttpFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to build HTTP client");
        Self { client }
    }

    /// GET with the default retry policy.
    pub async fn get(&self, url: &str) -> Result<FetchedResponse, CollectError> {
        self.get_with(url, &FetchOptions::default()).await
    }

    /// GET with explicit options.
    pub async fn get_with(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<FetchedResponse, CollectError> {
        self.execute(url, RequestKind::Get, options).await
    }

    /// Form-encoded POST (Overpass queries) with explicit options.
    pub async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
        options: &FetchOptions,
    ) -> Result<FetchedResponse, CollectError> {
        self.execute(url, RequestKind::PostForm(form), options).await
    }

    async fn execute(
        &self,
        url: &str,
        kind: RequestKind<'_>,
        options: &FetchOptions,
    ) -> Result<FetchedResponse, CollectError> {
        if options.jitter {
            let delay = rand::thread_rng().gen_range(0.5..=1.0);
            tokio::time::sleep(Duration::from_secs_f64(delay)).await;
        }

        let mut last_error = CollectError::Unknown {
            url: url.to_string(),
            message: "no attempts made".to_string(),
        };

        for attempt in 1..=options.max_retries.max(1) {
            let request = match kind {
                RequestKind::Get => self.client.get(url),
                RequestKind::PostForm(form) => self.client.post(url).form(form),
            }
            .header(reqwest::header::ACCEPT, ACCEPT)
            .timeout(options.timeout);

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let body = response.text().await.map_err(|e| CollectError::Connection {
                            url: url.to_string(),
                            message: format!("failed to read body: {e}"),
                        })?;
                        return Ok(FetchedResponse {
                            status: status.as_u16(),
                            body,
                            url: url.to_string(),
                        });
                    }

                    if status == StatusCode::NOT_FOUND {
                        return Err(CollectError::Http404 {
                            url: url.to_string(),
                        });
                    }

                    if !is_retryable_status(status) {
                        return Err(CollectError::Unknown {
                            url: url.to_string(),
                            message: format!("HTTP {status}"),
                        });
                    }

                    tracing::warn!(
                        "HTTP {} from {}, attempt {}/{}",
                        status,
                        url,
                        attempt,
                        options.max_retries,
                    );
                    last_error = CollectError::Unknown {
                        url: url.to_string(),
                        message: format!("HTTP {status} after {} attempts", options.max_retries),
                    };
                }
                Err(e) if e.is_timeout() => {
                    tracing::warn!(
                        "Timeout from {}, attempt {}/{}",
                        url,
                        attempt,
                        options.max_retries,
                    );
                    last_error = CollectError::Timeout {
                        url: url.to_string(),
                        attempts: options.max_retries,
                    };
                }
                Err(e) if e.is_connect() => {
                    tracing::warn!(
                        "Connection error from {}: {}, attempt {}/{}",
                        url,
                        e,
                        attempt,
                        options.max_retries,
                    );
                    last_error = CollectError::Connection {
                        url: url.to_string(),
                        message: e.to_string(),
                    };
                }
                Err(e) => {
                    tracing::warn!(
                        "Request error from {}: {}, attempt {}/{}",
                        url,
                        e,
                        attempt,
                        options.max_retries,
                    );
                    last_error = CollectError::Connection {
                        url: url.to_string(),
                        message: e.to_string(),
                    };
                }
            }

            if attempt < options.max_retries {
                let wait = BACKOFF_BASE_SECS * attempt as u64;
                tokio::time::sleep(Duration::from_secs(wait)).await;
            }
        }

        Err(last_error)
    }
}

/// Statuses worth retrying: request timeout, too-early, rate limit, 5xx.
fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 425 | 429) || status.is_server_error()
}
