//! Collection orchestrator: fan-out over the resort registry.
//!
//! Per resort the worker runs primary adapter → supplementary adapter →
//! weather adapter serially, normalizes, and persists. Across resorts the
//! workers run through a bounded `buffer_unordered` pool. A worker never
//! propagates an error to the run: every failure is classified into the
//! ledger and the worker completes cleanly, so one bad resort cannot stop
//! the others.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use sqlx::PgPool;

use crate::cache::Cache;
use crate::config::{DataSource, Registry, ResortDescriptor};
use crate::errors::{CollectError, ErrorKind};
use crate::services::fetcher::{FetchOptions, HttpFetcher};
use crate::services::normalizer::{self, CanonicalRecord};
use crate::services::openmeteo::OpenMeteoClient;
use crate::services::store;
use crate::services::{mtnpowder, onthesnow};

/// Default fan-out width.
pub const DEFAULT_MAX_WORKERS: usize = 10;

/// Cap on stored failure messages.
const MAX_ERROR_MESSAGE_LEN: usize = 200;

/// One classified failure from a collection run.
#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    pub resort_id: i32,
    pub resort_name: String,
    pub error_type: ErrorKind,
    pub error_message: String,
    pub url: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Per-run ledger of classified failures. Safe to share across workers.
#[derive(Debug, Default)]
pub struct FailureTracker {
    failures: Mutex<Vec<FailureRecord>>,
}

impl FailureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a classified failure for a resort.
    pub fn record(&self, resort: &ResortDescriptor, error: &CollectError) {
        // Char-based cap: upstream messages can carry non-ASCII URLs and
        // payload fragments, so a byte truncate could split a code point.
        let mut message = error.to_string();
        if message.chars().count() > MAX_ERROR_MESSAGE_LEN {
            message = message.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
        }
        let record = FailureRecord {
            resort_id: resort.id,
            resort_name: resort.name.clone(),
            error_type: error.kind(),
            error_message: message,
            url: error
                .url()
                .map(|u| u.to_string())
                .or_else(|| resort.source_url.clone()),
            timestamp: Utc::now(),
        };
        self.failures
            .lock()
            .expect("failure tracker lock poisoned")
            .push(record);
    }

    pub fn len(&self) -> usize {
        self.failures
            .lock()
            .expect("failure tracker lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the ledger so far.
    pub fn snapshot(&self) -> Vec<FailureRecord> {
        self.failures
            .lock()
            .expect("failure tracker lock poisoned")
            .clone()
    }

    /// Log a grouped summary of the ledger.
    pub fn log_summary(&self) {
        let failures = self.snapshot();
        if failures.is_empty() {
            tracing::info!("All resorts collected successfully");
            return;
        }
        let mut by_kind: std::collections::BTreeMap<&'static str, usize> =
            std::collections::BTreeMap::new();
        for failure in &failures {
            *by_kind.entry(failure.error_type.as_str()).or_default() += 1;
        }
        tracing::warn!("{} collection failures: {:?}", failures.len(), by_kind);
        for failure in &failures {
            tracing::warn!(
                resort_id = failure.resort_id,
                resort = %failure.resort_name,
                error_type = failure.error_type.as_str(),
                url = failure.url.as_deref().unwrap_or("-"),
                "{}",
                failure.error_message,
            );
        }
    }
}

/// Outcome of a collection run.
#[derive(Debug)]
pub struct CollectionRun {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub duration: std::time::Duration,
    pub failures: Vec<FailureRecord>,
    /// The normalized records that were persisted.
    pub records: Vec<CanonicalRecord>,
}

/// Shared per-run collection context.
pub struct Collector {
    fetcher: HttpFetcher,
    openmeteo: OpenMeteoClient,
    pool: PgPool,
    cache: Cache,
}

impl Collector {
    pub fn new(pool: PgPool, cache: Cache, openmeteo_api_key: Option<String>) -> Self {
        let fetcher = HttpFetcher::new();
        let openmeteo = OpenMeteoClient::new(fetcher.clone(), openmeteo_api_key);
        Self {
            fetcher,
            openmeteo,
            pool,
            cache,
        }
    }

    /// Run the three adapters for one resort and merge their output.
    ///
    /// Supplementary and weather failures degrade the record instead of
    /// failing it; only a primary failure aborts the resort.
    pub async fn collect_resort(
        &self,
        resort: &ResortDescriptor,
    ) -> Result<CanonicalRecord, CollectError> {
        let options = FetchOptions::default();

        // 1. Primary source
        let raw = match resort.data_source {
            DataSource::Mtnpowder => {
                mtnpowder::collect(&self.fetcher, resort, &options).await?
            }
            DataSource::Onthesnow => {
                let url = resort
                    .source_url
                    .as_deref()
                    .ok_or_else(|| CollectError::NoData {
                        url: format!("onthesnow:{}", resort.slug),
                    })?;
                onthesnow::collect(&self.fetcher, url, &options).await?
            }
        };
        let mut record = normalizer::normalize(resort, &raw, resort.data_source);

        // 2. Supplementary OnTheSnow data (webcams, count backfill)
        if resort.data_source != DataSource::Onthesnow && resort.onthesnow_enabled {
            if let Some(url) = resort.onthesnow_url.as_deref() {
                match onthesnow::collect(&self.fetcher, url, &options).await {
                    Ok(supplementary_raw) => {
                        let mut supplementary = resort.clone();
                        supplementary.source_url = Some(url.to_string());
                        let supplementary_record = normalizer::normalize(
                            &supplementary,
                            &supplementary_raw,
                            DataSource::Onthesnow,
                        );
                        normalizer::apply_supplementary(&mut record, supplementary_record);
                    }
                    Err(e) => {
                        tracing::warn!(resort = %resort.name, "Supplementary source failed: {e}");
                    }
                }
            }
        }

        // 3. Weather
        match self.openmeteo.collect(resort, &options).await {
            Ok(weather_raw) => {
                record.weather = Some(normalizer::normalize_openmeteo(resort, &weather_raw));
            }
            Err(e) => {
                tracing::warn!(resort = %resort.name, "Weather collection failed: {e}");
            }
        }

        Ok(record)
    }

    /// Collect and persist one resort, recording any failure in the ledger.
    /// Returns the record on full success.
    pub async fn collect_and_save(
        &self,
        resort: &ResortDescriptor,
        tracker: &FailureTracker,
    ) -> Option<CanonicalRecord> {
        let record = match self.collect_resort(resort).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(resort = %resort.name, "Collection failed: {e}");
                tracker.record(resort, &e);
                return None;
            }
        };

        match store::persist_record(&self.pool, &self.cache, resort, &record).await {
            Ok(()) => Some(record),
            Err(e) => {
                tracing::error!(resort = %resort.name, "Persistence failed: {e}");
                tracker.record(resort, &e);
                None
            }
        }
    }

    /// Fan out over the registry with a bounded worker pool.
    pub async fn collect_all(
        &self,
        registry: &Registry,
        enabled_only: bool,
        tracker: &FailureTracker,
        max_workers: usize,
    ) -> CollectionRun {
        let resorts: Vec<&ResortDescriptor> = registry
            .resorts
            .iter()
            .filter(|r| !enabled_only || r.enabled)
            .collect();
        let total = resorts.len();
        let max_workers = max_workers.max(1);

        tracing::info!("Collecting {} resorts with {} workers", total, max_workers);
        let started = Instant::now();
        let completed = AtomicUsize::new(0);

        let records: Vec<CanonicalRecord> = stream::iter(resorts)
            .map(|resort| {
                let completed = &completed;
                async move {
                    let result = self.collect_and_save(resort, tracker).await;
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    match &result {
                        Some(_) => {
                            tracing::info!("[{done}/{total}] {} - collected", resort.name)
                        }
                        None => tracing::warn!("[{done}/{total}] {} - failed", resort.name),
                    }
                    result
                }
            })
            .buffer_unordered(max_workers)
            .filter_map(|r| async move { r })
            .collect()
            .await;

        let duration = started.elapsed();
        let failures = tracker.snapshot();
        let run = CollectionRun {
            total,
            success: records.len(),
            failed: failures.len(),
            duration,
            failures,
            records,
        };

        tracing::info!(
            "Collection run complete: {}/{} succeeded, {} failed, {:.1}s",
            run.success,
            run.total,
            run.failed,
            run.duration.as_secs_f64(),
        );
        run
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> ResortDescriptor {
        serde_json::from_value(serde_json::json!({
            "id": 3,
            "name": "Glacier Bowl",
            "slug": "glacier-bowl",
            "lat": 51.0,
            "lon": -117.0,
            "data_source": "onthesnow",
            "source_url": "https://example.test/glacier-bowl",
            "enabled": true
        }))
        .unwrap()
    }

    #[test]
    fn test_failure_tracker_records_and_truncates() {
        let tracker = FailureTracker::new();
        let long_message = "x".repeat(500);
        let error = CollectError::Unknown {
            url: "https://example.test".to_string(),
            message: long_message,
        };
        tracker.record(&descriptor(), &error);

        let failures = tracker.snapshot();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].resort_id, 3);
        assert_eq!(failures[0].error_type, ErrorKind::Unknown);
        assert!(failures[0].error_message.chars().count() <= MAX_ERROR_MESSAGE_LEN);
        assert_eq!(failures[0].url.as_deref(), Some("https://example.test"));
    }

    #[test]
    fn test_failure_tracker_truncates_multibyte_messages() {
        let tracker = FailureTracker::new();
        // Every char is multi-byte; byte offset 200 would not be a char
        // boundary here.
        let error = CollectError::Json {
            url: "https://example.test/雪场".to_string(),
            message: "雪场数据解析失败".repeat(60),
        };
        tracker.record(&descriptor(), &error);

        let failures = tracker.snapshot();
        assert_eq!(failures[0].error_type, ErrorKind::JsonError);
        assert_eq!(failures[0].error_message.chars().count(), MAX_ERROR_MESSAGE_LEN);
    }

    #[test]
    fn test_failure_tracker_falls_back_to_source_url() {
        let tracker = FailureTracker::new();
        let error = CollectError::DatabaseSaveFailed {
            resort_id: 3,
            message: "rollback".to_string(),
        };
        tracker.record(&descriptor(), &error);
        let failures = tracker.snapshot();
        // DB failures carry no URL of their own; the descriptor's is used
        assert_eq!(
            failures[0].url.as_deref(),
            Some("https://example.test/glacier-bowl")
        );
        assert_eq!(failures[0].error_type, ErrorKind::DatabaseSaveFailed);
    }

    #[test]
    fn test_failure_tracker_is_shareable() {
        let tracker = std::sync::Arc::new(FailureTracker::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let tracker = tracker.clone();
            handles.push(std::thread::spawn(move || {
                let error = CollectError::NoData {
                    url: "u".to_string(),
                };
                tracker.record(&descriptor(), &error);
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(tracker.len(), 8);
    }
}
